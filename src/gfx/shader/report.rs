use std::fmt;

use super::stage::ShaderStage;

/// Step of the build that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildPhase {
    Reading,
    Compilation,
    Linking,
}

impl BuildPhase {
    fn phrase(self) -> &'static str {
        match self {
            BuildPhase::Reading => "Could not read ",
            BuildPhase::Compilation => "Compilation on ",
            BuildPhase::Linking => "Linking on ",
        }
    }
}

/// What a build error is about: one stage, or the program as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportTarget {
    Stage(ShaderStage),
    Program,
}

impl ReportTarget {
    fn phrase(self) -> &'static str {
        match self {
            ReportTarget::Stage(ShaderStage::Vertex) => "vertex shader ",
            ReportTarget::Stage(ShaderStage::Fragment) => "fragment shader ",
            ReportTarget::Stage(ShaderStage::Geometry) => "geometry shader ",
            ReportTarget::Stage(ShaderStage::Compute) => "compute shader ",
            ReportTarget::Program => "shader program ",
        }
    }
}

impl From<ShaderStage> for ReportTarget {
    fn from(stage: ShaderStage) -> Self {
        ReportTarget::Stage(stage)
    }
}

/// A failed shader build, carrying the compiler/linker diagnostic verbatim.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}{}(message: {}).", .phase.phrase(), .target.phrase(), .message)]
pub struct ShaderError {
    pub phase: BuildPhase,
    pub target: ReportTarget,
    pub message: String,
}

impl ShaderError {
    pub fn new(phase: BuildPhase, target: impl Into<ReportTarget>, message: impl Into<String>) -> Self {
        Self {
            phase,
            target: target.into(),
            message: message.into(),
        }
    }
}

/// Outcome of the last build of a program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShaderReport {
    error: Option<ShaderError>,
}

impl ShaderReport {
    pub fn set(&mut self, error: ShaderError) {
        self.error = Some(error);
    }

    pub fn clear(&mut self) {
        self.error = None;
    }

    pub fn success(&self) -> bool {
        self.error.is_none()
    }

    pub fn error(&self) -> Option<&ShaderError> {
        self.error.as_ref()
    }
}

impl fmt::Display for ShaderReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error {
            Some(error) => error.fmt(f),
            None => f.write_str("(message: )."),
        }
    }
}
