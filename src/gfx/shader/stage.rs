use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// One compilable unit of a shader pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Geometry,
    Compute,
}

impl ShaderStage {
    pub fn name(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
            ShaderStage::Geometry => "geometry",
            ShaderStage::Compute => "compute",
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which stages a program is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramKind {
    GraphicsWithoutGeometry,
    GraphicsWithGeometry,
    Compute,
}

impl ProgramKind {
    /// Stages in the order they are read, compiled and attached.
    pub fn stages(self) -> &'static [ShaderStage] {
        match self {
            ProgramKind::GraphicsWithoutGeometry => &[ShaderStage::Vertex, ShaderStage::Fragment],
            ProgramKind::GraphicsWithGeometry => &[
                ShaderStage::Geometry,
                ShaderStage::Vertex,
                ShaderStage::Fragment,
            ],
            ProgramKind::Compute => &[ShaderStage::Compute],
        }
    }

    pub fn is_compute(self) -> bool {
        matches!(self, ProgramKind::Compute)
    }
}

/// Source location, loaded text and compiled module of a single stage.
#[derive(Debug)]
pub struct ShaderDefinition<M> {
    stage: ShaderStage,
    path: PathBuf,
    source: String,
    module: Option<M>,
}

impl<M> ShaderDefinition<M> {
    pub fn new(stage: ShaderStage, path: impl Into<PathBuf>) -> Self {
        Self {
            stage,
            path: path.into(),
            source: String::new(),
            module: None,
        }
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Source text as of the last read; empty before the first build.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Compiled module; only present between compilation and a successful link.
    pub fn module(&self) -> Option<&M> {
        self.module.as_ref()
    }

    pub(crate) fn read(&mut self) -> Result<(), String> {
        self.source = fs::read_to_string(&self.path)
            .map_err(|e| format!("{}: {}", self.path.display(), e))?;
        Ok(())
    }

    pub(crate) fn set_module(&mut self, module: M) {
        self.module = Some(module);
    }

    pub(crate) fn release_module(&mut self) {
        self.module = None;
    }
}

/// Resolves `path` against `root` unless it is already absolute.
pub fn canonical_path(root: &Path, path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}
