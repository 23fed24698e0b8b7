//! The seam between shader programs and the GPU API.
//!
//! [`ShaderProgram`](super::ShaderProgram) drives reading, compiling and linking;
//! a [`ShaderBackend`] performs the GPU side of the last two steps.

use std::fmt::Debug;

use super::reflect::{UniformLayout, UniformLocation};
use super::stage::{ProgramKind, ShaderStage};

/// Compiles stages and links them into programs.
///
/// Errors are the backend's diagnostic text; the caller tags them with a phase and a stage.
pub trait ShaderBackend {
    type Module;
    type Program: LinkedProgram;
    /// Backend specific pipeline options, stored on each program.
    type Config: Clone + Debug + Default;

    fn compile(&self, stage: ShaderStage, label: &str, source: &str) -> Result<Self::Module, String>;

    /// Links compiled stages, given in attachment order.
    fn link(
        &self,
        label: &str,
        kind: ProgramKind,
        stages: &[(ShaderStage, &Self::Module)],
        uniforms: &UniformLayout,
        config: &Self::Config,
    ) -> Result<Self::Program, String>;
}

/// A linked, GPU resident program.
pub trait LinkedProgram {
    /// Stores already encoded bytes at a reflected uniform location.
    ///
    /// The value is seen by work recorded after the program is next bound.
    fn write_uniform(&self, location: &UniformLocation, bytes: &[u8]);
}

/// Something a linked program can be made current on, such as a render pass.
///
/// Binding captures the program's current uniform values for the work that follows.
pub trait BindProgram<P> {
    fn bind_program(&mut self, program: &P);
}
