//! Shader programs: per-stage WGSL sources, the build state machine and named uniforms.

pub mod backend;
pub mod program;
pub mod reflect;
pub mod registry;
pub mod report;
pub mod stage;
pub mod uniform;
pub mod wgpu_backend;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::{BindProgram, LinkedProgram, ShaderBackend};
pub use program::{BuildState, ShaderProgram};
pub use reflect::{MemberType, ReflectError, ScalarKind, UniformBlock, UniformLayout, UniformLocation};
pub use registry::ProgramRegistry;
pub use report::{BuildPhase, ReportTarget, ShaderError, ShaderReport};
pub use stage::{ProgramKind, ShaderDefinition, ShaderStage};
pub use uniform::UniformValue;
pub use wgpu_backend::{
    PipelineConfig, VertexLayout, WgpuBackend, WgpuPipeline, WgpuProgram, DEFAULT_UNIFORM_SNAPSHOTS,
};
