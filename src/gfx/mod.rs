//! # Graphics Module
//!
//! Graphics building blocks used by a [`Scene`](crate::scene::Scene):
//!
//! - **Camera** ([`camera`]) - First-person camera driven by movement, look and zoom input
//! - **Shaders** ([`shader`]) - Programs built from per-stage WGSL files with named uniforms
//! - **Rendering** ([`rendering`]) - Surface, device and frame presentation

pub mod camera;
pub mod rendering;
pub mod shader;

// Re-export commonly used types
pub use camera::{Camera, CameraMovement};
pub use rendering::{GpuRequest, RenderEngine, RenderTarget};
pub use shader::{ShaderProgram, ShaderReport, WgpuBackend};
