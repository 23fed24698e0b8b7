// src/lib.rs
//! quickgfx
//!
//! A thin layer over wgpu and winit: a first-person camera, shader programs built from
//! per-stage WGSL files with named uniforms, and a window with a per-frame loop.

pub mod gfx;
pub mod logging;
pub mod prelude;
pub mod scene;
pub mod wgpu_utils;

// Re-export main types for convenience
pub use gfx::{Camera, CameraMovement, ShaderProgram};
pub use scene::{Scene, SceneConfig, SceneError};
