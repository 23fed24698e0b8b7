// src/gfx/rendering/mod.rs
//! Core rendering functionality
//!
//! Handles GPU context bring-up, surface management and frame presentation.

pub mod render_engine;

// Re-export main types
pub use render_engine::{GpuRequest, RenderEngine, RenderTarget};
