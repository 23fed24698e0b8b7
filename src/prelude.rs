//! # quickgfx Prelude
//!
//! Commonly used types in one import:
//!
//! ```no_run
//! use quickgfx::prelude::*;
//!
//! let mut scene = Scene::from_executable_dir();
//! if scene.initialize_with(1280, 720, "demo") {
//!     scene.run();
//! }
//! ```

// Re-export scene types
pub use crate::scene::{
    on_cursor_position, on_framebuffer_size, on_mouse_button, on_scroll, CallbackContext,
    DefaultHooks, Frame, FrameHooks, KeyBindings, Scene, SceneConfig, SceneError, SceneStatus,
};

// Re-export graphics types
pub use crate::gfx::camera::{Camera, CameraMovement, CameraUniform};
pub use crate::gfx::rendering::{GpuRequest, RenderEngine, RenderTarget};
pub use crate::gfx::shader::{
    BuildState, PipelineConfig, ProgramKind, ShaderProgram, ShaderReport, ShaderStage,
    VertexLayout, WgpuBackend,
};

pub use crate::logging::{init_logging, LoggingConfig};

// Re-export common external dependencies
pub use cgmath::{Deg, InnerSpace, Matrix4, Vector3};
pub use winit::keyboard::KeyCode;
