use crate::gfx::camera::{Camera, CameraMovement};
use crate::gfx::rendering::{RenderEngine, RenderTarget};
use crate::gfx::shader::{ProgramRegistry, WgpuBackend};

use super::config::KeyBindings;
use super::input::KeyboardState;
use super::timing::FrameTiming;

/// What the frame hooks see of the scene during one loop iteration.
///
/// `target` is `None` when no window is live or the surface texture could not be acquired;
/// input processing still runs in that case.
pub struct Frame<'a> {
    pub camera: &'a mut Camera,
    pub programs: &'a mut ProgramRegistry,
    pub keyboard: &'a KeyboardState,
    pub timing: &'a FrameTiming,
    pub bindings: &'a KeyBindings,
    pub gpu: Option<&'a RenderEngine>,
    pub target: Option<&'a mut RenderTarget>,
    pub(crate) should_close: &'a mut bool,
}

impl Frame<'_> {
    pub fn request_close(&mut self) {
        *self.should_close = true;
    }

    pub fn should_close(&self) -> bool {
        *self.should_close
    }

    /// Seconds since the previous frame.
    pub fn delta(&self) -> f32 {
        self.timing.delta() as f32
    }

    /// Surface width over height, or 1 without a GPU context.
    pub fn aspect_ratio(&self) -> f32 {
        self.gpu.map_or(1.0, RenderEngine::aspect_ratio)
    }

    pub fn shader_backend(&self) -> Option<WgpuBackend> {
        self.gpu.map(RenderEngine::shader_backend)
    }
}

/// Per-frame behavior plugged into a scene.
///
/// Each iteration calls `pre_input`, `process_input` and `refresh` in that order, then
/// presents the frame.
pub trait FrameHooks {
    fn pre_input(&mut self, _frame: &mut Frame<'_>) {}

    fn process_input(&mut self, frame: &mut Frame<'_>) {
        default_process_input(frame);
    }

    fn refresh(&mut self, _frame: &mut Frame<'_>) {}
}

/// Hooks that only run the default input handling.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultHooks;

impl FrameHooks for DefaultHooks {}

/// Quit key closes the scene; movement keys fly the camera, scaled by the frame delta.
pub fn default_process_input(frame: &mut Frame<'_>) {
    let bindings = *frame.bindings;
    if frame.keyboard.is_pressed(bindings.quit) {
        frame.request_close();
    }

    let elapsed = frame.delta();
    for (key, movement) in [
        (bindings.forward, CameraMovement::Forward),
        (bindings.backward, CameraMovement::Backward),
        (bindings.left, CameraMovement::Left),
        (bindings.right, CameraMovement::Right),
    ] {
        if frame.keyboard.is_pressed(key) {
            frame.camera.process_movement(movement, elapsed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::InnerSpace;
    use winit::keyboard::KeyCode;

    struct Parts {
        camera: Camera,
        programs: ProgramRegistry,
        keyboard: KeyboardState,
        timing: FrameTiming,
        bindings: KeyBindings,
        should_close: bool,
    }

    impl Parts {
        fn new() -> Self {
            let mut timing = FrameTiming::default();
            timing.advance(0.5);
            Self {
                camera: Camera::default(),
                programs: ProgramRegistry::new("."),
                keyboard: KeyboardState::default(),
                timing,
                bindings: KeyBindings::default(),
                should_close: false,
            }
        }

        fn frame(&mut self) -> Frame<'_> {
            Frame {
                camera: &mut self.camera,
                programs: &mut self.programs,
                keyboard: &self.keyboard,
                timing: &self.timing,
                bindings: &self.bindings,
                gpu: None,
                target: None,
                should_close: &mut self.should_close,
            }
        }
    }

    #[test]
    fn test_quit_key_requests_close() {
        let mut parts = Parts::new();
        parts.keyboard.press(KeyCode::Escape);
        default_process_input(&mut parts.frame());
        assert!(parts.should_close);
    }

    #[test]
    fn test_forward_key_moves_by_delta() {
        let mut parts = Parts::new();
        parts.keyboard.press(KeyCode::KeyW);
        let front = parts.camera.front();
        DefaultHooks.process_input(&mut parts.frame());

        // speed 2.5 for half a second
        let moved = parts.camera.position();
        assert!((moved - front * 1.25).magnitude() < 1e-5);
        assert!(!parts.should_close);
    }

    #[test]
    fn test_custom_bindings() {
        let mut parts = Parts::new();
        parts.bindings.quit = KeyCode::KeyQ;
        parts.keyboard.press(KeyCode::Escape);
        default_process_input(&mut parts.frame());
        assert!(!parts.should_close);

        parts.keyboard.press(KeyCode::KeyQ);
        default_process_input(&mut parts.frame());
        assert!(parts.should_close);
    }

    #[test]
    fn test_frame_without_gpu() {
        let mut parts = Parts::new();
        let frame = parts.frame();
        assert_eq!(frame.aspect_ratio(), 1.0);
        assert!(frame.shader_backend().is_none());
        assert_eq!(frame.delta(), 0.5);
    }
}
