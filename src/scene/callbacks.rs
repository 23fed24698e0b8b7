//! Replaceable window input callbacks.
//!
//! Each callback receives a [`CallbackContext`] borrowed from the scene that owns it.

use winit::event::{ElementState, MouseButton, MouseScrollDelta};
use winit::window::Window;

use super::input::MouseTracker;
use crate::gfx::camera::Camera;
use crate::gfx::rendering::RenderEngine;

/// Scroll deltas reported in pixels are converted to lines at this rate.
pub const PIXELS_PER_LINE: f64 = 20.0;

/// Scroll offsets in lines, as the scroll callback receives them.
pub fn scroll_lines(delta: MouseScrollDelta) -> (f64, f64) {
    match delta {
        MouseScrollDelta::LineDelta(x, y) => (x as f64, y as f64),
        MouseScrollDelta::PixelDelta(p) => (p.x / PIXELS_PER_LINE, p.y / PIXELS_PER_LINE),
    }
}

/// Scene state reachable from an input callback.
pub struct CallbackContext<'a> {
    pub camera: &'a mut Camera,
    pub mouse: &'a mut MouseTracker,
    pub(crate) gpu: Option<&'a mut RenderEngine>,
    pub(crate) window: Option<&'a Window>,
    pub(crate) should_close: &'a mut bool,
}

impl<'a> CallbackContext<'a> {
    pub fn window(&self) -> Option<&Window> {
        self.window
    }

    pub fn gpu(&mut self) -> Option<&mut RenderEngine> {
        self.gpu.as_deref_mut()
    }

    /// Reconfigures the surface for a new framebuffer size.
    pub fn resize_surface(&mut self, width: u32, height: u32) {
        if let Some(gpu) = self.gpu.as_deref_mut() {
            gpu.resize(width, height);
        }
    }

    pub fn request_close(&mut self) {
        *self.should_close = true;
    }
}

pub type FramebufferSizeCallback = dyn FnMut(&mut CallbackContext<'_>, u32, u32);
pub type MouseButtonCallback = dyn FnMut(&mut CallbackContext<'_>, MouseButton, ElementState);
pub type CursorPositionCallback = dyn FnMut(&mut CallbackContext<'_>, f64, f64);
pub type ScrollCallback = dyn FnMut(&mut CallbackContext<'_>, f64, f64);

pub fn on_framebuffer_size<F>(f: F) -> Box<FramebufferSizeCallback>
where
    F: FnMut(&mut CallbackContext<'_>, u32, u32) + 'static,
{
    Box::new(f)
}

pub fn on_mouse_button<F>(f: F) -> Box<MouseButtonCallback>
where
    F: FnMut(&mut CallbackContext<'_>, MouseButton, ElementState) + 'static,
{
    Box::new(f)
}

pub fn on_cursor_position<F>(f: F) -> Box<CursorPositionCallback>
where
    F: FnMut(&mut CallbackContext<'_>, f64, f64) + 'static,
{
    Box::new(f)
}

pub fn on_scroll<F>(f: F) -> Box<ScrollCallback>
where
    F: FnMut(&mut CallbackContext<'_>, f64, f64) + 'static,
{
    Box::new(f)
}

/// One callback registration point.
///
/// The active callback is the one invoked for events. A replacement registered while no
/// window is live, or without `attach_now`, waits until the next initialization.
pub struct CallbackSlot<F: ?Sized> {
    active: Option<Box<F>>,
    pending: Option<Option<Box<F>>>,
}

impl<F: ?Sized> CallbackSlot<F> {
    pub fn empty() -> Self {
        Self {
            active: None,
            pending: None,
        }
    }

    /// A slot whose callback becomes active at the next initialization.
    pub fn with_pending(callback: Box<F>) -> Self {
        Self {
            active: None,
            pending: Some(Some(callback)),
        }
    }

    /// Stores `callback`; `None` unregisters.
    pub fn set(&mut self, callback: Option<Box<F>>, attach_now: bool, window_live: bool) {
        if attach_now && window_live {
            self.active = callback;
            self.pending = None;
        } else {
            self.pending = Some(callback);
        }
    }

    /// Applies a pending registration.
    pub fn attach(&mut self) {
        if let Some(callback) = self.pending.take() {
            self.active = callback;
        }
    }

    pub fn active(&mut self) -> Option<&mut F> {
        self.active.as_deref_mut()
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }
}

impl<F: ?Sized> Default for CallbackSlot<F> {
    fn default() -> Self {
        Self::empty()
    }
}

/// The four input callback slots of a scene.
pub struct Callbacks {
    pub framebuffer_size: CallbackSlot<FramebufferSizeCallback>,
    pub mouse_button: CallbackSlot<MouseButtonCallback>,
    pub cursor_position: CallbackSlot<CursorPositionCallback>,
    pub scroll: CallbackSlot<ScrollCallback>,
}

impl Callbacks {
    /// Slots holding the default handlers, to be attached on initialization.
    pub fn with_defaults() -> Self {
        Self {
            framebuffer_size: CallbackSlot::<FramebufferSizeCallback>::with_pending(Box::new(
                default_framebuffer_size,
            )),
            mouse_button: CallbackSlot::empty(),
            cursor_position: CallbackSlot::<CursorPositionCallback>::with_pending(Box::new(
                default_cursor_position,
            )),
            scroll: CallbackSlot::<ScrollCallback>::with_pending(Box::new(default_scroll)),
        }
    }

    pub fn attach_all(&mut self) {
        self.framebuffer_size.attach();
        self.mouse_button.attach();
        self.cursor_position.attach();
        self.scroll.attach();
    }
}

/// Resizes the surface to the new framebuffer size.
pub fn default_framebuffer_size(ctx: &mut CallbackContext<'_>, width: u32, height: u32) {
    ctx.resize_surface(width, height);
}

/// Turns cursor motion into camera yaw and pitch.
pub fn default_cursor_position(ctx: &mut CallbackContext<'_>, x: f64, y: f64) {
    if let Some((dx, dy)) = ctx.mouse.track(x, y) {
        ctx.camera.process_look_delta(dx as f32, dy as f32, true);
    }
}

/// Zooms the camera with the vertical scroll offset.
pub fn default_scroll(ctx: &mut CallbackContext<'_>, _x_offset: f64, y_offset: f64) {
    ctx.camera.process_zoom_delta(y_offset as f32);
}
