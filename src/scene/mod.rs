//! Window, GPU context and per-frame loop.
//!
//! A [`Scene`] owns one window, its render context, a [`Camera`] and a registry of named
//! shader programs. [`Scene::run`] repeats [`Scene::step`] until the close flag is set by
//! a hook, an input callback or the window's close button.

pub mod callbacks;
pub mod config;
pub mod hooks;
pub mod input;
pub mod timing;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    error::{EventLoopError, OsError},
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::PhysicalKey,
    platform::pump_events::{EventLoopExtPumpEvents, PumpStatus},
    window::{Window, WindowId},
};

use crate::gfx::camera::Camera;
use crate::gfx::rendering::RenderEngine;
use crate::gfx::shader::{ProgramRegistry, ShaderProgram, WgpuBackend};

pub use callbacks::{
    on_cursor_position, on_framebuffer_size, on_mouse_button, on_scroll, CallbackContext,
    CursorPositionCallback, FramebufferSizeCallback, MouseButtonCallback, ScrollCallback,
};
pub use config::{KeyBindings, SceneConfig};
pub use hooks::{default_process_input, DefaultHooks, Frame, FrameHooks};
pub use input::{KeyboardState, MouseTracker};
pub use timing::FrameTiming;

use callbacks::{scroll_lines, Callbacks};
use timing::Clock;

/// Event pumps allowed for the window to appear during initialization.
const LAUNCH_PUMP_LIMIT: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("failed to create event loop: {0}")]
    EventLoop(#[from] EventLoopError),
    #[error("failed to create window: {0}")]
    Window(#[from] OsError),
    #[error("failed to initialize GPU: {0:#}")]
    Gpu(anyhow::Error),
    #[error("window was never created")]
    NoWindow,
}

/// Lifecycle of a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneStatus {
    Uninitialized,
    Ready,
    Failed,
    Running,
    Terminated,
}

/// Everything the window event handler touches.
struct SceneState {
    config: SceneConfig,
    window: Option<Arc<Window>>,
    gpu: Option<RenderEngine>,
    window_requested: bool,
    launch_error: Option<SceneError>,
    camera: Camera,
    programs: ProgramRegistry,
    keyboard: KeyboardState,
    mouse: MouseTracker,
    timing: FrameTiming,
    callbacks: Callbacks,
    should_close: bool,
}

impl SceneState {
    fn window_live(&self) -> bool {
        self.window.is_some()
    }

    fn create_window(&mut self, event_loop: &ActiveEventLoop) {
        self.window_requested = false;

        let attributes = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(LogicalSize::new(self.config.width, self.config.height));
        let window = match event_loop.create_window(attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                self.launch_error = Some(SceneError::Window(e));
                return;
            }
        };
        if self.config.hide_cursor {
            window.set_cursor_visible(false);
        }

        let size = window.inner_size();
        match RenderEngine::new(window.clone(), size.width, size.height, &self.config.gpu) {
            Ok(gpu) => {
                log::info!(
                    "window '{}' created at {}x{}",
                    self.config.title,
                    size.width,
                    size.height
                );
                self.gpu = Some(gpu);
                self.window = Some(window);
                // live before the remaining launch events are delivered
                self.mouse.reset();
                self.callbacks.attach_all();
            }
            Err(e) => self.launch_error = Some(SceneError::Gpu(e)),
        }
    }

    /// Splits off the callback slots and the context they run against.
    fn callback_parts(&mut self) -> (&mut Callbacks, CallbackContext<'_>) {
        let ctx = CallbackContext {
            camera: &mut self.camera,
            mouse: &mut self.mouse,
            gpu: self.gpu.as_mut(),
            window: self.window.as_deref(),
            should_close: &mut self.should_close,
        };
        (&mut self.callbacks, ctx)
    }
}

impl ApplicationHandler for SceneState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window_requested && self.window.is_none() {
            self.create_window(event_loop);
        }
    }

    fn window_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if self.window.as_ref().map(|w| w.id()) == Some(window_id) {
            self.handle_window_event(event);
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.window_requested && self.window.is_none() {
            self.create_window(event_loop);
        }
    }
}

impl SceneState {
    fn handle_window_event(&mut self, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                self.should_close = true;
            }
            WindowEvent::Resized(size) => {
                let (callbacks, mut ctx) = self.callback_parts();
                if let Some(callback) = callbacks.framebuffer_size.active() {
                    callback(&mut ctx, size.width, size.height);
                }
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key_code),
                        state,
                        ..
                    },
                ..
            } => {
                self.keyboard.set(key_code, state == ElementState::Pressed);
            }
            WindowEvent::Focused(false) => {
                self.keyboard.clear();
            }
            WindowEvent::MouseInput { state, button, .. } => {
                let (callbacks, mut ctx) = self.callback_parts();
                if let Some(callback) = callbacks.mouse_button.active() {
                    callback(&mut ctx, button, state);
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                let (callbacks, mut ctx) = self.callback_parts();
                if let Some(callback) = callbacks.cursor_position.active() {
                    callback(&mut ctx, position.x, position.y);
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let (x, y) = scroll_lines(delta);
                let (callbacks, mut ctx) = self.callback_parts();
                if let Some(callback) = callbacks.scroll.active() {
                    callback(&mut ctx, x, y);
                }
            }
            _ => (),
        }
    }
}

/// A window with a GPU context, a camera and named shader programs.
pub struct Scene {
    base_dir: PathBuf,
    event_loop: Option<EventLoop<()>>,
    state: SceneState,
    hooks: Box<dyn FrameHooks>,
    status: SceneStatus,
    last_error: Option<SceneError>,
    clock: Clock,
}

impl Scene {
    /// Creates an uninitialized scene; relative shader paths resolve against `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        Self {
            state: SceneState {
                config: SceneConfig::default(),
                window: None,
                gpu: None,
                window_requested: false,
                launch_error: None,
                camera: Camera::default(),
                programs: ProgramRegistry::new(base_dir.clone()),
                keyboard: KeyboardState::default(),
                mouse: MouseTracker::default(),
                timing: FrameTiming::default(),
                callbacks: Callbacks::with_defaults(),
                should_close: false,
            },
            base_dir,
            event_loop: None,
            hooks: Box::new(DefaultHooks),
            status: SceneStatus::Uninitialized,
            last_error: None,
            clock: Clock::new(),
        }
    }

    /// Creates a scene rooted at the directory of the running executable.
    pub fn from_executable_dir() -> Self {
        let base_dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| {
                log::warn!("executable directory unavailable, using the working directory");
                PathBuf::from(".")
            });
        Self::new(base_dir)
    }

    /// Replaces the window and GPU settings used by the next initialization.
    pub fn with_config(&mut self, config: SceneConfig) -> &mut Self {
        self.state.config = config;
        self
    }

    /// Replaces the frame hooks.
    pub fn with_hooks(&mut self, hooks: impl FrameHooks + 'static) -> &mut Self {
        self.hooks = Box::new(hooks);
        self
    }

    /// Opens the window and GPU context with the configured size and title.
    pub fn initialize(&mut self) -> bool {
        self.launch()
    }

    /// Opens the window and GPU context with the given size and title.
    pub fn initialize_with(&mut self, width: u32, height: u32, title: &str) -> bool {
        self.state.config.width = width;
        self.state.config.height = height;
        self.state.config.title = title.to_string();
        self.launch()
    }

    fn launch(&mut self) -> bool {
        if self.state.window_live() {
            log::warn!("scene is already initialized");
            return true;
        }

        self.last_error = None;
        self.state.should_close = false;
        match self.open_window() {
            Ok(()) => {
                self.status = SceneStatus::Ready;
                true
            }
            Err(e) => {
                log::error!("scene initialization failed: {}", e);
                self.state.gpu = None;
                self.state.window = None;
                self.last_error = Some(e);
                self.status = SceneStatus::Failed;
                false
            }
        }
    }

    fn open_window(&mut self) -> Result<(), SceneError> {
        // winit allows a single event loop per process, so it outlives finalize()
        if self.event_loop.is_none() {
            self.event_loop = Some(EventLoop::new()?);
        }
        let Some(event_loop) = self.event_loop.as_mut() else {
            return Err(SceneError::NoWindow);
        };

        self.state.window_requested = true;
        self.state.launch_error = None;
        for _ in 0..LAUNCH_PUMP_LIMIT {
            if let PumpStatus::Exit(code) =
                event_loop.pump_app_events(Some(Duration::ZERO), &mut self.state)
            {
                log::debug!("event loop exited with code {} during launch", code);
                break;
            }
            if self.state.window_live() || self.state.launch_error.is_some() {
                break;
            }
        }
        self.state.window_requested = false;

        if let Some(e) = self.state.launch_error.take() {
            return Err(e);
        }
        if !self.state.window_live() {
            return Err(SceneError::NoWindow);
        }
        Ok(())
    }

    pub fn launch_successful(&self) -> bool {
        matches!(self.status, SceneStatus::Ready | SceneStatus::Running) && self.state.window_live()
    }

    /// The error of the last failed initialization.
    pub fn last_error(&self) -> Option<&SceneError> {
        self.last_error.as_ref()
    }

    pub fn status(&self) -> SceneStatus {
        self.status
    }

    /// Runs frames until the close flag is set.
    pub fn run(&mut self) {
        if !self.launch_successful() {
            log::warn!("run() called without a successful launch");
            return;
        }

        self.status = SceneStatus::Running;
        while self.step() {}
        self.status = SceneStatus::Ready;
        log::debug!("run loop finished");
    }

    /// Runs one loop iteration and returns whether the loop should continue.
    pub fn step(&mut self) -> bool {
        if self.state.should_close {
            return false;
        }

        self.state.timing.advance(self.clock.seconds());

        let mut target = match self.state.gpu.as_mut().map(RenderEngine::begin_frame) {
            Some(Ok(target)) => target,
            Some(Err(wgpu::SurfaceError::OutOfMemory)) => {
                log::error!("out of GPU memory, closing scene");
                self.state.should_close = true;
                None
            }
            Some(Err(e)) => {
                log::error!("failed to acquire surface texture: {}", e);
                None
            }
            None => None,
        };

        let state = &mut self.state;
        let mut frame = Frame {
            camera: &mut state.camera,
            programs: &mut state.programs,
            keyboard: &state.keyboard,
            timing: &state.timing,
            bindings: &state.config.bindings,
            gpu: state.gpu.as_ref(),
            target: target.as_mut(),
            should_close: &mut state.should_close,
        };
        self.hooks.pre_input(&mut frame);
        self.hooks.process_input(&mut frame);
        self.hooks.refresh(&mut frame);

        if let (Some(gpu), Some(target)) = (self.state.gpu.as_ref(), target) {
            gpu.end_frame(target);
        }

        self.pump_events();
        !self.state.should_close
    }

    fn pump_events(&mut self) {
        let Some(event_loop) = self.event_loop.as_mut() else {
            return;
        };
        if let PumpStatus::Exit(code) =
            event_loop.pump_app_events(Some(Duration::ZERO), &mut self.state)
        {
            log::debug!("event loop exited with code {}", code);
            self.state.should_close = true;
        }
    }

    /// Drops the GPU context and the window. Safe to call more than once.
    pub fn finalize(&mut self) {
        if self.status == SceneStatus::Terminated {
            return;
        }
        self.state.gpu = None;
        self.state.window = None;
        if self.status != SceneStatus::Uninitialized {
            log::debug!("scene finalized");
            self.status = SceneStatus::Terminated;
        }
    }

    pub fn set_framebuffer_size_callback(
        &mut self,
        callback: Option<Box<FramebufferSizeCallback>>,
        attach_now: bool,
    ) {
        let live = self.state.window_live();
        self.state.callbacks.framebuffer_size.set(callback, attach_now, live);
    }

    pub fn set_mouse_button_callback(
        &mut self,
        callback: Option<Box<MouseButtonCallback>>,
        attach_now: bool,
    ) {
        let live = self.state.window_live();
        self.state.callbacks.mouse_button.set(callback, attach_now, live);
    }

    pub fn set_cursor_position_callback(
        &mut self,
        callback: Option<Box<CursorPositionCallback>>,
        attach_now: bool,
    ) {
        let live = self.state.window_live();
        self.state.callbacks.cursor_position.set(callback, attach_now, live);
    }

    pub fn set_scroll_callback(&mut self, callback: Option<Box<ScrollCallback>>, attach_now: bool) {
        let live = self.state.window_live();
        self.state.callbacks.scroll.set(callback, attach_now, live);
    }

    /// The program called `name`, created unbuilt and rooted at the base directory if absent.
    pub fn with_program(&mut self, name: &str) -> &mut ShaderProgram {
        self.state.programs.get_or_create(name)
    }

    pub fn program(&self, name: &str) -> Option<&ShaderProgram> {
        self.state.programs.get(name)
    }

    pub fn programs(&self) -> &ProgramRegistry {
        &self.state.programs
    }

    pub fn programs_mut(&mut self) -> &mut ProgramRegistry {
        &mut self.state.programs
    }

    /// Backend for building programs against this scene's device.
    pub fn shader_backend(&self) -> Option<WgpuBackend> {
        self.state.gpu.as_ref().map(RenderEngine::shader_backend)
    }

    pub fn gpu(&self) -> Option<&RenderEngine> {
        self.state.gpu.as_ref()
    }

    pub fn gpu_mut(&mut self) -> Option<&mut RenderEngine> {
        self.state.gpu.as_mut()
    }

    pub fn window(&self) -> Option<&Window> {
        self.state.window.as_deref()
    }

    pub fn camera(&self) -> &Camera {
        &self.state.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.state.camera
    }

    pub fn keyboard(&self) -> &KeyboardState {
        &self.state.keyboard
    }

    /// Held keys; writable so input can be injected without a window.
    pub fn keyboard_mut(&mut self) -> &mut KeyboardState {
        &mut self.state.keyboard
    }

    pub fn timing(&self) -> &FrameTiming {
        &self.state.timing
    }

    pub fn config(&self) -> &SceneConfig {
        &self.state.config
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn request_close(&mut self) {
        self.state.should_close = true;
    }

    pub fn should_close(&self) -> bool {
        self.state.should_close
    }
}

impl Drop for Scene {
    fn drop(&mut self) {
        self.finalize();
    }
}
