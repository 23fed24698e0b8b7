//! WGPU context behind a scene window
//!
//! Owns the surface, device and queue, hands out one [`RenderTarget`] per frame and
//! presents it once the frame hooks have recorded their passes.

use anyhow::Context;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use wgpu::TextureFormat;
use winit::window::Window;

use crate::gfx::shader::WgpuBackend;

/// Pinned GPU request used when a scene brings up its context.
#[derive(Debug, Clone)]
pub struct GpuRequest {
    pub backends: wgpu::Backends,
    pub power_preference: wgpu::PowerPreference,
    pub required_features: wgpu::Features,
    pub required_limits: wgpu::Limits,
    pub present_mode: wgpu::PresentMode,
}

impl Default for GpuRequest {
    fn default() -> Self {
        let backends = if cfg!(target_os = "macos") {
            wgpu::Backends::METAL
        } else {
            wgpu::Backends::PRIMARY
        };

        Self {
            backends,
            power_preference: wgpu::PowerPreference::default(),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits {
                max_texture_dimension_2d: 4096,
                ..wgpu::Limits::downlevel_defaults()
            },
            present_mode: wgpu::PresentMode::AutoVsync,
        }
    }
}

/// Everything a frame records into: the acquired surface texture, its view and an encoder.
pub struct RenderTarget {
    pub surface_texture: wgpu::SurfaceTexture,
    pub view: wgpu::TextureView,
    pub encoder: wgpu::CommandEncoder,
}

/// Core rendering context for one window
pub struct RenderEngine {
    surface: wgpu::Surface<'static>,
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    config: wgpu::SurfaceConfiguration,
    format: TextureFormat,
    clear_color: wgpu::Color,
    /// Frames submitted so far; uniform snapshot rings restart when it moves.
    frame_epoch: Arc<AtomicU64>,
}

impl RenderEngine {
    /// Creates a render context for `window`, blocking until the device is ready.
    ///
    /// # Arguments
    /// * `window` - Window surface target for rendering
    /// * `width` - Initial surface width in pixels
    /// * `height` - Initial surface height in pixels
    /// * `request` - Backends, limits and features to ask for
    pub fn new(
        window: Arc<Window>,
        width: u32,
        height: u32,
        request: &GpuRequest,
    ) -> anyhow::Result<RenderEngine> {
        pollster::block_on(Self::new_async(window, width, height, request))
    }

    async fn new_async(
        window: Arc<Window>,
        width: u32,
        height: u32,
        request: &GpuRequest,
    ) -> anyhow::Result<RenderEngine> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: request.backends,
            ..Default::default()
        });
        let surface = instance
            .create_surface(window)
            .context("Failed to create surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: request.power_preference,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("Failed to request adapter")?;
        log::info!("Using adapter: {}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("WGPU Device"),
                required_features: request.required_features,
                required_limits: request.required_limits.clone(),
                memory_hints: wgpu::MemoryHints::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .context("Failed to request a device")?;

        let surface_capabilities = surface.get_capabilities(&adapter);
        let format = surface_capabilities
            .formats
            .iter()
            .copied()
            .find(|f| !f.is_srgb())
            .or_else(|| surface_capabilities.formats.first().copied())
            .context("Surface reports no supported formats")?;

        let present_mode = if surface_capabilities.present_modes.contains(&request.present_mode)
            || matches!(
                request.present_mode,
                wgpu::PresentMode::AutoVsync | wgpu::PresentMode::AutoNoVsync
            ) {
            request.present_mode
        } else {
            log::warn!(
                "present mode {:?} unsupported, falling back to Fifo",
                request.present_mode
            );
            wgpu::PresentMode::Fifo
        };

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: width.max(1),
            height: height.max(1),
            present_mode,
            alpha_mode: surface_capabilities
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        Ok(RenderEngine {
            surface,
            device: Arc::new(device),
            queue: Arc::new(queue),
            config,
            format,
            clear_color: wgpu::Color::BLACK,
            frame_epoch: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Reconfigures the surface (the viewport) for a new framebuffer size
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }

        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
    }

    /// Acquires the next surface texture and clears it.
    ///
    /// Returns `Ok(None)` when the frame should be skipped: the surface was lost or
    /// outdated (it is reconfigured) or acquisition timed out.
    pub fn begin_frame(&mut self) -> Result<Option<RenderTarget>, wgpu::SurfaceError> {
        let surface_texture = match self.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::debug!("surface lost or outdated, reconfiguring");
                self.surface.configure(&self.device, &self.config);
                return Ok(None);
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("surface texture acquisition timed out");
                return Ok(None);
            }
            Err(error) => return Err(error),
        };

        let view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Clear Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(self.clear_color),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        Ok(Some(RenderTarget {
            surface_texture,
            view,
            encoder,
        }))
    }

    /// Submits the frame's commands and presents it ("swap buffers")
    pub fn end_frame(&self, target: RenderTarget) {
        self.queue.submit(std::iter::once(target.encoder.finish()));
        target.surface_texture.present();
        self.frame_epoch.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_clear_color(&mut self, color: wgpu::Color) {
        self.clear_color = color;
    }

    /// Get the current surface size
    pub fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.config.width as f32 / self.config.height.max(1) as f32
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn surface_format(&self) -> TextureFormat {
        self.format
    }

    /// Shader backend sharing this context's device and queue
    pub fn shader_backend(&self) -> WgpuBackend {
        WgpuBackend::new(self.device.clone(), self.queue.clone(), self.format)
            .with_frame_epoch(self.frame_epoch.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_request_is_pinned() {
        let request = GpuRequest::default();
        assert_eq!(request.required_limits.max_texture_dimension_2d, 4096);
        assert_eq!(request.required_features, wgpu::Features::empty());
        if cfg!(target_os = "macos") {
            assert_eq!(request.backends, wgpu::Backends::METAL);
        } else {
            assert_eq!(request.backends, wgpu::Backends::PRIMARY);
        }
    }
}
