//! [`ShaderBackend`] implementation on wgpu.
//!
//! Stages are WGSL modules; linking builds a render or compute pipeline whose bind group 0
//! holds one uniform buffer per reflected uniform block. Each buffer is a ring of snapshots
//! bound at a dynamic offset, so uniforms set between two binds of a program reach only
//! the draws recorded after the second bind.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use wgpu::*;

use super::backend::{BindProgram, LinkedProgram, ShaderBackend};
use super::reflect::{UniformLayout, UniformLocation};
use super::stage::{ProgramKind, ShaderStage};
use crate::wgpu_utils::{dynamic_uniform, uniform_visibility, UniformBlockBuffer};

/// Uniform snapshots each block holds per frame.
pub const DEFAULT_UNIFORM_SNAPSHOTS: u32 = 64;

/// Owned description of one vertex buffer slot.
#[derive(Debug, Clone)]
pub struct VertexLayout {
    pub array_stride: BufferAddress,
    pub step_mode: VertexStepMode,
    pub attributes: Vec<VertexAttribute>,
}

impl VertexLayout {
    pub fn new(array_stride: BufferAddress, attributes: &[VertexAttribute]) -> Self {
        Self {
            array_stride,
            step_mode: VertexStepMode::Vertex,
            attributes: attributes.to_vec(),
        }
    }

    pub fn instanced(mut self) -> Self {
        self.step_mode = VertexStepMode::Instance;
        self
    }

    fn as_wgpu(&self) -> VertexBufferLayout<'_> {
        VertexBufferLayout {
            array_stride: self.array_stride,
            step_mode: self.step_mode,
            attributes: &self.attributes,
        }
    }
}

/// Configuration for creating a program's pipeline
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub vertex_buffers: Vec<VertexLayout>,
    pub primitive_topology: PrimitiveTopology,
    pub cull_mode: Option<Face>,
    pub front_face: FrontFace,
    pub depth_format: Option<TextureFormat>,
    pub multisample: MultisampleState,
    /// Color target format; the surface format when unset.
    pub color_format: Option<TextureFormat>,
    pub blend: Option<BlendState>,
    /// Entry point overrides. `None` selects the module's only entry point for that stage.
    pub vertex_entry: Option<String>,
    pub fragment_entry: Option<String>,
    pub compute_entry: Option<String>,
    /// Binds with distinct uniform values a block supports per frame.
    pub uniform_snapshots: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            vertex_buffers: Vec::new(),
            primitive_topology: PrimitiveTopology::TriangleList,
            cull_mode: None,
            front_face: FrontFace::Ccw,
            depth_format: None,
            multisample: MultisampleState::default(),
            color_format: None,
            blend: Some(BlendState::REPLACE),
            vertex_entry: None,
            fragment_entry: None,
            compute_entry: None,
            uniform_snapshots: DEFAULT_UNIFORM_SNAPSHOTS,
        }
    }
}

impl PipelineConfig {
    pub fn with_vertex_buffer(mut self, layout: VertexLayout) -> Self {
        self.vertex_buffers.push(layout);
        self
    }

    pub fn with_topology(mut self, topology: PrimitiveTopology) -> Self {
        self.primitive_topology = topology;
        self
    }

    pub fn with_cull_mode(mut self, cull_mode: Option<Face>) -> Self {
        self.cull_mode = cull_mode;
        self
    }

    /// Set depth stencil format
    pub fn with_depth_format(mut self, format: TextureFormat) -> Self {
        self.depth_format = Some(format);
        self
    }

    pub fn with_color_format(mut self, format: TextureFormat) -> Self {
        self.color_format = Some(format);
        self
    }

    pub fn with_blend(mut self, blend: Option<BlendState>) -> Self {
        self.blend = blend;
        self
    }

    pub fn with_entry_points(mut self, vertex: &str, fragment: &str) -> Self {
        self.vertex_entry = Some(vertex.to_string());
        self.fragment_entry = Some(fragment.to_string());
        self
    }

    pub fn with_compute_entry(mut self, entry: &str) -> Self {
        self.compute_entry = Some(entry.to_string());
        self
    }

    pub fn with_uniform_snapshots(mut self, snapshots: u32) -> Self {
        self.uniform_snapshots = snapshots;
        self
    }
}

/// Compiles WGSL stages and links them into wgpu pipelines.
#[derive(Clone)]
pub struct WgpuBackend {
    device: Arc<Device>,
    queue: Arc<Queue>,
    surface_format: TextureFormat,
    frame_epoch: Arc<AtomicU64>,
}

impl WgpuBackend {
    pub fn new(device: Arc<Device>, queue: Arc<Queue>, surface_format: TextureFormat) -> Self {
        Self {
            device,
            queue,
            surface_format,
            frame_epoch: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Shares a frame counter with the code that submits frames.
    pub fn with_frame_epoch(mut self, frame_epoch: Arc<AtomicU64>) -> Self {
        self.frame_epoch = frame_epoch;
        self
    }

    /// Marks the end of a submission, letting programs reuse their uniform snapshots.
    ///
    /// Scene frames do this on present; call it after submitting work recorded elsewhere.
    pub fn finish_frame(&self) {
        self.frame_epoch.fetch_add(1, Ordering::Relaxed);
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    pub fn surface_format(&self) -> TextureFormat {
        self.surface_format
    }

    /// Runs `f` inside a validation error scope, turning a captured error into its text.
    fn validated<T>(&self, f: impl FnOnce() -> T) -> Result<T, String> {
        self.device.push_error_scope(ErrorFilter::Validation);
        let value = f();
        match pollster::block_on(self.device.pop_error_scope()) {
            Some(error) => Err(error.to_string()),
            None => Ok(value),
        }
    }

    fn render_pipeline(
        &self,
        label: &str,
        layout: &PipelineLayout,
        vertex: &ShaderModule,
        fragment: &ShaderModule,
        config: &PipelineConfig,
    ) -> RenderPipeline {
        let vertex_buffers: Vec<VertexBufferLayout> =
            config.vertex_buffers.iter().map(VertexLayout::as_wgpu).collect();
        let targets = [Some(ColorTargetState {
            format: config.color_format.unwrap_or(self.surface_format),
            blend: config.blend,
            write_mask: ColorWrites::ALL,
        })];

        self.device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(layout),
            vertex: VertexState {
                module: vertex,
                entry_point: config.vertex_entry.as_deref(),
                buffers: &vertex_buffers,
                compilation_options: PipelineCompilationOptions::default(),
            },
            fragment: Some(FragmentState {
                module: fragment,
                entry_point: config.fragment_entry.as_deref(),
                targets: &targets,
                compilation_options: PipelineCompilationOptions::default(),
            }),
            primitive: PrimitiveState {
                topology: config.primitive_topology,
                strip_index_format: None,
                front_face: config.front_face,
                cull_mode: config.cull_mode,
                polygon_mode: PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: config.depth_format.map(|format| DepthStencilState {
                format,
                depth_write_enabled: true,
                depth_compare: CompareFunction::Less,
                stencil: StencilState::default(),
                bias: DepthBiasState::default(),
            }),
            multisample: config.multisample,
            multiview: None,
            cache: None,
        })
    }
}

impl ShaderBackend for WgpuBackend {
    type Module = ShaderModule;
    type Program = WgpuProgram;
    type Config = PipelineConfig;

    fn compile(&self, stage: ShaderStage, label: &str, source: &str) -> Result<ShaderModule, String> {
        if stage == ShaderStage::Geometry {
            return Err("geometry shaders are not supported by wgpu".to_string());
        }

        self.validated(|| {
            self.device.create_shader_module(ShaderModuleDescriptor {
                label: Some(label),
                source: ShaderSource::Wgsl(source.into()),
            })
        })
    }

    fn link(
        &self,
        label: &str,
        kind: ProgramKind,
        stages: &[(ShaderStage, &ShaderModule)],
        uniforms: &UniformLayout,
        config: &PipelineConfig,
    ) -> Result<WgpuProgram, String> {
        let module = |wanted: ShaderStage| {
            stages
                .iter()
                .find(|(stage, _)| *stage == wanted)
                .map(|(_, module)| *module)
                .ok_or_else(|| format!("no compiled {} stage", wanted))
        };

        let visibility = uniform_visibility(kind.is_compute());
        let uniform_buffers: Vec<UniformBlockBuffer> = uniforms
            .blocks()
            .iter()
            .map(|block| {
                let snapshots = config.uniform_snapshots;
                UniformBlockBuffer::new(&self.device, block.size, snapshots, &block.name)
            })
            .collect();

        self.validated(|| {
            let (bind_group_layout, bind_group) = if uniforms.is_empty() {
                (None, None)
            } else {
                let entries: Vec<BindGroupLayoutEntry> = uniforms
                    .blocks()
                    .iter()
                    .map(|block| BindGroupLayoutEntry {
                        binding: block.binding,
                        visibility,
                        ty: dynamic_uniform(block.size),
                        count: None,
                    })
                    .collect();
                let layout = self.device.create_bind_group_layout(&BindGroupLayoutDescriptor {
                    label: Some(&format!("{} Uniforms Layout", label)),
                    entries: &entries,
                });

                let bindings: Vec<BindGroupEntry> = uniforms
                    .blocks()
                    .iter()
                    .zip(&uniform_buffers)
                    .map(|(block, buffer)| BindGroupEntry {
                        binding: block.binding,
                        resource: buffer.binding_resource(),
                    })
                    .collect();
                let group = self.device.create_bind_group(&BindGroupDescriptor {
                    label: Some(&format!("{} Uniforms", label)),
                    layout: &layout,
                    entries: &bindings,
                });
                (Some(layout), Some(group))
            };

            let layouts: Vec<&BindGroupLayout> = bind_group_layout.iter().collect();
            let pipeline_layout = self.device.create_pipeline_layout(&PipelineLayoutDescriptor {
                label: Some(&format!("{} Layout", label)),
                bind_group_layouts: &layouts,
                push_constant_ranges: &[],
            });

            let pipeline = match kind {
                ProgramKind::Compute => {
                    let compute = module(ShaderStage::Compute)?;
                    WgpuPipeline::Compute(self.device.create_compute_pipeline(
                        &ComputePipelineDescriptor {
                            label: Some(label),
                            layout: Some(&pipeline_layout),
                            module: compute,
                            entry_point: config.compute_entry.as_deref(),
                            compilation_options: PipelineCompilationOptions::default(),
                            cache: None,
                        },
                    ))
                }
                ProgramKind::GraphicsWithoutGeometry => {
                    let vertex = module(ShaderStage::Vertex)?;
                    let fragment = module(ShaderStage::Fragment)?;
                    WgpuPipeline::Render(self.render_pipeline(
                        label,
                        &pipeline_layout,
                        vertex,
                        fragment,
                        config,
                    ))
                }
                ProgramKind::GraphicsWithGeometry => {
                    return Err("geometry shaders are not supported by wgpu".to_string());
                }
            };

            Ok(WgpuProgram {
                pipeline,
                bind_group,
                uniform_buffers,
                queue: self.queue.clone(),
                frame_epoch: self.frame_epoch.clone(),
            })
        })?
    }
}

/// Pipeline of a linked program.
pub enum WgpuPipeline {
    Render(RenderPipeline),
    Compute(ComputePipeline),
}

/// A linked wgpu program: its pipeline plus the uniform buffers bound at group 0.
pub struct WgpuProgram {
    pipeline: WgpuPipeline,
    bind_group: Option<BindGroup>,
    /// In binding order, matching the dynamic offsets.
    uniform_buffers: Vec<UniformBlockBuffer>,
    queue: Arc<Queue>,
    frame_epoch: Arc<AtomicU64>,
}

impl WgpuProgram {
    pub fn pipeline(&self) -> &WgpuPipeline {
        &self.pipeline
    }

    pub fn render_pipeline(&self) -> Option<&RenderPipeline> {
        match &self.pipeline {
            WgpuPipeline::Render(pipeline) => Some(pipeline),
            WgpuPipeline::Compute(_) => None,
        }
    }

    pub fn compute_pipeline(&self) -> Option<&ComputePipeline> {
        match &self.pipeline {
            WgpuPipeline::Compute(pipeline) => Some(pipeline),
            WgpuPipeline::Render(_) => None,
        }
    }

    pub fn bind_group(&self) -> Option<&BindGroup> {
        self.bind_group.as_ref()
    }

    pub fn uniform_buffers(&self) -> &[UniformBlockBuffer] {
        &self.uniform_buffers
    }

    /// Uploads changed uniform blocks and returns the offsets to bind group 0 with.
    fn snapshot_offsets(&self) -> Vec<DynamicOffset> {
        let epoch = self.frame_epoch.load(Ordering::Relaxed);
        self.uniform_buffers
            .iter()
            .map(|buffer| buffer.snapshot(&self.queue, epoch))
            .collect()
    }
}

impl LinkedProgram for WgpuProgram {
    fn write_uniform(&self, location: &UniformLocation, bytes: &[u8]) {
        match self.uniform_buffers.get(location.block) {
            Some(buffer) => buffer.write(location.offset, bytes),
            None => log::debug!("uniform block {} has no buffer", location.block),
        }
    }
}

impl BindProgram<WgpuProgram> for RenderPass<'_> {
    fn bind_program(&mut self, program: &WgpuProgram) {
        let Some(pipeline) = program.render_pipeline() else {
            log::warn!("compute program cannot be used in a render pass");
            return;
        };
        self.set_pipeline(pipeline);
        if let Some(bind_group) = &program.bind_group {
            self.set_bind_group(0, bind_group, &program.snapshot_offsets());
        }
    }
}

impl BindProgram<WgpuProgram> for ComputePass<'_> {
    fn bind_program(&mut self, program: &WgpuProgram) {
        let Some(pipeline) = program.compute_pipeline() else {
            log::warn!("graphics program cannot be used in a compute pass");
            return;
        };
        self.set_pipeline(pipeline);
        if let Some(bind_group) = &program.bind_group {
            self.set_bind_group(0, bind_group, &program.snapshot_offsets());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.primitive_topology, PrimitiveTopology::TriangleList);
        assert!(config.cull_mode.is_none());
        assert!(config.depth_format.is_none());
        assert_eq!(config.blend, Some(BlendState::REPLACE));
        assert!(config.vertex_entry.is_none());
        assert_eq!(config.uniform_snapshots, DEFAULT_UNIFORM_SNAPSHOTS);
    }

    #[test]
    fn test_config_builders() {
        let config = PipelineConfig::default()
            .with_vertex_buffer(VertexLayout::new(
                12,
                &wgpu::vertex_attr_array![0 => Float32x3],
            ))
            .with_depth_format(TextureFormat::Depth32Float)
            .with_entry_points("vs_main", "fs_main")
            .with_uniform_snapshots(8);

        assert_eq!(config.vertex_buffers.len(), 1);
        assert_eq!(config.vertex_buffers[0].as_wgpu().array_stride, 12);
        assert_eq!(config.depth_format, Some(TextureFormat::Depth32Float));
        assert_eq!(config.fragment_entry.as_deref(), Some("fs_main"));
        assert_eq!(config.uniform_snapshots, 8);
    }

    #[test]
    fn test_instanced_layout() {
        let layout = VertexLayout::new(16, &wgpu::vertex_attr_array![1 => Float32x4]).instanced();
        assert_eq!(layout.step_mode, VertexStepMode::Instance);
        assert_eq!(layout.attributes[0].shader_location, 1);
    }
}
