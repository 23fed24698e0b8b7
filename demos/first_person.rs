//! Fly around a colored cube: W/S/A/D to move, mouse to look, scroll to zoom, Escape to quit.

use anyhow::Context;
use bytemuck::{Pod, Zeroable};
use quickgfx::prelude::*;
use wgpu::util::DeviceExt;

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct Vertex {
    position: [f32; 3],
    color: [f32; 3],
}

const CORNERS: [[f32; 3]; 8] = [
    [-0.5, -0.5, -0.5],
    [0.5, -0.5, -0.5],
    [0.5, 0.5, -0.5],
    [-0.5, 0.5, -0.5],
    [-0.5, -0.5, 0.5],
    [0.5, -0.5, 0.5],
    [0.5, 0.5, 0.5],
    [-0.5, 0.5, 0.5],
];

// counter-clockwise seen from outside
const FACES: [([usize; 6], [f32; 3]); 6] = [
    ([4, 5, 6, 4, 6, 7], [0.9, 0.2, 0.2]),
    ([1, 0, 3, 1, 3, 2], [0.2, 0.9, 0.2]),
    ([5, 1, 2, 5, 2, 6], [0.2, 0.2, 0.9]),
    ([0, 4, 7, 0, 7, 3], [0.9, 0.9, 0.2]),
    ([7, 6, 2, 7, 2, 3], [0.2, 0.9, 0.9]),
    ([0, 1, 5, 0, 5, 4], [0.9, 0.2, 0.9]),
];

fn cube_vertices() -> Vec<Vertex> {
    FACES
        .iter()
        .flat_map(|(indices, color)| {
            indices.iter().map(|&i| Vertex {
                position: CORNERS[i],
                color: *color,
            })
        })
        .collect()
}

#[derive(Default)]
struct FirstPerson {
    vertices: Option<wgpu::Buffer>,
}

impl FrameHooks for FirstPerson {
    fn refresh(&mut self, frame: &mut Frame<'_>) {
        let Some(gpu) = frame.gpu else {
            return;
        };
        let aspect = frame.aspect_ratio();
        let time = frame.timing.current() as f32;
        let Some(program) = frame.programs.get("cube") else {
            return;
        };

        let vertices = self.vertices.get_or_insert_with(|| {
            gpu.device()
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Cube Vertices"),
                    contents: bytemuck::cast_slice(&cube_vertices()),
                    usage: wgpu::BufferUsages::VERTEX,
                })
        });

        let mut camera = CameraUniform::default();
        camera.update_view_proj(frame.camera, aspect);
        program.set_mat4("view_proj", camera.view_proj);
        program.set_vec4("view_position", camera.view_position);
        program.set_vec3("tint", [1.0, 1.0, 1.0]);
        program.set_float("strength", 0.25 * (0.5 + 0.5 * time.sin()));

        let Some(target) = frame.target.as_deref_mut() else {
            return;
        };
        let mut pass = target.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Cube Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &target.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        program.use_program(&mut pass);
        pass.set_vertex_buffer(0, vertices.slice(..));
        pass.draw(0..36, 0..1);
    }
}

fn main() -> anyhow::Result<()> {
    init_logging(LoggingConfig::default());

    let mut scene = Scene::new(concat!(env!("CARGO_MANIFEST_DIR"), "/demos/shaders"));
    if !scene.initialize_with(1280, 720, "quickgfx: first person") {
        let reason = scene
            .last_error()
            .map(ToString::to_string)
            .unwrap_or_default();
        anyhow::bail!("scene failed to launch: {}", reason);
    }

    let backend = scene.shader_backend().context("scene has no GPU context")?;
    let config = PipelineConfig::default()
        .with_vertex_buffer(VertexLayout::new(
            std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            &wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3],
        ))
        .with_cull_mode(Some(wgpu::Face::Back));
    let program = scene
        .with_program("cube")
        .attach_graphics("cube.vert.wgsl", "cube.frag.wgsl", None)
        .with_config(config);
    if !program.build(&backend) {
        anyhow::bail!("{}", program.report());
    }

    scene.camera_mut().with_position(Vector3::new(0.0, 0.0, 3.0));
    scene.set_mouse_button_callback(
        Some(on_mouse_button(|ctx, button, state| {
            log::info!("{:?} {:?} at {:?}", button, state, ctx.camera.position());
        })),
        true,
    );
    scene.with_hooks(FirstPerson::default());

    scene.run();
    scene.finalize();
    Ok(())
}
