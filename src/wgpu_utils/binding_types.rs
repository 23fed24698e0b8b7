// src/wgpu_utils/binding_types.rs
//! WGPU binding type utilities

use std::num::NonZeroU64;

/// Uniform buffer binding addressed by a dynamic offset, with an exact minimum size.
pub fn dynamic_uniform(min_binding_size: u64) -> wgpu::BindingType {
    wgpu::BindingType::Buffer {
        ty: wgpu::BufferBindingType::Uniform,
        has_dynamic_offset: true,
        min_binding_size: NonZeroU64::new(min_binding_size),
    }
}

/// Shader stages that see a program's uniforms.
pub fn uniform_visibility(compute: bool) -> wgpu::ShaderStages {
    if compute {
        wgpu::ShaderStages::COMPUTE
    } else {
        wgpu::ShaderStages::VERTEX_FRAGMENT
    }
}
