//! Built-in WGSL programs.

use wgpu::{Device, ShaderModule};

/// Full-screen triangle vertex stage (`vs_main`).
pub const FULLSCREEN_WGSL: &str = include_str!("shaders/fullscreen.wgsl");

/// Nearest-texel copy of the texture bound at binding 0.
pub const BLIT_WGSL: &str = include_str!("shaders/blit.wgsl");

pub const BLIT_FRAGMENT_ENTRY: &str = "fs_main";

pub fn create_fullscreen_module(device: &Device) -> ShaderModule {
    create_module(device, "fullscreen_vertex_shader", FULLSCREEN_WGSL)
}

pub fn create_blit_module(device: &Device) -> ShaderModule {
    create_module(device, "blit_shader", BLIT_WGSL)
}

/// Compile WGSL source into a shader module.
pub fn create_module(device: &Device, label: &str, source: &str) -> ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.to_owned().into()),
    })
}
