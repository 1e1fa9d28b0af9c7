//! Bind group layout for full-screen passes.
//!
//! Every pass in this crate reads exactly one texture, declared in WGSL as
//! `@group(0) @binding(0) var source_texture: texture_2d<f32>;`.

use wgpu::{BindGroup, BindGroupLayout, Device, ShaderStages, TextureView};

/// Binding slot of the source texture in group 0.
pub const SOURCE_TEXTURE_BINDING: u32 = 0;

/// Bind group layout with the source texture, plus the bind groups made from it.
pub struct SourceTextureBinding {
    label: String,
    layout: BindGroupLayout,
}

impl SourceTextureBinding {
    pub fn new(device: &Device, label: &str) -> Self {
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(&format!("{label}_bind_group_layout")),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: SOURCE_TEXTURE_BINDING,
                visibility: ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            }],
        });

        Self {
            label: label.to_string(),
            layout,
        }
    }

    pub fn layout(&self) -> &BindGroupLayout {
        &self.layout
    }

    /// Bind `view` as the pass source.
    pub fn bind(&self, device: &Device, view: &TextureView) -> BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{}_bind_group", self.label)),
            layout: &self.layout,
            entries: &[wgpu::BindGroupEntry {
                binding: SOURCE_TEXTURE_BINDING,
                resource: wgpu::BindingResource::TextureView(view),
            }],
        })
    }
}
