//! Moves pixels between 2D surfaces and GPU textures.
//!
//! Textures produced here hold straight (unpremultiplied) RGBA, so fragment
//! programs can treat color and alpha independently. Pass outputs are read
//! back as straight RGBA and premultiplied into a new [`Canvas`].

use wgpu::{BindGroup, RenderPipeline, Texture, TextureFormat, TextureUsages};

use super::context::{GpuContext, GpuError};
use super::layouts::SourceTextureBinding;
use super::pipelines::{create_pipeline_layout, encode_fullscreen_pass, RenderPipelineBuilder};
use super::shaders::{self, BLIT_FRAGMENT_ENTRY};
use super::textures::{create_texture, is_rgba8, ReadbackBuffer, RenderTarget};
use crate::context2d::Context2d;
use crate::surface::Canvas;

/// Format of textures created from 2D surfaces.
pub const INTEROP_FORMAT: TextureFormat = TextureFormat::Rgba8Unorm;

/// Copy the current contents of `surface` into a new texture.
///
/// The texture can be bound, copied into and rendered to. The caller owns it.
/// Surfaces larger than the device's 2D texture limit are rejected.
pub fn transfer_to_gpu_texture(gpu: &GpuContext, surface: &Canvas) -> Result<Texture, GpuError> {
    let (width, height) = (surface.width(), surface.height());
    gpu.check_texture_size(width, height)?;
    let texture = create_texture(
        &gpu.device,
        "interop_texture",
        width,
        height,
        INTEROP_FORMAT,
        TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST | TextureUsages::RENDER_ATTACHMENT,
    );

    gpu.queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &surface.to_rgba(),
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(width * 4),
            rows_per_image: Some(height),
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    Ok(texture)
}

/// Render `texture` back into 2D pixels and replace the contents of `target` with them.
///
/// The texture is destroyed once its pixels are read. `target` is cleared and
/// redrawn in place with its current transform, alpha and composite settings.
pub fn transfer_back_from_gpu_texture(
    gpu: &GpuContext,
    texture: Texture,
    target: &mut dyn Context2d,
) -> Result<(), GpuError> {
    let (width, height, format) = (texture.width(), texture.height(), texture.format());
    if !is_rgba8(format) {
        texture.destroy();
        return Err(GpuError::UnsupportedFormat(format));
    }

    let device = &gpu.device;
    let vertex = shaders::create_fullscreen_module(device);
    let fragment = shaders::create_blit_module(device);
    let binding = SourceTextureBinding::new(device, "blit");
    let pipeline_layout =
        create_pipeline_layout(device, "blit_pipeline_layout", &[binding.layout()]);
    let pipeline = RenderPipelineBuilder::new("blit_pipeline", &vertex, &fragment)
        .layout(&pipeline_layout)
        .fragment_entry(BLIT_FRAGMENT_ENTRY)
        .format(format)
        .build(device);

    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let bind_group = binding.bind(device, &view);

    let rendered = render_to_canvas(gpu, &pipeline, &bind_group, width, height, format, "blit");
    texture.destroy();
    let rendered = rendered?;

    target.clear_rect(0.0, 0.0, width as f32, height as f32);
    target.draw_image_scaled(&rendered, 0.0, 0.0, width as f32, height as f32);
    Ok(())
}

/// Run one full-screen pass into a fresh `width`x`height` target and read it back.
///
/// Waits for the submission to finish before returning.
pub(crate) fn render_to_canvas(
    gpu: &GpuContext,
    pipeline: &RenderPipeline,
    bind_group: &BindGroup,
    width: u32,
    height: u32,
    format: TextureFormat,
    label: &'static str,
) -> Result<Canvas, GpuError> {
    if !is_rgba8(format) {
        return Err(GpuError::UnsupportedFormat(format));
    }
    gpu.check_texture_size(width, height)?;

    let target = RenderTarget::for_output(&gpu.device, label, width, height, format);
    let readback = ReadbackBuffer::new(&gpu.device, width, height);

    let mut encoder = gpu
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) });
    encode_fullscreen_pass(&mut encoder, label, pipeline, bind_group, target.view());
    readback.copy_from(&mut encoder, target.texture());
    gpu.queue.submit(std::iter::once(encoder.finish()));
    log::debug!("Submitted {label} pass ({width}x{height})");

    let pixels = readback.read_pixels(&gpu.device)?;
    Ok(Canvas::from_rgba(width, height, &pixels)?)
}
