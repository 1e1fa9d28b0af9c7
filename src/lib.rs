//! Canvas Shader
//!
//! Shader-filter layers for a 2D drawing context.
//!
//! Drawing issued between `begin_layer` and `end_layer` is rendered to an
//! offscreen surface, run through a WGSL fragment program on the GPU, and
//! composited back onto the context.
//!
//! # Features
//!
//! - Software 2D context (paths, transforms, clipping, compositing) via tiny-skia
//! - Native canvas layers with opacity and composite operation
//! - Headless GPU passes via wgpu, with WGSL validated up front by naga
//! - Texture bridge between 2D surfaces and GPU textures
//! - Layer shim and forwarding context over any [`Context2d`]
//!
//! ```no_run
//! use canvas_shader::{
//!     create_canvas_shader, CanvasRenderingContext2d, CanvasShaderContext, Color, Context2d,
//!     LayerFilter, ShaderFilterConfig,
//! };
//!
//! # async fn run() -> anyhow::Result<()> {
//! let shader = create_canvas_shader(ShaderFilterConfig::new(
//!     r#"
//!     @group(0) @binding(0) var source_texture: texture_2d<f32>;
//!
//!     @fragment
//!     fn mainfs(@builtin(position) position: vec4<f32>) -> @location(0) vec4<f32> {
//!         let color = textureLoad(source_texture, vec2<i32>(position.xy), 0);
//!         return vec4<f32>(1.0 - color.rgb, color.a);
//!     }
//!     "#,
//! ))
//! .await?;
//!
//! let mut ctx = CanvasShaderContext::new(CanvasRenderingContext2d::new(256, 256)?);
//! ctx.begin_layer(LayerFilter::shader(shader))?;
//! ctx.set_fill_style(Color::from_rgba8(255, 0, 0, 255));
//! ctx.fill_rect(0.0, 0.0, 256.0, 256.0);
//! ctx.end_layer()?;
//! ctx.canvas().save_png("cyan.png")?;
//! # Ok(())
//! # }
//! ```

pub mod context2d;
pub mod filter;
pub mod gpu;
pub mod layer;
pub mod surface;

// Re-export commonly used types
pub use context2d::{Context2d, LayerError, LayerFilter, LayerOptions, SurfaceFilter};
pub use filter::{create_canvas_shader, CanvasShader, FilterError, ShaderFilterConfig};
pub use gpu::{GpuContext, GpuError, GpuOptions};
pub use layer::{CanvasShaderContext, LayerShim};
pub use surface::{
    parse_color, Canvas, CanvasRenderingContext2d, CompositeOperation, SurfaceError,
};
pub use tiny_skia::{Color, Transform};
