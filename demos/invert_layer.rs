//! Example: Invert a layer with a WGSL filter.
//!
//! Draws a red rectangle and a translucent circle into a shader layer,
//! inverts them on the GPU and writes the result as a PNG.
//!
//! Run with:
//!     cargo run --example invert_layer --features tokio [output.png]

use anyhow::Context as _;
use canvas_shader::{
    create_canvas_shader, parse_color, CanvasRenderingContext2d, CanvasShaderContext, Color,
    Context2d, LayerFilter, ShaderFilterConfig,
};

const INVERT_SHADER: &str = r#"
@group(0) @binding(0) var source_texture: texture_2d<f32>;

@fragment
fn mainfs(@builtin(position) position: vec4<f32>) -> @location(0) vec4<f32> {
    let color = textureLoad(source_texture, vec2<i32>(position.xy), 0);
    return vec4<f32>(1.0 - color.rgb, color.a);
}
"#;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let output = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "invert_layer.png".to_string());

    println!("Canvas Shader - Invert Layer Example");
    println!("====================================\n");

    let shader = create_canvas_shader(ShaderFilterConfig::new(INVERT_SHADER).with_label("invert"))
        .await
        .context("failed to create the invert filter")?;
    if let Some(gpu) = shader.gpu() {
        let info = gpu.adapter_info();
        println!("GPU: {} ({:?})", info.name, info.backend);
    }

    let (width, height) = (320u32, 200u32);
    let mut ctx = CanvasShaderContext::new(CanvasRenderingContext2d::new(width, height)?);

    // Background stays unfiltered.
    ctx.set_fill_style(parse_color("#202020").unwrap_or(Color::BLACK));
    ctx.fill_rect(0.0, 0.0, width as f32, height as f32);

    ctx.begin_layer(LayerFilter::from(shader))?;
    ctx.set_fill_style(Color::from_rgba8(255, 0, 0, 255));
    ctx.fill_rect(40.0, 40.0, 240.0, 120.0);
    ctx.set_fill_style(parse_color("#00ff0080").unwrap_or(Color::WHITE));
    ctx.begin_path();
    ctx.arc(160.0, 100.0, 50.0, 0.0, std::f32::consts::TAU, false);
    ctx.fill();
    ctx.end_layer()?;

    ctx.canvas()
        .save_png(&output)
        .with_context(|| format!("failed to write {output}"))?;

    println!("Wrote {} ({}x{})", output, width, height);
    Ok(())
}
