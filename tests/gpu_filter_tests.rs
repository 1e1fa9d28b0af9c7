//! GPU integration tests for shader filters and the texture bridge.
//!
//! Every test returns early when no adapter is available.

use canvas_shader::gpu::bridge;
use canvas_shader::{
    create_canvas_shader, Canvas, CanvasRenderingContext2d, CanvasShader, CanvasShaderContext,
    Color, Context2d, FilterError, GpuContext, GpuError, LayerError, LayerFilter,
    ShaderFilterConfig, SurfaceFilter,
};

const INVERT_SHADER: &str = r#"
@group(0) @binding(0) var source_texture: texture_2d<f32>;

@fragment
fn mainfs(@builtin(position) position: vec4<f32>) -> @location(0) vec4<f32> {
    let color = textureLoad(source_texture, vec2<i32>(position.xy), 0);
    return vec4<f32>(1.0 - color.rgb, color.a);
}
"#;

const IDENTITY_SHADER: &str = r#"
@group(0) @binding(0) var source_texture: texture_2d<f32>;

@fragment
fn mainfs(@builtin(position) position: vec4<f32>) -> @location(0) vec4<f32> {
    return textureLoad(source_texture, vec2<i32>(position.xy), 0);
}
"#;

async fn shader_or_skip(code: &str) -> Option<CanvasShader> {
    match create_canvas_shader(ShaderFilterConfig::new(code)).await {
        Ok(shader) => Some(shader),
        Err(FilterError::DeviceUnavailable(e)) => {
            eprintln!("Skipping GPU test: {}", e);
            None
        }
        Err(e) => panic!("Failed to create shader: {}", e),
    }
}

/// Gradient with varied alpha, so premultiplication round trips are exercised.
fn test_image(width: u32, height: u32) -> Canvas {
    let mut pixels = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            pixels.extend_from_slice(&[
                (x * 255 / width.max(1)) as u8,
                (y * 255 / height.max(1)) as u8,
                128,
                if x < width / 2 { 255 } else { 160 },
            ]);
        }
    }
    Canvas::from_rgba(width, height, &pixels).unwrap()
}

fn max_channel_diff(a: &Canvas, b: &Canvas) -> i32 {
    a.to_rgba()
        .iter()
        .zip(b.to_rgba().iter())
        .map(|(x, y)| (*x as i32 - *y as i32).abs())
        .max()
        .unwrap_or(0)
}

// ==================== Shader Filter ====================

#[tokio::test]
async fn test_invert_layer_turns_red_into_cyan() {
    let Some(shader) = shader_or_skip(INVERT_SHADER).await else {
        return;
    };

    let mut ctx = CanvasShaderContext::new(CanvasRenderingContext2d::new(64, 48).unwrap());
    ctx.begin_layer(LayerFilter::shader(shader)).unwrap();
    ctx.set_fill_style(Color::from_rgba8(255, 0, 0, 255));
    ctx.fill_rect(0.0, 0.0, 64.0, 48.0);
    ctx.end_layer().unwrap();

    let canvas = ctx.canvas();
    for (x, y) in [(0, 0), (63, 0), (0, 47), (63, 47), (31, 23)] {
        assert_eq!(canvas.pixel(x, y), Some([0, 255, 255, 255]), "pixel ({x}, {y})");
    }
}

#[tokio::test]
async fn test_identity_filter_preserves_pixels() {
    let Some(shader) = shader_or_skip(IDENTITY_SHADER).await else {
        return;
    };

    let source = test_image(40, 30);
    let output = shader.apply_filter(&source).unwrap();

    assert_eq!((output.width(), output.height()), (40, 30));
    assert!(max_channel_diff(&source, &output) <= 2);
}

#[tokio::test]
async fn test_filter_output_matches_odd_dimensions() {
    let Some(shader) = shader_or_skip(IDENTITY_SHADER).await else {
        return;
    };

    for (width, height) in [(1, 1), (3, 7), (65, 2), (257, 5)] {
        let output = shader.apply_filter(&Canvas::new(width, height).unwrap()).unwrap();
        assert_eq!((output.width(), output.height()), (width, height));
    }
}

#[tokio::test]
async fn test_empty_shader_layer_is_transparent() {
    let Some(shader) = shader_or_skip(INVERT_SHADER).await else {
        return;
    };

    let mut ctx = CanvasShaderContext::new(CanvasRenderingContext2d::new(16, 16).unwrap());
    ctx.begin_layer(LayerFilter::shader(shader)).unwrap();
    ctx.end_layer().unwrap();

    assert_eq!(ctx.canvas().pixel(8, 8), Some([0, 0, 0, 0]));
}

#[tokio::test]
async fn test_custom_entry_point() {
    let code = IDENTITY_SHADER.replace("fn mainfs", "fn passthrough");
    let config = ShaderFilterConfig::new(code).with_entry_point("passthrough");
    let shader = match create_canvas_shader(config).await {
        Ok(shader) => shader,
        Err(FilterError::DeviceUnavailable(_)) => return,
        Err(e) => panic!("Failed to create shader: {}", e),
    };

    let output = shader.apply_filter(&test_image(8, 8)).unwrap();
    assert_eq!(output.width(), 8);
}

// ==================== Shader Errors ====================

#[tokio::test]
async fn test_invalid_wgsl_is_reported() {
    match create_canvas_shader(ShaderFilterConfig::new("@fragment fn mainfs( {")).await {
        Err(FilterError::ShaderCompile(message)) => assert!(!message.is_empty()),
        Err(FilterError::DeviceUnavailable(_)) => {}
        other => panic!("expected ShaderCompile, got {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_entry_point_is_reported() {
    let config = ShaderFilterConfig::new(INVERT_SHADER).with_entry_point("main");
    match create_canvas_shader(config).await {
        Err(FilterError::MissingEntryPoint(name)) => assert_eq!(name, "main"),
        Err(FilterError::DeviceUnavailable(_)) => {}
        other => panic!("expected MissingEntryPoint, got {other:?}"),
    }
}

#[tokio::test]
async fn test_integer_texture_program_is_rejected() {
    let code = r#"
@group(0) @binding(0) var source_texture: texture_2d<u32>;

@fragment
fn mainfs(@builtin(position) position: vec4<f32>) -> @location(0) vec4<f32> {
    return vec4<f32>(textureLoad(source_texture, vec2<i32>(position.xy), 0)) / 255.0;
}
"#;
    match create_canvas_shader(ShaderFilterConfig::new(code)).await {
        Err(FilterError::ShaderCompile(message)) => assert!(message.contains("texture_2d<f32>")),
        Err(FilterError::DeviceUnavailable(_)) => {}
        other => panic!("expected ShaderCompile, got {other:?}"),
    }
}

#[tokio::test]
async fn test_oversized_layer_returns_error() {
    let Some(shader) = shader_or_skip(INVERT_SHADER).await else {
        return;
    };
    let Some(max) = shader.gpu().map(GpuContext::max_texture_dimension) else {
        return;
    };

    let mut ctx = CanvasShaderContext::new(CanvasRenderingContext2d::new(max + 1, 2).unwrap());
    ctx.begin_layer(LayerFilter::shader(shader)).unwrap();
    ctx.fill_rect(0.0, 0.0, 16.0, 2.0);
    match ctx.end_layer() {
        Err(LayerError::Filter(FilterError::Gpu(GpuError::TextureTooLarge { width, .. }))) => {
            assert_eq!(width, max + 1);
        }
        other => panic!("expected TextureTooLarge, got {other:?}"),
    }
    assert!(!ctx.is_layer_active());
    assert_eq!(ctx.canvas().pixel(0, 0), Some([0, 0, 0, 0]));
}

#[test]
fn test_uninitialized_filter_fails_at_end_layer() {
    let shader = CanvasShader::new(ShaderFilterConfig::new(INVERT_SHADER));
    let mut ctx = CanvasShaderContext::new(CanvasRenderingContext2d::new(4, 4).unwrap());

    ctx.begin_layer(LayerFilter::shader(shader)).unwrap();
    ctx.fill_rect(0.0, 0.0, 4.0, 4.0);
    assert!(ctx.end_layer().is_err());
    assert!(!ctx.is_layer_active());
}

// ==================== Texture Bridge ====================

#[tokio::test]
async fn test_bridge_round_trip() {
    let gpu = match GpuContext::new().await {
        Ok(gpu) => gpu,
        Err(_) => return,
    };

    let mut ctx = CanvasRenderingContext2d::from_canvas(test_image(33, 17));
    let before = ctx.canvas().clone();

    let texture = ctx.transfer_to_gpu_texture(&gpu).unwrap();
    assert_eq!(texture.format(), ctx.texture_format());
    ctx.transfer_back_from_gpu_texture(&gpu, texture).unwrap();

    assert_eq!((ctx.width(), ctx.height()), (33, 17));
    assert!(max_channel_diff(&before, ctx.canvas()) <= 2);
}

#[tokio::test]
async fn test_bridge_rejects_non_rgba_texture() {
    let gpu = match GpuContext::new().await {
        Ok(gpu) => gpu,
        Err(_) => return,
    };

    let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("r8"),
        size: wgpu::Extent3d {
            width: 4,
            height: 4,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::R8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });

    let mut ctx = CanvasRenderingContext2d::new(4, 4).unwrap();
    let err = bridge::transfer_back_from_gpu_texture(&gpu, texture, &mut ctx).unwrap_err();
    assert!(matches!(err, canvas_shader::GpuError::UnsupportedFormat(_)));
}

// ==================== Output ====================

#[tokio::test]
async fn test_filtered_layer_saves_png() {
    let Some(shader) = shader_or_skip(INVERT_SHADER).await else {
        return;
    };

    let mut ctx = CanvasShaderContext::new(CanvasRenderingContext2d::new(20, 10).unwrap());
    ctx.begin_layer(LayerFilter::shader(shader)).unwrap();
    ctx.set_fill_style(Color::from_rgba8(255, 0, 0, 255));
    ctx.fill_rect(0.0, 0.0, 20.0, 10.0);
    ctx.end_layer().unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cyan.png");
    ctx.canvas().save_png(&path).unwrap();

    let image = image::open(&path).unwrap().to_rgba8();
    assert_eq!(image.dimensions(), (20, 10));
    assert_eq!(image.get_pixel(5, 5).0, [0, 255, 255, 255]);
}
