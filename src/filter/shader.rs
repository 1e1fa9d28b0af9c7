//! GPU-backed shader filter.

use std::fmt;

use wgpu::ShaderModule;

use super::{validate_fragment, FilterError, ShaderFilterConfig};
use crate::context2d::{LayerFilter, SurfaceFilter};
use crate::gpu::bridge::{self, render_to_canvas};
use crate::gpu::{
    create_pipeline_layout, shaders, GpuContext, GpuOptions, RenderPipelineBuilder,
    SourceTextureBinding,
};
use crate::surface::Canvas;

struct ShaderState {
    gpu: GpuContext,
    vertex: ShaderModule,
    fragment: ShaderModule,
}

/// A user fragment program that can be applied to 2D surfaces.
///
/// Owns its GPU device once initialized. Pipelines and bind groups are
/// rebuilt on every application.
pub struct CanvasShader {
    config: ShaderFilterConfig,
    state: Option<ShaderState>,
}

impl CanvasShader {
    /// Wrap a config. Nothing is compiled until [`CanvasShader::init`].
    pub fn new(config: ShaderFilterConfig) -> Self {
        Self {
            config,
            state: None,
        }
    }

    /// Acquire a device and compile the program with default adapter options.
    pub async fn init(&mut self) -> Result<(), FilterError> {
        self.init_with(&GpuOptions::default()).await
    }

    /// Acquire a device and compile the program.
    ///
    /// Calling this on an initialized filter does nothing.
    pub async fn init_with(&mut self, options: &GpuOptions) -> Result<(), FilterError> {
        if self.state.is_some() {
            return Ok(());
        }

        let gpu = GpuContext::with_options(options)
            .await
            .map_err(FilterError::DeviceUnavailable)?;

        validate_fragment(&self.config.code, &self.config.entry_point)?;

        let label = self.config.label.as_deref().unwrap_or("canvas_shader");
        let vertex = shaders::create_fullscreen_module(&gpu.device);
        let scope = gpu.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let fragment = shaders::create_module(&gpu.device, label, &self.config.code);
        if let Some(err) = scope.pop().await {
            return Err(FilterError::ShaderCompile(err.to_string()));
        }
        log::debug!(
            "Compiled shader filter `{}` (entry `{}`)",
            label,
            self.config.entry_point
        );

        self.state = Some(ShaderState {
            gpu,
            vertex,
            fragment,
        });
        Ok(())
    }

    /// Build and initialize a filter, blocking the current thread.
    pub fn create_blocking(config: ShaderFilterConfig) -> Result<Self, FilterError> {
        pollster::block_on(create_canvas_shader(config))
    }

    pub fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    pub fn config(&self) -> &ShaderFilterConfig {
        &self.config
    }

    /// The device this filter renders with, once initialized.
    pub fn gpu(&self) -> Option<&GpuContext> {
        self.state.as_ref().map(|state| &state.gpu)
    }

    /// Run the program over `source` and return the filtered pixels.
    ///
    /// The result has the same size as `source`. Waits for the GPU to finish.
    pub fn apply(&self, source: &Canvas) -> Result<Canvas, FilterError> {
        let state = self.state.as_ref().ok_or(FilterError::NotInitialized)?;
        let gpu = &state.gpu;
        let device = &gpu.device;
        let format = gpu.preferred_format();

        let texture = bridge::transfer_to_gpu_texture(gpu, source)?;
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let binding = SourceTextureBinding::new(device, "canvas_shader");
        let pipeline_layout =
            create_pipeline_layout(device, "canvas_shader_pipeline_layout", &[binding.layout()]);
        let scope = device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline =
            RenderPipelineBuilder::new("canvas_shader_pipeline", &state.vertex, &state.fragment)
                .layout(&pipeline_layout)
                .fragment_entry(&self.config.entry_point)
                .format(format)
                .build(device);
        if let Some(err) = pollster::block_on(scope.pop()) {
            texture.destroy();
            return Err(FilterError::ShaderCompile(err.to_string()));
        }
        let bind_group = binding.bind(device, &view);

        let output = render_to_canvas(
            gpu,
            &pipeline,
            &bind_group,
            source.width(),
            source.height(),
            format,
            "canvas_shader",
        );
        texture.destroy();
        Ok(output?)
    }
}

impl SurfaceFilter for CanvasShader {
    fn apply_filter(&self, source: &Canvas) -> Result<Canvas, FilterError> {
        self.apply(source)
    }
}

impl fmt::Debug for CanvasShader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CanvasShader")
            .field("entry_point", &self.config.entry_point)
            .field("label", &self.config.label)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

impl From<CanvasShader> for LayerFilter {
    fn from(shader: CanvasShader) -> Self {
        LayerFilter::shader(shader)
    }
}

/// Build a filter from `config` and initialize it.
pub async fn create_canvas_shader(config: ShaderFilterConfig) -> Result<CanvasShader, FilterError> {
    let mut shader = CanvasShader::new(config);
    shader.init().await?;
    Ok(shader)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context2d::Context2d;
    use crate::gpu::GpuError;
    use crate::surface::CanvasRenderingContext2d;
    use tiny_skia::Color;

    const INVERT: &str = r#"
        @group(0) @binding(0) var source_texture: texture_2d<f32>;

        @fragment
        fn mainfs(@builtin(position) position: vec4<f32>) -> @location(0) vec4<f32> {
            let color = textureLoad(source_texture, vec2<i32>(position.xy), 0);
            return vec4<f32>(1.0 - color.rgb, color.a);
        }
    "#;

    #[test]
    fn test_apply_before_init() {
        let shader = CanvasShader::new(ShaderFilterConfig::new(INVERT));
        assert!(!shader.is_initialized());
        assert!(shader.gpu().is_none());

        let source = Canvas::new(4, 4).unwrap();
        assert!(matches!(
            shader.apply_filter(&source),
            Err(FilterError::NotInitialized)
        ));
    }

    #[test]
    fn test_debug_hides_source() {
        let shader = CanvasShader::new(ShaderFilterConfig::new(INVERT).with_label("invert"));
        let text = format!("{shader:?}");
        assert!(text.contains("initialized: false"));
        assert!(!text.contains("textureLoad"));
    }

    #[tokio::test]
    async fn test_invert_filter() {
        let shader = match create_canvas_shader(ShaderFilterConfig::new(INVERT)).await {
            Ok(shader) => shader,
            Err(FilterError::DeviceUnavailable(_)) => return,
            Err(err) => panic!("unexpected error: {err}"),
        };

        let mut ctx = CanvasRenderingContext2d::new(16, 8).unwrap();
        ctx.set_fill_style(Color::from_rgba8(255, 0, 0, 255));
        ctx.fill_rect(0.0, 0.0, 16.0, 8.0);

        let output = shader.apply_filter(ctx.canvas()).unwrap();
        assert_eq!((output.width(), output.height()), (16, 8));
        assert_eq!(output.pixel(0, 0), Some([0, 255, 255, 255]));
        assert_eq!(output.pixel(15, 7), Some([0, 255, 255, 255]));
    }

    #[tokio::test]
    async fn test_oversized_source_is_rejected() {
        let shader = match create_canvas_shader(ShaderFilterConfig::new(INVERT)).await {
            Ok(shader) => shader,
            Err(_) => return,
        };
        let Some(max) = shader.gpu().map(GpuContext::max_texture_dimension) else {
            return;
        };

        let source = match Canvas::new(max + 1, 2) {
            Ok(source) => source,
            Err(_) => return,
        };
        match shader.apply(&source) {
            Err(FilterError::Gpu(GpuError::TextureTooLarge { width, height, max: limit })) => {
                assert_eq!((width, height, limit), (max + 1, 2, max));
            }
            other => panic!("expected TextureTooLarge, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_init_twice_is_noop() {
        let mut shader = CanvasShader::new(ShaderFilterConfig::new(INVERT));
        if shader.init().await.is_err() {
            return;
        }
        shader.init().await.unwrap();
        assert!(shader.is_initialized());
    }
}
