//! Shader layers on top of any [`Context2d`].
//!
//! [`LayerShim`] decorates a context so that `begin_layer` accepts shader
//! filters: drawing between `begin_layer` and `end_layer` lands on an
//! offscreen surface, which is filtered and drawn back at `end_layer`.
//! [`CanvasShaderContext`] adds the forwarding that sends ordinary drawing
//! calls to that offscreen surface while a layer is open.

mod forward;

pub use forward::CanvasShaderContext;

use std::sync::Arc;

use tiny_skia::{Color, Transform};

use crate::context2d::{Context2d, LayerError, LayerFilter, SurfaceFilter};
use crate::surface::{Canvas, CanvasRenderingContext2d, CompositeOperation};

/// An open shader layer.
struct ShaderLayer {
    context: CanvasRenderingContext2d,
    filter: Arc<dyn SurfaceFilter>,
}

/// Decorator adding shader-filter layers to a drawing context.
///
/// Non-layer operations always reach the wrapped context. Native layer
/// requests are passed through unchanged, as is `end_layer` when no shader
/// layer is open. At most one shader layer can be open at a time.
pub struct LayerShim<C> {
    inner: C,
    layer: Option<ShaderLayer>,
}

impl<C: Context2d> LayerShim<C> {
    pub fn new(inner: C) -> Self {
        Self { inner, layer: None }
    }

    pub fn is_layer_active(&self) -> bool {
        self.layer.is_some()
    }

    /// Offscreen context of the open shader layer.
    pub fn layer_context(&self) -> Option<&CanvasRenderingContext2d> {
        self.layer.as_ref().map(|layer| &layer.context)
    }

    pub fn layer_context_mut(&mut self) -> Option<&mut CanvasRenderingContext2d> {
        self.layer.as_mut().map(|layer| &mut layer.context)
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// Unwrap the context. An open shader layer is discarded.
    pub fn into_inner(self) -> C {
        self.inner
    }
}

impl<C: Context2d> Context2d for LayerShim<C> {
    fn canvas(&self) -> &Canvas {
        self.inner.canvas()
    }

    fn save(&mut self) {
        self.inner.save();
    }

    fn restore(&mut self) {
        self.inner.restore();
    }

    fn translate(&mut self, x: f32, y: f32) {
        self.inner.translate(x, y);
    }

    fn scale(&mut self, x: f32, y: f32) {
        self.inner.scale(x, y);
    }

    fn rotate(&mut self, angle: f32) {
        self.inner.rotate(angle);
    }

    fn transform(&mut self, a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) {
        self.inner.transform(a, b, c, d, e, f);
    }

    fn set_transform(&mut self, transform: Transform) {
        self.inner.set_transform(transform);
    }

    fn get_transform(&self) -> Transform {
        self.inner.get_transform()
    }

    fn reset_transform(&mut self) {
        self.inner.reset_transform();
    }

    fn global_alpha(&self) -> f32 {
        self.inner.global_alpha()
    }

    fn set_global_alpha(&mut self, alpha: f32) {
        self.inner.set_global_alpha(alpha);
    }

    fn global_composite_operation(&self) -> CompositeOperation {
        self.inner.global_composite_operation()
    }

    fn set_global_composite_operation(&mut self, op: CompositeOperation) {
        self.inner.set_global_composite_operation(op);
    }

    fn fill_style(&self) -> Color {
        self.inner.fill_style()
    }

    fn set_fill_style(&mut self, color: Color) {
        self.inner.set_fill_style(color);
    }

    fn stroke_style(&self) -> Color {
        self.inner.stroke_style()
    }

    fn set_stroke_style(&mut self, color: Color) {
        self.inner.set_stroke_style(color);
    }

    fn line_width(&self) -> f32 {
        self.inner.line_width()
    }

    fn set_line_width(&mut self, width: f32) {
        self.inner.set_line_width(width);
    }

    fn clear_rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
        self.inner.clear_rect(x, y, width, height);
    }

    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
        self.inner.fill_rect(x, y, width, height);
    }

    fn stroke_rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
        self.inner.stroke_rect(x, y, width, height);
    }

    fn begin_path(&mut self) {
        self.inner.begin_path();
    }

    fn close_path(&mut self) {
        self.inner.close_path();
    }

    fn move_to(&mut self, x: f32, y: f32) {
        self.inner.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.inner.line_to(x, y);
    }

    fn quadratic_curve_to(&mut self, cpx: f32, cpy: f32, x: f32, y: f32) {
        self.inner.quadratic_curve_to(cpx, cpy, x, y);
    }

    fn bezier_curve_to(&mut self, cp1x: f32, cp1y: f32, cp2x: f32, cp2y: f32, x: f32, y: f32) {
        self.inner.bezier_curve_to(cp1x, cp1y, cp2x, cp2y, x, y);
    }

    fn rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
        self.inner.rect(x, y, width, height);
    }

    fn arc(&mut self, x: f32, y: f32, radius: f32, start: f32, end: f32, anticlockwise: bool) {
        self.inner.arc(x, y, radius, start, end, anticlockwise);
    }

    fn fill(&mut self) {
        self.inner.fill();
    }

    fn stroke(&mut self) {
        self.inner.stroke();
    }

    fn clip(&mut self) {
        self.inner.clip();
    }

    fn draw_image(&mut self, image: &Canvas, dx: f32, dy: f32) {
        self.inner.draw_image(image, dx, dy);
    }

    fn draw_image_scaled(&mut self, image: &Canvas, dx: f32, dy: f32, dw: f32, dh: f32) {
        self.inner.draw_image_scaled(image, dx, dy, dw, dh);
    }

    fn begin_layer(&mut self, filter: LayerFilter) -> Result<(), LayerError> {
        let filter = match filter {
            LayerFilter::Shader(filter) => filter,
            native => return self.inner.begin_layer(native),
        };

        if self.layer.is_some() {
            log::warn!("begin_layer called while a shader layer is active");
            return Err(LayerError::NestedLayer);
        }

        let context = CanvasRenderingContext2d::new(self.inner.width(), self.inner.height())?;
        log::debug!(
            "Shader layer opened ({}x{})",
            context.width(),
            context.height()
        );
        self.layer = Some(ShaderLayer { context, filter });
        Ok(())
    }

    fn end_layer(&mut self) -> Result<(), LayerError> {
        let Some(layer) = self.layer.take() else {
            return self.inner.end_layer();
        };

        let output = layer.filter.apply_filter(layer.context.canvas())?;
        self.inner.save();
        self.inner.draw_image(&output, 0.0, 0.0);
        self.inner.restore();
        log::debug!("Shader layer composited");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterError;

    /// Inverts color channels on the CPU.
    struct Invert;

    impl SurfaceFilter for Invert {
        fn apply_filter(&self, source: &Canvas) -> Result<Canvas, FilterError> {
            let mut pixels = source.to_rgba();
            for px in pixels.chunks_exact_mut(4) {
                for channel in &mut px[..3] {
                    *channel = 255 - *channel;
                }
            }
            Ok(Canvas::from_rgba(source.width(), source.height(), &pixels)?)
        }
    }

    struct Failing;

    impl SurfaceFilter for Failing {
        fn apply_filter(&self, _source: &Canvas) -> Result<Canvas, FilterError> {
            Err(FilterError::NotInitialized)
        }
    }

    fn shim(width: u32, height: u32) -> LayerShim<CanvasRenderingContext2d> {
        LayerShim::new(CanvasRenderingContext2d::new(width, height).unwrap())
    }

    #[test]
    fn test_shader_layer_lifecycle() {
        let mut ctx = shim(8, 8);
        assert!(!ctx.is_layer_active());

        ctx.begin_layer(LayerFilter::shader(Invert)).unwrap();
        assert!(ctx.is_layer_active());
        let layer = ctx.layer_context().unwrap();
        assert_eq!((layer.width(), layer.height()), (8, 8));

        let layer = ctx.layer_context_mut().unwrap();
        layer.set_fill_style(Color::from_rgba8(255, 0, 0, 255));
        layer.fill_rect(0.0, 0.0, 8.0, 8.0);
        assert_eq!(ctx.canvas().pixel(4, 4), Some([0, 0, 0, 0]));

        ctx.end_layer().unwrap();
        assert!(!ctx.is_layer_active());
        assert!(ctx.layer_context().is_none());
        assert_eq!(ctx.canvas().pixel(4, 4), Some([0, 255, 255, 255]));
    }

    #[test]
    fn test_nested_shader_layer_keeps_first() {
        let mut ctx = shim(4, 4);
        ctx.begin_layer(LayerFilter::shader(Invert)).unwrap();
        ctx.layer_context_mut()
            .unwrap()
            .fill_rect(0.0, 0.0, 4.0, 4.0);

        let err = ctx.begin_layer(LayerFilter::shader(Invert)).unwrap_err();
        assert!(matches!(err, LayerError::NestedLayer));

        // The first layer's drawing survives.
        let layer = ctx.layer_context().unwrap();
        assert_eq!(layer.canvas().pixel(0, 0), Some([0, 0, 0, 255]));
    }

    #[test]
    fn test_native_layer_passes_through() {
        let mut ctx = shim(4, 4);
        ctx.begin_layer(LayerFilter::native()).unwrap();
        assert!(!ctx.is_layer_active());
        assert_eq!(ctx.inner().layer_depth(), 1);

        ctx.end_layer().unwrap();
        assert_eq!(ctx.inner().layer_depth(), 0);
    }

    #[test]
    fn test_end_layer_without_layer_is_noop() {
        let mut ctx = shim(4, 4);
        ctx.fill_rect(0.0, 0.0, 2.0, 2.0);
        let before = ctx.canvas().clone();

        ctx.end_layer().unwrap();
        assert_eq!(ctx.canvas(), &before);
    }

    #[test]
    fn test_composite_does_not_leak_state() {
        let mut ctx = shim(4, 4);
        ctx.set_global_alpha(0.5);
        ctx.translate(1.0, 0.0);

        ctx.begin_layer(LayerFilter::shader(Invert)).unwrap();
        ctx.end_layer().unwrap();

        assert_eq!(ctx.global_alpha(), 0.5);
        assert_eq!(ctx.get_transform(), Transform::from_translate(1.0, 0.0));
    }

    #[test]
    fn test_filter_failure_clears_layer() {
        let mut ctx = shim(4, 4);
        ctx.begin_layer(LayerFilter::shader(Failing)).unwrap();

        let err = ctx.end_layer().unwrap_err();
        assert!(matches!(err, LayerError::Filter(FilterError::NotInitialized)));
        assert!(!ctx.is_layer_active());
        assert_eq!(ctx.canvas().pixel(0, 0), Some([0, 0, 0, 0]));
    }
}
