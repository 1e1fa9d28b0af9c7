//! Context that follows the open shader layer.

use tiny_skia::{Color, Transform};

use super::LayerShim;
use crate::context2d::{Context2d, LayerError, LayerFilter};
use crate::surface::{Canvas, CanvasRenderingContext2d, CompositeOperation};

/// A drawing context that redirects every call to the offscreen surface of
/// the open shader layer, and to the wrapped context otherwise.
///
/// Drawing code can hold one `CanvasShaderContext` for its whole lifetime
/// and never needs to know whether a layer is open:
///
/// ```no_run
/// use canvas_shader::{CanvasRenderingContext2d, CanvasShaderContext, Color, Context2d, LayerFilter};
/// # fn demo(filter: canvas_shader::CanvasShader) -> Result<(), canvas_shader::LayerError> {
/// let mut ctx = CanvasShaderContext::new(CanvasRenderingContext2d::new(64, 64)?);
/// ctx.begin_layer(LayerFilter::shader(filter))?;
/// ctx.set_fill_style(Color::from_rgba8(255, 0, 0, 255));
/// ctx.fill_rect(0.0, 0.0, 64.0, 64.0);
/// ctx.end_layer()?;
/// # Ok(())
/// # }
/// ```
pub struct CanvasShaderContext<C> {
    shim: LayerShim<C>,
}

impl<C: Context2d> CanvasShaderContext<C> {
    pub fn new(inner: C) -> Self {
        Self {
            shim: LayerShim::new(inner),
        }
    }

    pub fn is_layer_active(&self) -> bool {
        self.shim.is_layer_active()
    }

    pub fn layer_context(&self) -> Option<&CanvasRenderingContext2d> {
        self.shim.layer_context()
    }

    /// The wrapped context, never the layer surface.
    pub fn inner(&self) -> &C {
        self.shim.inner()
    }

    pub fn into_inner(self) -> C {
        self.shim.into_inner()
    }

    fn target(&self) -> &dyn Context2d {
        match self.shim.layer_context() {
            Some(layer) => layer,
            None => &self.shim,
        }
    }

    fn with_target<R>(&mut self, f: impl FnOnce(&mut dyn Context2d) -> R) -> R {
        match self.shim.layer_context_mut() {
            Some(layer) => f(layer),
            None => f(&mut self.shim),
        }
    }
}

impl<C: Context2d> From<LayerShim<C>> for CanvasShaderContext<C> {
    fn from(shim: LayerShim<C>) -> Self {
        Self { shim }
    }
}

impl<C: Context2d> Context2d for CanvasShaderContext<C> {
    fn canvas(&self) -> &Canvas {
        self.target().canvas()
    }

    fn save(&mut self) {
        self.with_target(|ctx| ctx.save());
    }

    fn restore(&mut self) {
        self.with_target(|ctx| ctx.restore());
    }

    fn translate(&mut self, x: f32, y: f32) {
        self.with_target(|ctx| ctx.translate(x, y));
    }

    fn scale(&mut self, x: f32, y: f32) {
        self.with_target(|ctx| ctx.scale(x, y));
    }

    fn rotate(&mut self, angle: f32) {
        self.with_target(|ctx| ctx.rotate(angle));
    }

    fn transform(&mut self, a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) {
        self.with_target(|ctx| ctx.transform(a, b, c, d, e, f));
    }

    fn set_transform(&mut self, transform: Transform) {
        self.with_target(|ctx| ctx.set_transform(transform));
    }

    fn get_transform(&self) -> Transform {
        self.target().get_transform()
    }

    fn reset_transform(&mut self) {
        self.with_target(|ctx| ctx.reset_transform());
    }

    fn global_alpha(&self) -> f32 {
        self.target().global_alpha()
    }

    fn set_global_alpha(&mut self, alpha: f32) {
        self.with_target(|ctx| ctx.set_global_alpha(alpha));
    }

    fn global_composite_operation(&self) -> CompositeOperation {
        self.target().global_composite_operation()
    }

    fn set_global_composite_operation(&mut self, op: CompositeOperation) {
        self.with_target(|ctx| ctx.set_global_composite_operation(op));
    }

    fn fill_style(&self) -> Color {
        self.target().fill_style()
    }

    fn set_fill_style(&mut self, color: Color) {
        self.with_target(|ctx| ctx.set_fill_style(color));
    }

    fn stroke_style(&self) -> Color {
        self.target().stroke_style()
    }

    fn set_stroke_style(&mut self, color: Color) {
        self.with_target(|ctx| ctx.set_stroke_style(color));
    }

    fn line_width(&self) -> f32 {
        self.target().line_width()
    }

    fn set_line_width(&mut self, width: f32) {
        self.with_target(|ctx| ctx.set_line_width(width));
    }

    fn clear_rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
        self.with_target(|ctx| ctx.clear_rect(x, y, width, height));
    }

    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
        self.with_target(|ctx| ctx.fill_rect(x, y, width, height));
    }

    fn stroke_rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
        self.with_target(|ctx| ctx.stroke_rect(x, y, width, height));
    }

    fn begin_path(&mut self) {
        self.with_target(|ctx| ctx.begin_path());
    }

    fn close_path(&mut self) {
        self.with_target(|ctx| ctx.close_path());
    }

    fn move_to(&mut self, x: f32, y: f32) {
        self.with_target(|ctx| ctx.move_to(x, y));
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.with_target(|ctx| ctx.line_to(x, y));
    }

    fn quadratic_curve_to(&mut self, cpx: f32, cpy: f32, x: f32, y: f32) {
        self.with_target(|ctx| ctx.quadratic_curve_to(cpx, cpy, x, y));
    }

    fn bezier_curve_to(&mut self, cp1x: f32, cp1y: f32, cp2x: f32, cp2y: f32, x: f32, y: f32) {
        self.with_target(|ctx| ctx.bezier_curve_to(cp1x, cp1y, cp2x, cp2y, x, y));
    }

    fn rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
        self.with_target(|ctx| ctx.rect(x, y, width, height));
    }

    fn arc(&mut self, x: f32, y: f32, radius: f32, start: f32, end: f32, anticlockwise: bool) {
        self.with_target(|ctx| ctx.arc(x, y, radius, start, end, anticlockwise));
    }

    fn fill(&mut self) {
        self.with_target(|ctx| ctx.fill());
    }

    fn stroke(&mut self) {
        self.with_target(|ctx| ctx.stroke());
    }

    fn clip(&mut self) {
        self.with_target(|ctx| ctx.clip());
    }

    fn draw_image(&mut self, image: &Canvas, dx: f32, dy: f32) {
        self.with_target(|ctx| ctx.draw_image(image, dx, dy));
    }

    fn draw_image_scaled(&mut self, image: &Canvas, dx: f32, dy: f32, dw: f32, dh: f32) {
        self.with_target(|ctx| ctx.draw_image_scaled(image, dx, dy, dw, dh));
    }

    fn begin_layer(&mut self, filter: LayerFilter) -> Result<(), LayerError> {
        // Native layers nest inside the open shader layer.
        if !filter.is_shader() {
            if let Some(layer) = self.shim.layer_context_mut() {
                return layer.begin_layer(filter);
            }
        }
        self.shim.begin_layer(filter)
    }

    fn end_layer(&mut self) -> Result<(), LayerError> {
        if let Some(layer) = self.shim.layer_context_mut() {
            if layer.layer_depth() > 0 {
                return layer.end_layer();
            }
        }
        self.shim.end_layer()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context2d::SurfaceFilter;
    use crate::filter::FilterError;

    struct Identity;

    impl SurfaceFilter for Identity {
        fn apply_filter(&self, source: &Canvas) -> Result<Canvas, FilterError> {
            Ok(source.clone())
        }
    }

    fn context() -> CanvasShaderContext<CanvasRenderingContext2d> {
        CanvasShaderContext::new(CanvasRenderingContext2d::new(8, 8).unwrap())
    }

    #[test]
    fn test_calls_reach_real_context_without_layer() {
        let mut ctx = context();
        ctx.fill_rect(0.0, 0.0, 8.0, 8.0);
        assert_eq!(ctx.inner().canvas().pixel(0, 0), Some([0, 0, 0, 255]));
    }

    #[test]
    fn test_state_is_redirected_during_layer() {
        let mut ctx = context();
        ctx.set_line_width(3.0);

        ctx.begin_layer(LayerFilter::shader(Identity)).unwrap();
        assert_eq!(ctx.line_width(), 1.0);
        ctx.set_line_width(5.0);
        ctx.translate(2.0, 2.0);
        assert_eq!(ctx.layer_context().unwrap().line_width(), 5.0);
        assert_eq!(ctx.inner().line_width(), 3.0);
        assert_eq!(ctx.inner().get_transform(), Transform::identity());

        ctx.end_layer().unwrap();
        assert_eq!(ctx.line_width(), 3.0);
    }

    #[test]
    fn test_native_layer_inside_shader_layer() {
        let mut ctx = context();
        ctx.begin_layer(LayerFilter::shader(Identity)).unwrap();
        ctx.begin_layer(LayerFilter::native()).unwrap();
        assert_eq!(ctx.layer_context().unwrap().layer_depth(), 1);
        assert_eq!(ctx.inner().layer_depth(), 0);

        ctx.fill_rect(0.0, 0.0, 8.0, 8.0);

        // Closes the native layer, the shader layer stays open.
        ctx.end_layer().unwrap();
        assert!(ctx.is_layer_active());
        assert_eq!(ctx.layer_context().unwrap().layer_depth(), 0);
        assert_eq!(ctx.inner().canvas().pixel(0, 0), Some([0, 0, 0, 0]));

        ctx.end_layer().unwrap();
        assert!(!ctx.is_layer_active());
        assert_eq!(ctx.inner().canvas().pixel(0, 0), Some([0, 0, 0, 255]));
    }

    #[test]
    fn test_shader_layer_while_active_is_rejected() {
        let mut ctx = context();
        ctx.begin_layer(LayerFilter::shader(Identity)).unwrap();
        assert!(matches!(
            ctx.begin_layer(LayerFilter::shader(Identity)),
            Err(LayerError::NestedLayer)
        ));
        assert!(ctx.is_layer_active());
    }
}
