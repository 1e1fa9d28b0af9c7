//! The 2D drawing capability set.
//!
//! [`Context2d`] lists every operation a drawing context exposes. Plain
//! contexts, the layer shim and the forwarding context all implement it, so
//! user drawing code can be written once against `&mut dyn Context2d` (or a
//! generic bound) and run unchanged whether or not a layer is active.

use std::fmt;
use std::sync::Arc;

use tiny_skia::{Color, Transform};

use crate::filter::FilterError;
use crate::surface::{Canvas, CompositeOperation, SurfaceError};

/// A post-processing step applied to the pixels accumulated in a layer.
pub trait SurfaceFilter {
    /// Produce a new surface from `source`. The source is left untouched.
    fn apply_filter(&self, source: &Canvas) -> Result<Canvas, FilterError>;
}

/// Options for a plain (non-shader) layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerOptions {
    /// Extra opacity multiplied into the global alpha captured at `begin_layer`.
    pub opacity: f32,
    /// Composite operation used at `end_layer`; `None` keeps the one in effect at `begin_layer`.
    pub composite: Option<CompositeOperation>,
}

impl Default for LayerOptions {
    fn default() -> Self {
        Self {
            opacity: 1.0,
            composite: None,
        }
    }
}

/// Argument to [`Context2d::begin_layer`].
#[derive(Clone)]
pub enum LayerFilter {
    /// A plain layer handled by the context itself.
    Native(LayerOptions),
    /// A layer whose pixels go through a filter before compositing.
    Shader(Arc<dyn SurfaceFilter>),
}

impl LayerFilter {
    pub fn native() -> Self {
        Self::Native(LayerOptions::default())
    }

    pub fn shader(filter: impl SurfaceFilter + 'static) -> Self {
        Self::Shader(Arc::new(filter))
    }

    pub fn is_shader(&self) -> bool {
        matches!(self, Self::Shader(_))
    }
}

impl Default for LayerFilter {
    fn default() -> Self {
        Self::native()
    }
}

impl fmt::Debug for LayerFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native(options) => f.debug_tuple("Native").field(options).finish(),
            Self::Shader(_) => f.write_str("Shader(..)"),
        }
    }
}

/// Errors raised by `begin_layer`/`end_layer`.
#[derive(Debug, thiserror::Error)]
pub enum LayerError {
    #[error("A shader layer is already active on this context")]
    NestedLayer,
    #[error("Shader filters require a context wrapped in a layer shim")]
    UnsupportedFilter,
    #[error("Filter error: {0}")]
    Filter(#[from] FilterError),
    #[error("Surface error: {0}")]
    Surface(#[from] SurfaceError),
}

/// Every 2D drawing operation the layer machinery needs to forward.
///
/// Angles are in radians. Setters silently ignore non-finite or
/// out-of-range values, as canvas property setters do.
pub trait Context2d {
    /// The surface currently receiving drawing.
    fn canvas(&self) -> &Canvas;

    fn width(&self) -> u32 {
        self.canvas().width()
    }

    fn height(&self) -> u32 {
        self.canvas().height()
    }

    fn save(&mut self);
    fn restore(&mut self);

    fn translate(&mut self, x: f32, y: f32);
    fn scale(&mut self, x: f32, y: f32);
    fn rotate(&mut self, angle: f32);
    fn transform(&mut self, a: f32, b: f32, c: f32, d: f32, e: f32, f: f32);
    fn set_transform(&mut self, transform: Transform);
    fn get_transform(&self) -> Transform;
    fn reset_transform(&mut self);

    fn global_alpha(&self) -> f32;
    fn set_global_alpha(&mut self, alpha: f32);
    fn global_composite_operation(&self) -> CompositeOperation;
    fn set_global_composite_operation(&mut self, op: CompositeOperation);

    fn fill_style(&self) -> Color;
    fn set_fill_style(&mut self, color: Color);
    fn stroke_style(&self) -> Color;
    fn set_stroke_style(&mut self, color: Color);
    fn line_width(&self) -> f32;
    fn set_line_width(&mut self, width: f32);

    fn clear_rect(&mut self, x: f32, y: f32, width: f32, height: f32);
    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32);
    fn stroke_rect(&mut self, x: f32, y: f32, width: f32, height: f32);

    fn begin_path(&mut self);
    fn close_path(&mut self);
    fn move_to(&mut self, x: f32, y: f32);
    fn line_to(&mut self, x: f32, y: f32);
    fn quadratic_curve_to(&mut self, cpx: f32, cpy: f32, x: f32, y: f32);
    fn bezier_curve_to(&mut self, cp1x: f32, cp1y: f32, cp2x: f32, cp2y: f32, x: f32, y: f32);
    fn rect(&mut self, x: f32, y: f32, width: f32, height: f32);
    fn arc(&mut self, x: f32, y: f32, radius: f32, start: f32, end: f32, anticlockwise: bool);
    fn fill(&mut self);
    fn stroke(&mut self);
    fn clip(&mut self);

    /// Draw `image` at its natural size with its top-left corner at `(dx, dy)`.
    fn draw_image(&mut self, image: &Canvas, dx: f32, dy: f32);
    /// Draw `image` scaled into the `dw`x`dh` box at `(dx, dy)`.
    fn draw_image_scaled(&mut self, image: &Canvas, dx: f32, dy: f32, dw: f32, dh: f32);

    fn begin_layer(&mut self, filter: LayerFilter) -> Result<(), LayerError>;
    fn end_layer(&mut self) -> Result<(), LayerError>;
}
