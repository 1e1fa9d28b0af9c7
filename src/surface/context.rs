//! Software 2D drawing context.

use std::f32::consts::TAU;
use std::fmt;

use tiny_skia::{
    BlendMode, Color, FillRule, FilterQuality, Mask, Paint, Path, PathBuilder, PixmapPaint, Point,
    Rect, Stroke, Transform,
};

use super::{Canvas, CompositeOperation, SurfaceError};
use crate::context2d::{Context2d, LayerError, LayerFilter};
use crate::gpu::{bridge, GpuContext, GpuError};

/// Segments used for a full circle when flattening arcs.
const ARC_SEGMENTS_PER_TURN: f32 = 64.0;

/// Everything `save`/`restore` snapshots.
#[derive(Clone)]
struct DrawState {
    transform: Transform,
    fill_style: Color,
    stroke_style: Color,
    line_width: f32,
    global_alpha: f32,
    composite: CompositeOperation,
    clip: Option<Mask>,
}

impl Default for DrawState {
    fn default() -> Self {
        Self {
            transform: Transform::identity(),
            fill_style: Color::BLACK,
            stroke_style: Color::BLACK,
            line_width: 1.0,
            global_alpha: 1.0,
            composite: CompositeOperation::SourceOver,
            clip: None,
        }
    }
}

/// Path segments are stored in device space: the transform in effect when a
/// point is added is applied right away, as canvas paths do.
#[derive(Debug, Clone, Copy)]
enum PathSegment {
    MoveTo(Point),
    LineTo(Point),
    QuadTo(Point, Point),
    CubicTo(Point, Point, Point),
    Close,
}

/// A native layer opened with `begin_layer`.
struct NativeLayerFrame {
    parent: Canvas,
    alpha: f32,
    composite: CompositeOperation,
    /// State stack depth right after the layer's implicit `save`.
    stack_depth: usize,
}

/// A 2D drawing context that owns its [`Canvas`].
pub struct CanvasRenderingContext2d {
    canvas: Canvas,
    state: DrawState,
    stack: Vec<DrawState>,
    path: Vec<PathSegment>,
    layers: Vec<NativeLayerFrame>,
}

impl CanvasRenderingContext2d {
    /// Create a context over a new transparent surface.
    pub fn new(width: u32, height: u32) -> Result<Self, SurfaceError> {
        Ok(Self::from_canvas(Canvas::new(width, height)?))
    }

    /// Create a context drawing into an existing surface.
    pub fn from_canvas(canvas: Canvas) -> Self {
        Self {
            canvas,
            state: DrawState::default(),
            stack: Vec::new(),
            path: Vec::new(),
            layers: Vec::new(),
        }
    }

    /// Consume the context, returning the surface. Open native layers are discarded.
    pub fn into_canvas(mut self) -> Canvas {
        if self.layers.is_empty() {
            self.canvas
        } else {
            self.layers.swap_remove(0).parent
        }
    }

    /// Number of native layers currently open.
    pub fn layer_depth(&self) -> usize {
        self.layers.len()
    }

    /// Pixel format used when this surface is moved onto the GPU.
    pub fn texture_format(&self) -> wgpu::TextureFormat {
        bridge::INTEROP_FORMAT
    }

    /// Copy the current surface contents into a new GPU texture.
    pub fn transfer_to_gpu_texture(&self, gpu: &GpuContext) -> Result<wgpu::Texture, GpuError> {
        bridge::transfer_to_gpu_texture(gpu, &self.canvas)
    }

    /// Replace the surface contents with `texture`, consuming (and destroying) it.
    pub fn transfer_back_from_gpu_texture(
        &mut self,
        gpu: &GpuContext,
        texture: wgpu::Texture,
    ) -> Result<(), GpuError> {
        bridge::transfer_back_from_gpu_texture(gpu, texture, self)
    }

    fn paint(&self, color: Color) -> Paint<'static> {
        let mut color = color;
        color.apply_opacity(self.state.global_alpha);
        let mut paint = Paint::default();
        paint.set_color(color);
        paint.anti_alias = true;
        paint.blend_mode = self.state.composite.blend_mode();
        paint
    }

    fn pixmap_paint(&self, quality: FilterQuality) -> PixmapPaint {
        PixmapPaint {
            opacity: self.state.global_alpha,
            blend_mode: self.state.composite.blend_mode(),
            quality,
        }
    }

    fn map_point(&self, x: f32, y: f32) -> Point {
        let mut points = [Point::from_xy(x, y)];
        self.state.transform.map_points(&mut points);
        points[0]
    }

    fn push_point(&mut self, x: f32, y: f32) {
        let point = self.map_point(x, y);
        if self.path.is_empty() {
            self.path.push(PathSegment::MoveTo(point));
        } else {
            self.path.push(PathSegment::LineTo(point));
        }
    }

    fn build_path(&self) -> Option<Path> {
        let mut builder = PathBuilder::new();
        for segment in &self.path {
            match *segment {
                PathSegment::MoveTo(p) => builder.move_to(p.x, p.y),
                PathSegment::LineTo(p) => builder.line_to(p.x, p.y),
                PathSegment::QuadTo(c, p) => builder.quad_to(c.x, c.y, p.x, p.y),
                PathSegment::CubicTo(c1, c2, p) => {
                    builder.cubic_to(c1.x, c1.y, c2.x, c2.y, p.x, p.y)
                }
                PathSegment::Close => builder.close(),
            }
        }
        builder.finish()
    }

    /// Uniform scale of the current transform, used to size strokes on
    /// paths that are already in device space.
    fn transform_scale(&self) -> f32 {
        let t = self.state.transform;
        (t.sx * t.sy - t.kx * t.ky).abs().sqrt()
    }

    fn stroke_style_for(&self, width: f32) -> Stroke {
        Stroke {
            width,
            ..Default::default()
        }
    }

    fn restore_floor(&self) -> usize {
        self.layers.last().map_or(0, |frame| frame.stack_depth)
    }
}

impl fmt::Debug for CanvasRenderingContext2d {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CanvasRenderingContext2d")
            .field("width", &self.canvas.width())
            .field("height", &self.canvas.height())
            .field("saved_states", &self.stack.len())
            .field("layer_depth", &self.layers.len())
            .finish_non_exhaustive()
    }
}

fn normalized_rect(x: f32, y: f32, width: f32, height: f32) -> Option<Rect> {
    let (x2, y2) = (x + width, y + height);
    Rect::from_ltrb(x.min(x2), y.min(y2), x.max(x2), y.max(y2))
}

fn all_finite(values: &[f32]) -> bool {
    values.iter().all(|v| v.is_finite())
}

impl Context2d for CanvasRenderingContext2d {
    fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    fn save(&mut self) {
        self.stack.push(self.state.clone());
    }

    fn restore(&mut self) {
        if self.stack.len() > self.restore_floor() {
            if let Some(state) = self.stack.pop() {
                self.state = state;
            }
        }
    }

    fn translate(&mut self, x: f32, y: f32) {
        if all_finite(&[x, y]) {
            self.state.transform = self.state.transform.pre_translate(x, y);
        }
    }

    fn scale(&mut self, x: f32, y: f32) {
        if all_finite(&[x, y]) {
            self.state.transform = self.state.transform.pre_scale(x, y);
        }
    }

    fn rotate(&mut self, angle: f32) {
        if angle.is_finite() {
            let rotation = Transform::from_rotate(angle.to_degrees());
            self.state.transform = self.state.transform.pre_concat(rotation);
        }
    }

    fn transform(&mut self, a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) {
        if all_finite(&[a, b, c, d, e, f]) {
            let matrix = Transform::from_row(a, b, c, d, e, f);
            self.state.transform = self.state.transform.pre_concat(matrix);
        }
    }

    fn set_transform(&mut self, transform: Transform) {
        if transform.is_finite() {
            self.state.transform = transform;
        }
    }

    fn get_transform(&self) -> Transform {
        self.state.transform
    }

    fn reset_transform(&mut self) {
        self.state.transform = Transform::identity();
    }

    fn global_alpha(&self) -> f32 {
        self.state.global_alpha
    }

    fn set_global_alpha(&mut self, alpha: f32) {
        if (0.0..=1.0).contains(&alpha) {
            self.state.global_alpha = alpha;
        }
    }

    fn global_composite_operation(&self) -> CompositeOperation {
        self.state.composite
    }

    fn set_global_composite_operation(&mut self, op: CompositeOperation) {
        self.state.composite = op;
    }

    fn fill_style(&self) -> Color {
        self.state.fill_style
    }

    fn set_fill_style(&mut self, color: Color) {
        self.state.fill_style = color;
    }

    fn stroke_style(&self) -> Color {
        self.state.stroke_style
    }

    fn set_stroke_style(&mut self, color: Color) {
        self.state.stroke_style = color;
    }

    fn line_width(&self) -> f32 {
        self.state.line_width
    }

    fn set_line_width(&mut self, width: f32) {
        if width.is_finite() && width > 0.0 {
            self.state.line_width = width;
        }
    }

    fn clear_rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
        let Some(rect) = normalized_rect(x, y, width, height) else {
            return;
        };
        let mut paint = Paint::default();
        paint.blend_mode = BlendMode::Clear;
        self.canvas.pixmap_mut().fill_rect(
            rect,
            &paint,
            self.state.transform,
            self.state.clip.as_ref(),
        );
    }

    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
        let Some(rect) = normalized_rect(x, y, width, height) else {
            return;
        };
        let paint = self.paint(self.state.fill_style);
        self.canvas.pixmap_mut().fill_rect(
            rect,
            &paint,
            self.state.transform,
            self.state.clip.as_ref(),
        );
    }

    fn stroke_rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
        let Some(rect) = normalized_rect(x, y, width, height) else {
            return;
        };
        let path = PathBuilder::from_rect(rect);
        let paint = self.paint(self.state.stroke_style);
        let stroke = self.stroke_style_for(self.state.line_width);
        self.canvas.pixmap_mut().stroke_path(
            &path,
            &paint,
            &stroke,
            self.state.transform,
            self.state.clip.as_ref(),
        );
    }

    fn begin_path(&mut self) {
        self.path.clear();
    }

    fn close_path(&mut self) {
        if !self.path.is_empty() {
            self.path.push(PathSegment::Close);
        }
    }

    fn move_to(&mut self, x: f32, y: f32) {
        if all_finite(&[x, y]) {
            let point = self.map_point(x, y);
            self.path.push(PathSegment::MoveTo(point));
        }
    }

    fn line_to(&mut self, x: f32, y: f32) {
        if all_finite(&[x, y]) {
            self.push_point(x, y);
        }
    }

    fn quadratic_curve_to(&mut self, cpx: f32, cpy: f32, x: f32, y: f32) {
        if !all_finite(&[cpx, cpy, x, y]) {
            return;
        }
        if self.path.is_empty() {
            self.push_point(cpx, cpy);
        }
        let control = self.map_point(cpx, cpy);
        let end = self.map_point(x, y);
        self.path.push(PathSegment::QuadTo(control, end));
    }

    fn bezier_curve_to(&mut self, cp1x: f32, cp1y: f32, cp2x: f32, cp2y: f32, x: f32, y: f32) {
        if !all_finite(&[cp1x, cp1y, cp2x, cp2y, x, y]) {
            return;
        }
        if self.path.is_empty() {
            self.push_point(cp1x, cp1y);
        }
        let c1 = self.map_point(cp1x, cp1y);
        let c2 = self.map_point(cp2x, cp2y);
        let end = self.map_point(x, y);
        self.path.push(PathSegment::CubicTo(c1, c2, end));
    }

    fn rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
        if !all_finite(&[x, y, width, height]) {
            return;
        }
        let corners = [
            self.map_point(x, y),
            self.map_point(x + width, y),
            self.map_point(x + width, y + height),
            self.map_point(x, y + height),
        ];
        self.path.push(PathSegment::MoveTo(corners[0]));
        for corner in &corners[1..] {
            self.path.push(PathSegment::LineTo(*corner));
        }
        self.path.push(PathSegment::Close);
    }

    fn arc(&mut self, x: f32, y: f32, radius: f32, start: f32, end: f32, anticlockwise: bool) {
        if !all_finite(&[x, y, radius, start, end]) || radius < 0.0 {
            log::debug!("arc ignored: invalid arguments");
            return;
        }

        let sweep = if anticlockwise {
            let delta = start - end;
            if delta >= TAU {
                -TAU
            } else {
                -delta.rem_euclid(TAU)
            }
        } else {
            let delta = end - start;
            if delta >= TAU {
                TAU
            } else {
                delta.rem_euclid(TAU)
            }
        };

        let segments = ((sweep.abs() / TAU) * ARC_SEGMENTS_PER_TURN).ceil().max(1.0) as usize;
        for i in 0..=segments {
            let angle = start + sweep * (i as f32 / segments as f32);
            self.push_point(x + radius * angle.cos(), y + radius * angle.sin());
        }
    }

    fn fill(&mut self) {
        let Some(path) = self.build_path() else {
            return;
        };
        let paint = self.paint(self.state.fill_style);
        self.canvas.pixmap_mut().fill_path(
            &path,
            &paint,
            FillRule::Winding,
            Transform::identity(),
            self.state.clip.as_ref(),
        );
    }

    fn stroke(&mut self) {
        let Some(path) = self.build_path() else {
            return;
        };
        let paint = self.paint(self.state.stroke_style);
        let stroke = self.stroke_style_for(self.state.line_width * self.transform_scale());
        self.canvas.pixmap_mut().stroke_path(
            &path,
            &paint,
            &stroke,
            Transform::identity(),
            self.state.clip.as_ref(),
        );
    }

    fn clip(&mut self) {
        let path = self.build_path();

        if let Some(mask) = self.state.clip.as_mut() {
            match path {
                Some(path) => {
                    mask.intersect_path(&path, FillRule::Winding, true, Transform::identity())
                }
                None => mask.data_mut().fill(0),
            }
            return;
        }

        // A fresh mask starts empty, so an empty path clips everything away.
        let Some(mut mask) = Mask::new(self.canvas.width(), self.canvas.height()) else {
            return;
        };
        if let Some(path) = path {
            mask.fill_path(&path, FillRule::Winding, true, Transform::identity());
        }
        self.state.clip = Some(mask);
    }

    fn draw_image(&mut self, image: &Canvas, dx: f32, dy: f32) {
        if !all_finite(&[dx, dy]) {
            return;
        }
        let paint = self.pixmap_paint(FilterQuality::Nearest);
        let transform = self.state.transform.pre_translate(dx, dy);
        self.canvas.pixmap_mut().draw_pixmap(
            0,
            0,
            image.pixmap().as_ref(),
            &paint,
            transform,
            self.state.clip.as_ref(),
        );
    }

    fn draw_image_scaled(&mut self, image: &Canvas, dx: f32, dy: f32, dw: f32, dh: f32) {
        if !all_finite(&[dx, dy, dw, dh]) || dw == 0.0 || dh == 0.0 {
            return;
        }
        let sx = dw / image.width() as f32;
        let sy = dh / image.height() as f32;
        let quality = if sx == 1.0 && sy == 1.0 {
            FilterQuality::Nearest
        } else {
            FilterQuality::Bilinear
        };
        let paint = self.pixmap_paint(quality);
        let transform = self.state.transform.pre_translate(dx, dy).pre_scale(sx, sy);
        self.canvas.pixmap_mut().draw_pixmap(
            0,
            0,
            image.pixmap().as_ref(),
            &paint,
            transform,
            self.state.clip.as_ref(),
        );
    }

    fn begin_layer(&mut self, filter: LayerFilter) -> Result<(), LayerError> {
        let options = match filter {
            LayerFilter::Native(options) => options,
            LayerFilter::Shader(_) => {
                log::warn!("Shader layer requested on a context without a layer shim");
                return Err(LayerError::UnsupportedFilter);
            }
        };

        let fresh = Canvas::new(self.canvas.width(), self.canvas.height())?;
        let alpha = self.state.global_alpha * options.opacity.clamp(0.0, 1.0);
        let composite = options.composite.unwrap_or(self.state.composite);

        self.save();
        let parent = std::mem::replace(&mut self.canvas, fresh);
        self.layers.push(NativeLayerFrame {
            parent,
            alpha,
            composite,
            stack_depth: self.stack.len(),
        });
        self.state.global_alpha = 1.0;
        self.state.composite = CompositeOperation::SourceOver;
        log::debug!("Native layer opened (depth {})", self.layers.len());
        Ok(())
    }

    fn end_layer(&mut self) -> Result<(), LayerError> {
        let Some(frame) = self.layers.pop() else {
            log::debug!("end_layer without an open layer, ignoring");
            return Ok(());
        };

        let layer = std::mem::replace(&mut self.canvas, frame.parent);
        // Unbalanced saves made inside the layer are dropped with it.
        self.stack.truncate(frame.stack_depth);
        self.restore();

        let paint = PixmapPaint {
            opacity: frame.alpha,
            blend_mode: frame.composite.blend_mode(),
            quality: FilterQuality::Nearest,
        };
        self.canvas.pixmap_mut().draw_pixmap(
            0,
            0,
            layer.pixmap().as_ref(),
            &paint,
            Transform::identity(),
            self.state.clip.as_ref(),
        );
        log::debug!("Native layer closed (depth {})", self.layers.len());
        Ok(())
    }
}
