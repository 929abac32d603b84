//! Draw operation execution
//!
//! [`Painter`] turns fills, strokes and paints into coverage spans and
//! composites the sampled source into a [`TargetView`]. One painter
//! serves one worker; its rasterizer buffers and gradient cache are reused
//! across operations.

use ctx_core::state::DEVICE_TOLERANCE;
use ctx_core::{Antialias, FillRule, GraphicsState, PathSegment, Rect};

use crate::buffer::TargetView;
use crate::composite::{premultiply, CompositeOp, Rgba};
use crate::format::PixelFormatOps;
use crate::gradient::GradientCache;
use crate::rasterizer::{fill_aligned_rect, Rasterizer, SpanSink};
use crate::sampler::{Sampler, TextureLookup};
use crate::stroke::{aligned_rect_frame, stroke_polygons, StrokeParams};

/// Span sink sampling a source and compositing into a target
struct SpanPainter<'p, 't> {
    target: &'p mut TargetView<'t>,
    ops: &'static dyn PixelFormatOps,
    sampler: &'p Sampler<'p>,
    op: CompositeOp,
    src: &'p mut Vec<Rgba>,
    scratch: &'p mut Vec<Rgba>,
}

impl SpanSink for SpanPainter<'_, '_> {
    fn span(&mut self, y: i32, x0: i32, x1: i32, coverage: u8) {
        let bounds = self.target.bounds();
        let (x0, x1) = (x0.max(bounds.x0), x1.min(bounds.x1));
        if x1 <= x0 {
            return;
        }
        let Some(row) = self.target.row_mut(y) else {
            return;
        };
        let n = (x1 - x0) as usize;
        self.src.resize(n, [0; 4]);
        self.sampler.fill_span(x0, y, &mut self.src[..n]);
        let column = (x0 - bounds.x0) as usize;
        self.ops
            .apply_coverage(row, column, &self.src[..n], coverage, &self.op, self.scratch);
    }
}

/// Per-worker executor for pixel-producing operations
pub struct Painter {
    rasterizer: Rasterizer,
    gradients: GradientCache,
    src: Vec<Rgba>,
    scratch: Vec<Rgba>,
}

impl Painter {
    pub fn new(edge_capacity: usize, antialias: Antialias, gradient_cache: usize) -> Self {
        Self {
            rasterizer: Rasterizer::new(edge_capacity, antialias),
            gradients: GradientCache::new(gradient_cache),
            src: Vec::new(),
            scratch: Vec::new(),
        }
    }

    pub fn antialias(&self) -> Antialias {
        self.rasterizer.antialias()
    }

    pub fn set_antialias(&mut self, antialias: Antialias) {
        self.rasterizer.set_antialias(antialias);
    }

    pub fn gradient_cache(&self) -> &GradientCache {
        &self.gradients
    }

    fn composite_op(state: &GraphicsState) -> CompositeOp {
        CompositeOp::new(state.compositing, state.blend, state.global_alpha_u8())
    }

    /// Fill `path` with the fill source. Returns false if the edge table
    /// overflowed.
    pub fn fill(
        &mut self,
        target: &mut TargetView<'_>,
        path: &[PathSegment],
        state: &GraphicsState,
        textures: &dyn TextureLookup,
    ) -> bool {
        let clip = state.clip.intersect(&target.bounds());
        if clip.is_empty() || path.is_empty() {
            return true;
        }
        let sampler = Sampler::new(
            &state.fill_source,
            state.extend,
            state.image_smoothing(),
            textures,
            &mut self.gradients,
        );
        let mut sink = SpanPainter {
            ops: target.ops(),
            target,
            sampler: &sampler,
            op: Self::composite_op(state),
            src: &mut self.src,
            scratch: &mut self.scratch,
        };
        self.rasterizer
            .fill_path(path, state.fill_rule, DEVICE_TOLERANCE, clip, &mut sink)
    }

    /// Stroke `path` with the stroke source and line style
    pub fn stroke(
        &mut self,
        target: &mut TargetView<'_>,
        path: &[PathSegment],
        state: &GraphicsState,
        textures: &dyn TextureLookup,
    ) -> bool {
        let clip = state.clip.intersect(&target.bounds());
        if clip.is_empty() || path.is_empty() {
            return true;
        }
        let params = StrokeParams::new(&state.line, state.transform().scale_factor(), DEVICE_TOLERANCE);
        let sampler = Sampler::new(
            &state.stroke_source,
            state.extend,
            state.image_smoothing(),
            textures,
            &mut self.gradients,
        );
        let mut sink = SpanPainter {
            ops: target.ops(),
            target,
            sampler: &sampler,
            op: Self::composite_op(state),
            src: &mut self.src,
            scratch: &mut self.scratch,
        };

        if let Some((outer, inner)) = aligned_rect_frame(path, &params) {
            let bands = [
                Rect::new(outer.x, outer.y, outer.width, inner.y - outer.y),
                Rect::new(outer.x, inner.max_y(), outer.width, outer.max_y() - inner.max_y()),
                Rect::new(outer.x, inner.y, inner.x - outer.x, inner.height),
                Rect::new(inner.max_x(), inner.y, outer.max_x() - inner.max_x(), inner.height),
            ];
            for band in &bands {
                fill_aligned_rect(band, clip, &mut sink);
            }
            return true;
        }

        self.rasterizer.begin(clip);
        let table = self.rasterizer.table_mut();
        stroke_polygons(path, &params, &mut |polygon| table.add_polygon(polygon));
        self.rasterizer.sweep(FillRule::Winding, clip, &mut sink)
    }

    /// Cover the whole clip region with the fill source
    pub fn paint(&mut self, target: &mut TargetView<'_>, state: &GraphicsState, textures: &dyn TextureLookup) {
        let clip = state.clip.intersect(&target.bounds());
        if clip.is_empty() {
            return;
        }
        let sampler = Sampler::new(
            &state.fill_source,
            state.extend,
            state.image_smoothing(),
            textures,
            &mut self.gradients,
        );
        let mut sink = SpanPainter {
            ops: target.ops(),
            target,
            sampler: &sampler,
            op: Self::composite_op(state),
            src: &mut self.src,
            scratch: &mut self.scratch,
        };
        for y in clip.y0..clip.y1 {
            sink.span(y, clip.x0, clip.x1, 255);
        }
    }

    /// Overwrite one pixel with a straight-alpha color, bypassing
    /// compositing and clipping
    pub fn set_pixel(target: &mut TargetView<'_>, x: u16, y: u16, rgba: [u8; 4]) {
        let bounds = target.bounds();
        let (x, y) = (x as i32, y as i32);
        if !bounds.contains(x, y) {
            return;
        }
        let ops = target.ops();
        if let Some(row) = target.row_mut(y) {
            ops.from_working(&[premultiply(rgba)], row, (x - bounds.x0) as usize);
        }
    }
}
