//! Scanline rasterizer
//!
//! Sweeps the edge table one sub-scanline at a time, keeping an active edge
//! list sorted by x. Each sub-scanline contributes exact horizontal
//! coverage in 1/256 pixel units to a row accumulator; after the last
//! sub-scanline of a pixel row the accumulator is scaled so a fully covered
//! pixel reaches exactly 255, and coalesced runs of equal coverage go to a
//! [`SpanSink`].
//!
//! With [`Antialias::None`] there is a single sub-scanline and a pixel is
//! covered when its center lies inside a span.

use ctx_core::{Antialias, FillRule, IntRect, PathSegment, Point, Rect};

use crate::edge::{EdgeTable, EDGE_SHIFT};

/// Receives coverage spans. The sweep delivers rows top to bottom; fast
/// paths may deliver several runs of rows.
pub trait SpanSink {
    /// Pixels `x0..x1` of row `y` have coverage `coverage`
    fn span(&mut self, y: i32, x0: i32, x1: i32, coverage: u8);
}

#[derive(Clone, Copy, Debug)]
struct Active {
    x: i64,
    dx: i64,
    bottom: i32,
    winding: i8,
}

/// Reusable rasterizer state
pub struct Rasterizer {
    table: EdgeTable,
    antialias: Antialias,
    active: Vec<Active>,
    /// Partial coverage per pixel
    cover: Vec<i32>,
    /// Difference array of full-pixel runs
    run: Vec<i32>,
}

impl Rasterizer {
    pub fn new(edge_capacity: usize, antialias: Antialias) -> Self {
        Self {
            table: EdgeTable::new(edge_capacity),
            antialias,
            active: Vec::new(),
            cover: Vec::new(),
            run: Vec::new(),
        }
    }

    pub fn antialias(&self) -> Antialias {
        self.antialias
    }

    pub fn set_antialias(&mut self, antialias: Antialias) {
        self.antialias = antialias;
    }

    /// Start collecting edges for a fill limited to `clip`
    pub fn begin(&mut self, clip: IntRect) {
        self.table.reset(self.antialias.samples(), clip);
    }

    pub fn table_mut(&mut self) -> &mut EdgeTable {
        &mut self.table
    }

    /// Fill a device-space path. Returns false if the edge table overflowed
    /// and part of the path was dropped.
    pub fn fill_path(
        &mut self,
        path: &[PathSegment],
        rule: FillRule,
        tolerance: f32,
        clip: IntRect,
        sink: &mut impl SpanSink,
    ) -> bool {
        if clip.is_empty() {
            return true;
        }
        if let Some(rect) = axis_aligned_rect(path) {
            if fill_aligned_rect(&rect, clip, sink) {
                return true;
            }
        }
        self.begin(clip);
        self.table.add_path(path, tolerance);
        self.sweep(rule, clip, sink)
    }

    /// Fill the polygons collected since [`Rasterizer::begin`]
    pub fn sweep(&mut self, rule: FillRule, clip: IntRect, sink: &mut impl SpanSink) -> bool {
        let ok = !self.table.overflowed();
        if self.table.is_empty() || clip.is_empty() {
            return ok;
        }
        self.table.sort();

        let samples = self.table.samples() as i32;
        let width = clip.width() as usize;
        self.cover.clear();
        self.cover.resize(width + 2, 0);
        self.run.clear();
        self.run.resize(width + 2, 0);
        self.active.clear();

        let edges = self.table.edges();
        let first = edges[0].top;
        let last = edges.iter().map(|e| e.bottom).max().unwrap_or(first);
        let row_start = first.div_euclid(samples);
        let row_end = (last + samples - 1).div_euclid(samples);

        let full = 256 * samples;
        let mut next = 0;
        for y in row_start..row_end {
            let mut touched = false;
            for s in 0..samples {
                let k = y * samples + s;
                while next < edges.len() && edges[next].top <= k {
                    let e = &edges[next];
                    self.active.push(Active {
                        x: e.x,
                        dx: e.dx,
                        bottom: e.bottom,
                        winding: e.winding,
                    });
                    next += 1;
                }
                self.active.retain(|a| a.bottom > k);
                if self.active.is_empty() {
                    continue;
                }
                insertion_sort(&mut self.active);
                touched |= accumulate(
                    &self.active,
                    rule,
                    clip,
                    samples == 1,
                    &mut self.cover,
                    &mut self.run,
                );
                for a in &mut self.active {
                    a.x = a.x.saturating_add(a.dx);
                }
            }
            if touched {
                emit_row(y, clip.x0, width, full, &mut self.cover, &mut self.run, sink);
            }
            if next >= edges.len() && self.active.is_empty() {
                break;
            }
        }
        self.active.clear();
        ok
    }
}

fn insertion_sort(active: &mut [Active]) {
    for i in 1..active.len() {
        let mut j = i;
        while j > 0 && active[j - 1].x > active[j].x {
            active.swap(j - 1, j);
            j -= 1;
        }
    }
}

#[inline]
fn inside(rule: FillRule, winding: i32) -> bool {
    match rule {
        FillRule::Winding => winding != 0,
        FillRule::EvenOdd => winding & 1 != 0,
    }
}

/// Add one sub-scanline's spans to the row accumulator
fn accumulate(
    active: &[Active],
    rule: FillRule,
    clip: IntRect,
    aliased: bool,
    cover: &mut [i32],
    run: &mut [i32],
) -> bool {
    let limit = (clip.width() as i64) << 8;
    let origin = (clip.x0 as i64) << 8;
    let to_sub = |x: i64| ((x >> (EDGE_SHIFT - 8)) - origin).clamp(0, limit);

    let mut touched = false;
    let mut winding = 0i32;
    let mut start = 0i64;
    for a in active {
        let was = inside(rule, winding);
        winding += a.winding as i32;
        let now = inside(rule, winding);
        if !was && now {
            start = a.x;
        } else if was && !now {
            let (xa, xb) = (to_sub(start), to_sub(a.x));
            if xb <= xa {
                continue;
            }
            touched = true;
            if aliased {
                let ia = ((xa + 127) >> 8) as usize;
                let ib = ((xb + 127) >> 8) as usize;
                if ib > ia {
                    run[ia] += 256;
                    run[ib] -= 256;
                }
                continue;
            }
            let (ia, ib) = ((xa >> 8) as usize, (xb >> 8) as usize);
            let (fa, fb) = ((xa & 0xff) as i32, (xb & 0xff) as i32);
            if ia == ib {
                cover[ia] += fb - fa;
            } else {
                cover[ia] += 256 - fa;
                run[ia + 1] += 256;
                run[ib] -= 256;
                cover[ib] += fb;
            }
        }
    }
    touched
}

/// Resolve the row accumulator into coalesced spans and clear it
fn emit_row(
    y: i32,
    x0: i32,
    width: usize,
    full: i32,
    cover: &mut [i32],
    run: &mut [i32],
    sink: &mut impl SpanSink,
) {
    let mut running = 0;
    let mut span_start = 0usize;
    let mut span_alpha = 0u8;
    for i in 0..=width {
        let alpha = if i < width {
            running += run[i];
            let c = (running + cover[i]).clamp(0, full);
            ((c * 255 + full / 2) / full) as u8
        } else {
            0
        };
        if alpha != span_alpha {
            if span_alpha != 0 {
                sink.span(y, x0 + span_start as i32, x0 + i as i32, span_alpha);
            }
            span_start = i;
            span_alpha = alpha;
        }
    }
    cover.fill(0);
    run.fill(0);
}

/// The rectangle a path traces, if it is a single axis-aligned rectangle
pub fn axis_aligned_rect(path: &[PathSegment]) -> Option<Rect> {
    let mut points: [Point; 5] = [Point::ZERO; 5];
    let mut n = 0;
    for (i, segment) in path.iter().enumerate() {
        match (i, segment) {
            (0, PathSegment::MoveTo(p)) => {
                points[0] = *p;
                n = 1;
            }
            (_, PathSegment::LineTo(p)) if i > 0 && n < 5 => {
                points[n] = *p;
                n += 1;
            }
            (_, PathSegment::Close) if i == path.len() - 1 => {}
            _ => return None,
        }
    }
    if n == 5 && points[4] == points[0] {
        n = 4;
    }
    if n != 4 {
        return None;
    }

    let horizontal_first = points[0].y == points[1].y;
    for i in 0..4 {
        let (a, b) = (points[i], points[(i + 1) % 4]);
        let horizontal = (i % 2 == 0) == horizontal_first;
        let ok = if horizontal {
            a.y == b.y && a.x != b.x
        } else {
            a.x == b.x && a.y != b.y
        };
        if !ok {
            return None;
        }
    }
    Some(Rect::from_corners(points[0], points[2]))
}

/// Emit a rectangle whose edges lie on pixel boundaries directly. Returns
/// false when the rectangle is not pixel aligned.
pub fn fill_aligned_rect(rect: &Rect, clip: IntRect, sink: &mut impl SpanSink) -> bool {
    let edges = [rect.x, rect.y, rect.max_x(), rect.max_y()];
    if edges.iter().any(|v| v.fract() != 0.0 || v.abs() > i32::MAX as f32 / 2.0) {
        return false;
    }
    let r = IntRect::new(edges[0] as i32, edges[1] as i32, edges[2] as i32, edges[3] as i32).intersect(&clip);
    if r.is_empty() {
        return true;
    }
    for y in r.y0..r.y1 {
        sink.span(y, r.x0, r.x1, 255);
    }
    true
}

/// Collects spans into a coverage grid; used by tests and hit testing
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoverageMask {
    pub bounds: IntRect,
    pub data: Vec<u8>,
}

impl CoverageMask {
    pub fn new(bounds: IntRect) -> Self {
        Self {
            bounds,
            data: vec![0; (bounds.width() * bounds.height()) as usize],
        }
    }

    pub fn get(&self, x: i32, y: i32) -> u8 {
        if !self.bounds.contains(x, y) {
            return 0;
        }
        let w = self.bounds.width();
        self.data[((y - self.bounds.y0) * w + (x - self.bounds.x0)) as usize]
    }

    /// Total coverage, in pixels
    pub fn area(&self) -> f32 {
        self.data.iter().map(|&c| c as f32 / 255.0).sum()
    }
}

impl SpanSink for CoverageMask {
    fn span(&mut self, y: i32, x0: i32, x1: i32, coverage: u8) {
        let w = self.bounds.width();
        for x in x0.max(self.bounds.x0)..x1.min(self.bounds.x1) {
            if self.bounds.contains(x, y) {
                let i = ((y - self.bounds.y0) * w + (x - self.bounds.x0)) as usize;
                self.data[i] = self.data[i].max(coverage);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect_path(x: f32, y: f32, w: f32, h: f32) -> Vec<PathSegment> {
        vec![
            PathSegment::MoveTo(Point::new(x, y)),
            PathSegment::LineTo(Point::new(x + w, y)),
            PathSegment::LineTo(Point::new(x + w, y + h)),
            PathSegment::LineTo(Point::new(x, y + h)),
            PathSegment::Close,
        ]
    }

    fn fill(path: &[PathSegment], rule: FillRule, aa: Antialias, size: i32) -> CoverageMask {
        let clip = IntRect::new(0, 0, size, size);
        let mut mask = CoverageMask::new(clip);
        let mut r = Rasterizer::new(1024, aa);
        r.fill_path(path, rule, 0.25, clip, &mut mask);
        mask
    }

    /// Run the general sweep even for paths the fast path would take
    fn fill_general(path: &[PathSegment], aa: Antialias, clip: IntRect) -> CoverageMask {
        let mut mask = CoverageMask::new(IntRect::new(0, 0, 8, 8));
        let mut r = Rasterizer::new(1024, aa);
        r.begin(clip);
        r.table_mut().add_path(path, 0.25);
        r.sweep(FillRule::Winding, clip, &mut mask);
        mask
    }

    #[test]
    fn test_aligned_rect_fully_covered() {
        let mask = fill(&rect_path(2.0, 3.0, 4.0, 2.0), FillRule::Winding, Antialias::Good, 10);
        for y in 0..10 {
            for x in 0..10 {
                let inside = (2..6).contains(&x) && (3..5).contains(&y);
                assert_eq!(mask.get(x, y), if inside { 255 } else { 0 }, "({}, {})", x, y);
            }
        }
    }

    #[test]
    fn test_rect_fast_path_matches_sweep() {
        let path = rect_path(1.0, 2.0, 5.0, 3.0);
        for aa in Antialias::ALL {
            for clip in [IntRect::new(0, 0, 8, 8), IntRect::new(2, 3, 5, 8)] {
                let mut fast = CoverageMask::new(IntRect::new(0, 0, 8, 8));
                let mut r = Rasterizer::new(64, *aa);
                r.fill_path(&path, FillRule::Winding, 0.25, clip, &mut fast);
                assert_eq!(fast, fill_general(&path, *aa, clip), "{:?} {:?}", aa, clip);
            }
        }
    }

    #[test]
    fn test_half_pixel_edge_coverage() {
        let mask = fill(&rect_path(1.5, 0.0, 2.0, 4.0), FillRule::Winding, Antialias::Good, 6);
        assert_eq!(mask.get(1, 1), 128);
        assert_eq!(mask.get(2, 1), 255);
        assert_eq!(mask.get(3, 1), 128);
        assert_eq!(mask.get(4, 1), 0);
        assert!((mask.area() - 8.0).abs() < 0.05);
    }

    #[test]
    fn test_aliased_uses_pixel_centers() {
        let mask = fill(&rect_path(1.4, 0.0, 2.0, 2.0), FillRule::Winding, Antialias::None, 6);
        assert_eq!(mask.get(0, 0), 0);
        assert_eq!(mask.get(1, 0), 255);
        assert_eq!(mask.get(2, 0), 255);
        assert_eq!(mask.get(3, 0), 0);
        assert_eq!(mask.get(2, 1), 255);
    }

    #[test]
    fn test_fill_rules_on_nested_squares() {
        let mut path = rect_path(0.0, 0.0, 10.0, 10.0);
        path.extend(rect_path(3.0, 3.0, 4.0, 4.0));
        let winding = fill(&path, FillRule::Winding, Antialias::Fast, 10);
        let even_odd = fill(&path, FillRule::EvenOdd, Antialias::Fast, 10);
        assert_eq!(winding.get(5, 5), 255);
        assert_eq!(even_odd.get(5, 5), 0);
        assert_eq!(even_odd.get(1, 1), 255);

        // Opposite orientation of the inner square punches a hole either way
        let mut path = rect_path(0.0, 0.0, 10.0, 10.0);
        path.extend([
            PathSegment::MoveTo(Point::new(3.0, 3.0)),
            PathSegment::LineTo(Point::new(3.0, 7.0)),
            PathSegment::LineTo(Point::new(7.0, 7.0)),
            PathSegment::LineTo(Point::new(7.0, 3.0)),
            PathSegment::Close,
        ]);
        assert_eq!(fill(&path, FillRule::Winding, Antialias::Fast, 10).get(5, 5), 0);
    }

    #[test]
    fn test_triangle_area() {
        let path = [
            PathSegment::MoveTo(Point::new(0.0, 0.0)),
            PathSegment::LineTo(Point::new(16.0, 0.0)),
            PathSegment::LineTo(Point::new(0.0, 16.0)),
            PathSegment::Close,
        ];
        let mask = fill(&path, FillRule::Winding, Antialias::Full, 16);
        assert!((mask.area() - 128.0).abs() < 1.0, "area {}", mask.area());
    }

    #[test]
    fn test_clip_limits_output() {
        let path = rect_path(0.5, 0.5, 20.0, 20.0);
        let clip = IntRect::new(2, 2, 4, 4);
        let mut mask = CoverageMask::new(IntRect::new(0, 0, 10, 10));
        let mut r = Rasterizer::new(64, Antialias::Default);
        r.fill_path(&path, FillRule::Winding, 0.25, clip, &mut mask);
        assert_eq!(mask.get(1, 1), 0);
        assert_eq!(mask.get(2, 2), 255);
        assert_eq!(mask.get(3, 3), 255);
        assert_eq!(mask.get(4, 4), 0);
    }

    #[test]
    fn test_edge_overflow_reported() {
        let path = [
            PathSegment::MoveTo(Point::new(0.0, 0.0)),
            PathSegment::LineTo(Point::new(5.0, 8.0)),
            PathSegment::LineTo(Point::new(9.0, 1.0)),
            PathSegment::LineTo(Point::new(3.0, 9.0)),
            PathSegment::Close,
        ];
        let clip = IntRect::new(0, 0, 10, 10);
        let mut mask = CoverageMask::new(clip);
        let mut r = Rasterizer::new(2, Antialias::Default);
        assert!(!r.fill_path(&path, FillRule::Winding, 0.25, clip, &mut mask));
    }

    #[test]
    fn test_axis_aligned_rect_detection() {
        assert_eq!(
            axis_aligned_rect(&rect_path(1.0, 2.0, 3.0, 4.0)),
            Some(Rect::new(1.0, 2.0, 3.0, 4.0))
        );
        let skewed = [
            PathSegment::MoveTo(Point::new(0.0, 0.0)),
            PathSegment::LineTo(Point::new(4.0, 0.0)),
            PathSegment::LineTo(Point::new(5.0, 4.0)),
            PathSegment::LineTo(Point::new(0.0, 4.0)),
            PathSegment::Close,
        ];
        assert_eq!(axis_aligned_rect(&skewed), None);
        let mut two = rect_path(0.0, 0.0, 1.0, 1.0);
        two.extend(rect_path(2.0, 2.0, 1.0, 1.0));
        assert_eq!(axis_aligned_rect(&two), None);
    }
}
