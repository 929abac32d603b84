//! Stroking
//!
//! A stroke is turned into a set of polygons whose non-zero union is the
//! stroked area: one quad per segment, a wedge or disk per join, a cap
//! shape per open end. Every polygon is emitted with the same orientation
//! so overlaps never cancel.
//!
//! Strokes are built in device space with the line width scaled by the
//! transform's scale factor.

use std::f32::consts::{PI, SQRT_2};

use ctx_core::path::{flatten_cubic, flatten_quad};
use ctx_core::{LineCap, LineJoin, LineStyle, PathSegment, Point, Rect};
use smallvec::SmallVec;

use crate::rasterizer::axis_aligned_rect;

/// A flattened subpath
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Polyline {
    pub points: Vec<Point>,
    pub closed: bool,
}

/// Flatten a device-space path into polylines, dropping repeated points.
/// Subpaths with no drawing segment are skipped.
pub fn flatten_polylines(path: &[PathSegment], tolerance: f32) -> Vec<Polyline> {
    let mut out = Vec::new();
    let mut current = Polyline::default();
    let mut drawn = false;
    let mut start = Point::ZERO;

    let push = |line: &mut Polyline, p: Point| {
        if line.points.last() != Some(&p) {
            line.points.push(p);
        }
    };

    for segment in path {
        match *segment {
            PathSegment::MoveTo(p) => {
                if drawn {
                    out.push(std::mem::take(&mut current));
                }
                current.points.clear();
                current.closed = false;
                current.points.push(p);
                start = p;
                drawn = false;
            }
            PathSegment::LineTo(p) => {
                if current.points.is_empty() {
                    current.points.push(start);
                }
                push(&mut current, p);
                drawn = true;
            }
            PathSegment::QuadTo(c, p) => {
                let from = current.points.last().copied().unwrap_or(start);
                if current.points.is_empty() {
                    current.points.push(from);
                }
                flatten_quad(from, c, p, tolerance, &mut |q| push(&mut current, q));
                drawn = true;
            }
            PathSegment::CurveTo(c0, c1, p) => {
                let from = current.points.last().copied().unwrap_or(start);
                if current.points.is_empty() {
                    current.points.push(from);
                }
                flatten_cubic(from, c0, c1, p, tolerance, &mut |q| push(&mut current, q));
                drawn = true;
            }
            PathSegment::Close => {
                if drawn {
                    current.closed = true;
                    if current.points.len() > 1 && current.points.last() == current.points.first() {
                        current.points.pop();
                    }
                    out.push(std::mem::take(&mut current));
                }
                if current.points.is_empty() {
                    current.points.push(start);
                }
                drawn = false;
            }
        }
    }
    if drawn {
        out.push(current);
    }
    out
}

/// Stroke parameters in device space
#[derive(Clone, Debug, PartialEq)]
pub struct StrokeParams {
    pub half_width: f32,
    pub cap: LineCap,
    pub join: LineJoin,
    pub miter_limit: f32,
    pub dashes: SmallVec<[f32; 10]>,
    pub dash_offset: f32,
    /// Squared-distance flattening tolerance
    pub tolerance: f32,
}

impl StrokeParams {
    /// Device-space parameters for `style` under a transform of scale `scale`
    pub fn new(style: &LineStyle, scale: f32, tolerance: f32) -> Self {
        let dashes: SmallVec<[f32; 10]> = style.dashes().iter().map(|d| d * scale).collect();
        Self {
            half_width: style.width * scale / 2.0,
            cap: style.cap,
            join: style.join,
            miter_limit: style.miter_limit,
            dash_offset: style.dash_offset * scale,
            dashes: if dashes.iter().sum::<f32>() > 0.0 {
                dashes
            } else {
                SmallVec::new()
            },
            tolerance,
        }
    }
}

/// Outer and inner rectangles of a stroked pixel-aligned rectangle, when
/// the stroke is exactly the region between them
pub fn aligned_rect_frame(path: &[PathSegment], params: &StrokeParams) -> Option<(Rect, Rect)> {
    if !matches!(path.last(), Some(PathSegment::Close))
        || !params.dashes.is_empty()
        || params.join != LineJoin::Miter
        || params.miter_limit < SQRT_2
    {
        return None;
    }
    let rect = axis_aligned_rect(path)?;
    let h = params.half_width;
    if rect.width <= 2.0 * h || rect.height <= 2.0 * h {
        return None;
    }
    let outer = Rect::new(rect.x - h, rect.y - h, rect.width + 2.0 * h, rect.height + 2.0 * h);
    let inner = Rect::new(rect.x + h, rect.y + h, rect.width - 2.0 * h, rect.height - 2.0 * h);
    let aligned = |r: &Rect| [r.x, r.y, r.max_x(), r.max_y()].iter().all(|v| v.fract() == 0.0);
    (aligned(&outer) && aligned(&inner)).then_some((outer, inner))
}

/// Emit the polygons covering the stroke of `path`
pub fn stroke_polygons(path: &[PathSegment], params: &StrokeParams, emit: &mut impl FnMut(&[Point])) {
    let h = params.half_width;
    if !(h > 0.0 && h.is_finite()) {
        return;
    }
    let mut out = PolygonOut { emit, scratch: Vec::new() };

    for line in flatten_polylines(path, params.tolerance) {
        if line.points.len() == 1 {
            dot(line.points[0], params, &mut out);
        } else if !params.dashes.is_empty() {
            let mut dashes = Vec::new();
            split_dashes(&line, &params.dashes, params.dash_offset, &mut dashes);
            for piece in &dashes {
                if piece.len() == 1 {
                    dot(piece[0], params, &mut out);
                } else {
                    stroke_open(piece, params, &mut out);
                }
            }
        } else if line.closed {
            stroke_closed(&line.points, params, &mut out);
        } else {
            stroke_open(&line.points, params, &mut out);
        }
    }
}

struct PolygonOut<'a, F: FnMut(&[Point])> {
    emit: &'a mut F,
    scratch: Vec<Point>,
}

impl<F: FnMut(&[Point])> PolygonOut<'_, F> {
    /// Emit `points` with negative signed area
    fn polygon(&mut self, points: &[Point]) {
        let mut area = 0.0;
        for i in 0..points.len() {
            let (a, b) = (points[i], points[(i + 1) % points.len()]);
            area += a.x * b.y - b.x * a.y;
        }
        if area > 0.0 {
            self.scratch.clear();
            self.scratch.extend(points.iter().rev());
            (self.emit)(&self.scratch);
        } else {
            (self.emit)(points);
        }
    }

    /// Regular polygon with the same area as the disk
    fn disk(&mut self, center: Point, radius: f32, tolerance: f32) {
        let n = circle_segments(radius, tolerance);
        let step = 2.0 * PI / n as f32;
        let r = radius * (2.0 * PI / (n as f32 * step.sin())).sqrt();
        let mut pts: SmallVec<[Point; 64]> = SmallVec::with_capacity(n);
        for i in 0..n {
            let a = i as f32 * step;
            pts.push(Point::new(center.x + r * a.cos(), center.y + r * a.sin()));
        }
        self.polygon(&pts);
    }
}

/// Vertices for a circle of `radius` within `tolerance` (squared distance)
fn circle_segments(radius: f32, tolerance: f32) -> usize {
    let d = tolerance.sqrt().min(radius);
    if radius <= 0.0 || d <= 0.0 {
        return 16;
    }
    let step = 2.0 * (1.0 - d / radius).clamp(-1.0, 1.0).acos();
    if step <= 0.0 {
        return 128;
    }
    ((2.0 * PI / step).ceil() as usize).clamp(16, 128)
}

#[inline]
fn normal(a: Point, b: Point, h: f32) -> Option<Point> {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len = dx.hypot(dy);
    if len <= f32::EPSILON || !len.is_finite() {
        return None;
    }
    Some(Point::new(-dy / len * h, dx / len * h))
}

#[inline]
fn offset(p: Point, n: Point, s: f32) -> Point {
    Point::new(p.x + n.x * s, p.y + n.y * s)
}

/// A zero-length subpath: round caps draw a disk, square caps a square
fn dot<F: FnMut(&[Point])>(p: Point, params: &StrokeParams, out: &mut PolygonOut<'_, F>) {
    let h = params.half_width;
    match params.cap {
        LineCap::Butt => {}
        LineCap::Round => out.disk(p, h, params.tolerance),
        LineCap::Square => out.polygon(&[
            Point::new(p.x - h, p.y - h),
            Point::new(p.x + h, p.y - h),
            Point::new(p.x + h, p.y + h),
            Point::new(p.x - h, p.y + h),
        ]),
    }
}

fn segments<F: FnMut(&[Point])>(points: &[Point], params: &StrokeParams, out: &mut PolygonOut<'_, F>) {
    for pair in points.windows(2) {
        if let Some(n) = normal(pair[0], pair[1], params.half_width) {
            out.polygon(&[
                offset(pair[0], n, 1.0),
                offset(pair[1], n, 1.0),
                offset(pair[1], n, -1.0),
                offset(pair[0], n, -1.0),
            ]);
        }
    }
}

/// Join at `b` between segments `a -> b` and `b -> c`
fn join<F: FnMut(&[Point])>(a: Point, b: Point, c: Point, params: &StrokeParams, out: &mut PolygonOut<'_, F>) {
    let h = params.half_width;
    let (Some(n0), Some(n1)) = (normal(a, b, h), normal(b, c, h)) else {
        return;
    };
    let d1 = Point::new(c.x - b.x, c.y - b.y);
    let turn = d1.x * n0.x + d1.y * n0.y;
    let cos = n0.x * n1.x + n0.y * n1.y;
    if turn.abs() <= 1e-6 * h * d1.x.hypot(d1.y) && cos > 0.0 {
        return;
    }
    // Outer side of the turn
    let s = if turn > 0.0 { -1.0 } else { 1.0 };

    match params.join {
        LineJoin::Round => out.disk(b, h, params.tolerance),
        LineJoin::Miter => {
            let denom = h * h + cos;
            let k = if denom > f32::EPSILON { h * h / denom } else { f32::INFINITY };
            let tip = Point::new((n0.x + n1.x) * k * s, (n0.y + n1.y) * k * s);
            let ratio = tip.x.hypot(tip.y) / h;
            if ratio.is_finite() && ratio <= params.miter_limit {
                out.polygon(&[
                    b,
                    offset(b, n0, s),
                    Point::new(b.x + tip.x, b.y + tip.y),
                    offset(b, n1, s),
                ]);
            } else {
                out.polygon(&[b, offset(b, n0, s), offset(b, n1, s)]);
            }
        }
        LineJoin::Bevel => out.polygon(&[b, offset(b, n0, s), offset(b, n1, s)]),
    }
}

fn cap<F: FnMut(&[Point])>(p: Point, toward: Point, params: &StrokeParams, out: &mut PolygonOut<'_, F>) {
    let h = params.half_width;
    match params.cap {
        LineCap::Butt => {}
        LineCap::Round => out.disk(p, h, params.tolerance),
        LineCap::Square => {
            let Some(n) = normal(toward, p, h) else {
                return;
            };
            // Direction away from the line, length h
            let e = Point::new(n.y, -n.x);
            let far = Point::new(p.x + e.x, p.y + e.y);
            out.polygon(&[offset(p, n, 1.0), offset(far, n, 1.0), offset(far, n, -1.0), offset(p, n, -1.0)]);
        }
    }
}

fn stroke_open<F: FnMut(&[Point])>(points: &[Point], params: &StrokeParams, out: &mut PolygonOut<'_, F>) {
    segments(points, params, out);
    for w in points.windows(3) {
        join(w[0], w[1], w[2], params, out);
    }
    let n = points.len();
    cap(points[0], points[1], params, out);
    cap(points[n - 1], points[n - 2], params, out);
}

fn stroke_closed<F: FnMut(&[Point])>(points: &[Point], params: &StrokeParams, out: &mut PolygonOut<'_, F>) {
    let n = points.len();
    if n == 2 {
        // Degenerate closed path traces the segment twice, no ends
        segments(points, params, out);
        join(points[1], points[0], points[1], params, out);
        join(points[0], points[1], points[0], params, out);
        return;
    }
    segments(points, params, out);
    segments(&[points[n - 1], points[0]], params, out);
    for i in 0..n {
        join(points[(i + n - 1) % n], points[i], points[(i + 1) % n], params, out);
    }
}

/// Dash boundaries generated per polyline before the rest is left undashed
pub const MAX_DASH_STEPS: usize = 1 << 16;

/// Split a polyline into dash pieces. Odd-length patterns repeat twice
/// so on and off alternate. Stops after [`MAX_DASH_STEPS`] boundaries.
pub fn split_dashes(line: &Polyline, dashes: &[f32], offset: f32, out: &mut Vec<Vec<Point>>) {
    let count = if dashes.len() % 2 == 1 {
        dashes.len() * 2
    } else {
        dashes.len()
    };
    let dash = |i: usize| dashes[i % dashes.len()];
    let period: f32 = (0..count).map(dash).sum();
    if period <= 0.0 {
        return;
    }

    let mut index = 0;
    let mut remaining = dash(0);
    let mut skip = offset.rem_euclid(period);
    while skip > 0.0 {
        if skip >= remaining {
            skip -= remaining;
            index = (index + 1) % count;
            remaining = dash(index);
        } else {
            remaining -= skip;
            skip = 0.0;
        }
    }

    let mut points: Vec<Point> = line.points.clone();
    if line.closed {
        points.push(line.points[0]);
    }

    let mut piece: Vec<Point> = Vec::new();
    if index % 2 == 0 {
        piece.push(points[0]);
    }
    let mut steps = 0;
    'walk: for pair in points.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let len = a.distance(b);
        if !len.is_finite() {
            break;
        }
        let mut pos = 0.0;
        while len - pos > remaining {
            steps += 1;
            if steps > MAX_DASH_STEPS || (pos + remaining == pos && remaining > 0.0) {
                tracing::warn!("Dash pattern too fine for a {len} long segment, truncating");
                break 'walk;
            }
            pos += remaining;
            let p = Point::lerp(a, b, pos / len);
            if index % 2 == 0 {
                piece.push(p);
                out.push(std::mem::take(&mut piece));
            } else {
                piece.push(p);
            }
            index = (index + 1) % count;
            remaining = dash(index);
        }
        remaining -= len - pos;
        if index % 2 == 0 {
            piece.push(b);
        }
    }
    if index % 2 == 0 && !piece.is_empty() {
        out.push(piece);
    }
    for p in out.iter_mut() {
        p.dedup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rasterizer::{CoverageMask, Rasterizer};
    use ctx_core::{Antialias, FillRule, IntRect};

    fn params(width: f32, cap: LineCap, join: LineJoin) -> StrokeParams {
        let mut style = LineStyle::default();
        style.width = width;
        style.cap = cap;
        style.join = join;
        StrokeParams::new(&style, 1.0, 0.25)
    }

    fn render(path: &[PathSegment], params: &StrokeParams, size: i32) -> CoverageMask {
        let clip = IntRect::new(0, 0, size, size);
        let mut mask = CoverageMask::new(clip);
        let mut r = Rasterizer::new(4096, Antialias::Good);
        r.begin(clip);
        stroke_polygons(path, params, &mut |poly| r.table_mut().add_polygon(poly));
        r.sweep(FillRule::Winding, clip, &mut mask);
        mask
    }

    fn line(a: (f32, f32), b: (f32, f32)) -> Vec<PathSegment> {
        vec![
            PathSegment::MoveTo(Point::new(a.0, a.1)),
            PathSegment::LineTo(Point::new(b.0, b.1)),
        ]
    }

    #[test]
    fn test_butt_line_area() {
        let mask = render(&line((2.0, 5.0), (12.0, 5.0)), &params(2.0, LineCap::Butt, LineJoin::Bevel), 16);
        assert!((mask.area() - 20.0).abs() < 0.1, "area {}", mask.area());
        assert_eq!(mask.get(1, 4), 0);
        assert_eq!(mask.get(2, 4), 255);
    }

    #[test]
    fn test_square_cap_extends_line() {
        let mask = render(&line((2.0, 5.0), (12.0, 5.0)), &params(2.0, LineCap::Square, LineJoin::Bevel), 16);
        assert!((mask.area() - 24.0).abs() < 0.1, "area {}", mask.area());
        assert_eq!(mask.get(1, 4), 255);
        assert_eq!(mask.get(12, 5), 255);
        assert_eq!(mask.get(13, 5), 0);
    }

    #[test]
    fn test_zero_length_round_cap_is_disk() {
        let path = line((8.0, 8.0), (8.0, 8.0));
        let mask = render(&path, &params(10.0, LineCap::Round, LineJoin::Bevel), 16);
        let expected = PI * 25.0;
        assert!((mask.area() - expected).abs() < 1.5, "area {}", mask.area());
        assert_eq!(mask.get(8, 8), 255);
        assert_eq!(mask.get(8, 2), 0);

        let butt = render(&path, &params(10.0, LineCap::Butt, LineJoin::Bevel), 16);
        assert_eq!(butt.area(), 0.0);
    }

    #[test]
    fn test_miter_join_fills_corner() {
        let path = [
            PathSegment::MoveTo(Point::new(2.0, 4.0)),
            PathSegment::LineTo(Point::new(10.0, 4.0)),
            PathSegment::LineTo(Point::new(10.0, 12.0)),
        ];
        let miter = render(&path, &params(4.0, LineCap::Butt, LineJoin::Miter), 16);
        let bevel = render(&path, &params(4.0, LineCap::Butt, LineJoin::Bevel), 16);
        assert_eq!(miter.get(11, 2), 255);
        assert!(bevel.get(11, 2) < 255);
        assert!(miter.area() > bevel.area());
        // Overlapping polygons never cancel
        assert_eq!(bevel.get(9, 5), 255);
    }

    #[test]
    fn test_closed_rect_frame() {
        let mut path = vec![
            PathSegment::MoveTo(Point::new(4.0, 4.0)),
            PathSegment::LineTo(Point::new(12.0, 4.0)),
            PathSegment::LineTo(Point::new(12.0, 12.0)),
            PathSegment::LineTo(Point::new(4.0, 12.0)),
        ];
        path.push(PathSegment::Close);
        let p = params(2.0, LineCap::Butt, LineJoin::Miter);
        let mask = render(&path, &p, 16);
        assert_eq!(mask.get(3, 3), 255);
        assert_eq!(mask.get(8, 8), 0);
        assert!((mask.area() - (100.0 - 36.0)).abs() < 0.1);

        let (outer, inner) = aligned_rect_frame(&path, &p).unwrap();
        assert_eq!(outer, Rect::new(3.0, 3.0, 10.0, 10.0));
        assert_eq!(inner, Rect::new(5.0, 5.0, 6.0, 6.0));
    }

    #[test]
    fn test_dash_pieces() {
        let line = Polyline {
            points: vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0)],
            closed: false,
        };
        let mut out = Vec::new();
        split_dashes(&line, &[2.0, 3.0], 0.0, &mut out);
        let starts: Vec<f32> = out.iter().map(|p| p[0].x).collect();
        assert_eq!(starts, vec![0.0, 5.0]);
        assert_eq!(out[0].last().unwrap().x, 2.0);
        assert_eq!(out[1].last().unwrap().x, 7.0);

        out.clear();
        split_dashes(&line, &[2.0, 3.0], 1.0, &mut out);
        assert_eq!(out[0], vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0)]);

        out.clear();
        split_dashes(&line, &[4.0], 0.0, &mut out);
        assert_eq!(out.len(), 2);
        assert_eq!(out[1][0].x, 8.0);
    }

    #[test]
    fn test_dashes_on_huge_segment_are_bounded() {
        let line = Polyline {
            points: vec![Point::new(0.0, 5.0), Point::new(1e7, 5.0)],
            closed: false,
        };
        let mut out = Vec::new();
        split_dashes(&line, &[2.0, 3.0], 0.0, &mut out);
        assert!(!out.is_empty());
        assert!(out.len() <= MAX_DASH_STEPS / 2 + 1);
        assert_eq!(out[0][0], Point::new(0.0, 5.0));

        out.clear();
        let far = Polyline {
            points: vec![Point::new(-3e38, 5.0), Point::new(3e38, 5.0)],
            closed: false,
        };
        split_dashes(&far, &[2.0, 3.0], 0.0, &mut out);
        assert!(out.len() <= 1);
    }

    #[test]
    fn test_extreme_coordinates_stroke_without_panic() {
        let path = line((-1e30, -1e30), (10.0, 10.0));
        let mask = render(&path, &params(2.0, LineCap::Round, LineJoin::Round), 16);
        assert!(mask.area().is_finite());

        let mut p = params(2.0, LineCap::Butt, LineJoin::Bevel);
        p.dashes = SmallVec::from_slice(&[2.0, 3.0]);
        let mask = render(&line((-200.0, 8.0), (200.0, 8.0)), &p, 16);
        assert_eq!(mask.get(0, 8), 255);
        assert_eq!(mask.get(3, 8), 0);
    }

    #[test]
    fn test_flatten_polylines_subpaths() {
        let path = [
            PathSegment::MoveTo(Point::new(0.0, 0.0)),
            PathSegment::MoveTo(Point::new(1.0, 1.0)),
            PathSegment::LineTo(Point::new(4.0, 1.0)),
            PathSegment::LineTo(Point::new(4.0, 1.0)),
            PathSegment::Close,
            PathSegment::LineTo(Point::new(1.0, 5.0)),
        ];
        let lines = flatten_polylines(&path, 0.25);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].closed);
        assert_eq!(lines[0].points.len(), 2);
        assert_eq!(lines[1].points[0], Point::new(1.0, 1.0));
        assert!(!lines[1].closed);
    }

    #[test]
    fn test_polygons_share_orientation() {
        let path = line((0.0, 0.0), (5.0, 5.0));
        let mut areas = Vec::new();
        stroke_polygons(&path, &params(2.0, LineCap::Round, LineJoin::Round), &mut |poly| {
            let mut a = 0.0;
            for i in 0..poly.len() {
                let (p, q) = (poly[i], poly[(i + 1) % poly.len()]);
                a += p.x * q.y - q.x * p.y;
            }
            areas.push(a);
        });
        assert_eq!(areas.len(), 3);
        assert!(areas.iter().all(|a| *a <= 0.0));
    }
}
