//! Path interpreter
//!
//! Resolves relative, shorthand and arc commands against the current point
//! and emits canonical device-space segments. Under a perspective transform
//! curves are flattened in user space before mapping, since projected
//! Béziers are not Béziers.

use std::f32::consts::{FRAC_PI_2, PI, TAU};

use crate::geometry::{Point, Rect};
use crate::state::{GraphicsState, TransformClass};

/// Canonical device-space path segment
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PathSegment {
    MoveTo(Point),
    LineTo(Point),
    QuadTo(Point, Point),
    CurveTo(Point, Point, Point),
    Close,
}

/// Subdivision depth cap for curve flattening
const MAX_FLATTEN_DEPTH: u32 = 16;

/// Flatten a cubic Bézier, calling `out` for every point after `p0`.
///
/// `tolerance` is the allowed squared deviation from the curve.
pub fn flatten_cubic(
    p0: Point,
    p1: Point,
    p2: Point,
    p3: Point,
    tolerance: f32,
    out: &mut impl FnMut(Point),
) {
    cubic_rec(p0, p1, p2, p3, tolerance.max(1e-6), 0, out);
}

fn cubic_rec(
    p0: Point,
    p1: Point,
    p2: Point,
    p3: Point,
    tolerance: f32,
    depth: u32,
    out: &mut impl FnMut(Point),
) {
    let ux = 3.0 * p1.x - 2.0 * p0.x - p3.x;
    let uy = 3.0 * p1.y - 2.0 * p0.y - p3.y;
    let vx = 3.0 * p2.x - p0.x - 2.0 * p3.x;
    let vy = 3.0 * p2.y - p0.y - 2.0 * p3.y;
    let flatness = (ux * ux).max(vx * vx) + (uy * uy).max(vy * vy);

    if depth >= MAX_FLATTEN_DEPTH || !flatness.is_finite() || flatness <= 16.0 * tolerance {
        out(p3);
        return;
    }

    let p01 = Point::lerp(p0, p1, 0.5);
    let p12 = Point::lerp(p1, p2, 0.5);
    let p23 = Point::lerp(p2, p3, 0.5);
    let p012 = Point::lerp(p01, p12, 0.5);
    let p123 = Point::lerp(p12, p23, 0.5);
    let mid = Point::lerp(p012, p123, 0.5);

    cubic_rec(p0, p01, p012, mid, tolerance, depth + 1, out);
    cubic_rec(mid, p123, p23, p3, tolerance, depth + 1, out);
}

/// Cubic control points equivalent to a quadratic
pub fn quad_to_cubic(p0: Point, c: Point, p: Point) -> (Point, Point) {
    (
        Point::new(p0.x + 2.0 / 3.0 * (c.x - p0.x), p0.y + 2.0 / 3.0 * (c.y - p0.y)),
        Point::new(p.x + 2.0 / 3.0 * (c.x - p.x), p.y + 2.0 / 3.0 * (c.y - p.y)),
    )
}

/// Flatten a quadratic Bézier, calling `out` for every point after `p0`
pub fn flatten_quad(p0: Point, c: Point, p: Point, tolerance: f32, out: &mut impl FnMut(Point)) {
    let (c1, c2) = quad_to_cubic(p0, c, p);
    flatten_cubic(p0, c1, c2, p, tolerance, out);
}

/// Path construction state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PathState {
    #[default]
    NoPath,
    OpenSubpath,
    ClosedSubpath,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum LastControl {
    None,
    Cubic(Point),
    Quad(Point),
}

/// Builds device-space segments from user-space path commands
#[derive(Clone, Debug)]
pub struct PathBuilder {
    segments: Vec<PathSegment>,
    state: PathState,
    /// Current point, user space
    current: Point,
    /// First point of the current subpath, user space
    start: Point,
    last_control: LastControl,
    max_arc_segments: usize,
}

impl PathBuilder {
    pub fn new(max_arc_segments: usize) -> Self {
        Self {
            segments: Vec::new(),
            state: PathState::NoPath,
            current: Point::ZERO,
            start: Point::ZERO,
            last_control: LastControl::None,
            max_arc_segments: max_arc_segments.max(1),
        }
    }

    pub fn state(&self) -> PathState {
        self.state
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Current point in user space
    pub fn current_point(&self) -> Option<Point> {
        (self.state != PathState::NoPath).then_some(self.current)
    }

    /// Move the current point without adding geometry
    pub fn set_current_point(&mut self, p: Point) {
        self.current = p;
    }

    pub fn reset(&mut self) {
        self.segments.clear();
        self.state = PathState::NoPath;
        self.current = Point::ZERO;
        self.start = Point::ZERO;
        self.last_control = LastControl::None;
    }

    /// Hand out the path; unless preserved the builder is reset
    pub fn take(&mut self, preserve: bool) -> Vec<PathSegment> {
        if preserve {
            self.segments.clone()
        } else {
            let segments = std::mem::take(&mut self.segments);
            self.reset();
            segments
        }
    }

    /// Device-space bounds of all segment points
    pub fn extents(&self) -> Option<Rect> {
        let mut bounds: Option<Rect> = None;
        let mut include = |p: &Point| match bounds.as_mut() {
            Some(b) => b.include(*p),
            None => bounds = Some(Rect::new(p.x, p.y, 0.0, 0.0)),
        };
        for seg in &self.segments {
            match seg {
                PathSegment::MoveTo(p) | PathSegment::LineTo(p) => include(p),
                PathSegment::QuadTo(c, p) => {
                    include(c);
                    include(p);
                }
                PathSegment::CurveTo(c0, c1, p) => {
                    include(c0);
                    include(c1);
                    include(p);
                }
                PathSegment::Close => {}
            }
        }
        bounds
    }

    fn ensure_subpath(&mut self, gs: &GraphicsState, p: Point) {
        if self.state == PathState::NoPath {
            self.move_to(gs, p.x, p.y);
        }
    }

    pub fn move_to(&mut self, gs: &GraphicsState, x: f32, y: f32) {
        let p = Point::new(x, y);
        self.segments.push(PathSegment::MoveTo(gs.transform().map(x, y)));
        self.current = p;
        self.start = p;
        self.state = PathState::OpenSubpath;
        self.last_control = LastControl::None;
    }

    fn reopen_after_close(&mut self, gs: &GraphicsState) {
        if self.state == PathState::ClosedSubpath {
            let s = self.start;
            self.segments.push(PathSegment::MoveTo(gs.transform().map(s.x, s.y)));
            self.state = PathState::OpenSubpath;
        }
    }

    pub fn line_to(&mut self, gs: &GraphicsState, x: f32, y: f32) {
        let p = Point::new(x, y);
        if self.state == PathState::NoPath {
            self.move_to(gs, x, y);
            return;
        }
        self.reopen_after_close(gs);
        self.segments.push(PathSegment::LineTo(gs.transform().map(x, y)));
        self.current = p;
        self.last_control = LastControl::None;
    }

    pub fn curve_to(&mut self, gs: &GraphicsState, c0: Point, c1: Point, p: Point) {
        self.ensure_subpath(gs, c0);
        self.reopen_after_close(gs);
        let t = gs.transform();
        if t.class() == TransformClass::Perspective {
            let segments = &mut self.segments;
            flatten_cubic(self.current, c0, c1, p, gs.tolerance(), &mut |q| {
                segments.push(PathSegment::LineTo(t.map(q.x, q.y)));
            });
        } else {
            self.segments.push(PathSegment::CurveTo(
                t.map(c0.x, c0.y),
                t.map(c1.x, c1.y),
                t.map(p.x, p.y),
            ));
        }
        self.current = p;
        self.last_control = LastControl::Cubic(c1);
    }

    pub fn quad_to(&mut self, gs: &GraphicsState, c: Point, p: Point) {
        self.ensure_subpath(gs, c);
        self.reopen_after_close(gs);
        let t = gs.transform();
        if t.class() == TransformClass::Perspective {
            let segments = &mut self.segments;
            flatten_quad(self.current, c, p, gs.tolerance(), &mut |q| {
                segments.push(PathSegment::LineTo(t.map(q.x, q.y)));
            });
        } else {
            self.segments
                .push(PathSegment::QuadTo(t.map(c.x, c.y), t.map(p.x, p.y)));
        }
        self.current = p;
        self.last_control = LastControl::Quad(c);
    }

    fn reflected(&self, control: Option<Point>) -> Point {
        match control {
            Some(c) => Point::new(2.0 * self.current.x - c.x, 2.0 * self.current.y - c.y),
            None => self.current,
        }
    }

    /// Cubic whose first control point mirrors the previous cubic's second
    pub fn smooth_to(&mut self, gs: &GraphicsState, c1: Point, p: Point) {
        let prev = match self.last_control {
            LastControl::Cubic(c) => Some(c),
            _ => None,
        };
        let c0 = self.reflected(prev);
        self.curve_to(gs, c0, c1, p);
    }

    /// Quadratic whose control point mirrors the previous quadratic's
    pub fn smooth_quad_to(&mut self, gs: &GraphicsState, p: Point) {
        let prev = match self.last_control {
            LastControl::Quad(c) => Some(c),
            _ => None,
        };
        let c = self.reflected(prev);
        self.quad_to(gs, c, p);
    }

    fn rel(&self, x: f32, y: f32) -> Point {
        Point::new(self.current.x + x, self.current.y + y)
    }

    pub fn rel_move_to(&mut self, gs: &GraphicsState, x: f32, y: f32) {
        let p = self.rel(x, y);
        self.move_to(gs, p.x, p.y);
    }

    pub fn rel_line_to(&mut self, gs: &GraphicsState, x: f32, y: f32) {
        let p = self.rel(x, y);
        self.line_to(gs, p.x, p.y);
    }

    pub fn rel_curve_to(&mut self, gs: &GraphicsState, c0: Point, c1: Point, p: Point) {
        let (c0, c1, p) = (self.rel(c0.x, c0.y), self.rel(c1.x, c1.y), self.rel(p.x, p.y));
        self.curve_to(gs, c0, c1, p);
    }

    pub fn rel_quad_to(&mut self, gs: &GraphicsState, c: Point, p: Point) {
        let (c, p) = (self.rel(c.x, c.y), self.rel(p.x, p.y));
        self.quad_to(gs, c, p);
    }

    pub fn rel_smooth_to(&mut self, gs: &GraphicsState, c1: Point, p: Point) {
        let (c1, p) = (self.rel(c1.x, c1.y), self.rel(p.x, p.y));
        self.smooth_to(gs, c1, p);
    }

    pub fn rel_smooth_quad_to(&mut self, gs: &GraphicsState, p: Point) {
        let p = self.rel(p.x, p.y);
        self.smooth_quad_to(gs, p);
    }

    pub fn hor_line_to(&mut self, gs: &GraphicsState, x: f32) {
        let y = self.current.y;
        self.line_to(gs, x, y);
    }

    pub fn ver_line_to(&mut self, gs: &GraphicsState, y: f32) {
        let x = self.current.x;
        self.line_to(gs, x, y);
    }

    /// Emit an arc as cubic segments, starting at the current point
    fn arc_segments(&mut self, gs: &GraphicsState, cx: f32, cy: f32, r: f32, start: f32, sweep: f32) {
        let quarter_turns = (sweep.abs() / FRAC_PI_2 - 1e-4).ceil() as usize;
        let n = quarter_turns.clamp(1, self.max_arc_segments);
        let step = sweep / n as f32;
        let k = 4.0 / 3.0 * (step / 4.0).tan();
        let mut a = start;
        for _ in 0..n {
            let b = a + step;
            let (sa, ca) = a.sin_cos();
            let (sb, cb) = b.sin_cos();
            let c0 = Point::new(cx + r * (ca - k * sa), cy + r * (sa + k * ca));
            let c1 = Point::new(cx + r * (cb + k * sb), cy + r * (sb - k * cb));
            let p = Point::new(cx + r * cb, cy + r * sb);
            self.curve_to(gs, c0, c1, p);
            a = b;
        }
    }

    /// Circular arc around (x, y) from `angle1` to `angle2`
    #[allow(clippy::too_many_arguments)]
    pub fn arc(
        &mut self,
        gs: &GraphicsState,
        x: f32,
        y: f32,
        radius: f32,
        angle1: f32,
        angle2: f32,
        anticlockwise: bool,
    ) {
        let r = radius.abs();
        let start = Point::new(x + r * angle1.cos(), y + r * angle1.sin());
        if self.state == PathState::NoPath {
            self.move_to(gs, start.x, start.y);
        } else {
            self.line_to(gs, start.x, start.y);
        }
        if r == 0.0 {
            return;
        }

        let delta = angle2 - angle1;
        let sweep = if anticlockwise {
            if -delta >= TAU {
                -TAU
            } else {
                -(-delta).rem_euclid(TAU)
            }
        } else if delta >= TAU {
            TAU
        } else {
            delta.rem_euclid(TAU)
        };
        if sweep != 0.0 {
            self.arc_segments(gs, x, y, r, angle1, sweep);
        }
    }

    /// Arc tangent to the lines current→p1 and p1→p2
    pub fn arc_to(&mut self, gs: &GraphicsState, p1: Point, p2: Point, radius: f32) {
        if self.state == PathState::NoPath {
            self.move_to(gs, p1.x, p1.y);
        }
        let p0 = self.current;
        let d0 = Point::new(p0.x - p1.x, p0.y - p1.y);
        let d2 = Point::new(p2.x - p1.x, p2.y - p1.y);
        let l0 = d0.x.hypot(d0.y);
        let l2 = d2.x.hypot(d2.y);
        let cross = d0.x * d2.y - d0.y * d2.x;
        if radius <= 0.0 || l0 < 1e-6 || l2 < 1e-6 || cross.abs() < 1e-6 * l0 * l2 {
            self.line_to(gs, p1.x, p1.y);
            return;
        }

        let u0 = Point::new(d0.x / l0, d0.y / l0);
        let u2 = Point::new(d2.x / l2, d2.y / l2);
        let cos = (u0.x * u2.x + u0.y * u2.y).clamp(-1.0, 1.0);
        let half = cos.acos() / 2.0;
        let dist = radius / half.tan();
        let t1 = Point::new(p1.x + u0.x * dist, p1.y + u0.y * dist);
        let t2 = Point::new(p1.x + u2.x * dist, p1.y + u2.y * dist);
        let bis = Point::new(u0.x + u2.x, u0.y + u2.y);
        let bis_len = bis.x.hypot(bis.y);
        let center_dist = radius / half.sin();
        let c = Point::new(
            p1.x + bis.x / bis_len * center_dist,
            p1.y + bis.y / bis_len * center_dist,
        );

        self.line_to(gs, t1.x, t1.y);
        let a1 = (t1.y - c.y).atan2(t1.x - c.x);
        let a2 = (t2.y - c.y).atan2(t2.x - c.x);
        let mut sweep = a2 - a1;
        if sweep > PI {
            sweep -= TAU;
        } else if sweep < -PI {
            sweep += TAU;
        }
        self.arc_segments(gs, c.x, c.y, radius, a1, sweep);
    }

    pub fn rel_arc_to(&mut self, gs: &GraphicsState, p1: Point, p2: Point, radius: f32) {
        let (p1, p2) = (self.rel(p1.x, p1.y), self.rel(p2.x, p2.y));
        self.arc_to(gs, p1, p2, radius);
    }

    pub fn rectangle(&mut self, gs: &GraphicsState, x: f32, y: f32, w: f32, h: f32) {
        self.move_to(gs, x, y);
        self.line_to(gs, x + w, y);
        self.line_to(gs, x + w, y + h);
        self.line_to(gs, x, y + h);
        self.close();
    }

    pub fn round_rectangle(&mut self, gs: &GraphicsState, x: f32, y: f32, w: f32, h: f32, radius: f32) {
        let r = radius.max(0.0).min(w.abs() / 2.0).min(h.abs() / 2.0);
        if r == 0.0 {
            self.rectangle(gs, x, y, w, h);
            return;
        }
        self.move_to(gs, x + r, y);
        self.line_to(gs, x + w - r, y);
        self.arc_segments(gs, x + w - r, y + r, r, -FRAC_PI_2, FRAC_PI_2);
        self.line_to(gs, x + w, y + h - r);
        self.arc_segments(gs, x + w - r, y + h - r, r, 0.0, FRAC_PI_2);
        self.line_to(gs, x + r, y + h);
        self.arc_segments(gs, x + r, y + h - r, r, FRAC_PI_2, FRAC_PI_2);
        self.line_to(gs, x, y + r);
        self.arc_segments(gs, x + r, y + r, r, PI, FRAC_PI_2);
        self.close();
    }

    /// Close the current subpath back to its first point
    pub fn close(&mut self) {
        if self.state == PathState::OpenSubpath {
            self.segments.push(PathSegment::Close);
            self.current = self.start;
            self.state = PathState::ClosedSubpath;
            self.last_control = LastControl::None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Matrix;

    fn gs() -> GraphicsState {
        GraphicsState::new(100, 100)
    }

    #[test]
    fn test_relative_commands_resolve_against_current_point() {
        let gs = gs();
        let mut pb = PathBuilder::new(16);
        pb.move_to(&gs, 10.0, 10.0);
        pb.rel_line_to(&gs, 5.0, 0.0);
        pb.ver_line_to(&gs, 20.0);
        assert_eq!(
            pb.segments(),
            &[
                PathSegment::MoveTo(Point::new(10.0, 10.0)),
                PathSegment::LineTo(Point::new(15.0, 10.0)),
                PathSegment::LineTo(Point::new(15.0, 20.0)),
            ]
        );
        assert_eq!(pb.current_point(), Some(Point::new(15.0, 20.0)));
    }

    #[test]
    fn test_close_returns_to_subpath_start() {
        let gs = gs();
        let mut pb = PathBuilder::new(16);
        pb.move_to(&gs, 1.0, 1.0);
        pb.line_to(&gs, 5.0, 1.0);
        pb.close();
        assert_eq!(pb.state(), PathState::ClosedSubpath);
        assert_eq!(pb.current_point(), Some(Point::new(1.0, 1.0)));
        pb.line_to(&gs, 1.0, 9.0);
        assert_eq!(pb.state(), PathState::OpenSubpath);
        assert_eq!(pb.segments()[3], PathSegment::MoveTo(Point::new(1.0, 1.0)));
    }

    #[test]
    fn test_take_without_preserve_resets() {
        let gs = gs();
        let mut pb = PathBuilder::new(16);
        pb.rectangle(&gs, 0.0, 0.0, 4.0, 4.0);
        let kept = pb.take(true);
        assert_eq!(kept.len(), pb.segments().len());
        let taken = pb.take(false);
        assert_eq!(taken, kept);
        assert_eq!(pb.state(), PathState::NoPath);
        assert!(pb.is_empty());
    }

    #[test]
    fn test_full_circle_uses_bounded_segments() {
        let gs = gs();
        let mut pb = PathBuilder::new(16);
        pb.arc(&gs, 50.0, 50.0, 10.0, 0.0, TAU, false);
        let curves = pb
            .segments()
            .iter()
            .filter(|s| matches!(s, PathSegment::CurveTo(..)))
            .count();
        assert_eq!(curves, 4);
        let b = pb.extents().unwrap();
        assert!((b.x - 40.0).abs() < 0.1 && (b.max_x() - 60.0).abs() < 0.1);

        let mut capped = PathBuilder::new(2);
        capped.arc(&gs, 50.0, 50.0, 10.0, 0.0, TAU, false);
        assert_eq!(capped.segments().len(), 3);
    }

    #[test]
    fn test_anticlockwise_arc_takes_long_way() {
        let gs = gs();
        let mut pb = PathBuilder::new(16);
        pb.arc(&gs, 0.0, 0.0, 10.0, 0.0, FRAC_PI_2, true);
        let curves = pb
            .segments()
            .iter()
            .filter(|s| matches!(s, PathSegment::CurveTo(..)))
            .count();
        assert_eq!(curves, 3);
    }

    #[test]
    fn test_arc_to_ends_on_tangent() {
        let gs = gs();
        let mut pb = PathBuilder::new(16);
        pb.move_to(&gs, 0.0, 0.0);
        pb.arc_to(&gs, Point::new(10.0, 0.0), Point::new(10.0, 10.0), 5.0);
        let p = pb.current_point().unwrap();
        assert!((p.x - 10.0).abs() < 1e-3 && (p.y - 5.0).abs() < 1e-3);
    }

    #[test]
    fn test_segments_are_device_space() {
        let mut gs = gs();
        gs.apply_transform(&Matrix::scaling(2.0, 2.0));
        let mut pb = PathBuilder::new(16);
        pb.move_to(&gs, 3.0, 4.0);
        assert_eq!(pb.segments()[0], PathSegment::MoveTo(Point::new(6.0, 8.0)));
        assert_eq!(pb.current_point(), Some(Point::new(3.0, 4.0)));
    }

    #[test]
    fn test_perspective_flattens_curves() {
        let mut gs = gs();
        gs.set_transform(Matrix::from_array([1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.001, 0.0, 1.0]));
        let mut pb = PathBuilder::new(16);
        pb.move_to(&gs, 0.0, 0.0);
        pb.curve_to(&gs, Point::new(0.0, 50.0), Point::new(50.0, 50.0), Point::new(50.0, 0.0));
        assert!(pb.segments().len() > 2);
        assert!(pb.segments()[1..].iter().all(|s| matches!(s, PathSegment::LineTo(_))));
    }

    #[test]
    fn test_flatten_stays_within_tolerance() {
        let mut pts = vec![];
        flatten_cubic(
            Point::new(0.0, 0.0),
            Point::new(0.0, 100.0),
            Point::new(100.0, 100.0),
            Point::new(100.0, 0.0),
            0.25,
            &mut |p| pts.push(p),
        );
        assert!(pts.len() > 8);
        assert_eq!(*pts.last().unwrap(), Point::new(100.0, 0.0));
    }
}
