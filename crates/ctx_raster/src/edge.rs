//! Edge table
//!
//! Paths are flattened to line segments and stored as edges in sub-scanline
//! space: with `S` samples per pixel row, sub-scanline `k` samples at
//! `y = (k + 0.5) / S`. Each edge records the first and one-past-last
//! sub-scanline it crosses, already clamped to the clip rows, and its x at
//! the first crossed sub-scanline inside the clip plus a per-sub-scanline
//! step, both in fixed point and clamped to [`EDGE_LIMIT`] pixels.

use ctx_core::path::{flatten_cubic, flatten_quad};
use ctx_core::{IntRect, PathSegment, Point};

/// Fractional bits of edge x and slope
pub const EDGE_SHIFT: u32 = 24;
pub const EDGE_ONE: i64 = 1 << EDGE_SHIFT;

/// Edge x and slope are clamped to this many pixels either side of the
/// origin, which keeps the sweep's fixed-point stepping inside `i64`
pub const EDGE_LIMIT: f64 = (1u64 << 24) as f64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Edge {
    /// First sub-scanline crossed
    pub top: i32,
    /// One past the last sub-scanline crossed
    pub bottom: i32,
    /// x at `top`, fixed point
    pub x: i64,
    /// x step per sub-scanline, fixed point
    pub dx: i64,
    /// +1 for downward edges, -1 for upward
    pub winding: i8,
}

/// Bounded list of edges for one fill
#[derive(Debug)]
pub struct EdgeTable {
    edges: Vec<Edge>,
    capacity: usize,
    overflowed: bool,
    samples: i32,
    clip: IntRect,
}

impl EdgeTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            edges: Vec::with_capacity(capacity.min(4096)),
            capacity,
            overflowed: false,
            samples: 1,
            clip: IntRect::EMPTY,
        }
    }

    /// Empty the table for a fill with `samples` sub-scanlines per row,
    /// limited to the rows of `clip`
    pub fn reset(&mut self, samples: u32, clip: IntRect) {
        self.edges.clear();
        self.overflowed = false;
        self.samples = samples.max(1) as i32;
        self.clip = clip;
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether edges were dropped since the last reset
    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    pub fn samples(&self) -> u32 {
        self.samples as u32
    }

    /// Order edges by first sub-scanline for the sweep
    pub fn sort(&mut self) {
        self.edges.sort_unstable_by_key(|e| (e.top, e.x));
    }

    /// Add the line from `a` to `b`
    pub fn add_line(&mut self, a: Point, b: Point) {
        if a.y == b.y || !(a.x.is_finite() && a.y.is_finite() && b.x.is_finite() && b.y.is_finite()) {
            return;
        }
        let (p0, p1, winding) = if a.y < b.y { (a, b, 1) } else { (b, a, -1) };

        let s = self.samples as f64;
        let (x0, y0, x1, y1) = (p0.x as f64, p0.y as f64, p1.x as f64, p1.y as f64);
        let top = (y0 * s - 0.5).ceil().max(self.clip.y0 as f64 * s);
        let bottom = (y1 * s - 0.5).ceil().min(self.clip.y1 as f64 * s);
        if top >= bottom || !(top.abs() < i32::MAX as f64 && bottom.abs() < i32::MAX as f64) {
            return;
        }

        if self.edges.len() >= self.capacity {
            if !self.overflowed {
                tracing::warn!("Edge table full at {} edges, dropping the rest of the path", self.capacity);
            }
            self.overflowed = true;
            return;
        }

        // x at the clipped top, interpolated from the nearer endpoint so
        // far-away vertices do not cancel out the visible part
        let slope = (x1 - x0) / (y1 - y0);
        let yt = (top + 0.5) / s;
        let x = if yt - y0 <= y1 - yt {
            x0 + (yt - y0) * slope
        } else {
            x1 - (y1 - yt) * slope
        };
        let x = x.clamp(-EDGE_LIMIT, EDGE_LIMIT);
        let dx = (slope / s).clamp(-EDGE_LIMIT, EDGE_LIMIT);
        self.edges.push(Edge {
            top: top as i32,
            bottom: bottom as i32,
            x: (x * EDGE_ONE as f64) as i64,
            dx: (dx * EDGE_ONE as f64) as i64,
            winding,
        });
    }

    /// Add a closed polygon
    pub fn add_polygon(&mut self, points: &[Point]) {
        if points.len() < 2 {
            return;
        }
        for pair in points.windows(2) {
            self.add_line(pair[0], pair[1]);
        }
        self.add_line(points[points.len() - 1], points[0]);
    }

    /// Flatten and add a device-space path. Open subpaths are closed
    /// implicitly. `tolerance` is a squared distance.
    pub fn add_path(&mut self, path: &[PathSegment], tolerance: f32) {
        let mut start = Point::ZERO;
        let mut current = Point::ZERO;
        for segment in path {
            match *segment {
                PathSegment::MoveTo(p) => {
                    self.add_line(current, start);
                    start = p;
                    current = p;
                }
                PathSegment::LineTo(p) => {
                    self.add_line(current, p);
                    current = p;
                }
                PathSegment::QuadTo(c, p) => {
                    let mut prev = current;
                    flatten_quad(current, c, p, tolerance, &mut |q| {
                        self.add_line(prev, q);
                        prev = q;
                    });
                    current = p;
                }
                PathSegment::CurveTo(c0, c1, p) => {
                    let mut prev = current;
                    flatten_cubic(current, c0, c1, p, tolerance, &mut |q| {
                        self.add_line(prev, q);
                        prev = q;
                    });
                    current = p;
                }
                PathSegment::Close => {
                    self.add_line(current, start);
                    current = start;
                }
            }
        }
        self.add_line(current, start);
    }
}
