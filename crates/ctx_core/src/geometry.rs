//! Geometry primitives: points, rectangles and the 3×3 transform matrix.

/// 2D point
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: Point) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn lerp(a: Point, b: Point, t: f32) -> Point {
        Point::new(a.x + (b.x - a.x) * t, a.y + (b.y - a.y) * t)
    }
}

/// Floating point rectangle (origin + size)
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const ZERO: Rect = Rect {
        x: 0.0,
        y: 0.0,
        width: 0.0,
        height: 0.0,
    };

    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build a rectangle spanning two corners in any order
    pub fn from_corners(a: Point, b: Point) -> Self {
        let x0 = a.x.min(b.x);
        let y0 = a.y.min(b.y);
        Self::new(x0, y0, (a.x - b.x).abs(), (a.y - b.y).abs())
    }

    pub fn max_x(&self) -> f32 {
        self.x + self.width
    }

    pub fn max_y(&self) -> f32 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Smallest rectangle containing both
    pub fn union(&self, other: &Rect) -> Rect {
        let x0 = self.x.min(other.x);
        let y0 = self.y.min(other.y);
        let x1 = self.max_x().max(other.max_x());
        let y1 = self.max_y().max(other.max_y());
        Rect::new(x0, y0, x1 - x0, y1 - y0)
    }

    /// Grow to contain `p`
    pub fn include(&mut self, p: Point) {
        let x0 = self.x.min(p.x);
        let y0 = self.y.min(p.y);
        let x1 = self.max_x().max(p.x);
        let y1 = self.max_y().max(p.y);
        *self = Rect::new(x0, y0, x1 - x0, y1 - y0);
    }
}

/// Integer pixel rectangle with exclusive max edges
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct IntRect {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl IntRect {
    pub const EMPTY: IntRect = IntRect {
        x0: 0,
        y0: 0,
        x1: 0,
        y1: 0,
    };

    pub const fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub const fn from_size(width: u32, height: u32) -> Self {
        Self::new(0, 0, width as i32, height as i32)
    }

    /// Every pixel touched by `rect`
    pub fn covering(rect: &Rect) -> Self {
        Self::new(
            rect.x.floor() as i32,
            rect.y.floor() as i32,
            rect.max_x().ceil() as i32,
            rect.max_y().ceil() as i32,
        )
    }

    pub fn width(&self) -> i32 {
        (self.x1 - self.x0).max(0)
    }

    pub fn height(&self) -> i32 {
        (self.y1 - self.y0).max(0)
    }

    pub fn is_empty(&self) -> bool {
        self.x1 <= self.x0 || self.y1 <= self.y0
    }

    pub fn intersect(&self, other: &IntRect) -> IntRect {
        IntRect::new(
            self.x0.max(other.x0),
            self.y0.max(other.y0),
            self.x1.min(other.x1),
            self.y1.min(other.y1),
        )
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x0 && x < self.x1 && y >= self.y0 && y < self.y1
    }
}

/// 3×3 transform matrix, row-major, applied to column vectors.
///
/// ```text
/// | m[0][0] m[0][1] m[0][2] |   | x |
/// | m[1][0] m[1][1] m[1][2] | * | y |
/// | m[2][0] m[2][1] m[2][2] |   | 1 |
/// ```
///
/// A bottom row other than `0 0 1` makes the matrix projective.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Matrix {
    pub m: [[f32; 3]; 3],
}

impl Default for Matrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix {
        m: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
    };

    /// Affine matrix from canvas-style `a b c d e f` components
    pub const fn affine(a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> Self {
        Self {
            m: [[a, c, e], [b, d, f], [0.0, 0.0, 1.0]],
        }
    }

    /// Matrix from nine row-major values
    pub const fn from_array(v: [f32; 9]) -> Self {
        Self {
            m: [[v[0], v[1], v[2]], [v[3], v[4], v[5]], [v[6], v[7], v[8]]],
        }
    }

    pub const fn to_array(&self) -> [f32; 9] {
        let m = self.m;
        [
            m[0][0], m[0][1], m[0][2], m[1][0], m[1][1], m[1][2], m[2][0], m[2][1], m[2][2],
        ]
    }

    pub const fn translation(x: f32, y: f32) -> Self {
        Self::affine(1.0, 0.0, 0.0, 1.0, x, y)
    }

    pub const fn scaling(sx: f32, sy: f32) -> Self {
        Self::affine(sx, 0.0, 0.0, sy, 0.0, 0.0)
    }

    pub fn rotation(radians: f32) -> Self {
        let (s, c) = radians.sin_cos();
        Self::affine(c, s, -s, c, 0.0, 0.0)
    }

    /// Matrix product `self * other`; the result applies `other` first.
    pub fn multiply(&self, other: &Matrix) -> Matrix {
        let a = &self.m;
        let b = &other.m;
        let mut out = [[0.0f32; 3]; 3];
        for (r, row) in out.iter_mut().enumerate() {
            for (c, cell) in row.iter_mut().enumerate() {
                *cell = a[r][0] * b[0][c] + a[r][1] * b[1][c] + a[r][2] * b[2][c];
            }
        }
        Matrix { m: out }
    }

    /// Prepend `other` so it applies before the current transform
    pub fn pre_multiply(&mut self, other: &Matrix) {
        *self = self.multiply(other);
    }

    pub fn determinant(&self) -> f32 {
        let m = &self.m;
        m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
            - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
            + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
    }

    /// Inverse matrix, `None` when singular
    pub fn invert(&self) -> Option<Matrix> {
        let det = self.determinant();
        if det.abs() < f32::EPSILON * 1e-3 || !det.is_finite() {
            return None;
        }
        let m = &self.m;
        let inv = 1.0 / det;
        Some(Matrix {
            m: [
                [
                    (m[1][1] * m[2][2] - m[1][2] * m[2][1]) * inv,
                    (m[0][2] * m[2][1] - m[0][1] * m[2][2]) * inv,
                    (m[0][1] * m[1][2] - m[0][2] * m[1][1]) * inv,
                ],
                [
                    (m[1][2] * m[2][0] - m[1][0] * m[2][2]) * inv,
                    (m[0][0] * m[2][2] - m[0][2] * m[2][0]) * inv,
                    (m[0][2] * m[1][0] - m[0][0] * m[1][2]) * inv,
                ],
                [
                    (m[1][0] * m[2][1] - m[1][1] * m[2][0]) * inv,
                    (m[0][1] * m[2][0] - m[0][0] * m[2][1]) * inv,
                    (m[0][0] * m[1][1] - m[0][1] * m[1][0]) * inv,
                ],
            ],
        })
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    pub fn is_projective(&self) -> bool {
        let m = &self.m;
        m[2][0] != 0.0 || m[2][1] != 0.0 || m[2][2] != 1.0
    }

    /// Map a point, dividing by w for projective matrices
    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        let m = &self.m;
        let tx = m[0][0] * x + m[0][1] * y + m[0][2];
        let ty = m[1][0] * x + m[1][1] * y + m[1][2];
        if !self.is_projective() {
            return (tx, ty);
        }
        let w = m[2][0] * x + m[2][1] * y + m[2][2];
        let w = if w.abs() < 1e-6 { 1e-6f32.copysign(w) } else { w };
        (tx / w, ty / w)
    }

    pub fn apply_point(&self, p: Point) -> Point {
        let (x, y) = self.apply(p.x, p.y);
        Point::new(x, y)
    }

    /// Map a direction vector, ignoring translation (affine part only)
    pub fn apply_vector(&self, dx: f32, dy: f32) -> (f32, f32) {
        let m = &self.m;
        (m[0][0] * dx + m[0][1] * dy, m[1][0] * dx + m[1][1] * dy)
    }

    /// Largest axis scale of the linear part
    pub fn scale_factor(&self) -> f32 {
        let m = &self.m;
        let sx = m[0][0].hypot(m[1][0]);
        let sy = m[0][1].hypot(m[1][1]);
        sx.max(sy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: (f32, f32), b: (f32, f32)) -> bool {
        (a.0 - b.0).abs() < 1e-4 && (a.1 - b.1).abs() < 1e-4
    }

    #[test]
    fn test_multiply_order() {
        // translate then scale: scale applies first to the point
        let m = Matrix::translation(10.0, 0.0).multiply(&Matrix::scaling(2.0, 2.0));
        assert!(close(m.apply(1.0, 1.0), (12.0, 2.0)));
    }

    #[test]
    fn test_invert_roundtrip() {
        let m = Matrix::translation(3.0, -4.0)
            .multiply(&Matrix::rotation(0.7))
            .multiply(&Matrix::scaling(2.0, 0.5));
        let inv = m.invert().unwrap();
        let (x, y) = m.apply(5.0, 7.0);
        assert!(close(inv.apply(x, y), (5.0, 7.0)));
    }

    #[test]
    fn test_singular_has_no_inverse() {
        assert!(Matrix::scaling(0.0, 1.0).invert().is_none());
    }

    #[test]
    fn test_projective_divide() {
        let m = Matrix::from_array([1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 2.0]);
        assert!(m.is_projective());
        assert!(close(m.apply(4.0, 6.0), (2.0, 3.0)));
    }

    #[test]
    fn test_int_rect_intersect() {
        let a = IntRect::new(0, 0, 10, 10);
        let b = IntRect::new(5, -5, 20, 4);
        assert_eq!(a.intersect(&b), IntRect::new(5, 0, 10, 4));
        assert!(IntRect::new(3, 3, 3, 9).is_empty());
    }
}
