//! Current transform with its derived fixed-point form

use crate::geometry::{Matrix, Point};

/// Fractional bits of [`FixedMatrix`] entries
pub const FIXED_SHIFT: u32 = 16;
pub const FIXED_ONE: i32 = 1 << FIXED_SHIFT;

/// Shape of a transform, from cheapest to most general
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TransformClass {
    #[default]
    Identity,
    ScaleTranslate,
    Affine,
    Perspective,
}

impl TransformClass {
    pub fn of(m: &Matrix) -> Self {
        if m.is_projective() {
            TransformClass::Perspective
        } else if m.m[0][1] != 0.0 || m.m[1][0] != 0.0 {
            TransformClass::Affine
        } else if m.is_identity() {
            TransformClass::Identity
        } else {
            TransformClass::ScaleTranslate
        }
    }
}

/// Affine part of a matrix in 16.16 fixed point
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct FixedMatrix {
    pub m: [[i32; 3]; 2],
}

fn to_fixed(v: f32) -> i32 {
    (v as f64 * FIXED_ONE as f64)
        .round()
        .clamp(i32::MIN as f64, i32::MAX as f64) as i32
}

impl FixedMatrix {
    pub fn from_matrix(m: &Matrix) -> Self {
        Self {
            m: [
                [to_fixed(m.m[0][0]), to_fixed(m.m[0][1]), to_fixed(m.m[0][2])],
                [to_fixed(m.m[1][0]), to_fixed(m.m[1][1]), to_fixed(m.m[1][2])],
            ],
        }
    }

    /// Map an integer point, returning 16.16 coordinates
    pub fn apply_int(&self, x: i32, y: i32) -> (i64, i64) {
        let m = &self.m;
        let (x, y) = (x as i64, y as i64);
        (
            m[0][0] as i64 * x + m[0][1] as i64 * y + m[0][2] as i64,
            m[1][0] as i64 * x + m[1][1] as i64 * y + m[1][2] as i64,
        )
    }

    /// Map the center of pixel (x, y), returning 16.16 coordinates
    pub fn apply_pixel_center(&self, x: i32, y: i32) -> (i64, i64) {
        let m = &self.m;
        let half = (FIXED_ONE / 2) as i64;
        let fx = ((x as i64) << FIXED_SHIFT) + half;
        let fy = ((y as i64) << FIXED_SHIFT) + half;
        (
            ((m[0][0] as i64 * fx + m[0][1] as i64 * fy) >> FIXED_SHIFT) + m[0][2] as i64,
            ((m[1][0] as i64 * fx + m[1][1] as i64 * fy) >> FIXED_SHIFT) + m[1][2] as i64,
        )
    }

    /// Per-pixel step along a row: (du/dx, dv/dx) in 16.16
    pub fn row_step(&self) -> (i64, i64) {
        (self.m[0][0] as i64, self.m[1][0] as i64)
    }
}

/// A transform matrix with cached classification and fixed-point form.
///
/// All three are recomputed together in [`Transform::set`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Transform {
    matrix: Matrix,
    fixed: FixedMatrix,
    class: TransformClass,
}

impl Transform {
    pub fn new(matrix: Matrix) -> Self {
        let mut t = Self::default();
        t.set(matrix);
        t
    }

    pub fn identity() -> Self {
        Self::new(Matrix::IDENTITY)
    }

    pub fn set(&mut self, matrix: Matrix) {
        self.matrix = matrix;
        self.class = TransformClass::of(&matrix);
        self.fixed = FixedMatrix::from_matrix(&matrix);
    }

    /// Prepend `m` so it applies before the current transform
    pub fn apply_first(&mut self, m: &Matrix) {
        self.set(self.matrix.multiply(m));
    }

    pub fn matrix(&self) -> &Matrix {
        &self.matrix
    }

    pub fn fixed(&self) -> &FixedMatrix {
        &self.fixed
    }

    pub fn class(&self) -> TransformClass {
        self.class
    }

    /// Map a user-space point to device space
    pub fn map(&self, x: f32, y: f32) -> Point {
        let m = &self.matrix.m;
        match self.class {
            TransformClass::Identity => Point::new(x, y),
            TransformClass::ScaleTranslate => {
                Point::new(m[0][0] * x + m[0][2], m[1][1] * y + m[1][2])
            }
            TransformClass::Affine | TransformClass::Perspective => self.matrix.apply_point(Point::new(x, y)),
        }
    }

    pub fn scale_factor(&self) -> f32 {
        self.matrix.scale_factor()
    }

    pub fn invert(&self) -> Option<Transform> {
        self.matrix.invert().map(Transform::new)
    }
}
