//! Paint sources: solid colors, gradients and textures
//!
//! Gradient and texture sources snapshot the user-to-device transform in
//! effect when they are set. The sampler only ever sees the inverse, mapping
//! device pixels back into source space.

use std::sync::Arc;

use crate::color::{Color, GradientStop};
use crate::geometry::Matrix;
use crate::state::Transform;

/// Geometry of a gradient in its own coordinate space
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GradientKind {
    Linear {
        x0: f32,
        y0: f32,
        x1: f32,
        y1: f32,
    },
    Radial {
        x0: f32,
        y0: f32,
        r0: f32,
        x1: f32,
        y1: f32,
        r1: f32,
    },
    Conic {
        x: f32,
        y: f32,
        start_angle: f32,
        cycles: f32,
    },
}

/// Gradient geometry plus its stop list.
///
/// Stops are shared between saved states; adding a stop copies the list
/// only if another state still references it.
#[derive(Clone, Debug, PartialEq)]
pub struct Gradient {
    pub kind: GradientKind,
    pub stops: Arc<Vec<GradientStop>>,
}

impl Gradient {
    pub fn new(kind: GradientKind) -> Self {
        Self {
            kind,
            stops: Arc::new(Vec::new()),
        }
    }

    pub fn add_stop(&mut self, stop: GradientStop) {
        Arc::make_mut(&mut self.stops).push(stop);
    }
}

/// Placement shared by gradient and texture sources
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SourceSpace {
    /// User-to-device transform at the time the source was set
    pub user: Matrix,
    /// Extra transform applied in source space
    pub source: Matrix,
    /// Device-to-source mapping; `None` when singular
    pub inverse: Option<Transform>,
}

impl SourceSpace {
    pub fn new(user: Matrix) -> Self {
        let mut space = Self {
            user,
            source: Matrix::IDENTITY,
            inverse: None,
        };
        space.update();
        space
    }

    pub fn set_source_transform(&mut self, source: Matrix) {
        self.source = source;
        self.update();
    }

    fn update(&mut self) {
        self.inverse = self
            .user
            .multiply(&self.source)
            .invert()
            .map(Transform::new);
    }
}

/// What a fill or stroke paints with
#[derive(Clone, Debug, PartialEq)]
pub enum PaintSource {
    Solid(Color),
    Gradient {
        gradient: Gradient,
        space: SourceSpace,
    },
    Texture {
        /// Identifier of the texture in the renderer's cache
        eid: Arc<str>,
        space: SourceSpace,
    },
}

impl Default for PaintSource {
    fn default() -> Self {
        PaintSource::Solid(Color::BLACK)
    }
}

impl PaintSource {
    /// Solid color, if this is one
    pub fn solid(&self) -> Option<Color> {
        match self {
            PaintSource::Solid(c) => Some(*c),
            _ => None,
        }
    }

    pub fn space_mut(&mut self) -> Option<&mut SourceSpace> {
        match self {
            PaintSource::Solid(_) => None,
            PaintSource::Gradient { space, .. } | PaintSource::Texture { space, .. } => {
                Some(space)
            }
        }
    }

    pub fn texture_eid(&self) -> Option<&str> {
        match self {
            PaintSource::Texture { eid, .. } => Some(eid),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stops_copy_on_write() {
        let mut g = Gradient::new(GradientKind::Linear {
            x0: 0.0,
            y0: 0.0,
            x1: 1.0,
            y1: 0.0,
        });
        g.add_stop(GradientStop::new(0.0, Color::BLACK));
        let saved = g.clone();
        g.add_stop(GradientStop::new(1.0, Color::WHITE));
        assert_eq!(saved.stops.len(), 1);
        assert_eq!(g.stops.len(), 2);
    }

    #[test]
    fn test_source_space_inverse() {
        let mut space = SourceSpace::new(Matrix::translation(10.0, 0.0));
        space.set_source_transform(Matrix::scaling(2.0, 2.0));
        let inv = space.inverse.unwrap();
        let p = inv.map(14.0, 4.0);
        assert!((p.x - 2.0).abs() < 1e-5 && (p.y - 2.0).abs() < 1e-5);

        space.set_source_transform(Matrix::scaling(0.0, 1.0));
        assert!(space.inverse.is_none());
    }
}
