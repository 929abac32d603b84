//! Source sampling
//!
//! A [`Sampler`] produces premultiplied working-format colors for a run of
//! device pixels. Gradients and textures map pixel centers back through the
//! inverse of the transform captured when the source was set. Affine
//! texture mapping steps in 16.16 fixed point along the row; only
//! perspective falls back to a float divide per pixel.

use std::f32::consts::TAU;
use std::sync::Arc;

use ctx_core::state::{FIXED_ONE, FIXED_SHIFT};
use ctx_core::{Extend, GradientKind, PaintSource, PixelFormat, Transform, TransformClass};

use crate::buffer::PixelBuffer;
use crate::composite::{premultiply, Rgba};
use crate::format::{ops_for, PixelFormatOps};
use crate::gradient::{GradientCache, GradientRamp};

/// Texture-space coordinates are clamped to ±2^24 texels, in 16.16
const TEXEL_LIMIT: f64 = (1u64 << 40) as f64;

/// Resolves texture eids to pixel buffers
pub trait TextureLookup {
    fn texture(&self, eid: &str) -> Option<&PixelBuffer>;
}

/// Lookup with no textures, for rendering without a texture cache
pub struct NoTextures;

impl TextureLookup for NoTextures {
    fn texture(&self, _eid: &str) -> Option<&PixelBuffer> {
        None
    }
}

/// Per-span color source
pub enum Sampler<'a> {
    Solid(Rgba),
    Gradient(GradientSampler),
    Texture(TextureSampler<'a>),
}

impl<'a> Sampler<'a> {
    /// Resolve `source`. Sources that cannot paint anything (missing
    /// texture, singular transform, degenerate gradient) sample transparent.
    pub fn new(
        source: &PaintSource,
        extend: Extend,
        smoothing: bool,
        textures: &'a dyn TextureLookup,
        cache: &mut GradientCache,
    ) -> Self {
        match source {
            PaintSource::Solid(color) => Sampler::Solid(premultiply(color.to_rgba8())),
            PaintSource::Gradient { gradient, space } => {
                let Some(inverse) = space.inverse else {
                    return Sampler::Solid([0; 4]);
                };
                match GradientSampler::new(gradient.kind, cache.get(&gradient.stops), inverse, extend) {
                    Some(g) => Sampler::Gradient(g),
                    None => Sampler::Solid([0; 4]),
                }
            }
            PaintSource::Texture { eid, space } => {
                let (Some(inverse), Some(buffer)) = (space.inverse, textures.texture(eid)) else {
                    tracing::debug!("Texture {} unavailable, sampling transparent", eid);
                    return Sampler::Solid([0; 4]);
                };
                Sampler::Texture(TextureSampler::new(buffer, inverse, extend, smoothing))
            }
        }
    }

    /// Solid opaque sources let the compositor skip sampling entirely
    pub fn solid(&self) -> Option<Rgba> {
        match self {
            Sampler::Solid(c) => Some(*c),
            _ => None,
        }
    }

    /// Colors for pixels `x..x + out.len()` of row `y`
    pub fn fill_span(&self, x: i32, y: i32, out: &mut [Rgba]) {
        match self {
            Sampler::Solid(c) => out.fill(*c),
            Sampler::Gradient(g) => g.fill_span(x, y, out),
            Sampler::Texture(t) => t.fill_span(x, y, out),
        }
    }
}

/// Map a gradient parameter into 0..=1
#[inline]
fn extend_t(t: f32, extend: Extend) -> f32 {
    match extend {
        Extend::None | Extend::Pad => t.clamp(0.0, 1.0),
        Extend::Repeat => t - t.floor(),
        Extend::Reflect => {
            let m = t.rem_euclid(2.0);
            if m > 1.0 {
                2.0 - m
            } else {
                m
            }
        }
    }
}

/// Gradient geometry reduced to what the per-pixel loop needs
#[derive(Clone, Copy, Debug)]
enum Geometry {
    Linear { x0: f32, y0: f32, dx: f32, dy: f32, inv_len2: f32 },
    Radial { x0: f32, y0: f32, r0: f32, inv_dr: f32 },
    Conic { x: f32, y: f32, start: f32, cycles: f32 },
}

pub struct GradientSampler {
    ramp: Arc<GradientRamp>,
    geometry: Geometry,
    inverse: Transform,
    extend: Extend,
}

impl GradientSampler {
    /// `None` for geometry that paints nothing
    pub fn new(
        kind: GradientKind,
        ramp: Arc<GradientRamp>,
        inverse: Transform,
        extend: Extend,
    ) -> Option<Self> {
        let geometry = match kind {
            GradientKind::Linear { x0, y0, x1, y1 } => {
                let (dx, dy) = (x1 - x0, y1 - y0);
                let len2 = dx * dx + dy * dy;
                if len2 <= f32::EPSILON {
                    return None;
                }
                Geometry::Linear {
                    x0,
                    y0,
                    dx,
                    dy,
                    inv_len2: 1.0 / len2,
                }
            }
            GradientKind::Radial { x0, y0, r0, r1, .. } => {
                if (r1 - r0).abs() <= f32::EPSILON {
                    return None;
                }
                Geometry::Radial {
                    x0,
                    y0,
                    r0,
                    inv_dr: 1.0 / (r1 - r0),
                }
            }
            GradientKind::Conic {
                x,
                y,
                start_angle,
                cycles,
            } => Geometry::Conic {
                x,
                y,
                start: start_angle,
                cycles: if cycles > 0.0 { cycles } else { 1.0 },
            },
        };
        Some(Self {
            ramp,
            geometry,
            inverse,
            extend,
        })
    }

    /// Gradient parameter at gradient-space point (u, v), before extend
    #[inline]
    fn param(&self, u: f32, v: f32) -> f32 {
        match self.geometry {
            Geometry::Linear {
                x0,
                y0,
                dx,
                dy,
                inv_len2,
            } => ((u - x0) * dx + (v - y0) * dy) * inv_len2,
            Geometry::Radial { x0, y0, r0, inv_dr } => ((u - x0).hypot(v - y0) - r0) * inv_dr,
            Geometry::Conic {
                x,
                y,
                start,
                cycles,
            } => {
                let turn = ((v - y).atan2(u - x) - start) / TAU;
                (turn.rem_euclid(1.0) * cycles).fract()
            }
        }
    }

    #[inline]
    fn color(&self, u: f32, v: f32) -> Rgba {
        premultiply(self.ramp.lookup(extend_t(self.param(u, v), self.extend)))
    }

    pub fn fill_span(&self, x: i32, y: i32, out: &mut [Rgba]) {
        let cy = y as f32 + 0.5;
        if self.inverse.class() == TransformClass::Perspective {
            for (i, o) in out.iter_mut().enumerate() {
                let p = self.inverse.map(x as f32 + i as f32 + 0.5, cy);
                *o = self.color(p.x, p.y);
            }
            return;
        }

        let m = &self.inverse.matrix().m;
        let start = self.inverse.map(x as f32 + 0.5, cy);
        let (du, dv) = (m[0][0], m[1][0]);
        for (i, o) in out.iter_mut().enumerate() {
            let f = i as f32;
            *o = self.color(start.x + du * f, start.y + dv * f);
        }
    }
}

pub struct TextureSampler<'a> {
    buffer: &'a PixelBuffer,
    ops: &'static dyn PixelFormatOps,
    inverse: Transform,
    extend: Extend,
    smoothing: bool,
}

impl<'a> TextureSampler<'a> {
    pub fn new(buffer: &'a PixelBuffer, inverse: Transform, extend: Extend, smoothing: bool) -> Self {
        Self {
            buffer,
            ops: ops_for(buffer.format()),
            inverse,
            extend,
            smoothing,
        }
    }

    /// Resolve a texel coordinate along an axis of length `len`
    #[inline]
    fn wrap(&self, i: i64, len: u32) -> Option<u32> {
        let len = len as i64;
        let r = match self.extend {
            Extend::None => {
                if i < 0 || i >= len {
                    return None;
                }
                i
            }
            Extend::Pad => i.clamp(0, len - 1),
            Extend::Repeat => i.rem_euclid(len),
            Extend::Reflect => {
                let m = i.rem_euclid(2 * len);
                if m >= len {
                    2 * len - 1 - m
                } else {
                    m
                }
            }
        };
        Some(r as u32)
    }

    #[inline]
    fn texel(&self, x: i64, y: i64) -> Rgba {
        let (Some(x), Some(y)) = (self.wrap(x, self.buffer.width()), self.wrap(y, self.buffer.height())) else {
            return [0; 4];
        };
        let row = self.buffer.row(y);
        if self.buffer.format() == PixelFormat::Rgba8 {
            let at = x as usize * 4;
            return [row[at], row[at + 1], row[at + 2], row[at + 3]];
        }
        let mut out = [[0u8; 4]];
        self.ops.to_working(row, x as usize, &mut out);
        out[0]
    }

    /// Sample at texture-space 16.16 coordinates
    #[inline]
    fn sample(&self, u: i64, v: i64) -> Rgba {
        if !self.smoothing {
            return self.texel(u >> FIXED_SHIFT, v >> FIXED_SHIFT);
        }

        let half = (FIXED_ONE / 2) as i64;
        let (u, v) = (u.saturating_sub(half), v.saturating_sub(half));
        let (x0, y0) = (u >> FIXED_SHIFT, v >> FIXED_SHIFT);
        let fx = ((u >> 8) & 0xff) as u32;
        let fy = ((v >> 8) & 0xff) as u32;

        let a = self.texel(x0, y0);
        if fx == 0 && fy == 0 {
            return a;
        }
        let b = self.texel(x0 + 1, y0);
        let c = self.texel(x0, y0 + 1);
        let d = self.texel(x0 + 1, y0 + 1);

        let mut out = [0u8; 4];
        for i in 0..4 {
            let top = a[i] as u32 * (256 - fx) + b[i] as u32 * fx;
            let bottom = c[i] as u32 * (256 - fx) + d[i] as u32 * fx;
            out[i] = ((top * (256 - fy) + bottom * fy + (1 << 15)) >> 16) as u8;
        }
        out
    }

    pub fn fill_span(&self, x: i32, y: i32, out: &mut [Rgba]) {
        if self.inverse.class() == TransformClass::Perspective {
            let cy = y as f32 + 0.5;
            for (i, o) in out.iter_mut().enumerate() {
                let p = self.inverse.map(x as f32 + i as f32 + 0.5, cy);
                if !p.x.is_finite() || !p.y.is_finite() {
                    *o = [0; 4];
                    continue;
                }
                let u = (p.x as f64 * FIXED_ONE as f64).clamp(-TEXEL_LIMIT, TEXEL_LIMIT) as i64;
                let v = (p.y as f64 * FIXED_ONE as f64).clamp(-TEXEL_LIMIT, TEXEL_LIMIT) as i64;
                *o = self.sample(u, v);
            }
            return;
        }

        let fixed = self.inverse.fixed();
        let (mut u, mut v) = fixed.apply_pixel_center(x, y);
        let (du, dv) = fixed.row_step();
        for o in out.iter_mut() {
            *o = self.sample(u, v);
            u += du;
            v += dv;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctx_core::{Color, Gradient, GradientStop, Matrix, SourceSpace};

    fn black_to_white(kind: GradientKind) -> PaintSource {
        let mut gradient = Gradient::new(kind);
        gradient.add_stop(GradientStop::new(0.0, Color::BLACK));
        gradient.add_stop(GradientStop::new(1.0, Color::WHITE));
        PaintSource::Gradient {
            gradient,
            space: SourceSpace::new(Matrix::IDENTITY),
        }
    }

    fn checker() -> PixelBuffer {
        let mut buffer = PixelBuffer::new(2, 2, PixelFormat::Rgba8).unwrap();
        let data = buffer.data_mut();
        data[0..4].copy_from_slice(&[255, 0, 0, 255]);
        data[4..8].copy_from_slice(&[0, 255, 0, 255]);
        data[8..12].copy_from_slice(&[0, 0, 255, 255]);
        data[12..16].copy_from_slice(&[255, 255, 255, 255]);
        buffer
    }

    struct One(PixelBuffer);

    impl TextureLookup for One {
        fn texture(&self, eid: &str) -> Option<&PixelBuffer> {
            (eid == "tex").then_some(&self.0)
        }
    }

    fn texture_source(m: Matrix) -> PaintSource {
        PaintSource::Texture {
            eid: Arc::from("tex"),
            space: SourceSpace::new(m),
        }
    }

    #[test]
    fn test_linear_gradient_progression() {
        let mut cache = GradientCache::new(4);
        let source = black_to_white(GradientKind::Linear {
            x0: 0.0,
            y0: 0.0,
            x1: 256.0,
            y1: 0.0,
        });
        let sampler = Sampler::new(&source, Extend::Pad, true, &NoTextures, &mut cache);
        let mut out = [[0u8; 4]; 256];
        sampler.fill_span(0, 0, &mut out);
        assert!(out[0][0] <= 1);
        assert!(out[255][0] >= 254);
        assert!((out[128][0] as i32 - 128).abs() <= 1);
        assert!(out.windows(2).all(|w| w[0][0] <= w[1][0]));
    }

    #[test]
    fn test_extend_modes() {
        assert_eq!(extend_t(1.25, Extend::Pad), 1.0);
        assert_eq!(extend_t(1.25, Extend::None), 1.0);
        assert!((extend_t(1.25, Extend::Repeat) - 0.25).abs() < 1e-6);
        assert!((extend_t(1.25, Extend::Reflect) - 0.75).abs() < 1e-6);
        assert!((extend_t(-0.25, Extend::Reflect) - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_radial_gradient_rings() {
        let mut cache = GradientCache::new(4);
        let source = black_to_white(GradientKind::Radial {
            x0: 0.5,
            y0: 0.5,
            r0: 0.0,
            x1: 0.5,
            y1: 0.5,
            r1: 10.0,
        });
        let sampler = Sampler::new(&source, Extend::Pad, true, &NoTextures, &mut cache);
        let mut out = [[0u8; 4]; 12];
        sampler.fill_span(0, 0, &mut out);
        assert_eq!(out[0], [0, 0, 0, 255]);
        assert!((out[5][0] as i32 - 128).abs() <= 1);
        assert_eq!(out[11], [255, 255, 255, 255]);
    }

    #[test]
    fn test_degenerate_gradient_is_transparent() {
        let mut cache = GradientCache::new(4);
        let source = black_to_white(GradientKind::Linear {
            x0: 3.0,
            y0: 3.0,
            x1: 3.0,
            y1: 3.0,
        });
        let sampler = Sampler::new(&source, Extend::Pad, true, &NoTextures, &mut cache);
        assert_eq!(sampler.solid(), Some([0; 4]));
    }

    #[test]
    fn test_texture_identity_copy() {
        let mut cache = GradientCache::new(4);
        let textures = One(checker());
        for smoothing in [false, true] {
            let sampler = Sampler::new(
                &texture_source(Matrix::IDENTITY),
                Extend::None,
                smoothing,
                &textures,
                &mut cache,
            );
            let mut out = [[9u8; 4]; 3];
            sampler.fill_span(0, 1, &mut out);
            assert_eq!(out[0], [0, 0, 255, 255]);
            assert_eq!(out[1], [255, 255, 255, 255]);
            if !smoothing {
                assert_eq!(out[2], [0; 4]);
            }
        }
    }

    #[test]
    fn test_texture_repeat_and_translate() {
        let mut cache = GradientCache::new(4);
        let textures = One(checker());
        let sampler = Sampler::new(
            &texture_source(Matrix::translation(1.0, 0.0)),
            Extend::Repeat,
            false,
            &textures,
            &mut cache,
        );
        let mut out = [[0u8; 4]; 4];
        sampler.fill_span(0, 0, &mut out);
        assert_eq!(out[0], [0, 255, 0, 255]);
        assert_eq!(out[1], [255, 0, 0, 255]);
        assert_eq!(out[2], [0, 255, 0, 255]);
    }

    #[test]
    fn test_missing_texture_samples_transparent() {
        let mut cache = GradientCache::new(4);
        let sampler = Sampler::new(
            &texture_source(Matrix::IDENTITY),
            Extend::Pad,
            true,
            &NoTextures,
            &mut cache,
        );
        assert_eq!(sampler.solid(), Some([0; 4]));
    }

    #[test]
    fn test_far_perspective_coordinates_pad() {
        let texture = checker();
        let inverse = Transform::new(Matrix {
            m: [[-1e30, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 1e-6, 1.0]],
        });
        for smoothing in [false, true] {
            for extend in [Extend::Pad, Extend::Repeat, Extend::Reflect] {
                let sampler = TextureSampler::new(&texture, inverse, extend, smoothing);
                let mut out = [[9u8; 4]; 4];
                sampler.fill_span(0, 0, &mut out);
                if extend == Extend::Pad {
                    assert!(out.iter().all(|px| *px == [255, 0, 0, 255]), "{out:?}");
                }
            }
        }
    }

    #[test]
    fn test_bilinear_blends_neighbors() {
        let mut cache = GradientCache::new(4);
        let textures = One(checker());
        let sampler = Sampler::new(
            &texture_source(Matrix::translation(0.5, 0.0)),
            Extend::Pad,
            true,
            &textures,
            &mut cache,
        );
        let mut out = [[0u8; 4]; 1];
        sampler.fill_span(1, 0, &mut out);
        assert_eq!(out[0], [128, 128, 0, 255]);
    }
}
