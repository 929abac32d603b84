//! Porter-Duff compositing and color blending
//!
//! All arithmetic happens in the working format: premultiplied RGBA, eight
//! bits per channel. Porter-Duff operators are expressed as a pair of
//! factors `(Fa, Fb)` so that
//!
//! ```text
//! result = src * Fa + dst * Fb
//! ```
//!
//! and coverage (combined with global alpha) linearly interpolates between
//! the untouched destination and that result. Blend modes other than
//! `Normal` first replace the source color with the blended one, per the
//! W3C compositing model, and then go through the same operator.

use ctx_core::{BlendMode, CompositingMode};

/// A premultiplied RGBA8 pixel
pub type Rgba = [u8; 4];

/// `round(x / 255)` for `x` up to `255 * 255`; larger inputs saturate
#[inline]
pub fn div255(x: u32) -> u8 {
    let x = x.min(255 * 255);
    (((x + 128) * 257) >> 16) as u8
}

/// Premultiply a straight-alpha color
#[inline]
pub fn premultiply(c: [u8; 4]) -> Rgba {
    let a = c[3] as u32;
    match a {
        255 => c,
        0 => [0; 4],
        _ => [
            div255(c[0] as u32 * a),
            div255(c[1] as u32 * a),
            div255(c[2] as u32 * a),
            c[3],
        ],
    }
}

/// Recover straight alpha from a premultiplied color
#[inline]
pub fn unpremultiply(c: Rgba) -> [u8; 4] {
    let a = c[3] as u32;
    match a {
        255 => c,
        0 => [0; 4],
        _ => {
            let un = |v: u8| ((v as u32 * 255 + a / 2) / a).min(255) as u8;
            [un(c[0]), un(c[1]), un(c[2]), c[3]]
        }
    }
}

/// Everything besides coverage that decides how a source pixel lands
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompositeOp {
    pub compositing: CompositingMode,
    pub blend: BlendMode,
    pub global_alpha: u8,
}

impl Default for CompositeOp {
    fn default() -> Self {
        Self {
            compositing: CompositingMode::SourceOver,
            blend: BlendMode::Normal,
            global_alpha: 255,
        }
    }
}

impl CompositeOp {
    pub fn new(compositing: CompositingMode, blend: BlendMode, global_alpha: u8) -> Self {
        Self {
            compositing,
            blend,
            global_alpha,
        }
    }

    /// Normal source-over, the case the span fast path handles
    pub fn is_source_over(&self) -> bool {
        self.compositing == CompositingMode::SourceOver && self.blend == BlendMode::Normal
    }

    /// Coverage scaled by global alpha
    #[inline]
    pub fn effective_alpha(&self, coverage: u8) -> u8 {
        if self.global_alpha == 255 {
            coverage
        } else {
            div255(coverage as u32 * self.global_alpha as u32)
        }
    }

    /// Composite one pixel
    #[inline]
    pub fn apply(&self, src: Rgba, dst: Rgba, coverage: u8) -> Rgba {
        let a = self.effective_alpha(coverage);
        if a == 0 {
            return dst;
        }

        let src = if self.blend == BlendMode::Normal {
            src
        } else {
            blend_source(self.blend, src, dst)
        };

        let (fa, fb) = porter_duff(self.compositing, src[3], dst[3]);
        let mut out = [0u8; 4];
        for i in 0..4 {
            out[i] = div255(src[i] as u32 * fa + dst[i] as u32 * fb);
        }

        if a == 255 {
            out
        } else {
            let inv = 255 - a as u32;
            for i in 0..4 {
                out[i] = div255(out[i] as u32 * a as u32 + dst[i] as u32 * inv);
            }
            out
        }
    }

    /// Composite a span of source pixels onto a span of destination pixels
    /// with a uniform coverage
    pub fn apply_span(&self, src: &[Rgba], dst: &mut [Rgba], coverage: u8) {
        if self.is_source_over() && self.effective_alpha(coverage) == 255 {
            source_over_opaque(src, dst);
            return;
        }
        for (d, s) in dst.iter_mut().zip(src) {
            *d = self.apply(*s, *d, coverage);
        }
    }
}

/// Source-over at full coverage. Produces the same bits as
/// [`CompositeOp::apply`] without the factor table or the coverage lerp,
/// including for channels above alpha, which saturate.
#[inline]
pub fn source_over_opaque(src: &[Rgba], dst: &mut [Rgba]) {
    for (d, s) in dst.iter_mut().zip(src) {
        match s[3] {
            255 => *d = *s,
            0 => {}
            a => {
                let inv = 255 - a as u32;
                for i in 0..4 {
                    d[i] = s[i].saturating_add(div255(d[i] as u32 * inv));
                }
            }
        }
    }
}

/// `(Fa, Fb)` in 0..=255 for source alpha `sa` and backdrop alpha `da`
#[inline]
fn porter_duff(mode: CompositingMode, sa: u8, da: u8) -> (u32, u32) {
    let (sa, da) = (sa as u32, da as u32);
    match mode {
        CompositingMode::Clear => (0, 0),
        CompositingMode::Copy => (255, 0),
        CompositingMode::Destination => (0, 255),
        CompositingMode::SourceOver => (255, 255 - sa),
        CompositingMode::DestinationOver => (255 - da, 255),
        CompositingMode::SourceIn => (da, 0),
        CompositingMode::DestinationIn => (0, sa),
        CompositingMode::SourceOut => (255 - da, 0),
        CompositingMode::DestinationOut => (0, 255 - sa),
        CompositingMode::SourceAtop => (da, 255 - sa),
        CompositingMode::DestinationAtop => (255 - da, sa),
        CompositingMode::Xor => (255 - da, 255 - sa),
    }
}

/// Replace the source color with `(1 - ab) * Cs + ab * B(Cb, Cs)`,
/// keeping the source alpha
fn blend_source(mode: BlendMode, src: Rgba, dst: Rgba) -> Rgba {
    let sa = src[3] as f32 / 255.0;
    let da = dst[3] as f32 / 255.0;
    if sa == 0.0 {
        return src;
    }

    let straight = |c: Rgba, a: f32| -> [f32; 3] {
        if a == 0.0 {
            [0.0; 3]
        } else {
            [
                c[0] as f32 / 255.0 / a,
                c[1] as f32 / 255.0 / a,
                c[2] as f32 / 255.0 / a,
            ]
        }
    };
    let cs = straight(src, sa);
    let cb = straight(dst, da);
    let b = blend_color(mode, cb, cs);

    let mut out = [0u8; 4];
    for i in 0..3 {
        let v = (1.0 - da) * cs[i] * sa + da * sa * b[i];
        out[i] = (v * 255.0 + 0.5).clamp(0.0, src[3] as f32) as u8;
    }
    out[3] = src[3];
    out
}

fn blend_color(mode: BlendMode, cb: [f32; 3], cs: [f32; 3]) -> [f32; 3] {
    match mode {
        BlendMode::Hue => set_lum(set_sat(cs, sat(cb)), lum(cb)),
        BlendMode::Saturation => set_lum(set_sat(cb, sat(cs)), lum(cb)),
        BlendMode::Color => set_lum(cs, lum(cb)),
        BlendMode::Luminosity => set_lum(cb, lum(cs)),
        _ => [
            blend_channel(mode, cb[0], cs[0]),
            blend_channel(mode, cb[1], cs[1]),
            blend_channel(mode, cb[2], cs[2]),
        ],
    }
}

fn blend_channel(mode: BlendMode, cb: f32, cs: f32) -> f32 {
    let v = match mode {
        BlendMode::Normal => cs,
        BlendMode::Multiply => cb * cs,
        BlendMode::Screen => cb + cs - cb * cs,
        BlendMode::Overlay => hard_light(cs, cb),
        BlendMode::Darken => cb.min(cs),
        BlendMode::Lighten => cb.max(cs),
        BlendMode::ColorDodge => {
            if cb == 0.0 {
                0.0
            } else if cs >= 1.0 {
                1.0
            } else {
                (cb / (1.0 - cs)).min(1.0)
            }
        }
        BlendMode::ColorBurn => {
            if cb >= 1.0 {
                1.0
            } else if cs <= 0.0 {
                0.0
            } else {
                1.0 - ((1.0 - cb) / cs).min(1.0)
            }
        }
        BlendMode::HardLight => hard_light(cb, cs),
        BlendMode::SoftLight => {
            if cs <= 0.5 {
                cb - (1.0 - 2.0 * cs) * cb * (1.0 - cb)
            } else {
                let d = if cb <= 0.25 {
                    ((16.0 * cb - 12.0) * cb + 4.0) * cb
                } else {
                    cb.sqrt()
                };
                cb + (2.0 * cs - 1.0) * (d - cb)
            }
        }
        BlendMode::Difference => (cb - cs).abs(),
        BlendMode::Exclusion => cb + cs - 2.0 * cb * cs,
        BlendMode::Divide => {
            if cs <= 0.0 {
                if cb > 0.0 {
                    1.0
                } else {
                    0.0
                }
            } else {
                cb / cs
            }
        }
        BlendMode::Addition => cb + cs,
        BlendMode::Subtract => cb - cs,
        BlendMode::Hue | BlendMode::Saturation | BlendMode::Color | BlendMode::Luminosity => cs,
    };
    v.clamp(0.0, 1.0)
}

fn hard_light(cb: f32, cs: f32) -> f32 {
    if cs <= 0.5 {
        cb * 2.0 * cs
    } else {
        let s = 2.0 * cs - 1.0;
        cb + s - cb * s
    }
}

fn lum(c: [f32; 3]) -> f32 {
    0.3 * c[0] + 0.59 * c[1] + 0.11 * c[2]
}

fn clip_color(c: [f32; 3]) -> [f32; 3] {
    let l = lum(c);
    let n = c[0].min(c[1]).min(c[2]);
    let x = c[0].max(c[1]).max(c[2]);
    let mut out = c;
    if n < 0.0 && l - n > f32::EPSILON {
        for v in &mut out {
            *v = l + (*v - l) * l / (l - n);
        }
    }
    if x > 1.0 && x - l > f32::EPSILON {
        for v in &mut out {
            *v = l + (*v - l) * (1.0 - l) / (x - l);
        }
    }
    out
}

fn set_lum(c: [f32; 3], l: f32) -> [f32; 3] {
    let d = l - lum(c);
    clip_color([c[0] + d, c[1] + d, c[2] + d])
}

fn sat(c: [f32; 3]) -> f32 {
    c[0].max(c[1]).max(c[2]) - c[0].min(c[1]).min(c[2])
}

fn set_sat(c: [f32; 3], s: f32) -> [f32; 3] {
    let max = c[0].max(c[1]).max(c[2]);
    let min = c[0].min(c[1]).min(c[2]);
    if max - min <= f32::EPSILON {
        return [0.0; 3];
    }
    let scale = s / (max - min);
    [(c[0] - min) * scale, (c[1] - min) * scale, (c[2] - min) * scale]
}
