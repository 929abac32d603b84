//! Per-format pixel conversion
//!
//! Each [`PixelFormat`] gets a descriptor that converts a run of stored
//! pixels to and from the premultiplied RGBA8 working format and applies
//! composited coverage to a row. Formats with alpha store it
//! premultiplied; formats without alpha store the premultiplied color
//! as-is, which is the color over black.

use ctx_core::PixelFormat;

use crate::composite::{div255, source_over_opaque, CompositeOp, Rgba};

/// Conversion between a storage format and the working format
pub trait PixelFormatOps: Send + Sync {
    fn format(&self) -> PixelFormat;

    /// Decode `out.len()` pixels of `row`, starting at pixel `x`
    fn to_working(&self, row: &[u8], x: usize, out: &mut [Rgba]);

    /// Encode `src` into `row`, starting at pixel `x`
    fn from_working(&self, src: &[Rgba], row: &mut [u8], x: usize);

    /// Composite `src` over `src.len()` pixels of `row` at pixel `x` with
    /// uniform coverage. `scratch` holds the decoded destination.
    fn apply_coverage(
        &self,
        row: &mut [u8],
        x: usize,
        src: &[Rgba],
        coverage: u8,
        op: &CompositeOp,
        scratch: &mut Vec<Rgba>,
    ) {
        scratch.clear();
        scratch.resize(src.len(), [0; 4]);
        self.to_working(row, x, scratch);
        op.apply_span(src, scratch, coverage);
        self.from_working(scratch, row, x);
    }
}

/// Descriptor for `format`
pub fn ops_for(format: PixelFormat) -> &'static dyn PixelFormatOps {
    match format {
        PixelFormat::Rgba8 => &Rgba8Ops,
        PixelFormat::Bgra8 => &Bgra8Ops,
        PixelFormat::Rgb8 => &Rgb8Ops { bgr: false },
        PixelFormat::Bgr8 => &Rgb8Ops { bgr: true },
        PixelFormat::Gray8 => &Gray8Ops,
        PixelFormat::GrayA8 => &GrayA8Ops,
        PixelFormat::Gray1 => &GrayBitsOps { bits: 1 },
        PixelFormat::Gray2 => &GrayBitsOps { bits: 2 },
        PixelFormat::Gray4 => &GrayBitsOps { bits: 4 },
        PixelFormat::Rgb565 => &Rgb565Ops { swapped: false },
        PixelFormat::Rgb565ByteSwapped => &Rgb565Ops { swapped: true },
        PixelFormat::Rgb332 => &Rgb332Ops,
        PixelFormat::RgbaF => &RgbaFOps,
    }
}

/// Rec. 709 luma in 8-bit fixed point
#[inline]
pub fn luma(c: Rgba) -> u8 {
    ((c[0] as u32 * 54 + c[1] as u32 * 183 + c[2] as u32 * 19 + 128) >> 8) as u8
}

struct Rgba8Ops;

impl PixelFormatOps for Rgba8Ops {
    fn format(&self) -> PixelFormat {
        PixelFormat::Rgba8
    }

    fn to_working(&self, row: &[u8], x: usize, out: &mut [Rgba]) {
        let px: &[Rgba] = bytemuck::cast_slice(&row[x * 4..(x + out.len()) * 4]);
        out.copy_from_slice(px);
    }

    fn from_working(&self, src: &[Rgba], row: &mut [u8], x: usize) {
        row[x * 4..(x + src.len()) * 4].copy_from_slice(bytemuck::cast_slice(src));
    }

    fn apply_coverage(
        &self,
        row: &mut [u8],
        x: usize,
        src: &[Rgba],
        coverage: u8,
        op: &CompositeOp,
        _scratch: &mut Vec<Rgba>,
    ) {
        let dst: &mut [Rgba] = bytemuck::cast_slice_mut(&mut row[x * 4..(x + src.len()) * 4]);
        if op.is_source_over() && op.effective_alpha(coverage) == 255 {
            source_over_opaque(src, dst);
        } else {
            op.apply_span(src, dst, coverage);
        }
    }
}

struct Bgra8Ops;

impl PixelFormatOps for Bgra8Ops {
    fn format(&self) -> PixelFormat {
        PixelFormat::Bgra8
    }

    fn to_working(&self, row: &[u8], x: usize, out: &mut [Rgba]) {
        for (i, o) in out.iter_mut().enumerate() {
            let p = &row[(x + i) * 4..(x + i) * 4 + 4];
            *o = [p[2], p[1], p[0], p[3]];
        }
    }

    fn from_working(&self, src: &[Rgba], row: &mut [u8], x: usize) {
        for (i, c) in src.iter().enumerate() {
            row[(x + i) * 4..(x + i) * 4 + 4].copy_from_slice(&[c[2], c[1], c[0], c[3]]);
        }
    }
}

struct Rgb8Ops {
    bgr: bool,
}

impl PixelFormatOps for Rgb8Ops {
    fn format(&self) -> PixelFormat {
        if self.bgr {
            PixelFormat::Bgr8
        } else {
            PixelFormat::Rgb8
        }
    }

    fn to_working(&self, row: &[u8], x: usize, out: &mut [Rgba]) {
        for (i, o) in out.iter_mut().enumerate() {
            let p = &row[(x + i) * 3..(x + i) * 3 + 3];
            *o = if self.bgr {
                [p[2], p[1], p[0], 255]
            } else {
                [p[0], p[1], p[2], 255]
            };
        }
    }

    fn from_working(&self, src: &[Rgba], row: &mut [u8], x: usize) {
        for (i, c) in src.iter().enumerate() {
            let p = &mut row[(x + i) * 3..(x + i) * 3 + 3];
            if self.bgr {
                p.copy_from_slice(&[c[2], c[1], c[0]]);
            } else {
                p.copy_from_slice(&c[..3]);
            }
        }
    }
}

struct Gray8Ops;

impl PixelFormatOps for Gray8Ops {
    fn format(&self) -> PixelFormat {
        PixelFormat::Gray8
    }

    fn to_working(&self, row: &[u8], x: usize, out: &mut [Rgba]) {
        for (o, &g) in out.iter_mut().zip(&row[x..]) {
            *o = [g, g, g, 255];
        }
    }

    fn from_working(&self, src: &[Rgba], row: &mut [u8], x: usize) {
        for (p, c) in row[x..].iter_mut().zip(src) {
            *p = luma(*c);
        }
    }
}

struct GrayA8Ops;

impl PixelFormatOps for GrayA8Ops {
    fn format(&self) -> PixelFormat {
        PixelFormat::GrayA8
    }

    fn to_working(&self, row: &[u8], x: usize, out: &mut [Rgba]) {
        for (i, o) in out.iter_mut().enumerate() {
            let (g, a) = (row[(x + i) * 2], row[(x + i) * 2 + 1]);
            *o = [g, g, g, a];
        }
    }

    fn from_working(&self, src: &[Rgba], row: &mut [u8], x: usize) {
        for (i, c) in src.iter().enumerate() {
            row[(x + i) * 2] = luma(*c).min(c[3]);
            row[(x + i) * 2 + 1] = c[3];
        }
    }
}

/// 1, 2 and 4 bit gray, least significant bits holding the leftmost pixel
struct GrayBitsOps {
    bits: u32,
}

impl GrayBitsOps {
    fn locate(&self, pixel: usize) -> (usize, u32) {
        let per_byte = 8 / self.bits as usize;
        (pixel / per_byte, (pixel % per_byte) as u32 * self.bits)
    }

    fn max(&self) -> u32 {
        (1 << self.bits) - 1
    }
}

impl PixelFormatOps for GrayBitsOps {
    fn format(&self) -> PixelFormat {
        match self.bits {
            1 => PixelFormat::Gray1,
            2 => PixelFormat::Gray2,
            _ => PixelFormat::Gray4,
        }
    }

    fn to_working(&self, row: &[u8], x: usize, out: &mut [Rgba]) {
        let max = self.max();
        for (i, o) in out.iter_mut().enumerate() {
            let (byte, shift) = self.locate(x + i);
            let v = (row[byte] as u32 >> shift) & max;
            let g = (v * 255 / max) as u8;
            *o = [g, g, g, 255];
        }
    }

    fn from_working(&self, src: &[Rgba], row: &mut [u8], x: usize) {
        let max = self.max();
        for (i, c) in src.iter().enumerate() {
            let (byte, shift) = self.locate(x + i);
            let v = (luma(*c) as u32 * max + 127) / 255;
            let mask = (max << shift) as u8;
            row[byte] = (row[byte] & !mask) | ((v << shift) as u8 & mask);
        }
    }
}

struct Rgb565Ops {
    swapped: bool,
}

impl PixelFormatOps for Rgb565Ops {
    fn format(&self) -> PixelFormat {
        if self.swapped {
            PixelFormat::Rgb565ByteSwapped
        } else {
            PixelFormat::Rgb565
        }
    }

    fn to_working(&self, row: &[u8], x: usize, out: &mut [Rgba]) {
        for (i, o) in out.iter_mut().enumerate() {
            let bytes = [row[(x + i) * 2], row[(x + i) * 2 + 1]];
            let v = if self.swapped {
                u16::from_be_bytes(bytes)
            } else {
                u16::from_le_bytes(bytes)
            };
            let r = ((v >> 11) & 0x1f) as u8;
            let g = ((v >> 5) & 0x3f) as u8;
            let b = (v & 0x1f) as u8;
            *o = [(r << 3) | (r >> 2), (g << 2) | (g >> 4), (b << 3) | (b >> 2), 255];
        }
    }

    fn from_working(&self, src: &[Rgba], row: &mut [u8], x: usize) {
        for (i, c) in src.iter().enumerate() {
            let v = ((c[0] as u16 >> 3) << 11) | ((c[1] as u16 >> 2) << 5) | (c[2] as u16 >> 3);
            let bytes = if self.swapped {
                v.to_be_bytes()
            } else {
                v.to_le_bytes()
            };
            row[(x + i) * 2..(x + i) * 2 + 2].copy_from_slice(&bytes);
        }
    }
}

struct Rgb332Ops;

impl PixelFormatOps for Rgb332Ops {
    fn format(&self) -> PixelFormat {
        PixelFormat::Rgb332
    }

    fn to_working(&self, row: &[u8], x: usize, out: &mut [Rgba]) {
        for (o, &v) in out.iter_mut().zip(&row[x..]) {
            let r = (v >> 5) as u32;
            let g = ((v >> 2) & 7) as u32;
            let b = (v & 3) as u32;
            *o = [
                ((r * 255 + 3) / 7) as u8,
                ((g * 255 + 3) / 7) as u8,
                (b * 85) as u8,
                255,
            ];
        }
    }

    fn from_working(&self, src: &[Rgba], row: &mut [u8], x: usize) {
        for (p, c) in row[x..].iter_mut().zip(src) {
            let r = (c[0] as u32 * 7 + 127) / 255;
            let g = (c[1] as u32 * 7 + 127) / 255;
            let b = (c[2] as u32 * 3 + 127) / 255;
            *p = ((r << 5) | (g << 2) | b) as u8;
        }
    }
}

/// Four little-endian `f32` per pixel, premultiplied, 0..1
struct RgbaFOps;

impl PixelFormatOps for RgbaFOps {
    fn format(&self) -> PixelFormat {
        PixelFormat::RgbaF
    }

    fn to_working(&self, row: &[u8], x: usize, out: &mut [Rgba]) {
        for (i, o) in out.iter_mut().enumerate() {
            let base = (x + i) * 16;
            for c in 0..4 {
                let at = base + c * 4;
                let v = f32::from_le_bytes([row[at], row[at + 1], row[at + 2], row[at + 3]]);
                o[c] = ctx_core::color::quantize(v);
            }
        }
    }

    fn from_working(&self, src: &[Rgba], row: &mut [u8], x: usize) {
        for (i, px) in src.iter().enumerate() {
            let base = (x + i) * 16;
            for c in 0..4 {
                let v = px[c] as f32 / 255.0;
                row[base + c * 4..base + c * 4 + 4].copy_from_slice(&v.to_le_bytes());
            }
        }
    }
}

/// Scale a premultiplied color by an 8-bit alpha
#[inline]
pub fn scale_alpha(c: Rgba, alpha: u8) -> Rgba {
    if alpha == 255 {
        return c;
    }
    let a = alpha as u32;
    [
        div255(c[0] as u32 * a),
        div255(c[1] as u32 * a),
        div255(c[2] as u32 * a),
        div255(c[3] as u32 * a),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row_for(format: PixelFormat, width: u32) -> Vec<u8> {
        vec![0u8; format.stride_for_width(width)]
    }

    #[test]
    fn test_every_format_has_ops() {
        for format in PixelFormat::ALL {
            assert_eq!(ops_for(*format).format(), *format);
        }
    }

    #[test]
    fn test_opaque_primaries_survive_every_format() {
        let colors: [Rgba; 3] = [[255, 255, 255, 255], [0, 0, 0, 255], [255, 0, 0, 255]];
        for format in PixelFormat::ALL {
            let ops = ops_for(*format);
            let mut row = row_for(*format, 8);
            ops.from_working(&colors, &mut row, 3);
            let mut back = [[0u8; 4]; 3];
            ops.to_working(&row, 3, &mut back);
            assert_eq!(back[0], [255, 255, 255, 255], "{:?}", format);
            assert_eq!(back[1], [0, 0, 0, 255], "{:?}", format);
            if format.components() >= 3 {
                assert_eq!(back[2], [255, 0, 0, 255], "{:?}", format);
            }
        }
    }

    #[test]
    fn test_sub_byte_neighbors_untouched() {
        let ops = ops_for(PixelFormat::Gray2);
        let mut row = vec![0u8; 2];
        ops.from_working(&[[255, 255, 255, 255]], &mut row, 5);
        assert_eq!(row, vec![0, 0b0000_1100]);
        ops.from_working(&[[255, 255, 255, 255]], &mut row, 0);
        assert_eq!(row, vec![0b0000_0011, 0b0000_1100]);
    }

    #[test]
    fn test_rgb565_byte_order() {
        let mut le = vec![0u8; 2];
        let mut be = vec![0u8; 2];
        ops_for(PixelFormat::Rgb565).from_working(&[[255, 0, 0, 255]], &mut le, 0);
        ops_for(PixelFormat::Rgb565ByteSwapped).from_working(&[[255, 0, 0, 255]], &mut be, 0);
        assert_eq!(le, vec![0x00, 0xf8]);
        assert_eq!(be, vec![0xf8, 0x00]);
    }

    #[test]
    fn test_bgra_swizzle() {
        let mut row = vec![0u8; 4];
        ops_for(PixelFormat::Bgra8).from_working(&[[1, 2, 3, 4]], &mut row, 0);
        assert_eq!(row, vec![3, 2, 1, 4]);
    }

    #[test]
    fn test_rgba8_coverage_matches_generic_path() {
        let op = CompositeOp::default();
        let src = [[100, 50, 0, 128], [0, 0, 200, 200], [255, 255, 255, 255]];
        let mut direct = vec![10u8; 12];
        let mut scratch = Vec::new();
        ops_for(PixelFormat::Rgba8).apply_coverage(&mut direct, 0, &src, 255, &op, &mut scratch);

        let mut generic = [[10u8; 4]; 3];
        for (d, s) in generic.iter_mut().zip(&src) {
            *d = op.apply(*s, *d, 255);
        }
        assert_eq!(direct, bytemuck::cast_slice::<Rgba, u8>(&generic).to_vec());
    }

    #[test]
    fn test_luma_weights() {
        assert_eq!(luma([255, 255, 255, 255]), 255);
        assert_eq!(luma([0, 0, 0, 255]), 0);
        assert!(luma([0, 255, 0, 255]) > luma([255, 0, 0, 255]));
    }
}
