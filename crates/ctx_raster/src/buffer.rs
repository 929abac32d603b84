//! Pixel storage: owned buffers and borrowed render targets

use std::fmt;
use std::sync::Arc;

use ctx_core::{IntRect, PixelFormat};

use crate::composite::Rgba;
use crate::error::{RasterError, Result};
use crate::format::{ops_for, PixelFormatOps};

/// Largest width or height accepted for a buffer
pub const MAX_DIMENSION: u32 = 1 << 15;

fn check_geometry(width: u32, height: u32, format: PixelFormat, stride: usize, len: usize) -> Result<()> {
    if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(RasterError::InvalidDimensions { width, height });
    }
    if stride < format.stride_for_width(width) {
        return Err(RasterError::InvalidStride {
            stride,
            width,
            format,
        });
    }
    let needed = stride * height as usize;
    if len < needed {
        return Err(RasterError::BufferTooSmall { needed, got: len });
    }
    Ok(())
}

/// An owned image in any [`PixelFormat`].
///
/// Textures are `PixelBuffer`s tagged with an eid. An optional release
/// callback runs exactly once when the buffer is dropped, letting hosts
/// reclaim memory they lent out.
pub struct PixelBuffer {
    width: u32,
    height: u32,
    stride: usize,
    format: PixelFormat,
    data: Vec<u8>,
    eid: Option<Arc<str>>,
    last_used_frame: u64,
    release: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl PixelBuffer {
    /// Zeroed buffer with the minimal stride
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Result<Self> {
        let stride = format.stride_for_width(width);
        let data = vec![0u8; stride * height as usize];
        Self::from_data(width, height, format, stride, data)
    }

    /// Wrap existing pixel data
    pub fn from_data(
        width: u32,
        height: u32,
        format: PixelFormat,
        stride: usize,
        data: Vec<u8>,
    ) -> Result<Self> {
        check_geometry(width, height, format, stride, data.len())?;
        Ok(Self {
            width,
            height,
            stride,
            format,
            data,
            eid: None,
            last_used_frame: 0,
            release: None,
        })
    }

    /// Run `release` when this buffer is dropped
    pub fn with_release(mut self, release: impl FnOnce() + Send + Sync + 'static) -> Self {
        self.release = Some(Box::new(release));
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn eid(&self) -> Option<&Arc<str>> {
        self.eid.as_ref()
    }

    pub fn set_eid(&mut self, eid: Arc<str>) {
        self.eid = Some(eid);
    }

    pub fn last_used_frame(&self) -> u64 {
        self.last_used_frame
    }

    pub fn touch(&mut self, frame: u64) {
        self.last_used_frame = frame;
    }

    pub fn bounds(&self) -> IntRect {
        IntRect::from_size(self.width, self.height)
    }

    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride;
        &self.data[start..start + self.stride]
    }

    /// Pixel at (x, y) in the working format
    pub fn pixel(&self, x: u32, y: u32) -> Rgba {
        let mut out = [[0u8; 4]];
        ops_for(self.format).to_working(self.row(y), x as usize, &mut out);
        out[0]
    }

    /// Fill every pixel with a working-format color
    pub fn fill(&mut self, color: Rgba) {
        let ops = ops_for(self.format);
        let row: Vec<Rgba> = vec![color; self.width as usize];
        for y in 0..self.height as usize {
            let start = y * self.stride;
            ops.from_working(&row, &mut self.data[start..start + self.stride], 0);
        }
    }

    /// Clamp every color channel to its alpha so the stored pixels are
    /// valid premultiplied values. Returns how many pixels changed.
    pub fn clamp_to_alpha(&mut self) -> usize {
        let ops = ops_for(self.format);
        let mut row: Vec<Rgba> = vec![[0; 4]; self.width as usize];
        let mut changed = 0;
        for y in 0..self.height as usize {
            let line = &mut self.data[y * self.stride..(y + 1) * self.stride];
            ops.to_working(line, 0, &mut row);
            let before = changed;
            for px in row.iter_mut() {
                let a = px[3];
                if px[..3].iter().any(|&c| c > a) {
                    px[0] = px[0].min(a);
                    px[1] = px[1].min(a);
                    px[2] = px[2].min(a);
                    changed += 1;
                }
            }
            if changed != before {
                ops.from_working(&row, line, 0);
            }
        }
        changed
    }

    /// Borrow the whole buffer as a render target
    pub fn view_mut(&mut self) -> TargetView<'_> {
        TargetView {
            data: &mut self.data,
            width: self.width,
            height: self.height,
            stride: self.stride,
            format: self.format,
            x0: 0,
            y0: 0,
        }
    }
}

impl fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("stride", &self.stride)
            .field("format", &self.format)
            .field("eid", &self.eid)
            .field("last_used_frame", &self.last_used_frame)
            .finish_non_exhaustive()
    }
}

impl Drop for PixelBuffer {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

/// A mutable window of rows in some pixel storage.
///
/// Views split into disjoint horizontal bands, so several workers can
/// render into one framebuffer without sharing rows.
pub struct TargetView<'a> {
    data: &'a mut [u8],
    width: u32,
    /// Rows in this view
    height: u32,
    stride: usize,
    format: PixelFormat,
    /// Absolute column of the first pixel
    x0: i32,
    /// Absolute index of the first row
    y0: i32,
}

impl<'a> TargetView<'a> {
    /// Wrap host memory as a target
    pub fn new(
        data: &'a mut [u8],
        width: u32,
        height: u32,
        stride: usize,
        format: PixelFormat,
    ) -> Result<Self> {
        check_geometry(width, height, format, stride, data.len())?;
        Ok(Self {
            data,
            width,
            height,
            stride,
            format,
            x0: 0,
            y0: 0,
        })
    }

    /// Place the first pixel of the view at absolute `(x, y)`, for
    /// rendering a sub-region of a larger canvas
    pub fn with_origin(mut self, x: i32, y: i32) -> Self {
        self.x0 = x;
        self.y0 = y;
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn ops(&self) -> &'static dyn PixelFormatOps {
        ops_for(self.format)
    }

    /// Pixels covered by this view, in absolute coordinates
    pub fn bounds(&self) -> IntRect {
        IntRect::new(
            self.x0,
            self.y0,
            self.x0 + self.width as i32,
            self.y0 + self.height as i32,
        )
    }

    /// Row `y` in absolute coordinates
    pub fn row_mut(&mut self, y: i32) -> Option<&mut [u8]> {
        let local = y.checked_sub(self.y0)?;
        if local < 0 || local >= self.height as i32 {
            return None;
        }
        let start = local as usize * self.stride;
        Some(&mut self.data[start..start + self.stride])
    }

    /// Split into the first `rows` rows and the rest
    pub fn split_at_row(self, rows: u32) -> (TargetView<'a>, TargetView<'a>) {
        let rows = rows.min(self.height);
        let (top, bottom) = self.data.split_at_mut(rows as usize * self.stride);
        (
            TargetView {
                data: top,
                width: self.width,
                height: rows,
                stride: self.stride,
                format: self.format,
                x0: self.x0,
                y0: self.y0,
            },
            TargetView {
                data: bottom,
                width: self.width,
                height: self.height - rows,
                stride: self.stride,
                format: self.format,
                x0: self.x0,
                y0: self.y0 + rows as i32,
            },
        )
    }

    /// Split into bands of at most `band_height` rows
    pub fn into_bands(self, band_height: u32) -> Vec<TargetView<'a>> {
        let band_height = band_height.max(1);
        let mut bands = Vec::with_capacity(self.height.div_ceil(band_height) as usize);
        let mut rest = self;
        while rest.height > band_height {
            let (band, tail) = rest.split_at_row(band_height);
            bands.push(band);
            rest = tail;
        }
        bands.push(rest);
        bands
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_geometry_validation() {
        assert!(matches!(
            PixelBuffer::new(0, 4, PixelFormat::Rgba8),
            Err(RasterError::InvalidDimensions { .. })
        ));
        assert!(matches!(
            PixelBuffer::from_data(4, 4, PixelFormat::Rgba8, 8, vec![0; 64]),
            Err(RasterError::InvalidStride { .. })
        ));
        assert!(matches!(
            PixelBuffer::from_data(4, 4, PixelFormat::Rgba8, 16, vec![0; 60]),
            Err(RasterError::BufferTooSmall { needed: 64, got: 60 })
        ));
        assert_eq!(PixelBuffer::new(9, 2, PixelFormat::Gray1).unwrap().stride(), 2);
    }

    #[test]
    fn test_clamp_to_alpha_repairs_straight_alpha_data() {
        let data = vec![255, 255, 255, 128, 10, 20, 30, 40, 255, 0, 0, 255, 0, 0, 0, 0];
        let mut buffer = PixelBuffer::from_data(2, 2, PixelFormat::Rgba8, 8, data).unwrap();
        assert_eq!(buffer.clamp_to_alpha(), 1);
        assert_eq!(buffer.pixel(0, 0), [128, 128, 128, 128]);
        assert_eq!(buffer.pixel(1, 0), [10, 20, 30, 40]);
        assert_eq!(buffer.pixel(0, 1), [255, 0, 0, 255]);
        assert_eq!(buffer.clamp_to_alpha(), 0);

        let mut gray = PixelBuffer::from_data(3, 1, PixelFormat::Gray8, 3, vec![7, 200, 255]).unwrap();
        assert_eq!(gray.clamp_to_alpha(), 0);
        assert_eq!(gray.data(), &[7, 200, 255]);
    }

    #[test]
    fn test_release_runs_once_on_drop() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let buffer = PixelBuffer::new(2, 2, PixelFormat::Gray8)
            .unwrap()
            .with_release(move || {
                c.fetch_add(1, Ordering::SeqCst);
            });
        assert_eq!(count.load(Ordering::SeqCst), 0);
        drop(buffer);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_bands_are_disjoint_and_cover() {
        let mut buffer = PixelBuffer::new(4, 10, PixelFormat::Rgba8).unwrap();
        let bands = buffer.view_mut().into_bands(4);
        let rows: Vec<(i32, i32)> = bands.iter().map(|b| (b.bounds().y0, b.bounds().y1)).collect();
        assert_eq!(rows, vec![(0, 4), (4, 8), (8, 10)]);

        let mut bands = bands;
        assert!(bands[1].row_mut(3).is_none());
        bands[1].row_mut(5).unwrap()[0] = 7;
        assert_eq!(buffer.row(5)[0], 7);
    }

    #[test]
    fn test_fill_and_pixel() {
        let mut buffer = PixelBuffer::new(3, 3, PixelFormat::Bgra8).unwrap();
        buffer.fill([10, 20, 30, 255]);
        assert_eq!(buffer.pixel(2, 2), [10, 20, 30, 255]);
        assert_eq!(&buffer.row(0)[..4], &[30, 20, 10, 255]);
    }
}
