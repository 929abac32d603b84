//! Raster error types

use ctx_core::PixelFormat;
use thiserror::Error;

/// Errors raised when wrapping or allocating pixel storage
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RasterError {
    /// Stride too small to hold one row in the given format
    #[error("stride {stride} too small for {width} {format:?} pixels")]
    InvalidStride {
        stride: usize,
        width: u32,
        format: PixelFormat,
    },

    /// Byte buffer shorter than `stride * height`
    #[error("buffer of {got} bytes, {needed} needed")]
    BufferTooSmall { needed: usize, got: usize },

    /// Zero or oversized dimensions
    #[error("invalid dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
}

pub type Result<T> = std::result::Result<T, RasterError>;
