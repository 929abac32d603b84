//! Render error types

use ctx_core::{DrawlistError, PixelFormat};
use ctx_raster::RasterError;
use thiserror::Error;

/// Errors raised while setting up or driving a rendering context.
///
/// Soft faults met while drawing (capacity limits, malformed streams,
/// missing textures) are not errors; they are reported through
/// [`ctx_core::Diagnostics`].
#[derive(Error, Debug)]
pub enum RenderError {
    #[error(transparent)]
    Drawlist(#[from] DrawlistError),

    #[error(transparent)]
    Raster(#[from] RasterError),

    /// Configuration values out of range
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Configuration text could not be parsed
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Host-provided framebuffer does not match the configured target
    #[error("framebuffer is {width}x{height} {format:?}, expected {expected_width}x{expected_height} {expected_format:?}")]
    FramebufferMismatch {
        width: u32,
        height: u32,
        format: PixelFormat,
        expected_width: u32,
        expected_height: u32,
        expected_format: PixelFormat,
    },

    #[error("failed to build render thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("failed to spawn render thread: {0}")]
    Spawn(#[from] std::io::Error),

    /// The render thread exited and no longer accepts frames
    #[error("render thread has stopped")]
    RendererStopped,
}

/// Result type for render operations
pub type Result<T> = std::result::Result<T, RenderError>;
