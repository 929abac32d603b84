//! Render configuration presets.

use ctx_core::{Antialias, Capacities, PixelFormat};
use ctx_raster::buffer::MAX_DIMENSION;
use serde::{Deserialize, Serialize};

use crate::error::{RenderError, Result};

/// Backend behaviour switches.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderFlags {
    /// Hash the drawlist per tile and only push tiles whose hash changed.
    pub hash_cache: bool,
    /// Keep the previous frame's pixels instead of clearing at frame start.
    pub keep_data: bool,
}

/// Configuration for a rendering context.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Target width in pixels.
    pub width: u32,
    /// Target height in pixels.
    pub height: u32,
    /// Pixel format of the target.
    pub format: PixelFormat,
    /// Antialiasing level used by the rasterizer.
    pub antialias: Antialias,
    /// Table sizes for the drawlist, state machine and rasterizer.
    pub capacities: Capacities,
    /// Worker threads rendering row bands of one frame. 0 uses one per core.
    pub render_threads: usize,
    /// Tile columns of the damage-tracking hash grid.
    pub hash_cols: u32,
    /// Tile rows of the damage-tracking hash grid.
    pub hash_rows: u32,
    /// Scratch bytes the callback backend renders into before pushing pixels.
    pub memory_budget: usize,
    pub flags: RenderFlags,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self::standard()
    }
}

impl RenderConfig {
    /// Standard configuration for desktop-sized RGBA targets.
    pub fn standard() -> Self {
        Self {
            width: 640,
            height: 480,
            format: PixelFormat::Rgba8,
            antialias: Antialias::Default,
            capacities: Capacities::standard(),
            render_threads: 1,
            hash_cols: 8,
            hash_rows: 4,
            memory_budget: 640 * 480 * 4,
            flags: RenderFlags::default(),
        }
    }

    /// Small RGB565 display driven through a pixel callback.
    pub fn embedded() -> Self {
        Self {
            width: 320,
            height: 240,
            format: PixelFormat::Rgb565,
            antialias: Antialias::Fast,
            capacities: Capacities::embedded(),
            render_threads: 1,
            hash_cols: 8,
            hash_rows: 4,
            memory_budget: 320 * 2 * 24,
            flags: RenderFlags {
                hash_cache: true,
                ..RenderFlags::default()
            },
        }
    }

    /// Parse a TOML configuration. Missing keys take their standard values.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let mut config: RenderConfig = toml::from_str(text)?;
        config.capacities = config.capacities.validated();
        config.validate()?;
        Ok(config)
    }

    /// Check values the backends rely on.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 || self.width > MAX_DIMENSION || self.height > MAX_DIMENSION {
            return Err(RenderError::Config(format!(
                "target size {}x{} outside 1..={MAX_DIMENSION}",
                self.width, self.height
            )));
        }
        if self.hash_cols == 0 || self.hash_rows == 0 {
            return Err(RenderError::Config("hash grid needs at least one tile".into()));
        }
        if self.memory_budget == 0 {
            return Err(RenderError::Config("memory budget must be non-zero".into()));
        }
        Ok(())
    }

    /// Number of band workers, resolving 0 to the core count.
    pub fn worker_count(&self) -> usize {
        match self.render_threads {
            0 => rayon::current_num_threads().max(1),
            n => n,
        }
    }

    /// Row stride of a full-width target in bytes.
    pub fn stride(&self) -> usize {
        self.format.stride_for_width(self.width)
    }

    /// Set the target size.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the pixel format.
    pub fn with_format(mut self, format: PixelFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the antialiasing level.
    pub fn with_antialias(mut self, antialias: Antialias) -> Self {
        self.antialias = antialias;
        self
    }

    /// Set the capacity limits.
    pub fn with_capacities(mut self, capacities: Capacities) -> Self {
        self.capacities = capacities;
        self
    }

    /// Set the number of band workers.
    pub fn with_render_threads(mut self, threads: usize) -> Self {
        self.render_threads = threads;
        self
    }

    /// Set the damage-tracking grid.
    pub fn with_hash_grid(mut self, cols: u32, rows: u32) -> Self {
        self.hash_cols = cols;
        self.hash_rows = rows;
        self
    }

    /// Set the callback scratch budget in bytes.
    pub fn with_memory_budget(mut self, bytes: usize) -> Self {
        self.memory_budget = bytes;
        self
    }

    /// Enable or disable tile-hash damage tracking.
    pub fn with_hash_cache(mut self, enabled: bool) -> Self {
        self.flags.hash_cache = enabled;
        self
    }

    /// Enable or disable keeping pixels across frames.
    pub fn with_keep_data(mut self, enabled: bool) -> Self {
        self.flags.keep_data = enabled;
        self
    }
}
