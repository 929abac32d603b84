//! Rendering backends
//!
//! A [`Backend`] receives the commands a context records and turns finished
//! frames into pixels:
//!
//! - [`DrawlistBackend`]: records only; the drawlist is the product
//! - [`FramebufferBackend`]: immediate mode, every command is drawn into an
//!   owned framebuffer as it is recorded
//! - [`CallbackBackend`]: renders the frame at end of frame into scratch
//!   memory in budget-sized chunks and pushes them to a [`PixelSink`],
//!   optionally only for tiles whose content hash changed
//! - [`crate::thread::ThreadedBackend`]: renders on a dedicated thread

use std::sync::Arc;

use ctx_core::{Command, Diagnostics, DrawOp, Drawlist, IntRect, Interpreter, PathBuilder, PixelFormat};
use ctx_raster::{Painter, PixelBuffer, TargetView};

use crate::config::RenderConfig;
use crate::error::{RenderError, Result};
use crate::font::FontEngine;
use crate::hasher::{TileHasher, TileList};
use crate::renderer::{execute, touch_source, Renderer};
use crate::texture::TextureCache;

/// Consumer of a context's command stream
pub trait Backend: Send {
    fn name(&self) -> &'static str;

    /// Immediate backends draw each command as it is recorded
    fn process(&mut self, _cmd: &Command) {}

    fn start_frame(&mut self) {}

    /// Finish a frame. Returns faults met while rendering it.
    fn end_frame(&mut self, list: &Drawlist) -> Result<Diagnostics>;

    fn set_font_engine(&mut self, _engine: Option<Arc<dyn FontEngine>>) {}

    /// Forget a texture
    fn drop_eid(&mut self, _eid: &str) {}

    fn set_texture_clock(&mut self, _frame: u64) {}
}

/// Records without rendering
#[derive(Debug, Default)]
pub struct DrawlistBackend;

impl Backend for DrawlistBackend {
    fn name(&self) -> &'static str {
        "drawlist"
    }

    fn end_frame(&mut self, _list: &Drawlist) -> Result<Diagnostics> {
        Ok(Diagnostics::default())
    }
}

/// Immediate-mode rendering into an owned framebuffer
pub struct FramebufferBackend {
    buffer: PixelBuffer,
    interp: Interpreter,
    painter: Painter,
    glyphs: PathBuilder,
    textures: TextureCache,
    fonts: Option<Arc<dyn FontEngine>>,
    keep_data: bool,
    rendered: Diagnostics,
}

impl FramebufferBackend {
    pub fn new(config: &RenderConfig) -> Result<Self> {
        config.validate()?;
        let buffer = PixelBuffer::new(config.width, config.height, config.format)?;
        Self::from_buffer(config, buffer)
    }

    /// Render into a host-provided buffer matching the configured target
    pub fn from_buffer(config: &RenderConfig, buffer: PixelBuffer) -> Result<Self> {
        if buffer.width() != config.width
            || buffer.height() != config.height
            || buffer.format() != config.format
        {
            return Err(RenderError::FramebufferMismatch {
                width: buffer.width(),
                height: buffer.height(),
                format: buffer.format(),
                expected_width: config.width,
                expected_height: config.height,
                expected_format: config.format,
            });
        }
        let caps = &config.capacities;
        Ok(Self {
            buffer,
            interp: Interpreter::new(config.width, config.height, caps),
            painter: Painter::new(caps.edge_table, config.antialias, caps.gradient_cache),
            glyphs: PathBuilder::new(caps.max_arc_segments),
            textures: TextureCache::new(caps.texture_slots),
            fonts: None,
            keep_data: config.flags.keep_data,
            rendered: Diagnostics::default(),
        })
    }

    pub fn buffer(&self) -> &PixelBuffer {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut PixelBuffer {
        &mut self.buffer
    }

    pub fn into_buffer(self) -> PixelBuffer {
        self.buffer
    }

    pub fn textures(&self) -> &TextureCache {
        &self.textures
    }
}

impl Backend for FramebufferBackend {
    fn name(&self) -> &'static str {
        "framebuffer"
    }

    fn process(&mut self, cmd: &Command) {
        let Some(op) = self.interp.process(cmd) else {
            return;
        };
        let source = match &op {
            DrawOp::DefineTexture { eid, width, height, format, stride, data } => {
                if let Err(err) = self.textures.define(eid, *width, *height, *format, *stride, data) {
                    tracing::warn!(%eid, %err, "texture definition rejected");
                }
                return;
            }
            DrawOp::Fill { state, .. } | DrawOp::Paint { state } | DrawOp::Text { state, .. } => {
                Some(&state.fill_source)
            }
            DrawOp::Stroke { state, .. } => Some(&state.stroke_source),
            DrawOp::Glyph { stroke: true, state, .. } => Some(&state.stroke_source),
            DrawOp::Glyph { state, .. } => Some(&state.fill_source),
            DrawOp::SetPixel { .. } | DrawOp::StartFrame | DrawOp::EndFrame => None,
        };
        if let Some(source) = source {
            if !touch_source(&mut self.textures, source) {
                self.rendered.missing_textures += 1;
            }
        }
        let mut target = self.buffer.view_mut();
        let complete = execute(
            &mut self.painter,
            &mut self.glyphs,
            op,
            &mut target,
            &self.textures,
            self.fonts.as_deref(),
        );
        if !complete {
            self.rendered.edge_overflow = true;
        }
    }

    fn start_frame(&mut self) {
        if !self.keep_data {
            self.buffer.fill([0; 4]);
        }
        self.interp.reset();
        self.textures.advance_clock();
        self.rendered = Diagnostics::default();
    }

    fn end_frame(&mut self, _list: &Drawlist) -> Result<Diagnostics> {
        self.interp.take_diagnostics();
        self.textures.evict();
        Ok(std::mem::take(&mut self.rendered))
    }

    fn set_font_engine(&mut self, engine: Option<Arc<dyn FontEngine>>) {
        self.fonts = engine;
    }

    fn drop_eid(&mut self, eid: &str) {
        self.textures.drop_eid(eid);
    }

    fn set_texture_clock(&mut self, frame: u64) {
        self.textures.set_clock(frame);
    }
}

/// Receives rendered pixels: `data` holds `height` rows of the region
/// starting at (`x`, `y`), each `format.stride_for_width(width)` bytes
pub trait PixelSink: Send {
    fn set_pixels(&mut self, x: u32, y: u32, width: u32, height: u32, data: &[u8]);
}

impl<F> PixelSink for F
where
    F: FnMut(u32, u32, u32, u32, &[u8]) + Send,
{
    fn set_pixels(&mut self, x: u32, y: u32, width: u32, height: u32, data: &[u8]) {
        self(x, y, width, height, data)
    }
}

/// Split `region` into row chunks of at most `budget` bytes each
fn budget_chunks(region: IntRect, format: PixelFormat, budget: usize) -> impl Iterator<Item = IntRect> {
    let stride = format.stride_for_width(region.width() as u32).max(1);
    let rows = (budget / stride).max(1) as i32;
    (region.y0..region.y1)
        .step_by(rows as usize)
        .map(move |y| IntRect::new(region.x0, y, region.x1, (y + rows).min(region.y1)))
}

/// End-of-frame rendering through a pixel callback
pub struct CallbackBackend<S: PixelSink> {
    sink: S,
    renderer: Renderer,
    textures: TextureCache,
    hasher: Option<TileHasher>,
    previous: Vec<u64>,
    format: PixelFormat,
    bounds: IntRect,
    memory_budget: usize,
    scratch: Vec<u8>,
    damage: Vec<IntRect>,
}

impl<S: PixelSink> CallbackBackend<S> {
    pub fn new(config: &RenderConfig, sink: S) -> Result<Self> {
        let renderer = Renderer::new(config)?;
        Ok(Self {
            sink,
            renderer,
            textures: TextureCache::new(config.capacities.texture_slots),
            hasher: config.flags.hash_cache.then(|| TileHasher::from_config(config)),
            previous: Vec::new(),
            format: config.format,
            bounds: IntRect::from_size(config.width, config.height),
            memory_budget: config.memory_budget,
            scratch: Vec::new(),
            damage: Vec::new(),
        })
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn set_memory_budget(&mut self, bytes: usize) {
        self.memory_budget = bytes.max(1);
    }

    /// Regions pushed for the last frame
    pub fn damage(&self) -> &[IntRect] {
        &self.damage
    }

    pub fn textures(&self) -> &TextureCache {
        &self.textures
    }

    /// Forget the previous frame's tile hashes so the next frame is pushed
    /// in full
    pub fn invalidate(&mut self) {
        self.previous.clear();
    }
}

impl<S: PixelSink> Backend for CallbackBackend<S> {
    fn name(&self) -> &'static str {
        "callback"
    }

    fn end_frame(&mut self, list: &Drawlist) -> Result<Diagnostics> {
        let mut diagnostics = self.renderer.prepare(list, &mut self.textures);
        let regions: TileList = match &mut self.hasher {
            Some(hasher) => {
                hasher.hash_drawlist(list);
                let changed = hasher.changed_tiles(&self.previous);
                self.previous.clear();
                self.previous.extend_from_slice(hasher.hashes());
                changed
            }
            None => TileList::from_elem(self.bounds, 1),
        };

        self.damage.clear();
        for region in regions {
            for chunk in budget_chunks(region, self.format, self.memory_budget) {
                let (width, height) = (chunk.width() as u32, chunk.height() as u32);
                let stride = self.format.stride_for_width(width);
                self.scratch.clear();
                self.scratch.resize(stride * height as usize, 0);
                let view = TargetView::new(&mut self.scratch, width, height, stride, self.format)?
                    .with_origin(chunk.x0, chunk.y0);
                if !self.renderer.draw(list, view, &self.textures) {
                    diagnostics.edge_overflow = true;
                }
                self.sink
                    .set_pixels(chunk.x0 as u32, chunk.y0 as u32, width, height, &self.scratch);
                self.damage.push(chunk);
            }
        }
        tracing::debug!(regions = self.damage.len(), "frame pushed");
        self.textures.evict();
        Ok(diagnostics)
    }

    fn set_font_engine(&mut self, engine: Option<Arc<dyn FontEngine>>) {
        self.renderer.set_font_engine(engine);
    }

    fn drop_eid(&mut self, eid: &str) {
        self.textures.drop_eid(eid);
    }

    fn set_texture_clock(&mut self, frame: u64) {
        self.textures.set_clock(frame);
    }
}
