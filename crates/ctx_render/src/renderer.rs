//! Drawlist renderer
//!
//! Rendering a frame runs in two passes over the same immutable drawlist:
//!
//! 1. **Prepare** (single thread): defines textures, stamps the textures
//!    the frame references and collects interpreter diagnostics
//! 2. **Draw**: the target is split into disjoint row bands, one per
//!    worker. Every worker interprets the whole list with its own state
//!    machine and rasterizer, writing only the rows it owns.
//!
//! Each worker wraps the list in a protected save so extra restores in an
//! untrusted list cannot unwind state below it.

use std::sync::Arc;

use ctx_core::{Diagnostics, DrawOp, Drawlist, GraphicsState, Interpreter, PaintSource, PathBuilder, Point};
use ctx_raster::{Painter, TargetView, TextureLookup};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::config::RenderConfig;
use crate::error::Result;
use crate::font::{layout_text, FontEngine, GlyphPath};
use crate::texture::TextureCache;

/// Execute one pixel-producing op. Returns false if the edge table
/// overflowed and part of the geometry was dropped.
///
/// Texture definitions are handled by the caller.
pub(crate) fn execute(
    painter: &mut Painter,
    glyphs: &mut PathBuilder,
    op: DrawOp<'_>,
    target: &mut TargetView<'_>,
    textures: &dyn TextureLookup,
    fonts: Option<&dyn FontEngine>,
) -> bool {
    match op {
        DrawOp::Fill { path, state } => painter.fill(target, path, state, textures),
        DrawOp::Stroke { path, state } => painter.stroke(target, path, state, textures),
        DrawOp::Paint { state } => {
            painter.paint(target, state, textures);
            true
        }
        DrawOp::SetPixel { x, y, rgba } => {
            Painter::set_pixel(target, x, y, rgba);
            true
        }
        DrawOp::Text { text, origin, state } => match fonts {
            Some(engine) => {
                draw_text(painter, glyphs, engine, text, origin, state, false, target, textures)
            }
            None => true,
        },
        DrawOp::Glyph { unichar, stroke, origin, state } => {
            let (Some(engine), Some(ch)) = (fonts, char::from_u32(unichar)) else {
                return true;
            };
            let mut utf8 = [0u8; 4];
            let text = ch.encode_utf8(&mut utf8);
            draw_text(painter, glyphs, engine, text, origin, state, stroke, target, textures)
        }
        DrawOp::DefineTexture { .. } | DrawOp::StartFrame | DrawOp::EndFrame => true,
    }
}

#[allow(clippy::too_many_arguments)]
fn draw_text(
    painter: &mut Painter,
    glyphs: &mut PathBuilder,
    engine: &dyn FontEngine,
    text: &str,
    origin: Point,
    state: &GraphicsState,
    stroke: bool,
    target: &mut TargetView<'_>,
    textures: &dyn TextureLookup,
) -> bool {
    glyphs.reset();
    layout_text(engine, text, state.font_size, |glyph, pen| {
        let mut sink = GlyphPath::new(glyphs, state, Point::new(origin.x + pen, origin.y));
        engine.glyph(glyph, state.font_size, &mut sink);
    });
    if stroke {
        painter.stroke(target, glyphs.segments(), state, textures)
    } else {
        painter.fill(target, glyphs.segments(), state, textures)
    }
}

/// Interpreter and rasterizer owned by one band
struct Worker {
    interp: Interpreter,
    painter: Painter,
    glyphs: PathBuilder,
}

impl Worker {
    fn new(config: &RenderConfig) -> Self {
        let caps = &config.capacities;
        Self {
            interp: Interpreter::new(config.width, config.height, caps),
            painter: Painter::new(caps.edge_table, config.antialias, caps.gradient_cache),
            glyphs: PathBuilder::new(caps.max_arc_segments),
        }
    }

    fn render(
        &mut self,
        list: &Drawlist,
        target: &mut TargetView<'_>,
        textures: &TextureCache,
        fonts: Option<&dyn FontEngine>,
    ) -> bool {
        let Worker {
            interp,
            painter,
            glyphs,
        } = self;
        interp.reset();
        let scope = interp.enter_protected();
        let mut complete = true;
        interp.run(list, |op| {
            complete &= execute(painter, glyphs, op, target, textures, fonts);
        });
        interp.leave_protected(scope);
        // Faults are reported once, by the prepare pass
        interp.take_diagnostics();
        complete
    }
}

/// Renders drawlists into pixel targets
pub struct Renderer {
    prepare: Interpreter,
    workers: Vec<Worker>,
    pool: Option<ThreadPool>,
    fonts: Option<Arc<dyn FontEngine>>,
}

impl Renderer {
    pub fn new(config: &RenderConfig) -> Result<Self> {
        config.validate()?;
        let threads = config.worker_count();
        let pool = if threads > 1 {
            Some(
                ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .thread_name(|i| format!("ctx-band-{i}"))
                    .build()?,
            )
        } else {
            None
        };
        tracing::debug!(threads, width = config.width, height = config.height, "renderer created");
        Ok(Self {
            prepare: Interpreter::new(config.width, config.height, &config.capacities),
            workers: (0..threads).map(|_| Worker::new(config)).collect(),
            pool,
            fonts: None,
        })
    }

    pub fn workers(&self) -> usize {
        self.workers.len()
    }

    pub fn font_engine(&self) -> Option<&Arc<dyn FontEngine>> {
        self.fonts.as_ref()
    }

    pub fn set_font_engine(&mut self, engine: Option<Arc<dyn FontEngine>>) {
        self.fonts = engine;
    }

    /// Define the frame's textures and collect its soft faults
    pub fn prepare(&mut self, list: &Drawlist, textures: &mut TextureCache) -> Diagnostics {
        textures.advance_clock();
        let interp = &mut self.prepare;
        interp.reset();
        let scope = interp.enter_protected();
        let mut missing = 0;
        interp.run(list, |op| {
            let source = match op {
                DrawOp::DefineTexture { eid, width, height, format, stride, data } => {
                    if let Err(err) = textures.define(eid, width, height, format, stride, data) {
                        tracing::warn!(%eid, %err, "texture definition rejected");
                    }
                    return;
                }
                DrawOp::Fill { state, .. } | DrawOp::Paint { state } | DrawOp::Text { state, .. } => {
                    &state.fill_source
                }
                DrawOp::Stroke { state, .. } => &state.stroke_source,
                DrawOp::Glyph { stroke, state, .. } => {
                    if stroke {
                        &state.stroke_source
                    } else {
                        &state.fill_source
                    }
                }
                DrawOp::SetPixel { .. } | DrawOp::StartFrame | DrawOp::EndFrame => return,
            };
            if !touch_source(textures, source) {
                missing += 1;
            }
        });
        interp.leave_protected(scope);
        let mut diagnostics = interp.take_diagnostics();
        diagnostics.missing_textures += missing;
        diagnostics
    }

    /// Draw a prepared list into `target`, splitting it into row bands when
    /// more than one worker is configured. Returns false on edge overflow.
    pub fn draw(&mut self, list: &Drawlist, mut target: TargetView<'_>, textures: &TextureCache) -> bool {
        let fonts = self.fonts.as_deref();
        let workers = &mut self.workers;
        match &self.pool {
            Some(pool) if workers.len() > 1 => {
                let band_height = target.height().div_ceil(workers.len() as u32);
                let bands = target.into_bands(band_height);
                pool.install(|| {
                    workers
                        .par_iter_mut()
                        .zip(bands)
                        .map(|(worker, mut band)| worker.render(list, &mut band, textures, fonts))
                        .reduce(|| true, |a, b| a && b)
                })
            }
            _ => match workers.first_mut() {
                Some(worker) => worker.render(list, &mut target, textures, fonts),
                None => true,
            },
        }
    }

    /// Prepare and draw a whole frame, then evict unused textures
    pub fn render(&mut self, list: &Drawlist, target: TargetView<'_>, textures: &mut TextureCache) -> Diagnostics {
        let mut diagnostics = self.prepare(list, textures);
        if !self.draw(list, target, textures) {
            diagnostics.edge_overflow = true;
        }
        textures.evict();
        diagnostics
    }
}

/// Stamp a texture source as used. Returns false if its texture is missing.
pub(crate) fn touch_source(textures: &mut TextureCache, source: &PaintSource) -> bool {
    match source.texture_eid() {
        Some(eid) if !textures.touch(eid) => {
            tracing::warn!(%eid, "texture referenced but not defined");
            false
        }
        _ => true,
    }
}
