//! Drawing context
//!
//! [`Context`] is the canvas-like entry point. Every call appends a command
//! to the frame's drawlist, applies it to a front-end state machine (for
//! queries such as the current point or key/value lookups) and hands it to
//! the backend. Frames are bracketed by [`Context::start_frame`] and
//! [`Context::end_frame`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use ctx_core::{
    BlendMode, Color, Command, CompositingMode, Diagnostics, Drawlist, Extend, FillRule, GraphicsState,
    Interpreter, LineCap, LineJoin, Matrix, PixelFormat, Point, Rect, StateError,
};
use ctx_raster::PixelBuffer;
use rustc_hash::FxHashMap;

use crate::backend::{Backend, CallbackBackend, DrawlistBackend, FramebufferBackend, PixelSink};
use crate::config::RenderConfig;
use crate::error::Result;
use crate::event::{Event, EventSource};
use crate::font::{text_width, FontEngine};
use crate::texture::content_eid;
use crate::thread::ThreadedBackend;

/// Drawing context over a backend
pub struct Context<B: Backend> {
    config: RenderConfig,
    drawlist: Drawlist,
    frontend: Interpreter,
    backend: B,
    fonts: Option<Arc<dyn FontEngine>>,
    events: Option<Box<dyn EventSource>>,
    texture_sizes: FxHashMap<String, (u32, u32)>,
    last_start: Option<Instant>,
    frame: u64,
    diagnostics: Diagnostics,
}

impl Context<DrawlistBackend> {
    /// Record-only context; the drawlist is the product
    pub fn new_drawlist(config: &RenderConfig) -> Result<Self> {
        Self::with_backend(config, DrawlistBackend)
    }
}

impl Context<FramebufferBackend> {
    /// Immediate-mode context drawing into an owned framebuffer
    pub fn new_framebuffer(config: &RenderConfig) -> Result<Self> {
        let backend = FramebufferBackend::new(config)?;
        Self::with_backend(config, backend)
    }

    pub fn framebuffer(&self) -> &PixelBuffer {
        self.backend.buffer()
    }
}

impl<S: PixelSink> Context<CallbackBackend<S>> {
    /// Context pushing rendered pixels to `sink` at end of frame
    pub fn new_callback(config: &RenderConfig, sink: S) -> Result<Self> {
        let backend = CallbackBackend::new(config, sink)?;
        Self::with_backend(config, backend)
    }
}

impl Context<ThreadedBackend> {
    /// Context rendering on a dedicated thread
    pub fn new_threaded(config: &RenderConfig) -> Result<Self> {
        let backend = ThreadedBackend::new(config)?;
        Self::with_backend(config, backend)
    }

    pub fn wait_for_renderer(&self) {
        self.backend.wait_for_renderer();
    }

    /// Drop submitted frames the render thread has not started
    pub fn cancel_frame(&self) {
        self.backend.cancel_frame();
    }
}

impl<B: Backend> Context<B> {
    pub fn with_backend(config: &RenderConfig, backend: B) -> Result<Self> {
        config.validate()?;
        let caps = config.capacities.clone().validated();
        tracing::debug!(
            backend = backend.name(),
            width = config.width,
            height = config.height,
            format = ?config.format,
            "context created"
        );
        Ok(Self {
            drawlist: Drawlist::with_capacities(&caps),
            frontend: Interpreter::new(config.width, config.height, &caps),
            config: config.clone(),
            backend,
            fonts: None,
            events: None,
            texture_sizes: FxHashMap::default(),
            last_start: None,
            frame: 0,
            diagnostics: Diagnostics::default(),
        })
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn width(&self) -> u32 {
        self.config.width
    }

    pub fn height(&self) -> u32 {
        self.config.height
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Frames started so far
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Append a command and apply it. Commands that do not fit the drawlist
    /// are dropped and flagged at end of frame.
    pub fn record(&mut self, cmd: Command) {
        if self.drawlist.append(&cmd).is_err() {
            return;
        }
        tracing::trace!(?cmd, "record");
        let _ = self.frontend.process(&cmd);
        self.backend.process(&cmd);
    }

    // Frame lifecycle

    /// Begin a frame: clears the drawlist and the graphics state. Returns
    /// the time since the previous frame started.
    pub fn start_frame(&mut self) -> Duration {
        let now = Instant::now();
        let elapsed = self
            .last_start
            .map(|start| now.duration_since(start))
            .unwrap_or_default();
        self.last_start = Some(now);
        self.frame += 1;
        self.drawlist.clear();
        self.frontend.reset();
        self.frontend.take_diagnostics();
        self.diagnostics = Diagnostics::default();
        self.backend.start_frame();
        tracing::debug!(frame = self.frame, ?elapsed, "frame started");
        elapsed
    }

    /// Finish the frame and hand it to the backend. Returns the soft faults
    /// met while recording and rendering it.
    pub fn end_frame(&mut self) -> Result<Diagnostics> {
        let rendered = self.backend.end_frame(&self.drawlist)?;
        let mut diagnostics = self.frontend.take_diagnostics();
        diagnostics.merge(&std::mem::take(&mut self.diagnostics));
        diagnostics.drawlist_overflow |= self.drawlist.overflowed();
        diagnostics.edge_overflow |= rendered.edge_overflow;
        diagnostics.malformed_stream |= rendered.malformed_stream;
        diagnostics.missing_textures += rendered.missing_textures;
        if !diagnostics.is_clean() {
            tracing::warn!(frame = self.frame, ?diagnostics, "frame finished with faults");
        }
        tracing::debug!(
            frame = self.frame,
            records = self.drawlist.len(),
            backend = self.backend.name(),
            "frame ended"
        );
        Ok(diagnostics)
    }

    // Drawlist access

    /// Read-only snapshot of the frame recorded so far
    pub fn drawlist(&self) -> &Drawlist {
        &self.drawlist
    }

    fn replay_from(&mut self, start: usize) {
        let mut iter = self.drawlist.iter_from(start);
        for cmd in iter.by_ref() {
            let _ = self.frontend.process(&cmd);
            self.backend.process(&cmd);
        }
        if let Some(err) = iter.error() {
            tracing::warn!(%err, "drawlist replay stopped at malformed record");
            self.diagnostics.malformed_stream = true;
        }
    }

    /// Replace the frame's contents with a serialized drawlist
    pub fn set_drawlist(&mut self, bytes: &[u8]) -> Result<()> {
        self.drawlist.set_bytes(bytes)?;
        self.frontend.reset();
        self.backend.start_frame();
        self.replay_from(0);
        Ok(())
    }

    /// Append a serialized drawlist to the frame
    pub fn append_drawlist(&mut self, bytes: &[u8]) -> Result<()> {
        let start = self.drawlist.len();
        self.drawlist.append_bytes(bytes)?;
        self.replay_from(start);
        Ok(())
    }

    /// Parse the text form and record its commands
    pub fn append_text(&mut self, text: &str) -> Result<()> {
        let parsed = Drawlist::parse(text, self.drawlist.capacity())?;
        for cmd in parsed.iter() {
            self.record(cmd);
        }
        Ok(())
    }

    /// Truncate the drawlist to `count` records
    pub fn force_count(&mut self, count: usize) {
        self.drawlist.force_count(count);
    }

    // Path construction

    pub fn move_to(&mut self, x: f32, y: f32) {
        self.record(Command::MoveTo { x, y });
    }

    pub fn line_to(&mut self, x: f32, y: f32) {
        self.record(Command::LineTo { x, y });
    }

    pub fn curve_to(&mut self, cx0: f32, cy0: f32, cx1: f32, cy1: f32, x: f32, y: f32) {
        self.record(Command::CurveTo { cx0, cy0, cx1, cy1, x, y });
    }

    pub fn quad_to(&mut self, cx: f32, cy: f32, x: f32, y: f32) {
        self.record(Command::QuadTo { cx, cy, x, y });
    }

    /// Cubic whose first control point reflects the previous curve's last
    pub fn smooth_to(&mut self, cx1: f32, cy1: f32, x: f32, y: f32) {
        self.record(Command::SmoothTo { cx1, cy1, x, y });
    }

    pub fn smooth_quad_to(&mut self, x: f32, y: f32) {
        self.record(Command::SmoothQuadTo { x, y });
    }

    pub fn rel_move_to(&mut self, x: f32, y: f32) {
        self.record(Command::RelMoveTo { x, y });
    }

    pub fn rel_line_to(&mut self, x: f32, y: f32) {
        self.record(Command::RelLineTo { x, y });
    }

    pub fn rel_curve_to(&mut self, cx0: f32, cy0: f32, cx1: f32, cy1: f32, x: f32, y: f32) {
        self.record(Command::RelCurveTo { cx0, cy0, cx1, cy1, x, y });
    }

    pub fn rel_quad_to(&mut self, cx: f32, cy: f32, x: f32, y: f32) {
        self.record(Command::RelQuadTo { cx, cy, x, y });
    }

    pub fn rel_smooth_to(&mut self, cx1: f32, cy1: f32, x: f32, y: f32) {
        self.record(Command::RelSmoothTo { cx1, cy1, x, y });
    }

    pub fn rel_smooth_quad_to(&mut self, x: f32, y: f32) {
        self.record(Command::RelSmoothQuadTo { x, y });
    }

    pub fn hor_line_to(&mut self, x: f32) {
        self.record(Command::HorLineTo(x));
    }

    pub fn ver_line_to(&mut self, y: f32) {
        self.record(Command::VerLineTo(y));
    }

    pub fn rel_hor_line_to(&mut self, x: f32) {
        self.record(Command::RelHorLineTo(x));
    }

    pub fn rel_ver_line_to(&mut self, y: f32) {
        self.record(Command::RelVerLineTo(y));
    }

    /// Tangent arc through the corner (x1, y1) towards (x2, y2)
    pub fn arc_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, radius: f32) {
        self.record(Command::ArcTo { x1, y1, x2, y2, radius });
    }

    pub fn rel_arc_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, radius: f32) {
        self.record(Command::RelArcTo { x1, y1, x2, y2, radius });
    }

    /// Circular arc around (x, y) from `angle1` to `angle2` radians
    pub fn arc(&mut self, x: f32, y: f32, radius: f32, angle1: f32, angle2: f32, anticlockwise: bool) {
        self.record(Command::Arc {
            x,
            y,
            radius,
            angle1,
            angle2,
            anticlockwise,
        });
    }

    pub fn rectangle(&mut self, x: f32, y: f32, width: f32, height: f32) {
        self.record(Command::Rectangle { x, y, width, height });
    }

    pub fn round_rectangle(&mut self, x: f32, y: f32, width: f32, height: f32, radius: f32) {
        self.record(Command::RoundRectangle {
            x,
            y,
            width,
            height,
            radius,
        });
    }

    pub fn close_path(&mut self) {
        self.record(Command::ClosePath);
    }

    pub fn reset_path(&mut self) {
        self.record(Command::ResetPath);
    }

    // Painting

    /// Keep the path through the next fill, stroke or clip
    pub fn preserve(&mut self) {
        self.record(Command::Preserve);
    }

    pub fn fill(&mut self) {
        self.record(Command::Fill);
    }

    pub fn stroke(&mut self) {
        self.record(Command::Stroke);
    }

    /// Intersect the clip with the path's bounds
    pub fn clip(&mut self) {
        self.record(Command::Clip);
    }

    /// Fill the whole clip region
    pub fn paint(&mut self) {
        self.record(Command::Paint);
    }

    pub fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
        self.record(Command::FillRect { x, y, width, height });
    }

    pub fn stroke_rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
        self.record(Command::StrokeRect { x, y, width, height });
    }

    // State

    pub fn save(&mut self) {
        self.record(Command::Save);
    }

    pub fn restore(&mut self) {
        self.record(Command::Restore);
    }

    pub fn identity(&mut self) {
        self.record(Command::Identity);
    }

    pub fn translate(&mut self, x: f32, y: f32) {
        self.record(Command::Translate { x, y });
    }

    pub fn scale(&mut self, x: f32, y: f32) {
        self.record(Command::Scale { x, y });
    }

    pub fn rotate(&mut self, radians: f32) {
        self.record(Command::Rotate(radians));
    }

    pub fn apply_transform(&mut self, matrix: &Matrix) {
        self.record(Command::ApplyTransform(matrix.to_array()));
    }

    /// Replace the current transform
    #[allow(clippy::too_many_arguments)]
    pub fn set_transform(&mut self, a: f32, b: f32, c: f32, d: f32, e: f32, f: f32, g: f32, h: f32, i: f32) {
        self.record(Command::Identity);
        self.record(Command::ApplyTransform([a, b, c, d, e, f, g, h, i]));
    }

    /// Transform applied to the most recently set gradient or texture source
    pub fn source_transform(&mut self, matrix: &Matrix) {
        self.record(Command::SourceTransform(matrix.to_array()));
    }

    /// Make the next source apply to strokes
    pub fn stroke_source(&mut self) {
        self.record(Command::StrokeSource);
    }

    pub fn color(&mut self, color: Color) {
        self.record(Command::Color(color));
    }

    pub fn rgba(&mut self, r: f32, g: f32, b: f32, a: f32) {
        self.color(Color::rgba(r, g, b, a));
    }

    pub fn rgb(&mut self, r: f32, g: f32, b: f32) {
        self.color(Color::rgb(r, g, b));
    }

    pub fn gray(&mut self, level: f32) {
        self.color(Color::gray(level));
    }

    pub fn rgba8(&mut self, r: u8, g: u8, b: u8, a: u8) {
        self.record(Command::Rgba8([r, g, b, a]));
    }

    pub fn linear_gradient(&mut self, x0: f32, y0: f32, x1: f32, y1: f32) {
        self.record(Command::LinearGradient { x0, y0, x1, y1 });
    }

    pub fn radial_gradient(&mut self, x0: f32, y0: f32, r0: f32, x1: f32, y1: f32, r1: f32) {
        self.record(Command::RadialGradient { x0, y0, r0, x1, y1, r1 });
    }

    pub fn conic_gradient(&mut self, x: f32, y: f32, start_angle: f32, cycles: f32) {
        self.record(Command::ConicGradient {
            x,
            y,
            start_angle,
            cycles,
        });
    }

    /// Add a stop to the current gradient
    pub fn gradient_add_stop(&mut self, offset: f32, color: Color) {
        self.record(Command::GradientStop { offset, color });
    }

    /// Use a defined texture as source, its origin placed at (x, y)
    pub fn texture(&mut self, eid: &str, x: f32, y: f32) {
        self.record(Command::Texture {
            eid: eid.to_owned(),
            x,
            y,
        });
    }

    /// Define a texture and return its eid. Without an `eid` one is derived
    /// from the contents, so redefining identical pixels is free.
    pub fn define_texture(
        &mut self,
        eid: Option<&str>,
        width: u32,
        height: u32,
        format: PixelFormat,
        stride: u32,
        data: &[u8],
    ) -> String {
        let eid = match eid {
            Some(eid) => eid.to_owned(),
            None => content_eid(width, height, format, stride, data),
        };
        self.record(Command::DefineTexture {
            eid: eid.clone(),
            width,
            height,
            format,
            stride,
            data: data.to_vec(),
        });
        self.texture_sizes.insert(eid.clone(), (width, height));
        eid
    }

    /// Draw a whole texture stretched over the rectangle (x, y, width, height)
    pub fn draw_texture(&mut self, eid: &str, x: f32, y: f32, width: f32, height: f32) {
        let Some(&(tw, th)) = self.texture_sizes.get(eid) else {
            tracing::warn!(%eid, "draw of unknown texture");
            return;
        };
        self.draw_texture_clipped(eid, x, y, width, height, 0.0, 0.0, tw as f32, th as f32);
    }

    /// Draw the texture region (sx, sy, swidth, sheight) stretched over the
    /// rectangle (x, y, width, height)
    #[allow(clippy::too_many_arguments)]
    pub fn draw_texture_clipped(
        &mut self,
        eid: &str,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        sx: f32,
        sy: f32,
        swidth: f32,
        sheight: f32,
    ) {
        if swidth <= 0.0 || sheight <= 0.0 {
            return;
        }
        let (kx, ky) = (width / swidth, height / sheight);
        self.save();
        self.rectangle(x, y, width, height);
        self.texture(eid, x - sx * kx, y - sy * ky);
        if kx != 1.0 || ky != 1.0 {
            self.source_transform(&Matrix::scaling(kx, ky));
        }
        self.fill();
        self.restore();
    }

    /// Forget a texture in this context and its backend
    pub fn drop_eid(&mut self, eid: &str) {
        self.texture_sizes.remove(eid);
        self.backend.drop_eid(eid);
    }

    pub fn set_texture_clock(&mut self, frame: u64) {
        self.backend.set_texture_clock(frame);
    }

    // Text

    pub fn font_size(&mut self, size: f32) {
        self.record(Command::FontSize(size));
    }

    pub fn font_engine(&self) -> Option<&Arc<dyn FontEngine>> {
        self.fonts.as_ref()
    }

    pub fn set_font_engine(&mut self, engine: Option<Arc<dyn FontEngine>>) {
        self.fonts = engine.clone();
        self.backend.set_font_engine(engine);
    }

    /// Draw text at the current point. With a font engine installed the
    /// current point advances past the text.
    pub fn text(&mut self, text: &str) {
        let origin = self.current_point().unwrap_or_default();
        self.record(Command::Text(text.to_owned()));
        let advance = self.text_width(text);
        if advance != 0.0 {
            self.move_to(origin.x + advance, origin.y);
        }
    }

    /// Draw one glyph at the current point, filled or stroked
    pub fn glyph(&mut self, unichar: u32, stroke: bool) {
        self.record(Command::Glyph { unichar, stroke });
    }

    /// Advance width of `text` at the current font size; 0 without a font
    /// engine
    pub fn text_width(&self, text: &str) -> f32 {
        match &self.fonts {
            Some(engine) => text_width(engine.as_ref(), text, self.state().font_size),
            None => 0.0,
        }
    }

    // Pixels and setters

    /// Write one pixel, bypassing transform, clip and compositing
    pub fn set_pixel(&mut self, x: u16, y: u16, r: u8, g: u8, b: u8, a: u8) {
        self.record(Command::SetPixel { x, y, rgba: [r, g, b, a] });
    }

    pub fn line_width(&mut self, width: f32) {
        self.record(Command::LineWidth(width));
    }

    pub fn line_cap(&mut self, cap: LineCap) {
        self.record(Command::LineCap(cap));
    }

    pub fn line_join(&mut self, join: LineJoin) {
        self.record(Command::LineJoin(join));
    }

    pub fn miter_limit(&mut self, limit: f32) {
        self.record(Command::MiterLimit(limit));
    }

    pub fn line_dash(&mut self, dashes: &[f32]) {
        self.record(Command::LineDash(dashes.iter().copied().collect()));
    }

    pub fn line_dash_offset(&mut self, offset: f32) {
        self.record(Command::LineDashOffset(offset));
    }

    pub fn fill_rule(&mut self, rule: FillRule) {
        self.record(Command::FillRule(rule));
    }

    pub fn blend_mode(&mut self, mode: BlendMode) {
        self.record(Command::BlendMode(mode));
    }

    pub fn compositing_mode(&mut self, mode: CompositingMode) {
        self.record(Command::Compositing(mode));
    }

    pub fn global_alpha(&mut self, alpha: f32) {
        self.record(Command::GlobalAlpha(alpha));
    }

    pub fn image_smoothing(&mut self, enabled: bool) {
        self.record(Command::ImageSmoothing(enabled));
    }

    pub fn extend(&mut self, extend: Extend) {
        self.record(Command::Extend(extend));
    }

    // Queries

    /// Current point in user space
    pub fn current_point(&self) -> Option<Point> {
        self.frontend.path().current_point()
    }

    pub fn x(&self) -> f32 {
        self.current_point().map_or(0.0, |p| p.x)
    }

    pub fn y(&self) -> f32 {
        self.current_point().map_or(0.0, |p| p.y)
    }

    /// Device-space bounds of the current path
    pub fn path_extents(&self) -> Option<Rect> {
        self.frontend.path().extents()
    }

    pub fn state(&self) -> &GraphicsState {
        self.frontend.state()
    }

    // Key/value store, scoped to save/restore

    fn note(&mut self, result: std::result::Result<(), StateError>) {
        if let Err(err) = result {
            tracing::warn!(%err, "key/value write dropped");
            self.diagnostics.note_state(err);
        }
    }

    pub fn set_float(&mut self, key: u64, value: f32) {
        let result = self.frontend.stack_mut().set_float(key, value);
        self.note(result);
    }

    pub fn get_float(&self, key: u64) -> Option<f32> {
        self.frontend.stack().get_float(key)
    }

    pub fn set_string(&mut self, key: u64, value: &str) {
        let result = self.frontend.stack_mut().set_string(key, value);
        self.note(result);
    }

    pub fn get_string(&self, key: u64) -> Option<&str> {
        self.frontend.stack().get_string(key)
    }

    pub fn is_set(&self, key: u64) -> bool {
        self.frontend.stack().is_set(key)
    }

    // Events

    /// Install an event source, destroying the previous one
    pub fn set_event_source(&mut self, source: Option<Box<dyn EventSource>>) {
        if let Some(mut previous) = std::mem::replace(&mut self.events, source) {
            previous.destroy();
        }
    }

    pub fn has_event(&mut self, timeout_ms: u32) -> bool {
        self.events
            .as_mut()
            .is_some_and(|events| events.has_event(timeout_ms))
    }

    pub fn get_event(&mut self) -> Option<Event> {
        self.events.as_mut()?.get_event()
    }

    pub fn get_fd(&self) -> Option<i32> {
        self.events.as_ref()?.get_fd()
    }
}

impl<B: Backend> Drop for Context<B> {
    fn drop(&mut self) {
        if let Some(mut events) = self.events.take() {
            events.destroy();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctx_core::{strhash, Capacities};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::event::EventQueue;
    use crate::font::GlyphSink;

    fn config() -> RenderConfig {
        RenderConfig::standard().with_size(16, 16)
    }

    struct Squares;

    impl FontEngine for Squares {
        fn glyph_lookup(&self, unichar: u32) -> Option<u32> {
            Some(unichar)
        }

        fn glyph_width(&self, _glyph: u32, font_size: f32) -> f32 {
            font_size
        }

        fn glyph(&self, _glyph: u32, font_size: f32, sink: &mut dyn GlyphSink) -> bool {
            sink.move_to(0.0, -font_size);
            sink.line_to(font_size, -font_size);
            sink.line_to(font_size, 0.0);
            sink.line_to(0.0, 0.0);
            sink.close();
            true
        }
    }

    #[test]
    fn test_start_frame_clears_list_and_state() {
        let mut ctx = Context::new_drawlist(&config()).unwrap();
        assert_eq!(ctx.start_frame(), Duration::ZERO);
        ctx.translate(3.0, 4.0);
        ctx.move_to(1.0, 1.0);
        assert_eq!(ctx.current_point(), Some(Point::new(1.0, 1.0)));
        assert!(!ctx.drawlist().is_empty());
        ctx.end_frame().unwrap();

        ctx.start_frame();
        assert!(ctx.drawlist().is_empty());
        assert_eq!(ctx.current_point(), None);
        assert!(ctx.state().transform().matrix().is_identity());
        assert_eq!(ctx.frame(), 2);
    }

    #[test]
    fn test_drawlist_overflow_reported() {
        let config = config().with_capacities(Capacities::standard().with_drawlist_records(4));
        let mut ctx = Context::new_drawlist(&config).unwrap();
        ctx.start_frame();
        for i in 0..10 {
            ctx.rectangle(i as f32, 0.0, 1.0, 1.0);
        }
        assert!(ctx.drawlist().len() <= 4);
        let diagnostics = ctx.end_frame().unwrap();
        assert!(diagnostics.drawlist_overflow);
    }

    #[test]
    fn test_unbalanced_restore_reported() {
        let mut ctx = Context::new_drawlist(&config()).unwrap();
        ctx.start_frame();
        ctx.save();
        ctx.restore();
        ctx.restore();
        let diagnostics = ctx.end_frame().unwrap();
        assert_eq!(diagnostics.unbalanced_restores, 1);
    }

    #[test]
    fn test_keydb_is_save_scoped() {
        let mut ctx = Context::new_drawlist(&config()).unwrap();
        ctx.start_frame();
        let key = strhash("opacity");
        ctx.set_float(key, 0.5);
        ctx.save();
        ctx.set_float(key, 0.25);
        ctx.set_string(strhash("name"), "inner");
        assert_eq!(ctx.get_float(key), Some(0.25));
        assert_eq!(ctx.get_string(strhash("name")), Some("inner"));
        ctx.restore();
        assert_eq!(ctx.get_float(key), Some(0.5));
        assert!(!ctx.is_set(strhash("name")));
    }

    #[test]
    fn test_define_texture_derives_eid() {
        let mut ctx = Context::new_framebuffer(&config()).unwrap();
        ctx.start_frame();
        let pixels = [0u8, 0, 255, 255];
        let eid = ctx.define_texture(None, 1, 1, PixelFormat::Rgba8, 4, &pixels);
        assert_eq!(eid, content_eid(1, 1, PixelFormat::Rgba8, 4, &pixels));
        assert_eq!(ctx.define_texture(Some("blue"), 1, 1, PixelFormat::Rgba8, 4, &pixels), "blue");
        ctx.draw_texture(&eid, 2.0, 2.0, 4.0, 4.0);
        assert_eq!(ctx.framebuffer().pixel(3, 3), [0, 0, 255, 255]);
        assert_eq!(ctx.framebuffer().pixel(7, 7), [0, 0, 0, 0]);
        let diagnostics = ctx.end_frame().unwrap();
        assert_eq!(diagnostics.missing_textures, 0);
    }

    #[test]
    fn test_text_advances_current_point() {
        let mut ctx = Context::new_framebuffer(&config()).unwrap();
        ctx.set_font_engine(Some(Arc::new(Squares)));
        ctx.start_frame();
        ctx.font_size(4.0);
        ctx.color(Color::WHITE);
        ctx.move_to(2.0, 6.0);
        assert_eq!(ctx.text_width("ab"), 8.0);
        ctx.text("ab");
        assert_eq!(ctx.current_point(), Some(Point::new(10.0, 6.0)));
        assert_eq!(ctx.framebuffer().pixel(3, 4), [255, 255, 255, 255]);
        assert_eq!(ctx.framebuffer().pixel(8, 3), [255, 255, 255, 255]);
        assert_eq!(ctx.framebuffer().pixel(11, 4), [0, 0, 0, 0]);
    }

    #[test]
    fn test_text_skipped_without_font_engine() {
        let mut ctx = Context::new_framebuffer(&config()).unwrap();
        ctx.start_frame();
        ctx.move_to(2.0, 6.0);
        ctx.text("ab");
        assert_eq!(ctx.current_point(), Some(Point::new(2.0, 6.0)));
        assert!(ctx.framebuffer().data().iter().all(|b| *b == 0));
    }

    #[test]
    fn test_append_text_records_commands() {
        let mut ctx = Context::new_framebuffer(&config()).unwrap();
        ctx.start_frame();
        ctx.append_text("rgba 1 0 0 1\nrectangle 0 0 4 4\nfill\n").unwrap();
        assert_eq!(ctx.framebuffer().pixel(1, 1), [255, 0, 0, 255]);
        assert!(ctx.append_text("bogus 1 2").is_err());
    }

    #[test]
    fn test_set_drawlist_replays_into_state() {
        let mut source = Context::new_drawlist(&config()).unwrap();
        source.start_frame();
        source.translate(2.0, 0.0);
        source.move_to(1.0, 1.0);
        let bytes = source.drawlist().as_bytes().to_vec();

        let mut ctx = Context::new_drawlist(&config()).unwrap();
        ctx.start_frame();
        ctx.set_drawlist(&bytes).unwrap();
        assert_eq!(ctx.drawlist().as_bytes(), &bytes[..]);
        assert_eq!(ctx.path_extents().map(|r| r.x), Some(3.0));
        ctx.append_drawlist(&bytes).unwrap();
        assert_eq!(ctx.drawlist().len(), 2 * bytes.len() / ctx_core::drawlist::RECORD_SIZE);
    }

    struct CountingSource(Arc<AtomicUsize>);

    impl EventSource for CountingSource {
        fn has_event(&mut self, _timeout_ms: u32) -> bool {
            false
        }

        fn get_event(&mut self) -> Option<Event> {
            None
        }

        fn get_fd(&self) -> Option<i32> {
            Some(7)
        }

        fn destroy(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_event_sources_destroyed() {
        let destroyed = Arc::new(AtomicUsize::new(0));
        let mut ctx = Context::new_drawlist(&config()).unwrap();
        assert!(!ctx.has_event(0));
        ctx.set_event_source(Some(Box::new(CountingSource(destroyed.clone()))));
        assert_eq!(ctx.get_fd(), Some(7));

        let mut queue = EventQueue::new();
        queue.push(Event::Message("hello".into()));
        ctx.set_event_source(Some(Box::new(queue)));
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
        assert!(ctx.has_event(0));
        assert_eq!(ctx.get_event(), Some(Event::Message("hello".into())));

        ctx.set_event_source(Some(Box::new(CountingSource(destroyed.clone()))));
        drop(ctx);
        assert_eq!(destroyed.load(Ordering::SeqCst), 2);
    }
}
