//! Font engine boundary
//!
//! Text and glyph commands are rendered through an installed
//! [`FontEngine`], which looks up glyphs, reports advances and kerning, and
//! emits outlines into a [`GlyphSink`]. Without an engine text is skipped.

use ctx_core::{GraphicsState, PathBuilder, Point};

/// Receives glyph outlines in user units relative to the pen position on
/// the baseline, y growing downwards
pub trait GlyphSink {
    fn move_to(&mut self, x: f32, y: f32);
    fn line_to(&mut self, x: f32, y: f32);
    fn quad_to(&mut self, cx: f32, cy: f32, x: f32, y: f32);
    fn curve_to(&mut self, cx0: f32, cy0: f32, cx1: f32, cy1: f32, x: f32, y: f32);
    fn close(&mut self);
}

/// Glyph source used for text rendering and measurement
pub trait FontEngine: Send + Sync {
    /// Glyph id for a code point
    fn glyph_lookup(&self, unichar: u32) -> Option<u32>;

    /// Horizontal advance of a glyph at `font_size`
    fn glyph_width(&self, glyph: u32, font_size: f32) -> f32;

    /// Advance adjustment between two consecutive glyphs
    fn glyph_kern(&self, _left: u32, _right: u32, _font_size: f32) -> f32 {
        0.0
    }

    /// Emit the outline of `glyph`. Returns false for glyphs without one.
    fn glyph(&self, glyph: u32, font_size: f32, sink: &mut dyn GlyphSink) -> bool;
}

/// Walk the glyphs of `text`, calling `f` with each glyph id and its pen
/// offset. Returns the total advance.
pub fn layout_text(
    engine: &dyn FontEngine,
    text: &str,
    font_size: f32,
    mut f: impl FnMut(u32, f32),
) -> f32 {
    let mut pen = 0.0;
    let mut previous = None;
    for ch in text.chars() {
        let Some(glyph) = engine.glyph_lookup(ch as u32) else {
            tracing::trace!(?ch, "no glyph");
            continue;
        };
        if let Some(left) = previous {
            pen += engine.glyph_kern(left, glyph, font_size);
        }
        f(glyph, pen);
        pen += engine.glyph_width(glyph, font_size);
        previous = Some(glyph);
    }
    pen
}

/// Advance width of `text`
pub fn text_width(engine: &dyn FontEngine, text: &str, font_size: f32) -> f32 {
    layout_text(engine, text, font_size, |_, _| {})
}

/// Appends glyph outlines to a path at a pen position, through the
/// current transform
pub struct GlyphPath<'a> {
    builder: &'a mut PathBuilder,
    state: &'a GraphicsState,
    origin: Point,
}

impl<'a> GlyphPath<'a> {
    pub fn new(builder: &'a mut PathBuilder, state: &'a GraphicsState, origin: Point) -> Self {
        Self {
            builder,
            state,
            origin,
        }
    }

    fn at(&self, x: f32, y: f32) -> Point {
        Point::new(self.origin.x + x, self.origin.y + y)
    }
}

impl GlyphSink for GlyphPath<'_> {
    fn move_to(&mut self, x: f32, y: f32) {
        let p = self.at(x, y);
        self.builder.move_to(self.state, p.x, p.y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let p = self.at(x, y);
        self.builder.line_to(self.state, p.x, p.y);
    }

    fn quad_to(&mut self, cx: f32, cy: f32, x: f32, y: f32) {
        let (c, p) = (self.at(cx, cy), self.at(x, y));
        self.builder.quad_to(self.state, c, p);
    }

    fn curve_to(&mut self, cx0: f32, cy0: f32, cx1: f32, cy1: f32, x: f32, y: f32) {
        let (c0, c1, p) = (self.at(cx0, cy0), self.at(cx1, cy1), self.at(x, y));
        self.builder.curve_to(self.state, c0, c1, p);
    }

    fn close(&mut self) {
        self.builder.close();
    }
}
