//! Textual form of a drawlist
//!
//! One command per line: a camelCase keyword followed by its arguments.
//! Numbers use the shortest decimal that round-trips the `f32`, strings are
//! double-quoted with backslash escapes, pixel data is a quoted hex string
//! and `#` starts a comment.
//!
//! ```text
//! save
//! moveTo 10 20.5
//! rgba 1 0 0 1
//! text "hello"
//! fill
//! restore
//! ```

use std::fmt::Write as _;

use super::command::{float_arity, from_floats, Command, DashArray};
use super::opcode::Opcode;
use super::Drawlist;
use crate::error::DrawlistError;
use crate::format::PixelFormat;
use crate::style::{BlendMode, CompositingMode, Extend, FillRule, LineCap, LineJoin};

const KEYWORDS: &[(Opcode, &str)] = &[
    (Opcode::Nop, "nop"),
    (Opcode::MoveTo, "moveTo"),
    (Opcode::LineTo, "lineTo"),
    (Opcode::CurveTo, "curveTo"),
    (Opcode::QuadTo, "quadTo"),
    (Opcode::SmoothTo, "smoothTo"),
    (Opcode::SmoothQuadTo, "smoothQuadTo"),
    (Opcode::RelMoveTo, "relMoveTo"),
    (Opcode::RelLineTo, "relLineTo"),
    (Opcode::RelCurveTo, "relCurveTo"),
    (Opcode::RelQuadTo, "relQuadTo"),
    (Opcode::RelSmoothTo, "relSmoothTo"),
    (Opcode::RelSmoothQuadTo, "relSmoothQuadTo"),
    (Opcode::HorLineTo, "horLineTo"),
    (Opcode::VerLineTo, "verLineTo"),
    (Opcode::RelHorLineTo, "relHorLineTo"),
    (Opcode::RelVerLineTo, "relVerLineTo"),
    (Opcode::ArcTo, "arcTo"),
    (Opcode::RelArcTo, "relArcTo"),
    (Opcode::Arc, "arc"),
    (Opcode::Rectangle, "rectangle"),
    (Opcode::RoundRectangle, "roundRectangle"),
    (Opcode::ClosePath, "closePath"),
    (Opcode::ResetPath, "resetPath"),
    (Opcode::Preserve, "preserve"),
    (Opcode::Fill, "fill"),
    (Opcode::Stroke, "stroke"),
    (Opcode::Clip, "clip"),
    (Opcode::Paint, "paint"),
    (Opcode::FillRect, "fillRect"),
    (Opcode::StrokeRect, "strokeRect"),
    (Opcode::Save, "save"),
    (Opcode::Restore, "restore"),
    (Opcode::StartFrame, "startFrame"),
    (Opcode::EndFrame, "endFrame"),
    (Opcode::Identity, "identity"),
    (Opcode::Translate, "translate"),
    (Opcode::Scale, "scale"),
    (Opcode::Rotate, "rotate"),
    (Opcode::ApplyTransform, "applyTransform"),
    (Opcode::SourceTransform, "sourceTransform"),
    (Opcode::StrokeSource, "strokeSource"),
    (Opcode::Color, "rgba"),
    (Opcode::Rgba8, "rgba8"),
    (Opcode::LinearGradient, "linearGradient"),
    (Opcode::RadialGradient, "radialGradient"),
    (Opcode::ConicGradient, "conicGradient"),
    (Opcode::GradientStop, "addStop"),
    (Opcode::Texture, "texture"),
    (Opcode::DefineTexture, "defineTexture"),
    (Opcode::Text, "text"),
    (Opcode::Glyph, "glyph"),
    (Opcode::SetPixel, "setPixel"),
    (Opcode::LineDash, "lineDash"),
    (Opcode::FillRule, "fillRule"),
    (Opcode::BlendMode, "blend"),
    (Opcode::MiterLimit, "miterLimit"),
    (Opcode::LineJoin, "lineJoin"),
    (Opcode::LineCap, "lineCap"),
    (Opcode::LineWidth, "lineWidth"),
    (Opcode::GlobalAlpha, "globalAlpha"),
    (Opcode::Compositing, "compositing"),
    (Opcode::FontSize, "fontSize"),
    (Opcode::ImageSmoothing, "imageSmoothing"),
    (Opcode::LineDashOffset, "lineDashOffset"),
    (Opcode::Extend, "extend"),
];

fn keyword(op: Opcode) -> &'static str {
    KEYWORDS
        .iter()
        .find(|(o, _)| *o == op)
        .map(|(_, k)| *k)
        .unwrap_or("nop")
}

fn opcode_for(word: &str) -> Option<Opcode> {
    KEYWORDS.iter().find(|(_, k)| *k == word).map(|(o, _)| *o)
}

fn push_quoted(out: &mut String, s: &str) {
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
}

fn push_hex(out: &mut String, bytes: &[u8]) {
    out.push('"');
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out.push('"');
}

/// Append the text form of one command, without a trailing newline
pub fn format_command(cmd: &Command, out: &mut String) {
    out.push_str(keyword(cmd.opcode()));

    if let Some(args) = cmd.float_args() {
        for v in args {
            let _ = write!(out, " {v}");
        }
        return;
    }

    match cmd {
        Command::Rgba8(c) => {
            let _ = write!(out, " {} {} {} {}", c[0], c[1], c[2], c[3]);
        }
        Command::Texture { eid, x, y } => {
            out.push(' ');
            push_quoted(out, eid);
            let _ = write!(out, " {x} {y}");
        }
        Command::DefineTexture {
            eid,
            width,
            height,
            format,
            stride,
            data,
        } => {
            out.push(' ');
            push_quoted(out, eid);
            let _ = write!(out, " {width} {height} {} {stride} ", format.name());
            push_hex(out, data);
        }
        Command::Text(text) => {
            out.push(' ');
            push_quoted(out, text);
        }
        Command::Glyph { unichar, stroke } => {
            let _ = write!(out, " {unichar} {}", *stroke as u8);
        }
        Command::SetPixel { x, y, rgba } => {
            let _ = write!(out, " {x} {y} {} {} {} {}", rgba[0], rgba[1], rgba[2], rgba[3]);
        }
        Command::LineDash(dashes) => {
            for d in dashes {
                let _ = write!(out, " {d}");
            }
        }
        Command::FillRule(v) => push_word(out, v.name()),
        Command::BlendMode(v) => push_word(out, v.name()),
        Command::LineJoin(v) => push_word(out, v.name()),
        Command::LineCap(v) => push_word(out, v.name()),
        Command::Compositing(v) => push_word(out, v.name()),
        Command::Extend(v) => push_word(out, v.name()),
        Command::ImageSmoothing(v) => {
            let _ = write!(out, " {}", *v as u8);
        }
        _ => {}
    }
}

fn push_word(out: &mut String, word: &str) {
    out.push(' ');
    out.push_str(word);
}

#[derive(Debug, PartialEq)]
struct Token {
    text: String,
    quoted: bool,
}

fn tokenize(line: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();
    while let Some(&ch) = chars.peek() {
        if ch.is_whitespace() {
            chars.next();
        } else if ch == '#' {
            break;
        } else if ch == '"' {
            chars.next();
            let mut text = String::new();
            loop {
                match chars.next() {
                    Some('"') => break,
                    Some('\\') => match chars.next() {
                        Some('n') => text.push('\n'),
                        Some('r') => text.push('\r'),
                        Some('t') => text.push('\t'),
                        Some(c) => text.push(c),
                        None => return Err("unterminated escape".into()),
                    },
                    Some(c) => text.push(c),
                    None => return Err("unterminated string".into()),
                }
            }
            tokens.push(Token { text, quoted: true });
        } else {
            let mut text = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() || c == '#' || c == '"' {
                    break;
                }
                text.push(c);
                chars.next();
            }
            tokens.push(Token {
                text,
                quoted: false,
            });
        }
    }
    Ok(tokens)
}

struct Args<'t> {
    tokens: &'t [Token],
    pos: usize,
}

impl<'t> Args<'t> {
    fn word(&mut self) -> Result<&'t str, String> {
        let tok = self.tokens.get(self.pos).ok_or("missing argument")?;
        if tok.quoted {
            return Err(format!("unexpected string \"{}\"", tok.text));
        }
        self.pos += 1;
        Ok(&tok.text)
    }

    fn string(&mut self) -> Result<String, String> {
        let tok = self.tokens.get(self.pos).ok_or("missing string argument")?;
        if !tok.quoted {
            return Err(format!("expected quoted string, found `{}`", tok.text));
        }
        self.pos += 1;
        Ok(tok.text.clone())
    }

    fn number<T: std::str::FromStr>(&mut self) -> Result<T, String> {
        let word = self.word()?;
        word.parse()
            .map_err(|_| format!("invalid number `{word}`"))
    }

    fn named<T>(&mut self, from_name: fn(&str) -> Option<T>) -> Result<T, String> {
        let word = self.word()?;
        from_name(word).ok_or_else(|| format!("unknown value `{word}`"))
    }

    fn remaining(&self) -> usize {
        self.tokens.len() - self.pos
    }
}

fn parse_hex(s: &str) -> Result<Vec<u8>, String> {
    if s.len() % 2 != 0 {
        return Err("odd-length hex data".into());
    }
    (0..s.len())
        .step_by(2)
        .map(|i| {
            s.get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| "invalid hex data".to_string())
        })
        .collect()
}

/// Parse one line; blank and comment-only lines yield `None`
pub fn parse_command(line: &str) -> Result<Option<Command>, String> {
    let tokens = tokenize(line)?;
    let Some((head, rest)) = tokens.split_first() else {
        return Ok(None);
    };
    if head.quoted {
        return Err("expected a command keyword".into());
    }
    let op = opcode_for(&head.text).ok_or_else(|| format!("unknown command `{}`", head.text))?;
    let mut args = Args {
        tokens: rest,
        pos: 0,
    };

    let cmd = if let Some(n) = float_arity(op) {
        let mut values = Vec::with_capacity(n);
        for _ in 0..n {
            values.push(args.number::<f32>()?);
        }
        from_floats(op, &values).ok_or("not a numeric command")?
    } else {
        match op {
            Opcode::Rgba8 => Command::Rgba8([
                args.number()?,
                args.number()?,
                args.number()?,
                args.number()?,
            ]),
            Opcode::Texture => Command::Texture {
                eid: args.string()?,
                x: args.number()?,
                y: args.number()?,
            },
            Opcode::DefineTexture => Command::DefineTexture {
                eid: args.string()?,
                width: args.number()?,
                height: args.number()?,
                format: args.named(PixelFormat::from_name)?,
                stride: args.number()?,
                data: parse_hex(&args.string()?)?,
            },
            Opcode::Text => Command::Text(args.string()?),
            Opcode::Glyph => Command::Glyph {
                unichar: args.number()?,
                stroke: args.number::<u8>()? != 0,
            },
            Opcode::SetPixel => Command::SetPixel {
                x: args.number()?,
                y: args.number()?,
                rgba: [
                    args.number()?,
                    args.number()?,
                    args.number()?,
                    args.number()?,
                ],
            },
            Opcode::LineDash => {
                let mut dashes = DashArray::new();
                while args.remaining() > 0 {
                    dashes.push(args.number()?);
                }
                Command::LineDash(dashes)
            }
            Opcode::FillRule => Command::FillRule(args.named(FillRule::from_name)?),
            Opcode::BlendMode => Command::BlendMode(args.named(BlendMode::from_name)?),
            Opcode::LineJoin => Command::LineJoin(args.named(LineJoin::from_name)?),
            Opcode::LineCap => Command::LineCap(args.named(LineCap::from_name)?),
            Opcode::Compositing => Command::Compositing(args.named(CompositingMode::from_name)?),
            Opcode::Extend => Command::Extend(args.named(Extend::from_name)?),
            Opcode::ImageSmoothing => Command::ImageSmoothing(args.number::<u8>()? != 0),
            _ => return Err(format!("command `{}` has no text form", head.text)),
        }
    };

    if args.remaining() > 0 {
        return Err(format!("unexpected trailing argument `{}`", rest[args.pos].text));
    }
    Ok(Some(cmd))
}

impl Drawlist {
    /// Text form, one command per line
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for cmd in self.iter() {
            format_command(&cmd, &mut out);
            out.push('\n');
        }
        out
    }

    /// Build a drawlist from its text form
    pub fn parse(text: &str, capacity: usize) -> Result<Drawlist, DrawlistError> {
        let mut list = Drawlist::new(capacity);
        for (index, line) in text.lines().enumerate() {
            let parsed = parse_command(line).map_err(|message| DrawlistError::Parse {
                line: index + 1,
                message,
            })?;
            if let Some(cmd) = parsed {
                list.append(&cmd)?;
            }
        }
        Ok(list)
    }
}
