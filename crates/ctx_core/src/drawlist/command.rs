//! Logical drawlist commands and their record encoding

use smallvec::SmallVec;

use super::opcode::Opcode;
use super::record::{Record, PAYLOAD_SIZE};
use crate::color::Color;
use crate::format::PixelFormat;
use crate::style::{BlendMode, CompositingMode, Extend, FillRule, LineCap, LineJoin};

/// Dash pattern storage; most patterns have at most four entries
pub type DashArray = SmallVec<[f32; 4]>;

/// Records produced by encoding one command
pub type EncodedRecords = SmallVec<[Record; 8]>;

/// One logical command, as appended to and yielded from a drawlist
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Nop,

    // Path construction
    MoveTo { x: f32, y: f32 },
    LineTo { x: f32, y: f32 },
    CurveTo { cx0: f32, cy0: f32, cx1: f32, cy1: f32, x: f32, y: f32 },
    QuadTo { cx: f32, cy: f32, x: f32, y: f32 },
    SmoothTo { cx1: f32, cy1: f32, x: f32, y: f32 },
    SmoothQuadTo { x: f32, y: f32 },
    RelMoveTo { x: f32, y: f32 },
    RelLineTo { x: f32, y: f32 },
    RelCurveTo { cx0: f32, cy0: f32, cx1: f32, cy1: f32, x: f32, y: f32 },
    RelQuadTo { cx: f32, cy: f32, x: f32, y: f32 },
    RelSmoothTo { cx1: f32, cy1: f32, x: f32, y: f32 },
    RelSmoothQuadTo { x: f32, y: f32 },
    HorLineTo(f32),
    VerLineTo(f32),
    RelHorLineTo(f32),
    RelVerLineTo(f32),
    ArcTo { x1: f32, y1: f32, x2: f32, y2: f32, radius: f32 },
    RelArcTo { x1: f32, y1: f32, x2: f32, y2: f32, radius: f32 },
    Arc { x: f32, y: f32, radius: f32, angle1: f32, angle2: f32, anticlockwise: bool },
    Rectangle { x: f32, y: f32, width: f32, height: f32 },
    RoundRectangle { x: f32, y: f32, width: f32, height: f32, radius: f32 },
    ClosePath,
    ResetPath,

    // Painting
    Preserve,
    Fill,
    Stroke,
    Clip,
    Paint,
    FillRect { x: f32, y: f32, width: f32, height: f32 },
    StrokeRect { x: f32, y: f32, width: f32, height: f32 },

    // State stack and frames
    Save,
    Restore,
    StartFrame,
    EndFrame,

    // Transforms
    Identity,
    Translate { x: f32, y: f32 },
    Scale { x: f32, y: f32 },
    Rotate(f32),
    ApplyTransform([f32; 9]),
    SourceTransform([f32; 9]),

    // Sources
    StrokeSource,
    Color(Color),
    Rgba8([u8; 4]),
    LinearGradient { x0: f32, y0: f32, x1: f32, y1: f32 },
    RadialGradient { x0: f32, y0: f32, r0: f32, x1: f32, y1: f32, r1: f32 },
    ConicGradient { x: f32, y: f32, start_angle: f32, cycles: f32 },
    GradientStop { offset: f32, color: Color },
    Texture { eid: String, x: f32, y: f32 },
    DefineTexture {
        eid: String,
        width: u32,
        height: u32,
        format: PixelFormat,
        stride: u32,
        data: Vec<u8>,
    },

    // Text and pixels
    Text(String),
    Glyph { unichar: u32, stroke: bool },
    SetPixel { x: u16, y: u16, rgba: [u8; 4] },

    // Setters
    LineDash(DashArray),
    FillRule(FillRule),
    BlendMode(BlendMode),
    MiterLimit(f32),
    LineJoin(LineJoin),
    LineCap(LineCap),
    LineWidth(f32),
    GlobalAlpha(f32),
    Compositing(CompositingMode),
    FontSize(f32),
    ImageSmoothing(bool),
    LineDashOffset(f32),
    Extend(Extend),
}

impl Command {
    pub fn opcode(&self) -> Opcode {
        match self {
            Command::Nop => Opcode::Nop,
            Command::MoveTo { .. } => Opcode::MoveTo,
            Command::LineTo { .. } => Opcode::LineTo,
            Command::CurveTo { .. } => Opcode::CurveTo,
            Command::QuadTo { .. } => Opcode::QuadTo,
            Command::SmoothTo { .. } => Opcode::SmoothTo,
            Command::SmoothQuadTo { .. } => Opcode::SmoothQuadTo,
            Command::RelMoveTo { .. } => Opcode::RelMoveTo,
            Command::RelLineTo { .. } => Opcode::RelLineTo,
            Command::RelCurveTo { .. } => Opcode::RelCurveTo,
            Command::RelQuadTo { .. } => Opcode::RelQuadTo,
            Command::RelSmoothTo { .. } => Opcode::RelSmoothTo,
            Command::RelSmoothQuadTo { .. } => Opcode::RelSmoothQuadTo,
            Command::HorLineTo(_) => Opcode::HorLineTo,
            Command::VerLineTo(_) => Opcode::VerLineTo,
            Command::RelHorLineTo(_) => Opcode::RelHorLineTo,
            Command::RelVerLineTo(_) => Opcode::RelVerLineTo,
            Command::ArcTo { .. } => Opcode::ArcTo,
            Command::RelArcTo { .. } => Opcode::RelArcTo,
            Command::Arc { .. } => Opcode::Arc,
            Command::Rectangle { .. } => Opcode::Rectangle,
            Command::RoundRectangle { .. } => Opcode::RoundRectangle,
            Command::ClosePath => Opcode::ClosePath,
            Command::ResetPath => Opcode::ResetPath,
            Command::Preserve => Opcode::Preserve,
            Command::Fill => Opcode::Fill,
            Command::Stroke => Opcode::Stroke,
            Command::Clip => Opcode::Clip,
            Command::Paint => Opcode::Paint,
            Command::FillRect { .. } => Opcode::FillRect,
            Command::StrokeRect { .. } => Opcode::StrokeRect,
            Command::Save => Opcode::Save,
            Command::Restore => Opcode::Restore,
            Command::StartFrame => Opcode::StartFrame,
            Command::EndFrame => Opcode::EndFrame,
            Command::Identity => Opcode::Identity,
            Command::Translate { .. } => Opcode::Translate,
            Command::Scale { .. } => Opcode::Scale,
            Command::Rotate(_) => Opcode::Rotate,
            Command::ApplyTransform(_) => Opcode::ApplyTransform,
            Command::SourceTransform(_) => Opcode::SourceTransform,
            Command::StrokeSource => Opcode::StrokeSource,
            Command::Color(_) => Opcode::Color,
            Command::Rgba8(_) => Opcode::Rgba8,
            Command::LinearGradient { .. } => Opcode::LinearGradient,
            Command::RadialGradient { .. } => Opcode::RadialGradient,
            Command::ConicGradient { .. } => Opcode::ConicGradient,
            Command::GradientStop { .. } => Opcode::GradientStop,
            Command::Texture { .. } => Opcode::Texture,
            Command::DefineTexture { .. } => Opcode::DefineTexture,
            Command::Text(_) => Opcode::Text,
            Command::Glyph { .. } => Opcode::Glyph,
            Command::SetPixel { .. } => Opcode::SetPixel,
            Command::LineDash(_) => Opcode::LineDash,
            Command::FillRule(_) => Opcode::FillRule,
            Command::BlendMode(_) => Opcode::BlendMode,
            Command::MiterLimit(_) => Opcode::MiterLimit,
            Command::LineJoin(_) => Opcode::LineJoin,
            Command::LineCap(_) => Opcode::LineCap,
            Command::LineWidth(_) => Opcode::LineWidth,
            Command::GlobalAlpha(_) => Opcode::GlobalAlpha,
            Command::Compositing(_) => Opcode::Compositing,
            Command::FontSize(_) => Opcode::FontSize,
            Command::ImageSmoothing(_) => Opcode::ImageSmoothing,
            Command::LineDashOffset(_) => Opcode::LineDashOffset,
            Command::Extend(_) => Opcode::Extend,
        }
    }

    /// Float arguments of commands whose payload is a plain float list
    pub(crate) fn float_args(&self) -> Option<SmallVec<[f32; 9]>> {
        let args: SmallVec<[f32; 9]> = match *self {
            Command::MoveTo { x, y }
            | Command::LineTo { x, y }
            | Command::SmoothQuadTo { x, y }
            | Command::RelMoveTo { x, y }
            | Command::RelLineTo { x, y }
            | Command::RelSmoothQuadTo { x, y }
            | Command::Translate { x, y }
            | Command::Scale { x, y } => SmallVec::from_slice(&[x, y]),
            Command::CurveTo { cx0, cy0, cx1, cy1, x, y }
            | Command::RelCurveTo { cx0, cy0, cx1, cy1, x, y } => {
                SmallVec::from_slice(&[cx0, cy0, cx1, cy1, x, y])
            }
            Command::QuadTo { cx, cy, x, y } | Command::RelQuadTo { cx, cy, x, y } => {
                SmallVec::from_slice(&[cx, cy, x, y])
            }
            Command::SmoothTo { cx1, cy1, x, y } | Command::RelSmoothTo { cx1, cy1, x, y } => {
                SmallVec::from_slice(&[cx1, cy1, x, y])
            }
            Command::HorLineTo(v)
            | Command::VerLineTo(v)
            | Command::RelHorLineTo(v)
            | Command::RelVerLineTo(v)
            | Command::Rotate(v)
            | Command::MiterLimit(v)
            | Command::LineWidth(v)
            | Command::GlobalAlpha(v)
            | Command::FontSize(v)
            | Command::LineDashOffset(v) => SmallVec::from_slice(&[v]),
            Command::ArcTo { x1, y1, x2, y2, radius }
            | Command::RelArcTo { x1, y1, x2, y2, radius } => {
                SmallVec::from_slice(&[x1, y1, x2, y2, radius])
            }
            Command::Arc { x, y, radius, angle1, angle2, anticlockwise } => SmallVec::from_slice(&[
                x,
                y,
                radius,
                angle1,
                angle2,
                if anticlockwise { 1.0 } else { 0.0 },
            ]),
            Command::Rectangle { x, y, width, height }
            | Command::FillRect { x, y, width, height }
            | Command::StrokeRect { x, y, width, height } => {
                SmallVec::from_slice(&[x, y, width, height])
            }
            Command::RoundRectangle { x, y, width, height, radius } => {
                SmallVec::from_slice(&[x, y, width, height, radius])
            }
            Command::ApplyTransform(m) | Command::SourceTransform(m) => SmallVec::from_slice(&m),
            Command::Color(c) => SmallVec::from_slice(&c.to_array()),
            Command::LinearGradient { x0, y0, x1, y1 } => SmallVec::from_slice(&[x0, y0, x1, y1]),
            Command::RadialGradient { x0, y0, r0, x1, y1, r1 } => {
                SmallVec::from_slice(&[x0, y0, r0, x1, y1, r1])
            }
            Command::ConicGradient { x, y, start_angle, cycles } => {
                SmallVec::from_slice(&[x, y, start_angle, cycles])
            }
            Command::GradientStop { offset, color } => {
                SmallVec::from_slice(&[offset, color.r, color.g, color.b, color.a])
            }
            Command::Nop
            | Command::ClosePath
            | Command::ResetPath
            | Command::Preserve
            | Command::Fill
            | Command::Stroke
            | Command::Clip
            | Command::Paint
            | Command::Save
            | Command::Restore
            | Command::StartFrame
            | Command::EndFrame
            | Command::Identity
            | Command::StrokeSource => SmallVec::new(),
            _ => return None,
        };
        Some(args)
    }

    /// Encode into records: opcode record first, continuations after
    pub fn encode(&self) -> EncodedRecords {
        let mut out = EncodedRecords::new();
        let code = self.opcode().code();

        if let Some(args) = self.float_args() {
            push_floats(&mut out, code, &args);
            return out;
        }

        match self {
            Command::Rgba8(rgba) => {
                out.push(Record::new(code, [rgba[0], rgba[1], rgba[2], rgba[3], 0, 0, 0, 0]))
            }
            Command::Texture { eid, x, y } => {
                out.push(Record::with_f32(code, *x, *y));
                push_data(&mut out, eid.as_bytes());
            }
            Command::DefineTexture { eid, width, height, format, stride, data } => {
                out.push(Record::with_u32(code, *width, *height));
                out.push(Record::with_u32(Opcode::Cont.code(), *format as u32, *stride));
                push_data(&mut out, eid.as_bytes());
                push_data(&mut out, data);
            }
            Command::Text(text) => {
                out.push(Record::new(code, [0; PAYLOAD_SIZE]));
                push_data(&mut out, text.as_bytes());
            }
            Command::Glyph { unichar, stroke } => {
                out.push(Record::with_u32(code, *unichar, *stroke as u32))
            }
            Command::SetPixel { x, y, rgba } => {
                let [x0, x1] = x.to_le_bytes();
                let [y0, y1] = y.to_le_bytes();
                out.push(Record::new(code, [rgba[0], rgba[1], rgba[2], rgba[3], x0, x1, y0, y1]));
            }
            Command::LineDash(dashes) => {
                out.push(Record::with_u32(code, dashes.len() as u32, 0));
                for pair in dashes.chunks(2) {
                    out.push(Record::with_f32(
                        Opcode::Cont.code(),
                        pair[0],
                        pair.get(1).copied().unwrap_or(0.0),
                    ));
                }
            }
            Command::FillRule(v) => out.push(Record::with_u32(code, *v as u32, 0)),
            Command::BlendMode(v) => out.push(Record::with_u32(code, *v as u32, 0)),
            Command::LineJoin(v) => out.push(Record::with_u32(code, *v as u32, 0)),
            Command::LineCap(v) => out.push(Record::with_u32(code, *v as u32, 0)),
            Command::Compositing(v) => out.push(Record::with_u32(code, *v as u32, 0)),
            Command::Extend(v) => out.push(Record::with_u32(code, *v as u32, 0)),
            Command::ImageSmoothing(v) => out.push(Record::with_u32(code, *v as u32, 0)),
            _ => {}
        }
        out
    }

    /// Commands that begin or extend the current path
    pub fn is_path(&self) -> bool {
        matches!(
            self,
            Command::MoveTo { .. }
                | Command::LineTo { .. }
                | Command::CurveTo { .. }
                | Command::QuadTo { .. }
                | Command::SmoothTo { .. }
                | Command::SmoothQuadTo { .. }
                | Command::RelMoveTo { .. }
                | Command::RelLineTo { .. }
                | Command::RelCurveTo { .. }
                | Command::RelQuadTo { .. }
                | Command::RelSmoothTo { .. }
                | Command::RelSmoothQuadTo { .. }
                | Command::HorLineTo(_)
                | Command::VerLineTo(_)
                | Command::RelHorLineTo(_)
                | Command::RelVerLineTo(_)
                | Command::ArcTo { .. }
                | Command::RelArcTo { .. }
                | Command::Arc { .. }
                | Command::Rectangle { .. }
                | Command::RoundRectangle { .. }
                | Command::ClosePath
        )
    }
}

fn push_floats(out: &mut EncodedRecords, code: u8, args: &[f32]) {
    if args.is_empty() {
        out.push(Record::new(code, [0; PAYLOAD_SIZE]));
        return;
    }
    for (i, pair) in args.chunks(2).enumerate() {
        let c = if i == 0 { code } else { Opcode::Cont.code() };
        out.push(Record::with_f32(c, pair[0], pair.get(1).copied().unwrap_or(0.0)));
    }
}

/// Number of continuation records needed for `len` payload bytes
pub fn data_blocks(len: usize) -> usize {
    len.div_ceil(PAYLOAD_SIZE)
}

fn push_data(out: &mut EncodedRecords, bytes: &[u8]) {
    let blocks = data_blocks(bytes.len());
    out.push(Record::with_u32(Opcode::Data.code(), bytes.len() as u32, blocks as u32));
    for chunk in bytes.chunks(PAYLOAD_SIZE) {
        let mut data = [0u8; PAYLOAD_SIZE];
        data[..chunk.len()].copy_from_slice(chunk);
        out.push(Record::new(Opcode::Cont.code(), data));
    }
}

/// Number of float arguments of a float-list opcode
pub(crate) fn float_arity(op: Opcode) -> Option<usize> {
    Some(match op {
        Opcode::Nop
        | Opcode::ClosePath
        | Opcode::ResetPath
        | Opcode::Preserve
        | Opcode::Fill
        | Opcode::Stroke
        | Opcode::Clip
        | Opcode::Paint
        | Opcode::Save
        | Opcode::Restore
        | Opcode::StartFrame
        | Opcode::EndFrame
        | Opcode::Identity
        | Opcode::StrokeSource => 0,
        Opcode::HorLineTo
        | Opcode::VerLineTo
        | Opcode::RelHorLineTo
        | Opcode::RelVerLineTo
        | Opcode::Rotate
        | Opcode::MiterLimit
        | Opcode::LineWidth
        | Opcode::GlobalAlpha
        | Opcode::FontSize
        | Opcode::LineDashOffset => 1,
        Opcode::MoveTo
        | Opcode::LineTo
        | Opcode::SmoothQuadTo
        | Opcode::RelMoveTo
        | Opcode::RelLineTo
        | Opcode::RelSmoothQuadTo
        | Opcode::Translate
        | Opcode::Scale => 2,
        Opcode::QuadTo
        | Opcode::RelQuadTo
        | Opcode::SmoothTo
        | Opcode::RelSmoothTo
        | Opcode::Rectangle
        | Opcode::FillRect
        | Opcode::StrokeRect
        | Opcode::Color
        | Opcode::LinearGradient
        | Opcode::ConicGradient => 4,
        Opcode::ArcTo | Opcode::RelArcTo | Opcode::RoundRectangle | Opcode::GradientStop => 5,
        Opcode::CurveTo | Opcode::RelCurveTo | Opcode::Arc | Opcode::RadialGradient => 6,
        Opcode::ApplyTransform | Opcode::SourceTransform => 9,
        _ => return None,
    })
}

/// Records occupied by `n` float arguments
pub(crate) fn float_records(n: usize) -> usize {
    n.div_ceil(2).max(1)
}

/// Build a float-list command from its opcode and arguments
pub(crate) fn from_floats(op: Opcode, a: &[f32]) -> Option<Command> {
    let m9 = |a: &[f32]| -> [f32; 9] {
        let mut m = [0.0; 9];
        m.copy_from_slice(&a[..9]);
        m
    };
    Some(match op {
        Opcode::Nop => Command::Nop,
        Opcode::ClosePath => Command::ClosePath,
        Opcode::ResetPath => Command::ResetPath,
        Opcode::Preserve => Command::Preserve,
        Opcode::Fill => Command::Fill,
        Opcode::Stroke => Command::Stroke,
        Opcode::Clip => Command::Clip,
        Opcode::Paint => Command::Paint,
        Opcode::Save => Command::Save,
        Opcode::Restore => Command::Restore,
        Opcode::StartFrame => Command::StartFrame,
        Opcode::EndFrame => Command::EndFrame,
        Opcode::Identity => Command::Identity,
        Opcode::StrokeSource => Command::StrokeSource,
        Opcode::HorLineTo => Command::HorLineTo(a[0]),
        Opcode::VerLineTo => Command::VerLineTo(a[0]),
        Opcode::RelHorLineTo => Command::RelHorLineTo(a[0]),
        Opcode::RelVerLineTo => Command::RelVerLineTo(a[0]),
        Opcode::Rotate => Command::Rotate(a[0]),
        Opcode::MiterLimit => Command::MiterLimit(a[0]),
        Opcode::LineWidth => Command::LineWidth(a[0]),
        Opcode::GlobalAlpha => Command::GlobalAlpha(a[0]),
        Opcode::FontSize => Command::FontSize(a[0]),
        Opcode::LineDashOffset => Command::LineDashOffset(a[0]),
        Opcode::MoveTo => Command::MoveTo { x: a[0], y: a[1] },
        Opcode::LineTo => Command::LineTo { x: a[0], y: a[1] },
        Opcode::SmoothQuadTo => Command::SmoothQuadTo { x: a[0], y: a[1] },
        Opcode::RelMoveTo => Command::RelMoveTo { x: a[0], y: a[1] },
        Opcode::RelLineTo => Command::RelLineTo { x: a[0], y: a[1] },
        Opcode::RelSmoothQuadTo => Command::RelSmoothQuadTo { x: a[0], y: a[1] },
        Opcode::Translate => Command::Translate { x: a[0], y: a[1] },
        Opcode::Scale => Command::Scale { x: a[0], y: a[1] },
        Opcode::QuadTo => Command::QuadTo { cx: a[0], cy: a[1], x: a[2], y: a[3] },
        Opcode::RelQuadTo => Command::RelQuadTo { cx: a[0], cy: a[1], x: a[2], y: a[3] },
        Opcode::SmoothTo => Command::SmoothTo { cx1: a[0], cy1: a[1], x: a[2], y: a[3] },
        Opcode::RelSmoothTo => Command::RelSmoothTo { cx1: a[0], cy1: a[1], x: a[2], y: a[3] },
        Opcode::Rectangle => Command::Rectangle { x: a[0], y: a[1], width: a[2], height: a[3] },
        Opcode::FillRect => Command::FillRect { x: a[0], y: a[1], width: a[2], height: a[3] },
        Opcode::StrokeRect => Command::StrokeRect { x: a[0], y: a[1], width: a[2], height: a[3] },
        Opcode::Color => Command::Color(Color::rgba(a[0], a[1], a[2], a[3])),
        Opcode::LinearGradient => Command::LinearGradient { x0: a[0], y0: a[1], x1: a[2], y1: a[3] },
        Opcode::ConicGradient => Command::ConicGradient {
            x: a[0],
            y: a[1],
            start_angle: a[2],
            cycles: a[3],
        },
        Opcode::ArcTo => Command::ArcTo { x1: a[0], y1: a[1], x2: a[2], y2: a[3], radius: a[4] },
        Opcode::RelArcTo => Command::RelArcTo { x1: a[0], y1: a[1], x2: a[2], y2: a[3], radius: a[4] },
        Opcode::RoundRectangle => Command::RoundRectangle {
            x: a[0],
            y: a[1],
            width: a[2],
            height: a[3],
            radius: a[4],
        },
        Opcode::GradientStop => Command::GradientStop {
            offset: a[0],
            color: Color::rgba(a[1], a[2], a[3], a[4]),
        },
        Opcode::CurveTo => Command::CurveTo {
            cx0: a[0],
            cy0: a[1],
            cx1: a[2],
            cy1: a[3],
            x: a[4],
            y: a[5],
        },
        Opcode::RelCurveTo => Command::RelCurveTo {
            cx0: a[0],
            cy0: a[1],
            cx1: a[2],
            cy1: a[3],
            x: a[4],
            y: a[5],
        },
        Opcode::Arc => Command::Arc {
            x: a[0],
            y: a[1],
            radius: a[2],
            angle1: a[3],
            angle2: a[4],
            anticlockwise: a[5] != 0.0,
        },
        Opcode::RadialGradient => Command::RadialGradient {
            x0: a[0],
            y0: a[1],
            r0: a[2],
            x1: a[3],
            y1: a[4],
            r1: a[5],
        },
        Opcode::ApplyTransform => Command::ApplyTransform(m9(a)),
        Opcode::SourceTransform => Command::SourceTransform(m9(a)),
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_commands_use_two_args_per_record() {
        let cmd = Command::CurveTo { cx0: 1.0, cy0: 2.0, cx1: 3.0, cy1: 4.0, x: 5.0, y: 6.0 };
        let recs = cmd.encode();
        assert_eq!(recs.len(), 3);
        assert_eq!(recs[0].code, b'C');
        assert_eq!(recs[1].code, 0);
        assert_eq!(recs[2].f32(1), 6.0);
    }

    #[test]
    fn test_arity_table_matches_encoding() {
        let cmd = Command::ApplyTransform([1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);
        let n = float_arity(Opcode::ApplyTransform).unwrap();
        assert_eq!(cmd.encode().len(), float_records(n));
        assert_eq!(Command::Fill.encode().len(), float_records(0));
    }

    #[test]
    fn test_text_payload_is_length_prefixed() {
        let recs = Command::Text("hello world".into()).encode();
        assert_eq!(recs[0].code, b'x');
        assert_eq!(recs[1].code, b'(');
        assert_eq!(recs[1].u32(0), 11);
        assert_eq!(recs[1].u32(1), 2);
        assert_eq!(recs.len(), 4);
    }
}
