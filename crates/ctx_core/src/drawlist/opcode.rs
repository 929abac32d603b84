//! Record opcodes
//!
//! Path and paint commands use printable ASCII codes; state setters and
//! rectangle shortcuts live above 127.

macro_rules! opcodes {
    ($( $(#[$meta:meta])* $variant:ident = $code:expr, )+) => {
        /// Opcode stored in the first byte of every record
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum Opcode {
            $( $(#[$meta])* $variant = $code, )+
        }

        impl Opcode {
            pub fn from_u8(code: u8) -> Option<Opcode> {
                $( if code == $code { return Some(Opcode::$variant); } )+
                None
            }
        }
    };
}

opcodes! {
    /// Continuation of the preceding command's arguments or payload
    Cont = 0,
    /// Header of a length-prefixed payload: byte length, record count
    Data = b'(',
    Nop = b' ',

    MoveTo = b'M',
    LineTo = b'L',
    CurveTo = b'C',
    QuadTo = b'Q',
    SmoothTo = b'S',
    SmoothQuadTo = b'T',
    RelMoveTo = b'm',
    RelLineTo = b'l',
    RelCurveTo = b'c',
    RelQuadTo = b'q',
    RelSmoothTo = b's',
    RelSmoothQuadTo = b't',
    HorLineTo = b'H',
    VerLineTo = b'V',
    RelHorLineTo = b'h',
    RelVerLineTo = b'v',
    ArcTo = b'A',
    RelArcTo = b'a',
    Arc = b'B',
    Rectangle = b'r',
    RoundRectangle = b'|',
    ClosePath = b'z',
    ResetPath = b'N',

    Preserve = b'j',
    Fill = b'F',
    Stroke = b'u',
    Clip = b'b',
    Paint = b'D',

    Save = b'g',
    Restore = b'G',
    StartFrame = b':',
    EndFrame = b'X',

    Identity = b'y',
    Translate = b'Y',
    Scale = b'O',
    Rotate = b'J',
    ApplyTransform = b'W',
    SourceTransform = b'`',
    StrokeSource = b'_',

    Color = b'K',
    Rgba8 = b'*',
    LinearGradient = b'f',
    RadialGradient = b'o',
    ConicGradient = b'U',
    GradientStop = b'p',
    Texture = b'i',
    DefineTexture = b'I',
    LineDash = b'd',
    Text = b'x',
    Glyph = b'w',
    SetPixel = b'-',

    /// Four relative line-tos, s8 coordinates in 1/8 px
    RelLineToX4 = b'0',
    /// Two relative line-tos, s16 coordinates in 1/8 px
    RelLineToX2 = b'4',
    /// Move-to followed by a relative line-to, s16 in 1/8 px
    MoveToRelLineTo = b'5',
    /// Relative line-to followed by a relative move-to, s16 in 1/8 px
    RelLineToRelMoveTo = b'6',
    /// Fill followed by a move-to, f32 coordinates
    FillMoveTo = b'7',
    /// Relative quad-to, s16 in 1/8 px
    RelQuadToS16 = b'9',

    FillRule = 128,
    BlendMode = 129,
    MiterLimit = 130,
    LineJoin = 131,
    LineCap = 132,
    LineWidth = 133,
    GlobalAlpha = 134,
    Compositing = 135,
    FontSize = 136,
    ImageSmoothing = 144,
    LineDashOffset = 145,
    Extend = 146,

    StrokeRect = 200,
    FillRect = 201,
}

impl Opcode {
    /// Packed opcodes expand to more than one logical command
    pub fn is_packed(self) -> bool {
        matches!(
            self,
            Opcode::RelLineToX4
                | Opcode::RelLineToX2
                | Opcode::MoveToRelLineTo
                | Opcode::RelLineToRelMoveTo
                | Opcode::FillMoveTo
                | Opcode::RelQuadToS16
        )
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}
