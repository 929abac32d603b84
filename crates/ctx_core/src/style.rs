//! Small enumerations carried by the graphics state.
//!
//! Every enum has a stable numeric value (used in drawlist records) and a
//! stable camelCase name (used by the text form).

macro_rules! named_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $value:literal => $text:literal, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $value, )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant,)+];

            pub fn from_u32(value: u32) -> Option<Self> {
                match value {
                    $( $value => Some($name::$variant), )+
                    _ => None,
                }
            }

            pub fn name(self) -> &'static str {
                match self {
                    $( $name::$variant => $text, )+
                }
            }

            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $( $text => Some($name::$variant), )+
                    _ => None,
                }
            }
        }
    };
}

pub(crate) use named_enum;

named_enum! {
    /// Rule deciding which regions of a self-intersecting path are inside
    #[derive(Default)]
    pub enum FillRule {
        #[default]
        Winding = 0 => "winding",
        EvenOdd = 1 => "evenOdd",
    }
}

named_enum! {
    /// Shape at the open ends of stroked subpaths
    #[derive(Default)]
    pub enum LineCap {
        #[default]
        Butt = 0 => "butt",
        Round = 1 => "round",
        Square = 2 => "square",
    }
}

named_enum! {
    /// Shape where two stroked segments meet
    #[derive(Default)]
    pub enum LineJoin {
        #[default]
        Bevel = 0 => "bevel",
        Round = 1 => "round",
        Miter = 2 => "miter",
    }
}

named_enum! {
    /// Porter-Duff compositing operator
    #[derive(Default)]
    pub enum CompositingMode {
        #[default]
        SourceOver = 0 => "sourceOver",
        Copy = 1 => "copy",
        SourceIn = 2 => "sourceIn",
        SourceOut = 3 => "sourceOut",
        SourceAtop = 4 => "sourceAtop",
        Clear = 5 => "clear",
        DestinationOver = 6 => "destinationOver",
        Destination = 7 => "destination",
        DestinationIn = 8 => "destinationIn",
        DestinationOut = 9 => "destinationOut",
        DestinationAtop = 10 => "destinationAtop",
        Xor = 11 => "xor",
    }
}

named_enum! {
    /// Separable and non-separable color blend modes
    #[derive(Default)]
    pub enum BlendMode {
        #[default]
        Normal = 0 => "normal",
        Multiply = 1 => "multiply",
        Screen = 2 => "screen",
        Overlay = 3 => "overlay",
        Darken = 4 => "darken",
        Lighten = 5 => "lighten",
        ColorDodge = 6 => "colorDodge",
        ColorBurn = 7 => "colorBurn",
        HardLight = 8 => "hardLight",
        SoftLight = 9 => "softLight",
        Difference = 10 => "difference",
        Exclusion = 11 => "exclusion",
        Hue = 12 => "hue",
        Saturation = 13 => "saturation",
        Color = 14 => "color",
        Luminosity = 15 => "luminosity",
        Divide = 16 => "divide",
        Addition = 17 => "addition",
        Subtract = 18 => "subtract",
    }
}

named_enum! {
    /// How textures and gradients continue outside their defined range
    #[derive(Default)]
    pub enum Extend {
        #[default]
        None = 0 => "none",
        Repeat = 1 => "repeat",
        Reflect = 2 => "reflect",
        Pad = 3 => "pad",
    }
}

named_enum! {
    /// Rasterizer antialiasing level
    #[derive(Default, serde::Serialize, serde::Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum Antialias {
        #[default]
        Default = 0 => "default",
        None = 1 => "none",
        Fast = 2 => "fast",
        Good = 3 => "good",
        Full = 4 => "full",
    }
}

impl Antialias {
    /// Vertical sub-scanlines sampled per pixel row
    pub fn samples(self) -> u32 {
        match self {
            Antialias::None => 1,
            Antialias::Default | Antialias::Fast => 3,
            Antialias::Good => 5,
            Antialias::Full => 15,
        }
    }
}
