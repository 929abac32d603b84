//! Pixel format tags and their storage geometry

use crate::style::named_enum;

named_enum! {
    /// Pixel storage format of a buffer or texture
    #[derive(Default, serde::Serialize, serde::Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum PixelFormat {
        Gray8 = 1 => "gray8",
        GrayA8 = 2 => "graya8",
        Rgb8 = 3 => "rgb8",
        #[default]
        Rgba8 = 4 => "rgba8",
        Bgra8 = 5 => "bgra8",
        Rgb565 = 6 => "rgb565",
        Rgb565ByteSwapped = 7 => "rgb565ByteSwapped",
        Rgb332 = 8 => "rgb332",
        RgbaF = 9 => "rgbaf",
        Gray1 = 12 => "gray1",
        Gray2 = 16 => "gray2",
        Bgr8 = 18 => "bgr8",
        Gray4 = 32 => "gray4",
    }
}

impl PixelFormat {
    /// Number of color/alpha components stored per pixel
    pub fn components(self) -> u32 {
        match self {
            PixelFormat::Gray1 | PixelFormat::Gray2 | PixelFormat::Gray4 | PixelFormat::Gray8 => 1,
            PixelFormat::GrayA8 => 2,
            PixelFormat::Rgb8
            | PixelFormat::Bgr8
            | PixelFormat::Rgb565
            | PixelFormat::Rgb565ByteSwapped
            | PixelFormat::Rgb332 => 3,
            PixelFormat::Rgba8 | PixelFormat::Bgra8 | PixelFormat::RgbaF => 4,
        }
    }

    pub fn bits_per_pixel(self) -> u32 {
        match self {
            PixelFormat::Gray1 => 1,
            PixelFormat::Gray2 => 2,
            PixelFormat::Gray4 => 4,
            PixelFormat::Gray8 | PixelFormat::Rgb332 => 8,
            PixelFormat::GrayA8 | PixelFormat::Rgb565 | PixelFormat::Rgb565ByteSwapped => 16,
            PixelFormat::Rgb8 | PixelFormat::Bgr8 => 24,
            PixelFormat::Rgba8 | PixelFormat::Bgra8 => 32,
            PixelFormat::RgbaF => 128,
        }
    }

    /// Whole bytes per pixel; sub-byte formats report 1
    pub fn bytes_per_pixel(self) -> u32 {
        self.bits_per_pixel().div_ceil(8)
    }

    /// Formats storing fewer than eight bits per pixel
    pub fn is_sub_byte(self) -> bool {
        self.bits_per_pixel() < 8
    }

    pub fn has_alpha(self) -> bool {
        matches!(
            self,
            PixelFormat::GrayA8 | PixelFormat::Rgba8 | PixelFormat::Bgra8 | PixelFormat::RgbaF
        )
    }

    /// Minimal row stride in bytes, rounded up to whole bytes
    pub fn stride_for_width(self, width: u32) -> usize {
        (width as usize * self.bits_per_pixel() as usize).div_ceil(8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sub_byte_stride_rounds_up() {
        assert_eq!(PixelFormat::Gray1.stride_for_width(9), 2);
        assert_eq!(PixelFormat::Gray2.stride_for_width(5), 2);
        assert_eq!(PixelFormat::Gray4.stride_for_width(3), 2);
        assert_eq!(PixelFormat::Gray1.bytes_per_pixel(), 1);
    }

    #[test]
    fn test_format_geometry() {
        assert_eq!(PixelFormat::Rgb565.bytes_per_pixel(), 2);
        assert_eq!(PixelFormat::Rgb8.stride_for_width(10), 30);
        assert_eq!(PixelFormat::RgbaF.bytes_per_pixel(), 16);
        assert_eq!(PixelFormat::Rgb332.components(), 3);
        assert_eq!(PixelFormat::from_u32(32), Some(PixelFormat::Gray4));
    }
}
