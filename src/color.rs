//! Color types for the TFT and the status indicator
//!
//! [`Color`] is a packed RGB565 value as the ST7789 expects it in
//! 16-bit-per-pixel mode (COLMOD 0x55). The controller reads pixels MSB
//! first, so every byte stream this crate produces is big-endian.
//!
//! ## Example
//!
//! ```
//! use camview::Color;
//!
//! assert_eq!(Color::RED.to_be_bytes(), [0xF8, 0x00]);
//! assert_eq!(Color::from_rgb888(255, 255, 255), Color::WHITE);
//! ```

/// Packed RGB565 color
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Color(pub u16);

impl Color {
    /// Black
    pub const BLACK: Self = Self(0x0000);
    /// White
    pub const WHITE: Self = Self(0xFFFF);
    /// Red
    pub const RED: Self = Self(0xF800);
    /// Green
    pub const GREEN: Self = Self(0x07E0);
    /// Blue
    pub const BLUE: Self = Self(0x001F);
    /// Yellow
    pub const YELLOW: Self = Self(0xFFE0);
    /// Cyan
    pub const CYAN: Self = Self(0x7FFF);
    /// Magenta
    pub const MAGENTA: Self = Self(0xF81F);
    /// Dark blue used behind the countdown digit
    pub const NAVY: Self = Self(0x0010);
    /// Teal used for the boot screen background
    pub const TEAL: Self = Self(0x0318);

    /// Pack 8-bit channels into RGB565, dropping the low bits
    pub const fn from_rgb888(r: u8, g: u8, b: u8) -> Self {
        Self(((r as u16 & 0xF8) << 8) | ((g as u16 & 0xFC) << 3) | (b as u16 >> 3))
    }

    /// Raw 16-bit value
    pub const fn raw(self) -> u16 {
        self.0
    }

    /// Wire representation, high byte first
    pub const fn to_be_bytes(self) -> [u8; 2] {
        self.0.to_be_bytes()
    }
}

impl From<u16> for Color {
    fn from(raw: u16) -> Self {
        Self(raw)
    }
}

#[cfg(feature = "graphics")]
impl From<embedded_graphics_core::pixelcolor::Rgb565> for Color {
    fn from(color: embedded_graphics_core::pixelcolor::Rgb565) -> Self {
        use embedded_graphics_core::pixelcolor::IntoStorage;
        Self(color.into_storage())
    }
}

#[cfg(feature = "graphics")]
impl From<Color> for embedded_graphics_core::pixelcolor::Rgb565 {
    fn from(color: Color) -> Self {
        use embedded_graphics_core::pixelcolor::raw::RawU16;
        Self::from(RawU16::new(color.0))
    }
}

/// Colors the RGB status LED can show
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum IndicatorColor {
    /// All channels off
    Off,
    /// Red
    Red,
    /// Green
    Green,
    /// Blue
    Blue,
    /// Red + green
    Yellow,
    /// Green + blue
    Cyan,
    /// Red + blue
    Magenta,
    /// All channels on
    White,
}

impl IndicatorColor {
    /// Channel states as `(red, green, blue)`
    pub const fn channels(self) -> (bool, bool, bool) {
        match self {
            Self::Off => (false, false, false),
            Self::Red => (true, false, false),
            Self::Green => (false, true, false),
            Self::Blue => (false, false, true),
            Self::Yellow => (true, true, false),
            Self::Cyan => (false, true, true),
            Self::Magenta => (true, false, true),
            Self::White => (true, true, true),
        }
    }
}
