//! ST7789 command definitions
//!
//! Command bytes for the ST7789 TFT controller. Commands are sent with the
//! DC pin low, parameters with DC high.
//!
//! ## Command Structure
//!
//! 1. Assert CS
//! 2. DC low, send command byte
//! 3. DC high, send parameter bytes (if any)
//! 4. Deassert CS
//!
//! Pixel data after [`RAMWR`] is the exception: it is streamed inside one
//! bulk session with CS held for the whole window.

// System control

/// Sleep out (0x11)
///
/// The controller needs 120 ms before the next command.
pub const SLPOUT: u8 = 0x11;

/// Display inversion on (0x21)
pub const INVON: u8 = 0x21;

/// Display inversion off (0x20)
pub const INVOFF: u8 = 0x20;

/// Display on (0x29)
pub const DISPON: u8 = 0x29;

// Addressing

/// Column address set (0x2A)
///
/// Parameters: `[x0 >> 8, x0 & 0xFF, x1 >> 8, x1 & 0xFF]`, inclusive.
pub const CASET: u8 = 0x2A;

/// Row address set (0x2B)
///
/// Parameters: `[y0 >> 8, y0 & 0xFF, y1 >> 8, y1 & 0xFF]`, inclusive.
pub const RASET: u8 = 0x2B;

/// Memory write (0x2C)
///
/// Every following data byte lands in the current window, row-major.
pub const RAMWR: u8 = 0x2C;

/// Memory data access control (0x36)
pub const MADCTL: u8 = 0x36;

/// Interface pixel format (0x3A)
pub const COLMOD: u8 = 0x3A;

// Panel tuning

/// Porch setting (0xB2)
pub const PORCTRL: u8 = 0xB2;

/// Gate control (0xB7)
pub const GCTRL: u8 = 0xB7;

/// VCOM setting (0xBB)
pub const VCOMS: u8 = 0xBB;

/// LCM control (0xC0)
pub const LCMCTRL: u8 = 0xC0;

/// VDV and VRH command enable (0xC2)
pub const VDVVRHEN: u8 = 0xC2;

/// VRH set (0xC3)
pub const VRHS: u8 = 0xC3;

/// VDV set (0xC4)
pub const VDVS: u8 = 0xC4;

/// Frame rate control in normal mode (0xC6)
pub const FRCTRL2: u8 = 0xC6;

/// Power control 1 (0xD0)
pub const PWCTRL1: u8 = 0xD0;

/// Gate output timing adjustment (0xD6)
pub const GATE_TIMING: u8 = 0xD6;

/// Positive voltage gamma control (0xE0)
pub const PVGAMCTRL: u8 = 0xE0;

/// Negative voltage gamma control (0xE1)
pub const NVGAMCTRL: u8 = 0xE1;

// MADCTL bits

/// Row address order
pub const MADCTL_MY: u8 = 0x80;
/// Column address order
pub const MADCTL_MX: u8 = 0x40;
/// Row/column exchange
pub const MADCTL_MV: u8 = 0x20;
/// BGR subpixel order
pub const MADCTL_BGR: u8 = 0x08;

/// 16 bits per pixel, 65K colors
pub const COLMOD_RGB565: u8 = 0x55;
