//! Camera preview and still-capture pipeline
//!
//! Drives an ArduCAM-style SPI camera module and an ST7789 TFT from one
//! microcontroller: a render loop streams live preview frames to the panel
//! while a request loop turns button or network requests into photos on
//! storage.
//!
//! ## Features
//!
//! - `no_std` compatible
//! - `embedded-hal` v1.0 support
//! - Chunked bulk transfers with a held chip-select session
//! - Byte-exact address windows (pixel data is checked before the bus is touched)
//! - Bounded capture timeouts against an explicit deadline
//! - Lock-free request flags and status for interrupt handlers
//! - `embedded-graphics` integration and text overlays (with `graphics` feature)
//! - JPEG decoding via the `image` crate (with `jpeg` feature)
//!
//! ## Usage
//!
//! ```rust,no_run
//! use core::convert::Infallible;
//! use embedded_hal::delay::DelayNs;
//! use embedded_hal::digital::OutputPin;
//! use embedded_hal::spi::SpiBus;
//! use camview::{Builder, Color, Dimensions, Display, Rotation, SpiInterface};
//!
//! # struct MockSpi;
//! # impl embedded_hal::spi::ErrorType for MockSpi { type Error = Infallible; }
//! # impl SpiBus for MockSpi {
//! #     fn read(&mut self, _: &mut [u8]) -> Result<(), Self::Error> { Ok(()) }
//! #     fn write(&mut self, _: &[u8]) -> Result<(), Self::Error> { Ok(()) }
//! #     fn transfer(&mut self, _: &mut [u8], _: &[u8]) -> Result<(), Self::Error> { Ok(()) }
//! #     fn transfer_in_place(&mut self, _: &mut [u8]) -> Result<(), Self::Error> { Ok(()) }
//! #     fn flush(&mut self) -> Result<(), Self::Error> { Ok(()) }
//! # }
//! # struct MockPin;
//! # impl embedded_hal::digital::ErrorType for MockPin { type Error = Infallible; }
//! # impl OutputPin for MockPin {
//! #     fn set_low(&mut self) -> Result<(), Self::Error> { Ok(()) }
//! #     fn set_high(&mut self) -> Result<(), Self::Error> { Ok(()) }
//! # }
//! # struct MockDelay;
//! # impl DelayNs for MockDelay { fn delay_ns(&mut self, _ns: u32) {} }
//! # let (spi, cs, dc, rst) = (MockSpi, MockPin, MockPin, MockPin);
//! # let mut delay = MockDelay;
//! let interface = SpiInterface::new(spi, cs, dc, rst);
//! let dims = match Dimensions::new(240, 320) {
//!     Ok(dims) => dims,
//!     Err(_) => return,
//! };
//! let config = match Builder::new().dimensions(dims).rotation(Rotation::Rotate90).build() {
//!     Ok(config) => config,
//!     Err(_) => return,
//! };
//!
//! let mut display = Display::new(interface, config, [0u8; 4096]);
//! if display.initialize(&mut delay).is_ok() {
//!     let _ = display.clear(Color::BLACK);
//! }
//! ```

#![no_std]

#[cfg(any(test, feature = "alloc"))]
extern crate alloc;

#[cfg(any(test, feature = "std"))]
extern crate std;

/// Compressed frame capture
pub mod capture;
/// RGB565 and indicator colors
pub mod color;
/// ST7789 command definitions
pub mod command;
/// Display, pipeline and capture configuration
pub mod config;
/// Compressed frame decoding
pub mod decoder;
/// Core display operations
pub mod display;
/// Error types
pub mod error;
/// Status indicator
pub mod indicator;
/// Display bus transport
pub mod interface;
/// Overlay mailbox between the loops
pub mod overlay;
/// Render and request loops
pub mod pipeline;
/// Request flags and status surface
pub mod request;
/// Rotation to controller register mapping
pub mod rotation;
/// Camera module register access
pub mod sensor;
/// Photo storage
pub mod storage;

/// Graphics support via embedded-graphics (requires `graphics` feature)
#[cfg(feature = "graphics")]
pub mod graphics;

pub use capture::{CaptureSource, Clock, CompressedFrame, SensorState};
pub use color::{Color, IndicatorColor};
pub use config::{
    Builder, CaptureConfig, Config, DEFAULT_TRANSFER_CHUNK, Dimensions, MAX_FRAME_SIZE,
    PipelineConfig, Rotation, TransferStrategy,
};
pub use decoder::{Block, FrameDecoder, PixelBuffer, decode};
pub use display::{AddressWindow, Backlight, Display};
pub use error::{
    BuilderError, CaptureError, DecodeError, Error, MAX_COLUMNS, MAX_ROWS, SaveError, SizeError,
};
pub use indicator::{Indicator, NoIndicator, RgbLed};
pub use interface::{BusTransport, InterfaceError, SpiInterface};
pub use overlay::{NoOverlay, Overlay, OverlayRenderer, OverlaySlot};
pub use pipeline::{Outcome, RenderLoop, RenderOutcome, RequestLoop, SharedCamera, Step};
pub use request::{
    CaptureMode, DEBOUNCE_MS, Debounce, RequestFlags, RequestSurface, StatusSnapshot,
    SystemStatus,
};
pub use sensor::{ArduChip, SensorError, SensorInterface};
pub use storage::{PhotoName, PhotoStore, Storage};

#[cfg(feature = "graphics")]
pub use graphics::TextOverlay;

#[cfg(feature = "jpeg")]
pub use decoder::jpeg::JpegDecoder;
