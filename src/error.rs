//! Error types for the pipeline
//!
//! Every component reports failure through its own enum so callers can tell
//! a recoverable per-frame failure from a component that is gone for good.
//!
//! ## Error Types
//!
//! - [`BuilderError`] - Errors during configuration construction
//! - [`Error`] - Runtime errors from the display controller
//! - [`CaptureError`] - Capture source failures (timeouts, bad frames, identity)
//! - [`DecodeError`] - Frame decoder failures
//! - [`SaveError`] - Photo store failures
//! - [`InterfaceError`](crate::interface::InterfaceError) - Low-level display link errors
//!
//! ## Example
//!
//! ```
//! use camview::{Builder, BuilderError, Dimensions};
//!
//! // Missing dimensions
//! let result = Builder::new().build();
//! assert!(matches!(result, Err(BuilderError::MissingDimensions)));
//!
//! // Larger than the controller can address
//! let result = Dimensions::new(480, 320);
//! assert!(result.is_err());
//! ```

use core::fmt::Debug;

use crate::interface::BusTransport;

/// Maximum columns addressable by the ST7789 controller
pub const MAX_COLUMNS: u16 = 240;

/// Maximum rows addressable by the ST7789 controller
pub const MAX_ROWS: u16 = 320;

/// Errors that can occur when driving the display controller
///
/// Generic over the bus transport to preserve the underlying hardware error.
#[derive(Debug)]
pub enum Error<B: BusTransport> {
    /// Bus transport error (SPI/GPIO)
    Bus(B::Error),
    /// Address window outside the addressable region or inverted
    InvalidWindow {
        /// First column
        x0: u16,
        /// First row
        y0: u16,
        /// Last column (inclusive)
        x1: u16,
        /// Last row (inclusive)
        y1: u16,
    },
    /// Pixel buffer length does not equal `window area * 2`
    ///
    /// Checked before any byte is sent so the controller never sees a
    /// partial window.
    ByteCountMismatch {
        /// Bytes the window consumes
        expected: usize,
        /// Bytes supplied
        provided: usize,
    },
    /// Transfer chunk cannot hold a single pixel
    ChunkTooSmall {
        /// Chunk length in bytes
        provided: usize,
    },
    /// Controller failed to initialize and is unavailable
    Unavailable,
}

impl<B: BusTransport> core::fmt::Display for Error<B> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Bus(e) => write!(f, "Bus error: {e:?}"),
            Self::InvalidWindow { x0, y0, x1, y1 } => {
                write!(f, "Invalid address window: ({x0},{y0})..=({x1},{y1})")
            }
            Self::ByteCountMismatch { expected, provided } => write!(
                f,
                "Pixel byte count mismatch: window needs {expected} bytes, got {provided}"
            ),
            Self::ChunkTooSmall { provided } => {
                write!(f, "Transfer chunk too small: {provided} bytes")
            }
            Self::Unavailable => write!(f, "Display unavailable"),
        }
    }
}

impl<B: BusTransport + Debug> core::error::Error for Error<B> {}

/// Errors that can occur when building configuration
#[derive(Debug, PartialEq)]
pub enum BuilderError {
    /// Dimensions were not specified
    ///
    /// [`Builder::dimensions()`](crate::config::Builder::dimensions) must be called before building.
    MissingDimensions,
    /// Invalid dimensions provided
    ///
    /// See [`Dimensions::new()`](crate::config::Dimensions::new) for constraints.
    InvalidDimensions {
        /// Width in pixels
        width: u16,
        /// Height in pixels
        height: u16,
    },
    /// Transfer chunk must hold at least one pixel
    InvalidTransferChunk(usize),
    /// A timing budget that must be non-zero was zero
    InvalidTiming(&'static str),
    /// Visible area plus RAM offset runs past controller RAM
    InvalidOffset {
        /// Column offset
        column: u16,
        /// Row offset
        row: u16,
    },
}

impl core::fmt::Display for BuilderError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::MissingDimensions => write!(f, "Dimensions must be specified"),
            Self::InvalidDimensions { width, height } => write!(
                f,
                "Invalid dimensions {width}x{height} (max {MAX_COLUMNS}x{MAX_ROWS})"
            ),
            Self::InvalidTransferChunk(len) => {
                write!(f, "Invalid transfer chunk of {len} bytes (minimum 2)")
            }
            Self::InvalidTiming(name) => write!(f, "Timing `{name}` must be non-zero"),
            Self::InvalidOffset { column, row } => write!(
                f,
                "Offset ({column}, {row}) moves the visible area past {MAX_COLUMNS}x{MAX_ROWS} RAM"
            ),
        }
    }
}

impl core::error::Error for BuilderError {}

/// Errors reported by the capture source
#[derive(Debug, PartialEq)]
pub enum CaptureError<E> {
    /// Sensor failed initialization and will not capture
    Unavailable,
    /// Sensor answered with an unexpected chip identity
    IdentityMismatch {
        /// Chip ID high byte read back
        vid: u8,
        /// Chip ID low byte read back
        pid: u8,
    },
    /// Capture-done flag not observed before the deadline
    Timeout,
    /// Reported frame length was zero or larger than the frame buffer
    InvalidLength(u32),
    /// Sensor interface error
    Interface(E),
}

impl<E: Debug> core::fmt::Display for CaptureError<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Unavailable => write!(f, "Camera unavailable"),
            Self::IdentityMismatch { vid, pid } => {
                write!(f, "Unexpected sensor identity {vid:#04x}:{pid:#04x}")
            }
            Self::Timeout => write!(f, "Capture timed out"),
            Self::InvalidLength(len) => write!(f, "Invalid frame length {len}"),
            Self::Interface(e) => write!(f, "Sensor interface error: {e:?}"),
        }
    }
}

impl<E: Debug> core::error::Error for CaptureError<E> {}

impl<E> From<E> for CaptureError<E> {
    fn from(e: E) -> Self {
        Self::Interface(e)
    }
}

/// Errors reported by the frame decoder
#[derive(Debug, PartialEq)]
pub enum DecodeError<E> {
    /// Frame holds no data
    EmptyFrame,
    /// Decoder backend rejected the data
    Backend(E),
}

impl<E: Debug> core::fmt::Display for DecodeError<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::EmptyFrame => write!(f, "Empty frame"),
            Self::Backend(e) => write!(f, "Decoder error: {e:?}"),
        }
    }
}

impl<E: Debug> core::error::Error for DecodeError<E> {}

/// Errors reported by the photo store
#[derive(Debug, PartialEq)]
pub enum SaveError<E> {
    /// Storage medium missing or failed to mount
    Unavailable,
    /// Nothing to write
    EmptyPayload,
    /// Storage accepted fewer bytes than were sent
    ShortWrite {
        /// Bytes written
        written: usize,
        /// Bytes sent
        expected: usize,
    },
    /// Generated file name did not fit
    NameOverflow,
    /// Storage backend error
    Storage(E),
}

impl<E: Debug> core::fmt::Display for SaveError<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Unavailable => write!(f, "Storage unavailable"),
            Self::EmptyPayload => write!(f, "Nothing to save"),
            Self::ShortWrite { written, expected } => {
                write!(f, "Short write: {written} of {expected} bytes")
            }
            Self::NameOverflow => write!(f, "File name too long"),
            Self::Storage(e) => write!(f, "Storage error: {e:?}"),
        }
    }
}

impl<E: Debug> core::error::Error for SaveError<E> {}

/// Supplied buffer has the wrong size for its role
#[derive(Debug, PartialEq)]
pub struct SizeError {
    /// Required size in bytes
    pub required: usize,
    /// Provided size in bytes
    pub provided: usize,
}

impl core::fmt::Display for SizeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "Buffer size mismatch: required {} bytes, provided {}",
            self.required, self.provided
        )
    }
}

impl core::error::Error for SizeError {}
