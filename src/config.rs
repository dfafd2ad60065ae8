//! Configuration types and builders
//!
//! [`Builder`] produces the display [`Config`], including the full panel
//! init script so a different ST7789 panel only needs different values.
//! [`PipelineConfig`] and [`CaptureConfig`] hold the timing budgets and the
//! sensor settings used by the two pipeline loops.

pub use crate::error::{BuilderError, MAX_COLUMNS, MAX_ROWS};

/// Default transfer chunk size in bytes
pub const DEFAULT_TRANSFER_CHUNK: usize = 16_384;

/// Largest compressed frame the capture path accepts
pub const MAX_FRAME_SIZE: usize = 32_768;

/// Display dimensions in the controller's native (portrait) orientation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dimensions {
    /// Width in pixels (columns)
    pub width: u16,
    /// Height in pixels (rows)
    pub height: u16,
}

impl Dimensions {
    /// Create new dimensions with validation
    ///
    /// # Errors
    ///
    /// Returns `BuilderError::InvalidDimensions` if either side is zero or
    /// exceeds the controller's `MAX_COLUMNS` x `MAX_ROWS`.
    pub fn new(width: u16, height: u16) -> Result<Self, BuilderError> {
        if width == 0 || width > MAX_COLUMNS || height == 0 || height > MAX_ROWS {
            return Err(BuilderError::InvalidDimensions { width, height });
        }
        Ok(Self { width, height })
    }

    /// Size of a full-screen RGB565 buffer in bytes
    pub fn buffer_size(&self) -> usize {
        self.width as usize * self.height as usize * 2
    }
}

/// Display rotation relative to native orientation
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Rotation {
    /// No rotation
    #[default]
    Rotate0,
    /// Rotate 90 degrees clockwise
    Rotate90,
    /// Rotate 180 degrees
    Rotate180,
    /// Rotate 270 degrees clockwise
    Rotate270,
}

/// How the bus moves bulk data
///
/// Chosen at startup instead of at compile time, so one build can drive a
/// board with a DMA-capable SPI peripheral and one without.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TransferStrategy {
    /// Hand whole slices to the SPI peripheral (DMA-backed on most HALs)
    #[default]
    Bulk,
    /// Clock one byte per SPI write
    ByteWise,
}

/// Display configuration
///
/// Holds every value the ST7789 init script writes. Use [`Builder`] to create one.
#[derive(Clone, Debug)]
pub struct Config {
    /// Native panel dimensions
    pub dimensions: Dimensions,
    /// Display rotation
    pub rotation: Rotation,
    /// Column offset of the visible area inside controller RAM
    pub column_offset: u16,
    /// Row offset of the visible area inside controller RAM
    pub row_offset: u16,
    /// BGR subpixel order
    pub bgr: bool,
    /// Interface pixel format (COLMOD)
    pub color_mode: u8,
    /// Porch control (5 bytes for 0xB2)
    pub porch_control: [u8; 5],
    /// Gate control
    pub gate_control: u8,
    /// VCOM setting
    pub vcom: u8,
    /// LCM control
    pub lcm_control: u8,
    /// VDV/VRH command enable
    pub vdv_vrh_enable: u8,
    /// VRH set
    pub vrh: u8,
    /// VDV set
    pub vdv: u8,
    /// Frame rate control in normal mode
    pub frame_rate: u8,
    /// Power control 1 (2 bytes for 0xD0)
    pub power_control: [u8; 2],
    /// Gate output timing adjustment
    pub gate_timing: u8,
    /// Positive gamma table
    pub positive_gamma: [u8; 14],
    /// Negative gamma table
    pub negative_gamma: [u8; 14],
    /// Display inversion on (most IPS panels need it)
    pub inversion: bool,
    /// Settle time after sleep-out in milliseconds
    pub sleep_out_delay_ms: u32,
    /// Upper bound on bytes relayed per chunk
    pub transfer_chunk: usize,
    /// Bulk transfer strategy for the bus
    pub transfer_strategy: TransferStrategy,
}

impl Config {
    /// Get the logical dimensions after rotation
    pub fn rotated_dimensions(&self) -> Dimensions {
        match self.rotation {
            Rotation::Rotate0 | Rotation::Rotate180 => self.dimensions,
            Rotation::Rotate90 | Rotation::Rotate270 => Dimensions {
                width: self.dimensions.height,
                height: self.dimensions.width,
            },
        }
    }
}

/// Builder for constructing display configuration
///
/// # Example
///
/// ```rust
/// use camview::{Builder, Dimensions, Rotation};
///
/// let dims = match Dimensions::new(240, 320) {
///     Ok(dims) => dims,
///     Err(_) => return,
/// };
/// let config = match Builder::new().dimensions(dims).rotation(Rotation::Rotate90).build() {
///     Ok(config) => config,
///     Err(_) => return,
/// };
/// assert_eq!(config.rotated_dimensions().width, 320);
/// ```
#[must_use]
pub struct Builder {
    dimensions: Option<Dimensions>,
    rotation: Rotation,
    column_offset: u16,
    row_offset: u16,
    bgr: bool,
    color_mode: u8,
    porch_control: [u8; 5],
    gate_control: u8,
    vcom: u8,
    lcm_control: u8,
    vdv_vrh_enable: u8,
    vrh: u8,
    vdv: u8,
    frame_rate: u8,
    power_control: [u8; 2],
    gate_timing: u8,
    positive_gamma: [u8; 14],
    negative_gamma: [u8; 14],
    inversion: bool,
    sleep_out_delay_ms: u32,
    transfer_chunk: usize,
    transfer_strategy: TransferStrategy,
}

impl Default for Builder {
    fn default() -> Self {
        Self {
            dimensions: None,
            rotation: Rotation::Rotate0,
            column_offset: 0,
            row_offset: 0,
            bgr: false,
            color_mode: crate::command::COLMOD_RGB565,
            // Values below match the common 2" 240x320 IPS module
            porch_control: [0x0C, 0x0C, 0x00, 0x33, 0x33],
            gate_control: 0x35,
            vcom: 0x13,
            lcm_control: 0x2C,
            vdv_vrh_enable: 0x01,
            vrh: 0x0B,
            vdv: 0x20,
            // 60 Hz
            frame_rate: 0x0F,
            power_control: [0xA4, 0xA1],
            gate_timing: 0xA1,
            positive_gamma: [
                0x00, 0x03, 0x07, 0x08, 0x07, 0x15, 0x2A, 0x44, 0x42, 0x0A, 0x17, 0x18, 0x25, 0x27,
            ],
            negative_gamma: [
                0x00, 0x03, 0x08, 0x07, 0x07, 0x23, 0x2A, 0x43, 0x42, 0x09, 0x18, 0x17, 0x25, 0x27,
            ],
            inversion: true,
            sleep_out_delay_ms: 120,
            transfer_chunk: DEFAULT_TRANSFER_CHUNK,
            transfer_strategy: TransferStrategy::Bulk,
        }
    }
}

impl Builder {
    /// Create a new Builder with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set native panel dimensions (required)
    pub fn dimensions(mut self, dims: Dimensions) -> Self {
        self.dimensions = Some(dims);
        self
    }

    /// Set display rotation
    pub fn rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    /// Set the RAM offset of the visible area (native orientation)
    ///
    /// Panels narrower than 240 columns usually start partway into RAM.
    pub fn offset(mut self, column: u16, row: u16) -> Self {
        self.column_offset = column;
        self.row_offset = row;
        self
    }

    /// Use BGR subpixel order
    pub fn bgr(mut self, value: bool) -> Self {
        self.bgr = value;
        self
    }

    /// Set porch control parameters
    pub fn porch_control(mut self, values: [u8; 5]) -> Self {
        self.porch_control = values;
        self
    }

    /// Set gate control
    pub fn gate_control(mut self, value: u8) -> Self {
        self.gate_control = value;
        self
    }

    /// Set VCOM value
    pub fn vcom(mut self, value: u8) -> Self {
        self.vcom = value;
        self
    }

    /// Set LCM control
    pub fn lcm_control(mut self, value: u8) -> Self {
        self.lcm_control = value;
        self
    }

    /// Set VRH and VDV together with their enable byte
    pub fn voltages(mut self, enable: u8, vrh: u8, vdv: u8) -> Self {
        self.vdv_vrh_enable = enable;
        self.vrh = vrh;
        self.vdv = vdv;
        self
    }

    /// Set frame rate control
    pub fn frame_rate(mut self, value: u8) -> Self {
        self.frame_rate = value;
        self
    }

    /// Set power control 1 parameters
    pub fn power_control(mut self, values: [u8; 2]) -> Self {
        self.power_control = values;
        self
    }

    /// Set gate output timing adjustment
    pub fn gate_timing(mut self, value: u8) -> Self {
        self.gate_timing = value;
        self
    }

    /// Set positive and negative gamma tables
    pub fn gamma(mut self, positive: [u8; 14], negative: [u8; 14]) -> Self {
        self.positive_gamma = positive;
        self.negative_gamma = negative;
        self
    }

    /// Enable or disable display inversion
    pub fn inversion(mut self, value: bool) -> Self {
        self.inversion = value;
        self
    }

    /// Set the settle time after sleep-out
    pub fn sleep_out_delay_ms(mut self, value: u32) -> Self {
        self.sleep_out_delay_ms = value;
        self
    }

    /// Set the transfer chunk size in bytes
    pub fn transfer_chunk(mut self, value: usize) -> Self {
        self.transfer_chunk = value;
        self
    }

    /// Set the bulk transfer strategy
    pub fn transfer_strategy(mut self, value: TransferStrategy) -> Self {
        self.transfer_strategy = value;
        self
    }

    /// Build the configuration
    ///
    /// # Errors
    ///
    /// Returns `BuilderError::MissingDimensions` if dimensions were not set,
    /// `BuilderError::InvalidTransferChunk` if the chunk cannot hold a pixel,
    /// `BuilderError::InvalidOffset` if the offset pushes the visible area
    /// past controller RAM.
    pub fn build(self) -> Result<Config, BuilderError> {
        if self.transfer_chunk < 2 {
            return Err(BuilderError::InvalidTransferChunk(self.transfer_chunk));
        }
        let dimensions = self.dimensions.ok_or(BuilderError::MissingDimensions)?;
        if u32::from(dimensions.width) + u32::from(self.column_offset) > u32::from(MAX_COLUMNS)
            || u32::from(dimensions.height) + u32::from(self.row_offset) > u32::from(MAX_ROWS)
        {
            return Err(BuilderError::InvalidOffset {
                column: self.column_offset,
                row: self.row_offset,
            });
        }
        Ok(Config {
            dimensions,
            rotation: self.rotation,
            column_offset: self.column_offset,
            row_offset: self.row_offset,
            bgr: self.bgr,
            color_mode: self.color_mode,
            porch_control: self.porch_control,
            gate_control: self.gate_control,
            vcom: self.vcom,
            lcm_control: self.lcm_control,
            vdv_vrh_enable: self.vdv_vrh_enable,
            vrh: self.vrh,
            vdv: self.vdv,
            frame_rate: self.frame_rate,
            power_control: self.power_control,
            gate_timing: self.gate_timing,
            positive_gamma: self.positive_gamma,
            negative_gamma: self.negative_gamma,
            inversion: self.inversion,
            sleep_out_delay_ms: self.sleep_out_delay_ms,
            transfer_chunk: self.transfer_chunk,
            transfer_strategy: self.transfer_strategy,
        })
    }
}

/// Timing budgets for the two pipeline loops, all in milliseconds
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Longest wait for the capture-done flag
    pub capture_timeout_ms: u32,
    /// Interval between capture-done polls
    pub capture_poll_ms: u32,
    /// Yield at the end of every render iteration
    pub render_yield_ms: u32,
    /// Yield at the end of every request iteration
    pub request_yield_ms: u32,
    /// Countdown length in seconds
    pub countdown_seconds: u8,
    /// Indicator on/off half-period during the countdown
    pub countdown_blink_ms: u32,
    /// How long the "saved" overlay stays up
    pub status_display_ms: u32,
    /// How long the error overlay stays up
    pub error_display_ms: u32,
    /// How long the mode-toggle feedback stays up
    pub mode_feedback_ms: u32,
    /// How long the boot screen stays up
    pub boot_screen_ms: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            capture_timeout_ms: 1000,
            capture_poll_ms: 1,
            render_yield_ms: 10,
            request_yield_ms: 50,
            countdown_seconds: 3,
            countdown_blink_ms: 500,
            status_display_ms: 2000,
            error_display_ms: 1000,
            mode_feedback_ms: 300,
            boot_screen_ms: 1000,
        }
    }
}

impl PipelineConfig {
    /// Check the budgets that must be non-zero
    ///
    /// # Errors
    ///
    /// Returns `BuilderError::InvalidTiming` naming the first zero budget.
    pub fn validate(&self) -> Result<(), BuilderError> {
        if self.capture_timeout_ms == 0 {
            return Err(BuilderError::InvalidTiming("capture_timeout_ms"));
        }
        if self.capture_poll_ms == 0 {
            return Err(BuilderError::InvalidTiming("capture_poll_ms"));
        }
        if self.countdown_seconds == 0 {
            return Err(BuilderError::InvalidTiming("countdown_seconds"));
        }
        Ok(())
    }
}

/// Capture source settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaptureConfig {
    /// Largest frame accepted, capped by the frame buffer capacity
    pub max_frame_size: usize,
    /// Expected sensor chip ID `(high, low)`
    pub expected_id: (u8, u8),
    /// Sensor register writes applied after identification, in order
    ///
    /// Carry the sensor's JPEG output table and resolution here.
    pub sensor_init: &'static [(u8, u8)],
    /// Settle time after toggling the module reset register
    pub reset_delay_ms: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            max_frame_size: MAX_FRAME_SIZE,
            expected_id: (0x26, 0x42),
            sensor_init: &[],
            reset_delay_ms: 100,
        }
    }
}
