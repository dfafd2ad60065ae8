//! Camera module register access
//!
//! The camera module pairs a capture controller (ArduChip) reached over SPI
//! with an image sensor (OV2640) reached over I2C. The controller buffers
//! one compressed frame in its FIFO; the sensor is only configured.
//!
//! [`SensorInterface`] is the seam the capture source is written against;
//! [`ArduChip`] implements it for embedded-hal 1.0 `SpiDevice` + `I2c`.

use core::fmt::Debug;
use embedded_hal::i2c::I2c;
use embedded_hal::spi::{Operation, SpiDevice};

/// Controller register map
pub mod reg {
    /// FIFO control
    pub const FIFO_CONTROL: u8 = 0x04;
    /// Module reset control
    pub const RESET: u8 = 0x07;
    /// Status / trigger
    pub const TRIGGER: u8 = 0x41;
    /// FIFO length, bits 0..8
    pub const FIFO_SIZE_LOW: u8 = 0x42;
    /// FIFO length, bits 8..16
    pub const FIFO_SIZE_MID: u8 = 0x43;
    /// FIFO length, bits 16..23
    pub const FIFO_SIZE_HIGH: u8 = 0x44;
    /// Burst FIFO read command
    pub const BURST_FIFO_READ: u8 = 0x3C;

    /// Clear the capture-done flag
    pub const FIFO_CLEAR: u8 = 0x01;
    /// Start a capture
    pub const FIFO_START: u8 = 0x02;
    /// Capture-done bit in [`TRIGGER`]
    pub const CAPTURE_DONE: u8 = 0x08;
    /// Assert module reset
    pub const RESET_ASSERT: u8 = 0x80;
    /// Release module reset
    pub const RESET_RELEASE: u8 = 0x00;
    /// Write flag OR-ed into the register address
    pub const WRITE_FLAG: u8 = 0x80;
}

/// Sensor (I2C side) register map
pub mod sensor_reg {
    /// 7-bit I2C address of the OV2640
    pub const ADDRESS: u8 = 0x30;
    /// Register bank select
    pub const BANK_SELECT: u8 = 0xFF;
    /// Sensor register bank
    pub const BANK_SENSOR: u8 = 0x01;
    /// Chip ID high byte
    pub const CHIP_ID_HIGH: u8 = 0x0A;
    /// Chip ID low byte
    pub const CHIP_ID_LOW: u8 = 0x0B;
}

/// Register-level access to a camera module
pub trait SensorInterface {
    /// Error type for register operations
    type Error: Debug;

    /// Write a capture controller register
    fn write_reg(&mut self, register: u8, value: u8) -> Result<(), Self::Error>;

    /// Read a capture controller register
    fn read_reg(&mut self, register: u8) -> Result<u8, Self::Error>;

    /// Write an image sensor register
    fn write_sensor_reg(&mut self, register: u8, value: u8) -> Result<(), Self::Error>;

    /// Read an image sensor register
    fn read_sensor_reg(&mut self, register: u8) -> Result<u8, Self::Error>;

    /// Burst-read `buf.len()` bytes out of the frame FIFO
    fn read_fifo(&mut self, buf: &mut [u8]) -> Result<(), Self::Error>;
}

/// Errors from the SPI or I2C side of the module
#[derive(Debug, PartialEq)]
pub enum SensorError<SpiErr, I2cErr> {
    /// SPI error talking to the capture controller
    Spi(SpiErr),
    /// I2C error talking to the image sensor
    I2c(I2cErr),
}

impl<SpiErr: Debug, I2cErr: Debug> core::fmt::Display for SensorError<SpiErr, I2cErr> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Spi(e) => write!(f, "SPI error: {e:?}"),
            Self::I2c(e) => write!(f, "I2C error: {e:?}"),
        }
    }
}

impl<SpiErr: Debug, I2cErr: Debug> core::error::Error for SensorError<SpiErr, I2cErr> {}

/// ArduChip capture controller with an I2C-attached sensor
pub struct ArduChip<SPI, I2C> {
    spi: SPI,
    i2c: I2C,
    address: u8,
}

impl<SPI, I2C> ArduChip<SPI, I2C>
where
    SPI: SpiDevice,
    I2C: I2c,
{
    /// Create the interface at the default sensor address
    pub fn new(spi: SPI, i2c: I2C) -> Self {
        Self {
            spi,
            i2c,
            address: sensor_reg::ADDRESS,
        }
    }

    /// Use a non-default sensor I2C address
    pub fn with_address(mut self, address: u8) -> Self {
        self.address = address;
        self
    }

    /// Release the buses
    pub fn release(self) -> (SPI, I2C) {
        (self.spi, self.i2c)
    }
}

impl<SPI, I2C> SensorInterface for ArduChip<SPI, I2C>
where
    SPI: SpiDevice,
    I2C: I2c,
{
    type Error = SensorError<SPI::Error, I2C::Error>;

    fn write_reg(&mut self, register: u8, value: u8) -> Result<(), Self::Error> {
        self.spi
            .write(&[register | reg::WRITE_FLAG, value])
            .map_err(SensorError::Spi)
    }

    fn read_reg(&mut self, register: u8) -> Result<u8, Self::Error> {
        let mut value = [0u8];
        self.spi
            .transaction(&mut [
                Operation::Write(&[register & !reg::WRITE_FLAG]),
                Operation::Read(&mut value),
            ])
            .map_err(SensorError::Spi)?;
        Ok(value[0])
    }

    fn write_sensor_reg(&mut self, register: u8, value: u8) -> Result<(), Self::Error> {
        self.i2c
            .write(self.address, &[register, value])
            .map_err(SensorError::I2c)
    }

    fn read_sensor_reg(&mut self, register: u8) -> Result<u8, Self::Error> {
        let mut value = [0u8];
        self.i2c
            .write_read(self.address, &[register], &mut value)
            .map_err(SensorError::I2c)?;
        Ok(value[0])
    }

    fn read_fifo(&mut self, buf: &mut [u8]) -> Result<(), Self::Error> {
        if buf.is_empty() {
            return Ok(());
        }
        self.spi
            .transaction(&mut [
                Operation::Write(&[reg::BURST_FIFO_READ]),
                Operation::Read(buf),
            ])
            .map_err(SensorError::Spi)
    }
}
