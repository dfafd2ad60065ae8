//! Display bus transport
//!
//! This module provides the [`BusTransport`] trait and the [`SpiInterface`]
//! struct for talking to the ST7789 over a 4-wire SPI link.
//!
//! ## Hardware Requirements
//!
//! - SPI bus (MOSI + SCK), owned exclusively
//! - 3 GPIO outputs:
//!   - **CS**: chip select (active low)
//!   - **DC**: data/command select
//!   - **RST**: reset (active low)
//!
//! CS is driven by this module rather than by a `SpiDevice` because a bulk
//! session keeps it asserted across many writes.
//!
//! ## Bulk sessions
//!
//! A bulk session is a single long transaction: [`BusTransport::begin_bulk_session`]
//! asserts CS with DC in data mode, any number of
//! [`BusTransport::write_bulk_session_data`] calls stream bytes, and
//! [`BusTransport::end_bulk_session`] waits for the last byte and releases CS.
//! Session data outside a session is dropped with a warning, and ending a
//! session that is not open does nothing.

use core::fmt::Debug;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiBus;
use log::warn;

use crate::config::TransferStrategy;

type InterfaceResult<T, E> = core::result::Result<T, E>;

/// Transport between the display driver and the controller
///
/// Implement this on your own type if your board moves bytes differently
/// (e.g. a parallel 8080 bus); [`SpiInterface`] covers the common case.
pub trait BusTransport {
    /// Error type for transport operations
    type Error: Debug;

    /// Send one command byte (DC low) as its own transaction
    fn write_command(&mut self, command: u8) -> InterfaceResult<(), Self::Error>;

    /// Send one parameter byte (DC high) as its own transaction
    fn write_byte(&mut self, byte: u8) -> InterfaceResult<(), Self::Error>;

    /// Send a block of data bytes as one transaction
    ///
    /// An empty slice sends nothing.
    fn write_bulk(&mut self, data: &[u8]) -> InterfaceResult<(), Self::Error>;

    /// Open a bulk session: assert CS, select data mode
    ///
    /// Beginning while a session is already open leaves it open.
    fn begin_bulk_session(&mut self) -> InterfaceResult<(), Self::Error>;

    /// Stream bytes inside the open session
    ///
    /// Without an open session this must not touch the bus.
    fn write_bulk_session_data(&mut self, data: &[u8]) -> InterfaceResult<(), Self::Error>;

    /// Wait for outstanding bytes and release CS
    ///
    /// Idempotent: CS is released at most once per session.
    fn end_bulk_session(&mut self) -> InterfaceResult<(), Self::Error>;

    /// Whether a bulk session is open
    fn is_bulk_active(&self) -> bool;

    /// Hardware reset of the controller
    fn reset<D: DelayNs>(&mut self, delay: &mut D);

    /// Select how bulk data moves across the bus
    ///
    /// Transports with a single mechanism ignore this.
    fn set_transfer_strategy(&mut self, _strategy: TransferStrategy) {}
}

/// Errors that can occur at the bus level
///
/// Generic over SPI and GPIO error types.
#[derive(Debug, PartialEq)]
pub enum InterfaceError<SpiErr, PinErr> {
    /// SPI communication error
    Spi(SpiErr),
    /// GPIO pin error
    Pin(PinErr),
    /// A framed write was attempted while a bulk session held the bus
    SessionActive,
}

impl<SpiErr: Debug, PinErr: Debug> core::fmt::Display for InterfaceError<SpiErr, PinErr> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Spi(e) => write!(f, "SPI error: {e:?}"),
            Self::Pin(e) => write!(f, "Pin error: {e:?}"),
            Self::SessionActive => write!(f, "Bus busy with a bulk session"),
        }
    }
}

impl<SpiErr: Debug, PinErr: Debug> core::error::Error for InterfaceError<SpiErr, PinErr> {}

/// SPI + GPIO implementation of [`BusTransport`]
///
/// ## Type Parameters
///
/// * `SPI` - exclusive SPI bus implementing [`SpiBus`]
/// * `CS` - chip select pin implementing [`OutputPin`]
/// * `DC` - data/command pin implementing [`OutputPin`]
/// * `RST` - reset pin implementing [`OutputPin`]
pub struct SpiInterface<SPI, CS, DC, RST> {
    spi: SPI,
    cs: CS,
    dc: DC,
    rst: RST,
    strategy: TransferStrategy,
    /// Bulk session open
    active: bool,
}

impl<SPI, CS, DC, RST, PinErr> SpiInterface<SPI, CS, DC, RST>
where
    SPI: SpiBus,
    CS: OutputPin<Error = PinErr>,
    DC: OutputPin<Error = PinErr>,
    RST: OutputPin<Error = PinErr>,
{
    /// Create a new interface using [`TransferStrategy::Bulk`]
    pub fn new(spi: SPI, cs: CS, dc: DC, rst: RST) -> Self {
        Self {
            spi,
            cs,
            dc,
            rst,
            strategy: TransferStrategy::Bulk,
            active: false,
        }
    }

    /// Current transfer strategy
    pub fn transfer_strategy(&self) -> TransferStrategy {
        self.strategy
    }

    /// Release the bus and pins
    pub fn release(self) -> (SPI, CS, DC, RST) {
        (self.spi, self.cs, self.dc, self.rst)
    }

    fn send(&mut self, data: &[u8]) -> InterfaceResult<(), InterfaceError<SPI::Error, PinErr>> {
        match self.strategy {
            TransferStrategy::Bulk => self.spi.write(data).map_err(InterfaceError::Spi),
            TransferStrategy::ByteWise => {
                for byte in data {
                    self.spi
                        .write(core::slice::from_ref(byte))
                        .map_err(InterfaceError::Spi)?;
                }
                Ok(())
            }
        }
    }

    /// One CS-framed transaction with DC at the given level
    fn framed(
        &mut self,
        data_mode: bool,
        data: &[u8],
    ) -> InterfaceResult<(), InterfaceError<SPI::Error, PinErr>> {
        if self.active {
            warn!("framed write refused while a bulk session is open");
            return Err(InterfaceError::SessionActive);
        }
        if data_mode {
            self.dc.set_high().map_err(InterfaceError::Pin)?;
        } else {
            self.dc.set_low().map_err(InterfaceError::Pin)?;
        }
        self.cs.set_low().map_err(InterfaceError::Pin)?;
        let sent = self
            .send(data)
            .and_then(|()| self.spi.flush().map_err(InterfaceError::Spi));
        let released = self.cs.set_high().map_err(InterfaceError::Pin);
        sent.and(released)
    }
}

impl<SPI, CS, DC, RST, PinErr> BusTransport for SpiInterface<SPI, CS, DC, RST>
where
    SPI: SpiBus,
    SPI::Error: Debug,
    CS: OutputPin<Error = PinErr>,
    DC: OutputPin<Error = PinErr>,
    RST: OutputPin<Error = PinErr>,
    PinErr: Debug,
{
    type Error = InterfaceError<SPI::Error, PinErr>;

    fn write_command(&mut self, command: u8) -> InterfaceResult<(), Self::Error> {
        self.framed(false, &[command])
    }

    fn write_byte(&mut self, byte: u8) -> InterfaceResult<(), Self::Error> {
        self.framed(true, &[byte])
    }

    fn write_bulk(&mut self, data: &[u8]) -> InterfaceResult<(), Self::Error> {
        if data.is_empty() {
            return Ok(());
        }
        self.framed(true, data)
    }

    fn begin_bulk_session(&mut self) -> InterfaceResult<(), Self::Error> {
        if self.active {
            warn!("bulk session already open");
            return Ok(());
        }
        self.dc.set_high().map_err(InterfaceError::Pin)?;
        self.cs.set_low().map_err(InterfaceError::Pin)?;
        self.active = true;
        Ok(())
    }

    fn write_bulk_session_data(&mut self, data: &[u8]) -> InterfaceResult<(), Self::Error> {
        if !self.active {
            warn!("{} bytes of session data dropped: no open session", data.len());
            return Ok(());
        }
        if data.is_empty() {
            return Ok(());
        }
        self.send(data)
    }

    fn end_bulk_session(&mut self) -> InterfaceResult<(), Self::Error> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        let flushed = self.spi.flush().map_err(InterfaceError::Spi);
        let released = self.cs.set_high().map_err(InterfaceError::Pin);
        flushed.and(released)
    }

    fn is_bulk_active(&self) -> bool {
        self.active
    }

    fn reset<D: DelayNs>(&mut self, delay: &mut D) {
        // Idle levels first, then RST low 120 ms -> high, settle 150 ms
        let _ = self.cs.set_high();
        let _ = self.dc.set_low();
        delay.delay_ms(10);
        let _ = self.rst.set_low();
        delay.delay_ms(120);
        let _ = self.rst.set_high();
        delay.delay_ms(150);
    }

    fn set_transfer_strategy(&mut self, strategy: TransferStrategy) {
        self.strategy = strategy;
    }
}
