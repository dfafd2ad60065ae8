//! Capture source
//!
//! [`CaptureSource`] owns the camera module and turns one request into one
//! compressed frame: clear the FIFO flag, start, poll the capture-done bit
//! against an explicit deadline, read the FIFO length, burst the frame out.
//!
//! A frame is only valid when [`CaptureSource::capture_frame`] returns `Ok`;
//! on every failure path the [`CompressedFrame`] is left empty.

use embedded_hal::delay::DelayNs;
use log::{debug, error, info, warn};

use crate::config::{CaptureConfig, MAX_FRAME_SIZE};
use crate::error::{CaptureError, SizeError};
use crate::sensor::{SensorInterface, reg, sensor_reg};

type CaptureResult<T, E> = core::result::Result<T, CaptureError<E>>;

/// Monotonic millisecond time source
pub trait Clock {
    /// Milliseconds since an arbitrary fixed point
    fn now_ms(&self) -> u64;
}

/// Fixed-capacity buffer holding one compressed frame
pub struct CompressedFrame<const N: usize = MAX_FRAME_SIZE> {
    data: [u8; N],
    len: usize,
}

impl<const N: usize> CompressedFrame<N> {
    /// Empty frame
    pub const fn new() -> Self {
        Self {
            data: [0; N],
            len: 0,
        }
    }

    /// Valid bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Number of valid bytes
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the frame holds nothing
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Capacity in bytes
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Replace the contents with `bytes`
    pub fn load(&mut self, bytes: &[u8]) -> Result<(), SizeError> {
        if bytes.len() > N {
            return Err(SizeError {
                required: bytes.len(),
                provided: N,
            });
        }
        self.data[..bytes.len()].copy_from_slice(bytes);
        self.len = bytes.len();
        Ok(())
    }

    /// Mark the frame empty
    pub fn invalidate(&mut self) {
        self.len = 0;
    }
}

impl<const N: usize> Default for CompressedFrame<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Lifecycle of the camera module
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SensorState {
    /// `initialize` not yet run
    Uninitialized,
    /// Identified and configured
    Ready,
    /// Initialization failed; every capture is refused
    Unavailable,
}

/// Compressed frame producer backed by a camera module
pub struct CaptureSource<S> {
    sensor: S,
    config: CaptureConfig,
    state: SensorState,
}

impl<S: SensorInterface> CaptureSource<S> {
    /// Wrap a sensor; nothing is sent until [`initialize`](Self::initialize)
    pub fn new(sensor: S, config: CaptureConfig) -> Self {
        Self {
            sensor,
            config,
            state: SensorState::Uninitialized,
        }
    }

    /// Reset the module, verify the sensor identity and apply the init table
    ///
    /// Any failure leaves the source [`SensorState::Unavailable`] for good.
    pub fn initialize<D: DelayNs>(&mut self, delay: &mut D) -> CaptureResult<(), S::Error> {
        match self.bring_up(delay) {
            Ok(()) => {
                self.state = SensorState::Ready;
                info!("camera ready");
                Ok(())
            }
            Err(e) => {
                self.state = SensorState::Unavailable;
                error!("camera init failed: {:?}", e);
                Err(e)
            }
        }
    }

    fn bring_up<D: DelayNs>(&mut self, delay: &mut D) -> CaptureResult<(), S::Error> {
        self.sensor.write_reg(reg::RESET, reg::RESET_ASSERT)?;
        delay.delay_ms(self.config.reset_delay_ms);
        self.sensor.write_reg(reg::RESET, reg::RESET_RELEASE)?;
        delay.delay_ms(self.config.reset_delay_ms);

        self.sensor
            .write_sensor_reg(sensor_reg::BANK_SELECT, sensor_reg::BANK_SENSOR)?;
        let vid = self.sensor.read_sensor_reg(sensor_reg::CHIP_ID_HIGH)?;
        let pid = self.sensor.read_sensor_reg(sensor_reg::CHIP_ID_LOW)?;
        if (vid, pid) != self.config.expected_id {
            return Err(CaptureError::IdentityMismatch { vid, pid });
        }

        for &(register, value) in self.config.sensor_init {
            self.sensor.write_sensor_reg(register, value)?;
        }
        self.sensor.write_reg(reg::FIFO_CONTROL, reg::FIFO_CLEAR)?;
        Ok(())
    }

    /// Current lifecycle state
    pub fn state(&self) -> SensorState {
        self.state
    }

    /// Whether captures are accepted
    pub fn is_available(&self) -> bool {
        self.state == SensorState::Ready
    }

    /// Release the sensor
    pub fn release(self) -> S {
        self.sensor
    }

    /// Capture one compressed frame into `frame`
    ///
    /// Polls the capture-done bit every `poll_ms` until `timeout_ms` has
    /// elapsed on `clock`. A timeout is reported no earlier than `timeout_ms`
    /// and no later than `timeout_ms + poll_ms` after the start.
    ///
    /// Returns the frame length, which is never zero and never more than
    /// `min(config.max_frame_size, N)`.
    pub fn capture_frame<D: DelayNs, K: Clock, const N: usize>(
        &mut self,
        frame: &mut CompressedFrame<N>,
        timeout_ms: u32,
        poll_ms: u32,
        delay: &mut D,
        clock: &K,
    ) -> CaptureResult<usize, S::Error> {
        frame.invalidate();
        if !self.is_available() {
            return Err(CaptureError::Unavailable);
        }

        self.sensor.write_reg(reg::FIFO_CONTROL, reg::FIFO_CLEAR)?;
        self.sensor.write_reg(reg::FIFO_CONTROL, reg::FIFO_START)?;

        let deadline = clock.now_ms() + u64::from(timeout_ms);
        loop {
            if self.sensor.read_reg(reg::TRIGGER)? & reg::CAPTURE_DONE != 0 {
                break;
            }
            if clock.now_ms() >= deadline {
                warn!("capture timed out after {} ms", timeout_ms);
                return Err(CaptureError::Timeout);
            }
            delay.delay_ms(poll_ms);
        }

        let length = self.fifo_length()?;
        let limit = self.config.max_frame_size.min(N);
        if length == 0 || length as usize > limit {
            warn!("invalid frame length {} (limit {})", length, limit);
            return Err(CaptureError::InvalidLength(length));
        }

        let length = length as usize;
        self.sensor.read_fifo(&mut frame.data[..length])?;
        frame.len = length;
        self.sensor.write_reg(reg::FIFO_CONTROL, reg::FIFO_CLEAR)?;
        debug!("captured {} bytes", length);
        Ok(length)
    }

    fn fifo_length(&mut self) -> CaptureResult<u32, S::Error> {
        let low = self.sensor.read_reg(reg::FIFO_SIZE_LOW)?;
        let mid = self.sensor.read_reg(reg::FIFO_SIZE_MID)?;
        let high = self.sensor.read_reg(reg::FIFO_SIZE_HIGH)?;
        Ok((u32::from(high & 0x7F) << 16) | (u32::from(mid) << 8) | u32::from(low))
    }
}
