//! Core display operations
//!
//! [`Display`] drives the ST7789 through any [`BusTransport`]. Pixel data is
//! relayed through a caller-supplied transfer chunk inside one bulk session
//! per window, so the controller sees exactly `width * height * 2` bytes after
//! each RAMWR.

use core::cmp::min;

use embedded_hal::delay::DelayNs;
use embedded_hal::pwm::SetDutyCycle;
use log::{error, info, trace};

use crate::color::Color;
use crate::command::{
    CASET, COLMOD, DISPON, FRCTRL2, GATE_TIMING, GCTRL, INVOFF, INVON, LCMCTRL, MADCTL, NVGAMCTRL,
    PORCTRL, PVGAMCTRL, PWCTRL1, RAMWR, RASET, SLPOUT, VCOMS, VDVS, VDVVRHEN, VRHS,
};
use crate::config::{Config, Dimensions};
use crate::error::Error;
use crate::interface::BusTransport;
use crate::rotation::{madctl, rotated_offsets};

type DisplayResult<B> = core::result::Result<(), Error<B>>;

/// Rectangular pixel region, inclusive on both ends
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AddressWindow {
    /// First column
    pub x0: u16,
    /// First row
    pub y0: u16,
    /// Last column
    pub x1: u16,
    /// Last row
    pub y1: u16,
}

impl AddressWindow {
    /// Create a window from inclusive corners
    pub const fn new(x0: u16, y0: u16, x1: u16, y1: u16) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Create a window from an origin and a size
    ///
    /// Returns `None` for an empty size or one that overflows the coordinate range.
    #[allow(clippy::many_single_char_names)]
    pub fn from_size(x: u16, y: u16, w: u16, h: u16) -> Option<Self> {
        if w == 0 || h == 0 {
            return None;
        }
        Some(Self {
            x0: x,
            y0: y,
            x1: x.checked_add(w - 1)?,
            y1: y.checked_add(h - 1)?,
        })
    }

    /// Window covering the whole of `dims`
    pub const fn full(dims: Dimensions) -> Self {
        Self::new(0, 0, dims.width - 1, dims.height - 1)
    }

    /// Columns covered (zero if inverted)
    pub fn width(&self) -> usize {
        if self.x1 < self.x0 {
            0
        } else {
            (self.x1 - self.x0) as usize + 1
        }
    }

    /// Rows covered (zero if inverted)
    pub fn height(&self) -> usize {
        if self.y1 < self.y0 {
            0
        } else {
            (self.y1 - self.y0) as usize + 1
        }
    }

    /// Pixels covered
    pub fn pixel_count(&self) -> usize {
        self.width() * self.height()
    }

    /// Bytes the controller consumes for this window in RGB565
    pub fn byte_count(&self) -> usize {
        self.pixel_count() * 2
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PanelState {
    Uninitialized,
    Ready,
    Unavailable,
}

/// Display driver for the ST7789
///
/// `C` is the transfer chunk: scratch memory pixel data is relayed through.
/// Only `min(chunk.len(), config.transfer_chunk)` bytes of it are used,
/// rounded down to whole pixels.
pub struct Display<B, C>
where
    B: BusTransport,
{
    /// Bus transport
    bus: B,
    /// Display configuration
    config: Config,
    /// Transfer chunk
    chunk: C,
    state: PanelState,
}

impl<B, C> Display<B, C>
where
    B: BusTransport,
    C: AsMut<[u8]>,
{
    /// Create a new Display instance
    ///
    /// The controller is untouched until [`initialize`](Self::initialize).
    pub fn new(bus: B, config: Config, chunk: C) -> Self {
        Self {
            bus,
            config,
            chunk,
            state: PanelState::Uninitialized,
        }
    }

    /// Reset the controller and run the init script
    ///
    /// All-or-nothing: if any step fails the display is marked unavailable
    /// and every later operation returns [`Error::Unavailable`].
    pub fn initialize<D: DelayNs>(&mut self, delay: &mut D) -> DisplayResult<B> {
        self.bus
            .set_transfer_strategy(self.config.transfer_strategy);
        self.bus.reset(delay);
        match self.run_init_script(delay) {
            Ok(()) => {
                self.state = PanelState::Ready;
                let dims = self.config.rotated_dimensions();
                info!("display ready: {}x{}", dims.width, dims.height);
                Ok(())
            }
            Err(e) => {
                self.state = PanelState::Unavailable;
                error!("display init failed: {}", e);
                Err(e)
            }
        }
    }

    fn run_init_script<D: DelayNs>(&mut self, delay: &mut D) -> DisplayResult<B> {
        let c = self.config.clone();
        self.command(MADCTL, &[madctl(c.rotation, c.bgr)])?;
        self.command(COLMOD, &[c.color_mode])?;
        self.command(PORCTRL, &c.porch_control)?;
        self.command(GCTRL, &[c.gate_control])?;
        self.command(VCOMS, &[c.vcom])?;
        self.command(LCMCTRL, &[c.lcm_control])?;
        self.command(VDVVRHEN, &[c.vdv_vrh_enable])?;
        self.command(VRHS, &[c.vrh])?;
        self.command(VDVS, &[c.vdv])?;
        self.command(FRCTRL2, &[c.frame_rate])?;
        self.command(PWCTRL1, &c.power_control)?;
        self.command(GATE_TIMING, &[c.gate_timing])?;
        self.command(PVGAMCTRL, &c.positive_gamma)?;
        self.command(NVGAMCTRL, &c.negative_gamma)?;
        self.command(if c.inversion { INVON } else { INVOFF }, &[])?;
        self.command(SLPOUT, &[])?;
        delay.delay_ms(c.sleep_out_delay_ms);
        self.command(DISPON, &[])
    }

    /// Whether initialization completed
    pub fn is_ready(&self) -> bool {
        self.state == PanelState::Ready
    }

    /// Logical dimensions (after rotation)
    pub fn dimensions(&self) -> Dimensions {
        self.config.rotated_dimensions()
    }

    /// Display configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[cfg(test)]
    pub(crate) fn bus(&self) -> &B {
        &self.bus
    }

    /// Release the bus and chunk
    pub fn release(self) -> (B, C) {
        (self.bus, self.chunk)
    }

    /// Target subsequent pixel data at `window`
    ///
    /// Emits CASET, RASET and RAMWR. The window must satisfy
    /// `x0 <= x1 < width` and `y0 <= y1 < height`.
    pub fn set_address_window(&mut self, window: AddressWindow) -> DisplayResult<B> {
        self.ensure_ready()?;
        let dims = self.dimensions();
        let AddressWindow { x0, y0, x1, y1 } = window;
        if x0 > x1 || y0 > y1 || x1 >= dims.width || y1 >= dims.height {
            return Err(Error::InvalidWindow { x0, y0, x1, y1 });
        }
        let (dx, dy) = rotated_offsets(
            self.config.column_offset,
            self.config.row_offset,
            self.config.rotation,
        );
        let shifted = x0
            .checked_add(dx)
            .zip(x1.checked_add(dx))
            .zip(y0.checked_add(dy).zip(y1.checked_add(dy)));
        let Some(((x0, x1), (y0, y1))) = shifted else {
            return Err(Error::InvalidWindow { x0, y0, x1, y1 });
        };
        self.command(CASET, &[(x0 >> 8) as u8, x0 as u8, (x1 >> 8) as u8, x1 as u8])?;
        self.command(RASET, &[(y0 >> 8) as u8, y0 as u8, (y1 >> 8) as u8, y1 as u8])?;
        self.command(RAMWR, &[])
    }

    /// Fill `window` with a single color
    ///
    /// The color is replicated across the transfer chunk and the chunk is
    /// streamed until exactly `window.byte_count()` bytes went out; the last
    /// piece is truncated to what remains.
    pub fn write_solid_fill(&mut self, window: AddressWindow, color: Color) -> DisplayResult<B> {
        let size = self.usable_chunk()?;
        self.set_address_window(window)?;

        let total = window.byte_count();
        let pattern = color.to_be_bytes();
        let fill = &mut self.chunk.as_mut()[..min(size, total)];
        for pair in fill.chunks_exact_mut(2) {
            pair.copy_from_slice(&pattern);
        }
        let fill: &[u8] = fill;
        let pieces = (0..total)
            .step_by(fill.len())
            .map(move |offset| &fill[..min(fill.len(), total - offset)]);

        let sent = stream(&mut self.bus, pieces).map_err(Error::Bus)?;
        debug_assert_eq!(sent, total);
        trace!("filled {}x{} with {:#06x}", window.width(), window.height(), color.raw());
        Ok(())
    }

    /// Write a row-major RGB565 pixel buffer into `window`
    ///
    /// `pixels` must hold exactly `window.byte_count()` bytes; anything else
    /// is rejected before the bus is touched.
    pub fn write_pixel_buffer(&mut self, window: AddressWindow, pixels: &[u8]) -> DisplayResult<B> {
        let expected = window.byte_count();
        if pixels.len() != expected {
            return Err(Error::ByteCountMismatch {
                expected,
                provided: pixels.len(),
            });
        }
        let size = self.usable_chunk()?;
        self.set_address_window(window)?;

        let sent = stream(&mut self.bus, pixels.chunks(size)).map_err(Error::Bus)?;
        debug_assert_eq!(sent, expected);
        trace!("wrote {} pixel bytes in {}-byte chunks", sent, size);
        Ok(())
    }

    /// Stream colors into `window` in row-major order
    ///
    /// Exactly `window.pixel_count()` pixels are sent: extra colors are
    /// ignored and a short iterator is padded with black.
    pub fn write_pixels<I>(&mut self, window: AddressWindow, colors: I) -> DisplayResult<B>
    where
        I: IntoIterator<Item = Color>,
    {
        let size = self.usable_chunk()?;
        self.set_address_window(window)?;

        let total = window.byte_count();
        let mut colors = colors.into_iter();
        let chunk = &mut self.chunk.as_mut()[..size];
        self.bus.begin_bulk_session().map_err(Error::Bus)?;
        let mut sent = 0;
        let mut result = Ok(());
        while sent < total {
            let len = min(size, total - sent);
            for pair in chunk[..len].chunks_exact_mut(2) {
                let color = colors.next().unwrap_or(Color::BLACK);
                pair.copy_from_slice(&color.to_be_bytes());
            }
            if let Err(e) = self.bus.write_bulk_session_data(&chunk[..len]) {
                result = Err(e);
                break;
            }
            sent += len;
        }
        let ended = self.bus.end_bulk_session();
        result.and(ended).map_err(Error::Bus)
    }

    /// Fill the whole display
    pub fn clear(&mut self, color: Color) -> DisplayResult<B> {
        let window = AddressWindow::full(self.dimensions());
        self.write_solid_fill(window, color)
    }

    /// Set one pixel through a 1x1 window
    pub fn set_pixel(&mut self, x: u16, y: u16, color: Color) -> DisplayResult<B> {
        self.set_address_window(AddressWindow::new(x, y, x, y))?;
        self.bus.write_bulk(&color.to_be_bytes()).map_err(Error::Bus)
    }

    /// Fill an inclusive rectangle, clipped to the display
    ///
    /// A rectangle entirely off screen or inverted draws nothing.
    pub fn draw_filled_rect(
        &mut self,
        x0: u16,
        y0: u16,
        x1: u16,
        y1: u16,
        color: Color,
    ) -> DisplayResult<B> {
        let dims = self.dimensions();
        let x1 = min(x1, dims.width - 1);
        let y1 = min(y1, dims.height - 1);
        if x0 > x1 || y0 > y1 {
            return Ok(());
        }
        self.write_solid_fill(AddressWindow::new(x0, y0, x1, y1), color)
    }

    fn ensure_ready(&self) -> DisplayResult<B> {
        if self.state == PanelState::Ready {
            Ok(())
        } else {
            Err(Error::Unavailable)
        }
    }

    fn usable_chunk(&mut self) -> core::result::Result<usize, Error<B>> {
        let provided = self.chunk.as_mut().len();
        let size = min(provided, self.config.transfer_chunk) & !1;
        if size < 2 {
            return Err(Error::ChunkTooSmall { provided });
        }
        Ok(size)
    }

    fn command(&mut self, cmd: u8, params: &[u8]) -> DisplayResult<B> {
        self.bus.write_command(cmd).map_err(Error::Bus)?;
        for &byte in params {
            self.bus.write_byte(byte).map_err(Error::Bus)?;
        }
        Ok(())
    }
}

/// Stream pieces inside one bulk session
///
/// The session is closed even when a write fails.
fn stream<'a, B: BusTransport>(
    bus: &mut B,
    pieces: impl Iterator<Item = &'a [u8]>,
) -> core::result::Result<usize, B::Error> {
    bus.begin_bulk_session()?;
    let mut sent = 0;
    let mut result = Ok(());
    for piece in pieces {
        if let Err(e) = bus.write_bulk_session_data(piece) {
            result = Err(e);
            break;
        }
        sent += piece.len();
    }
    let ended = bus.end_bulk_session();
    result.and(ended).map(|()| sent)
}

/// PWM backlight
pub struct Backlight<P> {
    pwm: P,
    level: u8,
}

impl<P: SetDutyCycle> Backlight<P> {
    /// Wrap a PWM channel; the level is unknown until first set
    pub fn new(pwm: P) -> Self {
        Self { pwm, level: 0 }
    }

    /// Set brightness in percent, clamped to 100
    pub fn set_percent(&mut self, percent: u8) -> Result<(), P::Error> {
        let percent = min(percent, 100);
        self.pwm.set_duty_cycle_percent(percent)?;
        self.level = percent;
        Ok(())
    }

    /// Last brightness set, in percent
    pub fn level(&self) -> u8 {
        self.level
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::{Builder, Dimensions, Rotation};
    use alloc::vec;
    use alloc::vec::Vec;
    use proptest::prelude::*;

    #[derive(Debug, Default)]
    pub(crate) struct MockBus {
        pub commands: Vec<u8>,
        pub command_data: Vec<(u8, Vec<u8>)>,
        pub session_writes: Vec<Vec<u8>>,
        pub framed_data: Vec<Vec<u8>>,
        pub sessions_opened: usize,
        pub sessions_closed: usize,
        pub fail_on_command: Option<u8>,
        pub active: bool,
    }

    impl MockBus {
        pub(crate) fn session_bytes(&self) -> Vec<u8> {
            self.session_writes.concat()
        }

        pub(crate) fn params(&self, cmd: u8) -> Option<&[u8]> {
            self.command_data
                .iter()
                .rev()
                .find(|(c, _)| *c == cmd)
                .map(|(_, data)| data.as_slice())
        }
    }

    impl BusTransport for MockBus {
        type Error = ();

        fn write_command(&mut self, command: u8) -> Result<(), Self::Error> {
            if self.fail_on_command == Some(command) {
                return Err(());
            }
            self.commands.push(command);
            self.command_data.push((command, Vec::new()));
            Ok(())
        }

        fn write_byte(&mut self, byte: u8) -> Result<(), Self::Error> {
            if let Some((_, data)) = self.command_data.last_mut() {
                data.push(byte);
            }
            Ok(())
        }

        fn write_bulk(&mut self, data: &[u8]) -> Result<(), Self::Error> {
            self.framed_data.push(data.to_vec());
            Ok(())
        }

        fn begin_bulk_session(&mut self) -> Result<(), Self::Error> {
            self.active = true;
            self.sessions_opened += 1;
            Ok(())
        }

        fn write_bulk_session_data(&mut self, data: &[u8]) -> Result<(), Self::Error> {
            if self.active {
                self.session_writes.push(data.to_vec());
            }
            Ok(())
        }

        fn end_bulk_session(&mut self) -> Result<(), Self::Error> {
            if self.active {
                self.active = false;
                self.sessions_closed += 1;
            }
            Ok(())
        }

        fn is_bulk_active(&self) -> bool {
            self.active
        }

        fn reset<D: DelayNs>(&mut self, _delay: &mut D) {}
    }

    pub(crate) struct MockDelay;
    impl DelayNs for MockDelay {
        fn delay_ns(&mut self, _ns: u32) {}
    }

    pub(crate) fn test_display(
        rotation: Rotation,
        chunk: usize,
    ) -> Display<MockBus, Vec<u8>> {
        let config = Builder::new()
            .dimensions(Dimensions::new(240, 320).unwrap())
            .rotation(rotation)
            .build()
            .unwrap();
        let mut display = Display::new(MockBus::default(), config, vec![0u8; chunk]);
        display.initialize(&mut MockDelay).unwrap();
        display
    }

    #[test]
    fn test_init_script_order() {
        let display = test_display(Rotation::Rotate0, 64);
        assert_eq!(
            display.bus.commands,
            [
                MADCTL, COLMOD, PORCTRL, GCTRL, VCOMS, LCMCTRL, VDVVRHEN, VRHS, VDVS, FRCTRL2,
                PWCTRL1, GATE_TIMING, PVGAMCTRL, NVGAMCTRL, INVON, SLPOUT, DISPON
            ]
        );
        assert_eq!(display.bus.params(COLMOD), Some(&[0x55][..]));
        assert_eq!(
            display.bus.params(PORCTRL),
            Some(&[0x0C, 0x0C, 0x00, 0x33, 0x33][..])
        );
        assert_eq!(display.bus.params(PVGAMCTRL).map(<[u8]>::len), Some(14));
    }

    #[test]
    fn test_init_failure_marks_unavailable() {
        let config = Builder::new()
            .dimensions(Dimensions::new(240, 320).unwrap())
            .build()
            .unwrap();
        let bus = MockBus {
            fail_on_command: Some(SLPOUT),
            ..MockBus::default()
        };
        let mut display = Display::new(bus, config, vec![0u8; 64]);
        assert!(matches!(
            display.initialize(&mut MockDelay),
            Err(Error::Bus(()))
        ));
        assert!(!display.is_ready());
        assert!(matches!(
            display.clear(Color::BLACK),
            Err(Error::Unavailable)
        ));
    }

    #[test]
    fn test_operations_before_init_rejected() {
        let config = Builder::new()
            .dimensions(Dimensions::new(240, 320).unwrap())
            .build()
            .unwrap();
        let mut display = Display::new(MockBus::default(), config, vec![0u8; 64]);
        assert!(matches!(
            display.set_pixel(0, 0, Color::RED),
            Err(Error::Unavailable)
        ));
        assert!(display.bus.commands.is_empty());
    }

    #[test]
    fn test_set_address_window_params() {
        let mut display = test_display(Rotation::Rotate0, 64);
        display
            .set_address_window(AddressWindow::new(0x10, 0x20, 0xEF, 0x13F))
            .unwrap();
        assert_eq!(display.bus.params(CASET), Some(&[0x00, 0x10, 0x00, 0xEF][..]));
        assert_eq!(display.bus.params(RASET), Some(&[0x00, 0x20, 0x01, 0x3F][..]));
        assert_eq!(display.bus.commands.last(), Some(&RAMWR));
    }

    #[test]
    fn test_set_address_window_applies_offset() {
        let config = Builder::new()
            .dimensions(Dimensions::new(170, 320).unwrap())
            .offset(35, 0)
            .build()
            .unwrap();
        let mut display = Display::new(MockBus::default(), config, vec![0u8; 64]);
        display.initialize(&mut MockDelay).unwrap();
        display
            .set_address_window(AddressWindow::new(0, 0, 169, 319))
            .unwrap();
        assert_eq!(display.bus.params(CASET), Some(&[0x00, 35, 0x00, 204][..]));
    }

    #[test]
    fn test_offset_overflow_is_invalid_window() {
        let mut config = Builder::new()
            .dimensions(Dimensions::new(240, 320).unwrap())
            .build()
            .unwrap();
        config.column_offset = u16::MAX - 10;
        let mut display = Display::new(MockBus::default(), config, vec![0u8; 64]);
        display.initialize(&mut MockDelay).unwrap();
        let before = display.bus.commands.len();
        assert!(matches!(
            display.set_address_window(AddressWindow::new(0, 0, 239, 319)),
            Err(Error::InvalidWindow { .. })
        ));
        assert_eq!(display.bus.commands.len(), before);
    }

    #[test]
    fn test_invalid_windows() {
        let mut display = test_display(Rotation::Rotate0, 64);
        for window in [
            AddressWindow::new(0, 0, 240, 10),
            AddressWindow::new(0, 0, 10, 320),
            AddressWindow::new(5, 0, 4, 10),
            AddressWindow::new(0, 5, 10, 4),
        ] {
            assert!(matches!(
                display.set_address_window(window),
                Err(Error::InvalidWindow { .. })
            ));
        }
    }

    #[test]
    fn test_solid_fill_truncates_last_chunk() {
        let mut display = test_display(Rotation::Rotate0, 64);
        display
            .write_solid_fill(AddressWindow::new(0, 0, 9, 9), Color::RED)
            .unwrap();
        let sizes: Vec<usize> = display.bus.session_writes.iter().map(Vec::len).collect();
        assert_eq!(sizes, [64, 64, 64, 8]);
        let bytes = display.bus.session_bytes();
        assert!(bytes.chunks(2).all(|p| p == [0xF8, 0x00]));
        assert_eq!(display.bus.sessions_opened, 1);
        assert_eq!(display.bus.sessions_closed, 1);
    }

    #[test]
    fn test_odd_chunk_rounds_down_to_whole_pixels() {
        let mut display = test_display(Rotation::Rotate0, 7);
        display
            .write_solid_fill(AddressWindow::new(0, 0, 3, 0), Color::BLUE)
            .unwrap();
        let sizes: Vec<usize> = display.bus.session_writes.iter().map(Vec::len).collect();
        assert_eq!(sizes, [6, 2]);
    }

    #[test]
    fn test_chunk_too_small() {
        let mut display = test_display(Rotation::Rotate0, 1);
        assert!(matches!(
            display.clear(Color::BLACK),
            Err(Error::ChunkTooSmall { provided: 1 })
        ));
    }

    #[test]
    fn test_pixel_buffer_mismatch_touches_nothing() {
        let mut display = test_display(Rotation::Rotate0, 64);
        let before = display.bus.commands.len();
        let pixels = [0u8; 10];
        assert!(matches!(
            display.write_pixel_buffer(AddressWindow::new(0, 0, 1, 1), &pixels),
            Err(Error::ByteCountMismatch {
                expected: 8,
                provided: 10
            })
        ));
        assert_eq!(display.bus.commands.len(), before);
        assert_eq!(display.bus.sessions_opened, 0);
    }

    #[test]
    fn test_full_landscape_frame_chunking() {
        let mut display = test_display(Rotation::Rotate90, 16_384);
        let dims = display.dimensions();
        assert_eq!((dims.width, dims.height), (320, 240));

        let pixels: Vec<u8> = (0..153_600u32).map(|i| i as u8).collect();
        display
            .write_pixel_buffer(AddressWindow::full(dims), &pixels)
            .unwrap();

        let sizes: Vec<usize> = display.bus.session_writes.iter().map(Vec::len).collect();
        assert_eq!(sizes.len(), 10);
        assert!(sizes[..9].iter().all(|&s| s == 16_384));
        assert_eq!(sizes[9], 6_144);
        assert_eq!(display.bus.session_bytes(), pixels);
        assert_eq!(display.bus.params(MADCTL), Some(&[0x60][..]));
        assert_eq!(display.bus.params(CASET), Some(&[0x00, 0x00, 0x01, 0x3F][..]));
    }

    #[test]
    fn test_set_pixel() {
        let mut display = test_display(Rotation::Rotate0, 64);
        display.set_pixel(3, 4, Color::GREEN).unwrap();
        assert_eq!(display.bus.params(CASET), Some(&[0, 3, 0, 3][..]));
        assert_eq!(display.bus.framed_data.last().map(Vec::as_slice), Some(&[0x07, 0xE0][..]));
    }

    #[test]
    fn test_write_pixels_pads_short_iterator() {
        let mut display = test_display(Rotation::Rotate0, 4);
        let window = AddressWindow::from_size(0, 0, 3, 1).unwrap();
        display.write_pixels(window, [Color::RED, Color::BLUE]).unwrap();
        assert_eq!(display.bus.session_writes, [vec![0xF8, 0x00, 0x00, 0x1F], vec![0, 0]]);
        assert_eq!(display.bus.sessions_closed, 1);
    }

    #[test]
    fn test_filled_rect_is_clipped() {
        let mut display = test_display(Rotation::Rotate0, 64);
        display
            .draw_filled_rect(230, 310, 400, 400, Color::WHITE)
            .unwrap();
        assert_eq!(display.bus.params(CASET), Some(&[0, 230, 0, 239][..]));
        assert_eq!(display.bus.session_bytes().len(), 10 * 10 * 2);

        let sessions = display.bus.sessions_opened;
        display.draw_filled_rect(300, 0, 310, 5, Color::WHITE).unwrap();
        assert_eq!(display.bus.sessions_opened, sessions);
    }

    #[test]
    fn test_window_from_size() {
        assert_eq!(
            AddressWindow::from_size(10, 20, 5, 2),
            Some(AddressWindow::new(10, 20, 14, 21))
        );
        assert_eq!(AddressWindow::from_size(0, 0, 0, 5), None);
        assert_eq!(AddressWindow::from_size(u16::MAX, 0, 2, 1), None);
    }

    struct MockPwm {
        duty: u16,
    }

    impl embedded_hal::pwm::ErrorType for MockPwm {
        type Error = core::convert::Infallible;
    }

    impl SetDutyCycle for MockPwm {
        fn max_duty_cycle(&self) -> u16 {
            255
        }
        fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
            self.duty = duty;
            Ok(())
        }
    }

    #[test]
    fn test_backlight_clamps_to_full() {
        let mut backlight = Backlight::new(MockPwm { duty: 0 });
        backlight.set_percent(150).unwrap();
        assert_eq!(backlight.level(), 100);
        assert_eq!(backlight.pwm.duty, 255);
        backlight.set_percent(0).unwrap();
        assert_eq!(backlight.pwm.duty, 0);
    }

    proptest! {
        #[test]
        fn prop_solid_fill_sends_exact_byte_count(
            w in 1u16..=240,
            h in 1u16..=24,
            chunk in 2usize..=700,
            raw in any::<u16>(),
        ) {
            let mut display = test_display(Rotation::Rotate0, chunk);
            let window = AddressWindow::from_size(0, 0, w, h).unwrap();
            display.write_solid_fill(window, Color(raw)).unwrap();

            let bytes = display.bus.session_bytes();
            prop_assert_eq!(bytes.len(), w as usize * h as usize * 2);
            prop_assert!(bytes.chunks(2).all(|p| p == raw.to_be_bytes()));
            prop_assert!(display.bus.session_writes.iter().all(|s| s.len() <= chunk));
            prop_assert!(!display.bus.is_bulk_active());
        }
    }
}
