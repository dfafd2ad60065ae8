//! Pipeline scheduler
//!
//! Two loops share one camera:
//!
//! - [`RenderLoop`] owns the display and the pixel buffer. Every iteration
//!   captures a preview frame, decodes it, streams it to the full screen and
//!   draws the posted overlay on top.
//! - [`RequestLoop`] owns the photo store and the indicator. It consumes the
//!   request flags and runs at most one capture-and-save per iteration.
//!
//! Each loop captures into its own [`CompressedFrame`]. The camera itself
//! sits in a [`SharedCamera`] so one capture always runs to completion before
//! the other loop can start the next. The request loop never touches the
//! display; it posts [`Overlay`]s into an [`OverlaySlot`] instead.
//!
//! Both loops block on [`DelayNs`] between iterations. Run them in two tasks
//! (or threads) of equal priority.

use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_hal::delay::DelayNs;
use log::{debug, info, warn};

use crate::capture::{CaptureSource, Clock, CompressedFrame};
use crate::color::IndicatorColor;
use crate::config::PipelineConfig;
use crate::decoder::{FrameDecoder, PixelBuffer, decode};
use crate::display::{AddressWindow, Display};
use crate::error::{BuilderError, CaptureError, Error};
use crate::indicator::Indicator;
use crate::interface::BusTransport;
use crate::overlay::{Overlay, OverlayRenderer, OverlaySlot};
use crate::request::{CaptureMode, RequestSurface, SystemStatus};
use crate::sensor::SensorInterface;
use crate::storage::{PhotoName, PhotoStore, Storage};

/// Capture source shared by both loops
///
/// A capture claims the source by taking it out of the slot and hands it
/// back when done. The lock is only held for that hand-over, so the poll
/// loop runs with interrupts enabled even under `CriticalSectionRawMutex`,
/// which is the raw mutex to use when the loops run in separate tasks.
/// A loop that finds the camera claimed waits `poll_ms` and tries again.
pub struct SharedCamera<R: RawMutex, S> {
    slot: Mutex<R, RefCell<Option<CaptureSource<S>>>>,
    available: AtomicBool,
}

impl<R: RawMutex, S: SensorInterface> SharedCamera<R, S> {
    /// Wrap a capture source
    pub fn new(source: CaptureSource<S>) -> Self {
        Self {
            available: AtomicBool::new(source.is_available()),
            slot: Mutex::new(RefCell::new(Some(source))),
        }
    }

    /// Bring the camera up, see [`CaptureSource::initialize`]
    pub fn initialize<D: DelayNs>(&self, delay: &mut D) -> Result<(), CaptureError<S::Error>> {
        let mut source = self.claim(delay, 1);
        let result = source.initialize(delay);
        self.restore(source);
        result
    }

    /// Whether captures are accepted
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    /// Capture one frame, see [`CaptureSource::capture_frame`]
    ///
    /// Time spent waiting for the other loop's capture does not count
    /// against `timeout_ms`.
    pub fn capture<D: DelayNs, K: Clock, const N: usize>(
        &self,
        frame: &mut CompressedFrame<N>,
        timeout_ms: u32,
        poll_ms: u32,
        delay: &mut D,
        clock: &K,
    ) -> Result<usize, CaptureError<S::Error>> {
        let mut source = self.claim(delay, poll_ms);
        let result = source.capture_frame(frame, timeout_ms, poll_ms, delay, clock);
        self.restore(source);
        result
    }

    /// Release the capture source
    ///
    /// `None` only if a capture panicked while holding it.
    pub fn release(self) -> Option<CaptureSource<S>> {
        self.slot.into_inner().into_inner()
    }

    fn try_claim(&self) -> Option<CaptureSource<S>> {
        self.slot.lock(|slot| slot.borrow_mut().take())
    }

    fn claim<D: DelayNs>(&self, delay: &mut D, poll_ms: u32) -> CaptureSource<S> {
        loop {
            if let Some(source) = self.try_claim() {
                return source;
            }
            delay.delay_ms(poll_ms.max(1));
        }
    }

    fn restore(&self, source: CaptureSource<S>) {
        self.available.store(source.is_available(), Ordering::Release);
        self.slot.lock(|slot| *slot.borrow_mut() = Some(source));
    }
}

/// Result of one render iteration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderOutcome {
    /// A fresh frame reached the display
    Displayed,
    /// No frame this time
    CaptureFailed,
    /// Frame captured but could not be decoded; nothing was displayed
    DecodeFailed,
}

/// Capture, decode and display loop
pub struct RenderLoop<'a, R, S, B, C, D, P, O>
where
    R: RawMutex,
    B: BusTransport,
{
    camera: &'a SharedCamera<R, S>,
    overlays: &'a OverlaySlot<R>,
    display: Display<B, C>,
    decoder: D,
    pixels: PixelBuffer<P>,
    frame: &'a mut CompressedFrame,
    renderer: O,
    mode_badge: Option<&'a RequestSurface>,
    config: PipelineConfig,
}

impl<'a, R, S, B, C, D, P, O> RenderLoop<'a, R, S, B, C, D, P, O>
where
    R: RawMutex,
    S: SensorInterface,
    B: BusTransport,
    C: AsMut<[u8]>,
    D: FrameDecoder,
    P: AsRef<[u8]> + AsMut<[u8]>,
    O: OverlayRenderer,
{
    /// Assemble the loop around an initialized display
    ///
    /// The pixel buffer must match the display's logical dimensions.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        camera: &'a SharedCamera<R, S>,
        overlays: &'a OverlaySlot<R>,
        display: Display<B, C>,
        decoder: D,
        pixels: PixelBuffer<P>,
        frame: &'a mut CompressedFrame,
        renderer: O,
        config: PipelineConfig,
    ) -> Result<Self, BuilderError> {
        config.validate()?;
        let dims = display.dimensions();
        if (pixels.width(), pixels.height()) != (dims.width, dims.height) {
            return Err(BuilderError::InvalidDimensions {
                width: pixels.width(),
                height: pixels.height(),
            });
        }
        Ok(Self {
            camera,
            overlays,
            display,
            decoder,
            pixels,
            frame,
            renderer,
            mode_badge: None,
            config,
        })
    }

    /// Draw the capture mode from `surface` over every displayed frame
    #[must_use]
    pub fn with_mode_badge(mut self, surface: &'a RequestSurface) -> Self {
        self.mode_badge = Some(surface);
        self
    }

    /// Draw the boot screen and hold it for `boot_screen_ms`
    pub fn show_boot_screen<T: DelayNs>(&mut self, delay: &mut T) -> Result<(), Error<B>> {
        self.renderer.render(&mut self.display, &Overlay::Boot)?;
        delay.delay_ms(self.config.boot_screen_ms);
        Ok(())
    }

    /// One capture, decode, display cycle followed by the render yield
    ///
    /// Capture and decode failures are reported in the outcome; only display
    /// bus failures are errors.
    pub fn step<T: DelayNs, K: Clock>(
        &mut self,
        delay: &mut T,
        clock: &K,
    ) -> Result<RenderOutcome, Error<B>> {
        let outcome = self.refresh(delay, clock)?;
        if let (RenderOutcome::Displayed, Some(surface)) = (outcome, self.mode_badge) {
            self.renderer
                .render_mode_badge(&mut self.display, surface.mode())?;
        }
        if let Some(overlay) = self.overlays.current() {
            self.renderer.render(&mut self.display, &overlay)?;
        }
        delay.delay_ms(self.config.render_yield_ms);
        Ok(outcome)
    }

    fn refresh<T: DelayNs, K: Clock>(
        &mut self,
        delay: &mut T,
        clock: &K,
    ) -> Result<RenderOutcome, Error<B>> {
        let captured = self.camera.capture(
            self.frame,
            self.config.capture_timeout_ms,
            self.config.capture_poll_ms,
            delay,
            clock,
        );
        if let Err(e) = captured {
            debug!("preview capture failed: {}", e);
            return Ok(RenderOutcome::CaptureFailed);
        }
        if decode(&mut self.decoder, self.frame.as_bytes(), &mut self.pixels).is_err() {
            return Ok(RenderOutcome::DecodeFailed);
        }
        let window = AddressWindow::full(self.display.dimensions());
        self.display
            .write_pixel_buffer(window, self.pixels.as_bytes())?;
        Ok(RenderOutcome::Displayed)
    }

    /// Run forever, logging display failures
    pub fn run<T: DelayNs, K: Clock>(&mut self, delay: &mut T, clock: &K) -> ! {
        loop {
            if let Err(e) = self.step(delay, clock) {
                warn!("render failed: {}", e);
                delay.delay_ms(self.config.render_yield_ms);
            }
        }
    }

    /// Give the display back
    pub fn release(self) -> Display<B, C> {
        self.display
    }
}

/// Result of a capture request
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Photo stored under this name
    Saved(PhotoName),
    /// Camera produced no frame
    CaptureFailed,
    /// Frame could not be stored
    SaveFailed,
}

/// What one request iteration did
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Step {
    /// New mode, if a toggle was handled
    pub toggled: Option<CaptureMode>,
    /// Result of the capture handled, if any
    pub outcome: Option<Outcome>,
}

/// Request-handling loop
pub struct RequestLoop<'a, R, S, T, I>
where
    R: RawMutex,
{
    camera: &'a SharedCamera<R, S>,
    surface: &'a RequestSurface,
    overlays: &'a OverlaySlot<R>,
    store: PhotoStore<T>,
    indicator: I,
    frame: &'a mut CompressedFrame,
    config: PipelineConfig,
}

impl<'a, R, S, T, I> RequestLoop<'a, R, S, T, I>
where
    R: RawMutex,
    S: SensorInterface,
    T: Storage,
    I: Indicator,
{
    /// Assemble the loop
    pub fn new(
        camera: &'a SharedCamera<R, S>,
        surface: &'a RequestSurface,
        overlays: &'a OverlaySlot<R>,
        store: PhotoStore<T>,
        indicator: I,
        frame: &'a mut CompressedFrame,
        config: PipelineConfig,
    ) -> Result<Self, BuilderError> {
        config.validate()?;
        Ok(Self {
            camera,
            surface,
            overlays,
            store,
            indicator,
            frame,
            config,
        })
    }

    /// Seed the photo counter and publish availability
    pub fn start(&mut self) {
        let storage_ok = match self.store.init() {
            Ok(_) => true,
            Err(e) => {
                warn!("photo store unavailable: {}", e);
                false
            }
        };
        self.surface.set_storage_available(storage_ok);
        self.surface.set_camera_available(self.camera.is_available());
        self.surface.set_photo_count(self.store.photo_count());
        self.set_status(SystemStatus::Idle);
    }

    /// Handle pending requests once, then yield
    ///
    /// A mode toggle is handled first. After it, either an immediate capture
    /// or a countdown capture runs, never both; a countdown request stays
    /// pending when an immediate capture was taken.
    pub fn step<D: DelayNs, K: Clock>(&mut self, delay: &mut D, clock: &K) -> Step {
        let flags = self.surface.flags();
        let toggled = flags.take_mode_toggle().then(|| self.toggle_mode(delay));

        let outcome = if flags.take_capture() {
            Some(self.capture_and_save(delay, clock))
        } else if flags.take_countdown() {
            self.set_status(SystemStatus::Capturing);
            self.count_down(delay);
            Some(self.capture_and_save(delay, clock))
        } else {
            None
        };

        delay.delay_ms(self.config.request_yield_ms);
        Step { toggled, outcome }
    }

    /// Start, then handle requests forever
    pub fn run<D: DelayNs, K: Clock>(&mut self, delay: &mut D, clock: &K) -> ! {
        self.start();
        loop {
            self.step(delay, clock);
        }
    }

    /// Photo store
    pub fn store(&self) -> &PhotoStore<T> {
        &self.store
    }

    /// Give the store and the indicator back
    pub fn release(self) -> (PhotoStore<T>, I) {
        (self.store, self.indicator)
    }

    fn set_status(&mut self, status: SystemStatus) {
        self.surface.set_status(status);
        self.indicator.set_indicator(status.indicator_color());
    }

    fn toggle_mode<D: DelayNs>(&mut self, delay: &mut D) -> CaptureMode {
        let mode = self.surface.mode().toggled();
        self.surface.set_mode(mode);
        info!("capture mode: {}", mode.as_str());

        self.indicator.set_indicator(IndicatorColor::Blue);
        self.overlays.show(Overlay::Mode(mode));
        delay.delay_ms(self.config.mode_feedback_ms);
        self.overlays.clear();
        self.indicator
            .set_indicator(self.surface.status().indicator_color());
        mode
    }

    fn count_down<D: DelayNs>(&mut self, delay: &mut D) {
        for remaining in (1..=self.config.countdown_seconds).rev() {
            self.overlays.show(Overlay::Countdown(remaining));
            self.indicator.set_indicator(IndicatorColor::Red);
            delay.delay_ms(self.config.countdown_blink_ms);
            self.indicator.set_indicator(IndicatorColor::Off);
            delay.delay_ms(self.config.countdown_blink_ms);
        }
        self.overlays.clear();
    }

    fn capture_and_save<D: DelayNs, K: Clock>(&mut self, delay: &mut D, clock: &K) -> Outcome {
        self.set_status(SystemStatus::Capturing);
        let captured = self.camera.capture(
            self.frame,
            self.config.capture_timeout_ms,
            self.config.capture_poll_ms,
            delay,
            clock,
        );
        if let Err(e) = captured {
            warn!("capture failed: {}", e);
            return self.fail("Capture failed", Outcome::CaptureFailed, delay);
        }

        self.set_status(SystemStatus::Saving);
        match self.store.save(self.frame.as_bytes()) {
            Ok(name) => {
                self.surface.set_photo_count(self.store.photo_count());
                self.indicator.set_indicator(IndicatorColor::Green);
                self.overlays.show(Overlay::Saved(name.clone()));
                delay.delay_ms(self.config.status_display_ms);
                self.overlays.clear();
                self.set_status(SystemStatus::Idle);
                Outcome::Saved(name)
            }
            Err(e) => {
                warn!("save failed: {}", e);
                self.fail("Save failed", Outcome::SaveFailed, delay)
            }
        }
    }

    fn fail<D: DelayNs>(&mut self, message: &'static str, outcome: Outcome, delay: &mut D) -> Outcome {
        self.set_status(SystemStatus::Error);
        self.overlays.show(Overlay::Error(message));
        delay.delay_ms(self.config.error_display_ms);
        self.overlays.clear();
        self.set_status(SystemStatus::Idle);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::tests::{MockCamera, SimTime};
    use crate::config::{CaptureConfig, Rotation};
    use crate::decoder::Block;
    use crate::display::tests::{MockBus, test_display};
    use crate::indicator::tests::RecordingIndicator;
    use crate::overlay::NoOverlay;
    use crate::storage::photo_name;
    use crate::storage::tests::MemStorage;
    use alloc::boxed::Box;
    use alloc::vec;
    use alloc::vec::Vec;
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
    use std::sync::mpsc;
    use std::time::Duration;

    type Camera = SharedCamera<CriticalSectionRawMutex, MockCamera>;
    type Slot = OverlaySlot<CriticalSectionRawMutex>;

    fn camera(sensor: MockCamera) -> Camera {
        let mut source = CaptureSource::new(sensor, CaptureConfig::default());
        source.initialize(&mut SimTime::default()).unwrap();
        SharedCamera::new(source)
    }

    fn frame() -> Box<CompressedFrame> {
        Box::new(CompressedFrame::new())
    }

    fn request_loop<'a>(
        camera: &'a Camera,
        surface: &'a RequestSurface,
        overlays: &'a Slot,
        frame: &'a mut CompressedFrame,
        storage: MemStorage,
    ) -> Requests<'a> {
        let mut lp = RequestLoop::new(
            camera,
            surface,
            overlays,
            PhotoStore::new(storage),
            RecordingIndicator::default(),
            frame,
            PipelineConfig::default(),
        )
        .unwrap();
        lp.start();
        lp
    }

    type Requests<'a> =
        RequestLoop<'a, CriticalSectionRawMutex, MockCamera, MemStorage, RecordingIndicator>;

    fn shown(lp: Requests<'_>) -> Vec<IndicatorColor> {
        let (_, indicator) = lp.release();
        indicator.shown
    }

    #[test]
    fn test_start_publishes_availability() {
        let camera = camera(MockCamera::new(500));
        let surface = RequestSurface::new();
        let overlays = Slot::new();
        let mut frame = frame();
        let mut storage = MemStorage::mounted();
        storage.files.insert("/photos/IMG_0001.jpg".into(), vec![1]);
        let _lp = request_loop(&camera, &surface, &overlays, &mut frame, storage);

        let snapshot = surface.snapshot();
        assert_eq!(snapshot.photo_count, 1);
        assert!(snapshot.storage_available);
        assert!(snapshot.camera_available);
        assert_eq!(snapshot.status, SystemStatus::Idle);
    }

    #[test]
    fn test_double_request_coalesces_into_one_capture() {
        let camera = camera(MockCamera::new(500));
        let surface = RequestSurface::new();
        let overlays = Slot::new();
        let mut frame = frame();
        let mut lp = request_loop(&camera, &surface, &overlays, &mut frame, MemStorage::mounted());
        let time = SimTime::default();

        surface.request_capture();
        surface.request_capture();
        let first = lp.step(&mut time.clone(), &time);
        let second = lp.step(&mut time.clone(), &time);

        assert!(matches!(first.outcome, Some(Outcome::Saved(_))));
        assert_eq!(second, Step::default());
        assert_eq!(lp.store().photo_count(), 1);
        drop(lp);
        assert_eq!(camera.release().unwrap().release().captures, 1);
    }

    #[test]
    fn test_capture_timeout_reports_error_and_saves_nothing() {
        let mut sensor = MockCamera::new(500);
        sensor.done_after = None;
        let camera = camera(sensor);
        let surface = RequestSurface::new();
        let overlays = Slot::new();
        let mut frame = frame();
        let mut lp = request_loop(&camera, &surface, &overlays, &mut frame, MemStorage::mounted());
        let time = SimTime::default();

        surface.request_capture();
        let step = lp.step(&mut time.clone(), &time);

        assert_eq!(step.outcome, Some(Outcome::CaptureFailed));
        assert_eq!(surface.status(), SystemStatus::Idle);
        assert_eq!(surface.photo_count(), 0);
        assert_eq!(overlays.current(), None);
        assert!(time.now() >= 1000 + 1000 + 50);
        let (store, indicator) = lp.release();
        assert_eq!(
            indicator.shown,
            [
                IndicatorColor::Off,
                IndicatorColor::Red,
                IndicatorColor::Magenta,
                IndicatorColor::Off
            ]
        );
        assert!(store.release().files.is_empty());
    }

    #[test]
    fn test_successful_capture_is_saved() {
        let camera = camera(MockCamera::new(500));
        let surface = RequestSurface::new();
        let overlays = Slot::new();
        let mut frame = frame();
        let mut lp = request_loop(&camera, &surface, &overlays, &mut frame, MemStorage::mounted());
        let time = SimTime::default();

        surface.request_capture();
        let step = lp.step(&mut time.clone(), &time);

        let expected = photo_name::<()>(1).unwrap();
        assert_eq!(expected.as_str(), "/photos/IMG_0001.jpg");
        assert_eq!(step.outcome, Some(Outcome::Saved(expected)));
        assert_eq!(surface.photo_count(), 1);
        assert_eq!(overlays.current(), None);
        let (store, indicator) = lp.release();
        assert_eq!(
            indicator.shown,
            [
                IndicatorColor::Off,
                IndicatorColor::Red,
                IndicatorColor::Yellow,
                IndicatorColor::Green,
                IndicatorColor::Off
            ]
        );
        let storage = store.release();
        let saved = &storage.files["/photos/IMG_0001.jpg"];
        assert_eq!(saved.len(), 500);
        assert_eq!(saved[499], (499 % 256) as u8);
    }

    #[test]
    fn test_short_write_reports_error() {
        let camera = camera(MockCamera::new(500));
        let surface = RequestSurface::new();
        let overlays = Slot::new();
        let mut frame = frame();
        let mut storage = MemStorage::mounted();
        storage.short_by = 10;
        let mut lp = request_loop(&camera, &surface, &overlays, &mut frame, storage);
        let time = SimTime::default();

        surface.request_capture();
        assert_eq!(lp.step(&mut time.clone(), &time).outcome, Some(Outcome::SaveFailed));
        assert_eq!(surface.photo_count(), 0);
        assert_eq!(
            shown(lp),
            [
                IndicatorColor::Off,
                IndicatorColor::Red,
                IndicatorColor::Yellow,
                IndicatorColor::Magenta,
                IndicatorColor::Off
            ]
        );
    }

    #[test]
    fn test_countdown_blinks_once_per_second() {
        let camera = camera(MockCamera::new(500));
        let surface = RequestSurface::new();
        let overlays = Slot::new();
        let mut frame = frame();
        let mut lp = request_loop(&camera, &surface, &overlays, &mut frame, MemStorage::mounted());
        let time = SimTime::default();

        surface.request_countdown_capture();
        let step = lp.step(&mut time.clone(), &time);

        assert!(matches!(step.outcome, Some(Outcome::Saved(_))));
        assert!(time.now() >= 3000 + 2000 + 50);
        let shown = shown(lp);
        assert_eq!(shown[1], IndicatorColor::Red);
        let blinks = [IndicatorColor::Red, IndicatorColor::Off].repeat(3);
        assert_eq!(&shown[2..8], blinks.as_slice());
        assert_eq!(
            shown[8..],
            [
                IndicatorColor::Red,
                IndicatorColor::Yellow,
                IndicatorColor::Green,
                IndicatorColor::Off
            ]
        );
    }

    #[test]
    fn test_one_heavy_action_per_iteration() {
        let camera = camera(MockCamera::new(500));
        let surface = RequestSurface::new();
        let overlays = Slot::new();
        let mut frame = frame();
        let mut lp = request_loop(&camera, &surface, &overlays, &mut frame, MemStorage::mounted());
        let time = SimTime::default();

        surface.request_countdown_capture();
        surface.request_capture();
        surface.request_mode_toggle();

        let first = lp.step(&mut time.clone(), &time);
        assert_eq!(first.toggled, Some(CaptureMode::Countdown));
        assert!(matches!(first.outcome, Some(Outcome::Saved(_))));
        let before = time.now();

        let second = lp.step(&mut time.clone(), &time);
        assert_eq!(second.toggled, None);
        assert!(matches!(second.outcome, Some(Outcome::Saved(_))));
        assert!(time.now() - before >= 3000);
        assert_eq!(surface.photo_count(), 2);
    }

    #[test]
    fn test_mode_toggle_feedback() {
        let camera = camera(MockCamera::new(500));
        let surface = RequestSurface::new();
        let overlays = Slot::new();
        let mut frame = frame();
        let mut lp = request_loop(&camera, &surface, &overlays, &mut frame, MemStorage::mounted());
        let time = SimTime::default();

        assert!(surface.press_mode_button(1000));
        let step = lp.step(&mut time.clone(), &time);

        assert_eq!(step.toggled, Some(CaptureMode::Countdown));
        assert_eq!(step.outcome, None);
        assert_eq!(surface.mode(), CaptureMode::Countdown);
        assert!(surface.press_capture_button(2000));
        assert!(surface.flags().take_countdown());
        assert_eq!(
            shown(lp),
            [IndicatorColor::Off, IndicatorColor::Blue, IndicatorColor::Off]
        );
    }

    #[test]
    fn test_unmounted_storage_fails_save() {
        let camera = camera(MockCamera::new(500));
        let surface = RequestSurface::new();
        let overlays = Slot::new();
        let mut frame = frame();
        let mut lp = request_loop(&camera, &surface, &overlays, &mut frame, MemStorage::default());
        let time = SimTime::default();

        assert!(!surface.snapshot().storage_available);
        surface.request_capture();
        assert_eq!(lp.step(&mut time.clone(), &time).outcome, Some(Outcome::SaveFailed));
    }

    /// Paints the whole 320x240 frame in 16-row strips of one color
    struct StripeDecoder {
        color: u16,
        fail: bool,
    }

    impl FrameDecoder for StripeDecoder {
        type Error = &'static str;

        fn decode(
            &mut self,
            _data: &[u8],
            sink: &mut dyn FnMut(&Block<'_>) -> bool,
        ) -> Result<(), Self::Error> {
            let strip = vec![self.color; 320 * 16];
            for y in (0..240).step_by(16) {
                let block = Block {
                    x: 0,
                    y,
                    width: 320,
                    height: 16,
                    pixels: &strip,
                };
                if !sink(&block) {
                    break;
                }
                if self.fail && y >= 64 {
                    return Err("truncated");
                }
            }
            Ok(())
        }
    }

    /// Counts overlays and badges drawn
    #[derive(Default)]
    struct CountingRenderer {
        drawn: Vec<Overlay>,
        badges: Vec<CaptureMode>,
    }

    impl OverlayRenderer for CountingRenderer {
        fn render<B, C>(
            &mut self,
            _display: &mut Display<B, C>,
            overlay: &Overlay,
        ) -> Result<(), Error<B>>
        where
            B: BusTransport,
            C: AsMut<[u8]>,
        {
            self.drawn.push(overlay.clone());
            Ok(())
        }

        fn render_mode_badge<B, C>(
            &mut self,
            _display: &mut Display<B, C>,
            mode: CaptureMode,
        ) -> Result<(), Error<B>>
        where
            B: BusTransport,
            C: AsMut<[u8]>,
        {
            self.badges.push(mode);
            Ok(())
        }
    }

    type Render<'a, O> = RenderLoop<
        'a,
        CriticalSectionRawMutex,
        MockCamera,
        MockBus,
        Vec<u8>,
        StripeDecoder,
        Vec<u8>,
        O,
    >;

    fn render_loop<'a, O: OverlayRenderer>(
        camera: &'a Camera,
        overlays: &'a Slot,
        frame: &'a mut CompressedFrame,
        decoder: StripeDecoder,
        renderer: O,
    ) -> Render<'a, O> {
        let display = test_display(Rotation::Rotate90, 16_384);
        let pixels = PixelBuffer::new(vec![0u8; 320 * 240 * 2], 320, 240).unwrap();
        RenderLoop::new(
            camera,
            overlays,
            display,
            decoder,
            pixels,
            frame,
            renderer,
            PipelineConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_render_streams_full_frame_in_chunks() {
        let camera = camera(MockCamera::new(500));
        let overlays = Slot::new();
        let mut frame = frame();
        let decoder = StripeDecoder {
            color: 0x07E0,
            fail: false,
        };
        let mut lp = render_loop(&camera, &overlays, &mut frame, decoder, NoOverlay);
        let time = SimTime::default();

        assert_eq!(lp.step(&mut time.clone(), &time).unwrap(), RenderOutcome::Displayed);

        let (bus, _) = lp.release().release();
        let sizes: Vec<usize> = bus.session_writes.iter().map(Vec::len).collect();
        let mut expected = vec![16_384; 9];
        expected.push(6_144);
        assert_eq!(sizes, expected);
        assert_eq!(bus.session_bytes().len(), 153_600);
        assert!(bus.session_bytes().chunks(2).all(|p| p == [0x07, 0xE0]));
        assert_eq!(bus.sessions_closed, 1);
    }

    #[test]
    fn test_render_skips_display_on_failure() {
        let mut sensor = MockCamera::new(500);
        sensor.done_after = None;
        let camera = camera(sensor);
        let overlays = Slot::new();
        let mut frame = frame();
        let decoder = StripeDecoder { color: 1, fail: false };
        let mut lp = render_loop(&camera, &overlays, &mut frame, decoder, NoOverlay);
        let time = SimTime::default();

        assert_eq!(lp.step(&mut time.clone(), &time).unwrap(), RenderOutcome::CaptureFailed);
        assert!(time.now() >= 1000 + 10);
        assert!(lp.release().release().0.session_writes.is_empty());

        let camera = self::camera(MockCamera::new(500));
        let mut frame = self::frame();
        let decoder = StripeDecoder { color: 1, fail: true };
        let mut lp = render_loop(&camera, &overlays, &mut frame, decoder, NoOverlay);
        assert_eq!(lp.step(&mut time.clone(), &time).unwrap(), RenderOutcome::DecodeFailed);
        assert!(lp.release().release().0.session_writes.is_empty());
    }

    #[test]
    fn test_render_draws_posted_overlay() {
        let camera = camera(MockCamera::new(500));
        let overlays = Slot::new();
        let mut frame = frame();
        let decoder = StripeDecoder { color: 1, fail: false };
        let renderer = CountingRenderer::default();
        let mut lp = render_loop(&camera, &overlays, &mut frame, decoder, renderer);
        let time = SimTime::default();

        lp.show_boot_screen(&mut time.clone()).unwrap();
        lp.step(&mut time.clone(), &time).unwrap();
        overlays.show(Overlay::Countdown(2));
        lp.step(&mut time.clone(), &time).unwrap();

        assert_eq!(lp.renderer.drawn, [Overlay::Boot, Overlay::Countdown(2)]);
    }

    #[test]
    fn test_mode_badge_follows_surface() {
        let camera = camera(MockCamera::new(500));
        let surface = RequestSurface::new();
        let overlays = Slot::new();
        let mut frame = frame();
        let decoder = StripeDecoder { color: 1, fail: false };
        let mut lp = render_loop(&camera, &overlays, &mut frame, decoder, CountingRenderer::default())
            .with_mode_badge(&surface);
        let time = SimTime::default();

        lp.step(&mut time.clone(), &time).unwrap();
        surface.set_mode(CaptureMode::Countdown);
        lp.step(&mut time.clone(), &time).unwrap();

        assert_eq!(lp.renderer.badges, [CaptureMode::Instant, CaptureMode::Countdown]);
        assert!(lp.renderer.drawn.is_empty());
    }

    #[test]
    fn test_mode_badge_skipped_without_frame() {
        let mut sensor = MockCamera::new(500);
        sensor.done_after = None;
        let camera = camera(sensor);
        let surface = RequestSurface::new();
        let overlays = Slot::new();
        let mut frame = frame();
        let decoder = StripeDecoder { color: 1, fail: false };
        let mut lp = render_loop(&camera, &overlays, &mut frame, decoder, CountingRenderer::default())
            .with_mode_badge(&surface);
        let time = SimTime::default();

        assert_eq!(lp.step(&mut time.clone(), &time).unwrap(), RenderOutcome::CaptureFailed);
        assert!(lp.renderer.badges.is_empty());
    }

    #[test]
    fn test_render_loop_rejects_mismatched_buffer() {
        let camera = camera(MockCamera::new(500));
        let overlays = Slot::new();
        let mut frame = frame();
        let pixels = PixelBuffer::new(vec![0u8; 240 * 320 * 2], 240, 320).unwrap();
        let result = RenderLoop::new(
            &camera,
            &overlays,
            test_display(Rotation::Rotate90, 64),
            StripeDecoder { color: 0, fail: false },
            pixels,
            &mut frame,
            NoOverlay,
            PipelineConfig::default(),
        );
        assert!(matches!(
            result,
            Err(BuilderError::InvalidDimensions {
                width: 240,
                height: 320
            })
        ));
    }

    /// Hands a claimed capture source back on its first call
    struct HandBack<'a> {
        camera: &'a Camera,
        held: Option<CaptureSource<MockCamera>>,
        waits: usize,
    }

    impl DelayNs for HandBack<'_> {
        fn delay_ns(&mut self, _ns: u32) {
            self.waits += 1;
            if let Some(source) = self.held.take() {
                self.camera.restore(source);
            }
        }
    }

    #[test]
    fn test_capture_waits_for_claimed_camera() {
        let camera = camera(MockCamera::new(500));
        let held = camera.try_claim();
        assert!(held.is_some());
        assert!(camera.try_claim().is_none());
        assert!(camera.is_available());

        let mut delay = HandBack {
            camera: &camera,
            held,
            waits: 0,
        };
        let mut frame = frame();
        let clock = SimTime::default();
        assert_eq!(camera.capture(&mut *frame, 1000, 1, &mut delay, &clock), Ok(500));
        assert!(delay.waits >= 1);
        assert_eq!(camera.release().unwrap().release().captures, 1);
    }

    /// On its first call, blocks until another thread got through a
    /// critical section
    struct Handshake {
        polling: mpsc::Sender<()>,
        entered: mpsc::Receiver<()>,
        acknowledged: Option<bool>,
    }

    impl DelayNs for Handshake {
        fn delay_ns(&mut self, _ns: u32) {
            if self.acknowledged.is_none() {
                let _ = self.polling.send(());
                let ack = self.entered.recv_timeout(Duration::from_secs(2));
                self.acknowledged = Some(ack.is_ok());
            }
        }
    }

    #[test]
    fn test_capture_polls_outside_critical_section() {
        let camera = camera(MockCamera::new(500));
        let (polling_tx, polling_rx) = mpsc::channel();
        let (entered_tx, entered_rx) = mpsc::channel();

        let (len, acknowledged) = std::thread::scope(|scope| {
            let capturing = scope.spawn(|| {
                let mut delay = Handshake {
                    polling: polling_tx,
                    entered: entered_rx,
                    acknowledged: None,
                };
                let mut frame = frame();
                let clock = SimTime::default();
                let len = camera.capture(&mut *frame, 1000, 1, &mut delay, &clock);
                (len, delay.acknowledged)
            });
            polling_rx.recv_timeout(Duration::from_secs(2)).unwrap();
            critical_section::with(|_| ());
            let _ = entered_tx.send(());
            capturing.join().unwrap()
        });

        assert_eq!(len, Ok(500));
        assert_eq!(acknowledged, Some(true));
    }

    /// Records the published status at every delay
    struct StatusWatch<'a> {
        surface: &'a RequestSurface,
        seen: Vec<SystemStatus>,
    }

    impl DelayNs for StatusWatch<'_> {
        fn delay_ns(&mut self, _ns: u32) {
            self.seen.push(self.surface.status());
        }
    }

    #[test]
    fn test_countdown_reports_capturing() {
        let camera = camera(MockCamera::new(500));
        let surface = RequestSurface::new();
        let overlays = Slot::new();
        let mut frame = frame();
        let mut lp = request_loop(&camera, &surface, &overlays, &mut frame, MemStorage::mounted());
        let clock = SimTime::default();
        let mut delay = StatusWatch {
            surface: &surface,
            seen: Vec::new(),
        };

        surface.request_countdown_capture();
        let step = lp.step(&mut delay, &clock);

        assert!(matches!(step.outcome, Some(Outcome::Saved(_))));
        assert!(delay.seen.len() >= 6);
        assert!(delay.seen[..6].iter().all(|s| *s == SystemStatus::Capturing));
        assert_eq!(surface.status(), SystemStatus::Idle);
    }

    #[test]
    fn test_loops_share_camera_across_threads() {
        let camera = camera(MockCamera::new(500));
        std::thread::scope(|scope| {
            for _ in 0..2 {
                scope.spawn(|| {
                    let mut frame = frame();
                    let time = SimTime::default();
                    for _ in 0..20 {
                        let len = camera.capture(&mut *frame, 1000, 1, &mut time.clone(), &time);
                        assert_eq!(len, Ok(500));
                    }
                });
            }
        });
        assert_eq!(camera.release().unwrap().release().captures, 40);
    }
}
