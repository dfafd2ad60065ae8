//! Request and status surface
//!
//! Everything here is shared between interrupt handlers, the request loop
//! and the render loop, so it is built from atomics only and every method
//! takes `&self`. Place one [`RequestSurface`] in a `static`:
//!
//! ```
//! use camview::{RequestSurface, SystemStatus};
//!
//! static SURFACE: RequestSurface = RequestSurface::new();
//!
//! SURFACE.request_capture();
//! SURFACE.request_capture();
//! assert!(SURFACE.flags().take_capture());
//! assert!(!SURFACE.flags().take_capture());
//! assert_eq!(SURFACE.status(), SystemStatus::Idle);
//! ```

use core::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};

use crate::color::IndicatorColor;

/// Default debounce window for physical buttons
pub const DEBOUNCE_MS: u32 = 200;

/// Test-and-clear request flags
///
/// Setting a flag twice before the consumer looks at it delivers one request.
#[derive(Debug, Default)]
pub struct RequestFlags {
    capture: AtomicBool,
    countdown: AtomicBool,
    mode_toggle: AtomicBool,
}

impl RequestFlags {
    /// All flags clear
    pub const fn new() -> Self {
        Self {
            capture: AtomicBool::new(false),
            countdown: AtomicBool::new(false),
            mode_toggle: AtomicBool::new(false),
        }
    }

    /// Raise the immediate-capture flag
    pub fn set_capture(&self) {
        self.capture.store(true, Ordering::Release);
    }

    /// Raise the countdown-capture flag
    pub fn set_countdown(&self) {
        self.countdown.store(true, Ordering::Release);
    }

    /// Raise the mode-toggle flag
    pub fn set_mode_toggle(&self) {
        self.mode_toggle.store(true, Ordering::Release);
    }

    /// Read and clear the immediate-capture flag
    pub fn take_capture(&self) -> bool {
        self.capture.swap(false, Ordering::AcqRel)
    }

    /// Read and clear the countdown-capture flag
    pub fn take_countdown(&self) -> bool {
        self.countdown.swap(false, Ordering::AcqRel)
    }

    /// Read and clear the mode-toggle flag
    pub fn take_mode_toggle(&self) -> bool {
        self.mode_toggle.swap(false, Ordering::AcqRel)
    }
}

/// Coarse phase of the system
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum SystemStatus {
    /// Waiting for a request
    Idle = 0,
    /// Capturing a still
    Capturing = 1,
    /// Writing a still to storage
    Saving = 2,
    /// Preview running with no request in flight
    Streaming = 3,
    /// Showing a failure
    Error = 4,
}

impl SystemStatus {
    const fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Capturing,
            2 => Self::Saving,
            3 => Self::Streaming,
            4 => Self::Error,
            _ => Self::Idle,
        }
    }

    /// Human-readable label
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Capturing => "Capturing",
            Self::Saving => "Saving",
            Self::Streaming => "Streaming",
            Self::Error => "Error",
        }
    }

    /// Indicator color mirroring this status
    pub const fn indicator_color(self) -> IndicatorColor {
        match self {
            Self::Idle => IndicatorColor::Off,
            Self::Capturing => IndicatorColor::Red,
            Self::Saving => IndicatorColor::Yellow,
            Self::Streaming => IndicatorColor::Cyan,
            Self::Error => IndicatorColor::Magenta,
        }
    }
}

/// What the capture button does
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum CaptureMode {
    /// Capture immediately
    #[default]
    Instant = 0,
    /// Count down, then capture
    Countdown = 1,
}

impl CaptureMode {
    const fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Countdown,
            _ => Self::Instant,
        }
    }

    /// The other mode
    pub const fn toggled(self) -> Self {
        match self {
            Self::Instant => Self::Countdown,
            Self::Countdown => Self::Instant,
        }
    }

    /// Banner label
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Instant => "INSTANT",
            Self::Countdown => "COUNTDOWN",
        }
    }
}

/// Lock-free button debouncer
///
/// Accepts a press only if more than the window has passed since the last
/// accepted press. Safe to call from an interrupt handler.
#[derive(Debug)]
pub struct Debounce {
    last_ms: AtomicU32,
    window_ms: u32,
}

impl Debounce {
    /// Debouncer with the given window
    pub const fn new(window_ms: u32) -> Self {
        Self {
            last_ms: AtomicU32::new(0),
            window_ms,
        }
    }

    /// Whether a press at `now_ms` counts
    pub fn accept(&self, now_ms: u32) -> bool {
        let last = self.last_ms.load(Ordering::Acquire);
        if now_ms.wrapping_sub(last) <= self.window_ms {
            return false;
        }
        self.last_ms
            .compare_exchange(last, now_ms, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl Default for Debounce {
    fn default() -> Self {
        Self::new(DEBOUNCE_MS)
    }
}

/// Point-in-time view of the system for status queries
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatusSnapshot {
    /// Current phase
    pub status: SystemStatus,
    /// Current capture mode
    pub mode: CaptureMode,
    /// Photos saved so far
    pub photo_count: u32,
    /// Storage mounted and usable
    pub storage_available: bool,
    /// Camera identified and configured
    pub camera_available: bool,
}

/// Cross-context request and status surface
#[derive(Debug)]
pub struct RequestSurface {
    flags: RequestFlags,
    status: AtomicU8,
    mode: AtomicU8,
    photo_count: AtomicU32,
    storage_available: AtomicBool,
    camera_available: AtomicBool,
    capture_button: Debounce,
    mode_button: Debounce,
}

impl RequestSurface {
    /// Idle, instant mode, nothing available yet
    pub const fn new() -> Self {
        Self {
            flags: RequestFlags::new(),
            status: AtomicU8::new(SystemStatus::Idle as u8),
            mode: AtomicU8::new(CaptureMode::Instant as u8),
            photo_count: AtomicU32::new(0),
            storage_available: AtomicBool::new(false),
            camera_available: AtomicBool::new(false),
            capture_button: Debounce::new(DEBOUNCE_MS),
            mode_button: Debounce::new(DEBOUNCE_MS),
        }
    }

    /// Request flags, for the consumer side
    pub fn flags(&self) -> &RequestFlags {
        &self.flags
    }

    /// Ask for an immediate capture
    pub fn request_capture(&self) {
        self.flags.set_capture();
    }

    /// Ask for a countdown capture
    pub fn request_countdown_capture(&self) {
        self.flags.set_countdown();
    }

    /// Ask for the capture mode to flip
    pub fn request_mode_toggle(&self) {
        self.flags.set_mode_toggle();
    }

    /// Capture button edge at `now_ms`
    ///
    /// Debounced; raises the flag matching the current mode. Returns whether
    /// the press was accepted.
    pub fn press_capture_button(&self, now_ms: u32) -> bool {
        if !self.capture_button.accept(now_ms) {
            return false;
        }
        match self.mode() {
            CaptureMode::Instant => self.request_capture(),
            CaptureMode::Countdown => self.request_countdown_capture(),
        }
        true
    }

    /// Mode button edge at `now_ms`, debounced
    pub fn press_mode_button(&self, now_ms: u32) -> bool {
        if !self.mode_button.accept(now_ms) {
            return false;
        }
        self.request_mode_toggle();
        true
    }

    /// Current phase
    pub fn status(&self) -> SystemStatus {
        SystemStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    /// Current phase as a label
    pub fn status_label(&self) -> &'static str {
        self.status().as_str()
    }

    /// Current capture mode
    pub fn mode(&self) -> CaptureMode {
        CaptureMode::from_u8(self.mode.load(Ordering::Acquire))
    }

    /// Photos saved so far
    pub fn photo_count(&self) -> u32 {
        self.photo_count.load(Ordering::Acquire)
    }

    /// Snapshot of everything a status query reports
    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            status: self.status(),
            mode: self.mode(),
            photo_count: self.photo_count(),
            storage_available: self.storage_available.load(Ordering::Acquire),
            camera_available: self.camera_available.load(Ordering::Acquire),
        }
    }

    pub(crate) fn set_status(&self, status: SystemStatus) {
        self.status.store(status as u8, Ordering::Release);
    }

    pub(crate) fn set_mode(&self, mode: CaptureMode) {
        self.mode.store(mode as u8, Ordering::Release);
    }

    pub(crate) fn set_photo_count(&self, count: u32) {
        self.photo_count.store(count, Ordering::Release);
    }

    pub(crate) fn set_storage_available(&self, available: bool) {
        self.storage_available.store(available, Ordering::Release);
    }

    pub(crate) fn set_camera_available(&self, available: bool) {
        self.camera_available.store(available, Ordering::Release);
    }
}

impl Default for RequestSurface {
    fn default() -> Self {
        Self::new()
    }
}
