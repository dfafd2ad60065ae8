//! Overlay mailbox
//!
//! The request loop never touches the display bus. It posts an [`Overlay`]
//! into an [`OverlaySlot`] and the render loop draws whatever is posted on
//! top of each preview frame through an [`OverlayRenderer`].

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::display::Display;
use crate::error::Error;
use crate::interface::BusTransport;
use crate::request::CaptureMode;
use crate::storage::PhotoName;

/// Something drawn over the live preview
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Overlay {
    /// Start-up title screen
    Boot,
    /// Seconds left before a countdown capture
    Countdown(u8),
    /// Short error message
    Error(&'static str),
    /// Photo saved under this name
    Saved(PhotoName),
    /// Capture mode just changed
    Mode(CaptureMode),
}

/// Single-entry overlay mailbox shared between the two loops
///
/// Posting replaces whatever was there.
pub struct OverlaySlot<R: RawMutex> {
    current: Mutex<R, RefCell<Option<Overlay>>>,
}

impl<R: RawMutex> OverlaySlot<R> {
    /// Empty slot, usable in a `static`
    pub const fn new() -> Self {
        Self {
            current: Mutex::new(RefCell::new(None)),
        }
    }

    /// Post `overlay`
    pub fn show(&self, overlay: Overlay) {
        self.current.lock(|cell| *cell.borrow_mut() = Some(overlay));
    }

    /// Remove the posted overlay
    pub fn clear(&self) {
        self.current.lock(|cell| *cell.borrow_mut() = None);
    }

    /// Copy of the posted overlay
    pub fn current(&self) -> Option<Overlay> {
        self.current.lock(|cell| cell.borrow().clone())
    }
}

impl<R: RawMutex> Default for OverlaySlot<R> {
    fn default() -> Self {
        Self::new()
    }
}

/// Draws overlays on the display
pub trait OverlayRenderer {
    /// Draw `overlay` on `display`
    fn render<B, C>(&mut self, display: &mut Display<B, C>, overlay: &Overlay) -> Result<(), Error<B>>
    where
        B: BusTransport,
        C: AsMut<[u8]>;

    /// Draw the capture mode badge over a fresh preview frame
    fn render_mode_badge<B, C>(
        &mut self,
        _display: &mut Display<B, C>,
        _mode: CaptureMode,
    ) -> Result<(), Error<B>>
    where
        B: BusTransport,
        C: AsMut<[u8]>,
    {
        Ok(())
    }
}

/// Renderer that draws nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOverlay;

impl OverlayRenderer for NoOverlay {
    fn render<B, C>(&mut self, _display: &mut Display<B, C>, _overlay: &Overlay) -> Result<(), Error<B>>
    where
        B: BusTransport,
        C: AsMut<[u8]>,
    {
        Ok(())
    }
}
