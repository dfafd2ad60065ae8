//! Graphics support via embedded-graphics
//!
//! [`Display`] implements [`DrawTarget`] with `Rgb565` pixels, so any
//! embedded-graphics primitive can be drawn straight onto the panel. There is
//! no frame buffer on the driver side:
//!
//! - `fill_solid` goes through [`Display::write_solid_fill`]
//! - `fill_contiguous` streams through the transfer chunk in one bulk session
//! - `draw_iter` falls back to one 1x1 window per pixel
//!
//! [`TextOverlay`] builds the preview overlays (countdown, errors, save
//! confirmation, mode banner, boot screen) on top of that.
//!
//! ## Example
//!
//! ```rust,no_run
//! use embedded_graphics::{
//!     pixelcolor::Rgb565,
//!     prelude::*,
//!     primitives::{PrimitiveStyle, Rectangle},
//! };
//! use camview::{Color, Display};
//! # use camview::{Builder, Dimensions, interface::BusTransport};
//! # use embedded_hal::delay::DelayNs;
//! # struct Bus;
//! # impl BusTransport for Bus {
//! #     type Error = ();
//! #     fn write_command(&mut self, _: u8) -> Result<(), ()> { Ok(()) }
//! #     fn write_byte(&mut self, _: u8) -> Result<(), ()> { Ok(()) }
//! #     fn write_bulk(&mut self, _: &[u8]) -> Result<(), ()> { Ok(()) }
//! #     fn begin_bulk_session(&mut self) -> Result<(), ()> { Ok(()) }
//! #     fn write_bulk_session_data(&mut self, _: &[u8]) -> Result<(), ()> { Ok(()) }
//! #     fn end_bulk_session(&mut self) -> Result<(), ()> { Ok(()) }
//! #     fn is_bulk_active(&self) -> bool { false }
//! #     fn reset<D: DelayNs>(&mut self, _: &mut D) {}
//! # }
//! # struct NoDelay;
//! # impl DelayNs for NoDelay { fn delay_ns(&mut self, _: u32) {} }
//! # let Ok(dims) = Dimensions::new(240, 320) else { return };
//! # let Ok(config) = Builder::new().dimensions(dims).build() else { return };
//! let mut display = Display::new(Bus, config, [0u8; 512]);
//! let _ = display.initialize(&mut NoDelay);
//!
//! let _ = Rectangle::new(Point::new(10, 10), Size::new(50, 20))
//!     .into_styled(PrimitiveStyle::with_fill(Rgb565::RED))
//!     .draw(&mut display);
//! let _ = display.draw_text(10, 40, "Hello", Color::WHITE, Color::BLACK);
//! ```

use core::fmt::Write;

use embedded_graphics::Drawable;
use embedded_graphics::mono_font::MonoTextStyleBuilder;
use embedded_graphics::mono_font::ascii::FONT_10X20;
use embedded_graphics::text::{Baseline, Text};
use embedded_graphics_core::Pixel;
use embedded_graphics_core::draw_target::DrawTarget;
use embedded_graphics_core::geometry::{Dimensions as _, OriginDimensions, Point, Size};
use embedded_graphics_core::pixelcolor::Rgb565;
use embedded_graphics_core::primitives::{PointsIter, Rectangle};
use heapless::String;

use crate::color::Color;
use crate::display::{AddressWindow, Display};
use crate::error::Error;
use crate::interface::BusTransport;
use crate::overlay::{Overlay, OverlayRenderer};
use crate::request::CaptureMode;

type GraphicsResult<B> = core::result::Result<(), Error<B>>;

/// Glyph width of the overlay font
pub const GLYPH_WIDTH: u16 = 10;

/// Glyph height of the overlay font
pub const GLYPH_HEIGHT: u16 = 20;

/// Mode badge width: nine glyphs plus padding
const BADGE_WIDTH: u16 = 9 * GLYPH_WIDTH + 10;

fn window_for(area: &Rectangle) -> Option<AddressWindow> {
    AddressWindow::from_size(
        u16::try_from(area.top_left.x).ok()?,
        u16::try_from(area.top_left.y).ok()?,
        u16::try_from(area.size.width).ok()?,
        u16::try_from(area.size.height).ok()?,
    )
}

impl<B, C> Display<B, C>
where
    B: BusTransport,
    C: AsMut<[u8]>,
{
    /// Draw `text` with its top-left corner at (`x`, `y`)
    ///
    /// Uses a 10x20 monospace font with an opaque background; glyphs running
    /// off the display are clipped.
    pub fn draw_text(&mut self, x: u16, y: u16, text: &str, fg: Color, bg: Color) -> GraphicsResult<B> {
        let style = MonoTextStyleBuilder::new()
            .font(&FONT_10X20)
            .text_color(Rgb565::from(fg))
            .background_color(Rgb565::from(bg))
            .build();
        Text::with_baseline(
            text,
            Point::new(i32::from(x), i32::from(y)),
            style,
            Baseline::Top,
        )
        .draw(self)?;
        Ok(())
    }
}

impl<B, C> DrawTarget for Display<B, C>
where
    B: BusTransport,
    C: AsMut<[u8]>,
{
    type Color = Rgb565;
    type Error = Error<B>;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let size = self.size();

        for Pixel(Point { x, y }, color) in pixels {
            if x < 0 || y < 0 {
                continue;
            }
            let (x, y) = (x as u32, y as u32);
            if x >= size.width || y >= size.height {
                continue;
            }
            self.set_pixel(x as u16, y as u16, color.into())?;
        }

        Ok(())
    }

    fn fill_contiguous<I>(&mut self, area: &Rectangle, colors: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Self::Color>,
    {
        let visible = area.intersection(&self.bounding_box());
        if visible != *area {
            return self.draw_iter(
                area.points()
                    .zip(colors)
                    .map(|(point, color)| Pixel(point, color)),
            );
        }
        match window_for(area) {
            Some(window) => self.write_pixels(window, colors.into_iter().map(Color::from)),
            None => Ok(()),
        }
    }

    fn fill_solid(&mut self, area: &Rectangle, color: Self::Color) -> Result<(), Self::Error> {
        let visible = area.intersection(&self.bounding_box());
        match window_for(&visible) {
            Some(window) => self.write_solid_fill(window, color.into()),
            None => Ok(()),
        }
    }
}

impl<B, C> OriginDimensions for Display<B, C>
where
    B: BusTransport,
    C: AsMut<[u8]>,
{
    fn size(&self) -> Size {
        let dims = self.dimensions();
        Size::new(u32::from(dims.width), u32::from(dims.height))
    }
}

/// Overlay renderer using the built-in font
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextOverlay {
    /// Title on the boot screen
    pub title: &'static str,
}

impl TextOverlay {
    /// Renderer with the given boot title
    pub const fn new(title: &'static str) -> Self {
        Self { title }
    }
}

impl Default for TextOverlay {
    fn default() -> Self {
        Self::new("camview")
    }
}

impl OverlayRenderer for TextOverlay {
    fn render<B, C>(&mut self, display: &mut Display<B, C>, overlay: &Overlay) -> Result<(), Error<B>>
    where
        B: BusTransport,
        C: AsMut<[u8]>,
    {
        let dims = display.dimensions();
        let (w, h) = (dims.width, dims.height);
        let mid = h / 2;

        match overlay {
            Overlay::Boot => {
                display.clear(Color::TEAL)?;
                display.draw_text(10, mid.saturating_sub(30), self.title, Color::WHITE, Color::TEAL)?;
                display.draw_text(10, mid, "Initializing...", Color::WHITE, Color::TEAL)
            }
            Overlay::Countdown(seconds) => {
                let mut digits: String<4> = String::new();
                // u8 always fits in four characters
                let _ = write!(digits, "{seconds}");
                let text_width = GLYPH_WIDTH * digits.len() as u16;
                let cx = w / 2;
                display.draw_filled_rect(
                    cx.saturating_sub(30),
                    mid.saturating_sub(30),
                    cx + 30,
                    mid + 30,
                    Color::NAVY,
                )?;
                display.draw_text(
                    cx.saturating_sub(text_width / 2),
                    mid.saturating_sub(GLYPH_HEIGHT / 2),
                    &digits,
                    Color::WHITE,
                    Color::NAVY,
                )
            }
            Overlay::Error(message) => {
                display.draw_filled_rect(0, mid.saturating_sub(15), w - 1, mid + 15, Color::RED)?;
                display.draw_text(10, mid.saturating_sub(10), message, Color::WHITE, Color::RED)
            }
            Overlay::Saved(name) => {
                let top = h.saturating_sub(2 * GLYPH_HEIGHT);
                display.draw_filled_rect(0, top, w - 1, h - 1, Color::BLACK)?;
                display.draw_text(5, top, "Saved!", Color::GREEN, Color::BLACK)?;
                display.draw_text(5, top + GLYPH_HEIGHT, name, Color::WHITE, Color::BLACK)
            }
            Overlay::Mode(mode) => {
                display.draw_filled_rect(0, 0, w - 1, GLYPH_HEIGHT + 9, Color::BLUE)?;
                display.draw_text(10, 5, mode.as_str(), Color::WHITE, Color::BLUE)
            }
        }
    }

    fn render_mode_badge<B, C>(
        &mut self,
        display: &mut Display<B, C>,
        mode: CaptureMode,
    ) -> Result<(), Error<B>>
    where
        B: BusTransport,
        C: AsMut<[u8]>,
    {
        // Top-right corner, wide enough for "COUNTDOWN"
        let w = display.dimensions().width;
        let left = w.saturating_sub(BADGE_WIDTH + 5);
        display.draw_filled_rect(left, 5, w.saturating_sub(6), 8 + GLYPH_HEIGHT, Color::BLUE)?;
        display.draw_text(left + 5, 7, mode.as_str(), Color::WHITE, Color::BLUE)
    }
}
