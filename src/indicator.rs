//! Status indicator
//!
//! The pipeline reports its phase on an [`Indicator`]. Writes are
//! fire-and-forget: a failing LED must never stop a capture.

use embedded_hal::pwm::SetDutyCycle;

use crate::color::IndicatorColor;

/// Sink for indicator colors
pub trait Indicator {
    /// Show `color`
    fn set_indicator(&mut self, color: IndicatorColor);
}

/// Indicator that shows nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoIndicator;

impl Indicator for NoIndicator {
    fn set_indicator(&mut self, _color: IndicatorColor) {}
}

/// Three-channel RGB LED on PWM outputs
pub struct RgbLed<R, G, B> {
    red: R,
    green: G,
    blue: B,
    current: IndicatorColor,
}

impl<R, G, B> RgbLed<R, G, B>
where
    R: SetDutyCycle,
    G: SetDutyCycle,
    B: SetDutyCycle,
{
    /// Wrap three channels and switch them off
    pub fn new(red: R, green: G, blue: B) -> Self {
        let mut led = Self {
            red,
            green,
            blue,
            current: IndicatorColor::White,
        };
        led.set_indicator(IndicatorColor::Off);
        led
    }

    /// Last color shown
    pub fn current(&self) -> IndicatorColor {
        self.current
    }

    /// Release the channels
    pub fn release(self) -> (R, G, B) {
        (self.red, self.green, self.blue)
    }
}

fn drive<P: SetDutyCycle>(channel: &mut P, on: bool) {
    let _ = if on {
        channel.set_duty_cycle_fully_on()
    } else {
        channel.set_duty_cycle_fully_off()
    };
}

impl<R, G, B> Indicator for RgbLed<R, G, B>
where
    R: SetDutyCycle,
    G: SetDutyCycle,
    B: SetDutyCycle,
{
    fn set_indicator(&mut self, color: IndicatorColor) {
        let (r, g, b) = color.channels();
        drive(&mut self.red, r);
        drive(&mut self.green, g);
        drive(&mut self.blue, b);
        self.current = color;
    }
}
