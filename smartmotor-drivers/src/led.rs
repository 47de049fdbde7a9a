//! GPIO status LED
//!
//! Lights while a motor or bank is limited. Most boards sink the LED
//! current, so active-low wiring is the common case.

use embedded_hal::digital::OutputPin;
use smartmotor_core::traits::StatusLed;

/// Status LED on a GPIO pin
pub struct GpioStatusLed<P> {
    pin: P,
    /// If true, LED on = pin low
    inverted: bool,
    on: bool,
}

impl<P: OutputPin> GpioStatusLed<P> {
    /// Wrap a pin, starting with the LED off
    pub fn new(pin: P, inverted: bool) -> Self {
        let mut led = Self {
            pin,
            inverted,
            on: true,
        };
        led.set(false);
        led
    }

    pub fn new_active_high(pin: P) -> Self {
        Self::new(pin, false)
    }

    pub fn new_active_low(pin: P) -> Self {
        Self::new(pin, true)
    }

    pub fn release(self) -> P {
        self.pin
    }
}

impl<P: OutputPin> StatusLed for GpioStatusLed<P> {
    fn set(&mut self, on: bool) {
        if on == self.on {
            return;
        }
        self.on = on;
        // Pin errors are ignored
        let _ = if on != self.inverted {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
    }

    fn is_on(&self) -> bool {
        self.on
    }
}
