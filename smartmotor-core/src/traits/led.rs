//! Status indicator trait

/// An operator-facing status LED
///
/// The registry only decides whether an LED should be lit; drivers
/// implement this for the actual pin and its polarity.
pub trait StatusLed {
    /// Light or clear the LED
    fn set(&mut self, on: bool);

    /// Check whether the LED is lit
    fn is_on(&self) -> bool;
}
