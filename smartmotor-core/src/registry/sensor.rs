//! Sensor table entries
//!
//! Sensors are owned by the registry. Motors refer to them by
//! [`SensorId`] when they use one for speed feedback.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Quadrature encoder counts per revolution
pub const QUAD_TICKS_PER_REV: f32 = 360.0;
/// Potentiometer counts per revolution
pub const POT_TICKS_PER_REV: f32 = 6000.0;

/// Index into the registry's sensor table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorId(pub u8);

/// Sensor types the registry knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SensorKind {
    QuadEncoder,
    /// Integrated motor encoder read outside the bank link
    Ime,
    SonarCm,
    SonarInch,
    Potentiometer,
    DigitalIn,
    DigitalOut,
}

impl SensorKind {
    /// Whether the sensor counts shaft rotation
    pub fn provides_speed(self) -> bool {
        matches!(
            self,
            SensorKind::QuadEncoder | SensorKind::Ime | SensorKind::Potentiometer
        )
    }

    /// Counts per revolution when none is configured
    pub fn default_ticks_per_rev(self) -> Option<f32> {
        match self {
            SensorKind::QuadEncoder => Some(QUAD_TICKS_PER_REV),
            SensorKind::Potentiometer => Some(POT_TICKS_PER_REV),
            _ => None,
        }
    }
}

/// Static description of one sensor
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SensorDescriptor {
    pub kind: SensorKind,
    /// Digital or analog channel on the Cortex
    pub channel: u8,
    /// Counts per revolution of the shaft the sensor is on
    pub ticks_per_rev: f32,
    /// Counts decrease for forward rotation
    pub reversed: bool,
}

impl SensorDescriptor {
    /// Descriptor with the default calibration for its kind
    pub fn new(kind: SensorKind, channel: u8) -> Self {
        Self {
            kind,
            channel,
            ticks_per_rev: kind.default_ticks_per_rev().unwrap_or(0.0),
            reversed: false,
        }
    }

    /// Signed counts per revolution, negative when reversed
    pub fn signed_ticks_per_rev(&self) -> f32 {
        if self.reversed {
            -self.ticks_per_rev
        } else {
            self.ticks_per_rev
        }
    }
}

/// A registered sensor and its latest value
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Sensor {
    pub descriptor: SensorDescriptor,
    pub value: i32,
}

impl Sensor {
    pub fn new(descriptor: SensorDescriptor) -> Self {
        Self {
            descriptor,
            value: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speed_capable_kinds() {
        assert!(SensorKind::QuadEncoder.provides_speed());
        assert!(SensorKind::Potentiometer.provides_speed());
        assert!(!SensorKind::SonarCm.provides_speed());
        assert!(!SensorKind::DigitalOut.provides_speed());
    }

    #[test]
    fn test_default_calibration() {
        let enc = SensorDescriptor::new(SensorKind::QuadEncoder, 1);
        assert_eq!(enc.ticks_per_rev, 360.0);
        let sonar = SensorDescriptor::new(SensorKind::SonarInch, 3);
        assert_eq!(sonar.ticks_per_rev, 0.0);
    }

    #[test]
    fn test_reversed_sign() {
        let mut pot = SensorDescriptor::new(SensorKind::Potentiometer, 0);
        pot.reversed = true;
        assert_eq!(pot.signed_ticks_per_rev(), -6000.0);
    }
}
