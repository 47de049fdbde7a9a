//! Current and thermal limiting
//!
//! Each protection produces a [`CommandLimit`], a pair of magnitudes the
//! command may not exceed in the forward and reverse direction. Limits
//! tighten by taking the minimum per direction, and a command is clamped
//! toward zero, never flipped.
//!
//! Trip state uses hysteresis latches so a temperature or current
//! hovering at the threshold does not toggle the limit every cycle.

use crate::profile::{MOTOR_MAX_CMD, TEMP_HYST, TEMP_TRIP};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Current latch release point as a fraction of the ceiling
pub const CURRENT_RELEASE_RATIO: f32 = 0.9;

/// Allowed command magnitude per direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CommandLimit {
    pub forward: i16,
    pub reverse: i16,
}

impl Default for CommandLimit {
    fn default() -> Self {
        Self::NONE
    }
}

impl CommandLimit {
    /// No restriction beyond the command range
    pub const NONE: Self = Self {
        forward: MOTOR_MAX_CMD,
        reverse: MOTOR_MAX_CMD,
    };

    pub fn new(forward: i16, reverse: i16) -> Self {
        Self {
            forward: forward.clamp(0, MOTOR_MAX_CMD),
            reverse: reverse.clamp(0, MOTOR_MAX_CMD),
        }
    }

    /// The tighter of two limits, per direction
    pub fn tighten(self, other: Self) -> Self {
        Self {
            forward: self.forward.min(other.forward),
            reverse: self.reverse.min(other.reverse),
        }
    }

    /// Clamp a command toward zero
    pub fn apply(self, cmd: i16) -> i16 {
        if cmd > 0 {
            cmd.min(self.forward)
        } else if cmd < 0 {
            cmd.max(-self.reverse)
        } else {
            0
        }
    }

    /// Signed limit in the direction of `cmd`
    pub fn toward(self, cmd: i16) -> i16 {
        if cmd < 0 {
            -self.reverse
        } else {
            self.forward
        }
    }

    pub fn is_restricting(self) -> bool {
        self != Self::NONE
    }
}

/// Which protections are active
///
/// The PTC monitor starts enabled. The current monitor starts disabled
/// until a ceiling is chosen for the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Monitors {
    pub ptc: bool,
    pub current: bool,
}

impl Default for Monitors {
    fn default() -> Self {
        Self {
            ptc: true,
            current: false,
        }
    }
}

/// Trip latch for a PTC temperature estimate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PtcLatch {
    tripped: bool,
}

impl PtcLatch {
    /// Feed a temperature; returns true if the latch changed state
    pub fn update(&mut self, temperature: f32) -> bool {
        let next = if self.tripped {
            temperature >= TEMP_TRIP - TEMP_HYST
        } else {
            temperature > TEMP_TRIP
        };
        let changed = next != self.tripped;
        self.tripped = next;
        changed
    }

    pub fn force(&mut self, tripped: bool) {
        self.tripped = tripped;
    }

    pub fn is_tripped(&self) -> bool {
        self.tripped
    }
}

/// Trip latch for filtered current against a ceiling
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CurrentLatch {
    tripped: bool,
}

impl CurrentLatch {
    /// Feed a current magnitude; returns true if the latch changed state
    pub fn update(&mut self, current: f32, ceiling: f32) -> bool {
        let current = current.abs();
        let next = if self.tripped {
            current >= ceiling * CURRENT_RELEASE_RATIO
        } else {
            current > ceiling
        };
        let changed = next != self.tripped;
        self.tripped = next;
        changed
    }

    pub fn clear(&mut self) {
        self.tripped = false;
    }

    pub fn is_tripped(&self) -> bool {
        self.tripped
    }
}

/// Current a thermally limited motor may draw (A)
///
/// A tripped motor is held to its own safe current. A tripped bank
/// shares its safe current among its active motors. When both apply the
/// lower wins; when neither does there is no thermal limit.
pub fn thermal_target(motor_safe: Option<f32>, bank_share: Option<f32>) -> Option<f32> {
    match (motor_safe, bank_share) {
        (Some(m), Some(b)) => Some(m.min(b)),
        (Some(m), None) => Some(m),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_clamps_toward_zero() {
        let limit = CommandLimit::new(40, 20);
        assert_eq!(limit.apply(127), 40);
        assert_eq!(limit.apply(30), 30);
        assert_eq!(limit.apply(-127), -20);
        assert_eq!(limit.apply(-5), -5);
        assert_eq!(limit.apply(0), 0);
    }

    #[test]
    fn test_tighten_is_per_direction() {
        let a = CommandLimit::new(40, 127);
        let b = CommandLimit::new(90, 10);
        assert_eq!(a.tighten(b), CommandLimit::new(40, 10));
        assert_eq!(CommandLimit::NONE.tighten(a), a);
    }

    #[test]
    fn test_toward_is_signed() {
        let limit = CommandLimit::new(40, 20);
        assert_eq!(limit.toward(100), 40);
        assert_eq!(limit.toward(-100), -20);
        assert!(limit.is_restricting());
        assert!(!CommandLimit::NONE.is_restricting());
    }

    #[test]
    fn test_ptc_latch_hysteresis() {
        let mut latch = PtcLatch::default();
        assert!(!latch.update(99.9));
        assert!(latch.update(100.1));
        assert!(latch.is_tripped());
        // Stays tripped inside the band
        assert!(!latch.update(95.0));
        assert!(!latch.update(90.0));
        assert!(latch.is_tripped());
        assert!(latch.update(89.9));
        assert!(!latch.is_tripped());
    }

    #[test]
    fn test_current_latch_hysteresis() {
        let mut latch = CurrentLatch::default();
        assert!(!latch.update(1.0, 1.0));
        assert!(latch.update(-1.2, 1.0));
        assert!(!latch.update(0.95, 1.0));
        assert!(latch.update(0.85, 1.0));
        assert!(!latch.is_tripped());
    }

    #[test]
    fn test_thermal_target() {
        assert_eq!(thermal_target(None, None), None);
        assert_eq!(thermal_target(Some(0.9), None), Some(0.9));
        assert_eq!(thermal_target(Some(0.9), Some(0.6)), Some(0.6));
        assert_eq!(thermal_target(None, Some(1.5)), Some(1.5));
    }
}
