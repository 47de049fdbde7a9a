//! Slew-rate limiting
//!
//! The applied output walks toward the requested command by at most
//! `rate` command units per slew tick. The slew task runs on its own
//! period, so the ramp time does not depend on the control cycle.

use crate::profile::{DEFAULT_SLEW_RATE, MOTOR_DEADBAND, MOTOR_MAX_CMD};

/// Period of the slew task (ms)
pub const SLEW_PERIOD_MS: u64 = 15;

/// Snap small requests to zero
pub fn apply_deadband(cmd: i16, deadband: i16) -> i16 {
    if cmd.abs() < deadband {
        0
    } else {
        cmd
    }
}

/// One slew step from `previous` toward `target`
pub fn slew_step(previous: i16, target: i16, rate: i16) -> i16 {
    let delta = target.saturating_sub(previous).clamp(-rate, rate);
    previous.saturating_add(delta)
}

/// Per-motor slew state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SlewLimiter {
    output: i16,
    rate: i16,
    deadband: i16,
}

impl Default for SlewLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_SLEW_RATE, MOTOR_DEADBAND)
    }
}

impl SlewLimiter {
    pub fn new(rate: i16, deadband: i16) -> Self {
        Self {
            output: 0,
            rate: rate.max(1),
            deadband: deadband.clamp(0, MOTOR_MAX_CMD),
        }
    }

    /// Advance one tick toward `request`, returning the new output
    pub fn step(&mut self, request: i16) -> i16 {
        let target = apply_deadband(request, self.deadband);
        self.output = slew_step(self.output, target, self.rate);
        self.output
    }

    /// Set the output directly, skipping the ramp
    pub fn jump(&mut self, value: i16) {
        self.output = apply_deadband(value, self.deadband);
    }

    pub fn output(&self) -> i16 {
        self.output
    }

    pub fn rate(&self) -> i16 {
        self.rate
    }

    /// Callers validate that `rate` is positive
    pub fn set_rate(&mut self, rate: i16) {
        self.rate = rate.max(1);
    }

    pub fn deadband(&self) -> i16 {
        self.deadband
    }

    pub fn set_deadband(&mut self, deadband: i16) {
        self.deadband = deadband.clamp(0, MOTOR_MAX_CMD);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::FAST_SLEW_RATE;

    #[test]
    fn test_step_toward_target() {
        assert_eq!(slew_step(0, 127, 10), 10);
        assert_eq!(slew_step(120, 127, 10), 127);
        assert_eq!(slew_step(0, -127, 10), -10);
        assert_eq!(slew_step(50, 50, 10), 50);
    }

    #[test]
    fn test_ramp_takes_ceil_ticks() {
        let mut slew = SlewLimiter::new(10, MOTOR_DEADBAND);
        let mut ticks = 0;
        while slew.output() != 127 {
            let before = slew.output();
            let after = slew.step(127);
            assert!((after - before).abs() <= 10);
            ticks += 1;
        }
        assert_eq!(ticks, 13);
    }

    #[test]
    fn test_fast_rate_is_immediate() {
        let mut slew = SlewLimiter::new(FAST_SLEW_RATE, MOTOR_DEADBAND);
        assert_eq!(slew.step(-127), -127);
        assert_eq!(slew.step(127), 127);
    }

    #[test]
    fn test_deadband_snaps_to_zero() {
        let mut slew = SlewLimiter::new(FAST_SLEW_RATE, MOTOR_DEADBAND);
        assert_eq!(slew.step(9), 0);
        assert_eq!(slew.step(-9), 0);
        assert_eq!(slew.step(10), 10);
    }

    #[test]
    fn test_jump_skips_ramp() {
        let mut slew = SlewLimiter::default();
        slew.step(127);
        slew.jump(0);
        assert_eq!(slew.output(), 0);
    }
}
