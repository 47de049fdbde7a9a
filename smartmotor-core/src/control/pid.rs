//! PID speed controller
//!
//! Discrete PID without a time term: the controller is evaluated once per
//! control cycle and the gains absorb the period. The integral is clamped
//! so that its contribution never exceeds [`INTEGRAL_DRIVE_MAX`] of full
//! drive, and the total drive is clamped to ±1 before scaling to command
//! units.

use micromath::F32Ext;

use crate::error::SmartMotorError;
use crate::profile::MOTOR_MAX_CMD;

/// Largest share of full drive the integral term may contribute
pub const INTEGRAL_DRIVE_MAX: f32 = 0.25;

/// Errors smaller than this (rpm) are treated as zero
pub const DEFAULT_ERROR_THRESHOLD: f32 = 10.0;

// Drive linearization curve
const LUT_FACTOR: f32 = 20.0;
const LUT_OFFSET: i16 = 10;

/// PID gains
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PidGains {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
    /// Constant drive added to the output (feed-forward)
    pub kbias: f32,
}

impl PidGains {
    pub const fn new(kp: f32, ki: f32, kd: f32) -> Self {
        Self {
            kp,
            ki,
            kd,
            kbias: 0.0,
        }
    }

    pub const fn with_bias(self, kbias: f32) -> Self {
        Self { kbias, ..self }
    }

    /// Gains must be finite and non-negative; the bias only finite
    pub fn validate(&self) -> Result<(), SmartMotorError> {
        let gains_ok = [self.kp, self.ki, self.kd]
            .iter()
            .all(|g| g.is_finite() && *g >= 0.0);
        if gains_ok && self.kbias.is_finite() {
            Ok(())
        } else {
            Err(SmartMotorError::InvalidArgument)
        }
    }
}

/// Closed-loop speed controller for one motor
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpeedPid {
    gains: PidGains,
    target: f32,
    error_threshold: f32,
    integral_limit: f32,
    linearize: bool,
    enabled: bool,

    error: f32,
    last_error: f32,
    integral: f32,
    derivative: f32,
    drive: f32,
    drive_cmd: i16,
}

impl SpeedPid {
    pub fn new(gains: PidGains) -> Result<Self, SmartMotorError> {
        gains.validate()?;
        Ok(Self {
            gains,
            target: 0.0,
            error_threshold: DEFAULT_ERROR_THRESHOLD,
            integral_limit: integral_limit(gains.ki),
            linearize: false,
            enabled: true,
            error: 0.0,
            last_error: 0.0,
            integral: 0.0,
            derivative: 0.0,
            drive: 0.0,
            drive_cmd: 0,
        })
    }

    /// Replace the gains, keeping the target
    pub fn set_gains(&mut self, gains: PidGains) -> Result<(), SmartMotorError> {
        gains.validate()?;
        self.gains = gains;
        self.integral_limit = integral_limit(gains.ki);
        self.integral = self.integral.clamp(-self.integral_limit, self.integral_limit);
        Ok(())
    }

    pub fn gains(&self) -> &PidGains {
        &self.gains
    }

    /// Target speed (rpm)
    pub fn set_target(&mut self, rpm: f32) {
        self.target = rpm;
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    pub fn set_error_threshold(&mut self, threshold: f32) {
        self.error_threshold = threshold.abs();
    }

    pub fn error_threshold(&self) -> f32 {
        self.error_threshold
    }

    /// Compensate the non-linear speed response of the motor controller
    pub fn set_linearize(&mut self, linearize: bool) {
        self.linearize = linearize;
    }

    pub fn is_linearized(&self) -> bool {
        self.linearize
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.reset();
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Clear accumulated state
    pub fn reset(&mut self) {
        self.error = 0.0;
        self.last_error = 0.0;
        self.integral = 0.0;
        self.derivative = 0.0;
        self.drive = 0.0;
        self.drive_cmd = 0;
    }

    /// Run one cycle against the measured speed, returning a command
    pub fn update(&mut self, measured_rpm: f32) -> i16 {
        if !self.enabled {
            self.reset();
            return 0;
        }

        self.error = self.target - measured_rpm;
        if self.error.abs() < self.error_threshold {
            self.error = 0.0;
        }

        if self.gains.ki != 0.0 {
            self.integral = (self.integral + self.error)
                .clamp(-self.integral_limit, self.integral_limit);
        } else {
            self.integral = 0.0;
        }

        self.derivative = self.error - self.last_error;
        self.last_error = self.error;

        let drive = self.gains.kp * self.error
            + self.gains.ki * self.integral
            + self.gains.kd * self.derivative
            + self.gains.kbias;
        self.drive = drive.clamp(-1.0, 1.0);

        let raw = (self.drive * MOTOR_MAX_CMD as f32) as i16;
        self.drive_cmd = if self.linearize { linearize(raw) } else { raw };
        self.drive_cmd
    }

    pub fn error(&self) -> f32 {
        self.error
    }

    pub fn integral(&self) -> f32 {
        self.integral
    }

    pub fn integral_limit(&self) -> f32 {
        self.integral_limit
    }

    /// Drive before scaling, in [-1, 1]
    pub fn drive(&self) -> f32 {
        self.drive
    }

    pub fn output(&self) -> i16 {
        self.drive_cmd
    }
}

fn integral_limit(ki: f32) -> f32 {
    if ki > 0.0 {
        INTEGRAL_DRIVE_MAX / ki
    } else {
        0.0
    }
}

/// Map a raw drive through an exponential curve
///
/// Small commands barely move a motor; the curve lifts them above the
/// stiction point while keeping full scale at full scale.
pub fn linearize(raw: i16) -> i16 {
    let magnitude = raw.unsigned_abs().min(MOTOR_MAX_CMD as u16) as i16;
    let mapped = if magnitude >= LUT_OFFSET / 2 {
        let x = LUT_FACTOR.powf(magnitude as f32 / MOTOR_MAX_CMD as f32);
        let span = (MOTOR_MAX_CMD - LUT_OFFSET) as f32;
        (((x - 1.0) / (LUT_FACTOR - 1.0)) * span + 0.5) as i16 + LUT_OFFSET
    } else {
        magnitude * 2
    };
    mapped.min(MOTOR_MAX_CMD) * raw.signum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_bad_gains() {
        assert!(SpeedPid::new(PidGains::new(-1.0, 0.0, 0.0)).is_err());
        assert!(SpeedPid::new(PidGains::new(f32::NAN, 0.0, 0.0)).is_err());
        assert!(SpeedPid::new(PidGains::new(0.0, f32::INFINITY, 0.0)).is_err());
        assert!(SpeedPid::new(PidGains::new(0.01, 0.001, 0.0)).is_ok());
    }

    #[test]
    fn test_set_gains_rejects_without_mutation() {
        let mut pid = SpeedPid::new(PidGains::new(0.01, 0.0, 0.0)).unwrap();
        assert_eq!(
            pid.set_gains(PidGains::new(0.01, -0.5, 0.0)),
            Err(SmartMotorError::InvalidArgument)
        );
        assert_eq!(pid.gains().ki, 0.0);
    }

    #[test]
    fn test_proportional_only() {
        let mut pid = SpeedPid::new(PidGains::new(0.01, 0.0, 0.0)).unwrap();
        pid.set_target(100.0);
        // error 50 rpm * 0.01 = 0.5 drive
        assert_eq!(pid.update(50.0), 63);
    }

    #[test]
    fn test_small_error_ignored() {
        let mut pid = SpeedPid::new(PidGains::new(0.01, 0.0, 0.0)).unwrap();
        pid.set_target(100.0);
        assert_eq!(pid.update(95.0), 0);
        assert_eq!(pid.error(), 0.0);
    }

    #[test]
    fn test_drive_saturates() {
        let mut pid = SpeedPid::new(PidGains::new(1.0, 0.0, 0.0)).unwrap();
        pid.set_target(-200.0);
        assert_eq!(pid.update(0.0), -127);
        assert_eq!(pid.drive(), -1.0);
    }

    #[test]
    fn test_integral_is_bounded() {
        let mut pid = SpeedPid::new(PidGains::new(0.0, 0.001, 0.0)).unwrap();
        pid.set_target(100.0);
        for _ in 0..10_000 {
            pid.update(0.0);
        }
        assert!((pid.integral() - 250.0).abs() < 1e-2);
        // 0.25 of full drive
        assert_eq!(pid.output(), 31);
    }

    #[test]
    fn test_bias_feeds_forward() {
        let mut pid = SpeedPid::new(PidGains::new(0.0, 0.0, 0.0).with_bias(0.5)).unwrap();
        pid.set_target(50.0);
        assert_eq!(pid.update(50.0), 63);
    }

    #[test]
    fn test_disabled_outputs_zero() {
        let mut pid = SpeedPid::new(PidGains::new(0.01, 0.001, 0.0)).unwrap();
        pid.set_target(100.0);
        pid.update(0.0);
        pid.set_enabled(false);
        assert_eq!(pid.update(0.0), 0);
        assert_eq!(pid.integral(), 0.0);
    }

    #[test]
    fn test_linearize_curve() {
        assert_eq!(linearize(0), 0);
        assert_eq!(linearize(2), 4);
        assert_eq!(linearize(127), 127);
        assert_eq!(linearize(-127), -127);
        let mid = linearize(64);
        assert!(mid > 10 && mid < 64);
    }
}
