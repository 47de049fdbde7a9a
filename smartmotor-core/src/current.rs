//! Motor current model
//!
//! The controllers on most banks cannot measure current, so it is
//! estimated from the applied PWM command, the motor speed and the
//! battery voltage. The winding is modelled as R-L with back-EMF: the
//! current rises toward `i_ss_on` during the on phase and decays toward
//! `i_ss_off` through the flyback diode during the off phase. If the
//! decay would cross zero the diode clamps it and the off phase ends
//! early.
//!
//! The same model inverted gives the safe command: the largest command
//! that keeps the current at or below a target at the present speed.

use micromath::F32Ext;

use crate::profile::{MotorProfile, L_MOTOR, MOTOR_DEADBAND, MOTOR_MAX_CMD, PWM_FREQ, R_SYS, V_DIODE};
use crate::safety::CommandLimit;

/// Weight of the previous value in the current filter
const FILTER_KEEP: f32 = 0.8;

/// Electrical parameters of one motor, derived from its profile
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MotorElectrics {
    /// Winding resistance (Ω)
    pub r_motor: f32,
    /// Winding inductance (H)
    pub l_motor: f32,
    /// Back-EMF constant (V/rpm)
    pub ke_motor: f32,
    /// Free running speed (rpm)
    pub rpm_free: f32,
    /// Back-EMF at free speed (V)
    pub v_bemf_max: f32,
}

impl MotorElectrics {
    pub fn from_profile(profile: &MotorProfile) -> Self {
        Self::with_free_rpm(profile, profile.rpm_free)
    }

    /// Derive parameters for a motor whose free speed differs from stock
    pub fn with_free_rpm(profile: &MotorProfile, rpm_free: f32) -> Self {
        let ke_motor = profile.ke(rpm_free);
        Self {
            r_motor: profile.resistance(),
            l_motor: L_MOTOR,
            ke_motor,
            rpm_free,
            v_bemf_max: ke_motor * rpm_free,
        }
    }

    /// Average winding current over one PWM cycle (A, signed)
    pub fn estimate_current(&self, cmd: i16, rpm: f32, v_battery: f32) -> f32 {
        let cmd = cmd.clamp(-MOTOR_MAX_CMD, MOTOR_MAX_CMD);

        // Near zero command the direction follows the shaft to avoid
        // transients as the command crosses zero
        let dir = if cmd.abs() > MOTOR_DEADBAND {
            sign(cmd as f32)
        } else {
            sign(rpm)
        };

        let duty_on = cmd.abs() as f32 / MOTOR_MAX_CMD as f32;

        let lamda = self.r_motor / (PWM_FREQ * self.l_motor);
        let c1 = (-lamda * duty_on).exp();
        let c2 = (-lamda * (1.0 - duty_on)).exp();

        let mut v_bemf = self.ke_motor * rpm;
        if v_bemf.abs() > self.v_bemf_max {
            v_bemf = sign(v_bemf) * self.v_bemf_max;
        }

        let i_ss_on = (v_battery * dir - v_bemf) / (self.r_motor + R_SYS);
        let i_ss_off = -(V_DIODE * dir + v_bemf) / self.r_motor;

        let i_0 = (i_ss_on * (1.0 - c1) * c2 + i_ss_off * (1.0 - c2)) / (1.0 - c1 * c2);

        let duty_off = if i_0 * dir < 0.0 {
            // Diode clamps at zero part way through the off phase
            let i_max = i_ss_on * (1.0 - c1);
            let ratio = -i_ss_off / (i_max - i_ss_off);
            if ratio > 0.0 {
                (-ratio.ln() / lamda).min(1.0 - duty_on)
            } else {
                0.0
            }
        } else {
            1.0 - duty_on
        };

        i_ss_on * duty_on + i_ss_off * duty_off
    }

    /// Command magnitudes that hold the current at `target` (A)
    ///
    /// Computed for both directions at the present speed. A direction the
    /// shaft is turning against is not limited, the motor is reversing
    /// and back-EMF adds to the supply. A zero target allows nothing.
    pub fn safe_limit(&self, target: f32, rpm: f32, v_battery: f32) -> CommandLimit {
        if target <= 0.0 {
            return CommandLimit::new(0, 0);
        }
        let forward = self.safe_magnitude(target, rpm, v_battery);
        let reverse = self.safe_magnitude(target, -rpm, v_battery);
        CommandLimit::new(forward, reverse)
    }

    fn safe_magnitude(&self, target: f32, rpm_along: f32, v_battery: f32) -> i16 {
        if rpm_along < 0.0 {
            return MOTOR_MAX_CMD;
        }
        let cmd = MOTOR_MAX_CMD as f32
            * (rpm_along * self.ke_motor + target * (self.r_motor + R_SYS) + V_DIODE)
            / (v_battery + V_DIODE);
        if cmd >= MOTOR_MAX_CMD as f32 {
            MOTOR_MAX_CMD
        } else {
            cmd as i16
        }
    }
}

/// Filtered and peak current tracking for one motor or bank
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CurrentSense {
    /// Latest instantaneous value (A, signed)
    pub current: f32,
    /// IIR filtered value (A, signed)
    pub filtered: f32,
    /// Largest magnitude seen since reset (A)
    pub peak: f32,
}

impl CurrentSense {
    pub fn record(&mut self, current: f32) {
        self.current = current;
        self.filtered = self.filtered * FILTER_KEEP + current * (1.0 - FILTER_KEEP);
        if current.abs() > self.peak {
            self.peak = current.abs();
        }
    }

    pub fn reset_peak(&mut self) {
        self.peak = 0.0;
    }
}

fn sign(x: f32) -> f32 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{MotorKind, MOTOR_MAX_CMD, V_NOMINAL};

    fn electrics_393() -> MotorElectrics {
        MotorElectrics::from_profile(MotorKind::Torque393.profile())
    }

    #[test]
    fn test_stall_current_at_full_command() {
        let m = electrics_393();
        let i = m.estimate_current(MOTOR_MAX_CMD, 0.0, V_NOMINAL);
        // 7.2 V across R + R_SYS
        assert!((i - 4.0).abs() < 0.05, "i = {}", i);
    }

    #[test]
    fn test_free_running_draws_little() {
        let m = electrics_393();
        let i = m.estimate_current(MOTOR_MAX_CMD, m.rpm_free, V_NOMINAL);
        assert!(i.abs() < 0.3, "i = {}", i);
    }

    #[test]
    fn test_current_is_odd_in_command() {
        let m = electrics_393();
        let fwd = m.estimate_current(80, 40.0, V_NOMINAL);
        let rev = m.estimate_current(-80, -40.0, V_NOMINAL);
        assert!((fwd + rev).abs() < 1e-3);
    }

    #[test]
    fn test_zero_command_stationary_is_zero() {
        let m = electrics_393();
        assert_eq!(m.estimate_current(0, 0.0, V_NOMINAL), 0.0);
    }

    #[test]
    fn test_safe_limit_at_stall() {
        let m = electrics_393();
        let limit = m.safe_limit(1.0, 0.0, V_NOMINAL);
        // 127 * (1.0 * 1.8 + 0.75) / 7.95
        assert_eq!(limit.forward, 40);
        assert_eq!(limit.reverse, 40);
    }

    #[test]
    fn test_safe_limit_grows_with_speed() {
        let m = electrics_393();
        let stall = m.safe_limit(1.0, 0.0, V_NOMINAL);
        let moving = m.safe_limit(1.0, 60.0, V_NOMINAL);
        assert!(moving.forward > stall.forward);
        // Shaft turning forward, reversing is not limited
        assert_eq!(moving.reverse, MOTOR_MAX_CMD);
    }

    #[test]
    fn test_safe_limit_zero_target() {
        let m = electrics_393();
        assert_eq!(m.safe_limit(0.0, 0.0, V_NOMINAL), CommandLimit::new(0, 0));
    }

    #[test]
    fn test_free_rpm_override() {
        let profile = MotorKind::Torque393.profile();
        let m = MotorElectrics::with_free_rpm(profile, 100.0);
        assert_eq!(m.rpm_free, 100.0);
        assert!((m.v_bemf_max - V_NOMINAL * (1.0 - 0.2 / 4.8)).abs() < 1e-4);
    }

    #[test]
    fn test_current_filter() {
        let mut sense = CurrentSense::default();
        sense.record(1.0);
        assert!((sense.filtered - 0.2).abs() < 1e-6);
        sense.record(-2.0);
        assert_eq!(sense.peak, 2.0);
        sense.reset_peak();
        assert_eq!(sense.peak, 0.0);
    }
}
