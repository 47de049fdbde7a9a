//! Motor speed from feedback sensors
//!
//! Speed comes from the tick delta of the motor's feedback sensor over the
//! control period. Motors with no usable sensor get an open-loop estimate
//! from the applied command.

use crate::profile::MOTOR_MAX_CMD;

/// Percent of free speed reached at each 16-count step of command
const SPEED_TABLE: [f32; 10] = [0.0, 26.0, 58.0, 77.0, 85.0, 92.0, 95.0, 98.0, 100.0, 100.0];

/// Share of the table speed assumed for a loaded motor
const SIMULATED_LOAD_FACTOR: f32 = 0.90;

/// Speed in rpm from a tick delta
///
/// A negative `ticks_per_rev` describes a sensor mounted reversed.
pub fn rpm_from_ticks(delta: i32, elapsed_ms: u32, ticks_per_rev: f32) -> f32 {
    if elapsed_ms == 0 || ticks_per_rev == 0.0 {
        return 0.0;
    }
    (1000.0 / elapsed_ms as f32) * delta as f32 * 60.0 / ticks_per_rev
}

/// Open-loop speed estimate for a motor without feedback (rpm)
pub fn simulated_rpm(cmd: i16, rpm_free: f32) -> f32 {
    let magnitude = cmd.unsigned_abs().min(MOTOR_MAX_CMD as u16) as usize;
    let index = magnitude >> 4;
    let fraction = (magnitude - (index << 4)) as f32 / 16.0;

    let percent = SPEED_TABLE[index] + (SPEED_TABLE[index + 1] - SPEED_TABLE[index]) * fraction;
    let rpm = percent * rpm_free / 100.0 * SIMULATED_LOAD_FACTOR;

    if cmd < 0 {
        -rpm
    } else {
        rpm
    }
}

/// Tick delta tracking for one feedback source
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpeedEstimator {
    last_position: Option<i32>,
    delta: i32,
}

impl SpeedEstimator {
    /// Feed the latest sensor position, returning the speed in rpm
    ///
    /// The first sample only establishes the reference position.
    pub fn update(&mut self, position: i32, elapsed_ms: u32, ticks_per_rev: f32) -> f32 {
        self.delta = match self.last_position {
            Some(last) => position.wrapping_sub(last),
            None => 0,
        };
        self.last_position = Some(position);
        rpm_from_ticks(self.delta, elapsed_ms, ticks_per_rev)
    }

    /// Ticks moved in the last update
    pub fn delta(&self) -> i32 {
        self.delta
    }

    /// Forget the reference position (sensor reset or reassigned)
    pub fn reset(&mut self) {
        self.last_position = None;
        self.delta = 0;
    }
}
