//! PTC thermal model
//!
//! Estimates the temperature of a PTC fuse (in a motor winding or in a
//! bank supply path) from the current through it. The temperature rise
//! is the sum of two first-order poles that both settle toward a share
//! of the equilibrium rise `C1 · I²`:
//!
//! - a slow pole with time constant `tau = K_tau · t_trip · 25`, carrying
//!   most of the rise (bulk of the device),
//! - a fast pole with time constant `tau / 25`, carrying a small share
//!   (the junction itself), so short overloads register before the slow
//!   pole has moved.
//!
//! Each pole is advanced with the exact exponential step for the elapsed
//! time, so the result does not depend on how the caller slices time.

use micromath::F32Ext;

use crate::profile::{PtcConstants, TEMP_AMBIENT};

/// Share of the equilibrium rise carried by the fast pole
pub const FAST_POLE_WEIGHT: f32 = 0.02;

/// Fast pole time constant relative to the slow pole
pub const FAST_POLE_RATIO: f32 = 25.0;

/// Longest interval integrated in one step (ms)
///
/// A starved task must not extrapolate heating or cooling over the whole
/// gap in a single step.
pub const MAX_THERMAL_STEP_MS: u32 = 250;

/// Dual-pole thermal model for one PTC
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ThermalModel {
    ptc: PtcConstants,
    ambient: f32,
    /// Rise contributed by the fast pole (°C)
    fast: f32,
    /// Rise contributed by the slow pole (°C)
    slow: f32,
}

impl ThermalModel {
    /// Create a model at ambient temperature
    pub fn new(ptc: PtcConstants, ambient: f32) -> Self {
        Self {
            ptc,
            ambient,
            fast: 0.0,
            slow: 0.0,
        }
    }

    /// Create a model at the default ambient temperature
    pub fn at_default_ambient(ptc: PtcConstants) -> Self {
        Self::new(ptc, TEMP_AMBIENT)
    }

    /// Advance the model by `elapsed_ms` with `current` flowing
    ///
    /// Returns the new temperature in °C.
    pub fn update(&mut self, current: f32, elapsed_ms: u32) -> f32 {
        let dt = elapsed_ms.min(MAX_THERMAL_STEP_MS) as f32;
        if dt > 0.0 {
            let rise = self.ptc.c1() * current * current;
            let tau_slow_ms = self.ptc.tau() * 1000.0;
            let tau_fast_ms = tau_slow_ms / FAST_POLE_RATIO;

            self.slow = settle(self.slow, rise * (1.0 - FAST_POLE_WEIGHT), dt, tau_slow_ms);
            self.fast = settle(self.fast, rise * FAST_POLE_WEIGHT, dt, tau_fast_ms);
        }
        self.temperature()
    }

    /// Current temperature estimate (°C)
    pub fn temperature(&self) -> f32 {
        self.ambient + self.fast + self.slow
    }

    /// Equilibrium temperature for a constant current (°C)
    pub fn steady_state(&self, current: f32) -> f32 {
        self.ambient + self.ptc.c1() * current * current
    }

    pub fn ambient(&self) -> f32 {
        self.ambient
    }

    /// Change ambient temperature; the rise above ambient is kept
    pub fn set_ambient(&mut self, ambient: f32) {
        self.ambient = ambient;
    }

    /// Return to ambient, as after a power cycle
    pub fn reset(&mut self) {
        self.fast = 0.0;
        self.slow = 0.0;
    }

    /// Pin the estimate to a known temperature
    ///
    /// The whole rise is put on the slow pole so it decays at the bulk
    /// rate.
    pub fn force_temperature(&mut self, temperature: f32) {
        self.fast = 0.0;
        self.slow = temperature - self.ambient;
    }

    pub fn constants(&self) -> &PtcConstants {
        &self.ptc
    }
}

/// Exact first-order step toward `target`
fn settle(value: f32, target: f32, dt_ms: f32, tau_ms: f32) -> f32 {
    let ratio = dt_ms / tau_ms;
    // 1 - e^-x loses most of its digits for small x in single precision
    let alpha = if ratio < 0.01 {
        ratio * (1.0 - ratio * 0.5)
    } else {
        1.0 - (-ratio).exp()
    };
    value + (target - value) * alpha
}
