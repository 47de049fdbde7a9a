//! Motor profiles and system constants
//!
//! Every supported motor SKU is described by one immutable record in
//! [`PROFILES`]. Motors pick a record at link time and derive their
//! electrical model from it; nothing else carries per-SKU literals.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Nominal battery voltage used when no measurement is available (V)
pub const V_NOMINAL: f32 = 7.2;
/// Wiring and controller resistance in series with the winding (Ω)
pub const R_SYS: f32 = 0.3;
/// Motor controller PWM frequency (Hz)
pub const PWM_FREQ: f32 = 1150.0;
/// Flyback diode drop (V)
pub const V_DIODE: f32 = 0.75;
/// Winding inductance shared by all supported motors (H)
pub const L_MOTOR: f32 = 0.000_65;

/// PTC trip temperature (°C)
pub const TEMP_TRIP: f32 = 100.0;
/// Trip hysteresis (°C)
pub const TEMP_HYST: f32 = 10.0;
/// Reference temperature the hold current is specified at (°C)
pub const TEMP_REF: f32 = 25.0;
/// Default ambient temperature, 72 °F (°C)
pub const TEMP_AMBIENT: f32 = 22.2;

pub const MOTOR_MAX_CMD: i16 = 127;
pub const MOTOR_MIN_CMD: i16 = -127;
/// Requests smaller than this are treated as zero
pub const MOTOR_DEADBAND: i16 = 10;
/// Command units per slew tick
pub const DEFAULT_SLEW_RATE: i16 = 10;
/// Effectively unlimited slew
pub const FAST_SLEW_RATE: i16 = 256;

/// Controller banks (Cortex ports 1-5, Cortex ports 6-10, power expander)
pub const TOTAL_NUM_CONTROL_BANKS: usize = 3;
/// Motor slots per bank
pub const TOTAL_NUM_BANK_MOTORS: usize = smartmotor_protocol::BANK_SLOTS;
/// Logical motor ids
pub const MAX_MOTORS: usize = 10;

/// Safe current shared by all motors of a tripped bank (A)
pub const BANK_SAFE_CURRENT: f32 = 3.0;

/// Thermal characteristics of a PTC fuse
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PtcConstants {
    /// Current the PTC carries indefinitely at `TEMP_REF` (A)
    pub i_hold: f32,
    /// Time to trip at five times hold current (s)
    pub t_trip: f32,
    /// Empirical time-constant scale
    pub k_tau: f32,
}

impl PtcConstants {
    /// Temperature rise per A² at equilibrium (°C/A²)
    pub fn c1(&self) -> f32 {
        (TEMP_TRIP - TEMP_REF) / (self.i_hold * self.i_hold)
    }

    /// Slow pole time constant (s)
    pub fn tau(&self) -> f32 {
        self.k_tau * self.t_trip * 25.0
    }

    /// Slow pole rate (per ms)
    pub fn c2(&self) -> f32 {
        1.0 / (self.tau() * 1000.0)
    }
}

/// PTC in the Cortex and power expander supply paths
pub const BANK_PTC: PtcConstants = PtcConstants {
    i_hold: 3.0,
    t_trip: 1.7,
    k_tau: 0.5,
};

const PTC_393: PtcConstants = PtcConstants {
    i_hold: 1.0,
    t_trip: 7.1,
    k_tau: 0.5,
};

const PTC_269: PtcConstants = PtcConstants {
    i_hold: 0.75,
    t_trip: 2.0,
    k_tau: 0.5,
};

/// Supported motor types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MotorKind {
    /// 393 with the standard (high torque) gearing
    #[default]
    Torque393,
    /// 393 with the high speed gear set
    Speed393,
    /// 393 with the turbo gear set
    Turbo393,
    /// 269 two-wire motor
    Motor269,
    /// 3-wire motor (269 electricals, no IME)
    ThreeWire,
}

/// Immutable description of one motor SKU
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MotorProfile {
    pub kind: MotorKind,
    pub name: &'static str,
    /// Free running current at nominal voltage (A)
    pub i_free: f32,
    /// Stall current at nominal voltage (A)
    pub i_stall: f32,
    /// Free running speed at the output shaft (rpm)
    pub rpm_free: f32,
    /// Output gearing relative to the torque build
    pub gearing: f32,
    /// IME ticks per output revolution, if the motor takes an IME
    pub ime_ticks_per_rev: Option<f32>,
    /// Current the motor is limited to while its PTC is tripped (A)
    pub i_safe: f32,
    pub ptc: PtcConstants,
}

impl MotorProfile {
    /// Winding resistance (Ω)
    pub fn resistance(&self) -> f32 {
        V_NOMINAL / self.i_stall
    }

    /// Back-EMF constant for a given free speed (V/rpm)
    pub fn ke(&self, rpm_free: f32) -> f32 {
        V_NOMINAL * (1.0 - self.i_free / self.i_stall) / rpm_free
    }
}

/// Profile table indexed by [`MotorKind`]
pub static PROFILES: [MotorProfile; 5] = [
    MotorProfile {
        kind: MotorKind::Torque393,
        name: "393T",
        i_free: 0.2,
        i_stall: 4.8,
        rpm_free: 110.0,
        gearing: 1.0,
        ime_ticks_per_rev: Some(627.2),
        i_safe: 0.90,
        ptc: PTC_393,
    },
    MotorProfile {
        kind: MotorKind::Speed393,
        name: "393S",
        i_free: 0.2,
        i_stall: 4.8,
        rpm_free: 110.0 * 1.6,
        gearing: 1.6,
        ime_ticks_per_rev: Some(392.0),
        i_safe: 0.90,
        ptc: PTC_393,
    },
    MotorProfile {
        kind: MotorKind::Turbo393,
        name: "393R",
        i_free: 0.2,
        i_stall: 4.8,
        rpm_free: 110.0 * 2.4,
        gearing: 2.4,
        ime_ticks_per_rev: Some(261.333),
        i_safe: 0.90,
        ptc: PTC_393,
    },
    MotorProfile {
        kind: MotorKind::Motor269,
        name: "269",
        i_free: 0.18,
        i_stall: 2.88,
        rpm_free: 120.0,
        gearing: 1.0,
        ime_ticks_per_rev: Some(240.448),
        i_safe: 0.75,
        ptc: PTC_269,
    },
    MotorProfile {
        kind: MotorKind::ThreeWire,
        name: "3wire",
        i_free: 0.18,
        i_stall: 2.88,
        rpm_free: 120.0,
        gearing: 1.0,
        ime_ticks_per_rev: None,
        i_safe: 0.75,
        ptc: PTC_269,
    },
];

impl MotorKind {
    /// The immutable profile record for this motor type
    pub fn profile(self) -> &'static MotorProfile {
        let index = match self {
            MotorKind::Torque393 => 0,
            MotorKind::Speed393 => 1,
            MotorKind::Turbo393 => 2,
            MotorKind::Motor269 => 3,
            MotorKind::ThreeWire => 4,
        };
        &PROFILES[index]
    }

    /// Look up a motor type by the name used in wiring tables
    ///
    /// "393" is accepted as the torque build.
    pub fn from_name(name: &str) -> Option<Self> {
        if name == "393" {
            return Some(MotorKind::Torque393);
        }
        PROFILES.iter().find(|p| p.name == name).map(|p| p.kind)
    }
}
