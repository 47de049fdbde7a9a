//! Configuration type definitions
//!
//! These types describe the wiring of a robot: which controller banks
//! exist, which motor sits in which slot, and which sensors feed back
//! speed. Loading them is the firmware's job; the registry only
//! validates and applies them.

use heapless::Vec;

use crate::profile::{
    MotorKind, DEFAULT_SLEW_RATE, MOTOR_DEADBAND, TEMP_AMBIENT, TOTAL_NUM_BANK_MOTORS,
    TOTAL_NUM_CONTROL_BANKS,
};
use crate::registry::sensor::SensorDescriptor;
use crate::safety::Monitors;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Maximum sensors per config
pub const MAX_SENSORS: usize = 16;

/// Capacity of the motor table in a config
///
/// Larger than the number of logical ids so that an over-long wiring
/// table can be represented and rejected.
pub const MAX_MOTOR_ENTRIES: usize = 16;

/// Capacity of the bank table in a config
pub const MAX_BANK_ENTRIES: usize = 4;

/// Controller hosting a bank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BankKind {
    /// Motor ports driven by the Cortex itself
    #[default]
    Cortex,
    /// External power expander fed from its own battery
    PowerExpander,
}

/// One controller bank
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BankConfig {
    pub kind: BankKind,
    /// Populated motor slots
    pub slots: u8,
    /// Frame layout version spoken by the bank's controller firmware
    pub layout_version: u8,
    /// Status LED to light while the bank is tripped
    pub status_led: Option<u8>,
    /// Analog channel wired to a power expander status output
    pub status_port: Option<u8>,
}

impl BankConfig {
    pub const fn cortex() -> Self {
        Self {
            kind: BankKind::Cortex,
            slots: TOTAL_NUM_BANK_MOTORS as u8,
            layout_version: 1,
            status_led: None,
            status_port: None,
        }
    }

    pub const fn power_expander(status_port: Option<u8>) -> Self {
        Self {
            kind: BankKind::PowerExpander,
            slots: 4,
            layout_version: 2,
            status_led: None,
            status_port,
        }
    }
}

/// Speed feedback source for a motor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FeedbackConfig {
    /// No sensor, speed is estimated from the command
    #[default]
    None,
    /// Integrated motor encoder reported over the bank link
    Ime,
    /// Entry in the config's sensor table
    Sensor(u8),
    /// Feedback of another motor on the same shaft
    Shared(u8),
}

/// One motor in the wiring table
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MotorConfig {
    /// Logical motor id
    pub id: u8,
    pub bank: u8,
    pub slot: u8,
    pub kind: MotorKind,
    /// Current ceiling (A); profile safe current if unset
    pub current_limit: Option<f32>,
    pub slew_rate: i16,
    pub deadband: i16,
    pub feedback: FeedbackConfig,
    /// Extra gearing between a quadrature encoder and the output
    pub encoder_gearing: Option<f32>,
    /// Status LED to light while the motor is limited
    pub status_led: Option<u8>,
}

impl MotorConfig {
    pub const fn new(id: u8, bank: u8, slot: u8, kind: MotorKind) -> Self {
        Self {
            id,
            bank,
            slot,
            kind,
            current_limit: None,
            slew_rate: DEFAULT_SLEW_RATE,
            deadband: MOTOR_DEADBAND,
            feedback: FeedbackConfig::None,
            encoder_gearing: None,
            status_led: None,
        }
    }

    pub const fn with_feedback(self, feedback: FeedbackConfig) -> Self {
        Self { feedback, ..self }
    }
}

/// Complete system configuration
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SystemConfig {
    pub banks: Vec<BankConfig, MAX_BANK_ENTRIES>,
    pub motors: Vec<MotorConfig, MAX_MOTOR_ENTRIES>,
    pub sensors: Vec<SensorDescriptor, MAX_SENSORS>,
    pub monitors: Monitors,
    /// Ambient temperature (°C)
    pub ambient: f32,
}

impl Default for SystemConfig {
    /// The two Cortex banks, no motors
    fn default() -> Self {
        let mut banks = Vec::new();
        for _ in 0..TOTAL_NUM_CONTROL_BANKS - 1 {
            // Capacity exceeds the bank count
            let _ = banks.push(BankConfig::cortex());
        }
        Self {
            banks,
            motors: Vec::new(),
            sensors: Vec::new(),
            monitors: Monitors::default(),
            ambient: TEMP_AMBIENT,
        }
    }
}
