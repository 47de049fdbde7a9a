//! Shared state and inter-task channels
//!
//! The registry lives in one blocking mutex so every task sees whole
//! records. Locks are short: no task awaits while holding one.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::channel::Channel;

use smartmotor_core::state::MonitorKind;
use smartmotor_core::SmartMotors;

/// Registry shared between the periodic tasks
pub type SharedMotors = Mutex<CriticalSectionRawMutex, RefCell<SmartMotors>>;

/// Pending motor requests
const COMMAND_CHANNEL_SIZE: usize = 8;

/// Operator or host request for the motor runtime
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MotorRequest {
    Set { motor: u8, value: i16, immediate: bool },
    Run { motor: u8 },
    Stop { motor: u8 },
    RunAll,
    StopAll,
    /// Closed-loop target for a motor with a speed PID
    TargetSpeed { motor: u8, rpm: f32 },
    Monitor { kind: MonitorKind, enabled: bool },
}

/// Requests waiting to be applied by the command task
pub static COMMANDS: Channel<CriticalSectionRawMutex, MotorRequest, COMMAND_CHANNEL_SIZE> =
    Channel::new();
