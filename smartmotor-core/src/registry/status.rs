//! Point-in-time status snapshot for debug output

use heapless::Vec;
use smartmotor_protocol::SlotFault;

use super::SmartMotors;
use crate::config::BankKind;
use crate::profile::{MotorKind, MAX_MOTORS, TOTAL_NUM_CONTROL_BANKS};
use crate::safety::Monitors;

/// One linked motor
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MotorSnapshot {
    pub id: u8,
    pub bank: u8,
    pub slot: u8,
    pub kind: MotorKind,
    pub enabled: bool,
    pub cmd: i16,
    pub req: i16,
    pub output: i16,
    pub limit_cmd: i16,
    pub rpm: f32,
    pub current: f32,
    pub peak_current: f32,
    pub temperature: f32,
    /// Bit 0 PTC tripped, bit 1 current limited
    pub status: u8,
    pub fault: SlotFault,
}

/// One bank
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BankSnapshot {
    pub index: u8,
    pub kind: BankKind,
    pub current: f32,
    pub peak_current: f32,
    pub temperature: f32,
    pub tripped: bool,
    pub safe_current: f32,
    pub online: bool,
    pub total_faults: u32,
    pub battery_mv: Option<u16>,
}

/// Everything worth printing about the runtime
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DebugStatus {
    pub monitors: Monitors,
    pub banks: Vec<BankSnapshot, TOTAL_NUM_CONTROL_BANKS>,
    pub motors: Vec<MotorSnapshot, MAX_MOTORS>,
    pub dropped_events: u32,
}

impl SmartMotors {
    pub fn debug_status(&self) -> DebugStatus {
        let mut banks = Vec::new();
        for bank in self.banks.iter() {
            // One entry per bank, same capacity
            let _ = banks.push(BankSnapshot {
                index: bank.index,
                kind: bank.kind,
                current: bank.sense.current,
                peak_current: bank.sense.peak,
                temperature: bank.temperature(),
                tripped: bank.ptc_tripped(),
                safe_current: bank.safe_current,
                online: bank.link.is_online(),
                total_faults: bank.link.total_faults(),
                battery_mv: bank.battery_mv,
            });
        }

        let mut motors = Vec::new();
        for motor in self.motors.iter() {
            let Some(binding) = motor.binding else {
                continue;
            };
            let _ = motors.push(MotorSnapshot {
                id: motor.id,
                bank: binding.bank,
                slot: binding.slot,
                kind: motor.kind,
                enabled: motor.enabled,
                cmd: motor.cmd,
                req: motor.req,
                output: motor.output(),
                limit_cmd: motor.limit.toward(motor.cmd),
                rpm: motor.rpm,
                current: motor.sense.current,
                peak_current: motor.sense.peak,
                temperature: motor.temperature(),
                status: motor.status_code(),
                fault: motor.fault,
            });
        }

        DebugStatus {
            monitors: self.monitors,
            banks,
            motors,
            dropped_events: self.events.dropped(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SystemConfig;

    #[test]
    fn test_snapshot_lists_linked_motors() {
        let mut sm = SmartMotors::new(&SystemConfig::default()).unwrap();
        sm.link_motor(4, 1, 3, MotorKind::Motor269).unwrap();
        sm.set_motor(4, -60, true).unwrap();
        let status = sm.debug_status();
        assert_eq!(status.banks.len(), 2);
        assert_eq!(status.motors.len(), 1);
        let motor = status.motors[0];
        assert_eq!((motor.id, motor.bank, motor.slot), (4, 1, 3));
        assert_eq!(motor.output, -60);
        assert_eq!(motor.limit_cmd, -127);
        assert_eq!(motor.status, 0);
    }
}
