//! Simulated bank controllers
//!
//! Stands in for real controllers on the bench and in tests. Each bank
//! answers with the layout it was addressed in, echoes the command
//! sequence number, and moves its encoder positions in proportion to the
//! commands it received. Timeouts and corrupted replies can be injected.

use smartmotor_core::profile::{MOTOR_MAX_CMD, TOTAL_NUM_CONTROL_BANKS};
use smartmotor_core::traits::{LinkTransport, TransportError};
use smartmotor_protocol::{
    CommandFrame, Frame, ReadingFrame, SlotReadingV1, SlotReadingV2, BANK_SLOTS,
    V1_BATTERY_MV_PER_COUNT,
};

/// Encoder counts per exchange at full command
pub const TICKS_AT_FULL_COMMAND: i32 = 16;

/// Simulated supply voltage (mV)
pub const SIMULATED_BATTERY_MV: u16 = 7_400;

/// Current drawn at full command (mA)
const CURRENT_AT_FULL_COMMAND_MA: i32 = 1_800;

/// Driver temperature reported by every slot (0.1 °C)
const DRIVER_TEMPERATURE_DC: i16 = 300;

#[derive(Debug, Clone, Copy, Default)]
struct SimulatedBank {
    positions: [i32; BANK_SLOTS],
    commands: [i8; BANK_SLOTS],
    timeouts: u8,
    corrupt_next: bool,
    exchanges: u32,
}

/// Loopback controller for every bank
#[derive(Debug, Clone, Default)]
pub struct SimulatedController {
    banks: [SimulatedBank; TOTAL_NUM_CONTROL_BANKS],
}

impl SimulatedController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` exchanges with `bank` time out
    pub fn inject_timeouts(&mut self, bank: u8, count: u8) {
        if let Some(b) = self.banks.get_mut(bank as usize) {
            b.timeouts = count;
        }
    }

    /// Flip a payload byte in the next reply from `bank`
    pub fn corrupt_next_reply(&mut self, bank: u8) {
        if let Some(b) = self.banks.get_mut(bank as usize) {
            b.corrupt_next = true;
        }
    }

    /// Commands last received by `bank`
    pub fn commands(&self, bank: u8) -> Option<[i8; BANK_SLOTS]> {
        self.banks.get(bank as usize).map(|b| b.commands)
    }

    pub fn positions(&self, bank: u8) -> Option<[i32; BANK_SLOTS]> {
        self.banks.get(bank as usize).map(|b| b.positions)
    }

    /// Successful exchanges with `bank`
    pub fn exchanges(&self, bank: u8) -> u32 {
        self.banks.get(bank as usize).map_or(0, |b| b.exchanges)
    }
}

impl LinkTransport for SimulatedController {
    fn transfer(&mut self, bank: u8, tx: &[u8], rx: &mut [u8]) -> Result<(), TransportError> {
        let sim = self
            .banks
            .get_mut(bank as usize)
            .ok_or(TransportError::Bus)?;
        if sim.timeouts > 0 {
            sim.timeouts -= 1;
            return Err(TransportError::Timeout);
        }

        let frame = Frame::decode(tx).map_err(|_| TransportError::Bus)?;
        let command = CommandFrame::from_frame(&frame).map_err(|_| TransportError::Bus)?;
        sim.commands = command.commands();
        for (position, cmd) in sim.positions.iter_mut().zip(sim.commands) {
            *position += cmd as i32 * TICKS_AT_FULL_COMMAND / MOTOR_MAX_CMD as i32;
        }

        let reading = match command {
            CommandFrame::V1 { bank, seq, .. } => ReadingFrame::V1 {
                bank,
                seq,
                status: 0x01,
                battery: (SIMULATED_BATTERY_MV / V1_BATTERY_MV_PER_COUNT) as u8,
                slots: sim
                    .positions
                    .map(|position| SlotReadingV1 { position, fault: 0 }),
            },
            CommandFrame::V2 { bank, seq, .. } => {
                let mut slots = [SlotReadingV2::default(); BANK_SLOTS];
                for (slot, reading) in slots.iter_mut().enumerate() {
                    let cmd = sim.commands[slot] as i32;
                    *reading = SlotReadingV2 {
                        position: sim.positions[slot],
                        current_ma: (cmd * CURRENT_AT_FULL_COMMAND_MA / MOTOR_MAX_CMD as i32) as i16,
                        temperature_dc: DRIVER_TEMPERATURE_DC,
                        fault: 0,
                    };
                }
                ReadingFrame::V2 {
                    bank,
                    seq,
                    status: 0x01,
                    battery_mv: SIMULATED_BATTERY_MV,
                    slots,
                }
            }
        };

        let len = reading
            .to_frame()
            .and_then(|frame| frame.encode(rx))
            .map_err(|_| TransportError::Bus)?;
        if sim.corrupt_next {
            sim.corrupt_next = false;
            // Last payload byte, ahead of the checksum
            rx[len - 2] ^= 0x5A;
        }
        sim.exchanges += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smartmotor_core::config::{FeedbackConfig, MotorConfig, SystemConfig};
    use smartmotor_core::link::LinkFault;
    use smartmotor_core::profile::MotorKind;
    use smartmotor_core::SmartMotors;

    fn registry() -> SmartMotors {
        let mut config = SystemConfig::default();
        config
            .motors
            .push(MotorConfig::new(0, 0, 0, MotorKind::Torque393).with_feedback(FeedbackConfig::Ime))
            .unwrap();
        SmartMotors::from_config(&config).unwrap()
    }

    #[test]
    fn test_positions_follow_commands() {
        let mut sm = registry();
        let mut sim = SimulatedController::new();
        sm.set_motor(0, MOTOR_MAX_CMD, true).unwrap();
        sm.exchange(0, &mut sim).unwrap();
        sm.exchange(0, &mut sim).unwrap();
        assert_eq!(sim.positions(0).unwrap()[0], 2 * TICKS_AT_FULL_COMMAND);
        assert_eq!(sim.commands(0).unwrap()[0], 127);
        assert_eq!(sim.exchanges(0), 2);
    }

    #[test]
    fn test_injected_timeouts() {
        let mut sm = registry();
        let mut sim = SimulatedController::new();
        sim.inject_timeouts(0, 2);
        assert_eq!(sm.exchange(0, &mut sim), Err(LinkFault::Timeout));
        assert_eq!(sm.exchange(0, &mut sim), Err(LinkFault::Timeout));
        assert!(sm.exchange(0, &mut sim).is_ok());
        assert_eq!(sm.link_status(0).unwrap().total_faults(), 2);
    }

    #[test]
    fn test_corrupted_reply() {
        let mut sm = registry();
        let mut sim = SimulatedController::new();
        sim.corrupt_next_reply(0);
        assert_eq!(sm.exchange(0, &mut sim), Err(LinkFault::Checksum));
        assert!(sm.exchange(0, &mut sim).is_ok());
    }

    #[test]
    fn test_battery_reading_scale() {
        let mut sm = registry();
        let mut sim = SimulatedController::new();
        sm.exchange(0, &mut sim).unwrap();
        let mv = sm.bank(0).unwrap().battery_mv().unwrap();
        assert!(SIMULATED_BATTERY_MV - mv < V1_BATTERY_MV_PER_COUNT);
    }

    #[test]
    fn test_unknown_bank() {
        let mut sim = SimulatedController::new();
        let mut rx = [0u8; 8];
        assert_eq!(sim.transfer(7, &[], &mut rx), Err(TransportError::Bus));
    }
}
