//! End-to-end exchanges between the registry and simulated controllers

use proptest::prelude::*;
use smartmotor_core::config::{BankConfig, FeedbackConfig, MotorConfig, SystemConfig};
use smartmotor_core::profile::MotorKind;
use smartmotor_core::SmartMotors;
use smartmotor_drivers::SimulatedController;

fn two_banks() -> SmartMotors {
    let mut config = SystemConfig::default();
    config.banks[1] = BankConfig::power_expander(None);
    for slot in 0..4u8 {
        config
            .motors
            .push(MotorConfig::new(slot, 0, slot, MotorKind::Torque393).with_feedback(FeedbackConfig::Ime))
            .unwrap();
        config
            .motors
            .push(MotorConfig::new(slot + 4, 1, slot, MotorKind::Motor269).with_feedback(FeedbackConfig::Ime))
            .unwrap();
    }
    SmartMotors::from_config(&config).unwrap()
}

proptest! {
    #[test]
    fn outputs_arrive_unchanged(cmds in prop::array::uniform8(-127i16..=127)) {
        let mut sm = two_banks();
        let mut sim = SimulatedController::new();
        for (id, cmd) in cmds.iter().enumerate() {
            sm.set_motor(id as u8, *cmd, true).unwrap();
        }
        sm.exchange(0, &mut sim).unwrap();
        sm.exchange(1, &mut sim).unwrap();

        for id in 0..8u8 {
            let (bank, slot) = (id / 4, (id % 4) as usize);
            let sent = sim.commands(bank).unwrap()[slot];
            prop_assert_eq!(sent as i16, sm.output(id).unwrap());
        }
    }
}

#[test]
fn expander_bank_reports_current() {
    let mut sm = two_banks();
    let mut sim = SimulatedController::new();
    sm.set_motor(4, 127, true).unwrap();
    sm.exchange(1, &mut sim).unwrap();
    sm.control_cycle(20);
    assert!((sm.current(4).unwrap() - 1.8).abs() < 1e-6);
    // The first layout carries no current, bank 0 motors are estimated
    sm.exchange(0, &mut sim).unwrap();
    assert!(sm.motor(0).unwrap().driver_temperature().is_none());
}

#[test]
fn ime_speed_from_simulated_positions() {
    let mut sm = two_banks();
    let mut sim = SimulatedController::new();
    sm.set_motor(0, 127, true).unwrap();
    sm.exchange(0, &mut sim).unwrap();
    sm.control_cycle(20);
    sm.exchange(0, &mut sim).unwrap();
    sm.control_cycle(20);
    // 16 counts per 20 ms on a 627.2 count encoder
    let expected = 50.0 * 16.0 * 60.0 / 627.2;
    assert!((sm.speed(0).unwrap() - expected).abs() < 0.01);
}
