//! Periodic updates
//!
//! `control_cycle` runs on the control period: it refreshes speeds,
//! currents and temperatures, then recomputes each motor's limits.
//! `slew_cycle` runs on the faster slew period and walks each output
//! toward its limited command.

use super::motor::Feedback;
use super::SmartMotors;
use crate::control::simulated_rpm;
use crate::profile::{MAX_MOTORS, TOTAL_NUM_CONTROL_BANKS};
use crate::safety::{thermal_target, CommandLimit};
use crate::state::Event;

/// Below this magnitude a motor does not count toward a bank share (A)
const ACTIVE_CURRENT: f32 = 0.1;

impl SmartMotors {
    /// One control period of `elapsed_ms`
    pub fn control_cycle(&mut self, elapsed_ms: u32) {
        self.update_speeds(elapsed_ms);
        self.update_motors(elapsed_ms);
        self.update_banks(elapsed_ms);
        self.update_limits();
    }

    /// One slew period
    pub fn slew_cycle(&mut self) {
        for motor in self.motors.iter_mut().filter(|m| m.is_linked()) {
            if motor.enabled {
                motor.req = motor.limit.apply(motor.cmd);
                motor.slew.step(motor.req);
            } else {
                motor.req = 0;
                motor.slew.jump(0);
            }
        }
    }

    fn update_speeds(&mut self, elapsed_ms: u32) {
        let sensors = &self.sensors;
        for motor in self.motors.iter_mut().filter(|m| m.is_linked()) {
            if let Some(rpm) = motor.simulated_rpm {
                motor.rpm = rpm;
                continue;
            }
            let ticks_per_rev = motor.effective_ticks_per_rev();
            motor.rpm = match motor.feedback {
                Feedback::Ime => match motor.ime_position {
                    Some(position) => motor.estimator.update(position, elapsed_ms, ticks_per_rev),
                    // No reading from the bank yet
                    None => simulated_rpm(motor.output(), motor.electrics.rpm_free),
                },
                Feedback::Sensor(id) => match sensors.get(id.0 as usize) {
                    Some(sensor) => {
                        motor
                            .estimator
                            .update(sensor.value, elapsed_ms, ticks_per_rev)
                    }
                    None => simulated_rpm(motor.output(), motor.electrics.rpm_free),
                },
                Feedback::None => simulated_rpm(motor.output(), motor.electrics.rpm_free),
                // Filled in below once every master has a speed
                Feedback::Shared(_) => motor.rpm,
            };
        }

        for index in 0..MAX_MOTORS {
            let motor = &self.motors[index];
            if motor.simulated_rpm.is_some() {
                continue;
            }
            if let Feedback::Shared(master) = motor.feedback {
                let rpm = self.motors[master as usize].rpm;
                self.motors[index].rpm = rpm;
            }
        }
    }

    fn update_motors(&mut self, elapsed_ms: u32) {
        let current_monitor = self.monitors.current;
        for motor in self.motors.iter_mut() {
            let Some(binding) = motor.binding else {
                continue;
            };
            let v_battery = self.banks[binding.bank as usize].battery_voltage();
            let id = motor.id;

            if motor.enabled {
                if let Some(pid) = motor.pid.as_mut() {
                    motor.cmd = pid.update(motor.rpm);
                }
            }

            let current = motor
                .measured_current
                .unwrap_or_else(|| motor.electrics.estimate_current(motor.output(), motor.rpm, v_battery));
            motor.sense.record(current);

            let temperature = motor.thermal.update(current, elapsed_ms);
            if motor.ptc.update(temperature) {
                self.events.push(if motor.ptc.is_tripped() {
                    Event::PtcTripped { motor: id }
                } else {
                    Event::PtcCleared { motor: id }
                });
            }

            if current_monitor
                && motor
                    .current_latch
                    .update(motor.sense.filtered, motor.current_limit)
            {
                self.events.push(if motor.current_latch.is_tripped() {
                    Event::CurrentLimited { motor: id }
                } else {
                    Event::CurrentReleased { motor: id }
                });
            }
        }
    }

    fn update_banks(&mut self, elapsed_ms: u32) {
        for bank in self.banks.iter_mut() {
            let total: f32 = bank
                .slots
                .iter()
                .flatten()
                .map(|id| self.motors[*id as usize].sense.current.abs())
                .sum();
            bank.sense.record(total);
            let temperature = bank.thermal.update(total, elapsed_ms);

            if bank.expander_failed {
                bank.pin_failed();
            } else if bank.ptc.update(temperature) {
                let index = bank.index;
                self.events.push(if bank.ptc.is_tripped() {
                    Event::BankTripped { bank: index }
                } else {
                    Event::BankCleared { bank: index }
                });
            }

            let motor_tripped = bank.slots.iter().flatten().any(|id| {
                let motor = &self.motors[*id as usize];
                motor.ptc.is_tripped() || motor.current_latch.is_tripped()
            });
            bank.led_on = bank.ptc.is_tripped() || motor_tripped;
        }
    }

    fn update_limits(&mut self) {
        let ptc_monitor = self.monitors.ptc;
        let current_monitor = self.monitors.current;

        // A tripped bank splits its safe current across the motors drawing from it
        let mut shares = [None; TOTAL_NUM_CONTROL_BANKS];
        for (share, bank) in shares.iter_mut().zip(self.banks.iter()) {
            if !bank.ptc.is_tripped() {
                continue;
            }
            let active = bank
                .slots
                .iter()
                .flatten()
                .filter(|id| self.motors[**id as usize].sense.current.abs() > ACTIVE_CURRENT)
                .count()
                .max(1);
            *share = Some(bank.safe_current / active as f32);
        }

        for motor in self.motors.iter_mut() {
            let Some(binding) = motor.binding else {
                continue;
            };
            let v_battery = self.banks[binding.bank as usize].battery_voltage();

            let mut limit = CommandLimit::NONE;
            if ptc_monitor {
                let motor_safe = motor.ptc.is_tripped().then_some(motor.kind.profile().i_safe);
                if let Some(target) = thermal_target(motor_safe, shares[binding.bank as usize]) {
                    limit = limit.tighten(motor.electrics.safe_limit(target, motor.rpm, v_battery));
                }
            }
            if current_monitor {
                limit = limit.tighten(motor.electrics.safe_limit(
                    motor.current_limit,
                    motor.rpm,
                    v_battery,
                ));
            }
            motor.limit = limit;

            if motor.enabled {
                motor.req = limit.apply(motor.cmd);
            } else {
                motor.req = 0;
                motor.slew.jump(0);
            }
            motor.led_on = motor.ptc.is_tripped() || motor.current_latch.is_tripped();
        }
    }
}
