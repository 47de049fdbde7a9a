//! Motor and controller registry
//!
//! [`SmartMotors`] owns every motor, bank and sensor record in fixed-size
//! tables indexed by small integers. Other code gets shared references
//! through bounds-checked accessors; all mutation goes through the named
//! setters below, each of which validates its arguments and leaves the
//! registry untouched when it returns an error.

pub mod bank;
mod cycle;
pub mod motor;
pub mod sensor;
pub mod status;

use heapless::Vec;
use smartmotor_protocol::FrameLayout;

use crate::config::{BankKind, FeedbackConfig, MotorConfig, SystemConfig, MAX_SENSORS};
use crate::control::{PidGains, SpeedPid};
use crate::current::MotorElectrics;
use crate::error::{ConfigError, SmartMotorError};
use crate::link::LinkHealth;
use crate::profile::{
    MotorKind, MAX_MOTORS, MOTOR_MAX_CMD, MOTOR_MIN_CMD, TOTAL_NUM_BANK_MOTORS,
    TOTAL_NUM_CONTROL_BANKS,
};
use crate::safety::Monitors;
use crate::state::{Event, EventLog, MonitorKind};

pub use bank::{Bank, EXPANDER_MIN_MV};
pub use motor::{Binding, Feedback, Motor};
pub use sensor::{Sensor, SensorDescriptor, SensorId, SensorKind};
pub use status::{BankSnapshot, DebugStatus, MotorSnapshot};

/// The motor runtime's single source of truth
#[derive(Debug, Clone)]
pub struct SmartMotors {
    pub(crate) motors: [Motor; MAX_MOTORS],
    pub(crate) banks: Vec<Bank, TOTAL_NUM_CONTROL_BANKS>,
    pub(crate) sensors: Vec<Sensor, MAX_SENSORS>,
    pub(crate) monitors: Monitors,
    pub(crate) ambient: f32,
    pub(crate) events: EventLog,
}

impl SmartMotors {
    /// Set up banks and sensors; no motors are linked yet
    ///
    /// Fails without building anything if the bank or motor tables exceed
    /// what the system supports.
    pub fn new(config: &SystemConfig) -> Result<Self, ConfigError> {
        if config.banks.len() > TOTAL_NUM_CONTROL_BANKS {
            return Err(ConfigError::TooManyBanks(config.banks.len()));
        }
        for (index, bank) in config.banks.iter().enumerate() {
            if bank.slots as usize > TOTAL_NUM_BANK_MOTORS {
                return Err(ConfigError::TooManySlots {
                    bank: index as u8,
                    slots: bank.slots as usize,
                });
            }
        }
        if config.motors.len() > MAX_MOTORS {
            return Err(ConfigError::TooManyMotors(config.motors.len()));
        }

        let mut banks = Vec::new();
        for (index, bank) in config.banks.iter().enumerate() {
            // Unknown layouts fall back to the master processor format
            let layout = FrameLayout::from_version(bank.layout_version).unwrap_or_default();
            // Length checked above
            let _ = banks.push(Bank::new(index as u8, bank, layout, config.ambient));
        }

        let mut sensors = Vec::new();
        for descriptor in config.sensors.iter() {
            // Same capacity as the config table
            let _ = sensors.push(Sensor::new(*descriptor));
        }

        Ok(Self {
            motors: core::array::from_fn(|id| Motor::new(id as u8, config.ambient)),
            banks,
            sensors,
            monitors: config.monitors,
            ambient: config.ambient,
            events: EventLog::new(),
        })
    }

    /// Set up the registry and link every configured motor
    ///
    /// A motor whose registration fails is skipped and reported with
    /// [`Event::RegistrationFailed`]; the others are still linked.
    pub fn from_config(config: &SystemConfig) -> Result<Self, ConfigError> {
        let mut registry = Self::new(config)?;
        for motor in config.motors.iter() {
            if let Err(error) = registry.apply_motor_config(motor) {
                registry.events.push(Event::RegistrationFailed {
                    motor: motor.id,
                    error,
                });
            }
        }
        Ok(registry)
    }

    /// Link one motor and apply its settings, all or nothing
    pub fn apply_motor_config(&mut self, config: &MotorConfig) -> Result<(), SmartMotorError> {
        let index = self.motor_index(config.id)?;
        let previous = self.motors[index]
            .is_linked()
            .then(|| self.motors[index].clone());
        self.link_motor(config.id, config.bank, config.slot, config.kind)?;
        let applied = self.apply_motor_settings(config);
        if applied.is_err() {
            match previous {
                Some(motor) => self.motors[index] = motor,
                None => {
                    let _ = self.unlink_motor(config.id);
                }
            }
        }
        applied
    }

    fn apply_motor_settings(&mut self, config: &MotorConfig) -> Result<(), SmartMotorError> {
        let id = config.id;
        if let Some(limit) = config.current_limit {
            self.set_limit_current(id, limit)?;
        }
        self.set_slew_rate(id, config.slew_rate)?;
        self.set_deadband(id, config.deadband)?;
        match config.feedback {
            FeedbackConfig::None => {}
            FeedbackConfig::Ime => self.attach_ime(id)?,
            FeedbackConfig::Sensor(index) => {
                let descriptor = self.sensor(SensorId(index))?.descriptor;
                self.set_rpm_sensor(
                    id,
                    SensorId(index),
                    descriptor.ticks_per_rev,
                    descriptor.reversed,
                )?;
            }
            FeedbackConfig::Shared(master) => self.share_feedback(master, id)?,
        }
        if let Some(gearing) = config.encoder_gearing {
            self.set_encoder_gearing(id, gearing)?;
        }
        self.set_motor_status_led(id, config.status_led)?;
        Ok(())
    }

    // -- Accessors --------------------------------------------------------

    pub(crate) fn motor_index(&self, id: u8) -> Result<usize, SmartMotorError> {
        if (id as usize) < MAX_MOTORS {
            Ok(id as usize)
        } else {
            Err(SmartMotorError::InvalidMotor(id))
        }
    }

    pub(crate) fn linked_index(&self, id: u8) -> Result<usize, SmartMotorError> {
        let index = self.motor_index(id)?;
        if self.motors[index].is_linked() {
            Ok(index)
        } else {
            Err(SmartMotorError::Unlinked(id))
        }
    }

    pub(crate) fn bank_index(&self, bank: u8) -> Result<usize, SmartMotorError> {
        if (bank as usize) < self.banks.len() {
            Ok(bank as usize)
        } else {
            Err(SmartMotorError::InvalidBank(bank))
        }
    }

    /// Motor record by logical id
    pub fn motor(&self, id: u8) -> Result<&Motor, SmartMotorError> {
        self.motor_index(id).map(|index| &self.motors[index])
    }

    /// Bank record by index
    pub fn bank(&self, bank: u8) -> Result<&Bank, SmartMotorError> {
        self.bank_index(bank).map(|index| &self.banks[index])
    }

    /// Sensor record by id
    pub fn sensor(&self, id: SensorId) -> Result<&Sensor, SmartMotorError> {
        self.sensors
            .get(id.0 as usize)
            .ok_or(SmartMotorError::InvalidSensor(id.0))
    }

    pub fn motors(&self) -> impl Iterator<Item = &Motor> {
        self.motors.iter()
    }

    /// Motors bound to a bank slot
    pub fn linked_motors(&self) -> impl Iterator<Item = &Motor> {
        self.motors.iter().filter(|m| m.is_linked())
    }

    pub fn banks(&self) -> &[Bank] {
        &self.banks
    }

    pub fn monitors(&self) -> Monitors {
        self.monitors
    }

    pub fn ambient(&self) -> f32 {
        self.ambient
    }

    /// Take the oldest pending event
    pub fn next_event(&mut self) -> Option<Event> {
        self.events.pop()
    }

    /// Events lost because nobody drained the queue
    pub fn dropped_events(&self) -> u32 {
        self.events.dropped()
    }

    // -- Binding ----------------------------------------------------------

    /// Bind motor `id` to `slot` of `bank` with a motor profile
    ///
    /// Repeating an identical binding is a no-op. Binding a linked motor
    /// elsewhere, or with another profile, is rejected; unlink it first.
    pub fn link_motor(
        &mut self,
        id: u8,
        bank: u8,
        slot: u8,
        kind: MotorKind,
    ) -> Result<(), SmartMotorError> {
        let index = self.motor_index(id)?;
        let bank_index = self.bank_index(bank)?;
        if slot >= self.banks[bank_index].slot_count {
            return Err(SmartMotorError::InvalidSlot { bank, slot });
        }

        let binding = Binding { bank, slot };
        let motor = &self.motors[index];
        match motor.binding {
            Some(existing) if existing == binding && motor.kind == kind => return Ok(()),
            Some(_) => return Err(SmartMotorError::ConflictingBinding(id)),
            None => {}
        }
        if self.banks[bank_index].slots[slot as usize].is_some() {
            return Err(SmartMotorError::SlotOccupied { bank, slot });
        }

        self.motors[index].bind(binding, kind);
        self.banks[bank_index].slots[slot as usize] = Some(id);
        self.events.push(Event::MotorLinked {
            motor: id,
            bank,
            slot,
        });
        Ok(())
    }

    /// Release a motor's slot and reset its state
    ///
    /// Motors sharing its feedback fall back to estimated speed.
    pub fn unlink_motor(&mut self, id: u8) -> Result<(), SmartMotorError> {
        let index = self.linked_index(id)?;
        if let Some(binding) = self.motors[index].binding {
            self.banks[binding.bank as usize].slots[binding.slot as usize] = None;
        }
        for motor in self.motors.iter_mut() {
            if motor.feedback == Feedback::Shared(id) {
                motor.feedback = Feedback::None;
                motor.estimator.reset();
            }
        }
        self.motors[index] = Motor::new(id, self.ambient);
        self.events.push(Event::MotorUnlinked { motor: id });
        Ok(())
    }

    // -- Commands ---------------------------------------------------------

    /// Request a command for a motor
    ///
    /// The value is clamped to the command range. With `immediate` the
    /// output jumps straight to the limited command instead of slewing,
    /// for hard stops. A motor under speed control has its request
    /// replaced by the controller on the next cycle.
    pub fn set_motor(&mut self, id: u8, value: i16, immediate: bool) -> Result<(), SmartMotorError> {
        let index = self.linked_index(id)?;
        let motor = &mut self.motors[index];
        motor.cmd = value.clamp(MOTOR_MIN_CMD, MOTOR_MAX_CMD);
        if immediate {
            motor.req = if motor.enabled {
                motor.limit.apply(motor.cmd)
            } else {
                0
            };
            motor.slew.jump(motor.req);
        }
        Ok(())
    }

    /// Enable a motor
    pub fn run(&mut self, id: u8) -> Result<(), SmartMotorError> {
        let index = self.linked_index(id)?;
        if !self.motors[index].enabled {
            self.motors[index].enabled = true;
            self.events.push(Event::MotorRunning { motor: id });
        }
        Ok(())
    }

    /// Disable a motor
    ///
    /// The output is forced to zero by the next cycle. Its thermal model
    /// keeps running so heat is not forgotten when it restarts.
    pub fn stop(&mut self, id: u8) -> Result<(), SmartMotorError> {
        let index = self.linked_index(id)?;
        if self.motors[index].enabled {
            self.motors[index].enabled = false;
            if let Some(pid) = self.motors[index].pid.as_mut() {
                pid.reset();
            }
            self.events.push(Event::MotorStopped { motor: id });
        }
        Ok(())
    }

    pub fn run_all(&mut self) {
        for id in 0..MAX_MOTORS as u8 {
            let _ = self.run(id);
        }
    }

    pub fn stop_all(&mut self) {
        for id in 0..MAX_MOTORS as u8 {
            let _ = self.stop(id);
        }
    }

    // -- Limits and shaping -----------------------------------------------

    /// Current ceiling for the current monitor (A)
    pub fn set_limit_current(&mut self, id: u8, amps: f32) -> Result<(), SmartMotorError> {
        let index = self.linked_index(id)?;
        if !amps.is_finite() || amps <= 0.0 {
            return Err(SmartMotorError::InvalidArgument);
        }
        self.motors[index].current_limit = amps;
        Ok(())
    }

    /// Override the free running speed, for motors geared or loaded
    /// differently from stock
    pub fn set_free_rpm(&mut self, id: u8, rpm: f32) -> Result<(), SmartMotorError> {
        let index = self.linked_index(id)?;
        if !rpm.is_finite() || rpm <= 0.0 {
            return Err(SmartMotorError::InvalidArgument);
        }
        let motor = &mut self.motors[index];
        motor.electrics = MotorElectrics::with_free_rpm(motor.kind.profile(), rpm);
        Ok(())
    }

    /// Command units per slew tick, e.g. `DEFAULT_SLEW_RATE` or `FAST_SLEW_RATE`
    pub fn set_slew_rate(&mut self, id: u8, rate: i16) -> Result<(), SmartMotorError> {
        let index = self.linked_index(id)?;
        if rate <= 0 {
            return Err(SmartMotorError::InvalidArgument);
        }
        self.motors[index].slew.set_rate(rate);
        Ok(())
    }

    pub fn set_deadband(&mut self, id: u8, deadband: i16) -> Result<(), SmartMotorError> {
        let index = self.linked_index(id)?;
        if !(0..=MOTOR_MAX_CMD).contains(&deadband) {
            return Err(SmartMotorError::InvalidArgument);
        }
        self.motors[index].slew.set_deadband(deadband);
        Ok(())
    }

    /// Turn a protection on or off
    ///
    /// Switching one off removes its limit for every motor. The change is
    /// always reported as an event.
    pub fn set_monitor(&mut self, monitor: MonitorKind, enabled: bool) {
        match monitor {
            MonitorKind::Ptc => self.monitors.ptc = enabled,
            MonitorKind::Current => self.monitors.current = enabled,
        }
        if monitor == MonitorKind::Current && !enabled {
            for motor in self.motors.iter_mut() {
                motor.current_latch.clear();
            }
        }
        self.events.push(Event::MonitorChanged { monitor, enabled });
    }

    pub fn enable_ptc_monitor(&mut self) {
        self.set_monitor(MonitorKind::Ptc, true);
    }

    pub fn disable_ptc_monitor(&mut self) {
        self.set_monitor(MonitorKind::Ptc, false);
    }

    pub fn enable_current_monitor(&mut self) {
        self.set_monitor(MonitorKind::Current, true);
    }

    pub fn disable_current_monitor(&mut self) {
        self.set_monitor(MonitorKind::Current, false);
    }

    /// Ambient temperature for every thermal model (°C)
    pub fn set_ambient(&mut self, ambient: f32) -> Result<(), SmartMotorError> {
        if !ambient.is_finite() {
            return Err(SmartMotorError::InvalidArgument);
        }
        self.ambient = ambient;
        for motor in self.motors.iter_mut() {
            motor.thermal.set_ambient(ambient);
        }
        for bank in self.banks.iter_mut() {
            bank.thermal.set_ambient(ambient);
        }
        Ok(())
    }

    // -- Feedback ---------------------------------------------------------

    /// Add a sensor to the table
    pub fn register_sensor(&mut self, descriptor: SensorDescriptor) -> Result<SensorId, SmartMotorError> {
        let id = self.sensors.len() as u8;
        self.sensors
            .push(Sensor::new(descriptor))
            .map_err(|_| SmartMotorError::SensorTableFull)?;
        Ok(SensorId(id))
    }

    /// Store the latest raw value read from a sensor
    pub fn update_sensor(&mut self, id: SensorId, value: i32) -> Result<(), SmartMotorError> {
        let sensor = self
            .sensors
            .get_mut(id.0 as usize)
            .ok_or(SmartMotorError::InvalidSensor(id.0))?;
        sensor.value = value;
        Ok(())
    }

    /// Use the motor's integrated encoder, reported over the bank link
    pub fn attach_ime(&mut self, id: u8) -> Result<(), SmartMotorError> {
        let index = self.linked_index(id)?;
        let motor = &mut self.motors[index];
        let ticks = motor
            .kind
            .profile()
            .ime_ticks_per_rev
            .ok_or(SmartMotorError::UnsupportedSensor(id))?;
        motor.feedback = Feedback::Ime;
        motor.ticks_per_rev = ticks;
        motor.gearing = 1.0;
        motor.estimator.reset();
        Ok(())
    }

    /// Use a registered encoder or potentiometer for speed
    ///
    /// `ticks_per_rev` counts per output revolution; `reversed` flips the
    /// sign for sensors that count down when the motor runs forward.
    pub fn set_rpm_sensor(
        &mut self,
        id: u8,
        sensor: SensorId,
        ticks_per_rev: f32,
        reversed: bool,
    ) -> Result<(), SmartMotorError> {
        let index = self.linked_index(id)?;
        let kind = self.sensor(sensor)?.descriptor.kind;
        if !kind.provides_speed() {
            return Err(SmartMotorError::UnsupportedSensor(sensor.0));
        }
        if !ticks_per_rev.is_finite() || ticks_per_rev <= 0.0 {
            return Err(SmartMotorError::InvalidArgument);
        }
        let motor = &mut self.motors[index];
        motor.feedback = Feedback::Sensor(sensor);
        motor.ticks_per_rev = if reversed { -ticks_per_rev } else { ticks_per_rev };
        motor.gearing = 1.0;
        motor.estimator.reset();
        Ok(())
    }

    /// Gearing between a quadrature encoder and the motor output
    pub fn set_encoder_gearing(&mut self, id: u8, ratio: f32) -> Result<(), SmartMotorError> {
        let index = self.linked_index(id)?;
        if !ratio.is_finite() || ratio <= 0.0 {
            return Err(SmartMotorError::InvalidArgument);
        }
        let Feedback::Sensor(sensor) = self.motors[index].feedback else {
            return Err(SmartMotorError::UnsupportedSensor(id));
        };
        if self.sensor(sensor)?.descriptor.kind != SensorKind::QuadEncoder {
            return Err(SmartMotorError::UnsupportedSensor(sensor.0));
        }
        self.motors[index].gearing = ratio;
        Ok(())
    }

    /// Let `slave` use the speed measured for `master`
    ///
    /// For motors coupled to the same shaft where only one has a sensor.
    pub fn share_feedback(&mut self, master: u8, slave: u8) -> Result<(), SmartMotorError> {
        let master_index = self.linked_index(master)?;
        let slave_index = self.linked_index(slave)?;
        if master == slave || matches!(self.motors[master_index].feedback, Feedback::Shared(_)) {
            return Err(SmartMotorError::InvalidArgument);
        }
        let motor = &mut self.motors[slave_index];
        motor.feedback = Feedback::Shared(master);
        motor.estimator.reset();
        Ok(())
    }

    /// Go back to estimating speed from the command
    pub fn clear_feedback(&mut self, id: u8) -> Result<(), SmartMotorError> {
        let index = self.linked_index(id)?;
        let motor = &mut self.motors[index];
        motor.feedback = Feedback::None;
        motor.ticks_per_rev = 0.0;
        motor.gearing = 1.0;
        motor.estimator.reset();
        Ok(())
    }

    /// Replace the measured speed with a fixed value, or clear the override
    pub fn simulate_speed(&mut self, id: u8, rpm: Option<f32>) -> Result<(), SmartMotorError> {
        let index = self.linked_index(id)?;
        if rpm.is_some_and(|r| !r.is_finite()) {
            return Err(SmartMotorError::InvalidArgument);
        }
        self.motors[index].simulated_rpm = rpm;
        Ok(())
    }

    // -- Speed control ----------------------------------------------------

    /// Put a motor under closed-loop speed control
    ///
    /// Existing controller state is kept if one is already configured.
    pub fn set_speed_pid(&mut self, id: u8, gains: PidGains) -> Result<(), SmartMotorError> {
        let index = self.linked_index(id)?;
        match self.motors[index].pid.as_mut() {
            Some(pid) => pid.set_gains(gains),
            None => {
                self.motors[index].pid = Some(SpeedPid::new(gains)?);
                Ok(())
            }
        }
    }

    /// Target speed for a motor under speed control (rpm)
    pub fn set_target_speed(&mut self, id: u8, rpm: f32) -> Result<(), SmartMotorError> {
        let index = self.linked_index(id)?;
        if !rpm.is_finite() {
            return Err(SmartMotorError::InvalidArgument);
        }
        self.speed_pid_mut(index)?.set_target(rpm);
        Ok(())
    }

    /// Pause or resume a motor's speed controller
    ///
    /// A paused controller commands zero and forgets its accumulated state.
    pub fn set_speed_pid_enabled(&mut self, id: u8, enabled: bool) -> Result<(), SmartMotorError> {
        let index = self.linked_index(id)?;
        self.speed_pid_mut(index)?.set_enabled(enabled);
        Ok(())
    }

    /// Speed errors smaller than `rpm` are ignored by the controller
    pub fn set_speed_error_threshold(&mut self, id: u8, rpm: f32) -> Result<(), SmartMotorError> {
        let index = self.linked_index(id)?;
        if !rpm.is_finite() || rpm < 0.0 {
            return Err(SmartMotorError::InvalidArgument);
        }
        self.speed_pid_mut(index)?.set_error_threshold(rpm);
        Ok(())
    }

    /// Pass the controller output through the drive linearization curve
    pub fn set_speed_linearize(&mut self, id: u8, linearize: bool) -> Result<(), SmartMotorError> {
        let index = self.linked_index(id)?;
        self.speed_pid_mut(index)?.set_linearize(linearize);
        Ok(())
    }

    fn speed_pid_mut(&mut self, index: usize) -> Result<&mut SpeedPid, SmartMotorError> {
        let motor = &mut self.motors[index];
        let id = motor.id;
        motor.pid.as_mut().ok_or(SmartMotorError::NoSpeedControl(id))
    }

    /// Return a motor to open-loop commands
    pub fn clear_speed_pid(&mut self, id: u8) -> Result<(), SmartMotorError> {
        let index = self.linked_index(id)?;
        let motor = &mut self.motors[index];
        if motor.pid.take().is_none() {
            return Err(SmartMotorError::NoSpeedControl(id));
        }
        motor.cmd = 0;
        Ok(())
    }

    // -- Status indicators ------------------------------------------------

    pub fn set_controller_status_led(&mut self, bank: u8, led: Option<u8>) -> Result<(), SmartMotorError> {
        let index = self.bank_index(bank)?;
        self.banks[index].status_led = led;
        Ok(())
    }

    pub fn set_motor_status_led(&mut self, id: u8, led: Option<u8>) -> Result<(), SmartMotorError> {
        let index = self.motor_index(id)?;
        self.motors[index].status_led = led;
        Ok(())
    }

    // -- Power expander ---------------------------------------------------

    /// Analog channel carrying a power expander's status voltage
    pub fn set_power_expander_status_port(
        &mut self,
        bank: u8,
        port: Option<u8>,
    ) -> Result<(), SmartMotorError> {
        let index = self.bank_index(bank)?;
        if self.banks[index].kind != BankKind::PowerExpander {
            return Err(SmartMotorError::InvalidArgument);
        }
        self.banks[index].status_port = port;
        Ok(())
    }

    /// Feed the voltage read on a power expander's status port (mV)
    ///
    /// A reading under [`EXPANDER_MIN_MV`] means the expander lost its
    /// supply. The bank is then held tripped with no safe current until
    /// restart.
    pub fn report_expander_voltage(&mut self, bank: u8, millivolts: u16) -> Result<(), SmartMotorError> {
        let index = self.bank_index(bank)?;
        let b = &mut self.banks[index];
        if b.kind != BankKind::PowerExpander || b.status_port.is_none() {
            return Err(SmartMotorError::InvalidArgument);
        }
        b.expander_mv = Some(millivolts);
        if millivolts >= EXPANDER_MIN_MV {
            b.battery_mv = Some(millivolts);
        } else if !b.expander_failed {
            b.expander_failed = true;
            b.pin_failed();
            self.events.push(Event::ExpanderUndervoltage { bank, millivolts });
            self.events.push(Event::BankTripped { bank });
        }
        Ok(())
    }

    // -- Telemetry --------------------------------------------------------

    /// Motor speed (rpm)
    pub fn speed(&self, id: u8) -> Result<f32, SmartMotorError> {
        Ok(self.motors[self.linked_index(id)?].rpm)
    }

    /// Motor current magnitude (A)
    pub fn current(&self, id: u8) -> Result<f32, SmartMotorError> {
        Ok(self.motors[self.linked_index(id)?].sense.current.abs())
    }

    /// Motor current with direction (A)
    pub fn current_signed(&self, id: u8) -> Result<f32, SmartMotorError> {
        Ok(self.motors[self.linked_index(id)?].sense.current)
    }

    /// Largest current magnitude seen (A)
    pub fn peak_current(&self, id: u8) -> Result<f32, SmartMotorError> {
        Ok(self.motors[self.linked_index(id)?].sense.peak)
    }

    /// Estimated PTC temperature (°C)
    pub fn temperature(&self, id: u8) -> Result<f32, SmartMotorError> {
        Ok(self.motors[self.linked_index(id)?].temperature())
    }

    /// Signed limit in the direction of the current command
    pub fn limit_cmd(&self, id: u8) -> Result<i16, SmartMotorError> {
        let motor = &self.motors[self.linked_index(id)?];
        Ok(motor.limit.toward(motor.cmd))
    }

    /// Applied output after slewing
    pub fn output(&self, id: u8) -> Result<i16, SmartMotorError> {
        Ok(self.motors[self.linked_index(id)?].output())
    }

    /// Total current drawn through a bank (A)
    pub fn controller_current(&self, bank: u8) -> Result<f32, SmartMotorError> {
        Ok(self.banks[self.bank_index(bank)?].sense.current)
    }

    /// Estimated bank PTC temperature (°C)
    pub fn controller_temperature(&self, bank: u8) -> Result<f32, SmartMotorError> {
        Ok(self.banks[self.bank_index(bank)?].temperature())
    }

    pub fn link_status(&self, bank: u8) -> Result<LinkHealth, SmartMotorError> {
        Ok(self.banks[self.bank_index(bank)?].link)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BankConfig, MotorConfig};
    use crate::profile::{FAST_SLEW_RATE, TEMP_AMBIENT};

    fn registry() -> SmartMotors {
        SmartMotors::new(&SystemConfig::default()).unwrap()
    }

    fn drain(registry: &mut SmartMotors) -> std::vec::Vec<Event> {
        core::iter::from_fn(|| registry.next_event()).collect()
    }

    extern crate std;

    #[test]
    fn test_too_many_banks_rejected() {
        let mut config = SystemConfig::default();
        config.banks.push(BankConfig::power_expander(None)).unwrap();
        config.banks.push(BankConfig::cortex()).unwrap();
        assert_eq!(
            SmartMotors::new(&config).err(),
            Some(ConfigError::TooManyBanks(4))
        );
    }

    #[test]
    fn test_too_many_slots_rejected() {
        let mut config = SystemConfig::default();
        config.banks[1].slots = 6;
        assert_eq!(
            SmartMotors::new(&config).err(),
            Some(ConfigError::TooManySlots { bank: 1, slots: 6 })
        );
    }

    #[test]
    fn test_too_many_motors_rejected() {
        let mut config = SystemConfig::default();
        for id in 0..=MAX_MOTORS as u8 {
            config
                .motors
                .push(MotorConfig::new(id, 0, 0, MotorKind::Torque393))
                .unwrap();
        }
        assert_eq!(
            SmartMotors::new(&config).err(),
            Some(ConfigError::TooManyMotors(MAX_MOTORS + 1))
        );
    }

    #[test]
    fn test_link_is_idempotent() {
        let mut sm = registry();
        sm.link_motor(3, 0, 2, MotorKind::Motor269).unwrap();
        sm.set_motor(3, 50, false).unwrap();
        sm.link_motor(3, 0, 2, MotorKind::Motor269).unwrap();
        // Second identical link did not reset state
        assert_eq!(sm.motor(3).unwrap().command(), 50);
        assert_eq!(sm.bank(0).unwrap().motor_in(2), Some(3));
    }

    #[test]
    fn test_conflicting_rebind_rejected() {
        let mut sm = registry();
        sm.link_motor(3, 0, 2, MotorKind::Motor269).unwrap();
        assert_eq!(
            sm.link_motor(3, 1, 2, MotorKind::Motor269),
            Err(SmartMotorError::ConflictingBinding(3))
        );
        assert_eq!(
            sm.link_motor(3, 0, 2, MotorKind::Torque393),
            Err(SmartMotorError::ConflictingBinding(3))
        );
        assert_eq!(
            sm.link_motor(4, 0, 2, MotorKind::Motor269),
            Err(SmartMotorError::SlotOccupied { bank: 0, slot: 2 })
        );
        assert!(!sm.motor(4).unwrap().is_linked());
    }

    #[test]
    fn test_link_bounds() {
        let mut sm = registry();
        assert_eq!(
            sm.link_motor(MAX_MOTORS as u8, 0, 0, MotorKind::Torque393),
            Err(SmartMotorError::InvalidMotor(MAX_MOTORS as u8))
        );
        assert_eq!(
            sm.link_motor(0, 2, 0, MotorKind::Torque393),
            Err(SmartMotorError::InvalidBank(2))
        );
        assert_eq!(
            sm.link_motor(0, 0, 5, MotorKind::Torque393),
            Err(SmartMotorError::InvalidSlot { bank: 0, slot: 5 })
        );
    }

    #[test]
    fn test_unlink_frees_slot() {
        let mut sm = registry();
        sm.link_motor(1, 0, 0, MotorKind::Torque393).unwrap();
        sm.unlink_motor(1).unwrap();
        assert_eq!(sm.bank(0).unwrap().motor_in(0), None);
        sm.link_motor(2, 0, 0, MotorKind::Torque393).unwrap();
        assert_eq!(sm.unlink_motor(1), Err(SmartMotorError::Unlinked(1)));
    }

    #[test]
    fn test_commands_require_linked_motor() {
        let mut sm = registry();
        assert_eq!(sm.set_motor(0, 10, false), Err(SmartMotorError::Unlinked(0)));
        assert_eq!(sm.run(0), Err(SmartMotorError::Unlinked(0)));
        assert_eq!(
            sm.set_motor(42, 10, false),
            Err(SmartMotorError::InvalidMotor(42))
        );
        assert_eq!(sm.speed(0), Err(SmartMotorError::Unlinked(0)));
    }

    #[test]
    fn test_set_motor_clamps() {
        let mut sm = registry();
        sm.link_motor(0, 0, 0, MotorKind::Torque393).unwrap();
        sm.set_motor(0, 500, false).unwrap();
        assert_eq!(sm.motor(0).unwrap().command(), MOTOR_MAX_CMD);
        sm.set_motor(0, -500, false).unwrap();
        assert_eq!(sm.motor(0).unwrap().command(), MOTOR_MIN_CMD);
    }

    #[test]
    fn test_immediate_skips_slew() {
        let mut sm = registry();
        sm.link_motor(0, 0, 0, MotorKind::Torque393).unwrap();
        sm.set_motor(0, 100, true).unwrap();
        assert_eq!(sm.output(0), Ok(100));
        sm.set_motor(0, 0, true).unwrap();
        assert_eq!(sm.output(0), Ok(0));
    }

    #[test]
    fn test_invalid_arguments_mutate_nothing() {
        let mut sm = registry();
        sm.link_motor(0, 0, 0, MotorKind::Torque393).unwrap();
        assert_eq!(sm.set_slew_rate(0, 0), Err(SmartMotorError::InvalidArgument));
        assert_eq!(sm.motor(0).unwrap().slew_rate(), 10);
        assert_eq!(
            sm.set_limit_current(0, f32::NAN),
            Err(SmartMotorError::InvalidArgument)
        );
        assert_eq!(sm.motor(0).unwrap().current_limit(), 0.9);
        assert_eq!(
            sm.set_speed_pid(0, PidGains::new(-1.0, 0.0, 0.0)),
            Err(SmartMotorError::InvalidArgument)
        );
        assert!(sm.motor(0).unwrap().speed_pid().is_none());
        sm.set_slew_rate(0, FAST_SLEW_RATE).unwrap();
        assert_eq!(sm.motor(0).unwrap().slew_rate(), FAST_SLEW_RATE);
    }

    #[test]
    fn test_rejected_config_keeps_linked_motor() {
        let mut sm = registry();
        sm.link_motor(0, 0, 0, MotorKind::Torque393).unwrap();
        let before = sm.motor(0).unwrap().current_limit();

        let mut config = MotorConfig::new(0, 0, 0, MotorKind::Torque393);
        config.current_limit = Some(2.5);
        config.slew_rate = 0;
        assert_eq!(sm.apply_motor_config(&config), Err(SmartMotorError::InvalidArgument));

        let motor = sm.motor(0).unwrap();
        assert!(motor.is_linked());
        assert_eq!(motor.current_limit(), before);
        assert_eq!(motor.slew_rate(), 10);
    }

    #[test]
    fn test_speed_pid_settings() {
        let mut sm = registry();
        sm.link_motor(0, 0, 0, MotorKind::Torque393).unwrap();
        assert_eq!(
            sm.set_speed_pid_enabled(0, false),
            Err(SmartMotorError::NoSpeedControl(0))
        );

        sm.set_speed_pid(0, PidGains::new(0.01, 0.0, 0.0)).unwrap();
        sm.set_speed_error_threshold(0, 2.5).unwrap();
        sm.set_speed_linearize(0, true).unwrap();
        assert_eq!(
            sm.set_speed_error_threshold(0, -1.0),
            Err(SmartMotorError::InvalidArgument)
        );
        assert_eq!(
            sm.set_speed_error_threshold(0, f32::NAN),
            Err(SmartMotorError::InvalidArgument)
        );
        let pid = sm.motor(0).unwrap().speed_pid().unwrap();
        assert_eq!(pid.error_threshold(), 2.5);
        assert!(pid.is_linearized());

        sm.set_target_speed(0, 80.0).unwrap();
        sm.simulate_speed(0, Some(0.0)).unwrap();
        sm.set_speed_pid_enabled(0, false).unwrap();
        sm.control_cycle(20);
        assert_eq!(sm.motor(0).unwrap().command(), 0);

        sm.set_speed_pid_enabled(0, true).unwrap();
        sm.control_cycle(20);
        assert!(sm.motor(0).unwrap().command() > 0);
    }

    #[test]
    fn test_from_config_skips_bad_motor() {
        let mut config = SystemConfig::default();
        config
            .motors
            .push(MotorConfig::new(0, 0, 0, MotorKind::Torque393))
            .unwrap();
        // Bank 5 does not exist
        config
            .motors
            .push(MotorConfig::new(1, 5, 0, MotorKind::Torque393))
            .unwrap();
        // 3-wire motors have no IME
        config
            .motors
            .push(MotorConfig::new(2, 1, 0, MotorKind::ThreeWire).with_feedback(FeedbackConfig::Ime))
            .unwrap();
        config
            .motors
            .push(MotorConfig::new(3, 1, 1, MotorKind::Motor269))
            .unwrap();

        let mut sm = SmartMotors::from_config(&config).unwrap();
        assert!(sm.motor(0).unwrap().is_linked());
        assert!(!sm.motor(1).unwrap().is_linked());
        assert!(!sm.motor(2).unwrap().is_linked());
        assert_eq!(sm.bank(1).unwrap().motor_in(0), None);
        assert!(sm.motor(3).unwrap().is_linked());

        let failures: std::vec::Vec<_> = drain(&mut sm)
            .into_iter()
            .filter(|e| matches!(e, Event::RegistrationFailed { .. }))
            .collect();
        assert_eq!(
            failures,
            [
                Event::RegistrationFailed {
                    motor: 1,
                    error: SmartMotorError::InvalidBank(5)
                },
                Event::RegistrationFailed {
                    motor: 2,
                    error: SmartMotorError::UnsupportedSensor(2)
                },
            ]
        );
    }

    #[test]
    fn test_monitor_toggle_is_reported() {
        let mut sm = registry();
        sm.disable_ptc_monitor();
        sm.enable_current_monitor();
        assert!(!sm.monitors().ptc);
        assert!(sm.monitors().current);
        let events = drain(&mut sm);
        assert!(events[0].is_safety_override());
        assert_eq!(
            events[1],
            Event::MonitorChanged {
                monitor: MonitorKind::Current,
                enabled: true
            }
        );
    }

    #[test]
    fn test_sensor_feedback_rules() {
        let mut sm = registry();
        sm.link_motor(0, 0, 0, MotorKind::Torque393).unwrap();
        let sonar = sm
            .register_sensor(SensorDescriptor::new(SensorKind::SonarCm, 4))
            .unwrap();
        let enc = sm
            .register_sensor(SensorDescriptor::new(SensorKind::QuadEncoder, 1))
            .unwrap();
        assert_eq!(
            sm.set_rpm_sensor(0, sonar, 360.0, false),
            Err(SmartMotorError::UnsupportedSensor(sonar.0))
        );
        // Gearing needs a quadrature encoder
        assert_eq!(
            sm.set_encoder_gearing(0, 2.0),
            Err(SmartMotorError::UnsupportedSensor(0))
        );
        sm.set_rpm_sensor(0, enc, 360.0, true).unwrap();
        sm.set_encoder_gearing(0, 2.0).unwrap();
        assert_eq!(sm.motor(0).unwrap().effective_ticks_per_rev(), -720.0);
    }

    #[test]
    fn test_share_feedback_rules() {
        let mut sm = registry();
        sm.link_motor(0, 0, 0, MotorKind::Torque393).unwrap();
        sm.link_motor(1, 0, 1, MotorKind::Torque393).unwrap();
        sm.link_motor(2, 0, 2, MotorKind::Torque393).unwrap();
        assert_eq!(sm.share_feedback(0, 0), Err(SmartMotorError::InvalidArgument));
        sm.share_feedback(0, 1).unwrap();
        // No chains
        assert_eq!(sm.share_feedback(1, 2), Err(SmartMotorError::InvalidArgument));
        sm.unlink_motor(0).unwrap();
        assert_eq!(sm.motor(1).unwrap().feedback(), Feedback::None);
    }

    #[test]
    fn test_expander_undervoltage_latches() {
        let mut config = SystemConfig::default();
        config.banks.push(BankConfig::power_expander(Some(3))).unwrap();
        let mut sm = SmartMotors::new(&config).unwrap();
        assert_eq!(
            sm.report_expander_voltage(0, 2_000),
            Err(SmartMotorError::InvalidArgument)
        );
        sm.report_expander_voltage(2, 7_400).unwrap();
        assert!(!sm.bank(2).unwrap().expander_failed());
        sm.report_expander_voltage(2, 1_200).unwrap();
        sm.report_expander_voltage(2, 7_400).unwrap();
        let bank = sm.bank(2).unwrap();
        assert!(bank.expander_failed());
        assert!(bank.ptc_tripped());
        assert_eq!(bank.safe_current(), 0.0);
    }

    #[test]
    fn test_set_ambient_applies_everywhere() {
        let mut sm = registry();
        sm.link_motor(0, 0, 0, MotorKind::Torque393).unwrap();
        assert_eq!(sm.temperature(0), Ok(TEMP_AMBIENT));
        sm.set_ambient(30.0).unwrap();
        assert_eq!(sm.temperature(0), Ok(30.0));
        assert_eq!(sm.controller_temperature(1), Ok(30.0));
        assert_eq!(sm.set_ambient(f32::NAN), Err(SmartMotorError::InvalidArgument));
    }
}
