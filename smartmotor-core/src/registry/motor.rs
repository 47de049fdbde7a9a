//! Per-motor record

use smartmotor_protocol::SlotFault;

use super::sensor::SensorId;
use crate::control::{SpeedEstimator, SpeedPid};
use crate::current::{CurrentSense, MotorElectrics};
use crate::profile::{MotorKind, MotorProfile, DEFAULT_SLEW_RATE, MOTOR_DEADBAND};
use crate::safety::{CommandLimit, CurrentLatch, PtcLatch};
use crate::slew::SlewLimiter;
use crate::thermal::ThermalModel;

/// Physical location of a motor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Binding {
    pub bank: u8,
    pub slot: u8,
}

/// Where a motor's speed comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Feedback {
    /// Estimated from the applied command
    #[default]
    None,
    /// Integrated encoder position reported by the bank controller
    Ime,
    /// Registered sensor
    Sensor(SensorId),
    /// Speed of another motor on the same shaft
    Shared(u8),
}

/// Runtime state of one logical motor
///
/// Fields are only written through [`super::SmartMotors`].
#[derive(Debug, Clone)]
pub struct Motor {
    pub(crate) id: u8,
    pub(crate) binding: Option<Binding>,
    pub(crate) kind: MotorKind,
    pub(crate) electrics: MotorElectrics,
    pub(crate) current_limit: f32,
    pub(crate) enabled: bool,

    /// Requested command, from `set_motor` or the speed controller
    pub(crate) cmd: i16,
    /// Command after protection limits
    pub(crate) req: i16,
    pub(crate) limit: CommandLimit,
    pub(crate) slew: SlewLimiter,

    pub(crate) thermal: ThermalModel,
    pub(crate) ptc: PtcLatch,
    pub(crate) current_latch: CurrentLatch,
    pub(crate) sense: CurrentSense,
    /// Latest current reported by the controller (A)
    pub(crate) measured_current: Option<f32>,
    /// Latest driver temperature reported by the controller (°C)
    pub(crate) driver_temperature: Option<f32>,
    pub(crate) fault: SlotFault,

    pub(crate) rpm: f32,
    pub(crate) estimator: SpeedEstimator,
    pub(crate) feedback: Feedback,
    /// Signed counts per output revolution of the feedback sensor
    pub(crate) ticks_per_rev: f32,
    pub(crate) gearing: f32,
    pub(crate) ime_position: Option<i32>,
    pub(crate) pid: Option<SpeedPid>,
    pub(crate) simulated_rpm: Option<f32>,

    pub(crate) status_led: Option<u8>,
    pub(crate) led_on: bool,
}

impl Motor {
    /// An unbound motor slot
    pub(crate) fn new(id: u8, ambient: f32) -> Self {
        let profile = MotorKind::default().profile();
        Self {
            id,
            binding: None,
            kind: profile.kind,
            electrics: MotorElectrics::from_profile(profile),
            current_limit: profile.i_safe,
            enabled: false,
            cmd: 0,
            req: 0,
            limit: CommandLimit::NONE,
            slew: SlewLimiter::new(DEFAULT_SLEW_RATE, MOTOR_DEADBAND),
            thermal: ThermalModel::new(profile.ptc, ambient),
            ptc: PtcLatch::default(),
            current_latch: CurrentLatch::default(),
            sense: CurrentSense::default(),
            measured_current: None,
            driver_temperature: None,
            fault: SlotFault::NONE,
            rpm: 0.0,
            estimator: SpeedEstimator::default(),
            feedback: Feedback::None,
            ticks_per_rev: 0.0,
            gearing: 1.0,
            ime_position: None,
            pid: None,
            simulated_rpm: None,
            status_led: None,
            led_on: false,
        }
    }

    /// Bind to a slot with a motor profile, resetting all runtime state
    pub(crate) fn bind(&mut self, binding: Binding, kind: MotorKind) {
        let ambient = self.thermal.ambient();
        *self = Self::new(self.id, ambient);
        let profile = kind.profile();
        self.binding = Some(binding);
        self.kind = kind;
        self.electrics = MotorElectrics::from_profile(profile);
        self.current_limit = profile.i_safe;
        self.thermal = ThermalModel::new(profile.ptc, ambient);
        self.enabled = true;
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn binding(&self) -> Option<Binding> {
        self.binding
    }

    pub fn is_linked(&self) -> bool {
        self.binding.is_some()
    }

    pub fn kind(&self) -> MotorKind {
        self.kind
    }

    pub fn profile(&self) -> &'static MotorProfile {
        self.kind.profile()
    }

    pub fn electrics(&self) -> &MotorElectrics {
        &self.electrics
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn command(&self) -> i16 {
        self.cmd
    }

    /// Command after protection limits
    pub fn safe_command(&self) -> i16 {
        self.req
    }

    /// Command currently applied after slewing
    pub fn output(&self) -> i16 {
        self.slew.output()
    }

    pub fn limit(&self) -> CommandLimit {
        self.limit
    }

    pub fn current_limit(&self) -> f32 {
        self.current_limit
    }

    pub fn slew_rate(&self) -> i16 {
        self.slew.rate()
    }

    pub fn deadband(&self) -> i16 {
        self.slew.deadband()
    }

    pub fn temperature(&self) -> f32 {
        self.thermal.temperature()
    }

    pub fn thermal(&self) -> &ThermalModel {
        &self.thermal
    }

    pub fn ptc_tripped(&self) -> bool {
        self.ptc.is_tripped()
    }

    pub fn current_limited(&self) -> bool {
        self.current_latch.is_tripped()
    }

    pub fn current(&self) -> &CurrentSense {
        &self.sense
    }

    pub fn driver_temperature(&self) -> Option<f32> {
        self.driver_temperature
    }

    pub fn fault(&self) -> SlotFault {
        self.fault
    }

    pub fn rpm(&self) -> f32 {
        self.rpm
    }

    pub fn feedback(&self) -> Feedback {
        self.feedback
    }

    /// Counts per output revolution including gearing, signed
    pub fn effective_ticks_per_rev(&self) -> f32 {
        self.ticks_per_rev * self.gearing
    }

    pub fn speed_pid(&self) -> Option<&SpeedPid> {
        self.pid.as_ref()
    }

    pub fn led_on(&self) -> bool {
        self.led_on
    }

    pub fn status_led(&self) -> Option<u8> {
        self.status_led
    }

    /// Compact status: bit 0 PTC tripped, bit 1 current limited
    pub fn status_code(&self) -> u8 {
        self.ptc.is_tripped() as u8 | (self.current_latch.is_tripped() as u8) << 1
    }
}
