//! Per-bank record

use smartmotor_protocol::{BankStatus, FrameLayout};

use crate::config::{BankConfig, BankKind};
use crate::current::CurrentSense;
use crate::link::LinkHealth;
use crate::profile::{BANK_PTC, BANK_SAFE_CURRENT, TOTAL_NUM_BANK_MOTORS, V_NOMINAL};
use crate::safety::PtcLatch;
use crate::thermal::ThermalModel;

/// Power expander status voltage below which its supply is considered lost (mV)
pub const EXPANDER_MIN_MV: u16 = 3_000;

/// Temperature the bank estimate is pinned to once its supply is lost (°C)
pub const EXPANDER_FAILED_TEMPERATURE: f32 = 110.0;

/// Runtime state of one controller bank
#[derive(Debug, Clone)]
pub struct Bank {
    pub(crate) index: u8,
    pub(crate) kind: BankKind,
    pub(crate) slot_count: u8,
    /// Motor id bound to each slot
    pub(crate) slots: [Option<u8>; TOTAL_NUM_BANK_MOTORS],
    pub(crate) layout: FrameLayout,

    pub(crate) link: LinkHealth,
    pub(crate) seq: u8,
    pub(crate) status: BankStatus,
    pub(crate) battery_mv: Option<u16>,

    pub(crate) thermal: ThermalModel,
    pub(crate) ptc: PtcLatch,
    pub(crate) sense: CurrentSense,
    pub(crate) safe_current: f32,

    pub(crate) status_led: Option<u8>,
    pub(crate) led_on: bool,
    pub(crate) status_port: Option<u8>,
    pub(crate) expander_mv: Option<u16>,
    pub(crate) expander_failed: bool,
}

impl Bank {
    pub(crate) fn new(index: u8, config: &BankConfig, layout: FrameLayout, ambient: f32) -> Self {
        Self {
            index,
            kind: config.kind,
            slot_count: config.slots,
            slots: [None; TOTAL_NUM_BANK_MOTORS],
            layout,
            link: LinkHealth::default(),
            seq: 0,
            status: BankStatus::default(),
            battery_mv: None,
            thermal: ThermalModel::new(BANK_PTC, ambient),
            ptc: PtcLatch::default(),
            sense: CurrentSense::default(),
            safe_current: BANK_SAFE_CURRENT,
            status_led: config.status_led,
            led_on: false,
            status_port: config.status_port,
            expander_mv: None,
            expander_failed: false,
        }
    }

    /// Hold the bank tripped with no current to share
    pub(crate) fn pin_failed(&mut self) {
        self.thermal.force_temperature(EXPANDER_FAILED_TEMPERATURE);
        self.ptc.force(true);
        self.safe_current = 0.0;
    }

    pub fn index(&self) -> u8 {
        self.index
    }

    pub fn kind(&self) -> BankKind {
        self.kind
    }

    pub fn slot_count(&self) -> u8 {
        self.slot_count
    }

    /// Motor bound to `slot`, if any
    pub fn motor_in(&self, slot: u8) -> Option<u8> {
        self.slots.get(slot as usize).copied().flatten()
    }

    pub fn layout(&self) -> FrameLayout {
        self.layout
    }

    pub fn link(&self) -> &LinkHealth {
        &self.link
    }

    pub fn status(&self) -> BankStatus {
        self.status
    }

    /// Supply voltage for current estimates (V)
    pub fn battery_voltage(&self) -> f32 {
        self.battery_mv
            .map(|mv| mv as f32 / 1000.0)
            .unwrap_or(V_NOMINAL)
    }

    pub fn battery_mv(&self) -> Option<u16> {
        self.battery_mv
    }

    pub fn temperature(&self) -> f32 {
        self.thermal.temperature()
    }

    pub fn ptc_tripped(&self) -> bool {
        self.ptc.is_tripped()
    }

    pub fn current(&self) -> &CurrentSense {
        &self.sense
    }

    pub fn safe_current(&self) -> f32 {
        self.safe_current
    }

    pub fn led_on(&self) -> bool {
        self.led_on
    }

    pub fn status_led(&self) -> Option<u8> {
        self.status_led
    }

    pub fn status_port(&self) -> Option<u8> {
        self.status_port
    }

    /// Power expander supply lost; the bank stays tripped
    pub fn expander_failed(&self) -> bool {
        self.expander_failed
    }
}
