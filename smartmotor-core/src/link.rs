//! Registry side of the controller link
//!
//! Builds each bank's outbound command frame from the registry and
//! applies the bank's reply. A reply is validated completely (checksum,
//! layout, bank, sequence) before any field is written, so a bad frame
//! leaves every reading as it was and only raises a link fault.

use heapless::Vec;
use smartmotor_protocol::{CommandFrame, Frame, FrameError, ReadingFrame, MAX_FRAME_SIZE};

use crate::error::SmartMotorError;
use crate::profile::MOTOR_MAX_CMD;
use crate::registry::SmartMotors;
use crate::state::Event;
use crate::traits::{LinkTransport, TransportError};

/// Consecutive faults before a bank is reported offline
pub const OFFLINE_AFTER_FAULTS: u8 = 3;

/// Size of the receive buffer handed to transports
pub const REPLY_BUFFER_SIZE: usize = MAX_FRAME_SIZE;

/// Reasons a frame exchange failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkFault {
    /// Reply checksum mismatch
    Checksum,
    /// Reply truncated or structurally invalid
    Malformed,
    /// Reply from a different bank
    WrongBank,
    /// Reply layout differs from the bank's configured layout
    WrongLayout,
    /// Reply does not answer the latest command
    Stale,
    /// Controller did not answer in time
    Timeout,
    /// Transport error
    Bus,
}

impl From<FrameError> for LinkFault {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::InvalidChecksum => LinkFault::Checksum,
            FrameError::UnknownLayout => LinkFault::WrongLayout,
            _ => LinkFault::Malformed,
        }
    }
}

impl From<TransportError> for LinkFault {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout => LinkFault::Timeout,
            TransportError::Bus => LinkFault::Bus,
        }
    }
}

/// Health counters for one bank link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkHealth {
    online: bool,
    consecutive_faults: u8,
    total_faults: u32,
    good_frames: u32,
    last_fault: Option<LinkFault>,
}

impl Default for LinkHealth {
    fn default() -> Self {
        Self {
            online: true,
            consecutive_faults: 0,
            total_faults: 0,
            good_frames: 0,
            last_fault: None,
        }
    }
}

impl LinkHealth {
    /// Record a good reply; returns true if the link came back online
    pub fn record_good(&mut self) -> bool {
        let restored = !self.online;
        self.online = true;
        self.consecutive_faults = 0;
        self.good_frames = self.good_frames.wrapping_add(1);
        restored
    }

    /// Record a fault; returns true if the link just went offline
    pub fn record_fault(&mut self, fault: LinkFault) -> bool {
        self.consecutive_faults = self.consecutive_faults.saturating_add(1);
        self.total_faults = self.total_faults.saturating_add(1);
        self.last_fault = Some(fault);
        if self.online && self.consecutive_faults >= OFFLINE_AFTER_FAULTS {
            self.online = false;
            return true;
        }
        false
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    /// The most recent exchange failed
    pub fn is_faulted(&self) -> bool {
        self.consecutive_faults > 0
    }

    pub fn consecutive_faults(&self) -> u8 {
        self.consecutive_faults
    }

    pub fn total_faults(&self) -> u32 {
        self.total_faults
    }

    pub fn good_frames(&self) -> u32 {
        self.good_frames
    }

    pub fn last_fault(&self) -> Option<LinkFault> {
        self.last_fault
    }
}

impl SmartMotors {
    /// Build the next command frame for `bank`
    ///
    /// Slots hold the slewed output of their motor; disabled and empty
    /// slots send zero. Each call advances the bank's sequence number.
    pub fn outbound(&mut self, bank: u8) -> Result<Vec<u8, MAX_FRAME_SIZE>, SmartMotorError> {
        let index = self.bank_index(bank)?;
        let motors = &self.motors;
        let b = &mut self.banks[index];
        b.seq = b.seq.wrapping_add(1);

        let mut commands = [0i8; smartmotor_protocol::BANK_SLOTS];
        let mut enabled = 0u8;
        for (slot, entry) in b.slots.iter().enumerate() {
            if let Some(id) = entry {
                let motor = &motors[*id as usize];
                if motor.enabled {
                    commands[slot] = motor.output().clamp(-MOTOR_MAX_CMD, MOTOR_MAX_CMD) as i8;
                    enabled |= 1 << slot;
                }
            }
        }

        CommandFrame::new(b.layout, bank, b.seq, enabled, commands)
            .to_frame()
            .and_then(|frame| frame.encode_to_vec())
            .map_err(|_| SmartMotorError::InvalidArgument)
    }

    /// Validate and apply a reply from `bank`
    ///
    /// On any failure the registry is left untouched apart from the
    /// bank's link health.
    pub fn apply_reply(&mut self, bank: u8, bytes: &[u8]) -> Result<(), LinkFault> {
        let index = self.bank_index(bank).map_err(|_| LinkFault::WrongBank)?;
        match self.decode_reply(index, bytes) {
            Ok(reading) => {
                self.store_reading(index, &reading);
                if self.banks[index].link.record_good() {
                    self.events.push(Event::LinkRestored { bank });
                }
                Ok(())
            }
            Err(fault) => {
                self.link_fault(bank, fault);
                Err(fault)
            }
        }
    }

    /// Record a failed exchange, e.g. a transport timeout
    pub fn link_fault(&mut self, bank: u8, fault: LinkFault) {
        let Ok(index) = self.bank_index(bank) else {
            return;
        };
        self.events.push(Event::LinkFault { bank, fault });
        if self.banks[index].link.record_fault(fault) {
            self.events.push(Event::LinkOffline { bank });
        }
    }

    /// Run one full exchange with `bank` over a blocking transport
    pub fn exchange<T: LinkTransport>(&mut self, bank: u8, transport: &mut T) -> Result<(), LinkFault> {
        let tx = self.outbound(bank).map_err(|_| LinkFault::WrongBank)?;
        let mut rx = [0u8; REPLY_BUFFER_SIZE];
        match transport.transfer(bank, &tx, &mut rx) {
            Ok(()) => self.apply_reply(bank, &rx),
            Err(err) => {
                let fault = LinkFault::from(err);
                self.link_fault(bank, fault);
                Err(fault)
            }
        }
    }

    fn decode_reply(&self, index: usize, bytes: &[u8]) -> Result<ReadingFrame, LinkFault> {
        let bank = &self.banks[index];
        let frame = Frame::decode(bytes)?;
        let reading = ReadingFrame::from_frame(&frame)?;
        if reading.layout() != bank.layout {
            return Err(LinkFault::WrongLayout);
        }
        let normalized = reading.normalize();
        if normalized.bank != bank.index {
            return Err(LinkFault::WrongBank);
        }
        if normalized.seq != bank.seq {
            return Err(LinkFault::Stale);
        }
        Ok(reading)
    }

    fn store_reading(&mut self, index: usize, reading: &ReadingFrame) {
        let readings = reading.normalize();
        let bank = &mut self.banks[index];
        bank.status = readings.status;
        bank.battery_mv = Some(readings.battery_mv);

        for (slot, entry) in bank.slots.iter().enumerate() {
            let Some(id) = entry else { continue };
            let motor = &mut self.motors[*id as usize];
            let slot_reading = &readings.slots[slot];
            motor.ime_position = Some(slot_reading.position);
            motor.measured_current = slot_reading.current_ma.map(|ma| ma as f32 / 1000.0);
            motor.driver_temperature = slot_reading.temperature_dc.map(|dc| dc as f32 / 10.0);
            motor.fault = slot_reading.fault;
        }
    }
}
