//! Versioned payload layouts for the controller link
//!
//! Two controller firmware generations are in the field:
//! - V1: the master processor of the Cortex. Commands are offset-binary
//!   bytes and readings carry only encoder position and fault bits.
//! - V2: smart controllers. Commands carry an enable mask and readings
//!   add measured current and driver temperature per slot.
//!
//! Each direction is an enum over the known layouts. Decoding dispatches
//! on the TYPE byte, so a frame is never reinterpreted under the wrong
//! layout.

use crate::fault::{BankStatus, SlotFault};
use crate::frame::{Frame, FrameError, MAX_PAYLOAD_SIZE};
use heapless::Vec;

/// Motor slots served by one controller bank
pub const BANK_SLOTS: usize = 5;

/// V1 battery voltage scale (mV per count)
pub const V1_BATTERY_MV_PER_COUNT: u16 = 59;

// Frame kinds (low nibble of TYPE)
const KIND_COMMANDS: u8 = 0x1;
const KIND_READINGS: u8 = 0x2;

// Fixed payload lengths per layout
const V1_COMMAND_LEN: usize = 2 + BANK_SLOTS;
const V2_COMMAND_LEN: usize = 3 + BANK_SLOTS;
const V1_READING_LEN: usize = 4 + BANK_SLOTS * 5;
const V2_READING_LEN: usize = 5 + BANK_SLOTS * 9;

/// Direction of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameKind {
    /// Runtime to controller
    Commands,
    /// Controller to runtime
    Readings,
}

impl FrameKind {
    fn nibble(self) -> u8 {
        match self {
            FrameKind::Commands => KIND_COMMANDS,
            FrameKind::Readings => KIND_READINGS,
        }
    }
}

/// Payload layout spoken by a bank's controller firmware
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameLayout {
    /// Cortex master processor
    #[default]
    V1,
    /// Smart controller with current and temperature telemetry
    V2,
}

impl FrameLayout {
    pub fn version(self) -> u8 {
        match self {
            FrameLayout::V1 => 1,
            FrameLayout::V2 => 2,
        }
    }

    pub fn from_version(version: u8) -> Option<Self> {
        match version {
            1 => Some(FrameLayout::V1),
            2 => Some(FrameLayout::V2),
            _ => None,
        }
    }

    /// TYPE byte for a frame of this layout
    pub fn type_byte(self, kind: FrameKind) -> u8 {
        (self.version() << 4) | kind.nibble()
    }

    /// Whether readings in this layout include measured current
    pub fn reports_current(self) -> bool {
        matches!(self, FrameLayout::V2)
    }

    fn of(frame: &Frame, kind: FrameKind) -> Result<Self, FrameError> {
        if frame.kind() != kind.nibble() {
            return Err(FrameError::InvalidFrame);
        }
        Self::from_version(frame.version()).ok_or(FrameError::UnknownLayout)
    }
}

/// Outbound command frame for one bank
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandFrame {
    V1 {
        bank: u8,
        seq: u8,
        commands: [i8; BANK_SLOTS],
    },
    V2 {
        bank: u8,
        seq: u8,
        /// Bit n set enables slot n
        enabled: u8,
        commands: [i8; BANK_SLOTS],
    },
}

impl CommandFrame {
    /// Build a command frame in the given layout
    ///
    /// V1 has no enable mask; callers zero disabled slots themselves.
    pub fn new(
        layout: FrameLayout,
        bank: u8,
        seq: u8,
        enabled: u8,
        commands: [i8; BANK_SLOTS],
    ) -> Self {
        match layout {
            FrameLayout::V1 => CommandFrame::V1 {
                bank,
                seq,
                commands,
            },
            FrameLayout::V2 => CommandFrame::V2 {
                bank,
                seq,
                enabled,
                commands,
            },
        }
    }

    pub fn layout(&self) -> FrameLayout {
        match self {
            CommandFrame::V1 { .. } => FrameLayout::V1,
            CommandFrame::V2 { .. } => FrameLayout::V2,
        }
    }

    pub fn bank(&self) -> u8 {
        match *self {
            CommandFrame::V1 { bank, .. } | CommandFrame::V2 { bank, .. } => bank,
        }
    }

    pub fn seq(&self) -> u8 {
        match *self {
            CommandFrame::V1 { seq, .. } | CommandFrame::V2 { seq, .. } => seq,
        }
    }

    pub fn commands(&self) -> [i8; BANK_SLOTS] {
        match *self {
            CommandFrame::V1 { commands, .. } | CommandFrame::V2 { commands, .. } => commands,
        }
    }

    /// Encode into a frame
    pub fn to_frame(&self) -> Result<Frame, FrameError> {
        let mut payload = Vec::<u8, MAX_PAYLOAD_SIZE>::new();
        match *self {
            CommandFrame::V1 {
                bank,
                seq,
                commands,
            } => {
                put(&mut payload, &[bank, seq])?;
                for cmd in commands {
                    put(&mut payload, &[to_offset_binary(cmd)])?;
                }
            }
            CommandFrame::V2 {
                bank,
                seq,
                enabled,
                commands,
            } => {
                put(&mut payload, &[bank, seq, enabled])?;
                for cmd in commands {
                    put(&mut payload, &cmd.to_le_bytes())?;
                }
            }
        }
        Frame::new(self.layout().type_byte(FrameKind::Commands), &payload)
    }

    /// Parse from a frame, dispatching on the layout version
    pub fn from_frame(frame: &Frame) -> Result<Self, FrameError> {
        let layout = FrameLayout::of(frame, FrameKind::Commands)?;
        let mut reader = Reader::new(&frame.payload);
        let mut commands = [0i8; BANK_SLOTS];
        let parsed = match layout {
            FrameLayout::V1 => {
                reader.expect_len(V1_COMMAND_LEN)?;
                let bank = reader.u8()?;
                let seq = reader.u8()?;
                for cmd in commands.iter_mut() {
                    *cmd = from_offset_binary(reader.u8()?);
                }
                CommandFrame::V1 {
                    bank,
                    seq,
                    commands,
                }
            }
            FrameLayout::V2 => {
                reader.expect_len(V2_COMMAND_LEN)?;
                let bank = reader.u8()?;
                let seq = reader.u8()?;
                let enabled = reader.u8()?;
                for cmd in commands.iter_mut() {
                    *cmd = reader.u8()? as i8;
                }
                CommandFrame::V2 {
                    bank,
                    seq,
                    enabled,
                    commands,
                }
            }
        };
        Ok(parsed)
    }
}

/// V1 per-slot reading
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SlotReadingV1 {
    pub position: i32,
    pub fault: u8,
}

/// V2 per-slot reading
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SlotReadingV2 {
    pub position: i32,
    /// Signed motor current in mA
    pub current_ma: i16,
    /// Driver temperature in 0.1 °C
    pub temperature_dc: i16,
    pub fault: u8,
}

/// Inbound reading frame for one bank
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReadingFrame {
    V1 {
        bank: u8,
        seq: u8,
        status: u8,
        /// Battery voltage in 59 mV counts
        battery: u8,
        slots: [SlotReadingV1; BANK_SLOTS],
    },
    V2 {
        bank: u8,
        seq: u8,
        status: u8,
        battery_mv: u16,
        slots: [SlotReadingV2; BANK_SLOTS],
    },
}

/// Layout-independent view of one slot's reading
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SlotReading {
    pub position: i32,
    pub current_ma: Option<i16>,
    pub temperature_dc: Option<i16>,
    pub fault: SlotFault,
}

/// Layout-independent view of a bank's readings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BankReadings {
    pub bank: u8,
    pub seq: u8,
    pub status: BankStatus,
    pub battery_mv: u16,
    pub slots: [SlotReading; BANK_SLOTS],
}

impl ReadingFrame {
    pub fn layout(&self) -> FrameLayout {
        match self {
            ReadingFrame::V1 { .. } => FrameLayout::V1,
            ReadingFrame::V2 { .. } => FrameLayout::V2,
        }
    }

    /// Convert to the layout-independent view
    pub fn normalize(&self) -> BankReadings {
        let mut out = [SlotReading::default(); BANK_SLOTS];
        match *self {
            ReadingFrame::V1 {
                bank,
                seq,
                status,
                battery,
                slots,
            } => {
                for (dst, src) in out.iter_mut().zip(slots.iter()) {
                    *dst = SlotReading {
                        position: src.position,
                        current_ma: None,
                        temperature_dc: None,
                        fault: SlotFault::from_byte(src.fault),
                    };
                }
                BankReadings {
                    bank,
                    seq,
                    status: BankStatus::from_byte(status),
                    battery_mv: battery as u16 * V1_BATTERY_MV_PER_COUNT,
                    slots: out,
                }
            }
            ReadingFrame::V2 {
                bank,
                seq,
                status,
                battery_mv,
                slots,
            } => {
                for (dst, src) in out.iter_mut().zip(slots.iter()) {
                    *dst = SlotReading {
                        position: src.position,
                        current_ma: Some(src.current_ma),
                        temperature_dc: Some(src.temperature_dc),
                        fault: SlotFault::from_byte(src.fault),
                    };
                }
                BankReadings {
                    bank,
                    seq,
                    status: BankStatus::from_byte(status),
                    battery_mv,
                    slots: out,
                }
            }
        }
    }

    /// Encode into a frame (controller side, or simulation)
    pub fn to_frame(&self) -> Result<Frame, FrameError> {
        let mut payload = Vec::<u8, MAX_PAYLOAD_SIZE>::new();
        match *self {
            ReadingFrame::V1 {
                bank,
                seq,
                status,
                battery,
                slots,
            } => {
                put(&mut payload, &[bank, seq, status, battery])?;
                for slot in slots {
                    put(&mut payload, &slot.position.to_le_bytes())?;
                    put(&mut payload, &[slot.fault])?;
                }
            }
            ReadingFrame::V2 {
                bank,
                seq,
                status,
                battery_mv,
                slots,
            } => {
                put(&mut payload, &[bank, seq, status])?;
                put(&mut payload, &battery_mv.to_le_bytes())?;
                for slot in slots {
                    put(&mut payload, &slot.position.to_le_bytes())?;
                    put(&mut payload, &slot.current_ma.to_le_bytes())?;
                    put(&mut payload, &slot.temperature_dc.to_le_bytes())?;
                    put(&mut payload, &[slot.fault])?;
                }
            }
        }
        Frame::new(self.layout().type_byte(FrameKind::Readings), &payload)
    }

    /// Parse from a frame, dispatching on the layout version
    pub fn from_frame(frame: &Frame) -> Result<Self, FrameError> {
        let layout = FrameLayout::of(frame, FrameKind::Readings)?;
        let mut reader = Reader::new(&frame.payload);
        let parsed = match layout {
            FrameLayout::V1 => {
                reader.expect_len(V1_READING_LEN)?;
                let bank = reader.u8()?;
                let seq = reader.u8()?;
                let status = reader.u8()?;
                let battery = reader.u8()?;
                let mut slots = [SlotReadingV1::default(); BANK_SLOTS];
                for slot in slots.iter_mut() {
                    slot.position = reader.i32()?;
                    slot.fault = reader.u8()?;
                }
                ReadingFrame::V1 {
                    bank,
                    seq,
                    status,
                    battery,
                    slots,
                }
            }
            FrameLayout::V2 => {
                reader.expect_len(V2_READING_LEN)?;
                let bank = reader.u8()?;
                let seq = reader.u8()?;
                let status = reader.u8()?;
                let battery_mv = reader.u16()?;
                let mut slots = [SlotReadingV2::default(); BANK_SLOTS];
                for slot in slots.iter_mut() {
                    slot.position = reader.i32()?;
                    slot.current_ma = reader.i16()?;
                    slot.temperature_dc = reader.i16()?;
                    slot.fault = reader.u8()?;
                }
                ReadingFrame::V2 {
                    bank,
                    seq,
                    status,
                    battery_mv,
                    slots,
                }
            }
        };
        Ok(parsed)
    }
}

/// Offset-binary motor byte used by the master processor (0 = full reverse)
fn to_offset_binary(cmd: i8) -> u8 {
    (cmd as i16 + 127).clamp(0, 255) as u8
}

fn from_offset_binary(byte: u8) -> i8 {
    (byte as i16 - 127).clamp(-127, 127) as i8
}

fn put(payload: &mut Vec<u8, MAX_PAYLOAD_SIZE>, bytes: &[u8]) -> Result<(), FrameError> {
    payload
        .extend_from_slice(bytes)
        .map_err(|_| FrameError::PayloadTooLarge)
}

/// Little-endian cursor over a payload
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn expect_len(&self, len: usize) -> Result<(), FrameError> {
        if self.bytes.len() == len {
            Ok(())
        } else {
            Err(FrameError::InvalidFrame)
        }
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], FrameError> {
        let end = self.pos + N;
        let slice = self.bytes.get(self.pos..end).ok_or(FrameError::InvalidFrame)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        self.pos = end;
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, FrameError> {
        Ok(self.take::<1>()?[0])
    }

    fn u16(&mut self) -> Result<u16, FrameError> {
        Ok(u16::from_le_bytes(self.take()?))
    }

    fn i16(&mut self) -> Result<i16, FrameError> {
        Ok(i16::from_le_bytes(self.take()?))
    }

    fn i32(&mut self) -> Result<i32, FrameError> {
        Ok(i32::from_le_bytes(self.take()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_byte() {
        assert_eq!(FrameLayout::V1.type_byte(FrameKind::Commands), 0x11);
        assert_eq!(FrameLayout::V2.type_byte(FrameKind::Readings), 0x22);
    }

    #[test]
    fn test_v1_commands_offset_binary() {
        let cmd = CommandFrame::new(FrameLayout::V1, 0, 3, 0x1F, [0, 127, -127, 10, -10]);
        let frame = cmd.to_frame().unwrap();
        assert_eq!(frame.type_byte, 0x11);
        assert_eq!(&frame.payload[..], &[0, 3, 127, 254, 0, 137, 117]);

        let parsed = CommandFrame::from_frame(&frame).unwrap();
        assert_eq!(parsed, cmd);
    }

    #[test]
    fn test_v1_full_scale_byte_saturates() {
        let frame = Frame::new(0x11, &[0, 0, 255, 0, 127, 127, 127]).unwrap();
        let parsed = CommandFrame::from_frame(&frame).unwrap();
        assert_eq!(parsed.commands(), [127, -127, 0, 0, 0]);
    }

    #[test]
    fn test_v2_commands_carry_enable_mask() {
        let cmd = CommandFrame::new(FrameLayout::V2, 2, 9, 0b00101, [-127, 0, 64, 0, 0]);
        let frame = cmd.to_frame().unwrap();
        assert_eq!(frame.type_byte, 0x21);
        assert_eq!(frame.payload.len(), V2_COMMAND_LEN);
        assert_eq!(frame.payload[2], 0b00101);

        let parsed = CommandFrame::from_frame(&frame).unwrap();
        assert_eq!(parsed, cmd);
        assert_eq!(parsed.bank(), 2);
        assert_eq!(parsed.seq(), 9);
    }

    #[test]
    fn test_v1_readings_normalize_without_current() {
        let mut slots = [SlotReadingV1::default(); BANK_SLOTS];
        slots[1] = SlotReadingV1 {
            position: -1234,
            fault: 0x02,
        };
        let reading = ReadingFrame::V1 {
            bank: 0,
            seq: 4,
            status: 0x01,
            battery: 130,
            slots,
        };
        let frame = reading.to_frame().unwrap();
        let parsed = ReadingFrame::from_frame(&frame).unwrap();
        let normalized = parsed.normalize();

        assert_eq!(normalized.battery_mv, 130 * 59);
        assert!(normalized.status.motors_powered());
        assert_eq!(normalized.slots[1].position, -1234);
        assert_eq!(normalized.slots[1].current_ma, None);
        assert!(normalized.slots[1].fault.contains(SlotFault::OVER_TEMPERATURE));
    }

    #[test]
    fn test_v2_readings_normalize_with_current() {
        let mut slots = [SlotReadingV2::default(); BANK_SLOTS];
        slots[4] = SlotReadingV2 {
            position: 70_000,
            current_ma: -1500,
            temperature_dc: 412,
            fault: 0,
        };
        let reading = ReadingFrame::V2 {
            bank: 2,
            seq: 200,
            status: 0,
            battery_mv: 7_650,
            slots,
        };
        let frame = reading.to_frame().unwrap();
        assert_eq!(frame.payload.len(), V2_READING_LEN);

        let normalized = ReadingFrame::from_frame(&frame).unwrap().normalize();
        assert_eq!(normalized.bank, 2);
        assert_eq!(normalized.battery_mv, 7_650);
        assert_eq!(normalized.slots[4].current_ma, Some(-1500));
        assert_eq!(normalized.slots[4].temperature_dc, Some(412));
        assert_eq!(normalized.slots[4].position, 70_000);
    }

    #[test]
    fn test_wrong_length_rejected() {
        let frame = Frame::new(0x12, &[0u8; V1_READING_LEN - 1]).unwrap();
        assert_eq!(
            ReadingFrame::from_frame(&frame),
            Err(FrameError::InvalidFrame)
        );
    }

    #[test]
    fn test_unknown_version_rejected() {
        let frame = Frame::new(0x32, &[0u8; V1_READING_LEN]).unwrap();
        assert_eq!(
            ReadingFrame::from_frame(&frame),
            Err(FrameError::UnknownLayout)
        );
    }

    #[test]
    fn test_kind_mismatch_rejected() {
        let cmd = CommandFrame::new(FrameLayout::V2, 0, 0, 0, [0; BANK_SLOTS]);
        let frame = cmd.to_frame().unwrap();
        assert_eq!(
            ReadingFrame::from_frame(&frame),
            Err(FrameError::InvalidFrame)
        );
    }
}
