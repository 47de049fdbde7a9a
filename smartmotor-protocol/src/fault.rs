//! Status and fault bits reported by controller firmware

/// Per-slot fault bits from a reading frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SlotFault(u8);

// Wire format bits
const FAULT_OVER_CURRENT: u8 = 0x01;
const FAULT_OVER_TEMPERATURE: u8 = 0x02;
const FAULT_DRIVER: u8 = 0x04;
const FAULT_NO_SENSOR: u8 = 0x08;
const FAULT_KNOWN: u8 = FAULT_OVER_CURRENT | FAULT_OVER_TEMPERATURE | FAULT_DRIVER | FAULT_NO_SENSOR;

impl SlotFault {
    /// No fault
    pub const NONE: Self = Self(0);
    /// Controller-side current limit engaged
    pub const OVER_CURRENT: Self = Self(FAULT_OVER_CURRENT);
    /// Controller-side thermal limit engaged
    pub const OVER_TEMPERATURE: Self = Self(FAULT_OVER_TEMPERATURE);
    /// H-bridge driver fault
    pub const DRIVER: Self = Self(FAULT_DRIVER);
    /// Feedback sensor not responding
    pub const NO_SENSOR: Self = Self(FAULT_NO_SENSOR);

    /// Parse from its wire byte, dropping bits this side does not know
    pub fn from_byte(byte: u8) -> Self {
        Self(byte & FAULT_KNOWN)
    }

    /// Convert to wire format byte
    pub fn to_byte(self) -> u8 {
        self.0
    }

    /// Union of two fault sets
    pub fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_clear(self) -> bool {
        self.0 == 0
    }
}

/// Bank-level status byte from a reading frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BankStatus(u8);

const STATUS_MOTORS_POWERED: u8 = 0x01;
const STATUS_DISABLED: u8 = 0x02;
const STATUS_WATCHDOG: u8 = 0x04;

impl BankStatus {
    pub const fn from_byte(byte: u8) -> Self {
        Self(byte)
    }

    pub const fn to_byte(self) -> u8 {
        self.0
    }

    /// Motor supply is present on this bank
    pub fn motors_powered(self) -> bool {
        self.0 & STATUS_MOTORS_POWERED != 0
    }

    /// Controller has its outputs disabled (field control or e-stop)
    pub fn outputs_disabled(self) -> bool {
        self.0 & STATUS_DISABLED != 0
    }

    /// Controller reset by its watchdog since the previous frame
    pub fn watchdog_reset(self) -> bool {
        self.0 & STATUS_WATCHDOG != 0
    }
}
