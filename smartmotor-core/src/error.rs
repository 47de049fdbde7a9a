//! Error types

/// Errors returned by registry commands
///
/// A call that fails with one of these leaves the registry unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SmartMotorError {
    /// Motor id outside the registry
    InvalidMotor(u8),
    /// Motor id is valid but not bound to a bank slot
    Unlinked(u8),
    /// Bank index outside the configured banks
    InvalidBank(u8),
    /// Slot index outside the bank
    InvalidSlot { bank: u8, slot: u8 },
    /// Another motor already owns the slot
    SlotOccupied { bank: u8, slot: u8 },
    /// Motor is already bound elsewhere or with a different profile
    ConflictingBinding(u8),
    /// Sensor id outside the sensor table
    InvalidSensor(u8),
    /// Sensor kind cannot provide speed feedback
    UnsupportedSensor(u8),
    /// No room left in the sensor table
    SensorTableFull,
    /// Motor has no speed controller configured
    NoSpeedControl(u8),
    /// Out-of-range or non-finite argument
    InvalidArgument,
}

/// Errors that abort configuration as a whole
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// More banks than the system supports
    TooManyBanks(usize),
    /// A bank declares more slots than a controller provides
    TooManySlots { bank: u8, slots: usize },
    /// More motors than logical ids
    TooManyMotors(usize),
    /// Persisted configuration could not be encoded or decoded
    Serialization,
}
