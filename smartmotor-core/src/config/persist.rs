//! Binary persistence of the system configuration
//!
//! Configurations are stored as postcard-encoded bytes. Storage itself
//! (flash, EEPROM, host file) belongs to the caller.

use super::types::SystemConfig;
use crate::error::ConfigError;

/// Upper bound on an encoded configuration
pub const MAX_ENCODED_CONFIG: usize = 1024;

impl SystemConfig {
    /// Encode into `buffer`, returning the used prefix
    pub fn to_bytes<'a>(&self, buffer: &'a mut [u8]) -> Result<&'a mut [u8], ConfigError> {
        postcard::to_slice(self, buffer).map_err(|_| ConfigError::Serialization)
    }

    /// Decode a configuration previously written by [`SystemConfig::to_bytes`]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        postcard::from_bytes(bytes).map_err(|_| ConfigError::Serialization)
    }
}
