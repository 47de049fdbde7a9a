//! Configuration loading
//!
//! The wiring table is stored postcard-encoded in the last flash sector
//! behind a small header. An erased or damaged sector falls back to the
//! compiled-in default wiring.

use defmt::*;
use embassy_rp::flash::{Blocking, Flash};
use embassy_rp::peripherals::FLASH;
use embassy_rp::Peri;

use smartmotor_core::config::persist::MAX_ENCODED_CONFIG;
use smartmotor_core::config::{BankConfig, FeedbackConfig, MotorConfig, SystemConfig};
use smartmotor_core::profile::MotorKind;

/// 2MB flash on the Pico
pub const FLASH_SIZE: usize = 2 * 1024 * 1024;

/// Offset of the configuration sector
pub const CONFIG_OFFSET: u32 = (FLASH_SIZE - 4096) as u32;

/// "SMCF"
const CONFIG_MAGIC: u32 = 0x534D_4346;

/// Magic (4 bytes LE) then payload length (2 bytes LE)
const HEADER_SIZE: usize = 6;

/// Configuration loading errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LoadError {
    Flash,
    /// Sector erased or written by something else
    NoConfig,
    /// Header claims more bytes than a configuration may use
    BadLength(usize),
    Deserialize,
}

/// Load the stored configuration, or the default wiring
pub fn load(flash: Peri<'static, FLASH>) -> SystemConfig {
    let mut flash = Flash::<_, Blocking, FLASH_SIZE>::new_blocking(flash);
    match read_stored(&mut flash) {
        Ok(config) => {
            info!(
                "Loaded configuration from flash: {} banks, {} motors",
                config.banks.len(),
                config.motors.len()
            );
            config
        }
        Err(LoadError::NoConfig) => {
            info!("No configuration in flash, using default wiring");
            default_system_config()
        }
        Err(e) => {
            warn!("Stored configuration unusable ({:?}), using default wiring", e);
            default_system_config()
        }
    }
}

fn read_stored(flash: &mut Flash<'_, FLASH, Blocking, FLASH_SIZE>) -> Result<SystemConfig, LoadError> {
    let mut header = [0u8; HEADER_SIZE];
    flash
        .blocking_read(CONFIG_OFFSET, &mut header)
        .map_err(|_| LoadError::Flash)?;

    let len = parse_header(&header)?;
    let mut buffer = [0u8; MAX_ENCODED_CONFIG];
    flash
        .blocking_read(CONFIG_OFFSET + HEADER_SIZE as u32, &mut buffer[..len])
        .map_err(|_| LoadError::Flash)?;
    debug!("Read {} bytes of configuration", len);

    SystemConfig::from_bytes(&buffer[..len]).map_err(|_| LoadError::Deserialize)
}

fn parse_header(header: &[u8; HEADER_SIZE]) -> Result<usize, LoadError> {
    let magic = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    if magic != CONFIG_MAGIC {
        return Err(LoadError::NoConfig);
    }
    let len = u16::from_le_bytes([header[4], header[5]]) as usize;
    if len == 0 || len > MAX_ENCODED_CONFIG {
        return Err(LoadError::BadLength(len));
    }
    Ok(len)
}

/// Compiled-in wiring
///
/// Bank 0: drive, left and right 393s with encoders and a follower each.
/// Bank 1: arm 269 on its integrated encoder.
/// Bank 2: power expander with the claw, status port on ADC channel 0.
pub fn default_system_config() -> SystemConfig {
    let mut config = SystemConfig::default();
    let mut expander = BankConfig::power_expander(Some(0));
    expander.status_led = Some(0);

    let mut arm = MotorConfig::new(4, 1, 0, MotorKind::Motor269).with_feedback(FeedbackConfig::Ime);
    arm.status_led = Some(1);

    let motors = [
        MotorConfig::new(0, 0, 0, MotorKind::Torque393).with_feedback(FeedbackConfig::Ime),
        MotorConfig::new(1, 0, 1, MotorKind::Torque393).with_feedback(FeedbackConfig::Ime),
        MotorConfig::new(2, 0, 2, MotorKind::Torque393).with_feedback(FeedbackConfig::Shared(0)),
        MotorConfig::new(3, 0, 3, MotorKind::Torque393).with_feedback(FeedbackConfig::Shared(1)),
        arm,
        MotorConfig::new(5, 2, 0, MotorKind::Motor269),
    ];

    // Table capacities exceed the default wiring
    let _ = config.banks.push(expander);
    for motor in motors {
        let _ = config.motors.push(motor);
    }
    config
}
