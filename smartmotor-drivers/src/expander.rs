//! Power expander status port
//!
//! The expander's status output is a divided copy of its battery voltage
//! taken after its PTC, so a tripped or disconnected expander reads near
//! zero. The firmware samples it on an analog channel and hands the
//! converted voltage to the registry.

/// ADC counts per volt on the status port (12-bit ADC, A2 expander divider)
pub const ADC_COUNTS_PER_VOLT: u32 = 270;

/// Convert a raw status port sample to millivolts
pub fn status_millivolts(raw: u16) -> u16 {
    let mv = raw as u32 * 1000 / ADC_COUNTS_PER_VOLT;
    mv.min(u16::MAX as u32) as u16
}
