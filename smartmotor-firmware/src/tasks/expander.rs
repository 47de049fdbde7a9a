//! Power expander supervision
//!
//! Samples the expander status port and reports the supply voltage. A
//! port reading under the threshold holds the bank tripped.

use defmt::*;
use embassy_rp::adc::{Adc, Async, Channel};
use embassy_time::{Duration, Ticker};

use smartmotor_drivers::expander::status_millivolts;

use crate::channels::SharedMotors;

/// Status port sampling period
pub const EXPANDER_PERIOD_MS: u64 = 100;

#[embassy_executor::task]
pub async fn expander_task(
    motors: &'static SharedMotors,
    mut adc: Adc<'static, Async>,
    mut port: Channel<'static>,
    bank: u8,
) {
    info!("Expander task started for bank {}", bank);

    let mut ticker = Ticker::every(Duration::from_millis(EXPANDER_PERIOD_MS));
    loop {
        ticker.next().await;

        match adc.read(&mut port).await {
            Ok(raw) => {
                let millivolts = status_millivolts(raw);
                trace!("Expander {} status port: {} mV", bank, millivolts);
                if let Err(e) = motors.lock(|sm| sm.borrow_mut().report_expander_voltage(bank, millivolts)) {
                    error!("Bank {} is not a monitored expander: {:?}", bank, e);
                    return;
                }
            }
            Err(e) => warn!("Expander ADC read failed: {:?}", e),
        }
    }
}
