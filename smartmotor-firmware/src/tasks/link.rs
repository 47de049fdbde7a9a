//! Bank link task
//!
//! Exchanges one command/reading frame pair with every bank per period.
//! The registry lock is taken to build the command and to apply the
//! reply, never across the transfer itself.

use defmt::*;
use embassy_time::{Duration, Ticker};

use smartmotor_core::profile::TOTAL_NUM_CONTROL_BANKS;

use crate::channels::SharedMotors;

/// Exchange period per bank
pub const LINK_PERIOD_MS: u64 = 20;

/// Longest a bank may take to answer
pub const LINK_TIMEOUT_MS: u64 = 5;

fn bank_count(motors: &'static SharedMotors) -> u8 {
    motors
        .lock(|sm| sm.borrow().banks().len())
        .min(TOTAL_NUM_CONTROL_BANKS) as u8
}

#[cfg(not(feature = "simulated-banks"))]
mod spi {
    use super::*;

    use embassy_rp::gpio::Output;
    use embassy_rp::peripherals::SPI0;
    use embassy_rp::spi::{Async, Spi};
    use embassy_time::{with_timeout, Delay};

    use smartmotor_core::link::{LinkFault, REPLY_BUFFER_SIZE};
    use smartmotor_drivers::AsyncSpiLink;

    /// Chip selects on the board, one per bank
    pub const LINK_CHIP_SELECTS: usize = TOTAL_NUM_CONTROL_BANKS;

    pub type BankLink = AsyncSpiLink<Spi<'static, SPI0, Async>, Output<'static>, Delay, LINK_CHIP_SELECTS>;

    #[embassy_executor::task]
    pub async fn link_task(motors: &'static SharedMotors, mut link: BankLink) {
        let banks = bank_count(motors);
        info!("Link task started for {} banks", banks);

        let mut ticker = Ticker::every(Duration::from_millis(LINK_PERIOD_MS));
        loop {
            ticker.next().await;

            for bank in 0..banks {
                let tx = match motors.lock(|sm| sm.borrow_mut().outbound(bank)) {
                    Ok(tx) => tx,
                    Err(e) => {
                        error!("Bank {}: cannot build command frame: {:?}", bank, e);
                        continue;
                    }
                };

                let mut rx = [0u8; REPLY_BUFFER_SIZE];
                let transfer = with_timeout(
                    Duration::from_millis(LINK_TIMEOUT_MS),
                    link.transfer(bank, &tx, &mut rx),
                )
                .await;

                motors.lock(|sm| {
                    let mut sm = sm.borrow_mut();
                    match transfer {
                        // Faults are recorded and queued as events by the registry
                        Ok(Ok(())) => {
                            let _ = sm.apply_reply(bank, &rx);
                        }
                        Ok(Err(e)) => sm.link_fault(bank, LinkFault::from(e)),
                        Err(_) => sm.link_fault(bank, LinkFault::Timeout),
                    }
                });
            }
        }
    }
}

#[cfg(feature = "simulated-banks")]
mod simulated {
    use super::*;

    use smartmotor_drivers::SimulatedController;

    #[embassy_executor::task]
    pub async fn link_task(motors: &'static SharedMotors, mut controller: SimulatedController) {
        let banks = bank_count(motors);
        info!("Simulated link task started for {} banks", banks);

        let mut ticker = Ticker::every(Duration::from_millis(LINK_PERIOD_MS));
        loop {
            ticker.next().await;
            for bank in 0..banks {
                let _ = motors.lock(|sm| sm.borrow_mut().exchange(bank, &mut controller));
            }
        }
    }
}

#[cfg(not(feature = "simulated-banks"))]
pub use spi::{link_task, BankLink, LINK_CHIP_SELECTS};

#[cfg(feature = "simulated-banks")]
pub use simulated::link_task;
