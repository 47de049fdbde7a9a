//! Slew task
//!
//! Steps every motor output toward its limited request.

use defmt::*;
use embassy_time::{Duration, Ticker};

use smartmotor_core::slew::SLEW_PERIOD_MS;

use crate::channels::SharedMotors;

#[embassy_executor::task]
pub async fn slew_task(motors: &'static SharedMotors) {
    info!("Slew task started");

    let mut ticker = Ticker::every(Duration::from_millis(SLEW_PERIOD_MS));
    loop {
        ticker.next().await;
        motors.lock(|sm| sm.borrow_mut().slew_cycle());
    }
}
