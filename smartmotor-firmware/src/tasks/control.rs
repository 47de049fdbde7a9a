//! Control task
//!
//! Runs the protection and speed control cycle, logs what the registry
//! reported and drives the status LEDs.

use defmt::*;
use embassy_rp::gpio::Output;
use embassy_time::{Duration, Instant, Ticker};
use heapless::Vec;

use smartmotor_core::state::{MonitorKind, EVENT_QUEUE_DEPTH};
use smartmotor_core::traits::StatusLed;
use smartmotor_core::Event;
use smartmotor_drivers::GpioStatusLed;

use crate::channels::SharedMotors;

/// Control cycle period
pub const CONTROL_PERIOD_MS: u64 = 20;

/// Status LEDs wired on the board
pub const STATUS_LED_COUNT: usize = 4;

pub type StatusLeds = [GpioStatusLed<Output<'static>>; STATUS_LED_COUNT];

#[embassy_executor::task]
pub async fn control_task(motors: &'static SharedMotors, mut leds: StatusLeds) {
    info!("Control task started");

    let mut ticker = Ticker::every(Duration::from_millis(CONTROL_PERIOD_MS));
    let mut last = Instant::now();

    loop {
        ticker.next().await;

        let now = Instant::now();
        let elapsed_ms = (now - last).as_millis() as u32;
        last = now;

        let mut events: Vec<Event, EVENT_QUEUE_DEPTH> = Vec::new();
        let mut lit = [false; STATUS_LED_COUNT];
        motors.lock(|sm| {
            let mut sm = sm.borrow_mut();
            sm.control_cycle(elapsed_ms);

            while let Some(event) = sm.next_event() {
                if events.push(event).is_err() {
                    break;
                }
            }

            for bank in sm.banks() {
                if let Some(led) = bank.status_led().and_then(|i| lit.get_mut(i as usize)) {
                    *led |= bank.led_on();
                }
            }
            for motor in sm.linked_motors() {
                if let Some(led) = motor.status_led().and_then(|i| lit.get_mut(i as usize)) {
                    *led |= motor.led_on();
                }
            }
        });

        for event in events.iter() {
            log_event(event);
        }
        for (led, on) in leds.iter_mut().zip(lit) {
            led.set(on);
        }
    }
}

fn log_event(event: &Event) {
    match event {
        Event::MonitorChanged {
            monitor,
            enabled: false,
        } => match monitor {
            MonitorKind::Ptc => warn!("PTC monitor disabled, motors are unprotected"),
            MonitorKind::Current => warn!("Current monitor disabled"),
        },
        Event::LinkFault { bank, fault } => debug!("Bank {} link fault: {:?}", bank, fault),
        e if e.is_fault() => warn!("{:?}", e),
        e => info!("{:?}", e),
    }
}
