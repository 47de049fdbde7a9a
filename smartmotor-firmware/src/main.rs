//! Smartmotor - motor protection runtime firmware
//!
//! Runs the smart motor registry on an RP2040 robot controller. Motor
//! banks are reached over SPI, the power expander status port on the
//! ADC, and status LEDs on plain GPIOs.

#![no_std]
#![no_main]

use core::cell::RefCell;

use defmt::*;
use embassy_executor::Spawner;
use embassy_rp::adc::{Adc, Channel as AdcChannel, Config as AdcConfig, InterruptHandler as AdcInterruptHandler};
use embassy_rp::bind_interrupts;
use embassy_rp::gpio::{Level, Output, Pull};
use embassy_sync::blocking_mutex::Mutex;
use embassy_time::Timer;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use smartmotor_core::config::BankKind;
use smartmotor_core::SmartMotors;
use smartmotor_drivers::GpioStatusLed;

use crate::channels::{MotorRequest, SharedMotors, COMMANDS};

mod channels;
mod config;
mod tasks;

bind_interrupts!(struct Irqs {
    ADC_IRQ_FIFO => AdcInterruptHandler;
});

/// Seconds between status dumps
const HEARTBEAT_SECS: u64 = 10;

static MOTORS: StaticCell<SharedMotors> = StaticCell::new();

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Smartmotor firmware starting...");

    let p = embassy_rp::init(Default::default());
    info!("Peripherals initialized");

    let system = config::load(p.FLASH);
    let registry = match SmartMotors::from_config(&system) {
        Ok(registry) => registry,
        Err(e) => {
            error!("Configuration rejected: {:?}, using default wiring", e);
            unwrap!(SmartMotors::from_config(&config::default_system_config()))
        }
    };
    let motors: &'static SharedMotors = MOTORS.init(Mutex::new(RefCell::new(registry)));
    info!("Registry ready");

    // Status LEDs: onboard LED then GPIO10-12
    let leds: tasks::StatusLeds = [
        GpioStatusLed::new_active_high(Output::new(p.PIN_25, Level::Low)),
        GpioStatusLed::new_active_high(Output::new(p.PIN_10, Level::Low)),
        GpioStatusLed::new_active_high(Output::new(p.PIN_11, Level::Low)),
        GpioStatusLed::new_active_high(Output::new(p.PIN_12, Level::Low)),
    ];

    #[cfg(not(feature = "simulated-banks"))]
    let link = {
        use embassy_rp::spi::{Config as SpiConfig, Spi};
        use embassy_time::Delay;
        use smartmotor_drivers::AsyncSpiLink;

        // SPI0: SCK=GPIO18, MOSI=GPIO19, MISO=GPIO16, bank selects GPIO17/20/21
        let mut spi_config = SpiConfig::default();
        spi_config.frequency = 1_000_000;
        let spi = Spi::new(
            p.SPI0, p.PIN_18, p.PIN_19, p.PIN_16, p.DMA_CH0, p.DMA_CH1, spi_config,
        );
        let chip_selects = [
            Output::new(p.PIN_17, Level::High),
            Output::new(p.PIN_20, Level::High),
            Output::new(p.PIN_21, Level::High),
        ];
        info!("SPI bank link initialized");
        AsyncSpiLink::new(spi, chip_selects, Delay)
    };

    #[cfg(feature = "simulated-banks")]
    let link = {
        warn!("Bank link simulated, no motor will move");
        smartmotor_drivers::SimulatedController::new()
    };

    // Expander status port on ADC channel 0-2 (GPIO26-28)
    let expander = motors.lock(|sm| {
        sm.borrow().banks().iter().find_map(|bank| match (bank.kind(), bank.status_port()) {
            (BankKind::PowerExpander, Some(port)) => Some((bank.index(), port)),
            _ => None,
        })
    });

    spawner.spawn(tasks::control_task(motors, leds)).unwrap();
    spawner.spawn(tasks::slew_task(motors)).unwrap();
    spawner.spawn(tasks::link_task(motors, link)).unwrap();
    spawner.spawn(tasks::command_task(motors)).unwrap();

    if let Some((bank, port)) = expander {
        let channel = match port {
            0 => Some(AdcChannel::new_pin(p.PIN_26, Pull::None)),
            1 => Some(AdcChannel::new_pin(p.PIN_27, Pull::None)),
            2 => Some(AdcChannel::new_pin(p.PIN_28, Pull::None)),
            _ => None,
        };
        match channel {
            Some(channel) => {
                let adc = Adc::new(p.ADC, Irqs, AdcConfig::default());
                spawner
                    .spawn(tasks::expander_task(motors, adc, channel, bank))
                    .unwrap();
            }
            None => warn!("Expander status port {} has no analog pin", port),
        }
    }

    info!("All tasks spawned, enabling motors");
    COMMANDS.send(MotorRequest::RunAll).await;

    loop {
        Timer::after_secs(HEARTBEAT_SECS).await;
        let status = motors.lock(|sm| sm.borrow().debug_status());
        debug!("{:?}", status);
    }
}
