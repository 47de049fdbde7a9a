//! Hardware driver implementations
//!
//! Concrete implementations of the traits defined in smartmotor-core:
//!
//! - Bank links over SPI, blocking and async
//! - A simulated bank controller for bench runs and tests
//! - GPIO status LEDs
//! - Power expander status port conversion

#![no_std]
#![deny(unsafe_code)]

pub mod expander;
pub mod led;
pub mod link;
pub mod simulated;

pub use led::GpioStatusLed;
pub use link::{AsyncSpiLink, SpiLink};
pub use simulated::SimulatedController;
