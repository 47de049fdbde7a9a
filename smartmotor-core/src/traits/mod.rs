//! Hardware abstraction traits
//!
//! These traits define the interface between the motor runtime and
//! hardware-specific implementations.

pub mod led;
pub mod link;

pub use led::StatusLed;
pub use link::{LinkTransport, TransportError};
