//! Board-agnostic protection and control for smart DC motors
//!
//! This crate holds every piece of the motor pipeline that does not touch
//! hardware:
//!
//! - Motor profiles and the PTC thermal model
//! - Current estimation and the current/thermal limiter
//! - Slew limiting and closed-loop speed control
//! - The motor/bank/sensor registry and its periodic cycles
//! - The registry side of the bank controller link
//! - Configuration types and queued events
//!
//! Per control period the data flows one way:
//!
//! ```text
//! set_motor ─► cmd ─► limiter ─► req ─► slew ─► output ─► bank link
//!                        ▲                                   │
//!     thermal ◄── current ◄── speed ◄────── readings ◄───────┘
//! ```

#![no_std]
#![deny(unsafe_code)]

pub mod config;
pub mod control;
pub mod current;
pub mod error;
pub mod link;
pub mod profile;
pub mod registry;
pub mod safety;
pub mod slew;
pub mod state;
pub mod thermal;
pub mod traits;

pub use error::{ConfigError, SmartMotorError};
pub use link::{LinkFault, LinkHealth};
pub use profile::MotorKind;
pub use registry::SmartMotors;
pub use state::Event;
