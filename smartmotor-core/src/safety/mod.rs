//! Motor protection
//!
//! Trip latches and command limits for PTC temperature and current.

pub mod limiter;

pub use limiter::{thermal_target, CommandLimit, CurrentLatch, Monitors, PtcLatch};
