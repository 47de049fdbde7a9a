//! Runtime events
//!
//! Protection trips, link faults and configuration outcomes are queued as
//! events for the firmware to log.

pub mod events;

pub use events::{Event, EventLog, MonitorKind, EVENT_QUEUE_DEPTH};
