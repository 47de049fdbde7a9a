//! Controller bank link protocol
//!
//! This crate defines the framed exchange between the motor runtime and
//! the motor controller on each bank (the Cortex master processor or a
//! power expander). Every control cycle the runtime sends one command
//! frame per bank and receives one reading frame back.
//!
//! # Protocol Overview
//!
//! All messages use a simple binary frame format:
//! ```text
//! ┌───────┬────────┬──────┬─────────────┬──────────┐
//! │ START │ LENGTH │ TYPE │ PAYLOAD     │ CHECKSUM │
//! │ 1B    │ 1B     │ 1B   │ 0–64B       │ 1B       │
//! └───────┴────────┴──────┴─────────────┴──────────┘
//! ```
//!
//! TYPE carries the payload layout version in the high nibble and the
//! frame kind (commands or readings) in the low nibble. Controller
//! firmware revisions disagree on what a reading contains, so payloads
//! are decoded into explicit per-version variants and then normalized.

#![no_std]
#![deny(unsafe_code)]

pub mod fault;
pub mod frame;
pub mod messages;

pub use fault::{BankStatus, SlotFault};
pub use frame::{Frame, FrameError, FRAME_START, MAX_FRAME_SIZE, MAX_PAYLOAD_SIZE};
pub use messages::{
    BankReadings, CommandFrame, FrameKind, FrameLayout, ReadingFrame, SlotReading, SlotReadingV1,
    SlotReadingV2, BANK_SLOTS, V1_BATTERY_MV_PER_COUNT,
};
