//! Configuration types
//!
//! Board-agnostic wiring and protection settings, optionally stored as
//! postcard binary data.

#[cfg(feature = "serde")]
pub mod persist;
pub mod types;

pub use types::*;
