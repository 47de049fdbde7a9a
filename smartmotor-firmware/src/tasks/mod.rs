//! Embassy async tasks
//!
//! Each task runs independently and shares the registry through
//! [`crate::channels::SharedMotors`].

pub mod command;
pub mod control;
pub mod expander;
pub mod link;
pub mod slew;

pub use command::command_task;
pub use control::{control_task, StatusLeds, STATUS_LED_COUNT};
pub use expander::expander_task;
pub use link::link_task;
pub use slew::slew_task;
