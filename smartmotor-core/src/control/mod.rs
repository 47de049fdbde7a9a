//! Closed-loop speed control

pub mod pid;
pub mod speed;

pub use pid::{PidGains, SpeedPid};
pub use speed::{rpm_from_ticks, simulated_rpm, SpeedEstimator};
