//! Events raised by the motor runtime
//!
//! The core never logs. State transitions worth reporting are queued here
//! and the firmware drains the queue and logs them.

use heapless::Deque;

use crate::error::SmartMotorError;
use crate::link::LinkFault;

/// Queue depth before the oldest events are dropped
pub const EVENT_QUEUE_DEPTH: usize = 32;

/// Protection that can be switched on and off
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MonitorKind {
    Ptc,
    Current,
}

/// Reportable state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    // Configuration
    /// Motor bound to a bank slot
    MotorLinked { motor: u8, bank: u8, slot: u8 },
    /// Motor released from its slot
    MotorUnlinked { motor: u8 },
    /// A configured motor could not be registered and was skipped
    RegistrationFailed { motor: u8, error: SmartMotorError },

    // Commands
    /// Motor enabled with `run`
    MotorRunning { motor: u8 },
    /// Motor disabled with `stop`
    MotorStopped { motor: u8 },
    /// A protection was switched on or off
    MonitorChanged { monitor: MonitorKind, enabled: bool },

    // Protection
    /// Motor PTC estimate crossed the trip temperature
    PtcTripped { motor: u8 },
    /// Motor PTC estimate cooled below the release temperature
    PtcCleared { motor: u8 },
    /// Motor current exceeded its ceiling
    CurrentLimited { motor: u8 },
    /// Motor current fell back under its ceiling
    CurrentReleased { motor: u8 },
    /// Bank supply PTC tripped
    BankTripped { bank: u8 },
    /// Bank supply PTC released
    BankCleared { bank: u8 },
    /// Power expander supply lost; the bank is held tripped
    ExpanderUndervoltage { bank: u8, millivolts: u16 },

    // Link
    /// A frame exchange with a bank failed
    LinkFault { bank: u8, fault: LinkFault },
    /// Consecutive faults took the bank offline
    LinkOffline { bank: u8 },
    /// A good reply brought an offline bank back
    LinkRestored { bank: u8 },
}

impl Event {
    /// Check if this event reports a protection engaging or a failure
    pub fn is_fault(&self) -> bool {
        matches!(
            self,
            Event::RegistrationFailed { .. }
                | Event::PtcTripped { .. }
                | Event::CurrentLimited { .. }
                | Event::BankTripped { .. }
                | Event::ExpanderUndervoltage { .. }
                | Event::LinkFault { .. }
                | Event::LinkOffline { .. }
        )
    }

    /// Check if this event reports a protection being switched off
    pub fn is_safety_override(&self) -> bool {
        matches!(self, Event::MonitorChanged { enabled: false, .. })
    }
}

/// Bounded event queue
///
/// When full, the oldest event is dropped to make room.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    queue: Deque<Event, EVENT_QUEUE_DEPTH>,
    dropped: u32,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: Event) {
        if self.queue.is_full() {
            self.queue.pop_front();
            self.dropped = self.dropped.saturating_add(1);
        }
        // Cannot fail, room was made above
        let _ = self.queue.push_back(event);
    }

    /// Take the oldest queued event
    pub fn pop(&mut self) -> Option<Event> {
        self.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Events lost to overflow since startup
    pub fn dropped(&self) -> u32 {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_events() {
        assert!(Event::PtcTripped { motor: 0 }.is_fault());
        assert!(Event::LinkOffline { bank: 1 }.is_fault());
        assert!(!Event::PtcCleared { motor: 0 }.is_fault());
        assert!(!Event::MotorRunning { motor: 2 }.is_fault());
    }

    #[test]
    fn test_safety_override() {
        let off = Event::MonitorChanged {
            monitor: MonitorKind::Ptc,
            enabled: false,
        };
        let on = Event::MonitorChanged {
            monitor: MonitorKind::Current,
            enabled: true,
        };
        assert!(off.is_safety_override());
        assert!(!on.is_safety_override());
    }

    #[test]
    fn test_log_fifo() {
        let mut log = EventLog::new();
        log.push(Event::MotorRunning { motor: 1 });
        log.push(Event::MotorStopped { motor: 1 });
        assert_eq!(log.pop(), Some(Event::MotorRunning { motor: 1 }));
        assert_eq!(log.pop(), Some(Event::MotorStopped { motor: 1 }));
        assert_eq!(log.pop(), None);
    }

    #[test]
    fn test_log_drops_oldest_when_full() {
        let mut log = EventLog::new();
        for motor in 0..(EVENT_QUEUE_DEPTH as u8 + 2) {
            log.push(Event::MotorRunning { motor });
        }
        assert_eq!(log.len(), EVENT_QUEUE_DEPTH);
        assert_eq!(log.dropped(), 2);
        assert_eq!(log.pop(), Some(Event::MotorRunning { motor: 2 }));
    }
}
