//! PTP-TIMERS (§4.6): the six named timeouts a port's state machine drives
//! itself with. The engine never reads the wall clock directly; it asks a
//! [`Timers`] implementation to arm, cancel and poll these slots, so the same
//! engine code runs against a real monotonic clock on Linux or a virtual one
//! in tests.

use crate::time::Duration;

/// One of the timeouts a port maintains. `AnnounceReceiptTimeout` runs only
/// while not MASTER; `QualificationTimeout` only while PRE_MASTER;
/// `PeerDelayReqInterval` only under the P2P delay mechanism (§4.2.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerSlot {
    AnnounceInterval,
    AnnounceReceiptTimeout,
    SyncInterval,
    DelayReqInterval,
    PeerDelayReqInterval,
    QualificationTimeout,
}

/// A set of six independent, re-armable timers (§4.6). Implementations are
/// expected to be cheap: the engine calls `expired` every time it is polled.
pub trait Timers {
    /// Arm `slot` to fire `after` from now, replacing any previous arming.
    fn start(&mut self, slot: TimerSlot, after: Duration);

    /// Disarm `slot`. A no-op if it was not armed.
    fn stop(&mut self, slot: TimerSlot);

    /// Check-and-clear: `true` at most once per `start`, the first time it
    /// is called after the deadline has passed.
    fn expired(&mut self, slot: TimerSlot) -> bool;
}

#[cfg(test)]
pub mod test {
    use super::*;
    use std::collections::HashMap;

    /// A timer set driven by an explicit, manually-advanced clock, for use in
    /// engine tests that need deterministic timeout behavior.
    #[derive(Default)]
    pub struct VirtualTimers {
        now: Duration,
        deadlines: HashMap<TimerSlot, Duration>,
    }

    impl VirtualTimers {
        pub fn advance(&mut self, by: Duration) {
            self.now += by;
        }
    }

    impl Timers for VirtualTimers {
        fn start(&mut self, slot: TimerSlot, after: Duration) {
            self.deadlines.insert(slot, self.now + after);
        }

        fn stop(&mut self, slot: TimerSlot) {
            self.deadlines.remove(&slot);
        }

        fn expired(&mut self, slot: TimerSlot) -> bool {
            match self.deadlines.get(&slot) {
                Some(&deadline) if deadline <= self.now => {
                    self.deadlines.remove(&slot);
                    true
                }
                _ => false,
            }
        }
    }

    #[test]
    fn fires_once_after_advancing_past_deadline() {
        let mut timers = VirtualTimers::default();
        timers.start(TimerSlot::SyncInterval, Duration::from_secs(1));
        assert!(!timers.expired(TimerSlot::SyncInterval));

        timers.advance(Duration::from_secs(2));
        assert!(timers.expired(TimerSlot::SyncInterval));
        assert!(!timers.expired(TimerSlot::SyncInterval));
    }

    #[test]
    fn stop_disarms() {
        let mut timers = VirtualTimers::default();
        timers.start(TimerSlot::AnnounceReceiptTimeout, Duration::from_secs(1));
        timers.stop(TimerSlot::AnnounceReceiptTimeout);
        timers.advance(Duration::from_secs(2));
        assert!(!timers.expired(TimerSlot::AnnounceReceiptTimeout));
    }
}
