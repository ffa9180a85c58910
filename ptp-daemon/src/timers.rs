//! PTP-TIMERS (§4.6) on Linux: a `ptp_core::timers::Timers` driven off
//! `std::time::Instant`, one deadline per slot. No dedicated timer thread;
//! the daemon's poll loop (§5) calls `next_deadline` to size its `select!`
//! wait and `expired` to drain whichever slots fired.

use std::{
    collections::HashMap,
    time::{Duration as StdDuration, Instant as StdInstant},
};

use ptp_core::{
    time::Duration,
    timers::{TimerSlot, Timers},
};

#[derive(Debug, Default)]
pub struct LinuxTimers {
    deadlines: HashMap<TimerSlot, StdInstant>,
}

impl LinuxTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// How long until the next armed timer fires, for sizing the poll
    /// loop's bounded wait. `None` if nothing is armed.
    pub fn next_deadline(&self) -> Option<StdDuration> {
        let now = StdInstant::now();
        self.deadlines
            .values()
            .map(|&deadline| deadline.saturating_duration_since(now))
            .min()
    }
}

fn to_std_duration(d: Duration) -> StdDuration {
    if d.total_nanos() <= 0 {
        StdDuration::ZERO
    } else {
        StdDuration::from_nanos(d.total_nanos() as u64)
    }
}

impl Timers for LinuxTimers {
    fn start(&mut self, slot: TimerSlot, after: Duration) {
        self.deadlines
            .insert(slot, StdInstant::now() + to_std_duration(after));
    }

    fn stop(&mut self, slot: TimerSlot) {
        self.deadlines.remove(&slot);
    }

    fn expired(&mut self, slot: TimerSlot) -> bool {
        match self.deadlines.get(&slot) {
            Some(&deadline) if deadline <= StdInstant::now() => {
                self.deadlines.remove(&slot);
                true
            }
            _ => false,
        }
    }
}
