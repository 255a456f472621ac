//! Cancellable repeating tick used to refresh the elapsed-time display.
//!
//! Only one schedule runs at a time. Starting a new one replaces the old,
//! and a [`TickHandle`] can only stop the schedule it was issued for, so a
//! finished trial can never keep a tick alive or cancel its successor's.

use std::time::Duration;
use tracing::debug;

/// Proof of ownership of the running schedule. Not `Clone`.
#[derive(Debug, PartialEq, Eq)]
pub struct TickHandle {
    id: u64,
}

#[derive(Debug, Clone, Copy)]
struct Scheduled {
    id: u64,
    interval_ns: u64,
    next_due_ns: u64,
}

#[derive(Debug, Default)]
pub struct TickSchedule {
    next_id: u64,
    active: Option<Scheduled>,
    fired: u64,
}

impl TickSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start ticking every `interval` from `now_ns`. The first tick is due immediately.
    pub fn start(&mut self, now_ns: u64, interval: Duration) -> TickHandle {
        if let Some(previous) = self.active.take() {
            debug!(id = previous.id, "replacing running tick schedule");
        }
        self.next_id += 1;
        let id = self.next_id;
        self.active = Some(Scheduled {
            id,
            interval_ns: (interval.as_nanos() as u64).max(1),
            next_due_ns: now_ns,
        });
        TickHandle { id }
    }

    /// Stops the schedule if `handle` still owns it
    pub fn cancel(&mut self, handle: TickHandle) -> bool {
        match self.active {
            Some(s) if s.id == handle.id => {
                self.active = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    /// Returns true when a tick is due and schedules the following one.
    /// Missed ticks are coalesced rather than replayed.
    pub fn poll(&mut self, now_ns: u64) -> bool {
        let Some(s) = self.active.as_mut() else {
            return false;
        };
        if now_ns < s.next_due_ns {
            return false;
        }
        let behind = (now_ns - s.next_due_ns) / s.interval_ns;
        s.next_due_ns += (behind + 1) * s.interval_ns;
        self.fired += 1;
        true
    }

    pub fn next_due(&self) -> Option<u64> {
        self.active.map(|s| s.next_due_ns)
    }

    /// Total ticks delivered over the lifetime of this schedule
    pub fn fired(&self) -> u64 {
        self.fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: u64 = 1_000_000;

    #[test]
    fn ticks_at_interval() {
        let mut ticks = TickSchedule::new();
        let _h = ticks.start(0, Duration::from_millis(16));
        assert!(ticks.poll(0));
        assert!(!ticks.poll(10 * MS));
        assert!(ticks.poll(16 * MS));
        assert_eq!(ticks.next_due(), Some(32 * MS));
    }

    #[test]
    fn late_poll_coalesces_missed_ticks() {
        let mut ticks = TickSchedule::new();
        let _h = ticks.start(0, Duration::from_millis(10));
        assert!(ticks.poll(0));
        assert!(ticks.poll(55 * MS));
        assert_eq!(ticks.next_due(), Some(60 * MS));
        assert_eq!(ticks.fired(), 2);
    }

    #[test]
    fn cancel_stops_ticking() {
        let mut ticks = TickSchedule::new();
        let handle = ticks.start(0, Duration::from_millis(10));
        assert!(ticks.cancel(handle));
        assert!(!ticks.is_running());
        assert!(!ticks.poll(100 * MS));
    }

    #[test]
    fn stale_handle_cannot_cancel_newer_schedule() {
        let mut ticks = TickSchedule::new();
        let old = ticks.start(0, Duration::from_millis(10));
        let _new = ticks.start(5 * MS, Duration::from_millis(10));
        assert!(!ticks.cancel(old));
        assert!(ticks.is_running());
    }
}
