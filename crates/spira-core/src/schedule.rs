//! Cooperative refresh timer.
//!
//! Nothing here sleeps or spawns: the owner calls [`RefreshScheduler::poll`]
//! from its own loop with the current instant, and the scheduler answers
//! whether a timer-driven refresh is due.
//!
//! ```text
//!            timer due / explicit refresh
//!          ┌──────────────┐
//!          ▼              │
//!      Running ───────────┘
//!        │  ▲
//! total  │  │ explicit refresh
//! failure▼  │
//!      Halted
//! ```

use serde::Serialize;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerState {
    Running,
    Halted,
}

#[derive(Debug, Clone)]
pub struct RefreshScheduler {
    state: SchedulerState,
    interval: Option<Duration>,
    next_due: Option<Instant>,
}

impl RefreshScheduler {
    /// Start in `Running`. With an interval, the first timer refresh is due
    /// one interval after `now`; without one, no timer is armed.
    #[must_use]
    pub fn new(interval: Option<Duration>, now: Instant) -> Self {
        Self {
            state: SchedulerState::Running,
            interval,
            next_due: interval.and_then(|every| now.checked_add(every)),
        }
    }

    #[must_use]
    pub const fn state(&self) -> SchedulerState {
        self.state
    }

    #[must_use]
    pub const fn is_halted(&self) -> bool {
        matches!(self.state, SchedulerState::Halted)
    }

    #[must_use]
    pub const fn interval(&self) -> Option<Duration> {
        self.interval
    }

    #[must_use]
    pub const fn next_due(&self) -> Option<Instant> {
        self.next_due
    }

    /// Time left until the next timer refresh, zero if overdue.
    #[must_use]
    pub fn time_until_due(&self, now: Instant) -> Option<Duration> {
        self.next_due.map(|due| due.saturating_duration_since(now))
    }

    /// Returns `true` when a timer-driven refresh should run now. The next
    /// deadline is armed before returning.
    pub fn poll(&mut self, now: Instant) -> bool {
        if self.is_halted() {
            return false;
        }
        match self.next_due {
            Some(due) if due <= now => {
                self.rearm(now);
                true
            }
            _ => false,
        }
    }

    /// The user asked for a refresh: cancel the pending deadline, leave
    /// `Halted` if needed, and re-arm from `now`.
    pub fn explicit_refresh(&mut self, now: Instant) {
        if self.is_halted() {
            tracing::info!("explicit refresh resumes the refresh timer");
        }
        self.state = SchedulerState::Running;
        self.rearm(now);
    }

    /// Stop timer-driven refreshes until the next explicit refresh.
    pub fn halt(&mut self) {
        self.state = SchedulerState::Halted;
        self.next_due = None;
    }

    /// Change the configured interval. The current deadline is kept; a
    /// running scheduler without a deadline arms one from `now`.
    pub fn set_interval(&mut self, interval: Option<Duration>, now: Instant) {
        self.interval = interval;
        if interval.is_none() {
            self.next_due = None;
        } else if self.next_due.is_none() && !self.is_halted() {
            self.rearm(now);
        }
    }

    /// An interval too large to represent as an `Instant` arms nothing.
    fn rearm(&mut self, now: Instant) {
        self.next_due = self.interval.and_then(|every| now.checked_add(every));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::effective_interval;

    #[test]
    fn unrepresentable_interval_arms_no_deadline() {
        let start = Instant::now();
        let mut scheduler = RefreshScheduler::new(effective_interval(i64::MAX), start);
        assert_eq!(scheduler.state(), SchedulerState::Running);
        assert!(scheduler.interval().is_some());
        assert_eq!(scheduler.next_due(), None);

        scheduler.explicit_refresh(start);
        assert_eq!(scheduler.next_due(), None);
        assert!(!scheduler.poll(start + Duration::from_secs(3600)));
    }

    #[test]
    fn three_second_setting_fires_on_five_second_floor() {
        let start = Instant::now();
        let mut scheduler = RefreshScheduler::new(effective_interval(3), start);

        assert!(!scheduler.poll(start + Duration::from_millis(3000)));
        assert!(!scheduler.poll(start + Duration::from_millis(4999)));
        assert!(scheduler.poll(start + Duration::from_millis(5000)));
        assert_eq!(
            scheduler.next_due(),
            Some(start + Duration::from_millis(10_000))
        );
    }

    #[test]
    fn poll_fires_once_per_deadline() {
        let start = Instant::now();
        let mut scheduler = RefreshScheduler::new(Some(Duration::from_secs(10)), start);
        let late = start + Duration::from_secs(25);
        assert!(scheduler.poll(late));
        assert!(!scheduler.poll(late));
    }

    #[test]
    fn zero_interval_never_fires_but_stays_running() {
        let start = Instant::now();
        let mut scheduler = RefreshScheduler::new(effective_interval(0), start);
        assert_eq!(scheduler.next_due(), None);
        assert!(!scheduler.poll(start + Duration::from_secs(3600)));
        assert_eq!(scheduler.state(), SchedulerState::Running);

        scheduler.explicit_refresh(start + Duration::from_secs(1));
        assert_eq!(scheduler.state(), SchedulerState::Running);
        assert_eq!(scheduler.next_due(), None);
    }

    #[test]
    fn explicit_refresh_cancels_pending_deadline() {
        let start = Instant::now();
        let mut scheduler = RefreshScheduler::new(Some(Duration::from_secs(10)), start);
        let at = start + Duration::from_secs(8);
        scheduler.explicit_refresh(at);
        assert!(!scheduler.poll(start + Duration::from_secs(10)));
        assert!(scheduler.poll(at + Duration::from_secs(10)));
    }

    #[test]
    fn halted_ignores_timer_until_explicit_refresh() {
        let start = Instant::now();
        let mut scheduler = RefreshScheduler::new(Some(Duration::from_secs(5)), start);
        scheduler.halt();
        assert!(scheduler.is_halted());
        assert_eq!(scheduler.next_due(), None);
        assert!(!scheduler.poll(start + Duration::from_secs(60)));

        let resume = start + Duration::from_secs(61);
        scheduler.explicit_refresh(resume);
        assert_eq!(scheduler.state(), SchedulerState::Running);
        assert!(scheduler.poll(resume + Duration::from_secs(5)));
    }

    #[test]
    fn enabling_interval_arms_timer() {
        let start = Instant::now();
        let mut scheduler = RefreshScheduler::new(None, start);
        scheduler.set_interval(Some(Duration::from_secs(5)), start);
        assert_eq!(scheduler.time_until_due(start), Some(Duration::from_secs(5)));

        scheduler.set_interval(None, start);
        assert_eq!(scheduler.next_due(), None);
    }
}
