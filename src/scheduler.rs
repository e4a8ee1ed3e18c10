//! Cooperative event scheduler (§4.8, §9 "timers as values").
//!
//! Each timer is a value — a tag plus an absolute deadline — rather than a
//! heap-allocated closure, avoiding per-timer closure allocation on
//! constrained targets. The scheduler only tracks *when*; dispatch (*what to
//! run*) lives in [`crate::mote::Mote::on_timer`], which matches on the tag.
//! This also makes the whole thing trivially deterministic to test: no
//! async runtime is needed to exercise timer logic, only plain `Instant`
//! values.

use embassy_time::{Duration, Instant};

/// The six named timers a Mote may run (§4.4, §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// DIS while detached, DIO while attached.
    Send,
    /// Periodic DAO to the current parent.
    Dao,
    /// Parent liveness window; firing means the parent DIO never arrived.
    Parent,
    /// Periodic sweep of aged-out routing (child) entries.
    Children,
    /// Sensor DATA_PERIOD.
    Data,
    /// Valve auto-close.
    Open,
}

const TIMER_COUNT: usize = 6;

impl TimerKind {
    fn index(self) -> usize {
        match self {
            TimerKind::Send => 0,
            TimerKind::Dao => 1,
            TimerKind::Parent => 2,
            TimerKind::Children => 3,
            TimerKind::Data => 4,
            TimerKind::Open => 5,
        }
    }

    const ALL: [TimerKind; TIMER_COUNT] =
        [TimerKind::Send, TimerKind::Dao, TimerKind::Parent, TimerKind::Children, TimerKind::Data, TimerKind::Open];
}

/// A fixed set of named timer deadlines. Arming an already-armed timer
/// replaces its deadline (a reset); `cancel` is idempotent.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scheduler {
    deadlines: [Option<Instant>; TIMER_COUNT],
}

impl Scheduler {
    pub fn new() -> Self {
        Scheduler { deadlines: [None; TIMER_COUNT] }
    }

    /// Arm `timer` to fire at `now + delay`. Re-arming an armed timer
    /// replaces its deadline.
    pub fn arm(&mut self, timer: TimerKind, now: Instant, delay: Duration) {
        self.deadlines[timer.index()] = Some(now + delay);
    }

    /// Sugar for `arm` at the call sites that are conceptually "restart this
    /// timer with its usual delay" (e.g. restarting the parent timeout on a
    /// fresh DIO).
    pub fn reset(&mut self, timer: TimerKind, now: Instant, delay: Duration) {
        self.arm(timer, now, delay);
    }

    pub fn cancel(&mut self, timer: TimerKind) {
        self.deadlines[timer.index()] = None;
    }

    pub fn is_armed(&self, timer: TimerKind) -> bool {
        self.deadlines[timer.index()].is_some()
    }

    pub fn deadline(&self, timer: TimerKind) -> Option<Instant> {
        self.deadlines[timer.index()]
    }

    /// Earliest armed deadline across all timers, used by the run loop to
    /// know how long it may sleep.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.iter().flatten().min().copied()
    }

    /// Pop and clear the single due timer with the earliest deadline at or
    /// before `now`, if any. The callback named by the returned tag is
    /// responsible for re-arming the timer if it should keep firing — a
    /// timer that re-arms itself inside its own callback will not be
    /// reported as due again within the same call.
    pub fn pop_due(&mut self, now: Instant) -> Option<TimerKind> {
        let due = TimerKind::ALL
            .into_iter()
            .filter_map(|k| self.deadlines[k.index()].map(|d| (k, d)))
            .filter(|(_, d)| *d <= now)
            .min_by_key(|(_, d)| *d)
            .map(|(k, _)| k)?;
        self.deadlines[due.index()] = None;
        Some(due)
    }
}
