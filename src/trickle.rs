//! Trickle-style adaptive interval timer (§4.3).
//!
//! Reworked from `trickle-timer.c`: state is just `T`. Each fire may
//! transmit, then `T` doubles (capped at `T_MAX`); any observed topology
//! change resets `T` to `T_MIN`. Reasoning carried over from the source's
//! comment: rapid convergence while the network is unsettled, logarithmic
//! traffic once stable.
//!
//! The source reseeded `rand` from the wall clock on every draw
//! (`srand(time(NULL))`); that collapses the RNG period to one-per-second
//! resolution and is not reproduced here — the caller supplies an `Rng`, so
//! tests can use a seeded generator for deterministic draws.

use embassy_time::Duration;
use rand::Rng;

/// Adaptive interval generator; see module docs.
#[derive(Debug, Clone, Copy)]
pub struct TrickleTimer {
    t_min: Duration,
    t_max: Duration,
    t: Duration,
}

impl TrickleTimer {
    pub fn new(t_min: Duration, t_max: Duration) -> Self {
        TrickleTimer { t_min, t_max, t: t_min }
    }

    /// Current interval `T`.
    pub fn interval(&self) -> Duration {
        self.t
    }

    /// Draw the next fire delay, uniformly from `[T/2, T]`, then double `T`
    /// (capped at `T_MAX`). Call this when a periodic timer fires.
    pub fn next_delay_and_advance(&mut self, rng: &mut impl Rng) -> Duration {
        let delay = self.sample_delay(rng);
        self.double();
        delay
    }

    /// Reset to `T_MIN` and immediately draw a fresh delay in
    /// `[T_MIN/2, T_MIN]`, without doubling `T` afterwards. This is the
    /// reschedule used on an observed inconsistency: the source's
    /// `reset_timers()` calls `trickle_reset` followed by `trickle_random`
    /// with no `update_T` in between (`trickle-timer.c`), unlike a timer
    /// that actually fires and must advance `T` via
    /// [`Self::next_delay_and_advance`].
    pub fn reset_and_sample(&mut self, rng: &mut impl Rng) -> Duration {
        self.reset();
        self.sample_delay(rng)
    }

    fn sample_delay(&self, rng: &mut impl Rng) -> Duration {
        let half_micros = self.t.as_micros() / 2;
        let full_micros = self.t.as_micros();
        if full_micros <= half_micros {
            return self.t;
        }
        let micros = rng.gen_range(half_micros..=full_micros);
        Duration::from_micros(micros as u64)
    }

    fn double(&mut self) {
        let doubled = self.t * 2;
        self.t = if doubled > self.t_max { self.t_max } else { doubled };
    }

    /// Reset to `T_MIN` on an observed inconsistency (new child, new/changed
    /// parent, rank change, child expiry, detach).
    pub fn reset(&mut self) {
        self.t = self.t_min;
    }
}
