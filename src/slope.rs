//! Per-child slope engine for computation nodes (§4.7).
//!
//! Reworks `computation.c`'s `computed_mote_t` array into a small fixed-size
//! table of ring buffers. Two of the source's documented bugs are fixed per
//! `spec.md` §9: the accumulator uses `+=` everywhere (true least squares,
//! the source had `sum_xy = x[i]*y_i` instead of `+=`), and the comparison
//! convention is `slope >= threshold` with a positive threshold meaning
//! "worsening" (the source had two versions disagreeing on sign).

use crate::node::NodeId;
use embassy_time::{Duration, Instant};

/// Result of [`SlopeEngine::ingest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    OpenValve,
    CloseValve,
    /// No free slot for a new neighbor; caller should forward the DATA
    /// upstream instead of consuming it.
    CannotTrack,
}

#[derive(Debug, Clone)]
struct Slot {
    addr: NodeId,
    last_seen: Instant,
    in_use: bool,
    values: Vec<u16>,
    head: usize,
    tail: usize,
    wrapped: bool,
    max_samples: usize,
}

impl Slot {
    fn new(max_samples: usize) -> Self {
        Slot {
            addr: NodeId::UNASSIGNED,
            last_seen: Instant::from_secs(0),
            in_use: false,
            values: Vec::with_capacity(max_samples),
            head: 0,
            tail: 0,
            wrapped: false,
            max_samples,
        }
    }

    fn reset_for(&mut self, addr: NodeId, now: Instant) {
        self.addr = addr;
        self.last_seen = now;
        self.in_use = true;
        self.values.clear();
        self.head = 0;
        self.tail = 0;
        self.wrapped = false;
    }

    fn push(&mut self, value: u16, now: Instant) {
        self.last_seen = now;
        if self.values.len() < self.max_samples {
            self.values.push(value);
            self.tail = (self.tail + 1) % self.max_samples;
        } else {
            self.values[self.tail] = value;
            self.tail = (self.tail + 1) % self.max_samples;
            self.head = self.tail;
            self.wrapped = true;
        }
    }

    fn sample_count(&self) -> usize {
        self.values.len()
    }

    /// Samples in insertion order, oldest first.
    fn samples_oldest_first(&self) -> Vec<u16> {
        if !self.wrapped {
            return self.values.clone();
        }
        let n = self.values.len();
        (0..n).map(|i| self.values[(self.head + i) % n]).collect()
    }
}

/// Tracks up to `max_tracked` neighbors, each with a `max_samples`-deep ring
/// of air-quality readings.
#[derive(Debug, Clone)]
pub struct SlopeEngine {
    slots: Vec<Slot>,
    min_samples: usize,
    slope_threshold: i32,
    timeout: Duration,
}

impl SlopeEngine {
    pub fn new(max_tracked: usize, max_samples: usize, min_samples: usize, slope_threshold: i32, timeout: Duration) -> Self {
        SlopeEngine {
            slots: (0..max_tracked).map(|_| Slot::new(max_samples)).collect(),
            min_samples,
            slope_threshold,
            timeout,
        }
    }

    /// Opportunistically expire any tracked slot whose `lastSeen` is older
    /// than `TIMEOUT`, then find (or allocate) the slot for `src`.
    fn locate_slot(&mut self, src: NodeId, now: Instant) -> Option<usize> {
        let mut free_idx = None;
        let mut found_idx = None;
        for (i, slot) in self.slots.iter_mut().enumerate() {
            let age = Duration::from_ticks(now.as_ticks().saturating_sub(slot.last_seen.as_ticks()));
            if slot.in_use && age > self.timeout {
                slot.in_use = false;
            }
            if slot.in_use && slot.addr == src {
                found_idx = Some(i);
            } else if !slot.in_use && free_idx.is_none() {
                free_idx = Some(i);
            }
        }
        found_idx.or(free_idx)
    }

    /// Ingest one reading from `src`. See module docs for the decision rule.
    pub fn ingest(&mut self, src: NodeId, value: u16, now: Instant) -> IngestOutcome {
        let Some(idx) = self.locate_slot(src, now) else {
            return IngestOutcome::CannotTrack;
        };
        let slot = &mut self.slots[idx];
        if !slot.in_use || slot.addr != src {
            slot.reset_for(src, now);
        }
        slot.push(value, now);

        let enough = slot.wrapped || slot.sample_count() > self.min_samples;
        if !enough {
            return IngestOutcome::CloseValve;
        }

        let slope = Self::least_squares_slope_percent(&slot.samples_oldest_first());
        if slope >= self.slope_threshold {
            IngestOutcome::OpenValve
        } else {
            IngestOutcome::CloseValve
        }
    }

    /// `slope = (Σx·Σy - n·Σxy) / (Σx² - n·Σxx)` over `(i, value_i)` for
    /// `i ∈ [0, n)` in insertion order, truncated to integer percent.
    fn least_squares_slope_percent(values: &[u16]) -> i32 {
        let n = values.len() as f64;
        let (mut sum_x, mut sum_y, mut sum_xx, mut sum_xy) = (0.0f64, 0.0f64, 0.0f64, 0.0f64);
        for (i, &y) in values.iter().enumerate() {
            let x = i as f64;
            let y = y as f64;
            sum_x += x;
            sum_y += y;
            sum_xx += x * x;
            sum_xy += x * y;
        }
        let denom = sum_x * sum_x - n * sum_xx;
        if denom == 0.0 {
            return 0;
        }
        let slope = (sum_x * sum_y - n * sum_xy) / denom;
        (slope * 100.0) as i32 / 100
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> SlopeEngine {
        SlopeEngine::new(5, 30, 10, 30, Duration::from_secs(100))
    }

    #[test]
    fn cannot_track_beyond_max_tracked() {
        let mut e = engine();
        let t0 = Instant::from_secs(0);
        for i in 1..=5u16 {
            assert_ne!(e.ingest(NodeId(i), 100, t0), IngestOutcome::CannotTrack);
        }
        assert_eq!(e.ingest(NodeId(6), 100, t0), IngestOutcome::CannotTrack);
    }

    #[test]
    fn flat_samples_do_not_open_before_enough_data() {
        let mut e = engine();
        let t0 = Instant::from_secs(0);
        for _ in 0..5 {
            assert_eq!(e.ingest(NodeId(1), 150, t0), IngestOutcome::CloseValve);
        }
    }

    #[test]
    fn slope_below_threshold_closes_valve() {
        // S6: 11 samples, slope 10/step.
        let mut e = engine();
        let t0 = Instant::from_secs(0);
        let mut last = IngestOutcome::CloseValve;
        for i in 0..11u16 {
            last = e.ingest(NodeId(1), 100 + i * 10, t0);
        }
        assert_eq!(last, IngestOutcome::CloseValve);
    }

    #[test]
    fn slope_at_or_above_threshold_opens_valve() {
        // S6 continuation: slope 50/step.
        let mut e = engine();
        let t0 = Instant::from_secs(0);
        let mut last = IngestOutcome::CloseValve;
        for i in 0..11u16 {
            last = e.ingest(NodeId(1), 100 + i * 50, t0);
        }
        assert_eq!(last, IngestOutcome::OpenValve);
    }

    #[test]
    fn eviction_discards_history() {
        let mut e = engine();
        let t0 = Instant::from_secs(0);
        for i in 0..15u16 {
            e.ingest(NodeId(1), 100 + i * 50, t0);
        }
        // After the timeout elapses with no further traffic, the slot is
        // freed on the next `locate_slot` call and a fresh neighbor can
        // reuse it without inheriting any history.
        let t1 = t0 + Duration::from_secs(101);
        let result = e.ingest(NodeId(2), 100, t1);
        assert_ne!(result, IngestOutcome::CannotTrack);
    }
}
