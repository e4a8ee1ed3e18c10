//! Open-addressed routing table: `NodeId -> (nextHop, lastSeen)`.
//!
//! Linear probing with a bounded chain length, rehash-on-load-factor-or-
//! probe-failure, and probe-shortening compaction on `get`. This is the
//! Rust reworking of the mote firmware's `hashmap.c`, generalized from
//! `linkaddr_t -> linkaddr_t` to the spec's `NodeId -> NodeId` mapping and
//! given proper tombstones (the source only ever cleared `in_use`, which
//! would have broken later probe chains on removal — the spec calls for
//! tombstone/empty distinction, so this implementation keeps that invariant
//! correctly instead of carrying the bug forward). It also carries forward
//! `hashmap.c`'s load-factor gate (`if (m->size >= m->table_size/2) return
//! MAP_FULL;`): a new key is rejected as FULL, forcing a rehash, whenever
//! accepting it would bring the table to half capacity, even when the probe
//! chain itself never runs long enough to hit `MAX_CHAIN`.

use crate::error::{PutOutcome, RemoveOutcome};
use crate::node::NodeId;
use embassy_time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Slot {
    Empty,
    Tombstone,
    Live { key: NodeId, next_hop: NodeId, last_seen: Instant },
}

/// Open-addressed `NodeId -> NodeId` map with entry aging.
#[derive(Debug, Clone)]
pub struct RoutingTable {
    slots: Vec<Slot>,
    size: usize,
    max_chain: usize,
}

impl RoutingTable {
    /// New table with the given initial capacity and maximum probe chain.
    pub fn new(initial_capacity: usize, max_chain: usize) -> Self {
        RoutingTable {
            slots: vec![Slot::Empty; initial_capacity.max(1)],
            size: 0,
            max_chain,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    fn start_index(&self, key: NodeId) -> usize {
        (key.0 as usize) % self.slots.len()
    }

    /// Probe for `key`. Returns `(found_index, first_free_index)` where
    /// `found_index` is `Some` only on an exact key match within the probe
    /// chain and `first_free_index` is the earliest empty-or-tombstone slot
    /// seen along the way (the relocation/insertion candidate).
    fn probe(&self, key: NodeId) -> (Option<usize>, Option<usize>) {
        let start = self.start_index(key);
        let mut first_free = None;
        for i in 0..self.max_chain.min(self.slots.len()) {
            let idx = (start + i) % self.slots.len();
            match self.slots[idx] {
                Slot::Empty => {
                    if first_free.is_none() {
                        first_free = Some(idx);
                    }
                    // A genuine empty slot ends the chain: if `key` had ever
                    // been inserted it would not probe past an empty slot.
                    return (None, first_free);
                }
                Slot::Tombstone => {
                    if first_free.is_none() {
                        first_free = Some(idx);
                    }
                }
                Slot::Live { key: k, .. } if k == key => return (Some(idx), first_free),
                Slot::Live { .. } => {}
            }
        }
        (None, first_free)
    }

    /// Insert or update `key -> next_hop` with `last_seen = now`.
    pub fn put(&mut self, key: NodeId, next_hop: NodeId, now: Instant) -> PutOutcome {
        match self.put_once(key, next_hop, now) {
            Some(outcome) => outcome,
            None => self.rehash_and_retry(key, next_hop, now),
        }
    }

    /// Single probe attempt; `None` means the probe exhausted `max_chain`
    /// without finding the key or an empty slot (caller must rehash).
    fn put_once(&mut self, key: NodeId, next_hop: NodeId, now: Instant) -> Option<PutOutcome> {
        let (found, first_free) = self.probe(key);
        if let Some(found_idx) = found {
            let target = first_free.unwrap_or(found_idx);
            if target != found_idx {
                self.slots[found_idx] = Slot::Tombstone;
            }
            self.slots[target] = Slot::Live { key, next_hop, last_seen: now };
            return Some(PutOutcome::Update);
        }
        // Load-factor gate for a brand-new key, mirroring `hashmap.c`'s
        // `if (m->size >= m->table_size/2) return MAP_FULL;` guard at the
        // top of the hash search — checked against the size *after* this
        // insertion so the table never reaches half capacity, not even via
        // a probe chain that happens to land on distinct empty slots
        // without ever exhausting `max_chain`.
        if (self.size + 1) * 2 >= self.slots.len() {
            return None;
        }
        if let Some(idx) = first_free {
            self.slots[idx] = Slot::Live { key, next_hop, last_seen: now };
            self.size += 1;
            return Some(PutOutcome::New);
        }
        None
    }

    /// Probe search hit `FULL`: grow to `2n+1` and retry, doubling again if
    /// the rehashed table still can't place the entry. Re-inserts performed
    /// *during* a rehash never themselves trigger a nested rehash — a
    /// failure there means this attempt's capacity was insufficient and the
    /// caller (this function) restarts with a larger target.
    fn rehash_and_retry(&mut self, key: NodeId, next_hop: NodeId, now: Instant) -> PutOutcome {
        let mut target_capacity = 2 * self.slots.len() + 1;
        loop {
            match self.try_rehash_into(target_capacity) {
                Some(rehashed) => {
                    *self = rehashed;
                    if let Some(outcome) = self.put_once(key, next_hop, now) {
                        return outcome;
                    }
                    // Freshly rehashed table still can't place it: grow further.
                    target_capacity = 2 * target_capacity + 1;
                }
                None => return PutOutcome::OutOfMemory,
            }
        }
    }

    /// Build a fresh table of `capacity` slots and reinsert every live entry
    /// via plain probing (no tombstones in a fresh table, so this can only
    /// fail by exhausting `max_chain`, never by running out of memory in a
    /// way distinct from allocation itself).
    fn try_rehash_into(&self, capacity: usize) -> Option<RoutingTable> {
        let mut fresh_slots: Vec<Slot> = Vec::new();
        fresh_slots.try_reserve_exact(capacity.max(1)).ok()?;
        fresh_slots.resize(capacity.max(1), Slot::Empty);
        let mut new_table = RoutingTable { slots: fresh_slots, size: 0, max_chain: self.max_chain };
        for slot in &self.slots {
            if let Slot::Live { key, next_hop, last_seen } = *slot {
                if new_table.put_once(key, next_hop, last_seen).is_none() {
                    return None;
                }
            }
        }
        Some(new_table)
    }

    /// Look up `key`, relocating it to an earlier empty/tombstone slot seen
    /// during the probe (probe-shortening compaction).
    pub fn get(&mut self, key: NodeId) -> Option<NodeId> {
        let (found, first_free) = self.probe(key);
        let found_idx = found?;
        let next_hop = match self.slots[found_idx] {
            Slot::Live { next_hop, .. } => next_hop,
            _ => unreachable!("probe only returns Some for a Live slot"),
        };
        if let Some(target) = first_free {
            if target != found_idx {
                let last_seen = match self.slots[found_idx] {
                    Slot::Live { last_seen, .. } => last_seen,
                    _ => unreachable!(),
                };
                self.slots[target] = Slot::Live { key, next_hop, last_seen };
                self.slots[found_idx] = Slot::Tombstone;
            }
        }
        Some(next_hop)
    }

    /// Remove `key`. Marks the slot a tombstone so other entries' probe
    /// chains stay intact.
    pub fn remove(&mut self, key: NodeId) -> RemoveOutcome {
        let (found, _) = self.probe(key);
        match found {
            Some(idx) => {
                self.slots[idx] = Slot::Tombstone;
                self.size -= 1;
                RemoveOutcome::Ok
            }
            None => RemoveOutcome::Missing,
        }
    }

    /// Drop entries whose `last_seen + ttl < now`. Returns whether any entry
    /// was removed.
    pub fn expire_older_than(&mut self, now: Instant, ttl: Duration) -> bool {
        let mut removed_any = false;
        for slot in &mut self.slots {
            if let Slot::Live { last_seen, .. } = *slot {
                if last_seen + ttl < now {
                    *slot = Slot::Tombstone;
                    self.size -= 1;
                    removed_any = true;
                }
            }
        }
        removed_any
    }

    /// Clear every entry (used by `detach`).
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = Slot::Empty;
        }
        self.size = 0;
    }
}
