//! DIS/DIO/DAO topology engine (§4.5): parent selection, attach/detach,
//! children lifecycle, and the periodic control-traffic callbacks.
//!
//! Reworked from `routing.c`'s `choose_parent`/`update_parent`/
//! `change_parent`/`detach` and `root-mote.c`/`sensor-mote.c`'s periodic
//! send loops, generalized to the single `Mote` type shared by every role.

use crate::mote::Mote;
use crate::node::{NodeId, ParentRecord, Rank, RssSample, Role};
use crate::scheduler::TimerKind;
use crate::transport::Transport;
use crate::wire::Message;
use embassy_time::Instant;
use rand::Rng;

/// Outcome of [`Mote::consider_parent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsiderParentOutcome {
    /// First-time parent choice for a detached node.
    New,
    /// Replaced an existing parent.
    Changed,
    /// Candidate was not preferred over the current parent.
    NotChanged,
}

impl Mote {
    /// A candidate is preferred over the current parent if its rank is
    /// lower, or ranks are equal and its RSS beats the current parent's by
    /// more than `RSS_HYSTERESIS` dB (prevents flapping on marginal links).
    pub fn consider_parent(&mut self, candidate: NodeId, candidate_rank: Rank, rss: RssSample) -> ConsiderParentOutcome {
        let hysteresis = self.config.rss_hysteresis;
        let outcome = match self.parent {
            None => ConsiderParentOutcome::New,
            Some(parent) => {
                let prefer = candidate_rank < parent.rank
                    || (candidate_rank == parent.rank && rss.0 > parent.rss.0.saturating_add(hysteresis));
                if !prefer {
                    return ConsiderParentOutcome::NotChanged;
                }
                if parent.addr == candidate {
                    ConsiderParentOutcome::NotChanged
                } else {
                    ConsiderParentOutcome::Changed
                }
            }
        };
        if outcome != ConsiderParentOutcome::NotChanged {
            self.parent = Some(ParentRecord { addr: candidate, rank: candidate_rank, rss });
            self.rank = candidate_rank.next_hop_rank();
            self.in_dodag = true;
            log::info!("[{:?}] parent {:?} rank={} rss={}", self.addr, candidate, self.rank.0, rss.0);
        }
        outcome
    }

    /// Transition to detached: drop the parent, reset rank, clear routing.
    /// Cancels all post-attach timers except `send`, which keeps firing —
    /// now issuing DIS instead of DIO (§5). `send` is always rearmed with a
    /// freshly Trickle-drawn delay (not just when it happened to be
    /// unarmed) so the node promptly resumes DIS instead of waiting out
    /// whatever long DIO deadline was already pending (`reset_timers()` in
    /// `examples/original_source/mote/computation-mote.c` does the same
    /// unconditional re-arm after `detach`).
    pub fn detach(&mut self, now: Instant, rng: &mut impl Rng) {
        self.in_dodag = false;
        self.rank = Rank::INFINITE;
        self.parent = None;
        self.routing.clear();
        self.scheduler.cancel(TimerKind::Dao);
        self.scheduler.cancel(TimerKind::Parent);
        self.scheduler.cancel(TimerKind::Children);
        self.scheduler.cancel(TimerKind::Data);
        self.scheduler.cancel(TimerKind::Open);
        self.trickle_dao.reset();
        let delay = self.trickle_send.reset_and_sample(rng);
        self.scheduler.arm(TimerKind::Send, now, delay);
        log::warn!("[{:?}] detached", self.addr);
    }

    /// An observed inconsistency (new child, new/changed parent, rank
    /// change, child expiry, detach) resets Trickle to `T_MIN` and, per
    /// `reset_timers()` in `examples/original_source/mote/computation-mote.c`,
    /// immediately reschedules the pending `Send`/`Dao` timers against the
    /// new (short) interval rather than leaving their old, possibly much
    /// later, deadlines in place. `Dao` is only rescheduled if it was
    /// already armed (i.e. this node is attached); a detached node has no
    /// `Dao` timer running and `detach` is responsible for `Send`.
    fn signal_inconsistency(&mut self, now: Instant, rng: &mut impl Rng) {
        let send_delay = self.trickle_send.reset_and_sample(rng);
        self.scheduler.arm(TimerKind::Send, now, send_delay);
        if self.scheduler.is_armed(TimerKind::Dao) {
            let dao_delay = self.trickle_dao.reset_and_sample(rng);
            self.scheduler.arm(TimerKind::Dao, now, dao_delay);
        } else {
            self.trickle_dao.reset();
        }
    }

    /// Handle a received DIS: roots and attached nodes may choose to answer
    /// with a DIO, but per this spec a DIS never itself alters state — the
    /// normal periodic Send timer carries DIO traffic. Kept as a named entry
    /// point so the dispatch table in `mote.rs` is complete and symmetric.
    pub fn handle_dis(&mut self) {
        log::debug!("[{:?}] DIS received", self.addr);
    }

    /// Handle a received DIO from `from` at `rss`.
    pub fn handle_dio(&mut self, from: NodeId, rank: Rank, rss: RssSample, now: Instant, transport: &mut impl Transport, rng: &mut impl Rng) {
        if self.role == Role::Root {
            // A root has no parent to update from; a DIO reaching it is a
            // protocol curiosity (loop or misconfigured peer), not an error.
            log::debug!("[{:?}] DIO received at root, ignoring", self.addr);
            return;
        }

        let is_from_parent = self.parent.is_some_and(|p| p.addr == from);

        if is_from_parent {
            self.scheduler.reset(TimerKind::Parent, now, self.config.timeout_parent());
            if rank.is_infinite() {
                self.detach(now, rng);
                return;
            }
            let parent = self.parent.expect("checked is_some above");
            let rank_changed = parent.rank != rank;
            self.parent = Some(ParentRecord { addr: from, rank, rss });
            if rank_changed {
                self.rank = rank.next_hop_rank();
                self.send_dio(now, transport);
                self.signal_inconsistency(now, rng);
            }
            return;
        }

        if !self.in_dodag {
            // DETACHED: first finite-rank DIO accepted becomes the parent.
            if rank.is_infinite() {
                return;
            }
            let outcome = self.consider_parent(from, rank, rss);
            if outcome == ConsiderParentOutcome::New {
                self.arm_post_attach_timers(now);
                self.send_dao(now, transport);
                self.signal_inconsistency(now, rng);
            }
            return;
        }

        // ATTACHED, DIO from some other neighbor: may become the new parent.
        let outcome = self.consider_parent(from, rank, rss);
        if outcome == ConsiderParentOutcome::New || outcome == ConsiderParentOutcome::Changed {
            self.send_dio(now, transport);
            self.send_dao(now, transport);
            self.signal_inconsistency(now, rng);
        }
    }

    fn arm_post_attach_timers(&mut self, now: Instant) {
        self.scheduler.arm(TimerKind::Dao, now, self.config.t_min());
        self.scheduler.arm(TimerKind::Parent, now, self.config.timeout_parent());
        self.scheduler.arm(TimerKind::Children, now, self.config.timeout_children());
        if self.role == Role::Sensor {
            self.scheduler.arm(TimerKind::Data, now, self.config.data_period());
        }
    }

    /// Handle a received DAO reporting `reported_id`, arrived via `from`
    /// (an immediate neighbor). Upserts the routing entry and, on the root,
    /// forwards nothing further; on a relay, the DAO must still be
    /// forwarded upstream by the caller (see `forwarder::forward_dao`) —
    /// this method only updates local routing state.
    pub fn handle_dao(&mut self, reported_id: NodeId, from: NodeId, now: Instant, rng: &mut impl Rng) -> crate::error::PutOutcome {
        let outcome = self.routing.put(reported_id, from, now);
        if outcome == crate::error::PutOutcome::New {
            self.signal_inconsistency(now, rng);
            log::info!("[{:?}] new child {:?} via {:?}", self.addr, reported_id, from);
        }
        outcome
    }

    /// Forward a DAO upstream verbatim: `src_addr` is the originating
    /// descendant and must never be replaced with this node's own address
    /// (§9 — the source sometimes re-originated DAOs here; this spec
    /// forbids that so the root always learns the true originator).
    pub fn forward_dao(&mut self, src_addr: NodeId, transport: &mut impl Transport) {
        let Some(parent) = self.parent else {
            log::warn!("[{:?}] no parent, dropping DAO for {:?}", self.addr, src_addr);
            return;
        };
        transport.send_unicast(parent.addr, Message::Dao { src_addr }.encode(), self.config.max_retransmits);
    }

    /// Periodic sweep of aged-out routing entries (§4.5 children lifecycle).
    pub fn sweep_children(&mut self, now: Instant, rng: &mut impl Rng) {
        if self.routing.expire_older_than(now, self.config.timeout_children()) {
            self.signal_inconsistency(now, rng);
            log::info!("[{:?}] routing entries aged out", self.addr);
        }
    }

    /// Broadcast DIS (detached) or DIO (attached/root).
    pub fn send_dis(&mut self, transport: &mut impl Transport) {
        transport.send_broadcast(Message::Dis.encode());
    }

    pub fn send_dio(&mut self, _now: Instant, transport: &mut impl Transport) {
        transport.send_broadcast(Message::Dio { rank: self.rank }.encode());
    }

    /// Send a DAO for self to the current parent. Non-root only.
    pub fn send_dao(&mut self, _now: Instant, transport: &mut impl Transport) {
        let Some(parent) = self.parent else {
            return;
        };
        transport.send_unicast(parent.addr, Message::Dao { src_addr: self.addr }.encode(), self.config.max_retransmits);
    }

    /// Dispatch for the `Send` timer: DIS while detached, DIO while
    /// attached/root; re-arms itself at the Trickle-drawn delay.
    pub fn on_send_timer(&mut self, now: Instant, transport: &mut impl Transport, rng: &mut impl Rng) {
        if self.in_dodag {
            self.send_dio(now, transport);
        } else {
            self.send_dis(transport);
        }
        let delay = self.trickle_send.next_delay_and_advance(rng);
        self.scheduler.arm(TimerKind::Send, now, delay);
    }

    /// Dispatch for the `Dao` timer: re-issue DAO to parent, Trickle-paced.
    pub fn on_dao_timer(&mut self, now: Instant, transport: &mut impl Transport, rng: &mut impl Rng) {
        if self.parent.is_some() {
            self.send_dao(now, transport);
            let delay = self.trickle_dao.next_delay_and_advance(rng);
            self.scheduler.arm(TimerKind::Dao, now, delay);
        }
    }

    /// Dispatch for the `Parent` timer: the parent's DIO never arrived
    /// within `TIMEOUT_PARENT` — detach.
    pub fn on_parent_timer(&mut self, now: Instant, rng: &mut impl Rng) {
        self.detach(now, rng);
    }

    /// Dispatch for the `Children` timer: sweep, then re-arm at the fixed
    /// period (this timer is not Trickle-paced).
    pub fn on_children_timer(&mut self, now: Instant, rng: &mut impl Rng) {
        self.sweep_children(now, rng);
        self.scheduler.arm(TimerKind::Children, now, self.config.timeout_children());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MoteConfig;
    use crate::transport::MockTransport;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn mote(role: Role) -> Mote {
        Mote::new_non_root(NodeId(2), role, MoteConfig::default())
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(1)
    }

    #[test]
    fn detached_accepts_first_finite_dio_as_parent() {
        let mut m = mote(Role::Sensor);
        let mut t = MockTransport::new();
        let mut rng = rng();
        let t0 = Instant::from_secs(0);
        m.handle_dio(NodeId(1), Rank::ROOT, RssSample(-60), t0, &mut t, &mut rng);
        assert!(m.in_dodag);
        assert_eq!(m.rank, Rank(1));
        assert_eq!(m.parent.unwrap().addr, NodeId(1));
        assert!(!t.sent.is_empty());
    }

    #[test]
    fn hysteresis_blocks_small_rss_gain_same_rank() {
        let mut m = mote(Role::Sensor);
        // Parent A at rank=1, rss=-70.
        m.parent = Some(ParentRecord { addr: NodeId(10), rank: Rank(1), rss: RssSample(-70) });
        m.rank = Rank(2);
        m.in_dodag = true;

        // Candidate C at rank 1, rss -66: delta 4 > 3 => switch.
        let outcome = m.consider_parent(NodeId(20), Rank(1), RssSample(-66));
        assert_eq!(outcome, ConsiderParentOutcome::Changed);
        assert_eq!(m.parent.unwrap().addr, NodeId(20));

        // A DIO from the old parent A at rss -68 (delta 2 < 3) must not switch back.
        let outcome2 = m.consider_parent(NodeId(10), Rank(1), RssSample(-68));
        assert_eq!(outcome2, ConsiderParentOutcome::NotChanged);
        assert_eq!(m.parent.unwrap().addr, NodeId(20));
    }

    #[test]
    fn detach_clears_routing_table_and_keeps_send_timer() {
        let mut m = mote(Role::Compute);
        let mut rng = rng();
        let t0 = Instant::from_secs(0);
        m.routing.put(NodeId(99), NodeId(5), t0);
        m.scheduler.arm(TimerKind::Send, t0, embassy_time::Duration::from_secs(2));
        m.detach(t0, &mut rng);
        assert!(!m.in_dodag);
        assert_eq!(m.rank, Rank::INFINITE);
        assert!(m.parent.is_none());
        assert_eq!(m.routing.len(), 0);
        assert!(m.scheduler.is_armed(TimerKind::Send));
        assert!(!m.scheduler.is_armed(TimerKind::Dao));
    }

    #[test]
    fn dao_from_child_upserts_routing_and_signals_once() {
        let mut m = mote(Role::Compute);
        let mut rng = rng();
        let t0 = Instant::from_secs(0);
        assert_eq!(m.handle_dao(NodeId(30), NodeId(7), t0, &mut rng), crate::error::PutOutcome::New);
        assert_eq!(m.handle_dao(NodeId(30), NodeId(7), t0, &mut rng), crate::error::PutOutcome::Update);
        assert_eq!(m.routing.get(NodeId(30)), Some(NodeId(7)));
    }

    #[test]
    fn parent_rank_infinite_triggers_detach() {
        let mut m = mote(Role::Sensor);
        let mut t = MockTransport::new();
        let mut rng = rng();
        let t0 = Instant::from_secs(0);
        m.parent = Some(ParentRecord { addr: NodeId(10), rank: Rank(1), rss: RssSample(-60) });
        m.rank = Rank(2);
        m.in_dodag = true;
        m.handle_dio(NodeId(10), Rank::INFINITE, RssSample(-60), t0, &mut t, &mut rng);
        assert!(!m.in_dodag);
        assert_eq!(m.rank, Rank::INFINITE);
    }
}
