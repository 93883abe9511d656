//! Deferred events processed at tick boundaries
//!
//! Timed transitions (attack end, dash end, skill end, stage reloads) are
//! queued here instead of firing immediately. Each carries the key of the
//! activation it belongs to; the handler re-checks that key before applying,
//! so an event whose owner has been superseded does nothing.

use serde::{Deserialize, Serialize};

use super::stage::StageId;

/// Identifies one busy-mode activation of one player instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActivationKey {
    /// Bumped whenever the player is re-created (class change)
    pub incarnation: u32,
    /// Bumped on every busy-mode trigger
    pub activation: u32,
}

/// A deferred state change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Deferred {
    /// Timed end of a combo attack step
    EndComboAttack(ActivationKey),
    /// Close the dash-cancel window opened by an attack
    CloseDashWindow(ActivationKey),
    EndDash(ActivationKey),
    FinishSkill(ActivationKey),
    /// Load a stage if no other load happened since scheduling
    LoadStage { target: StageId, epoch: u32 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Scheduled {
    due_ms: u64,
    /// Tick that queued the event; it never runs on that same tick
    queued_tick: u64,
    seq: u64,
    action: Deferred,
}

/// Pending deferred events, drained in (due time, insertion) order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schedule {
    pending: Vec<Scheduled>,
    next_seq: u64,
}

impl Schedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `action` to run `delay_ms` after `now_ms`
    pub fn after(&mut self, now_ms: u64, tick: u64, delay_ms: u64, action: Deferred) {
        let seq = self.next_seq;
        self.next_seq += 1;
        log::trace!("Deferred {:?} in {}ms (seq {})", action, delay_ms, seq);
        self.pending.push(Scheduled {
            due_ms: now_ms + delay_ms,
            queued_tick: tick,
            seq,
            action,
        });
    }

    /// Remove and return every event due at `now_ms` that was queued before `tick`
    pub fn take_due(&mut self, now_ms: u64, tick: u64) -> Vec<Deferred> {
        let (mut due, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|s| s.due_ms <= now_ms && s.queued_tick < tick);
        self.pending = rest;
        due.sort_by_key(|s| (s.due_ms, s.seq));
        due.into_iter().map(|s| s.action).collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// True if an event matching `pred` is still queued
    pub fn contains(&self, pred: impl Fn(&Deferred) -> bool) -> bool {
        self.pending.iter().any(|s| pred(&s.action))
    }
}
