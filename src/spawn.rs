// Single-slot spawn state: at most one creature is catchable at a time.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::creature::Creature;
use crate::metrics;

/// Contents of the spawn slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpawnSlot {
    Empty,
    Active {
        creature: Arc<Creature>,
        activated_at: Instant,
    },
}

impl SpawnSlot {
    pub fn is_active(&self) -> bool {
        matches!(self, SpawnSlot::Active { .. })
    }

    pub fn creature(&self) -> Option<&Arc<Creature>> {
        match self {
            SpawnSlot::Active { creature, .. } => Some(creature),
            SpawnSlot::Empty => None,
        }
    }
}

/// A spawn taken out of the slot by a catch or an expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSpawn {
    pub creature: Arc<Creature>,
    pub activated_at: Instant,
}

impl ResolvedSpawn {
    /// Time between activation and `now`, zero if `now` is earlier.
    pub fn elapsed_at(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.activated_at)
    }
}

/// The shared spawn slot. Every transition is a single check-and-set under
/// the lock; the lock is never held across an await point. The
/// `ACTIVE_SPAWN` gauge is written under the same lock so it always matches
/// the slot.
#[derive(Debug)]
pub struct SpawnState {
    slot: Mutex<SpawnSlot>,
}

impl SpawnState {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(SpawnSlot::Empty),
        }
    }

    /// Activate `creature` if the slot is empty. Returns false, leaving the
    /// slot untouched, if a creature is already active.
    pub fn try_activate(&self, creature: Arc<Creature>, now: Instant) -> bool {
        let mut slot = self.slot.lock().unwrap();
        if slot.is_active() {
            return false;
        }
        *slot = SpawnSlot::Active {
            creature,
            activated_at: now,
        };
        metrics::ACTIVE_SPAWN.set(1);
        true
    }

    /// Current slot contents without mutation.
    pub fn peek(&self) -> SpawnSlot {
        self.slot.lock().unwrap().clone()
    }

    /// Take the active creature, leaving the slot empty. Of several racing
    /// callers exactly one gets `Some`.
    pub fn try_resolve(&self) -> Option<ResolvedSpawn> {
        let mut slot = self.slot.lock().unwrap();
        take(&mut slot)
    }

    /// Clear the slot if the active spawn has been out for at least `ttl`.
    pub fn expire(&self, now: Instant, ttl: Duration) -> Option<ResolvedSpawn> {
        let mut slot = self.slot.lock().unwrap();
        let stale = match &*slot {
            SpawnSlot::Active { activated_at, .. } => {
                now.saturating_duration_since(*activated_at) >= ttl
            }
            SpawnSlot::Empty => false,
        };
        if !stale {
            return None;
        }
        take(&mut slot)
    }
}

/// Empty a locked slot, returning what was in it.
fn take(slot: &mut SpawnSlot) -> Option<ResolvedSpawn> {
    match std::mem::replace(slot, SpawnSlot::Empty) {
        SpawnSlot::Active {
            creature,
            activated_at,
        } => {
            metrics::ACTIVE_SPAWN.set(0);
            Some(ResolvedSpawn {
                creature,
                activated_at,
            })
        }
        SpawnSlot::Empty => None,
    }
}

impl Default for SpawnState {
    fn default() -> Self {
        Self::new()
    }
}
