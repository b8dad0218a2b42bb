//! Daemon-wide worker ownership index.
//!
//! `SPEC_FULL.md` §3 invariants 1-3: every live worker has exactly one
//! owner, `WorkerId` uniqueness is daemon-wide, and a dead worker is
//! removed before the next pump. This is the cross-connection half of that
//! bookkeeping; each connection additionally keeps the [`runner_worker::WorkerHandle`]
//! values it owns locally (`SPEC_FULL.md` §5 single-writer discipline).

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use runner_proto::WorkerId;

/// Opaque per-connection identifier, assigned at accept time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Wraps a raw connection counter value.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Tracks which connection owns each live [`WorkerId`].
#[derive(Debug, Default)]
pub struct WorkerRegistry {
    owners: Mutex<HashMap<WorkerId, ConnectionId>>,
}

impl WorkerRegistry {
    /// Builds an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `owner` as the owner of `id`.
    pub fn insert(&self, id: WorkerId, owner: ConnectionId) {
        let mut owners = self.owners.lock().unwrap_or_else(PoisonError::into_inner);
        let _previous = owners.insert(id, owner);
    }

    /// Removes `id` from the index, e.g. once it has been killed or reaped.
    pub fn remove(&self, id: WorkerId) {
        let mut owners = self.owners.lock().unwrap_or_else(PoisonError::into_inner);
        let _previous = owners.remove(&id);
    }

    /// Reports whether `id` exists and is owned by `owner`.
    #[must_use]
    pub fn is_owned_by(&self, id: WorkerId, owner: ConnectionId) -> bool {
        let owners = self.owners.lock().unwrap_or_else(PoisonError::into_inner);
        owners.get(&id) == Some(&owner)
    }
}
