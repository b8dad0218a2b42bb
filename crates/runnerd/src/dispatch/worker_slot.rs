//! A connection's local view of one worker it owns.

use runner_proto::RunnerKind;
use runner_worker::WorkerHandle;

/// Lifecycle state of a worker, `SPEC_FULL.md` §3.
///
/// `DEAD` has no variant here: a dead worker is removed from the owning
/// connection's map entirely rather than tracked as a state (invariant 3).
/// `Finished` is set only for the instant between observing the worker's
/// `FINISHED` event and the reap that immediately follows it in
/// `ConnectionDispatcher::poll_worker_events` — by the time a caller could
/// observe it through `owned_slot_mut`, the slot is already gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Spawned but no `START` has been sent yet.
    Idle,
    /// A `START` was sent and no `FINISHED` event has arrived yet.
    Running,
    /// The worker reported `FINISHED`; about to be reaped.
    Finished,
}

/// A worker this connection owns: its subprocess handle, kind, and state.
pub struct WorkerSlot {
    pub(crate) handle: WorkerHandle,
    pub(crate) kind: RunnerKind,
    pub(crate) state: WorkerState,
}

impl WorkerSlot {
    /// Wraps a freshly spawned handle in the `IDLE` state.
    #[must_use]
    pub fn new(handle: WorkerHandle, kind: RunnerKind) -> Self {
        Self {
            handle,
            kind,
            state: WorkerState::Idle,
        }
    }
}
