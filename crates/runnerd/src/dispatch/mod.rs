//! Per-connection dispatch for the daemon event loop (`SPEC_FULL.md` §4.2,
//! §4.5).

mod connection;
mod errors;
mod registry;
mod worker_slot;

pub(crate) use connection::{ConnectionDispatcher, DispatchOutcome};
pub(crate) use errors::DispatchError;
pub(crate) use registry::{ConnectionId, WorkerRegistry};
