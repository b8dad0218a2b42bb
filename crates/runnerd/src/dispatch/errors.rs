//! Error types for per-connection request dispatch.
//!
//! Grounded on `weaverd::dispatch::errors::DispatchError`
//! (`crates/weaverd/src/dispatch/errors.rs`): one variant per failure mode
//! from `SPEC_FULL.md` §7, each fatal to the connection it occurred on.

use std::io;

use runner_proto::FrameError;
use runner_worker::{HandleError, WorkerSpawnError};
use thiserror::Error;

/// Errors surfaced while dispatching a client's frames.
///
/// Every variant terminates the connection it occurred on
/// (`SPEC_FULL.md` §4.2); none of them are fatal to the daemon as a whole.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A frame could not be decoded from the connection's byte stream.
    #[error("malformed frame: {0}")]
    MalformedFrame(#[from] FrameError),

    /// A client sent a frame only the daemon is meant to send
    /// (`WORKER`/`ERROR`/`FINISHED`/`DEBUG`).
    #[error("client sent a daemon-only frame: {opcode}")]
    UnexpectedDirection {
        /// Name of the offending frame variant.
        opcode: &'static str,
    },

    /// `SPAWN` named a kind with no registered [`runner_runtime::RunnerFactory`].
    #[error("unknown runner kind: {kind}")]
    UnknownRunnerKind {
        /// The offending wire byte.
        kind: u8,
    },

    /// A command referenced a `WorkerId` this connection does not own, or
    /// that does not exist in the daemon's worker index.
    #[error("unknown or unowned worker: {pid}")]
    UnknownWorker {
        /// The offending worker id.
        pid: i32,
    },

    /// Spawning the worker subprocess failed.
    #[error("failed to spawn worker: {0}")]
    SpawnFailure(#[from] WorkerSpawnError),

    /// The worker's control pipe reported an IO or protocol failure.
    #[error("worker pipe broken: {0}")]
    PipeBroken(#[from] HandleError),

    /// Writing a response frame to the client socket failed.
    #[error("socket write failed: {0}")]
    SocketWriteFailure(#[from] io::Error),
}

impl DispatchError {
    /// The `ERROR` frame payload text sent to the client before disconnect.
    #[must_use]
    pub fn client_message(&self) -> String {
        self.to_string()
    }
}
