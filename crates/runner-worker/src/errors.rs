//! Error types for worker subprocess spawning and control.

use std::io;

use thiserror::Error;

/// Errors surfaced while spawning a worker subprocess.
#[derive(Debug, Error)]
pub enum WorkerSpawnError {
    /// The child process could not be started.
    #[error("failed to spawn worker subprocess: {source}")]
    Spawn {
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
    /// The child's stdin handle was unavailable (piped stdio not configured).
    #[error("worker subprocess has no stdin pipe")]
    MissingStdin,
    /// The child's stdout handle was unavailable (piped stdio not configured).
    #[error("worker subprocess has no stdout pipe")]
    MissingStdout,
}

/// Errors surfaced while controlling or reading from a running worker.
#[derive(Debug, Error)]
pub enum HandleError {
    /// Writing a control message or reading an event failed.
    #[error("worker pipe IO failed: {0}")]
    Io(#[from] io::Error),
    /// A control message or event failed to (de)serialize.
    #[error("worker envelope malformed: {0}")]
    Serde(#[from] serde_json::Error),
    /// The worker's event stream ended without a `finished` event.
    #[error("worker pipe closed unexpectedly")]
    Disconnected,
}
