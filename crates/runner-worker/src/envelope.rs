//! JSON-lines envelope exchanged over a worker's stdio pipe.
//!
//! Grounded on `weaverd::dispatch`'s `CommandRequest`/`DaemonMessage` JSONL
//! convention (`crates/weaverd/src/dispatch/{request,response}.rs`): a small
//! tagged enum per direction, one value per line.

use serde::{Deserialize, Serialize};

/// Daemon-to-worker control messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ControlMessage {
    /// Begin executing `program`.
    Start {
        /// Program text, decoded lossily from the wire `START` payload.
        program: String,
    },
    /// Request termination of the running program.
    Stop,
    /// Request suspension of the running program.
    Pause,
}

/// Worker-to-daemon events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkerEvent {
    /// A diagnostic line emitted by the runner's debug sink.
    Debug {
        /// The diagnostic text.
        message: String,
    },
    /// The running program has ended.
    Finished,
}
