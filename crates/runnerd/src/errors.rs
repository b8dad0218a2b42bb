//! Unified error surface for launching the daemon process.
//!
//! Grounded on `weaverd::process::errors::LaunchError`
//! (`crates/weaverd/src/process/errors.rs`), trimmed to the collaborators
//! this daemon actually has: telemetry setup, socket binding, and the
//! listener thread join.

use std::io;

use thiserror::Error;

use crate::telemetry::TelemetryError;
use crate::transport::ListenerError;

/// Errors surfaced while launching or running the `runnerd` process.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Telemetry could not be configured.
    #[error("failed to configure telemetry: {0}")]
    Telemetry(#[from] TelemetryError),
    /// The listener failed to bind or its accept loop panicked.
    #[error("listener failure: {0}")]
    Listener(#[from] ListenerError),
    /// Resolving the running binary's own path failed, which is needed to
    /// re-exec worker subprocesses.
    #[error("failed to resolve own executable path: {0}")]
    ResolveExe(#[from] io::Error),
}
