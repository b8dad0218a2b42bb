//! Library surface for the `runnerd` script-execution daemon.
//!
//! `main.rs` is a thin wrapper around [`Daemon`]; integration tests under
//! `tests/` drive the same entry point directly rather than through a
//! subprocess harness, the way `weaverd::process::run_daemon_with` is
//! exercised straight from `crates/weaverd/src/tests`.

mod dispatch;
mod errors;
mod telemetry;
mod transport;

pub use errors::LaunchError;
pub use telemetry::{TelemetryError, TelemetryHandle, initialise as initialise_telemetry};

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use runner_runtime::RunnerRegistry;

use dispatch::WorkerRegistry;
use transport::{DaemonConnectionHandler, ListenerHandle, SocketListener};

/// A bound, running instance of the daemon's client-facing listener.
///
/// Dropping this before calling [`Daemon::join`] still shuts the accept
/// loop down cleanly — [`ListenerHandle`]'s `Drop` signals and joins it —
/// but `join` is how a caller observes a thread panic.
pub struct Daemon {
    local_addr: SocketAddr,
    handle: ListenerHandle,
}

impl Daemon {
    /// Binds `port` (`0` requests an OS-assigned ephemeral port) and starts
    /// the accept loop, re-executing `runner_exe` as `--worker <kind-byte>`
    /// for every worker a client spawns.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError::Listener`] if the bind or accept-loop startup
    /// fails.
    pub fn bind(port: u16, runner_exe: PathBuf) -> Result<Self, LaunchError> {
        let listener = SocketListener::bind(port)?;
        let local_addr = listener.local_addr();
        let workers = Arc::new(WorkerRegistry::new());
        let kinds = Arc::new(RunnerRegistry::with_builtins());
        let connection_handler = Arc::new(DaemonConnectionHandler::new(workers, kinds, runner_exe));
        let handle = listener.start(connection_handler)?;
        Ok(Self { local_addr, handle })
    }

    /// The address actually bound; useful when `port` was `0`.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Signals the accept loop to stop after its current iteration.
    pub fn shutdown(&self) {
        self.handle.shutdown();
    }

    /// Blocks until the accept-loop thread has exited.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError::Listener`] if the accept-loop thread panicked.
    pub fn join(self) -> Result<(), LaunchError> {
        self.handle.join().map_err(LaunchError::from)
    }
}

/// Resolves the path to the running `runnerd` binary, used to re-exec
/// workers (`SPEC_FULL.md` §10.3).
///
/// # Errors
///
/// Propagates `std::env::current_exe`'s IO error.
pub fn current_runner_exe() -> std::io::Result<PathBuf> {
    std::env::current_exe()
}
