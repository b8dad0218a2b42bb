//! Error types for the TCP listener.
//!
//! Grounded on `weaverd::transport::errors::ListenerError`
//! (`crates/weaverd/src/transport/errors.rs`), trimmed to the TCP-only
//! surface `SPEC_FULL.md` §6 calls for.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Errors surfaced while binding or running the daemon's socket listener.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The configured host/port failed to resolve to a socket address.
    #[error("failed to resolve listen address {host}:{port}: {source}")]
    Resolve {
        /// Configured host.
        host: String,
        /// Configured port.
        port: u16,
        /// Underlying resolution error.
        #[source]
        source: io::Error,
    },
    /// Resolution succeeded but produced no addresses.
    #[error("no addresses resolved for {host}:{port}")]
    ResolveEmpty {
        /// Configured host.
        host: String,
        /// Configured port.
        port: u16,
    },
    /// Binding the TCP listener failed.
    #[error("failed to bind TCP listener at {addr}: {source}")]
    BindTcp {
        /// Address the bind was attempted on.
        addr: SocketAddr,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
    /// The accept-loop thread panicked.
    #[error("listener thread panicked")]
    ThreadPanic,
}
