//! TCP listener and per-connection pump loop for the daemon's client port.
//!
//! `SPEC_FULL.md` §4.2 / §10.1: the daemon accepts client connections on a
//! single TCP port and runs each one on its own thread, with no daemon-wide
//! selector loop — each connection thread both decodes/dispatches its own
//! inbound frames and drains its own workers' outbound events.

mod errors;
mod handler;
mod listener;

pub(crate) use errors::ListenerError;
pub(crate) use handler::{ConnectionHandler, DaemonConnectionHandler};
pub(crate) use listener::{ListenerHandle, SocketListener};

const TRANSPORT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");
