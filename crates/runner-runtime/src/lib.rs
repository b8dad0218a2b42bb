//! The `Runner` capability (`SPEC_FULL.md` §4.3) and its built-in
//! implementations.
//!
//! The interpreters themselves are out of scope for this daemon (spec.md
//! §1): the three runners shipped here are structural stand-ins that
//! satisfy the capability contract without implementing a real Pascal,
//! Python, or native-library interpreter. See `SPEC_FULL.md` §10.2.

mod capability;
mod registry;
mod runners;

pub use capability::{DebugSink, OnFinished, Runner};
pub use registry::{RunnerFactory, RunnerRegistry};
pub use runners::{CPasRunner, PsRunner, PyRunner};
