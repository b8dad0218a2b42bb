//! Built-in `Runner` stand-ins (`SPEC_FULL.md` §10.2).
//!
//! None of these execute real Pascal, Python, or native-library code — the
//! interpreters are out of scope (spec.md §1). Each runner instead runs the
//! same scripted debug sequence `original_source/mmldaemon.py`'s
//! `ScriptRunner` subclasses use in lieu of a real backend, on a detached
//! thread so `start`'s `on_finished` callback fires asynchronously like a
//! real interpreter's would.

mod cpas;
mod ps;
mod py;

pub use cpas::CPasRunner;
pub use ps::PsRunner;
pub use py::PyRunner;

use std::sync::Arc;
use std::thread;

use crate::capability::{DebugSink, OnFinished};

/// Runs the shared "greeting, compile, execute" debug sequence on a
/// detached thread and invokes `on_finished` once it completes.
fn run_scripted(debug: &DebugSink, program: Vec<u8>, on_finished: OnFinished) {
    let debug = Arc::clone(debug);
    let program_text = String::from_utf8_lossy(&program).into_owned();
    thread::spawn(move || {
        debug(format!("Program: {program_text}"));
        debug("Successfully Compiled".to_owned());
        debug("Successfully Executed".to_owned());
        on_finished();
    });
}
