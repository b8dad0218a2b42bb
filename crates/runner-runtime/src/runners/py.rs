//! Python `Runner` stand-in.

use crate::capability::{DebugSink, OnFinished, Runner};

use super::run_scripted;

/// Stand-in for the Python interpreter runner kind (`RunnerKind::PY`).
pub struct PyRunner {
    debug: DebugSink,
}

impl PyRunner {
    /// Builds a new runner that emits diagnostics through `debug`.
    #[must_use]
    pub fn new(debug: DebugSink) -> Self {
        debug("Greetings from the Python Script Engine".to_owned());
        Self { debug }
    }
}

impl Runner for PyRunner {
    fn start(&mut self, program: Vec<u8>, on_finished: OnFinished) {
        run_scripted(&self.debug, program, on_finished);
    }

    fn stop(&mut self) {
        (self.debug)("Terminating Script".to_owned());
    }

    fn pause(&mut self) {
        (self.debug)("Pausing Script".to_owned());
    }
}
