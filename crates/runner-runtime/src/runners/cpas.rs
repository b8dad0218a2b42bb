//! Native dynamic-library `Runner` stand-in.

use crate::capability::{DebugSink, OnFinished, Runner};

use super::run_scripted;

/// Stand-in for the native library runner kind (`RunnerKind::CPAS`).
///
/// `spec.md` §4.3 notes that a real implementation of this kind would load a
/// native dynamic library and run it on a dedicated thread; this stand-in
/// follows the same "dedicated thread per start" shape without loading
/// anything.
pub struct CPasRunner {
    debug: DebugSink,
}

impl CPasRunner {
    /// Builds a new runner that emits diagnostics through `debug`.
    #[must_use]
    pub fn new(debug: DebugSink) -> Self {
        debug("Greetings from the Native Library Script Engine".to_owned());
        Self { debug }
    }
}

impl Runner for CPasRunner {
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn collecting_sink() -> (DebugSink, Arc<Mutex<Vec<String>>>) {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let collector = Arc::clone(&lines);
        let sink: DebugSink = Arc::new(move |line| {
            collector.lock().expect("mutex poisoned").push(line);
        });
        (sink, lines)
    }

    #[test]
    fn emits_greeting_on_construction() {
        let (sink, lines) = collecting_sink();
        let _runner = CPasRunner::new(sink);
        assert_eq!(
            lines.lock().expect("mutex poisoned").as_slice(),
            ["Greetings from the Native Library Script Engine"]
        );
    }

    #[test]
    fn start_invokes_on_finished_exactly_once() {
        let (sink, lines) = collecting_sink();
        let mut runner = CPasRunner::new(sink);
        let (tx, rx) = std::sync::mpsc::channel();
        runner.start(b"NOOP".to_vec(), Box::new(move || tx.send(()).expect("send")));

        rx.recv_timeout(Duration::from_secs(1))
            .expect("on_finished fires");
        assert!(lines
            .lock()
            .expect("mutex poisoned")
            .iter()
            .any(|line| line == "Successfully Executed"));
    }

    #[test]
    fn stop_emits_debug_line_without_panicking() {
        let (sink, lines) = collecting_sink();
        let mut runner = CPasRunner::new(sink);
        runner.stop();
        assert!(lines
            .lock()
            .expect("mutex poisoned")
            .iter()
            .any(|line| line == "Terminating Script"));
    }
}
