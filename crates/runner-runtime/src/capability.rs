//! The `Runner` capability contract, `SPEC_FULL.md` §4.3.

use std::sync::Arc;

/// Sink a runner uses to emit diagnostic lines.
///
/// Callable from any thread: the native-lib runner's execution thread and
/// the worker's main thread may both hold a clone (`SPEC_FULL.md` §4.3
/// callback-thread-affinity note).
pub type DebugSink = Arc<dyn Fn(String) + Send + Sync>;

/// Callback a runner invokes exactly once when a started program ends.
pub type OnFinished = Box<dyn FnOnce() + Send>;

/// Interpreter-agnostic capability a worker hosts.
///
/// Implementations are constructed with a [`DebugSink`] and must route all
/// diagnostics through it; they must never write to the process's own
/// stdout/stderr, since that stream is reserved for the worker's control
/// pipe (`SPEC_FULL.md` §10.3).
pub trait Runner: Send {
    /// Begins executing `program` asynchronously.
    ///
    /// `on_finished` must fire exactly once, whether the program ends
    /// normally, on error, or via [`Runner::stop`]. Calling `start` again
    /// while already running is runner-defined; the capability places no
    /// requirement on that case.
    fn start(&mut self, program: Vec<u8>, on_finished: OnFinished);

    /// Requests termination of the running program.
    ///
    /// Runners that cannot honor this emit a debug line saying so and keep
    /// running; this is never an error.
    fn stop(&mut self);

    /// Requests suspension of the running program.
    ///
    /// Same best-effort caveat as [`Runner::stop`].
    fn pause(&mut self);
}
