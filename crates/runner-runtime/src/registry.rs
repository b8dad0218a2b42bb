//! Kind-to-factory registry for runner construction.
//!
//! Grounded on `weaverd::backends`' `BackendKind` → `BackendProvider`
//! pattern (`crates/weaverd/src/backends.rs`): a small closed-over registry
//! populated at startup, looked up by an opaque kind value.

use std::collections::HashMap;
use std::sync::Arc;

use runner_proto::RunnerKind;

use crate::capability::{DebugSink, Runner};
use crate::runners::{CPasRunner, PsRunner, PyRunner};

/// Builds a fresh [`Runner`] instance bound to a debug sink.
///
/// A factory, not the runner itself, is registered per kind so that every
/// `SPAWN` gets an independent runner instance.
pub trait RunnerFactory: Send + Sync {
    /// Constructs a new runner that emits diagnostics through `debug`.
    fn create(&self, debug: DebugSink) -> Box<dyn Runner>;
}

impl<F> RunnerFactory for F
where
    F: Fn(DebugSink) -> Box<dyn Runner> + Send + Sync,
{
    fn create(&self, debug: DebugSink) -> Box<dyn Runner> {
        self(debug)
    }
}

/// Maps registered [`RunnerKind`] values to their factories.
///
/// `SPEC_FULL.md` §3 (`spec.md` §3): unregistered kinds are a dispatch-time
/// `UnknownRunnerKind` error, not a decode-time one — see
/// `runner_proto::Decoder`.
pub struct RunnerRegistry {
    factories: HashMap<RunnerKind, Arc<dyn RunnerFactory>>,
}

impl RunnerRegistry {
    /// Builds an empty registry with no kinds registered.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Builds a registry pre-populated with the three built-in kinds this
    /// crate ships (`SPEC_FULL.md` §10.2).
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register(RunnerKind::PS, |debug| Box::new(PsRunner::new(debug)));
        registry.register(RunnerKind::PY, |debug| Box::new(PyRunner::new(debug)));
        registry.register(RunnerKind::CPAS, |debug| Box::new(CPasRunner::new(debug)));
        registry
    }

    /// Registers (or replaces) the factory for `kind`.
    pub fn register(
        &mut self,
        kind: RunnerKind,
        factory: impl Fn(DebugSink) -> Box<dyn Runner> + Send + Sync + 'static,
    ) {
        let _previous = self.factories.insert(kind, Arc::new(factory));
    }

    /// Builds a new runner for `kind`, or `None` if it is unregistered.
    #[must_use]
    pub fn create(&self, kind: RunnerKind, debug: DebugSink) -> Option<Box<dyn Runner>> {
        self.factories.get(&kind).map(|factory| factory.create(debug))
    }

    /// Reports whether `kind` has a registered factory.
    #[must_use]
    pub fn is_registered(&self, kind: RunnerKind) -> bool {
        self.factories.contains_key(&kind)
    }
}

impl Default for RunnerRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::sync::Mutex;

    #[rstest]
    #[case(RunnerKind::PS)]
    #[case(RunnerKind::PY)]
    #[case(RunnerKind::CPAS)]
    fn builtins_cover_ps_py_cpas(#[case] kind: RunnerKind) {
        let registry = RunnerRegistry::with_builtins();
        assert!(registry.is_registered(kind));
    }

    #[test]
    fn unregistered_kind_returns_none() {
        let registry = RunnerRegistry::with_builtins();
        let sink: DebugSink = Arc::new(|_| {});
        assert!(registry
            .create(RunnerKind::from_byte(200), sink)
            .is_none());
    }

    #[test]
    fn custom_kind_can_be_registered() {
        let mut registry = RunnerRegistry::empty();
        let calls = Arc::new(Mutex::new(0_u32));
        let calls_for_factory = Arc::clone(&calls);
        registry.register(RunnerKind::from_byte(42), move |debug| {
            *calls_for_factory.lock().expect("mutex poisoned") += 1;
            Box::new(PyRunner::new(debug))
        });

        let sink: DebugSink = Arc::new(|_| {});
        assert!(registry.create(RunnerKind::from_byte(42), sink).is_some());
        assert_eq!(*calls.lock().expect("mutex poisoned"), 1);
    }
}
