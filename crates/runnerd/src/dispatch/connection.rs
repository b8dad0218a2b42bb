//! Per-connection dispatch table, `SPEC_FULL.md` §4.2 / §4.5.
//!
//! Deliberately decoupled from any socket type: [`ConnectionDispatcher`]
//! consumes decoded [`Frame`]s and produces frames to write, so it can be
//! exercised with plain values in tests the way
//! `weaverd::dispatch::router`'s routing logic is tested apart from its
//! transport (`crates/weaverd/src/dispatch/router.rs`).

use std::collections::HashMap;
#[cfg(test)]
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use runner_proto::{Frame, RunnerKind, WorkerId};
use runner_runtime::RunnerRegistry;
use runner_worker::{WorkerEvent, WorkerHandle};
use tracing::{info, warn};

use super::errors::DispatchError;
use super::registry::{ConnectionId, WorkerRegistry as OwnershipRegistry};
use super::worker_slot::{WorkerSlot, WorkerState};

const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// Result of dispatching a single inbound frame.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// Zero or more frames to write back to the client.
    Frames(Vec<Frame>),
    /// The client announced `DISCONNECT`; the connection should close after
    /// any queued frames are flushed.
    Disconnect,
}

/// Owns the workers one client connection has spawned and routes its
/// frames, per `SPEC_FULL.md` §4.2's dispatch table and §3's ownership
/// invariants.
pub struct ConnectionDispatcher {
    id: ConnectionId,
    registry: Arc<OwnershipRegistry>,
    kinds: Arc<RunnerRegistry>,
    runner_exe: PathBuf,
    workers: HashMap<WorkerId, WorkerSlot>,
}

impl ConnectionDispatcher {
    /// Builds a dispatcher for a freshly accepted connection.
    #[must_use]
    pub fn new(
        id: ConnectionId,
        registry: Arc<OwnershipRegistry>,
        kinds: Arc<RunnerRegistry>,
        runner_exe: PathBuf,
    ) -> Self {
        Self {
            id,
            registry,
            kinds,
            runner_exe,
            workers: HashMap::new(),
        }
    }

    /// This connection's opaque id, used for ownership checks.
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Routes one decoded inbound frame, per the dispatch table in
    /// `SPEC_FULL.md` §4.5.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] for any failure; the caller is expected to
    /// treat every error as fatal to this connection (`SPEC_FULL.md` §4.2).
    pub fn dispatch(&mut self, frame: Frame) -> Result<DispatchOutcome, DispatchError> {
        match frame {
            Frame::Spawn { kind } => self.handle_spawn(kind).map(DispatchOutcome::Frames),
            Frame::Start { pid, program } => {
                self.handle_start(pid, program)?;
                Ok(DispatchOutcome::Frames(Vec::new()))
            }
            Frame::Stop { pid } => {
                self.handle_stop(pid)?;
                Ok(DispatchOutcome::Frames(Vec::new()))
            }
            Frame::Pause { pid } => {
                self.handle_pause(pid)?;
                Ok(DispatchOutcome::Frames(Vec::new()))
            }
            Frame::Kill { pid } => {
                self.handle_kill(pid)?;
                Ok(DispatchOutcome::Frames(Vec::new()))
            }
            Frame::Disconnect => Ok(DispatchOutcome::Disconnect),
            // WORKER/ERROR/FINISHED/DEBUG are daemon-to-client only; a client
            // that sends one has violated the protocol.
            Frame::Worker { .. } => Err(DispatchError::UnexpectedDirection { opcode: "WORKER" }),
            Frame::Error { .. } => Err(DispatchError::UnexpectedDirection { opcode: "ERROR" }),
            Frame::Finished { .. } => Err(DispatchError::UnexpectedDirection { opcode: "FINISHED" }),
            Frame::Debug { .. } => Err(DispatchError::UnexpectedDirection { opcode: "DEBUG" }),
        }
    }

    /// Drains one round of buffered events from every owned worker,
    /// translating them into outbound frames (`SPEC_FULL.md` §4.5 outbound
    /// phase).
    ///
    /// A worker that reports `FINISHED` — or whose pipe breaks
    /// unexpectedly, in which case a `FINISHED` is synthesized in its place
    /// (`SPEC_FULL.md` §7's `PipeBroken` policy) — is reaped immediately
    /// after its frame is queued: dropped from this connection's map and
    /// deregistered from the daemon-wide ownership index, so a later
    /// command naming its id sees the same `UnknownWorker` a dead worker
    /// would (`SPEC_FULL.md` §9 design note 3 / scenario 4).
    ///
    /// A broken pipe is never fatal to the connection: only the affected
    /// worker is reaped, and polling continues for the rest.
    pub fn poll_worker_events(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();
        let mut finished = Vec::new();
        for (&pid, slot) in &mut self.workers {
            loop {
                match slot.handle.pump() {
                    Ok(Some(WorkerEvent::Debug { message })) => {
                        frames.push(Frame::debug(pid, message));
                    }
                    Ok(Some(WorkerEvent::Finished)) => {
                        slot.state = WorkerState::Finished;
                        info!(
                            target: DISPATCH_TARGET,
                            connection = ?self.id,
                            %pid,
                            kind = %slot.kind,
                            "worker finished, reaping"
                        );
                        frames.push(Frame::Finished { pid });
                        finished.push(pid);
                        break;
                    }
                    Ok(None) => break,
                    Err(error) => {
                        warn!(
                            target: DISPATCH_TARGET,
                            connection = ?self.id,
                            %pid,
                            kind = %slot.kind,
                            %error,
                            "worker pipe broken, synthesizing FINISHED"
                        );
                        slot.state = WorkerState::Finished;
                        frames.push(Frame::Finished { pid });
                        finished.push(pid);
                        break;
                    }
                }
            }
        }
        for pid in finished {
            self.workers.remove(&pid);
            self.registry.remove(pid);
        }
        frames
    }

    /// Kills every worker this connection owns and clears them from the
    /// daemon-wide registry, per the owner-disconnect cascade
    /// (`SPEC_FULL.md` §3, §5).
    pub fn kill_owned_workers(&mut self) {
        for (pid, mut slot) in self.workers.drain() {
            if let Err(error) = slot.handle.kill() {
                warn!(
                    target: DISPATCH_TARGET,
                    connection = ?self.id,
                    %pid,
                    kind = %slot.kind,
                    %error,
                    "failed to kill worker during cascade"
                );
            }
            self.registry.remove(pid);
        }
    }

    fn handle_spawn(&mut self, kind: RunnerKind) -> Result<Vec<Frame>, DispatchError> {
        if !self.kinds.is_registered(kind) {
            return Err(DispatchError::UnknownRunnerKind { kind: kind.to_byte() });
        }
        let handle = WorkerHandle::spawn(&self.runner_exe, kind)?;
        let pid = handle.id();
        info!(target: DISPATCH_TARGET, connection = ?self.id, %pid, %kind, "worker spawned");
        self.registry.insert(pid, self.id);
        self.workers.insert(pid, WorkerSlot::new(handle, kind));
        Ok(vec![Frame::Worker { pid }])
    }

    fn handle_start(&mut self, pid: WorkerId, program: Vec<u8>) -> Result<(), DispatchError> {
        let slot = self.owned_slot_mut(pid)?;
        if slot.state == WorkerState::Running {
            warn!(
                target: DISPATCH_TARGET,
                connection = ?self.id,
                %pid,
                kind = %slot.kind,
                "START on an already-running worker; restarting per runner-defined behaviour"
            );
        }
        slot.handle.start(&program)?;
        slot.state = WorkerState::Running;
        Ok(())
    }

    fn handle_stop(&mut self, pid: WorkerId) -> Result<(), DispatchError> {
        self.owned_slot_mut(pid)?.handle.stop()?;
        Ok(())
    }

    fn handle_pause(&mut self, pid: WorkerId) -> Result<(), DispatchError> {
        self.owned_slot_mut(pid)?.handle.pause()?;
        Ok(())
    }

    fn handle_kill(&mut self, pid: WorkerId) -> Result<(), DispatchError> {
        if !self.registry.is_owned_by(pid, self.id) {
            return Err(DispatchError::UnknownWorker { pid: pid.get() });
        }
        let mut slot = self
            .workers
            .remove(&pid)
            .ok_or(DispatchError::UnknownWorker { pid: pid.get() })?;
        slot.handle.kill()?;
        self.registry.remove(pid);
        Ok(())
    }

    fn owned_slot_mut(&mut self, pid: WorkerId) -> Result<&mut WorkerSlot, DispatchError> {
        if !self.registry.is_owned_by(pid, self.id) {
            return Err(DispatchError::UnknownWorker { pid: pid.get() });
        }
        self.workers
            .get_mut(&pid)
            .ok_or(DispatchError::UnknownWorker { pid: pid.get() })
    }
}

/// Test-only helper for constructing a dispatcher pointed at an arbitrary
/// worker executable, bypassing `current_runner_exe`.
#[cfg(test)]
pub(crate) fn dispatcher_with_exe(
    id: ConnectionId,
    registry: Arc<OwnershipRegistry>,
    exe: &Path,
) -> ConnectionDispatcher {
    ConnectionDispatcher::new(id, registry, Arc::new(RunnerRegistry::with_builtins()), exe.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write as _;
    use std::os::unix::fs::PermissionsExt;

    /// Writes a tiny shell script standing in for `runnerd --worker <kind>`:
    /// it reads one line, then emits a `finished` event.
    fn fake_worker_exe(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("fake-runnerd");
        let mut file = fs::File::create(&path).expect("create fake worker");
        writeln!(
            file,
            "#!/bin/sh\nread _line\necho '{{\"kind\":\"finished\"}}'\n"
        )
        .expect("write script");
        let mut perms = fs::metadata(&path).expect("metadata").permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).expect("set permissions");
        path
    }

    #[test]
    fn spawn_registers_ownership_and_returns_worker_frame() {
        let dir = tempfile::tempdir().expect("tempdir");
        let exe = fake_worker_exe(&dir);
        let registry = Arc::new(OwnershipRegistry::new());
        let mut dispatcher = dispatcher_with_exe(ConnectionId::new(1), Arc::clone(&registry), &exe);

        let outcome = dispatcher
            .dispatch(Frame::Spawn { kind: RunnerKind::PY })
            .expect("spawn dispatch");
        let DispatchOutcome::Frames(frames) = outcome else {
            panic!("expected frames");
        };
        let [Frame::Worker { pid }] = frames.as_slice() else {
            panic!("expected single Worker frame");
        };
        assert!(registry.is_owned_by(*pid, ConnectionId::new(1)));
    }

    #[test]
    fn start_on_unowned_worker_is_unknown_worker() {
        let dir = tempfile::tempdir().expect("tempdir");
        let exe = fake_worker_exe(&dir);
        let registry = Arc::new(OwnershipRegistry::new());
        let mut dispatcher = dispatcher_with_exe(ConnectionId::new(1), registry, &exe);

        let error = dispatcher
            .dispatch(Frame::Start {
                pid: WorkerId::new(12345),
                program: b"NOOP".to_vec(),
            })
            .expect_err("unowned start must fail");
        assert!(matches!(error, DispatchError::UnknownWorker { pid } if pid == 12345));
    }

    #[test]
    fn disconnect_produces_disconnect_outcome() {
        let dir = tempfile::tempdir().expect("tempdir");
        let exe = fake_worker_exe(&dir);
        let registry = Arc::new(OwnershipRegistry::new());
        let mut dispatcher = dispatcher_with_exe(ConnectionId::new(1), registry, &exe);

        let outcome = dispatcher.dispatch(Frame::Disconnect).expect("disconnect");
        assert!(matches!(outcome, DispatchOutcome::Disconnect));
    }

    #[test]
    fn double_kill_is_unknown_worker_the_second_time() {
        let dir = tempfile::tempdir().expect("tempdir");
        let exe = fake_worker_exe(&dir);
        let registry = Arc::new(OwnershipRegistry::new());
        let mut dispatcher = dispatcher_with_exe(ConnectionId::new(1), registry, &exe);

        let outcome = dispatcher
            .dispatch(Frame::Spawn { kind: RunnerKind::PY })
            .expect("spawn");
        let DispatchOutcome::Frames(frames) = outcome else {
            panic!("expected frames");
        };
        let [Frame::Worker { pid }] = frames.as_slice() else {
            panic!("expected Worker frame");
        };
        let pid = *pid;

        dispatcher.dispatch(Frame::Kill { pid }).expect("first kill");
        let error = dispatcher
            .dispatch(Frame::Kill { pid })
            .expect_err("second kill must fail");
        assert!(matches!(error, DispatchError::UnknownWorker { .. }));
    }
}
