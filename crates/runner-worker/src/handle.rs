//! Daemon-side handle to a running worker subprocess.
//!
//! Grounded on `weaver-sandbox::Sandbox::spawn`'s `Command`/`Child` shape
//! (`crates/weaver-sandbox/src/sandbox.rs`) and the reader-thread-plus-channel
//! pattern `original_source/mmldaemon.py`'s `MMLWorker.pump` implements over a
//! Python `Pipe`. Sandboxing itself is out of scope here (`spec.md` §1
//! Non-goals), so this spawns a plain `std::process::Child`.

use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use runner_proto::{RunnerKind, WorkerId};
use tracing::warn;

use crate::envelope::{ControlMessage, WorkerEvent};
use crate::errors::{HandleError, WorkerSpawnError};

const WORKER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::handle");

/// `runnerd`'s hidden subcommand worker subprocesses are re-executed with.
pub const WORKER_SUBCOMMAND: &str = "--worker";

/// Owns a worker subprocess's pipe and process handle.
///
/// Not safe for concurrent use from multiple threads: the daemon's single-
/// writer discipline (`SPEC_FULL.md` §5) serializes all access to a given
/// handle behind the connection thread that owns it.
pub struct WorkerHandle {
    id: WorkerId,
    child: Child,
    stdin: ChildStdin,
    events: Receiver<WorkerEvent>,
    reader: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    /// Spawns `exe_path` re-executed as `--worker <kind-byte>`, wiring its
    /// stdio as the duplex control pipe.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerSpawnError`] if the process cannot be started or its
    /// piped stdio handles are unavailable.
    pub fn spawn(exe_path: &Path, kind: RunnerKind) -> Result<Self, WorkerSpawnError> {
        let child = Command::new(exe_path)
            .arg(WORKER_SUBCOMMAND)
            .arg(kind.to_byte().to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| WorkerSpawnError::Spawn { source })?;
        Self::from_child(child)
    }

    /// Wraps an already-spawned child whose stdio was piped as
    /// [`WorkerHandle::spawn`] configures it.
    ///
    /// Exposed so tests can substitute a stand-in subprocess in place of a
    /// re-executed `runnerd --worker`.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerSpawnError`] if the child's piped stdio handles are
    /// unavailable.
    pub fn from_child(mut child: Child) -> Result<Self, WorkerSpawnError> {
        let stdin = child.stdin.take().ok_or(WorkerSpawnError::MissingStdin)?;
        let stdout = child.stdout.take().ok_or(WorkerSpawnError::MissingStdout)?;

        let pid = i32::try_from(child.id()).unwrap_or(i32::MAX);
        let id = WorkerId::new(pid);

        let (sender, events) = mpsc::channel();
        let reader = thread::spawn(move || {
            let mut lines = BufReader::new(stdout).lines();
            while let Some(Ok(line)) = lines.next() {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<WorkerEvent>(&line) {
                    Ok(event) => {
                        if sender.send(event).is_err() {
                            break;
                        }
                    }
                    Err(error) => {
                        warn!(
                            target: WORKER_TARGET,
                            error = %error,
                            "malformed worker event line, dropping"
                        );
                    }
                }
            }
        });

        Ok(Self {
            id,
            child,
            stdin,
            events,
            reader: Some(reader),
        })
    }

    /// The subprocess's OS pid, used daemon-wide as this worker's id.
    #[must_use]
    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Sends a `start` control message.
    ///
    /// # Errors
    ///
    /// Returns [`HandleError`] if the pipe write fails.
    pub fn start(&mut self, program: &[u8]) -> Result<(), HandleError> {
        self.send(&ControlMessage::Start {
            program: String::from_utf8_lossy(program).into_owned(),
        })
    }

    /// Sends a `stop` control message.
    ///
    /// # Errors
    ///
    /// Returns [`HandleError`] if the pipe write fails.
    pub fn stop(&mut self) -> Result<(), HandleError> {
        self.send(&ControlMessage::Stop)
    }

    /// Sends a `pause` control message.
    ///
    /// # Errors
    ///
    /// Returns [`HandleError`] if the pipe write fails.
    pub fn pause(&mut self) -> Result<(), HandleError> {
        self.send(&ControlMessage::Pause)
    }

    /// Returns at most one buffered event, or `None` if none are ready.
    ///
    /// Non-blocking, matching `MMLWorker.pump`'s poll-then-recv behaviour.
    ///
    /// # Errors
    ///
    /// Returns [`HandleError::Disconnected`] once the reader thread has
    /// exited and no further events will ever arrive.
    pub fn pump(&mut self) -> Result<Option<WorkerEvent>, HandleError> {
        match self.events.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(HandleError::Disconnected),
        }
    }

    /// Forcibly terminates the subprocess, discarding buffered events.
    ///
    /// # Errors
    ///
    /// Returns [`HandleError`] if the OS kill call fails.
    pub fn kill(&mut self) -> Result<(), HandleError> {
        self.child.kill()?;
        let _ = self.child.wait();
        Ok(())
    }

    fn send(&mut self, message: &ControlMessage) -> Result<(), HandleError> {
        let mut line = serde_json::to_vec(message)?;
        line.push(b'\n');
        self.stdin.write_all(&line)?;
        self.stdin.flush()?;
        Ok(())
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    /// Spawns a `sh` stand-in that echoes a `finished` event back as soon as
    /// it reads one line from stdin, exercising the handle's plumbing without
    /// a real `runnerd --worker` binary.
    fn echo_worker() -> WorkerHandle {
        let child = Command::new("sh")
            .arg("-c")
            .arg(r#"read _line; echo '{"kind":"debug","message":"hi"}'; echo '{"kind":"finished"}'"#)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .expect("spawn sh stand-in");
        WorkerHandle::from_child(child).expect("wrap child")
    }

    fn poll_until<F>(handle: &mut WorkerHandle, mut predicate: F) -> WorkerEvent
    where
        F: FnMut(&WorkerEvent) -> bool,
    {
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            if let Some(event) = handle.pump().expect("pump") {
                if predicate(&event) {
                    return event;
                }
            }
            assert!(Instant::now() < deadline, "timed out waiting for event");
            thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn start_triggers_debug_then_finished_events() {
        let mut handle = echo_worker();
        handle.start(b"NOOP").expect("send start");

        let debug = poll_until(&mut handle, |event| matches!(event, WorkerEvent::Debug { .. }));
        assert_eq!(
            debug,
            WorkerEvent::Debug {
                message: "hi".to_owned()
            }
        );

        let finished = poll_until(&mut handle, |event| matches!(event, WorkerEvent::Finished));
        assert_eq!(finished, WorkerEvent::Finished);
    }

    #[test]
    fn pump_returns_none_when_no_event_is_ready() {
        let child = Command::new("sh")
            .arg("-c")
            .arg("sleep 2")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .expect("spawn sh stand-in");
        let mut handle = WorkerHandle::from_child(child).expect("wrap child");
        assert_eq!(handle.pump().expect("pump"), None);
    }

    #[test]
    fn id_reflects_subprocess_pid() {
        let handle = echo_worker();
        assert!(handle.id().get() > 0);
    }
}
