//! Per-connection pump loop.
//!
//! Grounded on `weaverd::transport::handler`'s `ConnectionHandler` trait
//! (`crates/weaverd/src/transport/handler.rs`), but wired to
//! [`crate::dispatch::ConnectionDispatcher`] instead of that file's
//! drain-then-exit `NoopConnectionHandler` stand-in. The pump shape itself —
//! read with a short timeout, dispatch whatever decoded, then drain worker
//! events, repeat — mirrors `original_source/mmldaemon.py`'s
//! `MMLDaemon.pump`, scoped to a single connection instead of the whole
//! daemon (`SPEC_FULL.md` §10.1).

use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use runner_proto::{Decoder, Frame};
use runner_runtime::RunnerRegistry;
use tracing::warn;

use super::TRANSPORT_TARGET;
use crate::dispatch::{ConnectionDispatcher, ConnectionId, DispatchOutcome, WorkerRegistry};

/// Upper bound on how long a single inbound read blocks before the loop
/// falls through to drain worker events, `SPEC_FULL.md` §10.1.
const PUMP_INTERVAL: Duration = Duration::from_millis(50);
const READ_BUF_SIZE: usize = 4096;

/// Handles one accepted TCP connection from accept to close.
pub(crate) trait ConnectionHandler: Send + Sync + 'static {
    /// Runs the connection to completion. Implementations should avoid
    /// panicking; a handler thread panic is surfaced as a warning, not
    /// propagated to the listener.
    fn handle(&self, stream: TcpStream);
}

/// Production handler: one [`ConnectionDispatcher`] per connection, driven
/// by [`run_connection`] on the thread the listener spawned for it.
pub(crate) struct DaemonConnectionHandler {
    workers: Arc<WorkerRegistry>,
    kinds: Arc<RunnerRegistry>,
    runner_exe: PathBuf,
    next_id: AtomicU64,
}

impl DaemonConnectionHandler {
    /// Builds a handler sharing the daemon-wide worker ownership index and
    /// runner kind registry across every connection it accepts.
    #[must_use]
    pub(crate) fn new(workers: Arc<WorkerRegistry>, kinds: Arc<RunnerRegistry>, runner_exe: PathBuf) -> Self {
        Self {
            workers,
            kinds,
            runner_exe,
            next_id: AtomicU64::new(1),
        }
    }
}

impl ConnectionHandler for DaemonConnectionHandler {
    fn handle(&self, stream: TcpStream) {
        let id = ConnectionId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        let mut dispatcher = ConnectionDispatcher::new(
            id,
            Arc::clone(&self.workers),
            Arc::clone(&self.kinds),
            self.runner_exe.clone(),
        );
        if let Err(error) = run_connection(stream, &mut dispatcher) {
            warn!(target: TRANSPORT_TARGET, connection = ?id, %error, "connection loop ended with an IO error");
        }
        // Owner-disconnect cascade, `SPEC_FULL.md` §3: whatever this
        // connection still owns when its loop ends is killed here,
        // whether it exited via DISCONNECT, a dispatch error, or a dead
        // socket. Idempotent: the worker map is already empty on any path
        // that called it once.
        dispatcher.kill_owned_workers();
    }
}

/// Drives one connection's frame decode/dispatch/drain cycle until the
/// client disconnects, sends a fatal frame, or the socket itself errors.
fn run_connection(mut stream: TcpStream, dispatcher: &mut ConnectionDispatcher) -> io::Result<()> {
    stream.set_read_timeout(Some(PUMP_INTERVAL))?;
    let mut decoder = Decoder::new();
    let mut buf = [0_u8; READ_BUF_SIZE];

    loop {
        match stream.read(&mut buf) {
            Ok(0) => {
                if let Err(error) = decoder.finish() {
                    warn!(target: TRANSPORT_TARGET, %error, "connection closed mid-frame");
                }
                return Ok(());
            }
            Ok(count) => {
                decoder.push(buf.get(..count).unwrap_or(&[]));
                if !drain_inbound(&mut stream, &mut decoder, dispatcher)? {
                    return Ok(());
                }
            }
            Err(error) if matches!(error.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {}
            Err(error) => return Err(error),
        }

        drain_outbound(&mut stream, dispatcher)?;
    }
}

/// Decodes and dispatches every whole frame currently buffered.
///
/// Returns `Ok(false)` once the connection should close: the client sent
/// `DISCONNECT`, a frame failed to decode, or dispatch returned a fatal
/// error. In the latter two cases an `ERROR` frame is written first.
fn drain_inbound(
    stream: &mut TcpStream,
    decoder: &mut Decoder,
    dispatcher: &mut ConnectionDispatcher,
) -> io::Result<bool> {
    loop {
        let frame = match decoder.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => return Ok(true),
            Err(error) => {
                write_frame(stream, &Frame::error(error.to_string()))?;
                return Ok(false);
            }
        };
        match dispatcher.dispatch(frame) {
            Ok(DispatchOutcome::Frames(frames)) => {
                for frame in &frames {
                    write_frame(stream, frame)?;
                }
            }
            Ok(DispatchOutcome::Disconnect) => return Ok(false),
            Err(error) => {
                write_frame(stream, &Frame::error(error.client_message()))?;
                return Ok(false);
            }
        }
    }
}

/// Drains one round of worker events and forwards them as frames. A broken
/// worker pipe is reaped, not surfaced here: [`ConnectionDispatcher::poll_worker_events`]
/// already turned it into a synthesized `FINISHED`.
fn drain_outbound(stream: &mut TcpStream, dispatcher: &mut ConnectionDispatcher) -> io::Result<()> {
    for frame in dispatcher.poll_worker_events() {
        write_frame(stream, &frame)?;
    }
    Ok(())
}

fn write_frame(stream: &mut TcpStream, frame: &Frame) -> io::Result<()> {
    frame.encode(&mut *stream)?;
    stream.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use runner_proto::{RunnerKind, WorkerId};
    use std::fs;
    use std::io::Write as _;
    use std::net::{TcpListener, TcpStream};
    use std::os::unix::fs::PermissionsExt;
    use std::thread;

    fn fake_worker_exe(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("fake-runnerd");
        let mut file = fs::File::create(&path).expect("create fake worker");
        writeln!(
            file,
            "#!/bin/sh\nread _line\necho '{{\"kind\":\"debug\",\"message\":\"hi\"}}'\necho '{{\"kind\":\"finished\"}}'\n"
        )
        .expect("write script");
        let mut perms = fs::metadata(&path).expect("metadata").permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).expect("set permissions");
        path
    }

    fn spawn_handler(exe: PathBuf) -> (TcpStream, thread::JoinHandle<()>) {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let workers = Arc::new(WorkerRegistry::new());
        let kinds = Arc::new(RunnerRegistry::with_builtins());
        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().expect("accept");
            let handler = DaemonConnectionHandler::new(workers, kinds, exe);
            handler.handle(stream);
        });
        let client = TcpStream::connect(addr).expect("connect client");
        (client, server)
    }

    #[test]
    fn spawn_start_yields_worker_then_debug_then_finished() {
        let dir = tempfile::tempdir().expect("tempdir");
        let exe = fake_worker_exe(&dir);
        let (mut client, server) = spawn_handler(exe);

        Frame::Spawn { kind: RunnerKind::PY }
            .encode(&mut client)
            .expect("encode spawn");
        client.flush().expect("flush");

        let mut decoder = Decoder::new();
        let pid = read_frame_until(&mut client, &mut decoder, |frame| matches!(frame, Frame::Worker { .. }));
        let Frame::Worker { pid } = pid else {
            panic!("expected worker frame");
        };

        Frame::Start { pid, program: b"NOOP".to_vec() }
            .encode(&mut client)
            .expect("encode start");
        client.flush().expect("flush");

        let debug = read_frame_until(&mut client, &mut decoder, |frame| matches!(frame, Frame::Debug { .. }));
        assert!(matches!(debug, Frame::Debug { pid: debug_pid, .. } if debug_pid == pid));

        let finished = read_frame_until(&mut client, &mut decoder, |frame| matches!(frame, Frame::Finished { .. }));
        assert_eq!(finished, Frame::Finished { pid });

        Frame::Disconnect.encode(&mut client).expect("encode disconnect");
        client.flush().expect("flush");
        server.join().expect("join handler");
    }

    #[test]
    fn unowned_kill_yields_error_frame_and_close() {
        let dir = tempfile::tempdir().expect("tempdir");
        let exe = fake_worker_exe(&dir);
        let (mut client, server) = spawn_handler(exe);

        Frame::Kill { pid: WorkerId::new(99) }
            .encode(&mut client)
            .expect("encode kill");
        client.flush().expect("flush");

        let mut decoder = Decoder::new();
        let error = read_frame_until(&mut client, &mut decoder, |frame| matches!(frame, Frame::Error { .. }));
        assert!(matches!(error, Frame::Error { .. }));

        server.join().expect("join handler");
    }

    fn read_frame_until(
        client: &mut TcpStream,
        decoder: &mut Decoder,
        predicate: impl Fn(&Frame) -> bool,
    ) -> Frame {
        let mut buf = [0_u8; 256];
        loop {
            if let Some(frame) = decoder.next_frame().expect("decode") {
                if predicate(&frame) {
                    return frame;
                }
                continue;
            }
            let count = client.read(&mut buf).expect("read");
            assert_ne!(count, 0, "server closed before expected frame arrived");
            decoder.push(buf.get(..count).unwrap_or(&[]));
        }
    }
}
