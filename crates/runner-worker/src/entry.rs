//! Subprocess-side main loop for a spawned worker.
//!
//! Grounded on `original_source/mmldaemon.py`'s `worker(pipe, runner)`
//! function: read one control message at a time, dispatch it to the bound
//! runner, and forward every debug/finished event back over the pipe. Events
//! are produced asynchronously (a runner's `start` may run on its own
//! thread), so a dedicated writer thread drains them as they arrive rather
//! than only between reads.

use std::io::{self, BufRead, Write};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use runner_proto::RunnerKind;
use runner_runtime::RunnerRegistry;
use tracing::{error, info};

use crate::envelope::{ControlMessage, WorkerEvent};

const ENTRY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::entry");

/// Runs the worker subprocess loop, reading [`ControlMessage`]s from `input`
/// and writing [`WorkerEvent`]s to `output` until every event producer has
/// finished and `input` is exhausted.
///
/// Returns an error only for pipe-level IO failures; an unregistered `kind`
/// or a malformed control line is logged and treated as a no-op rather than
/// terminating the subprocess, since the daemon already validated `kind`
/// before spawning this process.
pub fn run_worker<R, W>(kind: RunnerKind, input: R, output: W) -> io::Result<()>
where
    R: BufRead,
    W: Write + Send + 'static,
{
    let (sender, receiver) = mpsc::channel::<WorkerEvent>();
    let writer = thread::spawn(move || write_events(receiver, output));

    let debug_sink: Arc<dyn Fn(String) + Send + Sync> = {
        let sender = sender.clone();
        Arc::new(move |message| {
            let _ = sender.send(WorkerEvent::Debug { message });
        })
    };

    let registry = RunnerRegistry::with_builtins();
    let Some(mut runner) = registry.create(kind, debug_sink) else {
        error!(target: ENTRY_TARGET, %kind, "worker started with unregistered kind");
        drop(sender);
        return join_writer(writer);
    };

    info!(target: ENTRY_TARGET, %kind, "worker subprocess ready");

    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<ControlMessage>(&line) {
            Ok(ControlMessage::Start { program }) => {
                let sender = sender.clone();
                runner.start(
                    program.into_bytes(),
                    Box::new(move || {
                        let _ = sender.send(WorkerEvent::Finished);
                    }),
                );
            }
            Ok(ControlMessage::Stop) => runner.stop(),
            Ok(ControlMessage::Pause) => runner.pause(),
            Err(error) => {
                error!(target: ENTRY_TARGET, %error, line, "malformed control message, ignoring");
            }
        }
    }

    drop(sender);
    drop(runner);
    join_writer(writer)
}

fn write_events<W: Write>(receiver: mpsc::Receiver<WorkerEvent>, mut output: W) -> io::Result<()> {
    for event in receiver {
        let mut line = serde_json::to_vec(&event).map_err(io::Error::other)?;
        line.push(b'\n');
        output.write_all(&line)?;
        output.flush()?;
    }
    Ok(())
}

fn join_writer(writer: thread::JoinHandle<io::Result<()>>) -> io::Result<()> {
    match writer.join() {
        Ok(result) => result,
        Err(_) => Err(io::Error::other("worker event writer thread panicked")),
    }
}
