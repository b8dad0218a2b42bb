//! Frame representation and encoding.

use std::io::{self, Write};

use crate::ids::{RunnerKind, WorkerId};
use crate::opcode;

/// A single wire frame, decoded or ready to encode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// `SPAWN(kind)` — client requests a worker of the given kind.
    Spawn { kind: RunnerKind },
    /// `WORKER(pid)` — daemon reports the newly spawned worker's id.
    Worker { pid: WorkerId },
    /// `START(pid, program)` — client asks a worker to run a program.
    Start { pid: WorkerId, program: Vec<u8> },
    /// `STOP(pid)` — client asks a worker to stop.
    Stop { pid: WorkerId },
    /// `PAUSE(pid)` — client asks a worker to pause.
    Pause { pid: WorkerId },
    /// `DISCONNECT` — client announces an orderly shutdown.
    Disconnect,
    /// `ERROR(why)` — daemon reports a fatal connection error.
    Error { why: Vec<u8> },
    /// `KILL(pid)` — client asks the daemon to forcibly terminate a worker.
    Kill { pid: WorkerId },
    /// `FINISHED(pid)` — daemon reports a worker's program has ended.
    Finished { pid: WorkerId },
    /// `DEBUG(pid, msg)` — daemon forwards a worker's debug line.
    Debug { pid: WorkerId, msg: Vec<u8> },
}

impl Frame {
    /// Encodes this frame to `writer` as a single all-or-nothing write.
    ///
    /// # Errors
    ///
    /// Propagates any I/O error from `writer`. Partial writes cannot leave a
    /// malformed frame on the wire because the frame is first serialized
    /// into an in-memory buffer and written in one call.
    pub fn encode<W: Write>(&self, mut writer: W) -> io::Result<()> {
        let mut buf = Vec::new();
        match self {
            Self::Spawn { kind } => {
                buf.push(opcode::SPAWN);
                buf.push(kind.to_byte());
            }
            Self::Worker { pid } => {
                buf.push(opcode::WORKER);
                buf.extend_from_slice(&pid.get().to_le_bytes());
            }
            Self::Start { pid, program } => {
                buf.push(opcode::START);
                buf.extend_from_slice(&pid.get().to_le_bytes());
                push_string(&mut buf, program);
            }
            Self::Stop { pid } => {
                buf.push(opcode::STOP);
                buf.extend_from_slice(&pid.get().to_le_bytes());
            }
            Self::Pause { pid } => {
                buf.push(opcode::PAUSE);
                buf.extend_from_slice(&pid.get().to_le_bytes());
            }
            Self::Disconnect => {
                buf.push(opcode::DISCONNECT);
            }
            Self::Error { why } => {
                buf.push(opcode::ERROR);
                push_string(&mut buf, why);
            }
            Self::Kill { pid } => {
                buf.push(opcode::KILL);
                buf.extend_from_slice(&pid.get().to_le_bytes());
            }
            Self::Finished { pid } => {
                buf.push(opcode::FINISHED);
                buf.extend_from_slice(&pid.get().to_le_bytes());
            }
            Self::Debug { pid, msg } => {
                buf.push(opcode::DEBUG);
                buf.extend_from_slice(&pid.get().to_le_bytes());
                push_string(&mut buf, msg);
            }
        }
        writer.write_all(&buf)
    }

    /// Convenience constructor for an `ERROR` frame from a UTF-8 reason.
    #[must_use]
    pub fn error(why: impl Into<String>) -> Self {
        Self::Error {
            why: why.into().into_bytes(),
        }
    }

    /// Convenience constructor for a `DEBUG` frame from a UTF-8 message.
    #[must_use]
    pub fn debug(pid: WorkerId, msg: impl Into<String>) -> Self {
        Self::Debug {
            pid,
            msg: msg.into().into_bytes(),
        }
    }
}

fn push_string(buf: &mut Vec<u8>, bytes: &[u8]) {
    let len = i32::try_from(bytes.len()).unwrap_or(i32::MAX);
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(bytes);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_spawn() {
        let mut out = Vec::new();
        Frame::Spawn {
            kind: RunnerKind::PY,
        }
        .encode(&mut out)
        .expect("encode spawn");
        assert_eq!(out, vec![opcode::SPAWN, 1]);
    }

    #[test]
    fn encodes_start_with_program_string() {
        let mut out = Vec::new();
        Frame::Start {
            pid: WorkerId::new(7),
            program: b"NOOP".to_vec(),
        }
        .encode(&mut out)
        .expect("encode start");

        let mut expected = vec![opcode::START];
        expected.extend_from_slice(&7_i32.to_le_bytes());
        expected.extend_from_slice(&4_i32.to_le_bytes());
        expected.extend_from_slice(b"NOOP");
        assert_eq!(out, expected);
    }

    #[test]
    fn encodes_disconnect_with_no_payload() {
        let mut out = Vec::new();
        Frame::Disconnect.encode(&mut out).expect("encode");
        assert_eq!(out, vec![opcode::DISCONNECT]);
    }
}
