//! Streaming frame decoder.

use std::collections::VecDeque;

use thiserror::Error;

use crate::frame::Frame;
use crate::ids::{RunnerKind, WorkerId};
use crate::opcode;

/// Errors raised while decoding frames from a byte stream.
///
/// Every variant is fatal to the connection it occurred on, per
/// `SPEC_FULL.md` §4.1 and §7.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// The leading opcode byte did not name a known frame.
    #[error("unknown opcode: {opcode}")]
    UnknownOpcode {
        /// The offending opcode byte.
        opcode: u8,
    },
    /// A string length field was negative.
    #[error("negative string length: {length}")]
    NegativeLength {
        /// The offending length field.
        length: i32,
    },
    /// The stream ended with bytes buffered that do not form a whole frame.
    #[error("connection closed with {buffered} byte(s) of a partial frame buffered")]
    PrematureEof {
        /// Number of bytes left over when the peer closed the connection.
        buffered: usize,
    },
}

/// Owns the per-connection byte buffer and assembles complete frames from
/// arbitrarily-chunked reads.
///
/// Decoding never dispatches a partial frame: [`Decoder::push`] appends raw
/// bytes, and [`Decoder::next_frame`] returns `Ok(None)` until enough bytes
/// have arrived to decode one whole frame.
#[derive(Debug, Default)]
pub struct Decoder {
    buf: VecDeque<u8>,
}

impl Decoder {
    /// Creates an empty decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends freshly read bytes to the internal buffer.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend(bytes.iter().copied());
    }

    /// Reports whether the peer closed the connection mid-frame.
    ///
    /// Call this once `push` will no longer receive data (a zero-length
    /// read). Returns `Err(FrameError::PrematureEof)` if bytes remain
    /// buffered; `Ok(())` if the buffer is empty (a clean close between
    /// frames).
    ///
    /// # Errors
    ///
    /// Returns `FrameError::PrematureEof` when bytes remain in the buffer.
    pub fn finish(&self) -> Result<(), FrameError> {
        if self.buf.is_empty() {
            Ok(())
        } else {
            Err(FrameError::PrematureEof {
                buffered: self.buf.len(),
            })
        }
    }

    /// Attempts to decode one frame from the front of the buffer.
    ///
    /// Returns `Ok(None)` when the buffer holds an incomplete frame. The
    /// buffer is left untouched in that case so a subsequent `push` can
    /// complete the frame.
    ///
    /// # Errors
    ///
    /// Returns `FrameError::UnknownOpcode` for an unrecognised opcode byte
    /// (including the reserved 5/6) or `FrameError::NegativeLength` for a
    /// malformed string payload. These errors are fatal: callers should
    /// treat the owning connection as unusable. An unregistered `SPAWN`
    /// kind byte decodes successfully — the registry, not the decoder,
    /// rejects it (`SPEC_FULL.md` §3).
    pub fn next_frame(&mut self) -> Result<Option<Frame>, FrameError> {
        let Some(&op) = self.buf.front() else {
            return Ok(None);
        };

        match op {
            opcode::SPAWN => self.decode_fixed(1, |body| {
                #[expect(
                    clippy::indexing_slicing,
                    reason = "body is verified to hold exactly 1 byte by decode_fixed"
                )]
                let kind = RunnerKind::from_byte(body[0]);
                Ok(Frame::Spawn { kind })
            }),
            opcode::WORKER => self.decode_pid(|pid| Frame::Worker { pid }),
            opcode::STOP => self.decode_pid(|pid| Frame::Stop { pid }),
            opcode::PAUSE => self.decode_pid(|pid| Frame::Pause { pid }),
            opcode::DISCONNECT => self.decode_fixed(0, |_| Ok(Frame::Disconnect)),
            opcode::ERROR => self.decode_string(|why| Frame::Error { why }),
            opcode::KILL => self.decode_pid(|pid| Frame::Kill { pid }),
            opcode::FINISHED => self.decode_pid(|pid| Frame::Finished { pid }),
            opcode::START => self.decode_pid_string(|pid, program| Frame::Start { pid, program }),
            opcode::DEBUG => self.decode_pid_string(|pid, msg| Frame::Debug { pid, msg }),
            other => Err(FrameError::UnknownOpcode { opcode: other }),
        }
    }

    fn decode_string(
        &mut self,
        build: impl FnOnce(Vec<u8>) -> Frame,
    ) -> Result<Option<Frame>, FrameError> {
        if self.buf.len() < 5 {
            return Ok(None);
        }
        let header: Vec<u8> = self.buf.iter().skip(1).take(4).copied().collect();
        #[expect(
            clippy::indexing_slicing,
            reason = "header is verified to hold exactly 4 bytes above"
        )]
        let len_raw = i32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        if len_raw < 0 {
            return Err(FrameError::NegativeLength { length: len_raw });
        }
        let len = usize::try_from(len_raw).unwrap_or(usize::MAX);
        let total = 5usize
            .checked_add(len)
            .ok_or(FrameError::NegativeLength { length: len_raw })?;
        if self.buf.len() < total {
            return Ok(None);
        }
        let payload: Vec<u8> = self.buf.iter().skip(5).take(len).copied().collect();
        self.buf.drain(..total);
        Ok(Some(build(payload)))
    }

    fn decode_fixed<T>(
        &mut self,
        body_len: usize,
        build: impl FnOnce(&[u8]) -> Result<T, FrameError>,
    ) -> Result<Option<T>, FrameError> {
        let total = 1 + body_len;
        if self.buf.len() < total {
            return Ok(None);
        }
        let body: Vec<u8> = self.buf.iter().skip(1).take(body_len).copied().collect();
        let result = build(&body)?;
        self.buf.drain(..total);
        Ok(Some(result))
    }

    fn decode_pid(&mut self, build: impl FnOnce(WorkerId) -> Frame) -> Result<Option<Frame>, FrameError> {
        self.decode_fixed(4, |body| {
            #[expect(
                clippy::indexing_slicing,
                reason = "body is verified to be exactly 4 bytes by decode_fixed"
            )]
            let raw = i32::from_le_bytes([body[0], body[1], body[2], body[3]]);
            Ok(build(WorkerId::new(raw)))
        })
    }

    fn decode_pid_string(
        &mut self,
        build: impl FnOnce(WorkerId, Vec<u8>) -> Frame,
    ) -> Result<Option<Frame>, FrameError> {
        // Header is opcode(1) + pid(4) + length(4) = 9 bytes.
        if self.buf.len() < 9 {
            return Ok(None);
        }
        let header: Vec<u8> = self.buf.iter().skip(1).take(8).copied().collect();
        #[expect(
            clippy::indexing_slicing,
            reason = "header is verified to hold exactly 8 bytes above"
        )]
        let pid_raw = i32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        #[expect(
            clippy::indexing_slicing,
            reason = "header is verified to hold exactly 8 bytes above"
        )]
        let len_raw = i32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        if len_raw < 0 {
            return Err(FrameError::NegativeLength { length: len_raw });
        }
        let len = usize::try_from(len_raw).unwrap_or(usize::MAX);
        let total = 9usize
            .checked_add(len)
            .ok_or(FrameError::NegativeLength { length: len_raw })?;
        if self.buf.len() < total {
            return Ok(None);
        }
        let payload: Vec<u8> = self.buf.iter().skip(9).take(len).copied().collect();
        self.buf.drain(..total);
        Ok(Some(build(WorkerId::new(pid_raw), payload)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::RunnerKind;
    use rstest::rstest;

    #[test]
    fn decodes_spawn_frame() {
        let mut decoder = Decoder::new();
        decoder.push(&[opcode::SPAWN, 1]);
        let frame = decoder.next_frame().expect("decode").expect("present");
        assert_eq!(
            frame,
            Frame::Spawn {
                kind: RunnerKind::PY
            }
        );
        assert!(decoder.buf.is_empty());
    }

    #[test]
    fn waits_for_partial_frame() {
        let mut decoder = Decoder::new();
        decoder.push(&[opcode::KILL, 1, 0]);
        assert_eq!(decoder.next_frame().expect("decode"), None);
        decoder.push(&[0, 0]);
        let frame = decoder.next_frame().expect("decode").expect("present");
        assert_eq!(
            frame,
            Frame::Kill {
                pid: WorkerId::new(1)
            }
        );
    }

    #[test]
    fn decodes_start_frame_byte_at_a_time() {
        let mut encoded = Vec::new();
        Frame::Start {
            pid: WorkerId::new(42),
            program: b"NOOP".to_vec(),
        }
        .encode(&mut encoded)
        .expect("encode");

        let mut decoder = Decoder::new();
        for byte in &encoded[..encoded.len() - 1] {
            decoder.push(&[*byte]);
            assert_eq!(decoder.next_frame().expect("decode"), None);
        }
        #[expect(clippy::indexing_slicing, reason = "encoded is non-empty by construction")]
        decoder.push(&[encoded[encoded.len() - 1]]);
        let frame = decoder.next_frame().expect("decode").expect("present");
        assert_eq!(
            frame,
            Frame::Start {
                pid: WorkerId::new(42),
                program: b"NOOP".to_vec(),
            }
        );
    }

    #[test]
    fn rejects_unknown_opcode() {
        let mut decoder = Decoder::new();
        decoder.push(&[0x7F]);
        let error = decoder.next_frame().expect_err("unknown opcode");
        assert_eq!(error, FrameError::UnknownOpcode { opcode: 0x7F });
    }

    #[rstest]
    #[case(5)]
    #[case(6)]
    fn rejects_reserved_opcodes(#[case] reserved: u8) {
        let mut decoder = Decoder::new();
        decoder.push(&[reserved]);
        let error = decoder.next_frame().expect_err("reserved opcode");
        assert_eq!(error, FrameError::UnknownOpcode { opcode: reserved });
    }

    #[test]
    fn rejects_negative_string_length() {
        let mut decoder = Decoder::new();
        decoder.push(&[opcode::START]);
        decoder.push(&1_i32.to_le_bytes());
        decoder.push(&(-1_i32).to_le_bytes());
        let error = decoder.next_frame().expect_err("negative length");
        assert_eq!(error, FrameError::NegativeLength { length: -1 });
    }

    #[test]
    fn finish_detects_partial_frame() {
        let mut decoder = Decoder::new();
        decoder.push(&[opcode::KILL, 1]);
        let error = decoder.finish().expect_err("partial frame buffered");
        assert_eq!(error, FrameError::PrematureEof { buffered: 2 });
    }

    #[test]
    fn finish_accepts_empty_buffer() {
        let decoder = Decoder::new();
        decoder.finish().expect("empty buffer is a clean close");
    }
}
