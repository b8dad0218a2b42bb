//! Wire protocol for the `runnerd` script-execution daemon.
//!
//! Frames are opcode-prefixed records sent over a reliable byte stream
//! between a client and the daemon. Every multi-byte integer is encoded
//! little-endian; this is a deliberate break from the reference
//! implementation's host-endian encoding (see `SPEC_FULL.md` §9.2).

mod decode;
mod frame;
mod ids;

pub use decode::{Decoder, FrameError};
pub use frame::Frame;
pub use ids::{RunnerKind, WorkerId};

/// Opcode bytes, as tabulated in `SPEC_FULL.md` §4.1.
pub(crate) mod opcode {
    pub const SPAWN: u8 = 0;
    pub const WORKER: u8 = 1;
    pub const START: u8 = 2;
    pub const STOP: u8 = 3;
    pub const PAUSE: u8 = 4;
    pub const DISCONNECT: u8 = 7;
    pub const ERROR: u8 = 8;
    pub const KILL: u8 = 9;
    pub const FINISHED: u8 = 10;
    pub const DEBUG: u8 = 11;
}
