//! Identifier types shared by the wire protocol and the daemon.

use std::fmt;

/// Opaque worker identifier transmitted as a signed 32-bit integer.
///
/// The reference daemon uses the host OS process ID of the worker
/// subprocess; this implementation preserves that choice (`SPEC_FULL.md`
/// §10.3) but treats the value as opaque everywhere outside the worker
/// spawn path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(i32);

impl WorkerId {
    /// Wraps a raw 32-bit identifier.
    #[must_use]
    pub const fn new(raw: i32) -> Self {
        Self(raw)
    }

    /// Returns the raw wire representation.
    #[must_use]
    pub const fn get(self) -> i32 {
        self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Interpreter kind a worker hosts, transmitted as a single unsigned byte.
///
/// This is deliberately an open byte, not a closed Rust enum: `SPEC_FULL.md`
/// §3 (`spec.md` §3) allows "additional kinds ... registered without
/// protocol change by assigning unused byte values". The wire decoder never
/// rejects a `SPAWN` frame for carrying an unrecognised byte — only the
/// daemon's runner registry decides whether a kind is known
/// (`UnknownRunnerKind`, `SPEC_FULL.md` §7), so registering a new kind never
/// requires touching this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunnerKind(u8);

impl RunnerKind {
    /// `PascalScript`-style interpreter, wire byte 0.
    pub const PS: Self = Self(0);
    /// Python interpreter, wire byte 1.
    pub const PY: Self = Self(1);
    /// Native Pascal runner backed by a dynamic library, wire byte 2.
    pub const CPAS: Self = Self(2);

    /// Wraps a raw wire byte, regardless of whether it names a registered
    /// kind.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Self {
        Self(byte)
    }

    /// Returns the raw wire byte.
    #[must_use]
    pub const fn to_byte(self) -> u8 {
        self.0
    }
}

impl fmt::Display for RunnerKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::PS => formatter.write_str("ps"),
            Self::PY => formatter.write_str("py"),
            Self::CPAS => formatter.write_str("cpas"),
            Self(other) => write!(formatter, "kind({other})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(RunnerKind::PS)]
    #[case(RunnerKind::PY)]
    #[case(RunnerKind::CPAS)]
    fn round_trips_known_kinds(#[case] kind: RunnerKind) {
        assert_eq!(RunnerKind::from_byte(kind.to_byte()), kind);
    }

    #[test]
    fn preserves_unregistered_byte() {
        let kind = RunnerKind::from_byte(99);
        assert_eq!(kind.to_byte(), 99);
        assert_eq!(kind.to_string(), "kind(99)");
    }

    #[test]
    fn worker_id_round_trips() {
        let id = WorkerId::new(4321);
        assert_eq!(id.get(), 4321);
        assert_eq!(id.to_string(), "4321");
    }
}
