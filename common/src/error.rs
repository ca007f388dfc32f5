//! # Error Taxonomy
//!
//! Three families of failure cross this crate:
//!
//! * [`ScanError`] is a **runtime** scan error. It travels inside the result
//!   stream (as a stream item or as the contents of a report) and carries no
//!   payload beyond its tag. Engines speak it as a negative status code.
//! * [`ConfigError`] is raised synchronously while a [`ScanConfig`] is being
//!   built or validated. It never enters the stream.
//! * [`DecodeError`] means an engine handed over a buffer that breaks the wire
//!   contract. It is never recoverable for the session that saw it.
//!
//! [`ScanConfig`]: crate::config::ScanConfig

use thiserror::Error;

/// Status code used by engines for "no error".
pub const STATUS_OK: i8 = 0;

/// A per-target or per-item failure reported by the scan engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum ScanError {
    /// A buffer did not have the length its type requires.
    #[error("invalid length")]
    InvalidLength,
    /// A buffer that should hold text was not valid UTF-8.
    #[error("invalid UTF-8")]
    InvalidUtf8,
    /// A hostname target did not resolve to any address.
    #[error("failed to resolve hostname")]
    FailedToResolveHostname,
    /// The scan needs privileges the process does not have (raw sockets).
    #[error("insufficient permission")]
    InsufficientPermission,
    /// Anything the engine reported that this crate does not know about.
    #[error("unknown error")]
    UnknownError,
}

impl ScanError {
    /// Maps an engine status code onto the error enum.
    ///
    /// Unmapped codes degrade to [`ScanError::UnknownError`]. `0` is not an
    /// error at all, callers must check for [`STATUS_OK`] first.
    pub fn from_code(code: i8) -> Self {
        match code {
            -1 => ScanError::InvalidLength,
            -2 => ScanError::InvalidUtf8,
            -3 => ScanError::FailedToResolveHostname,
            -4 => ScanError::InsufficientPermission,
            _ => ScanError::UnknownError,
        }
    }

    pub fn code(self) -> i8 {
        match self {
            ScanError::InvalidLength => -1,
            ScanError::InvalidUtf8 => -2,
            ScanError::FailedToResolveHostname => -3,
            ScanError::InsufficientPermission => -4,
            ScanError::UnknownError => -100,
        }
    }
}

/// Turns an engine status code into a `Result`.
pub fn check_status(code: i8) -> Result<(), ScanError> {
    match code {
        STATUS_OK => Ok(()),
        other => Err(ScanError::from_code(other)),
    }
}

/// Rejected configuration, detected before any scan starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid throttle range: min {min}ms is greater than max {max}ms")]
    InvalidThrottleRange { min: u64, max: u64 },
    #[error("max in flight must be a positive integer")]
    InvalidMaxInFlight,
    #[error("invalid target: {0}")]
    InvalidTarget(#[source] ScanError),
    #[error("no targets were configured")]
    NoTargets,
}

/// A buffer violated the wire contract between engine and session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("buffer truncated: needed {needed} bytes at offset {offset}, {remaining} remaining")]
    Truncated {
        offset: usize,
        needed: usize,
        remaining: usize,
    },
    #[error("{remaining} trailing bytes after {what}")]
    TrailingBytes { what: &'static str, remaining: usize },
    #[error("unknown {field} discriminant {value}")]
    Discriminant { field: &'static str, value: u8 },
    #[error("{field} holds invalid UTF-8")]
    InvalidUtf8 { field: &'static str },
    #[error("invalid {what} length {len}")]
    Length { what: &'static str, len: usize },
    #[error("successful result carried no payload")]
    MissingPayload,
    #[error("completion marker carried a payload")]
    UnexpectedPayload,
    #[error("port {0} reported more than once")]
    DuplicatePort(u16),
}
