use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of a failure raised by a device backend.
///
/// Mirrors the exception families a hardware driver reports: bad channel
/// or mboard indices, unknown names, unsupported features, transport
/// faults, out-of-range values and generic runtime failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FaultKind {
    Index,
    Key,
    NotImplemented,
    Io,
    Value,
    Runtime,
    Assertion,
    Other,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Index => "index",
            Self::Key => "key",
            Self::NotImplemented => "not implemented",
            Self::Io => "io",
            Self::Value => "value",
            Self::Runtime => "runtime",
            Self::Assertion => "assertion",
            Self::Other => "backend",
        };
        f.write_str(name)
    }
}

/// A failure reported by a backend session or streamer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{kind} error: {message}")]
pub struct BackendFault {
    pub kind: FaultKind,
    pub message: String,
}

impl BackendFault {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn index(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Index, message)
    }

    pub fn key(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Key, message)
    }

    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::new(FaultKind::NotImplemented, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Io, message)
    }

    pub fn value(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Value, message)
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Runtime, message)
    }
}

/// Errors returned by every operation that goes through a handle.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The device slot does not resolve to a live entry.
    #[error("invalid device handle")]
    InvalidDevice,

    /// The streamer position does not resolve within a live device,
    /// or the handle itself is null at the C boundary.
    #[error("invalid streamer handle")]
    InvalidHandle,

    #[error("device construction failed: {0}")]
    DeviceConstructionFailed(String),

    #[error("{kind} error: {message}")]
    BackendOperationFailed { kind: FaultKind, message: String },

    #[error("unknown error: {0}")]
    Unknown(String),
}

impl SessionError {
    /// Stable numeric status for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidDevice => ErrorCode::InvalidDevice,
            Self::InvalidHandle => ErrorCode::InvalidHandle,
            Self::DeviceConstructionFailed(_) => ErrorCode::DeviceConstructionFailed,
            Self::BackendOperationFailed { kind, .. } => ErrorCode::from(*kind),
            Self::Unknown(_) => ErrorCode::Unknown,
        }
    }

    /// Whether the handle itself no longer resolves.
    pub fn is_invalid_handle(&self) -> bool {
        matches!(self, Self::InvalidDevice | Self::InvalidHandle)
    }
}

impl From<BackendFault> for SessionError {
    fn from(fault: BackendFault) -> Self {
        Self::BackendOperationFailed {
            kind: fault.kind,
            message: fault.message,
        }
    }
}

/// Numeric status codes handed across the C boundary.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    None = 0,
    InvalidDevice = 1,
    InvalidHandle = 2,
    DeviceConstructionFailed = 5,
    Index = 10,
    Key = 11,
    NotImplemented = 20,
    Io = 30,
    Assertion = 40,
    Value = 43,
    Runtime = 44,
    BackendOther = 47,
    Unknown = 100,
}

impl ErrorCode {
    pub fn is_ok(self) -> bool {
        self == Self::None
    }
}

impl From<FaultKind> for ErrorCode {
    fn from(kind: FaultKind) -> Self {
        match kind {
            FaultKind::Index => Self::Index,
            FaultKind::Key => Self::Key,
            FaultKind::NotImplemented => Self::NotImplemented,
            FaultKind::Io => Self::Io,
            FaultKind::Value => Self::Value,
            FaultKind::Runtime => Self::Runtime,
            FaultKind::Assertion => Self::Assertion,
            FaultKind::Other => Self::BackendOther,
        }
    }
}

impl<T> From<&Result<T, SessionError>> for ErrorCode {
    fn from(result: &Result<T, SessionError>) -> Self {
        match result {
            Ok(_) => Self::None,
            Err(e) => e.code(),
        }
    }
}
