//! Custom error types for native-guard

use super::error_code::{ErrorCode, ErrorKind};
use super::object::ObjectKind;
use thiserror::Error;

/// Main error type for native calls and their local validation
#[derive(Error, Debug)]
pub enum NativeError {
    #[error("{operation} failed: {code}")]
    Call { operation: String, code: ErrorCode },

    #[error("Invalid access combination for {object}: {reason}")]
    InvalidAccessCombination { object: ObjectKind, reason: String },

    #[error("Conflicting flags: {0}")]
    ConflictingFlags(String),

    #[error("Value out of range for {field}: {value} (allowed {min}..={max})")]
    OutOfRange {
        field: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },

    #[error("Expected a {expected} handle, got {actual}")]
    WrongObjectKind {
        expected: ObjectKind,
        actual: ObjectKind,
    },

    #[error("Handle already closed: {0}")]
    HandleClosed(ObjectKind),

    #[error("Invalid {kind} handle value: {raw:#x}")]
    InvalidHandle { kind: ObjectKind, raw: isize },

    #[error("Enumeration aborted after a failed step")]
    EnumerationAborted,

    #[error("Malformed {class} payload: {reason}")]
    MalformedPayload { class: &'static str, reason: String },

    #[error("Blocking task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result type alias for native operations
pub type NativeResult<T> = Result<T, NativeError>;

impl NativeError {
    /// Creates a failed-call error carrying the raw code
    pub fn call(operation: impl Into<String>, code: ErrorCode) -> Self {
        NativeError::Call {
            operation: operation.into(),
            code,
        }
    }

    /// Creates an invalid access combination error
    pub fn invalid_access(object: ObjectKind, reason: impl Into<String>) -> Self {
        NativeError::InvalidAccessCombination {
            object,
            reason: reason.into(),
        }
    }

    /// Creates an out-of-range error
    pub fn out_of_range(field: &'static str, value: u64, min: u64, max: u64) -> Self {
        NativeError::OutOfRange {
            field,
            value,
            min,
            max,
        }
    }

    /// Creates a malformed payload error
    pub fn malformed(class: &'static str, reason: impl Into<String>) -> Self {
        NativeError::MalformedPayload {
            class,
            reason: reason.into(),
        }
    }

    /// The normalized kind callers branch on
    pub fn kind(&self) -> ErrorKind {
        match self {
            NativeError::Call { code, .. } => code.kind(),
            NativeError::InvalidAccessCombination { .. } | NativeError::WrongObjectKind { .. } => {
                ErrorKind::InvalidAccessCombination
            }
            NativeError::ConflictingFlags(_) | NativeError::OutOfRange { .. } => {
                ErrorKind::ConflictingFlags
            }
            NativeError::HandleClosed(_) | NativeError::InvalidHandle { .. } => {
                ErrorKind::NotFound
            }
            NativeError::IoError(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                ErrorKind::AccessDenied
            }
            NativeError::IoError(e) if e.kind() == std::io::ErrorKind::NotFound => {
                ErrorKind::NotFound
            }
            _ => ErrorKind::Other,
        }
    }

    /// The raw native code, when the failure came from a native call
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            NativeError::Call { code, .. } => Some(*code),
            _ => None,
        }
    }
}
