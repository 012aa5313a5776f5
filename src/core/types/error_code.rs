//! Raw native status codes and their normalized classification

use crate::windows::utils::error_codes::{win32, ErrorTranslator};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The reporting convention a raw code came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeSpace {
    /// COM-style HRESULT values
    Hresult,
    /// NTSTATUS values returned directly by ntdll calls
    NtStatus,
    /// Win32 error codes paired with a boolean success result
    Win32,
}

impl fmt::Display for CodeSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodeSpace::Hresult => write!(f, "HRESULT"),
            CodeSpace::NtStatus => write!(f, "NTSTATUS"),
            CodeSpace::Win32 => write!(f, "Win32"),
        }
    }
}

/// A raw status value tagged with its code space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "space", content = "value", rename_all = "snake_case")]
pub enum StatusCode {
    Hresult(u32),
    NtStatus(u32),
    Win32(u32),
}

impl StatusCode {
    /// Build a status from a raw value and its space
    pub fn from_raw(raw: u32, space: CodeSpace) -> Self {
        match space {
            CodeSpace::Hresult => StatusCode::Hresult(raw),
            CodeSpace::NtStatus => StatusCode::NtStatus(raw),
            CodeSpace::Win32 => StatusCode::Win32(raw),
        }
    }

    /// The space this status was reported in
    pub fn space(&self) -> CodeSpace {
        match self {
            StatusCode::Hresult(_) => CodeSpace::Hresult,
            StatusCode::NtStatus(_) => CodeSpace::NtStatus,
            StatusCode::Win32(_) => CodeSpace::Win32,
        }
    }

    /// The raw numeric value
    pub fn raw(&self) -> u32 {
        match *self {
            StatusCode::Hresult(v) | StatusCode::NtStatus(v) | StatusCode::Win32(v) => v,
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusCode::Hresult(v) => write!(f, "HRESULT 0x{:08X}", v),
            StatusCode::NtStatus(v) => write!(f, "NTSTATUS 0x{:08X}", v),
            StatusCode::Win32(v) => write!(f, "Win32 error {}", v),
        }
    }
}

/// Normalized failure taxonomy shared by every native call site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    AccessDenied,
    NotFound,
    InsufficientBuffer,
    PartialData,
    Timeout,
    Busy,
    Unsupported,
    /// Local validation only; never produced by translation
    ConflictingFlags,
    /// Local validation only; never produced by translation
    InvalidAccessCombination,
    Other,
}

impl ErrorKind {
    /// Conditions that are retried internally before surfacing
    pub fn is_transient(&self) -> bool {
        matches!(self, ErrorKind::InsufficientBuffer | ErrorKind::Busy)
    }

    /// Failures detected before any native call was issued
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            ErrorKind::ConflictingFlags | ErrorKind::InvalidAccessCombination
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::AccessDenied => "access denied",
            ErrorKind::NotFound => "not found",
            ErrorKind::InsufficientBuffer => "insufficient buffer",
            ErrorKind::PartialData => "partial data",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Busy => "busy",
            ErrorKind::Unsupported => "unsupported",
            ErrorKind::ConflictingFlags => "conflicting flags",
            ErrorKind::InvalidAccessCombination => "invalid access combination",
            ErrorKind::Other => "other",
        };
        f.write_str(s)
    }
}

/// A raw native status paired with the kind callers branch on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ErrorCode {
    status: StatusCode,
    kind: ErrorKind,
}

impl ErrorCode {
    /// Classify a status through the general translation table
    pub fn new(status: StatusCode) -> Self {
        ErrorCode {
            status,
            kind: ErrorTranslator::translate(status.raw(), status.space()),
        }
    }

    /// Pair a status with an explicitly chosen kind (call-site overrides)
    pub fn with_kind(status: StatusCode, kind: ErrorKind) -> Self {
        ErrorCode { status, kind }
    }

    pub fn win32(code: u32) -> Self {
        Self::new(StatusCode::Win32(code))
    }

    pub fn nt_status(code: u32) -> Self {
        Self::new(StatusCode::NtStatus(code))
    }

    pub fn hresult(code: u32) -> Self {
        Self::new(StatusCode::Hresult(code))
    }

    /// Reported when a multi-step query keeps racing with the system
    pub fn busy() -> Self {
        Self::with_kind(StatusCode::Win32(win32::ERROR_BUSY), ErrorKind::Busy)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn raw(&self) -> u32 {
        self.status.raw()
    }

    /// Whether this is the native "no more entries" signal
    pub fn is_end_of_enumeration(&self) -> bool {
        ErrorTranslator::is_end_of_enumeration(self.status)
    }

    pub fn is_insufficient_buffer(&self) -> bool {
        self.kind == ErrorKind::InsufficientBuffer
    }
}

impl From<StatusCode> for ErrorCode {
    fn from(status: StatusCode) -> Self {
        ErrorCode::new(status)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.kind, self.status)
    }
}
