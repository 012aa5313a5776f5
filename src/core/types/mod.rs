//! Core type definitions for native-guard
//!
//! This module contains the fundamental types shared by every layer:
//! the error taxonomy, raw status codes, object kinds and privilege
//! records.

mod error;
mod error_code;
mod object;
mod privilege;

// Re-export all public types
pub use error::{NativeError, NativeResult};
pub use error_code::{CodeSpace, ErrorCode, ErrorKind, StatusCode};
pub use object::ObjectKind;
pub use privilege::{
    privilege_state, Luid, PrivilegeEntry, PrivilegeState, SE_PRIVILEGE_ENABLED,
    SE_PRIVILEGE_ENABLED_BY_DEFAULT, SE_PRIVILEGE_REMOVED,
};

// Common type aliases
pub type ProcessId = u32;
pub type ThreadId = u32;
pub type AccessMask = u32;
