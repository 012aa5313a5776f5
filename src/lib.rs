//! native-guard: a resource-safe calling layer over the Windows native API
//!
//! Handles are owned by guards that close them exactly once, variable-size
//! queries go through one growing-buffer loop, snapshots are walked by
//! fused cursors, and privilege changes are undone when their session
//! ends. Every native failure is reported as a raw code plus a normalized
//! [`ErrorKind`].

pub mod config;
pub mod core;
pub mod job;
pub mod process;
pub mod security;
pub mod sync;
pub mod windows;

// Re-export main types from core module
pub use crate::core::types::{
    AccessMask, CodeSpace, ErrorCode, ErrorKind, Luid, NativeError, NativeResult, ObjectKind,
    PrivilegeEntry, PrivilegeState, ProcessId, StatusCode, ThreadId,
};

pub use crate::core::blocking::run_blocking;
pub use crate::job::{CpuRateControl, CpuRates, ResourceControlPolicy, ResourceLimitSpec};
pub use crate::process::{EnumerationCursor, PrivilegeSession, ProcessEntry, ReleaseReport};
pub use crate::security::{AccessDescriptor, ValidatedMask};
pub use crate::sync::{WaitOutcome, WaitTimeout};
pub use crate::windows::{CallSite, ErrorTranslator, GrowingBufferQuery, HandleGuard, QueryResult};

// Re-export core directly for full access
pub use crate::core::{AUTHORS, VERSION};
