//! Owned native handles with guaranteed release
//!
//! A [`HandleGuard`] owns exactly one handle. It is closed exactly once,
//! either explicitly through [`HandleGuard::close`] or when the guard is
//! dropped. The only way to keep a handle open past the guard is the
//! explicit [`HandleGuard::leak`].

use crate::core::types::{AccessMask, ErrorCode, NativeError, NativeResult, ObjectKind};
use crate::security::access::AccessDescriptor;
use crate::windows::utils::error_codes::CallSite;
use std::fmt;
use std::sync::Arc;
use tracing::{trace, warn};

/// Raw handle value as the OS hands it out
pub type RawHandle = isize;

/// Sentinel returned by snapshot and file APIs on failure
pub const INVALID_HANDLE_VALUE: RawHandle = -1;

/// An opaque, process-local reference to a kernel or subsystem object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeHandle {
    raw: RawHandle,
    kind: ObjectKind,
    granted: AccessMask,
}

impl NativeHandle {
    pub fn new(raw: RawHandle, kind: ObjectKind, granted: AccessMask) -> Self {
        NativeHandle { raw, kind, granted }
    }

    pub fn raw(&self) -> RawHandle {
        self.raw
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    /// Access rights granted when the handle was opened
    pub fn granted(&self) -> AccessMask {
        self.granted
    }

    /// Null and `INVALID_HANDLE_VALUE` never name an owned object
    pub fn is_valid_raw(raw: RawHandle) -> bool {
        raw != 0 && raw != INVALID_HANDLE_VALUE
    }
}

/// Rights requested for a duplicated handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateAccess {
    /// Same rights as the source handle
    SameAccess,
    /// An explicit mask, validated against the object kind first
    Rights(AccessMask),
}

/// The native operations a guard needs: release and duplication
pub trait HandleOps {
    /// Release the handle. Called at most once per guard.
    fn close(&self, handle: &NativeHandle) -> Result<(), ErrorCode>;

    /// Duplicate `handle` into `target_process`, or into the current
    /// process when `None`.
    fn duplicate(
        &self,
        handle: &NativeHandle,
        target_process: Option<RawHandle>,
        access: DuplicateAccess,
        inheritable: bool,
    ) -> Result<RawHandle, ErrorCode>;
}

impl<T: HandleOps + ?Sized> HandleOps for &T {
    fn close(&self, handle: &NativeHandle) -> Result<(), ErrorCode> {
        (**self).close(handle)
    }

    fn duplicate(
        &self,
        handle: &NativeHandle,
        target_process: Option<RawHandle>,
        access: DuplicateAccess,
        inheritable: bool,
    ) -> Result<RawHandle, ErrorCode> {
        (**self).duplicate(handle, target_process, access, inheritable)
    }
}

impl<T: HandleOps + ?Sized> HandleOps for Arc<T> {
    fn close(&self, handle: &NativeHandle) -> Result<(), ErrorCode> {
        (**self).close(handle)
    }

    fn duplicate(
        &self,
        handle: &NativeHandle,
        target_process: Option<RawHandle>,
        access: DuplicateAccess,
        inheritable: bool,
    ) -> Result<RawHandle, ErrorCode> {
        (**self).duplicate(handle, target_process, access, inheritable)
    }
}

/// Result of a close attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    Closed,
    AlreadyClosed,
    /// The native close failed; the guard is still marked closed
    Failed(ErrorCode),
}

/// A handle value that belongs to another process.
///
/// Produced by [`HandleGuard::duplicate_into`]. The value is meaningless in
/// this process and is never closed from here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteHandle(NativeHandle);

impl RemoteHandle {
    pub fn raw(&self) -> RawHandle {
        self.0.raw
    }

    pub fn kind(&self) -> ObjectKind {
        self.0.kind
    }

    pub fn granted(&self) -> AccessMask {
        self.0.granted
    }
}

/// Owns exactly one native handle and releases it on every exit path
pub struct HandleGuard<O: HandleOps> {
    handle: NativeHandle,
    ops: O,
    closed: bool,
}

impl<O: HandleOps> HandleGuard<O> {
    /// Take ownership of a handle returned by a successful open/create call
    pub fn new(
        raw: RawHandle,
        kind: ObjectKind,
        granted: AccessMask,
        ops: O,
    ) -> NativeResult<Self> {
        if !NativeHandle::is_valid_raw(raw) {
            return Err(NativeError::InvalidHandle { kind, raw });
        }
        trace!(%kind, raw, granted, "handle acquired");
        Ok(HandleGuard {
            handle: NativeHandle::new(raw, kind, granted),
            ops,
            closed: false,
        })
    }

    pub fn handle(&self) -> &NativeHandle {
        &self.handle
    }

    pub fn raw(&self) -> RawHandle {
        self.handle.raw
    }

    pub fn kind(&self) -> ObjectKind {
        self.handle.kind
    }

    pub fn granted(&self) -> AccessMask {
        self.handle.granted
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn ops(&self) -> &O {
        &self.ops
    }

    /// Fail unless the guard is open and holds a `expected` handle
    pub fn ensure_kind(&self, expected: ObjectKind) -> NativeResult<()> {
        self.ensure_open()?;
        if self.handle.kind != expected {
            return Err(NativeError::WrongObjectKind {
                expected,
                actual: self.handle.kind,
            });
        }
        Ok(())
    }

    fn ensure_open(&self) -> NativeResult<()> {
        if self.closed {
            Err(NativeError::HandleClosed(self.handle.kind))
        } else {
            Ok(())
        }
    }

    /// Release the handle. Calling this again is a no-op.
    pub fn close(&mut self) -> CloseOutcome {
        if self.closed {
            return CloseOutcome::AlreadyClosed;
        }
        // Marked first so a failed close is never retried
        self.closed = true;
        match self.ops.close(&self.handle) {
            Ok(()) => {
                trace!(kind = %self.handle.kind, raw = self.handle.raw, "handle closed");
                CloseOutcome::Closed
            }
            Err(code) => {
                warn!(
                    kind = %self.handle.kind,
                    raw = self.handle.raw,
                    %code,
                    "failed to close handle"
                );
                CloseOutcome::Failed(code)
            }
        }
    }

    /// Give up ownership without closing, e.g. to hand the handle across
    /// a process-replace boundary. Returns `None` if already closed.
    pub fn leak(mut self) -> Option<RawHandle> {
        if self.closed {
            return None;
        }
        self.closed = true;
        Some(self.handle.raw)
    }

    fn resolve_access(
        &self,
        access: DuplicateAccess,
    ) -> NativeResult<(DuplicateAccess, AccessMask)> {
        match access {
            DuplicateAccess::SameAccess => Ok((access, self.handle.granted)),
            DuplicateAccess::Rights(mask) => {
                let validated = AccessDescriptor::validate(mask, self.handle.kind)?;
                Ok((
                    DuplicateAccess::Rights(validated.requested()),
                    validated.effective(),
                ))
            }
        }
    }

    /// Duplicate into the current process, producing an independently
    /// owned guard for the same kernel object
    pub fn duplicate(&self, access: DuplicateAccess, inheritable: bool) -> NativeResult<Self>
    where
        O: Clone,
    {
        self.ensure_open()?;
        let (access, granted) = self.resolve_access(access)?;
        let raw = self
            .ops
            .duplicate(&self.handle, None, access, inheritable)
            .map_err(|code| NativeError::call(CallSite::DuplicateHandle.name(), code))?;
        HandleGuard::new(raw, self.handle.kind, granted, self.ops.clone())
    }

    /// Duplicate into the process behind `target`
    pub fn duplicate_into(
        &self,
        target: &HandleGuard<O>,
        access: DuplicateAccess,
        inheritable: bool,
    ) -> NativeResult<RemoteHandle> {
        self.ensure_open()?;
        target.ensure_kind(ObjectKind::Process)?;
        let (access, granted) = self.resolve_access(access)?;
        let raw = self
            .ops
            .duplicate(&self.handle, Some(target.raw()), access, inheritable)
            .map_err(|code| NativeError::call(CallSite::DuplicateHandle.name(), code))?;
        Ok(RemoteHandle(NativeHandle::new(raw, self.handle.kind, granted)))
    }
}

impl<O: HandleOps> Drop for HandleGuard<O> {
    fn drop(&mut self) {
        if !self.closed {
            let _ = self.close();
        }
    }
}

impl<O: HandleOps> fmt::Debug for HandleGuard<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleGuard")
            .field("kind", &self.handle.kind)
            .field("raw", &format!("0x{:X}", self.handle.raw))
            .field("granted", &format!("0x{:X}", self.handle.granted))
            .field("closed", &self.closed)
            .finish()
    }
}
