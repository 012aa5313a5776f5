//! Lazy, single-pass enumeration over a point-in-time system snapshot
//!
//! A cursor moves `Created -> Iterating -> Exhausted`. The native "no more
//! entries" signal ends iteration normally; any other failure is yielded
//! once and leaves the cursor unusable. The snapshot handle is released as
//! soon as the cursor is exhausted or failed, or when it is dropped.

use crate::core::types::{ErrorCode, NativeError, NativeResult, ObjectKind};
use crate::windows::types::{HandleGuard, HandleOps, NativeHandle, RawHandle};
use crate::windows::utils::error_codes::CallSite;
use std::iter::FusedIterator;
use tracing::{debug, trace};

/// Produces fixed-layout records from an open snapshot
pub trait SnapshotSource {
    type Entry;

    /// Read the first record
    fn first(&mut self, snapshot: &NativeHandle) -> Result<Self::Entry, ErrorCode>;

    /// Read the record after the previous one
    fn next(&mut self, snapshot: &NativeHandle) -> Result<Self::Entry, ErrorCode>;
}

/// Position of a cursor in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// Snapshot open, nothing read yet
    Created,
    Iterating,
    /// The native "no more entries" signal was seen
    Exhausted,
    /// A step failed; the snapshot must be taken again
    Failed,
}

/// Owns a snapshot handle and walks its records in order
pub struct EnumerationCursor<S: SnapshotSource, O: HandleOps> {
    snapshot: Option<HandleGuard<O>>,
    source: S,
    state: CursorState,
    yielded: usize,
}

impl<S: SnapshotSource, O: HandleOps> EnumerationCursor<S, O> {
    /// Wrap an already-open snapshot handle
    pub fn new(snapshot: HandleGuard<O>, source: S) -> NativeResult<Self> {
        snapshot.ensure_kind(ObjectKind::Snapshot)?;
        Ok(EnumerationCursor {
            snapshot: Some(snapshot),
            source,
            state: CursorState::Created,
            yielded: 0,
        })
    }

    /// Take a snapshot through `create` and wrap it
    pub fn open<F>(create: F, ops: O, source: S) -> NativeResult<Self>
    where
        F: FnOnce() -> Result<RawHandle, ErrorCode>,
    {
        let raw =
            create().map_err(|code| NativeError::call(CallSite::CreateSnapshot.name(), code))?;
        let guard = HandleGuard::new(raw, ObjectKind::Snapshot, 0, ops)?;
        Self::new(guard, source)
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    /// Records produced so far
    pub fn yielded(&self) -> usize {
        self.yielded
    }

    /// Whether the snapshot handle is still held
    pub fn holds_snapshot(&self) -> bool {
        self.snapshot.is_some()
    }

    /// Read the next record.
    ///
    /// Returns `Ok(None)` once exhausted, without touching the snapshot
    /// again. After a failure every call returns `EnumerationAborted`.
    pub fn advance(&mut self) -> NativeResult<Option<S::Entry>> {
        match self.state {
            CursorState::Exhausted => return Ok(None),
            CursorState::Failed => return Err(NativeError::EnumerationAborted),
            CursorState::Created | CursorState::Iterating => {}
        }
        let Some(guard) = self.snapshot.as_ref() else {
            self.state = CursorState::Exhausted;
            return Ok(None);
        };

        let step = if self.state == CursorState::Created {
            self.source.first(guard.handle())
        } else {
            self.source.next(guard.handle())
        };

        match step {
            Ok(entry) => {
                self.state = CursorState::Iterating;
                self.yielded += 1;
                Ok(Some(entry))
            }
            Err(code) if code.is_end_of_enumeration() => {
                trace!(yielded = self.yielded, "snapshot exhausted");
                self.state = CursorState::Exhausted;
                self.release();
                Ok(None)
            }
            Err(code) => {
                debug!(yielded = self.yielded, %code, "snapshot step failed");
                self.state = CursorState::Failed;
                self.release();
                Err(NativeError::call(CallSite::SnapshotStep.name(), code))
            }
        }
    }

    fn release(&mut self) {
        if let Some(mut guard) = self.snapshot.take() {
            guard.close();
        }
    }
}

impl<S: SnapshotSource, O: HandleOps> Iterator for EnumerationCursor<S, O> {
    type Item = NativeResult<S::Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state == CursorState::Failed {
            return None;
        }
        self.advance().transpose()
    }
}

impl<S: SnapshotSource, O: HandleOps> FusedIterator for EnumerationCursor<S, O> {}
