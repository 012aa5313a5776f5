//! Simulated native backends shared by the integration tests

#![allow(dead_code)]

use native_guard::core::types::{ErrorCode, Luid};
use native_guard::process::{PrivilegeOps, SnapshotSource};
use native_guard::windows::types::{DuplicateAccess, HandleOps, NativeHandle, RawHandle};
use native_guard::windows::utils::error_codes::{win32, CallSite};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicIsize, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Records every close and duplicate issued through it
#[derive(Clone, Default)]
pub struct RecordingOps {
    closed: Arc<Mutex<Vec<RawHandle>>>,
    duplicated: Arc<AtomicUsize>,
    next_raw: Arc<AtomicIsize>,
    close_error: Option<u32>,
}

impl RecordingOps {
    pub fn new() -> Self {
        RecordingOps {
            next_raw: Arc::new(AtomicIsize::new(0x1000)),
            ..Default::default()
        }
    }

    /// Every close reports `code`
    pub fn failing_close(code: u32) -> Self {
        RecordingOps {
            close_error: Some(code),
            ..Self::new()
        }
    }

    pub fn closed(&self) -> Vec<RawHandle> {
        self.closed.lock().unwrap().clone()
    }

    pub fn close_count(&self) -> usize {
        self.closed.lock().unwrap().len()
    }

    pub fn duplicate_count(&self) -> usize {
        self.duplicated.load(Ordering::SeqCst)
    }
}

impl HandleOps for RecordingOps {
    fn close(&self, handle: &NativeHandle) -> Result<(), ErrorCode> {
        self.closed.lock().unwrap().push(handle.raw());
        match self.close_error {
            Some(code) => Err(CallSite::CloseHandle.code(code)),
            None => Ok(()),
        }
    }

    fn duplicate(
        &self,
        _handle: &NativeHandle,
        _target_process: Option<RawHandle>,
        _access: DuplicateAccess,
        _inheritable: bool,
    ) -> Result<RawHandle, ErrorCode> {
        self.duplicated.fetch_add(1, Ordering::SeqCst);
        Ok(self.next_raw.fetch_add(4, Ordering::SeqCst))
    }
}

/// Replays a fixed list of step results, then reports "no more files"
pub struct ScriptedSource<T> {
    steps: VecDeque<Result<T, ErrorCode>>,
    calls: Arc<AtomicUsize>,
}

impl<T> ScriptedSource<T> {
    pub fn new(steps: Vec<Result<T, ErrorCode>>) -> Self {
        ScriptedSource {
            steps: steps.into(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn records(entries: Vec<T>) -> Self {
        Self::new(entries.into_iter().map(Ok).collect())
    }

    /// Shared counter of native step calls
    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    fn step(&mut self) -> Result<T, ErrorCode> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.steps
            .pop_front()
            .unwrap_or_else(|| Err(CallSite::SnapshotStep.code(win32::ERROR_NO_MORE_FILES)))
    }
}

impl<T> SnapshotSource for ScriptedSource<T> {
    type Entry = T;

    fn first(&mut self, _snapshot: &NativeHandle) -> Result<T, ErrorCode> {
        self.step()
    }

    fn next(&mut self, _snapshot: &NativeHandle) -> Result<T, ErrorCode> {
        self.step()
    }
}

/// A token with a fixed set of held privileges
#[derive(Debug, Default, Clone)]
pub struct FakeToken {
    known: HashMap<String, Luid>,
    held: HashMap<Luid, bool>,
    pub set_calls: Vec<(Luid, bool)>,
    fail_disable: bool,
}

impl FakeToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name`; `held` is `None` when the token lacks it
    pub fn with(mut self, name: &str, low: u32, held: Option<bool>) -> Self {
        let luid = Luid::new(low, 0);
        self.known.insert(name.to_string(), luid);
        if let Some(enabled) = held {
            self.held.insert(luid, enabled);
        }
        self
    }

    /// Every attempt to disable a privilege fails
    pub fn failing_restore(mut self) -> Self {
        self.fail_disable = true;
        self
    }

    pub fn luid(&self, name: &str) -> Luid {
        self.known[name]
    }

    pub fn is_enabled(&self, name: &str) -> Option<bool> {
        self.held.get(&self.known[name]).copied()
    }

    pub fn snapshot(&self) -> HashMap<Luid, bool> {
        self.held.clone()
    }
}

impl PrivilegeOps for FakeToken {
    fn lookup_privilege(&mut self, name: &str) -> Result<Luid, ErrorCode> {
        self.known
            .get(name)
            .copied()
            .ok_or_else(|| CallSite::LookupPrivilegeValue.code(win32::ERROR_NO_SUCH_PRIVILEGE))
    }

    fn set_privilege(&mut self, luid: Luid, enabled: bool) -> Result<bool, ErrorCode> {
        self.set_calls.push((luid, enabled));
        if !enabled && self.fail_disable {
            return Err(CallSite::AdjustTokenPrivileges.code(win32::ERROR_ACCESS_DENIED));
        }
        match self.held.get_mut(&luid) {
            Some(state) => {
                let previous = *state;
                *state = enabled;
                Ok(previous)
            }
            None => Err(CallSite::AdjustTokenPrivileges.code(win32::ERROR_NOT_ALL_ASSIGNED)),
        }
    }
}
