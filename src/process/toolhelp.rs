//! ToolHelp32 snapshot sources for processes, threads and modules

use super::entries::{filter_by_name, ModuleEntry, ProcessEntry, ThreadEntry};
use super::snapshot::{EnumerationCursor, SnapshotSource};
use crate::core::types::{ErrorCode, ErrorKind, NativeResult, ProcessId};
use crate::windows::bindings::kernel32::{last_error, Kernel32};
use crate::windows::types::{NativeHandle, RawHandle};
use crate::windows::utils::error_codes::CallSite;
use crate::windows::utils::string_conv::{ansi_to_string, extract_filename};
use std::mem;
use tracing::debug;
use winapi::shared::minwindef::{BOOL, FALSE};
use winapi::um::handleapi::INVALID_HANDLE_VALUE;
use winapi::um::tlhelp32::{
    CreateToolhelp32Snapshot, Module32First, Module32Next, Process32First, Process32Next,
    Thread32First, Thread32Next, MODULEENTRY32, PROCESSENTRY32, TH32CS_SNAPMODULE,
    TH32CS_SNAPMODULE32, TH32CS_SNAPPROCESS, TH32CS_SNAPTHREAD, THREADENTRY32,
};
use winapi::um::winnt::HANDLE;

/// Module snapshots fail with ERROR_BAD_LENGTH while the loader is busy
const MODULE_SNAPSHOT_ATTEMPTS: u32 = 3;

pub type ProcessCursor = EnumerationCursor<ProcessSource, Kernel32>;
pub type ThreadCursor = EnumerationCursor<ThreadSource, Kernel32>;
pub type ModuleCursor = EnumerationCursor<ModuleSource, Kernel32>;

fn create_snapshot(flags: u32, pid: ProcessId) -> Result<RawHandle, ErrorCode> {
    let raw = unsafe { CreateToolhelp32Snapshot(flags, pid) };
    if raw == INVALID_HANDLE_VALUE || raw.is_null() {
        Err(CallSite::CreateSnapshot.code(last_error()))
    } else {
        Ok(raw as RawHandle)
    }
}

/// Run one First/Next call on a zeroed, size-stamped record
fn step<T>(
    snapshot: &NativeHandle,
    call: unsafe extern "system" fn(HANDLE, *mut T) -> BOOL,
    stamp: impl FnOnce(&mut T),
) -> Result<T, ErrorCode> {
    let mut record: T = unsafe { mem::zeroed() };
    stamp(&mut record);
    if unsafe { call(snapshot.raw() as HANDLE, &mut record) } == FALSE {
        return Err(CallSite::SnapshotStep.code(last_error()));
    }
    Ok(record)
}

#[derive(Debug, Default)]
pub struct ProcessSource;

impl ProcessSource {
    fn convert(record: PROCESSENTRY32) -> ProcessEntry {
        ProcessEntry {
            pid: record.th32ProcessID,
            parent_pid: record.th32ParentProcessID,
            thread_count: record.cntThreads,
            base_priority: record.pcPriClassBase,
            name: ansi_to_string(&record.szExeFile),
        }
    }

    fn stamp(record: &mut PROCESSENTRY32) {
        record.dwSize = mem::size_of::<PROCESSENTRY32>() as u32;
    }
}

impl SnapshotSource for ProcessSource {
    type Entry = ProcessEntry;

    fn first(&mut self, snapshot: &NativeHandle) -> Result<ProcessEntry, ErrorCode> {
        step(snapshot, Process32First, Self::stamp).map(Self::convert)
    }

    fn next(&mut self, snapshot: &NativeHandle) -> Result<ProcessEntry, ErrorCode> {
        step(snapshot, Process32Next, Self::stamp).map(Self::convert)
    }
}

/// Threads, optionally restricted to one owner
#[derive(Debug, Default)]
pub struct ThreadSource {
    owner: Option<ProcessId>,
}

impl ThreadSource {
    fn stamp(record: &mut THREADENTRY32) {
        record.dwSize = mem::size_of::<THREADENTRY32>() as u32;
    }

    fn convert(record: THREADENTRY32) -> ThreadEntry {
        ThreadEntry {
            tid: record.th32ThreadID,
            owner_pid: record.th32OwnerProcessID,
            base_priority: record.tpBasePri,
        }
    }

    /// The thread snapshot is always system-wide; skip foreign records
    fn read(
        &self,
        snapshot: &NativeHandle,
        mut call: unsafe extern "system" fn(HANDLE, *mut THREADENTRY32) -> BOOL,
    ) -> Result<ThreadEntry, ErrorCode> {
        loop {
            let entry = step(snapshot, call, Self::stamp).map(Self::convert)?;
            match self.owner {
                Some(owner) if entry.owner_pid != owner => call = Thread32Next,
                _ => return Ok(entry),
            }
        }
    }
}

impl SnapshotSource for ThreadSource {
    type Entry = ThreadEntry;

    fn first(&mut self, snapshot: &NativeHandle) -> Result<ThreadEntry, ErrorCode> {
        self.read(snapshot, Thread32First)
    }

    fn next(&mut self, snapshot: &NativeHandle) -> Result<ThreadEntry, ErrorCode> {
        self.read(snapshot, Thread32Next)
    }
}

#[derive(Debug, Default)]
pub struct ModuleSource;

impl ModuleSource {
    fn stamp(record: &mut MODULEENTRY32) {
        record.dwSize = mem::size_of::<MODULEENTRY32>() as u32;
    }

    fn convert(record: MODULEENTRY32) -> ModuleEntry {
        let path = ansi_to_string(&record.szExePath);
        let mut name = ansi_to_string(&record.szModule);
        if name.is_empty() {
            name = extract_filename(&path);
        }
        ModuleEntry {
            pid: record.th32ProcessID,
            name,
            path,
            base_address: record.modBaseAddr as usize,
            size: record.modBaseSize,
        }
    }
}

impl SnapshotSource for ModuleSource {
    type Entry = ModuleEntry;

    fn first(&mut self, snapshot: &NativeHandle) -> Result<ModuleEntry, ErrorCode> {
        step(snapshot, Module32First, Self::stamp).map(Self::convert)
    }

    fn next(&mut self, snapshot: &NativeHandle) -> Result<ModuleEntry, ErrorCode> {
        step(snapshot, Module32Next, Self::stamp).map(Self::convert)
    }
}

/// Snapshot every running process
pub fn processes() -> NativeResult<ProcessCursor> {
    EnumerationCursor::open(
        || create_snapshot(TH32CS_SNAPPROCESS, 0),
        Kernel32,
        ProcessSource,
    )
}

/// Snapshot threads, all of them or those owned by `owner`
pub fn threads(owner: Option<ProcessId>) -> NativeResult<ThreadCursor> {
    EnumerationCursor::open(
        || create_snapshot(TH32CS_SNAPTHREAD, 0),
        Kernel32,
        ThreadSource { owner },
    )
}

/// Snapshot the modules loaded in `pid` (both bitnesses)
pub fn modules(pid: ProcessId) -> NativeResult<ModuleCursor> {
    let create = || {
        let mut attempt = 1;
        loop {
            match create_snapshot(TH32CS_SNAPMODULE | TH32CS_SNAPMODULE32, pid) {
                Err(code)
                    if code.kind() == ErrorKind::Busy && attempt < MODULE_SNAPSHOT_ATTEMPTS =>
                {
                    debug!(pid, attempt, "module snapshot busy, retrying");
                    attempt += 1;
                }
                other => return other,
            }
        }
    };
    EnumerationCursor::open(create, Kernel32, ModuleSource)
}

/// All processes whose image name matches `name`, ignoring case
pub fn find_processes_by_name(name: &str) -> NativeResult<Vec<ProcessEntry>> {
    filter_by_name(processes()?, name)
}
