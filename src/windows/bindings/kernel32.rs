//! Kernel32/advapi32 bindings for handle lifetime and opening objects

use crate::core::types::{
    AccessMask, ErrorCode, NativeError, NativeResult, ObjectKind, ProcessId, ThreadId,
};
use crate::security::access::ValidatedMask;
use crate::windows::types::handle::{
    DuplicateAccess, HandleGuard, HandleOps, NativeHandle, RawHandle,
};
use crate::windows::utils::error_codes::{win32, CallSite};
use std::ptr;
use winapi::shared::minwindef::{BOOL, FALSE, HKEY};
use winapi::um::errhandlingapi::GetLastError;
use winapi::um::handleapi::{CloseHandle, DuplicateHandle};
use winapi::um::processthreadsapi::{GetCurrentProcess, OpenProcess, OpenThread};
use winapi::um::winnt::{DUPLICATE_SAME_ACCESS, HANDLE};
use winapi::um::winreg::RegCloseKey;
use winapi::um::winsvc::{CloseServiceHandle, SC_HANDLE};

/// A guard released through the real Win32 close functions
pub type OwnedHandle = HandleGuard<Kernel32>;

/// The live Win32 backend for [`HandleOps`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Kernel32;

/// Read the calling thread's last-error value right after a failed call
pub fn last_error() -> u32 {
    unsafe { GetLastError() }
}

impl HandleOps for Kernel32 {
    fn close(&self, handle: &NativeHandle) -> Result<(), ErrorCode> {
        let raw = handle.raw();
        match handle.kind() {
            ObjectKind::Service => {
                if unsafe { CloseServiceHandle(raw as SC_HANDLE) } == FALSE {
                    return Err(CallSite::CloseHandle.code(last_error()));
                }
            }
            ObjectKind::RegistryKey => {
                // Registry calls return their status instead of setting last-error
                let status = unsafe { RegCloseKey(raw as HKEY) };
                if status != 0 {
                    return Err(CallSite::CloseHandle.code(status as u32));
                }
            }
            _ => {
                if unsafe { CloseHandle(raw as HANDLE) } == FALSE {
                    return Err(CallSite::CloseHandle.code(last_error()));
                }
            }
        }
        Ok(())
    }

    fn duplicate(
        &self,
        handle: &NativeHandle,
        target_process: Option<RawHandle>,
        access: DuplicateAccess,
        inheritable: bool,
    ) -> Result<RawHandle, ErrorCode> {
        if matches!(handle.kind(), ObjectKind::Service | ObjectKind::RegistryKey) {
            return Err(CallSite::DuplicateHandle.code(win32::ERROR_NOT_SUPPORTED));
        }

        let (desired, options) = match access {
            DuplicateAccess::SameAccess => (0, DUPLICATE_SAME_ACCESS),
            DuplicateAccess::Rights(mask) => (mask, 0),
        };

        unsafe {
            let current = GetCurrentProcess();
            let target = target_process.map(|raw| raw as HANDLE).unwrap_or(current);
            let mut duplicated: HANDLE = ptr::null_mut();
            let ok = DuplicateHandle(
                current,
                handle.raw() as HANDLE,
                target,
                &mut duplicated,
                desired,
                inheritable as BOOL,
                options,
            );
            if ok == FALSE {
                Err(CallSite::DuplicateHandle.code(last_error()))
            } else {
                Ok(duplicated as RawHandle)
            }
        }
    }
}

fn expect_kind(access: &ValidatedMask, expected: ObjectKind) -> NativeResult<AccessMask> {
    if access.kind() != expected {
        return Err(NativeError::WrongObjectKind {
            expected,
            actual: access.kind(),
        });
    }
    Ok(access.requested())
}

/// Open a process with a mask already checked by `AccessDescriptor`
pub fn open_process(pid: ProcessId, access: &ValidatedMask) -> NativeResult<OwnedHandle> {
    let mask = expect_kind(access, ObjectKind::Process)?;
    let raw = unsafe { OpenProcess(mask, FALSE, pid) };
    if raw.is_null() {
        let code = CallSite::OpenProcess.code(last_error());
        return Err(NativeError::call(format!("OpenProcess({})", pid), code));
    }
    HandleGuard::new(raw as RawHandle, ObjectKind::Process, access.effective(), Kernel32)
}

/// Open a thread with a mask already checked by `AccessDescriptor`
pub fn open_thread(tid: ThreadId, access: &ValidatedMask) -> NativeResult<OwnedHandle> {
    let mask = expect_kind(access, ObjectKind::Thread)?;
    let raw = unsafe { OpenThread(mask, FALSE, tid) };
    if raw.is_null() {
        let code = CallSite::OpenThread.code(last_error());
        return Err(NativeError::call(format!("OpenThread({})", tid), code));
    }
    HandleGuard::new(raw as RawHandle, ObjectKind::Thread, access.effective(), Kernel32)
}

/// The current-process pseudo handle; never closed
pub fn current_process() -> RawHandle {
    unsafe { GetCurrentProcess() as RawHandle }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ErrorKind;
    use crate::security::access::{process_rights, AccessDescriptor};

    #[test]
    #[cfg_attr(miri, ignore = "FFI not supported in Miri")]
    fn test_open_own_process() {
        let rights = process_rights::QUERY_LIMITED_INFORMATION;
        let access = AccessDescriptor::validate(rights, ObjectKind::Process).unwrap();
        let mut guard = open_process(std::process::id(), &access).unwrap();
        assert_eq!(guard.kind(), ObjectKind::Process);
        let copy = guard
            .duplicate(DuplicateAccess::SameAccess, false)
            .unwrap();
        assert_ne!(copy.raw(), guard.raw());
        assert_eq!(guard.close(), crate::windows::types::CloseOutcome::Closed);
    }

    #[test]
    #[cfg_attr(miri, ignore = "FFI not supported in Miri")]
    fn test_open_missing_process_is_not_found() {
        let rights = process_rights::QUERY_LIMITED_INFORMATION;
        let access = AccessDescriptor::validate(rights, ObjectKind::Process).unwrap();
        // PIDs are multiples of four; an odd value never names a process
        let err = open_process(0xFFFF_FFF1, &access).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_kind_mismatch_rejected_locally() {
        let access = AccessDescriptor::validate(0x1, ObjectKind::Job).unwrap();
        let err = open_process(4, &access).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAccessCombination);
    }
}
