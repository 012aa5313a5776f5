//! Translation of the three native error spaces into one taxonomy
//!
//! Win32 error codes, NTSTATUS values and HRESULTs are mapped onto
//! [`ErrorKind`]. The general tables below are deterministic and pure;
//! [`CallSite`] layers per-call-family overrides on top, because several
//! native functions report the same condition through a different code
//! than their siblings.

use crate::core::types::{CodeSpace, ErrorCode, ErrorKind, StatusCode};

/// Win32 error codes used by the mapping tables
pub mod win32 {
    pub const ERROR_SUCCESS: u32 = 0;
    pub const ERROR_INVALID_FUNCTION: u32 = 1;
    pub const ERROR_FILE_NOT_FOUND: u32 = 2;
    pub const ERROR_PATH_NOT_FOUND: u32 = 3;
    pub const ERROR_ACCESS_DENIED: u32 = 5;
    pub const ERROR_INVALID_HANDLE: u32 = 6;
    pub const ERROR_NO_MORE_FILES: u32 = 18;
    pub const ERROR_BAD_LENGTH: u32 = 24;
    pub const ERROR_SHARING_VIOLATION: u32 = 32;
    pub const ERROR_LOCK_VIOLATION: u32 = 33;
    pub const ERROR_NOT_SUPPORTED: u32 = 50;
    pub const ERROR_INVALID_PARAMETER: u32 = 87;
    pub const ERROR_CALL_NOT_IMPLEMENTED: u32 = 120;
    pub const ERROR_SEM_TIMEOUT: u32 = 121;
    pub const ERROR_INSUFFICIENT_BUFFER: u32 = 122;
    pub const ERROR_MOD_NOT_FOUND: u32 = 126;
    pub const ERROR_PROC_NOT_FOUND: u32 = 127;
    pub const ERROR_BUSY: u32 = 170;
    pub const ERROR_MORE_DATA: u32 = 234;
    pub const WAIT_TIMEOUT: u32 = 258;
    pub const ERROR_NO_MORE_ITEMS: u32 = 259;
    pub const ERROR_PARTIAL_COPY: u32 = 299;
    pub const ERROR_MR_MID_NOT_FOUND: u32 = 317;
    pub const ERROR_NOACCESS: u32 = 998;
    pub const ERROR_SERVICE_DOES_NOT_EXIST: u32 = 1060;
    pub const ERROR_SERVICE_CANNOT_ACCEPT_CTRL: u32 = 1061;
    pub const ERROR_NOT_FOUND: u32 = 1168;
    pub const ERROR_NOT_ALL_ASSIGNED: u32 = 1300;
    pub const ERROR_NO_SUCH_PRIVILEGE: u32 = 1313;
    pub const ERROR_PRIVILEGE_NOT_HELD: u32 = 1314;
    pub const ERROR_TIMEOUT: u32 = 1460;
}

/// NTSTATUS values used by the mapping tables
pub mod ntstatus {
    pub const STATUS_SUCCESS: u32 = 0x0000_0000;
    pub const STATUS_TIMEOUT: u32 = 0x0000_0102;
    pub const STATUS_NOT_ALL_ASSIGNED: u32 = 0x0000_0106;
    pub const STATUS_BUFFER_OVERFLOW: u32 = 0x8000_0005;
    pub const STATUS_PARTIAL_COPY: u32 = 0x8000_000D;
    pub const STATUS_NO_MORE_ENTRIES: u32 = 0x8000_001A;
    pub const STATUS_NOT_IMPLEMENTED: u32 = 0xC000_0002;
    pub const STATUS_INVALID_INFO_CLASS: u32 = 0xC000_0003;
    pub const STATUS_INFO_LENGTH_MISMATCH: u32 = 0xC000_0004;
    pub const STATUS_INVALID_CID: u32 = 0xC000_000B;
    pub const STATUS_ACCESS_DENIED: u32 = 0xC000_0022;
    pub const STATUS_BUFFER_TOO_SMALL: u32 = 0xC000_0023;
    pub const STATUS_OBJECT_NAME_NOT_FOUND: u32 = 0xC000_0034;
    pub const STATUS_SHARING_VIOLATION: u32 = 0xC000_0043;
    pub const STATUS_FILE_LOCK_CONFLICT: u32 = 0xC000_0054;
    pub const STATUS_NO_SUCH_PRIVILEGE: u32 = 0xC000_0060;
    pub const STATUS_PRIVILEGE_NOT_HELD: u32 = 0xC000_0061;
    pub const STATUS_NOT_SUPPORTED: u32 = 0xC000_00BB;
    pub const STATUS_NOT_FOUND: u32 = 0xC000_0225;
}

/// HRESULT values and facility helpers
pub mod hresult {
    pub const S_OK: u32 = 0x0000_0000;
    pub const E_NOTIMPL: u32 = 0x8000_4001;
    pub const E_ACCESSDENIED: u32 = 0x8007_0005;
    pub const FACILITY_WIN32: u32 = 7;
    pub const FACILITY_NT_BIT: u32 = 0x1000_0000;

    /// HRESULT_FROM_WIN32
    pub fn from_win32(code: u32) -> u32 {
        if code as i32 <= 0 {
            code
        } else {
            (code & 0x0000_FFFF) | (FACILITY_WIN32 << 16) | 0x8000_0000
        }
    }

    /// HRESULT_FROM_NT
    pub fn from_nt(status: u32) -> u32 {
        status | FACILITY_NT_BIT
    }

    pub fn facility(hr: u32) -> u32 {
        (hr >> 16) & 0x1FFF
    }
}

/// Stateless translator between native code spaces and [`ErrorKind`]
pub struct ErrorTranslator;

impl ErrorTranslator {
    /// Map a raw code from `space` onto the normalized taxonomy.
    ///
    /// Unknown values degrade to [`ErrorKind::Other`]; the raw value is
    /// kept by the surrounding [`ErrorCode`].
    pub fn translate(raw: u32, space: CodeSpace) -> ErrorKind {
        match space {
            CodeSpace::Win32 => Self::translate_win32(raw),
            CodeSpace::NtStatus => Self::translate_nt(raw),
            CodeSpace::Hresult => Self::translate_hresult(raw),
        }
    }

    fn translate_win32(code: u32) -> ErrorKind {
        use win32::*;
        match code {
            ERROR_ACCESS_DENIED | ERROR_PRIVILEGE_NOT_HELD => ErrorKind::AccessDenied,
            ERROR_FILE_NOT_FOUND
            | ERROR_PATH_NOT_FOUND
            | ERROR_NO_MORE_FILES
            | ERROR_MOD_NOT_FOUND
            | ERROR_PROC_NOT_FOUND
            | ERROR_NO_MORE_ITEMS
            | ERROR_SERVICE_DOES_NOT_EXIST
            | ERROR_NOT_FOUND
            | ERROR_NO_SUCH_PRIVILEGE => ErrorKind::NotFound,
            ERROR_INSUFFICIENT_BUFFER | ERROR_MORE_DATA => ErrorKind::InsufficientBuffer,
            ERROR_PARTIAL_COPY | ERROR_NOT_ALL_ASSIGNED => ErrorKind::PartialData,
            WAIT_TIMEOUT | ERROR_TIMEOUT | ERROR_SEM_TIMEOUT => ErrorKind::Timeout,
            ERROR_BUSY
            | ERROR_SHARING_VIOLATION
            | ERROR_LOCK_VIOLATION
            | ERROR_SERVICE_CANNOT_ACCEPT_CTRL => ErrorKind::Busy,
            ERROR_INVALID_FUNCTION | ERROR_NOT_SUPPORTED | ERROR_CALL_NOT_IMPLEMENTED => {
                ErrorKind::Unsupported
            }
            _ => ErrorKind::Other,
        }
    }

    fn translate_nt(status: u32) -> ErrorKind {
        use ntstatus::*;
        match status {
            STATUS_ACCESS_DENIED | STATUS_PRIVILEGE_NOT_HELD => ErrorKind::AccessDenied,
            STATUS_INVALID_CID
            | STATUS_OBJECT_NAME_NOT_FOUND
            | STATUS_NO_SUCH_PRIVILEGE
            | STATUS_NO_MORE_ENTRIES
            | STATUS_NOT_FOUND => ErrorKind::NotFound,
            STATUS_INFO_LENGTH_MISMATCH | STATUS_BUFFER_TOO_SMALL | STATUS_BUFFER_OVERFLOW => {
                ErrorKind::InsufficientBuffer
            }
            STATUS_PARTIAL_COPY | STATUS_NOT_ALL_ASSIGNED => ErrorKind::PartialData,
            STATUS_TIMEOUT => ErrorKind::Timeout,
            STATUS_SHARING_VIOLATION | STATUS_FILE_LOCK_CONFLICT => ErrorKind::Busy,
            STATUS_NOT_IMPLEMENTED | STATUS_NOT_SUPPORTED | STATUS_INVALID_INFO_CLASS => {
                ErrorKind::Unsupported
            }
            _ => ErrorKind::Other,
        }
    }

    fn translate_hresult(hr: u32) -> ErrorKind {
        if hr & hresult::FACILITY_NT_BIT != 0 {
            return Self::translate_nt(hr & !hresult::FACILITY_NT_BIT);
        }
        if hresult::facility(hr) == hresult::FACILITY_WIN32 {
            return Self::translate_win32(hr & 0xFFFF);
        }
        match hr {
            hresult::E_NOTIMPL => ErrorKind::Unsupported,
            _ => ErrorKind::Other,
        }
    }

    /// Convert an NTSTATUS into the Win32 code the system would report
    /// for it, mirroring `RtlNtStatusToDosError`.
    pub fn cross_translate(status: u32) -> u32 {
        use ntstatus::*;
        // FACILITY_NTWIN32 statuses carry the Win32 code in the low word
        if (status >> 16) & 0x0FFF == 0x0007 && status & 0xC000_0000 != 0 {
            return status & 0xFFFF;
        }
        match status {
            STATUS_SUCCESS => win32::ERROR_SUCCESS,
            STATUS_TIMEOUT => win32::WAIT_TIMEOUT,
            STATUS_NOT_ALL_ASSIGNED => win32::ERROR_NOT_ALL_ASSIGNED,
            STATUS_BUFFER_OVERFLOW => win32::ERROR_MORE_DATA,
            STATUS_PARTIAL_COPY => win32::ERROR_PARTIAL_COPY,
            STATUS_NO_MORE_ENTRIES => win32::ERROR_NO_MORE_ITEMS,
            STATUS_NOT_IMPLEMENTED => win32::ERROR_INVALID_FUNCTION,
            STATUS_INVALID_INFO_CLASS => win32::ERROR_INVALID_PARAMETER,
            STATUS_INFO_LENGTH_MISMATCH => win32::ERROR_BAD_LENGTH,
            STATUS_INVALID_CID => win32::ERROR_INVALID_PARAMETER,
            STATUS_ACCESS_DENIED => win32::ERROR_ACCESS_DENIED,
            STATUS_BUFFER_TOO_SMALL => win32::ERROR_INSUFFICIENT_BUFFER,
            STATUS_OBJECT_NAME_NOT_FOUND => win32::ERROR_FILE_NOT_FOUND,
            STATUS_SHARING_VIOLATION => win32::ERROR_SHARING_VIOLATION,
            STATUS_FILE_LOCK_CONFLICT => win32::ERROR_LOCK_VIOLATION,
            STATUS_NO_SUCH_PRIVILEGE => win32::ERROR_NO_SUCH_PRIVILEGE,
            STATUS_PRIVILEGE_NOT_HELD => win32::ERROR_PRIVILEGE_NOT_HELD,
            STATUS_NOT_SUPPORTED => win32::ERROR_NOT_SUPPORTED,
            STATUS_NOT_FOUND => win32::ERROR_NOT_FOUND,
            _ => win32::ERROR_MR_MID_NOT_FOUND,
        }
    }

    /// Whether `status` is a native "no more entries" signal
    pub fn is_end_of_enumeration(status: StatusCode) -> bool {
        match status {
            StatusCode::Win32(code) => {
                code == win32::ERROR_NO_MORE_FILES || code == win32::ERROR_NO_MORE_ITEMS
            }
            StatusCode::NtStatus(code) => code == ntstatus::STATUS_NO_MORE_ENTRIES,
            StatusCode::Hresult(hr) => {
                hr == hresult::from_win32(win32::ERROR_NO_MORE_FILES)
                    || hr == hresult::from_win32(win32::ERROR_NO_MORE_ITEMS)
            }
        }
    }
}

/// Native call families whose codes need site-specific classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallSite {
    OpenProcess,
    OpenThread,
    OpenProcessToken,
    LookupPrivilegeValue,
    LookupPrivilegeName,
    AdjustTokenPrivileges,
    GetTokenInformation,
    CreateSnapshot,
    SnapshotStep,
    DuplicateHandle,
    CloseHandle,
    CreateJobObject,
    AssignProcessToJob,
    QueryInformationJobObject,
    SetInformationJobObject,
    TerminateJobObject,
    QuerySystemInformation,
    WaitForObject,
    CreateEvent,
    SetEvent,
    ResetEvent,
    ReadProcessMemory,
}

impl CallSite {
    pub const ALL: [CallSite; 22] = [
        CallSite::OpenProcess,
        CallSite::OpenThread,
        CallSite::OpenProcessToken,
        CallSite::LookupPrivilegeValue,
        CallSite::LookupPrivilegeName,
        CallSite::AdjustTokenPrivileges,
        CallSite::GetTokenInformation,
        CallSite::CreateSnapshot,
        CallSite::SnapshotStep,
        CallSite::DuplicateHandle,
        CallSite::CloseHandle,
        CallSite::CreateJobObject,
        CallSite::AssignProcessToJob,
        CallSite::QueryInformationJobObject,
        CallSite::SetInformationJobObject,
        CallSite::TerminateJobObject,
        CallSite::QuerySystemInformation,
        CallSite::WaitForObject,
        CallSite::CreateEvent,
        CallSite::SetEvent,
        CallSite::ResetEvent,
        CallSite::ReadProcessMemory,
    ];

    /// Native function name, used as the operation in error messages
    pub fn name(&self) -> &'static str {
        match self {
            CallSite::OpenProcess => "OpenProcess",
            CallSite::OpenThread => "OpenThread",
            CallSite::OpenProcessToken => "OpenProcessToken",
            CallSite::LookupPrivilegeValue => "LookupPrivilegeValueW",
            CallSite::LookupPrivilegeName => "LookupPrivilegeNameW",
            CallSite::AdjustTokenPrivileges => "AdjustTokenPrivileges",
            CallSite::GetTokenInformation => "GetTokenInformation",
            CallSite::CreateSnapshot => "CreateToolhelp32Snapshot",
            CallSite::SnapshotStep => "Toolhelp32 First/Next",
            CallSite::DuplicateHandle => "DuplicateHandle",
            CallSite::CloseHandle => "CloseHandle",
            CallSite::CreateJobObject => "CreateJobObjectW",
            CallSite::AssignProcessToJob => "AssignProcessToJobObject",
            CallSite::QueryInformationJobObject => "QueryInformationJobObject",
            CallSite::SetInformationJobObject => "SetInformationJobObject",
            CallSite::TerminateJobObject => "TerminateJobObject",
            CallSite::QuerySystemInformation => "NtQuerySystemInformation",
            CallSite::WaitForObject => "WaitForSingleObject",
            CallSite::CreateEvent => "CreateEventW",
            CallSite::SetEvent => "SetEvent",
            CallSite::ResetEvent => "ResetEvent",
            CallSite::ReadProcessMemory => "ReadProcessMemory",
        }
    }

    /// The code space this family reports through
    pub fn space(&self) -> CodeSpace {
        match self {
            CallSite::QuerySystemInformation => CodeSpace::NtStatus,
            _ => CodeSpace::Win32,
        }
    }

    fn override_kind(&self, status: StatusCode) -> Option<ErrorKind> {
        use win32::*;
        match (self, status) {
            // No such process/thread id
            (
                CallSite::OpenProcess | CallSite::OpenThread,
                StatusCode::Win32(ERROR_INVALID_PARAMETER),
            ) => Some(ErrorKind::NotFound),
            // The token does not hold the privilege
            (CallSite::AdjustTokenPrivileges, StatusCode::Win32(ERROR_NOT_ALL_ASSIGNED)) => {
                Some(ErrorKind::NotFound)
            }
            (
                CallSite::GetTokenInformation | CallSite::QueryInformationJobObject,
                StatusCode::Win32(ERROR_BAD_LENGTH),
            ) => Some(ErrorKind::InsufficientBuffer),
            (CallSite::ReadProcessMemory, StatusCode::Win32(ERROR_NOACCESS)) => {
                Some(ErrorKind::PartialData)
            }
            (
                CallSite::DuplicateHandle
                | CallSite::CloseHandle
                | CallSite::WaitForObject
                | CallSite::TerminateJobObject
                | CallSite::SetEvent
                | CallSite::ResetEvent,
                StatusCode::Win32(ERROR_INVALID_HANDLE),
            ) => Some(ErrorKind::NotFound),
            (CallSite::CreateSnapshot, StatusCode::Win32(ERROR_BAD_LENGTH)) => {
                Some(ErrorKind::Busy)
            }
            _ => None,
        }
    }

    /// Classify a status reported by this call family
    pub fn translate(&self, status: StatusCode) -> ErrorCode {
        match self.override_kind(status) {
            Some(kind) => ErrorCode::with_kind(status, kind),
            None => ErrorCode::new(status),
        }
    }

    /// Classify a raw code in this family's native space
    pub fn code(&self, raw: u32) -> ErrorCode {
        self.translate(StatusCode::from_raw(raw, self.space()))
    }

    /// Classify an HRESULT that wraps this family's Win32 code
    pub fn code_from_hresult(&self, hr: u32) -> ErrorCode {
        if hr & 0x8000_0000 != 0 && hresult::facility(hr) == hresult::FACILITY_WIN32 {
            self.code(hr & 0xFFFF)
        } else {
            self.translate(StatusCode::Hresult(hr))
        }
    }
}
