//! Job objects with validated resource limits

use super::cpu_rate::{CpuRateControl, ResourceLimitSpec};
use crate::core::types::{NativeError, NativeResult, ObjectKind};
use crate::security::access::job_rights;
use crate::windows::bindings::kernel32::{last_error, Kernel32, OwnedHandle};
use crate::windows::types::{CloseOutcome, HandleGuard, RawHandle};
use crate::windows::utils::error_codes::CallSite;
use crate::windows::utils::string_conv::string_to_wide;
use std::{mem, ptr};
use tracing::{debug, info};
use winapi::shared::minwindef::{DWORD, FALSE, LPVOID};
use winapi::um::jobapi2::{
    AssignProcessToJobObject, CreateJobObjectW, QueryInformationJobObject,
    SetInformationJobObject, TerminateJobObject,
};
use winapi::um::winnt::{HANDLE, JOBOBJECT_EXTENDED_LIMIT_INFORMATION};

/// `JOBOBJECTINFOCLASS` values used here
const EXTENDED_LIMIT_INFORMATION: DWORD = 9;
const CPU_RATE_CONTROL_INFORMATION: DWORD = 15;

const LIMIT_ACTIVE_PROCESS: DWORD = 0x0000_0008;
const LIMIT_JOB_MEMORY: DWORD = 0x0000_0200;

/// `JOBOBJECT_CPU_RATE_CONTROL_INFORMATION` with its union flattened
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
struct CpuRateControlInformation {
    control_flags: DWORD,
    value: DWORD,
}

/// An owned job object handle
#[derive(Debug)]
pub struct JobObject {
    guard: OwnedHandle,
    name: Option<String>,
}

impl JobObject {
    /// Create a job, optionally named.
    ///
    /// Opening an existing named job succeeds too; the OS hands back the
    /// existing object.
    pub fn create(name: Option<&str>) -> NativeResult<Self> {
        let wide = name.map(string_to_wide);
        let name_ptr = wide.as_ref().map_or(ptr::null(), |w| w.as_ptr());
        let raw = unsafe { CreateJobObjectW(ptr::null_mut(), name_ptr) };
        if raw.is_null() {
            return Err(NativeError::call(
                CallSite::CreateJobObject.name(),
                CallSite::CreateJobObject.code(last_error()),
            ));
        }
        let guard = HandleGuard::new(
            raw as RawHandle,
            ObjectKind::Job,
            job_rights::ALL_ACCESS,
            Kernel32,
        )?;
        debug!(name = ?name, raw = guard.raw(), "created job object");
        Ok(JobObject {
            guard,
            name: name.map(str::to_string),
        })
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn guard(&self) -> &OwnedHandle {
        &self.guard
    }

    fn raw(&self) -> NativeResult<HANDLE> {
        if self.guard.is_closed() {
            return Err(NativeError::HandleClosed(ObjectKind::Job));
        }
        Ok(self.guard.raw() as HANDLE)
    }

    /// Place a process under this job's limits
    pub fn assign(&self, process: &OwnedHandle) -> NativeResult<()> {
        process.ensure_kind(ObjectKind::Process)?;
        let ok = unsafe { AssignProcessToJobObject(self.raw()?, process.raw() as HANDLE) };
        if ok == FALSE {
            return Err(NativeError::call(
                CallSite::AssignProcessToJob.name(),
                CallSite::AssignProcessToJob.code(last_error()),
            ));
        }
        Ok(())
    }

    fn set_information<T>(&self, class: DWORD, info: &mut T) -> NativeResult<()> {
        let ok = unsafe {
            SetInformationJobObject(
                self.raw()?,
                class,
                info as *mut T as LPVOID,
                mem::size_of::<T>() as DWORD,
            )
        };
        if ok == FALSE {
            return Err(NativeError::call(
                format!("{}(class {})", CallSite::SetInformationJobObject.name(), class),
                CallSite::SetInformationJobObject.code(last_error()),
            ));
        }
        Ok(())
    }

    /// Apply every limit `spec` carries
    pub fn apply(&self, spec: &ResourceLimitSpec) -> NativeResult<()> {
        if let Some(cpu) = spec.cpu() {
            let mut info = CpuRateControlInformation {
                control_flags: cpu.flags(),
                value: cpu.packed_value(),
            };
            self.set_information(CPU_RATE_CONTROL_INFORMATION, &mut info)?;
        }

        if spec.has_extended_limits() {
            let mut info: JOBOBJECT_EXTENDED_LIMIT_INFORMATION = unsafe { mem::zeroed() };
            if let Some(limit) = spec.active_processes() {
                info.BasicLimitInformation.LimitFlags |= LIMIT_ACTIVE_PROCESS;
                info.BasicLimitInformation.ActiveProcessLimit = limit;
            }
            if let Some(bytes) = spec.job_memory() {
                info.BasicLimitInformation.LimitFlags |= LIMIT_JOB_MEMORY;
                info.JobMemoryLimit = bytes;
            }
            self.set_information(EXTENDED_LIMIT_INFORMATION, &mut info)?;
        }

        info!(job = ?self.name, "applied job limits");
        Ok(())
    }

    /// Read back the CPU-rate control currently in force
    pub fn cpu_rate(&self) -> NativeResult<CpuRateControl> {
        let mut info = CpuRateControlInformation::default();
        let mut returned: DWORD = 0;
        let ok = unsafe {
            QueryInformationJobObject(
                self.raw()?,
                CPU_RATE_CONTROL_INFORMATION,
                &mut info as *mut _ as LPVOID,
                mem::size_of::<CpuRateControlInformation>() as DWORD,
                &mut returned,
            )
        };
        if ok == FALSE {
            return Err(NativeError::call(
                CallSite::QueryInformationJobObject.name(),
                CallSite::QueryInformationJobObject.code(last_error()),
            ));
        }
        CpuRateControl::from_raw(info.control_flags, info.value)
    }

    /// Terminate every process in the job
    pub fn terminate(&self, exit_code: u32) -> NativeResult<()> {
        let ok = unsafe { TerminateJobObject(self.raw()?, exit_code) };
        if ok == FALSE {
            return Err(NativeError::call(
                CallSite::TerminateJobObject.name(),
                CallSite::TerminateJobObject.code(last_error()),
            ));
        }
        Ok(())
    }

    pub fn close(&mut self) -> CloseOutcome {
        self.guard.close()
    }
}
