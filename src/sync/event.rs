//! Anonymous event objects

use crate::core::types::{NativeError, NativeResult, ObjectKind};
use crate::windows::bindings::kernel32::{last_error, Kernel32, OwnedHandle};
use crate::windows::types::{HandleGuard, RawHandle};
use crate::windows::utils::error_codes::CallSite;
use std::ptr;
use winapi::shared::minwindef::{BOOL, FALSE};
use winapi::um::synchapi::{CreateEventW, ResetEvent, SetEvent};
use winapi::um::winnt::HANDLE;

/// `EVENT_ALL_ACCESS`
pub const EVENT_ALL_ACCESS: u32 = 0x001F_0003;

/// Create an unnamed event
pub fn create_event(manual_reset: bool, initially_signaled: bool) -> NativeResult<OwnedHandle> {
    let raw = unsafe {
        CreateEventW(
            ptr::null_mut(),
            manual_reset as BOOL,
            initially_signaled as BOOL,
            ptr::null(),
        )
    };
    if raw.is_null() {
        return Err(NativeError::call(
            CallSite::CreateEvent.name(),
            CallSite::CreateEvent.code(last_error()),
        ));
    }
    HandleGuard::new(raw as RawHandle, ObjectKind::Event, EVENT_ALL_ACCESS, Kernel32)
}

fn signal(
    event: &OwnedHandle,
    site: CallSite,
    f: unsafe extern "system" fn(HANDLE) -> BOOL,
) -> NativeResult<()> {
    event.ensure_kind(ObjectKind::Event)?;
    if event.is_closed() {
        return Err(NativeError::HandleClosed(ObjectKind::Event));
    }
    if unsafe { f(event.raw() as HANDLE) } == FALSE {
        return Err(NativeError::call(site.name(), site.code(last_error())));
    }
    Ok(())
}

pub fn set_event(event: &OwnedHandle) -> NativeResult<()> {
    signal(event, CallSite::SetEvent, SetEvent)
}

pub fn reset_event(event: &OwnedHandle) -> NativeResult<()> {
    signal(event, CallSite::ResetEvent, ResetEvent)
}
