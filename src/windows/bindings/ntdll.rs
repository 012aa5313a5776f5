//! NTDLL.dll bindings for status conversion and system queries

use crate::core::types::NativeResult;
use crate::windows::query::{GrowingBufferQuery, QueryResult};
use crate::windows::utils::error_codes::{ntstatus, CallSite};
use std::ptr;
use winapi::shared::ntdef::{NTSTATUS, PVOID, ULONG};

/// `SYSTEM_INFORMATION_CLASS` value for the process list
pub const SYSTEM_PROCESS_INFORMATION: u32 = 5;

#[link(name = "ntdll")]
extern "system" {
    fn RtlNtStatusToDosError(status: NTSTATUS) -> ULONG;

    fn NtQuerySystemInformation(
        system_info_class: ULONG,
        system_info: PVOID,
        system_info_length: ULONG,
        return_length: *mut ULONG,
    ) -> NTSTATUS;
}

/// Ask the system to convert an NTSTATUS into a Win32 code
pub fn cross_translate_native(status: u32) -> u32 {
    unsafe { RtlNtStatusToDosError(status as NTSTATUS) }
}

fn classify(status: NTSTATUS, returned: ULONG) -> QueryResult<usize> {
    match status as u32 {
        ntstatus::STATUS_SUCCESS => QueryResult::Ready(returned as usize),
        ntstatus::STATUS_INFO_LENGTH_MISMATCH
        | ntstatus::STATUS_BUFFER_TOO_SMALL
        | ntstatus::STATUS_BUFFER_OVERFLOW => QueryResult::NeedsLargerBuffer(returned as usize),
        other => QueryResult::Failed(CallSite::QuerySystemInformation.code(other)),
    }
}

/// Fetch a system information class through the growing-buffer protocol
pub fn query_system_information(class: u32, query: &GrowingBufferQuery) -> NativeResult<Vec<u8>> {
    query
        .query(
            || {
                let mut returned: ULONG = 0;
                let status =
                    unsafe { NtQuerySystemInformation(class, ptr::null_mut(), 0, &mut returned) };
                classify(status, returned)
            },
            |buffer| {
                let mut returned: ULONG = 0;
                let len = buffer.len().min(ULONG::MAX as usize) as ULONG;
                let data = buffer.as_mut_ptr() as PVOID;
                let status = unsafe { NtQuerySystemInformation(class, data, len, &mut returned) };
                classify(status, returned)
            },
        )
        .into_result(CallSite::QuerySystemInformation.name())
}

/// Count records in a `SYSTEM_PROCESS_INFORMATION` chain
pub fn count_process_records(payload: &[u8]) -> usize {
    let mut offset = 0usize;
    let mut count = 0usize;
    while let Some(next) = offset
        .checked_add(4)
        .and_then(|end| payload.get(offset..end))
    {
        count += 1;
        let next = u32::from_le_bytes([next[0], next[1], next[2], next[3]]) as usize;
        if next == 0 {
            break;
        }
        match offset.checked_add(next) {
            Some(following) => offset = following,
            None => break,
        }
    }
    count
}

/// Number of processes according to the kernel's own process list
pub fn system_process_count(query: &GrowingBufferQuery) -> NativeResult<usize> {
    let payload = query_system_information(SYSTEM_PROCESS_INFORMATION, query)?;
    Ok(count_process_records(&payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::windows::utils::error_codes::ErrorTranslator;

    #[test]
    #[cfg_attr(miri, ignore = "FFI not supported in Miri")]
    fn test_native_cross_translation_agrees() {
        for status in [
            ntstatus::STATUS_SUCCESS,
            ntstatus::STATUS_ACCESS_DENIED,
            ntstatus::STATUS_INFO_LENGTH_MISMATCH,
            ntstatus::STATUS_NO_SUCH_PRIVILEGE,
            ntstatus::STATUS_PARTIAL_COPY,
        ] {
            assert_eq!(
                cross_translate_native(status),
                ErrorTranslator::cross_translate(status),
                "status 0x{:08X}",
                status
            );
        }
    }

    #[test]
    #[cfg_attr(miri, ignore = "FFI not supported in Miri")]
    fn test_system_process_count() {
        let count = system_process_count(&GrowingBufferQuery::default()).unwrap();
        assert!(count > 1);
    }

    #[test]
    fn test_count_process_records() {
        let mut payload = vec![0u8; 24];
        payload[0..4].copy_from_slice(&8u32.to_le_bytes());
        payload[8..12].copy_from_slice(&8u32.to_le_bytes());
        assert_eq!(count_process_records(&payload), 3);
        assert_eq!(count_process_records(&[]), 0);
    }

    #[test]
    fn test_count_stops_on_malformed_chain() {
        let mut payload = vec![0u8; 16];
        payload[0..4].copy_from_slice(&u32::MAX.to_le_bytes());
        assert_eq!(count_process_records(&payload), 1);

        // Offset leaves fewer than four bytes for the next header
        payload[0..4].copy_from_slice(&14u32.to_le_bytes());
        assert_eq!(count_process_records(&payload), 1);
    }
}
