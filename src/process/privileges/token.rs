//! Access tokens: typed queries and privilege adjustment

use super::session::PrivilegeOps;
use crate::core::types::{ErrorCode, Luid, NativeError, NativeResult, ObjectKind, PrivilegeEntry};
use crate::security::access::ValidatedMask;
use crate::windows::bindings::kernel32::{last_error, Kernel32, OwnedHandle};
use crate::windows::query::{GrowingBufferQuery, InfoClass, QueryResult, TokenInfo, TokenInfoClass};
use crate::windows::types::{HandleGuard, RawHandle};
use crate::windows::utils::error_codes::{win32, CallSite};
use crate::windows::utils::string_conv::{string_to_wide, wide_bytes_to_string};
use std::collections::HashMap;
use std::sync::Mutex;
use std::{mem, ptr};
use tracing::trace;
use winapi::shared::minwindef::{DWORD, FALSE, LPVOID};
use winapi::um::securitybaseapi::{AdjustTokenPrivileges, GetTokenInformation};
use winapi::um::winbase::{LookupPrivilegeNameW, LookupPrivilegeValueW};
use winapi::um::winnt::{HANDLE, LUID, LUID_AND_ATTRIBUTES, SE_PRIVILEGE_ENABLED, TOKEN_PRIVILEGES};
use ::windows::Win32::Foundation::HANDLE as WinHandle;
use ::windows::Win32::Security::TOKEN_ACCESS_MASK;
use ::windows::Win32::System::Threading::{GetCurrentProcess, OpenProcessToken};

lazy_static::lazy_static! {
    /// Privilege LUIDs are fixed until reboot
    static ref LUID_CACHE: Mutex<HashMap<String, Luid>> = Mutex::new(HashMap::new());
    static ref NAME_CACHE: Mutex<HashMap<Luid, String>> = Mutex::new(HashMap::new());
}

fn cached_luid(name: &str) -> Option<Luid> {
    let cache = LUID_CACHE.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    cache.get(name).copied()
}

fn cache_luid(name: &str, luid: Luid) {
    let mut cache = LUID_CACHE.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    cache.insert(name.to_string(), luid);
}

/// An open access token
#[derive(Debug)]
pub struct Token {
    guard: OwnedHandle,
}

impl Token {
    fn open(process: RawHandle, access: &ValidatedMask) -> NativeResult<Self> {
        if access.kind() != ObjectKind::Token {
            return Err(NativeError::WrongObjectKind {
                expected: ObjectKind::Token,
                actual: access.kind(),
            });
        }
        let mut raw = WinHandle(0);
        let desired = TOKEN_ACCESS_MASK(access.requested());
        unsafe { OpenProcessToken(WinHandle(process), desired, &mut raw) }.map_err(|err| {
            let site = CallSite::OpenProcessToken;
            NativeError::call(site.name(), site.code_from_hresult(err.code().0 as u32))
        })?;
        let guard = HandleGuard::new(raw.0, ObjectKind::Token, access.effective(), Kernel32)?;
        Ok(Token { guard })
    }

    /// The token of the calling process
    pub fn open_current(access: &ValidatedMask) -> NativeResult<Self> {
        let current = unsafe { GetCurrentProcess() };
        Self::open(current.0, access)
    }

    /// The primary token of the process behind `process`
    pub fn open_for_process(process: &OwnedHandle, access: &ValidatedMask) -> NativeResult<Self> {
        process.ensure_kind(ObjectKind::Process)?;
        Self::open(process.raw(), access)
    }

    pub fn guard(&self) -> &OwnedHandle {
        &self.guard
    }

    fn raw(&self) -> HANDLE {
        self.guard.raw() as HANDLE
    }

    fn classify(ok: i32, returned: DWORD) -> QueryResult<usize> {
        if ok != FALSE {
            return QueryResult::Ready(returned as usize);
        }
        let code = CallSite::GetTokenInformation.code(last_error());
        if code.is_insufficient_buffer() {
            QueryResult::NeedsLargerBuffer(returned as usize)
        } else {
            QueryResult::Failed(code)
        }
    }

    /// Run a typed `GetTokenInformation` query
    pub fn query(
        &self,
        class: TokenInfoClass,
        query: &GrowingBufferQuery,
    ) -> NativeResult<TokenInfo> {
        self.guard.ensure_kind(ObjectKind::Token)?;
        let id = class.class_id();
        query.fetch(
            &class,
            || {
                let mut returned: DWORD = 0;
                let ok = unsafe {
                    GetTokenInformation(self.raw(), id, ptr::null_mut(), 0, &mut returned)
                };
                Self::classify(ok, returned)
            },
            |buffer| {
                let mut returned: DWORD = 0;
                let ok = unsafe {
                    GetTokenInformation(
                        self.raw(),
                        id,
                        buffer.as_mut_ptr() as LPVOID,
                        buffer.len() as DWORD,
                        &mut returned,
                    )
                };
                Self::classify(ok, returned)
            },
        )
    }

    /// Every privilege the token holds
    pub fn privileges(&self, query: &GrowingBufferQuery) -> NativeResult<Vec<PrivilegeEntry>> {
        match self.query(TokenInfoClass::Privileges, query)? {
            TokenInfo::Privileges(entries) => Ok(entries),
            _ => Err(NativeError::malformed(
                TokenInfoClass::Privileges.name(),
                "unexpected payload variant",
            )),
        }
    }
}

impl PrivilegeOps for Token {
    fn lookup_privilege(&mut self, name: &str) -> Result<Luid, ErrorCode> {
        if let Some(luid) = cached_luid(name) {
            return Ok(luid);
        }
        let wide = string_to_wide(name);
        let mut luid = LUID {
            LowPart: 0,
            HighPart: 0,
        };
        if unsafe { LookupPrivilegeValueW(ptr::null(), wide.as_ptr(), &mut luid) } == FALSE {
            return Err(CallSite::LookupPrivilegeValue.code(last_error()));
        }
        let luid = Luid::new(luid.LowPart, luid.HighPart);
        cache_luid(name, luid);
        Ok(luid)
    }

    fn set_privilege(&mut self, luid: Luid, enabled: bool) -> Result<bool, ErrorCode> {
        let mut new_state = TOKEN_PRIVILEGES {
            PrivilegeCount: 1,
            Privileges: [LUID_AND_ATTRIBUTES {
                Luid: LUID {
                    LowPart: luid.low,
                    HighPart: luid.high,
                },
                Attributes: if enabled { SE_PRIVILEGE_ENABLED } else { 0 },
            }],
        };
        let mut previous: TOKEN_PRIVILEGES = unsafe { mem::zeroed() };
        let mut returned: DWORD = 0;

        let ok = unsafe {
            AdjustTokenPrivileges(
                self.raw(),
                FALSE,
                &mut new_state,
                mem::size_of::<TOKEN_PRIVILEGES>() as DWORD,
                &mut previous,
                &mut returned,
            )
        };
        // Success can still mean "nothing assigned"; the real answer is in last-error
        let error = last_error();
        if ok == FALSE || error == win32::ERROR_NOT_ALL_ASSIGNED {
            return Err(CallSite::AdjustTokenPrivileges.code(error));
        }

        // An empty previous state means the privilege already had the requested state
        let previously_enabled = if previous.PrivilegeCount == 0 {
            enabled
        } else {
            previous.Privileges[0].Attributes & SE_PRIVILEGE_ENABLED != 0
        };
        trace!(%luid, enabled, previously_enabled, "privilege adjusted");
        Ok(previously_enabled)
    }
}

/// The programmatic name of a privilege LUID, e.g. `SeDebugPrivilege`
pub fn privilege_name(luid: Luid, query: &GrowingBufferQuery) -> NativeResult<String> {
    {
        let names = NAME_CACHE.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(name) = names.get(&luid) {
            return Ok(name.clone());
        }
    }

    let classify = |ok: i32, chars: DWORD| {
        if ok != FALSE {
            return QueryResult::Ready(chars as usize * 2);
        }
        let code = CallSite::LookupPrivilegeName.code(last_error());
        if code.is_insufficient_buffer() {
            QueryResult::NeedsLargerBuffer(chars as usize * 2)
        } else {
            QueryResult::Failed(code)
        }
    };
    let mut raw_luid = LUID {
        LowPart: luid.low,
        HighPart: luid.high,
    };

    let mut probe_luid = raw_luid;
    let payload = query
        .query(
            || {
                let mut chars: DWORD = 0;
                let ok = unsafe {
                    LookupPrivilegeNameW(ptr::null(), &mut probe_luid, ptr::null_mut(), &mut chars)
                };
                classify(ok, chars)
            },
            |buffer| {
                // Fill an aligned UTF-16 scratch buffer, then copy the bytes out
                let mut wide = vec![0u16; buffer.len() / 2];
                let mut chars = wide.len() as DWORD;
                let ok = unsafe {
                    LookupPrivilegeNameW(ptr::null(), &mut raw_luid, wide.as_mut_ptr(), &mut chars)
                };
                let result = classify(ok, chars);
                if result.is_ready() {
                    for (dst, unit) in buffer.chunks_exact_mut(2).zip(wide.iter()) {
                        dst.copy_from_slice(&unit.to_le_bytes());
                    }
                }
                result
            },
        )
        .into_result(CallSite::LookupPrivilegeName.name())?;
    let name = wide_bytes_to_string(&payload);
    let mut names = NAME_CACHE.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    names.insert(luid, name.clone());
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::PrivilegeState;
    use crate::process::privileges::session::PrivilegeSession;
    use crate::security::access::{token_rights, AccessDescriptor};

    fn query_access() -> ValidatedMask {
        AccessDescriptor::validate(token_rights::QUERY, ObjectKind::Token).unwrap()
    }

    #[test]
    #[cfg_attr(miri, ignore = "FFI not supported in Miri")]
    fn test_current_token_privileges() {
        let token = Token::open_current(&query_access()).unwrap();
        let privileges = token.privileges(&GrowingBufferQuery::default()).unwrap();
        assert!(!privileges.is_empty());
    }

    #[test]
    #[cfg_attr(miri, ignore = "FFI not supported in Miri")]
    fn test_lookup_and_name_round_trip() {
        let mut token = Token::open_current(&query_access()).unwrap();
        let luid = token.lookup_privilege("SeChangeNotifyPrivilege").unwrap();
        let name = privilege_name(luid, &GrowingBufferQuery::default()).unwrap();
        assert_eq!(name, "SeChangeNotifyPrivilege");
    }

    #[test]
    #[cfg_attr(miri, ignore = "FFI not supported in Miri")]
    fn test_unknown_privilege_name() {
        let mut token = Token::open_current(&query_access()).unwrap();
        let code = token.lookup_privilege("SeNonexistentPrivilege").unwrap_err();
        assert_eq!(code.kind(), crate::core::types::ErrorKind::NotFound);
    }

    #[test]
    #[cfg_attr(miri, ignore = "FFI not supported in Miri")]
    fn test_session_round_trip_on_live_token() {
        let access = AccessDescriptor::validate(
            token_rights::QUERY | token_rights::ADJUST_PRIVILEGES,
            ObjectKind::Token,
        )
        .unwrap();
        let query = GrowingBufferQuery::default();
        let mut token = Token::open_current(&access).unwrap();
        let luid = token.lookup_privilege("SeChangeNotifyPrivilege").unwrap();
        let before = crate::core::types::privilege_state(&token.privileges(&query).unwrap(), luid);

        let session = PrivilegeSession::acquire(&mut token, &["SeChangeNotifyPrivilege"]);
        assert!(session.is_fully_granted());
        session.release();

        let after = crate::core::types::privilege_state(&token.privileges(&query).unwrap(), luid);
        assert_eq!(before, after);
        assert_ne!(after, PrivilegeState::NotPresent);
    }
}
