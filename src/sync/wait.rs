//! Timed waits on synchronization objects
//!
//! An expired timeout is a [`WaitOutcome`], never an error. Only a failed
//! wait call becomes a [`NativeError`].

use crate::core::types::{ErrorCode, NativeError, NativeResult};
use crate::security::access::standard;
use crate::windows::types::{HandleGuard, HandleOps};
use crate::windows::utils::error_codes::CallSite;
use serde::Serialize;
use std::time::Duration;

/// The native "wait forever" sentinel
pub const INFINITE: u32 = 0xFFFF_FFFF;

pub const WAIT_OBJECT_0: u32 = 0x0000_0000;
pub const WAIT_ABANDONED: u32 = 0x0000_0080;
pub const WAIT_TIMEOUT: u32 = 0x0000_0102;
pub const WAIT_FAILED: u32 = 0xFFFF_FFFF;

/// How long a wait may block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitTimeout {
    Infinite,
    After(Duration),
}

impl WaitTimeout {
    /// Milliseconds as the wait functions take them.
    ///
    /// Finite timeouts saturate one below [`INFINITE`] so a long finite
    /// wait never turns into an unbounded one.
    pub fn as_millis(&self) -> u32 {
        match self {
            WaitTimeout::Infinite => INFINITE,
            WaitTimeout::After(duration) => duration.as_millis().min((INFINITE - 1) as u128) as u32,
        }
    }

    /// Returns immediately after sampling the object's state
    pub fn poll() -> Self {
        WaitTimeout::After(Duration::ZERO)
    }
}

impl From<Duration> for WaitTimeout {
    fn from(duration: Duration) -> Self {
        WaitTimeout::After(duration)
    }
}

impl From<Option<Duration>> for WaitTimeout {
    fn from(duration: Option<Duration>) -> Self {
        duration.map_or(WaitTimeout::Infinite, WaitTimeout::After)
    }
}

/// Result of a wait that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitOutcome {
    Signaled,
    /// A mutex owner exited without releasing it; the caller now owns it
    Abandoned,
    TimedOut,
}

impl WaitOutcome {
    /// Interpret a raw single-object wait result.
    ///
    /// `last_error` is read only when the wait itself failed.
    pub fn from_raw(raw: u32, last_error: impl FnOnce() -> u32) -> Result<Self, ErrorCode> {
        match raw {
            WAIT_OBJECT_0 => Ok(WaitOutcome::Signaled),
            WAIT_ABANDONED => Ok(WaitOutcome::Abandoned),
            WAIT_TIMEOUT => Ok(WaitOutcome::TimedOut),
            WAIT_FAILED => Err(CallSite::WaitForObject.code(last_error())),
            other => Err(ErrorCode::win32(other)),
        }
    }

    pub fn is_signaled(&self) -> bool {
        !matches!(self, WaitOutcome::TimedOut)
    }
}

/// Reject guards that cannot be waited on before touching the OS
pub fn check_waitable<O: HandleOps>(guard: &HandleGuard<O>) -> NativeResult<()> {
    if guard.is_closed() {
        return Err(NativeError::HandleClosed(guard.kind()));
    }
    if !guard.kind().is_waitable() {
        return Err(NativeError::invalid_access(
            guard.kind(),
            "object cannot be waited on",
        ));
    }
    // MAXIMUM_ALLOWED handles get SYNCHRONIZE whenever the object permits it
    if guard.granted() & (standard::SYNCHRONIZE | standard::MAXIMUM_ALLOWED) == 0 {
        return Err(NativeError::invalid_access(
            guard.kind(),
            "handle was opened without SYNCHRONIZE",
        ));
    }
    Ok(())
}

/// Wait through a caller-supplied wait function
pub fn wait_with<O, W, E>(
    guard: &HandleGuard<O>,
    timeout: WaitTimeout,
    wait: W,
    last_error: E,
) -> NativeResult<WaitOutcome>
where
    O: HandleOps,
    W: FnOnce(isize, u32) -> u32,
    E: FnOnce() -> u32,
{
    check_waitable(guard)?;
    let raw = wait(guard.raw(), timeout.as_millis());
    WaitOutcome::from_raw(raw, last_error)
        .map_err(|code| NativeError::call(CallSite::WaitForObject.name(), code))
}

#[cfg(windows)]
pub use self::native::wait_for;

#[cfg(windows)]
mod native {
    use super::*;
    use crate::windows::bindings::kernel32::last_error;
    use tracing::trace;
    use winapi::um::synchapi::WaitForSingleObject;
    use winapi::um::winnt::HANDLE;

    /// Block on a waitable object until it is signaled or `timeout` expires
    pub fn wait_for<O: HandleOps>(
        guard: &HandleGuard<O>,
        timeout: WaitTimeout,
    ) -> NativeResult<WaitOutcome> {
        let outcome = wait_with(
            guard,
            timeout,
            |raw, millis| unsafe { WaitForSingleObject(raw as HANDLE, millis) },
            last_error,
        )?;
        trace!(kind = %guard.kind(), ?outcome, "wait finished");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{ErrorKind, ObjectKind};
    use crate::windows::types::{DuplicateAccess, NativeHandle, RawHandle};

    struct NoopOps;

    impl HandleOps for NoopOps {
        fn close(&self, _handle: &NativeHandle) -> Result<(), ErrorCode> {
            Ok(())
        }

        fn duplicate(
            &self,
            _handle: &NativeHandle,
            _target: Option<RawHandle>,
            _access: DuplicateAccess,
            _inheritable: bool,
        ) -> Result<RawHandle, ErrorCode> {
            Ok(0x200)
        }
    }

    fn guard(kind: ObjectKind, granted: u32) -> HandleGuard<NoopOps> {
        HandleGuard::new(0x44, kind, granted, NoopOps).unwrap()
    }

    #[test]
    fn test_timeout_millis() {
        assert_eq!(WaitTimeout::Infinite.as_millis(), INFINITE);
        assert_eq!(WaitTimeout::After(Duration::from_millis(250)).as_millis(), 250);
        assert_eq!(WaitTimeout::poll().as_millis(), 0);
        let huge = WaitTimeout::After(Duration::from_secs(u64::MAX / 1_000));
        assert_eq!(huge.as_millis(), INFINITE - 1);
        assert_eq!(WaitTimeout::from(None), WaitTimeout::Infinite);
    }

    #[test]
    fn test_outcome_interpretation() {
        let no_error = || -> u32 { panic!("last error read for a successful wait") };
        assert_eq!(WaitOutcome::from_raw(WAIT_OBJECT_0, no_error), Ok(WaitOutcome::Signaled));
        assert_eq!(WaitOutcome::from_raw(WAIT_ABANDONED, no_error), Ok(WaitOutcome::Abandoned));
        assert_eq!(WaitOutcome::from_raw(WAIT_TIMEOUT, no_error), Ok(WaitOutcome::TimedOut));

        let failed = WaitOutcome::from_raw(WAIT_FAILED, || 6).unwrap_err();
        assert_eq!(failed.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_timeout_is_not_an_error() {
        let event = guard(ObjectKind::Event, standard::SYNCHRONIZE);
        let outcome = wait_with(&event, WaitTimeout::poll(), |_, _| WAIT_TIMEOUT, || 0).unwrap();
        assert_eq!(outcome, WaitOutcome::TimedOut);
        assert!(!outcome.is_signaled());
    }

    #[test]
    fn test_wait_passes_raw_handle_and_millis() {
        let event = guard(ObjectKind::Event, standard::SYNCHRONIZE);
        let outcome = wait_with(
            &event,
            WaitTimeout::After(Duration::from_millis(15)),
            |raw, millis| {
                assert_eq!(raw, 0x44);
                assert_eq!(millis, 15);
                WAIT_OBJECT_0
            },
            || 0,
        )
        .unwrap();
        assert_eq!(outcome, WaitOutcome::Signaled);
    }

    #[test]
    fn test_unwaitable_rejected_locally() {
        let token = guard(ObjectKind::Token, 0x8);
        let err =
            wait_with(&token, WaitTimeout::Infinite, |_, _| unreachable!(), || 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAccessCombination);

        let event = guard(ObjectKind::Event, 0x2);
        assert!(check_waitable(&event).is_err());
    }

    #[test]
    fn test_closed_guard_rejected() {
        let mut event = guard(ObjectKind::Event, standard::SYNCHRONIZE);
        event.close();
        assert!(matches!(
            check_waitable(&event),
            Err(NativeError::HandleClosed(ObjectKind::Event))
        ));
    }

    #[test]
    fn test_maximum_allowed_is_waitable() {
        let process = guard(ObjectKind::Process, standard::MAXIMUM_ALLOWED);
        assert!(check_waitable(&process).is_ok());
        let outcome = wait_with(&process, WaitTimeout::poll(), |_, _| WAIT_TIMEOUT, || 0).unwrap();
        assert_eq!(outcome, WaitOutcome::TimedOut);
    }
}
