//! Offloading blocking native calls from an async runtime
//!
//! Every open, query and enumeration step may block on kernel
//! synchronization. Async callers hand the whole sequence to tokio's
//! blocking pool instead of running it on a reactor thread.

use crate::core::types::{NativeError, NativeResult};

/// Run `f` on the blocking pool and wait for its result
pub async fn run_blocking<F, T>(f: F) -> NativeResult<T>
where
    F: FnOnce() -> NativeResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(NativeError::from)?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ErrorCode;

    #[tokio::test]
    async fn test_run_blocking_returns_value() {
        let value = run_blocking(|| Ok(21 * 2)).await.unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_run_blocking_propagates_error() {
        let result: NativeResult<()> =
            run_blocking(|| Err(NativeError::call("OpenProcess", ErrorCode::win32(5)))).await;
        assert!(matches!(result, Err(NativeError::Call { .. })));
    }

    #[tokio::test]
    async fn test_run_blocking_panic_becomes_join_error() {
        let result: NativeResult<()> = run_blocking(|| panic!("native call blew up")).await;
        assert!(matches!(result, Err(NativeError::TaskJoin(_))));
    }
}
