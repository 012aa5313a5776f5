//! The "ask for size, allocate, ask for data" protocol
//!
//! Dozens of native query functions report their payload size through a
//! first call and fill a caller-supplied buffer on a second. The payload
//! can grow between the two calls, so the exchange is retried a bounded
//! number of times before it is reported as `Busy`.

use crate::config::QueryConfig;
use crate::core::types::{ErrorCode, NativeError, NativeResult};
use crate::windows::utils::error_codes::win32;
use tracing::{debug, trace};

/// Outcome of one step of a variable-length query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryResult<T> {
    Ready(T),
    /// The call needs at least this many bytes
    NeedsLargerBuffer(usize),
    Failed(ErrorCode),
}

impl<T> QueryResult<T> {
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> QueryResult<U> {
        match self {
            QueryResult::Ready(value) => QueryResult::Ready(f(value)),
            QueryResult::NeedsLargerBuffer(size) => QueryResult::NeedsLargerBuffer(size),
            QueryResult::Failed(code) => QueryResult::Failed(code),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, QueryResult::Ready(_))
    }

    /// Convert into a typed error attributed to `operation`
    pub fn into_result(self, operation: &str) -> NativeResult<T> {
        match self {
            QueryResult::Ready(value) => Ok(value),
            QueryResult::NeedsLargerBuffer(_) => Err(NativeError::call(
                operation,
                ErrorCode::win32(win32::ERROR_INSUFFICIENT_BUFFER),
            )),
            QueryResult::Failed(code) => Err(NativeError::call(operation, code)),
        }
    }
}

impl<T> From<Result<T, ErrorCode>> for QueryResult<T> {
    fn from(result: Result<T, ErrorCode>) -> Self {
        match result {
            Ok(value) => QueryResult::Ready(value),
            Err(code) => QueryResult::Failed(code),
        }
    }
}

/// Retry policy for growing-buffer queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrowingBufferQuery {
    max_retries: u32,
    margin_percent: u32,
}

impl Default for GrowingBufferQuery {
    fn default() -> Self {
        GrowingBufferQuery::new(Self::DEFAULT_MAX_RETRIES)
    }
}

impl GrowingBufferQuery {
    pub const DEFAULT_MAX_RETRIES: u32 = 4;
    pub const DEFAULT_MARGIN_PERCENT: u32 = 12;

    pub fn new(max_retries: u32) -> Self {
        GrowingBufferQuery {
            max_retries,
            margin_percent: Self::DEFAULT_MARGIN_PERCENT,
        }
    }

    pub fn with_margin(mut self, margin_percent: u32) -> Self {
        self.margin_percent = margin_percent;
        self
    }

    pub fn from_config(config: &QueryConfig) -> Self {
        GrowingBufferQuery::new(config.max_retries).with_margin(config.growth_margin_percent)
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn margin_percent(&self) -> u32 {
        self.margin_percent
    }

    /// Bytes to allocate for a reported size, never less than `required`
    pub fn allocation_size(&self, required: usize) -> usize {
        let padded = (required as u128) * (100 + self.margin_percent as u128) / 100;
        padded.min(usize::MAX as u128).max(required as u128) as usize
    }

    /// Run the probe/fill exchange.
    ///
    /// `probe` learns the required size, usually by calling with an empty
    /// buffer and reporting `NeedsLargerBuffer(n)`; `Ready(n)` is accepted
    /// from APIs that return the length directly. `fill` receives a buffer
    /// at least that large and returns the number of bytes written.
    ///
    /// At most `max_retries + 1` probes are issued. Every allocation is
    /// strictly larger than the previous one, and a `NeedsLargerBuffer`
    /// from `fill` is never surfaced: once retries run out the query
    /// fails with `Busy`.
    pub fn query<P, F>(&self, mut probe: P, mut fill: F) -> QueryResult<Vec<u8>>
    where
        P: FnMut() -> QueryResult<usize>,
        F: FnMut(&mut [u8]) -> QueryResult<usize>,
    {
        let mut previous: Option<usize> = None;
        let mut hint = 0usize;

        for attempt in 0..=self.max_retries {
            let reported = match probe() {
                QueryResult::Ready(size) | QueryResult::NeedsLargerBuffer(size) => size,
                QueryResult::Failed(code) => return QueryResult::Failed(code),
            };
            let required = reported.max(hint);
            if required == 0 {
                return QueryResult::Ready(Vec::new());
            }

            let mut size = self.allocation_size(required);
            if let Some(previous) = previous {
                size = size.max(previous.saturating_add(1));
            }
            previous = Some(size);
            trace!(attempt, required, size, "allocating query buffer");

            let mut buffer = vec![0u8; size];
            match fill(&mut buffer) {
                QueryResult::Ready(written) => {
                    buffer.truncate(written.min(size));
                    return QueryResult::Ready(buffer);
                }
                QueryResult::NeedsLargerBuffer(needed) => {
                    debug!(attempt, size, needed, "payload grew between calls, retrying");
                    hint = needed;
                }
                QueryResult::Failed(code) if code.is_insufficient_buffer() => {
                    debug!(attempt, size, %code, "payload grew between calls, retrying");
                }
                QueryResult::Failed(code) => return QueryResult::Failed(code),
            }
        }

        debug!(max_retries = self.max_retries, "growing-buffer query exhausted retries");
        QueryResult::Failed(ErrorCode::busy())
    }

    /// Run the exchange and decode the payload as `class`
    pub fn fetch<C, P, F>(&self, class: &C, probe: P, fill: F) -> NativeResult<C::Output>
    where
        C: super::InfoClass,
        P: FnMut() -> QueryResult<usize>,
        F: FnMut(&mut [u8]) -> QueryResult<usize>,
    {
        let payload = self.query(probe, fill).into_result(class.name())?;
        class.decode(&payload)
    }
}
