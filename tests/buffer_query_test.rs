//! Integration tests for the growing-buffer query loop

use native_guard::core::types::{ErrorCode, ErrorKind};
use native_guard::windows::query::{GrowingBufferQuery, QueryResult, TokenInfo, TokenInfoClass};
use native_guard::windows::utils::error_codes::{win32, CallSite};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::cell::{Cell, RefCell};

/// A payload whose size changes on every probe, following `sizes`
struct GrowingPayload {
    sizes: Vec<usize>,
    probes: Cell<usize>,
    allocations: RefCell<Vec<(usize, usize)>>,
}

impl GrowingPayload {
    fn new(sizes: Vec<usize>) -> Self {
        GrowingPayload {
            sizes,
            probes: Cell::new(0),
            allocations: RefCell::new(Vec::new()),
        }
    }

    fn current(&self) -> usize {
        let index = self.probes.get().saturating_sub(1).min(self.sizes.len() - 1);
        self.sizes[index]
    }

    fn probe(&self) -> QueryResult<usize> {
        self.probes.set(self.probes.get() + 1);
        QueryResult::NeedsLargerBuffer(self.current())
    }

    /// The payload grows by one byte between probe and fill unless this
    /// is the last scripted size
    fn fill(&self, buffer: &mut [u8]) -> QueryResult<usize> {
        let reported = self.current();
        let actual = if self.probes.get() < self.sizes.len() {
            reported.saturating_add(buffer.len().saturating_sub(reported)).saturating_add(1)
        } else {
            reported
        };
        self.allocations.borrow_mut().push((reported, buffer.len()));
        if buffer.len() < actual {
            let code = CallSite::GetTokenInformation.code(win32::ERROR_INSUFFICIENT_BUFFER);
            QueryResult::Failed(code)
        } else {
            buffer[..actual].fill(0xAB);
            QueryResult::Ready(actual)
        }
    }
}

#[test]
fn test_stable_payload_single_round() {
    let payload = GrowingPayload::new(vec![64]);
    let result = GrowingBufferQuery::default().query(|| payload.probe(), |buf| payload.fill(buf));
    assert_eq!(result, QueryResult::Ready(vec![0xAB; 64]));
    assert_eq!(payload.probes.get(), 1);
}

#[test]
fn test_zero_size_is_empty_ready() {
    let mut filled = false;
    let result = GrowingBufferQuery::default().query(
        || QueryResult::NeedsLargerBuffer(0),
        |_| {
            filled = true;
            QueryResult::Ready(0)
        },
    );
    assert_eq!(result, QueryResult::Ready(Vec::new()));
    assert!(!filled);
}

#[test]
fn test_growth_is_absorbed_by_retries() {
    let payload = GrowingPayload::new(vec![16, 48, 48]);
    let result = GrowingBufferQuery::new(4).query(|| payload.probe(), |buf| payload.fill(buf));
    assert!(result.is_ready());
    assert_eq!(payload.probes.get(), 3);
}

#[test]
fn test_constant_growth_ends_busy() {
    let query = GrowingBufferQuery::new(2);
    let probes = Cell::new(0usize);
    let result = query.query(
        || {
            probes.set(probes.get() + 1);
            QueryResult::NeedsLargerBuffer(32)
        },
        |buf| QueryResult::<usize>::NeedsLargerBuffer(buf.len() + 1),
    );
    match result {
        QueryResult::Failed(code) => assert_eq!(code.kind(), ErrorKind::Busy),
        other => panic!("expected Busy, got {:?}", other),
    }
    assert_eq!(probes.get(), 3);
}

#[test]
fn test_hard_failure_is_not_retried() {
    let probes = Cell::new(0usize);
    let result = GrowingBufferQuery::default().query(
        || {
            probes.set(probes.get() + 1);
            QueryResult::NeedsLargerBuffer(8)
        },
        |_| QueryResult::Failed(ErrorCode::win32(win32::ERROR_ACCESS_DENIED)),
    );
    assert!(matches!(result, QueryResult::Failed(code) if code.kind() == ErrorKind::AccessDenied));
    assert_eq!(probes.get(), 1);
}

#[test]
fn test_fetch_decodes_typed_class() {
    let payload = 7u32.to_le_bytes();
    let info = GrowingBufferQuery::default()
        .fetch(
            &TokenInfoClass::SessionId,
            || QueryResult::NeedsLargerBuffer(payload.len()),
            |buf| {
                buf[..4].copy_from_slice(&payload);
                QueryResult::Ready(4)
            },
        )
        .unwrap();
    assert_eq!(info, TokenInfo::SessionId(7));
}

proptest! {
    #[test]
    fn prop_allocations_cover_reported_size(
        sizes in prop::collection::vec(1usize..4096, 1..8),
        max_retries in 0u32..8,
        margin in 0u32..=100,
    ) {
        let payload = GrowingPayload::new(sizes);
        let query = GrowingBufferQuery::new(max_retries).with_margin(margin);
        let _ = query.query(|| payload.probe(), |buf| payload.fill(buf));

        prop_assert!(payload.probes.get() as u32 <= max_retries + 1);
        let allocations = payload.allocations.borrow();
        for (reported, allocated) in allocations.iter() {
            prop_assert!(allocated >= reported);
        }
        for pair in allocations.windows(2) {
            prop_assert!(pair[1].1 > pair[0].1);
        }
    }

    #[test]
    fn prop_allocation_size_saturates(required in any::<usize>(), margin in 0u32..=100) {
        let size = GrowingBufferQuery::default().with_margin(margin).allocation_size(required);
        prop_assert!(size >= required);
    }
}
