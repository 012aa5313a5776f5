//! Handle types shared by every object family

pub mod handle;

pub use handle::{
    CloseOutcome, DuplicateAccess, HandleGuard, HandleOps, NativeHandle, RawHandle, RemoteHandle,
    INVALID_HANDLE_VALUE,
};
