//! Core module containing fundamental types for native-guard
//!
//! This module provides the foundational building blocks used throughout
//! the crate: the error taxonomy, object kinds, privilege records and the
//! helper for moving blocking native calls off an async runtime.

pub mod blocking;
pub mod types;

// Re-export commonly used types for convenience
pub use types::{
    CodeSpace, ErrorCode, ErrorKind, NativeError, NativeResult, ObjectKind, StatusCode,
};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const AUTHORS: &str = env!("CARGO_PKG_AUTHORS");
