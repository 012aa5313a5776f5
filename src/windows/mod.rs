//! Native API layer
//!
//! `types`, `query` and `utils` hold the platform-neutral protocol: handle
//! guards, the growing-buffer algorithm and error translation. `bindings`
//! plugs the real Win32 and NT calls into those protocols.

#[cfg(windows)]
pub mod bindings;
pub mod query;
pub mod types;
pub mod utils;

pub use query::{GrowingBufferQuery, QueryResult};
pub use types::{HandleGuard, HandleOps, NativeHandle};
pub use utils::{CallSite, ErrorTranslator};
