//! Variable-length native queries

pub mod buffer;
pub mod info_class;

pub use buffer::{GrowingBufferQuery, QueryResult};
pub use info_class::{ElevationType, InfoClass, TokenInfo, TokenInfoClass};
