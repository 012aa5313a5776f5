//! Waiting on synchronization objects

#[cfg(windows)]
pub mod event;
pub mod wait;

#[cfg(windows)]
pub use event::{create_event, reset_event, set_event};
pub use wait::{check_waitable, wait_with, WaitOutcome, WaitTimeout, INFINITE};
#[cfg(windows)]
pub use wait::wait_for;
