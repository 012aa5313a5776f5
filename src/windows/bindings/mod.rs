//! Windows API bindings
//!
//! The live backends behind the platform-neutral traits, plus the few
//! ntdll entry points that have no Win32 wrapper.

pub mod kernel32;
pub mod ntdll;

pub use kernel32::{current_process, last_error, open_process, open_thread, Kernel32, OwnedHandle};
pub use ntdll::{cross_translate_native, query_system_information, system_process_count};
