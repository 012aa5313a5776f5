//! Process-level operations
//!
//! Snapshot enumeration, token privileges and the combined inspection
//! pass. The cursor and session types are platform-neutral; the ToolHelp
//! sources, token access and inspection talk to the live system.

pub mod entries;
#[cfg(windows)]
pub mod inspect;
pub mod privileges;
pub mod snapshot;
#[cfg(windows)]
pub mod toolhelp;

pub use entries::{filter_by_name, ModuleEntry, ProcessEntry, ThreadEntry};
#[cfg(windows)]
pub use inspect::{inspect_processes, InspectionReport, ProcessReport};
pub use privileges::{
    PrivilegeGrant, PrivilegeOps, PrivilegeSession, ReleaseReport, SkippedPrivilege,
};
pub use snapshot::{CursorState, EnumerationCursor, SnapshotSource};
#[cfg(windows)]
pub use toolhelp::{find_processes_by_name, modules, processes, threads};
