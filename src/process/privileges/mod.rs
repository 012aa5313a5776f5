//! Token privilege management

pub mod session;
#[cfg(windows)]
pub mod token;

pub use session::{PrivilegeGrant, PrivilegeOps, PrivilegeSession, ReleaseReport, SkippedPrivilege};
#[cfg(windows)]
pub use token::{privilege_name, Token};
