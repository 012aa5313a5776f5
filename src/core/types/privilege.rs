//! Privilege identifiers and token privilege records

use serde::{Deserialize, Serialize};
use std::fmt;

/// Attribute bit marking a privilege as enabled on a token
pub const SE_PRIVILEGE_ENABLED_BY_DEFAULT: u32 = 0x0000_0001;
pub const SE_PRIVILEGE_ENABLED: u32 = 0x0000_0002;
pub const SE_PRIVILEGE_REMOVED: u32 = 0x0000_0004;

/// Locally unique identifier assigned to a privilege name at boot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Luid {
    pub low: u32,
    pub high: i32,
}

impl Luid {
    pub fn new(low: u32, high: i32) -> Self {
        Luid { low, high }
    }

    pub fn as_u64(&self) -> u64 {
        ((self.high as u32 as u64) << 32) | self.low as u64
    }
}

impl fmt::Display for Luid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:X}", self.as_u64())
    }
}

/// State of a privilege
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrivilegeState {
    /// Privilege is enabled
    Enabled,
    /// Privilege is disabled but can be enabled
    Disabled,
    /// Privilege is not available to the token
    NotPresent,
}

/// One LUID_AND_ATTRIBUTES record from a token's privilege set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivilegeEntry {
    pub luid: Luid,
    pub attributes: u32,
}

impl PrivilegeEntry {
    pub fn state(&self) -> PrivilegeState {
        if self.attributes & SE_PRIVILEGE_REMOVED != 0 {
            PrivilegeState::NotPresent
        } else if self.attributes & SE_PRIVILEGE_ENABLED != 0 {
            PrivilegeState::Enabled
        } else {
            PrivilegeState::Disabled
        }
    }

    pub fn is_enabled_by_default(&self) -> bool {
        self.attributes & SE_PRIVILEGE_ENABLED_BY_DEFAULT != 0
    }
}

/// Look up the state of `luid` in a token's privilege list
pub fn privilege_state(entries: &[PrivilegeEntry], luid: Luid) -> PrivilegeState {
    entries
        .iter()
        .find(|e| e.luid == luid)
        .map(PrivilegeEntry::state)
        .unwrap_or(PrivilegeState::NotPresent)
}
