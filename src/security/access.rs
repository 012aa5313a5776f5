//! Access-right validation for handle requests
//!
//! Every open/duplicate request is checked against the legal rights of
//! its object kind before a native call is issued, so a mis-specified
//! mask fails locally with a descriptive error instead of coming back as
//! an opaque `ERROR_ACCESS_DENIED` or `ERROR_INVALID_PARAMETER`.

use crate::core::types::{AccessMask, NativeError, NativeResult, ObjectKind};
use crate::job::cpu_rate::ResourceControlPolicy;
use serde::Serialize;
use std::fmt;

/// Standard and generic rights shared by all securable objects
pub mod standard {
    use crate::core::types::AccessMask;

    pub const DELETE: AccessMask = 0x0001_0000;
    pub const READ_CONTROL: AccessMask = 0x0002_0000;
    pub const WRITE_DAC: AccessMask = 0x0004_0000;
    pub const WRITE_OWNER: AccessMask = 0x0008_0000;
    pub const SYNCHRONIZE: AccessMask = 0x0010_0000;
    pub const STANDARD_RIGHTS_REQUIRED: AccessMask = 0x000F_0000;
    pub const STANDARD_RIGHTS_ALL: AccessMask = 0x001F_0000;
    pub const ACCESS_SYSTEM_SECURITY: AccessMask = 0x0100_0000;
    pub const MAXIMUM_ALLOWED: AccessMask = 0x0200_0000;
    pub const GENERIC_ALL: AccessMask = 0x1000_0000;
    pub const GENERIC_EXECUTE: AccessMask = 0x2000_0000;
    pub const GENERIC_WRITE: AccessMask = 0x4000_0000;
    pub const GENERIC_READ: AccessMask = 0x8000_0000;
    pub const GENERIC_MASK: AccessMask =
        GENERIC_ALL | GENERIC_EXECUTE | GENERIC_WRITE | GENERIC_READ;
}

/// Process-specific access rights
pub mod process_rights {
    use crate::core::types::AccessMask;

    pub const TERMINATE: AccessMask = 0x0001;
    pub const CREATE_THREAD: AccessMask = 0x0002;
    pub const SET_SESSIONID: AccessMask = 0x0004;
    pub const VM_OPERATION: AccessMask = 0x0008;
    pub const VM_READ: AccessMask = 0x0010;
    pub const VM_WRITE: AccessMask = 0x0020;
    pub const DUP_HANDLE: AccessMask = 0x0040;
    pub const CREATE_PROCESS: AccessMask = 0x0080;
    pub const SET_QUOTA: AccessMask = 0x0100;
    pub const SET_INFORMATION: AccessMask = 0x0200;
    pub const QUERY_INFORMATION: AccessMask = 0x0400;
    pub const SUSPEND_RESUME: AccessMask = 0x0800;
    pub const QUERY_LIMITED_INFORMATION: AccessMask = 0x1000;
    pub const SET_LIMITED_INFORMATION: AccessMask = 0x2000;
    pub const ALL_ACCESS: AccessMask = 0x001F_FFFF;
}

/// Thread-specific access rights
pub mod thread_rights {
    use crate::core::types::AccessMask;

    pub const TERMINATE: AccessMask = 0x0001;
    pub const SUSPEND_RESUME: AccessMask = 0x0002;
    pub const GET_CONTEXT: AccessMask = 0x0008;
    pub const SET_CONTEXT: AccessMask = 0x0010;
    pub const SET_INFORMATION: AccessMask = 0x0020;
    pub const QUERY_INFORMATION: AccessMask = 0x0040;
    pub const SET_THREAD_TOKEN: AccessMask = 0x0080;
    pub const IMPERSONATE: AccessMask = 0x0100;
    pub const DIRECT_IMPERSONATION: AccessMask = 0x0200;
    pub const SET_LIMITED_INFORMATION: AccessMask = 0x0400;
    pub const QUERY_LIMITED_INFORMATION: AccessMask = 0x0800;
    pub const RESUME: AccessMask = 0x1000;
    pub const ALL_ACCESS: AccessMask = 0x001F_FFFF;
}

/// Token-specific access rights
pub mod token_rights {
    use crate::core::types::AccessMask;

    pub const ASSIGN_PRIMARY: AccessMask = 0x0001;
    pub const DUPLICATE: AccessMask = 0x0002;
    pub const IMPERSONATE: AccessMask = 0x0004;
    pub const QUERY: AccessMask = 0x0008;
    pub const QUERY_SOURCE: AccessMask = 0x0010;
    pub const ADJUST_PRIVILEGES: AccessMask = 0x0020;
    pub const ADJUST_GROUPS: AccessMask = 0x0040;
    pub const ADJUST_DEFAULT: AccessMask = 0x0080;
    pub const ADJUST_SESSIONID: AccessMask = 0x0100;
    pub const ALL_ACCESS: AccessMask = 0x000F_01FF;
}

/// Job-object-specific access rights
pub mod job_rights {
    use crate::core::types::AccessMask;

    pub const ASSIGN_PROCESS: AccessMask = 0x0001;
    pub const SET_ATTRIBUTES: AccessMask = 0x0002;
    pub const QUERY: AccessMask = 0x0004;
    pub const TERMINATE: AccessMask = 0x0008;
    pub const SET_SECURITY_ATTRIBUTES: AccessMask = 0x0010;
    pub const IMPERSONATE: AccessMask = 0x0020;
    pub const ALL_ACCESS: AccessMask = 0x001F_003F;
}

/// Registry-key-specific access rights
pub mod key_rights {
    use crate::core::types::AccessMask;

    pub const QUERY_VALUE: AccessMask = 0x0001;
    pub const SET_VALUE: AccessMask = 0x0002;
    pub const CREATE_SUB_KEY: AccessMask = 0x0004;
    pub const ENUMERATE_SUB_KEYS: AccessMask = 0x0008;
    pub const NOTIFY: AccessMask = 0x0010;
    pub const CREATE_LINK: AccessMask = 0x0020;
    pub const WOW64_64KEY: AccessMask = 0x0100;
    pub const WOW64_32KEY: AccessMask = 0x0200;
    pub const ALL_ACCESS: AccessMask = 0x000F_003F;
}

/// How GENERIC_* bits expand for one object kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenericMapping {
    pub read: AccessMask,
    pub write: AccessMask,
    pub execute: AccessMask,
    pub all: AccessMask,
}

/// Legal rights for one object kind
#[derive(Debug, Clone, Copy)]
pub struct RightsTable {
    /// Object-specific bits (low word)
    pub specific: AccessMask,
    /// Standard rights the object accepts
    pub standard: AccessMask,
    pub mapping: GenericMapping,
    /// Pairs of bits that must not be requested together
    pub exclusive: &'static [(AccessMask, AccessMask, &'static str)],
}

const NO_EXCLUSIONS: &[(AccessMask, AccessMask, &str)] = &[];

const REGISTRY_EXCLUSIONS: &[(AccessMask, AccessMask, &str)] = &[(
    key_rights::WOW64_64KEY,
    key_rights::WOW64_32KEY,
    "KEY_WOW64_64KEY and KEY_WOW64_32KEY select different registry views",
)];

const fn mapping(read: u32, write: u32, execute: u32, all: u32) -> GenericMapping {
    GenericMapping {
        read,
        write,
        execute,
        all,
    }
}

/// The rights table for `kind`, or `None` for non-securable objects
pub fn rights_table(kind: ObjectKind) -> Option<RightsTable> {
    use standard::{STANDARD_RIGHTS_ALL, STANDARD_RIGHTS_REQUIRED};

    let table = match kind {
        ObjectKind::Process => RightsTable {
            specific: 0xFFFF,
            standard: STANDARD_RIGHTS_ALL,
            mapping: mapping(0x0002_0410, 0x0002_0BEF, 0x0012_1000, process_rights::ALL_ACCESS),
            exclusive: NO_EXCLUSIONS,
        },
        ObjectKind::Thread => RightsTable {
            specific: 0xFFFF,
            standard: STANDARD_RIGHTS_ALL,
            mapping: mapping(0x0002_0048, 0x0002_0033, 0x0012_0800, thread_rights::ALL_ACCESS),
            exclusive: NO_EXCLUSIONS,
        },
        ObjectKind::Token => RightsTable {
            specific: 0x01FF,
            standard: STANDARD_RIGHTS_REQUIRED,
            mapping: mapping(0x0002_0008, 0x0002_00E0, 0x0002_0000, token_rights::ALL_ACCESS),
            exclusive: NO_EXCLUSIONS,
        },
        ObjectKind::Job => RightsTable {
            specific: 0x003F,
            standard: STANDARD_RIGHTS_ALL,
            mapping: mapping(0x0002_0004, 0x0002_000B, 0x0012_0000, job_rights::ALL_ACCESS),
            exclusive: NO_EXCLUSIONS,
        },
        ObjectKind::Service => RightsTable {
            specific: 0x01FF,
            standard: STANDARD_RIGHTS_REQUIRED,
            mapping: mapping(0x0002_008D, 0x0002_0002, 0x0002_0170, 0x000F_01FF),
            exclusive: NO_EXCLUSIONS,
        },
        ObjectKind::Section => RightsTable {
            specific: 0x003F,
            standard: STANDARD_RIGHTS_REQUIRED,
            mapping: mapping(0x0002_0005, 0x0002_0002, 0x0002_0008, 0x000F_001F),
            exclusive: NO_EXCLUSIONS,
        },
        ObjectKind::Event | ObjectKind::Semaphore => RightsTable {
            specific: 0x0003,
            standard: STANDARD_RIGHTS_ALL,
            mapping: mapping(0x0012_0001, 0x0012_0002, 0x0012_0000, 0x001F_0003),
            exclusive: NO_EXCLUSIONS,
        },
        ObjectKind::Mutex => RightsTable {
            specific: 0x0001,
            standard: STANDARD_RIGHTS_ALL,
            mapping: mapping(0x0012_0001, 0x0012_0000, 0x0012_0000, 0x001F_0001),
            exclusive: NO_EXCLUSIONS,
        },
        ObjectKind::File => RightsTable {
            specific: 0x01FF,
            standard: STANDARD_RIGHTS_ALL,
            mapping: mapping(0x0012_0089, 0x0012_0116, 0x0012_00A0, 0x001F_01FF),
            exclusive: NO_EXCLUSIONS,
        },
        ObjectKind::RegistryKey => RightsTable {
            specific: 0x033F,
            standard: STANDARD_RIGHTS_REQUIRED,
            mapping: mapping(0x0002_0019, 0x0002_0006, 0x0002_0019, key_rights::ALL_ACCESS),
            exclusive: REGISTRY_EXCLUSIONS,
        },
        ObjectKind::Snapshot => return None,
    };
    Some(table)
}

/// A requested access mask and the object kind it applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessRequest {
    pub kind: ObjectKind,
    pub mask: AccessMask,
}

impl AccessRequest {
    pub fn new(kind: ObjectKind, mask: AccessMask) -> Self {
        AccessRequest { kind, mask }
    }

    /// Combine access rights
    pub fn combine(kind: ObjectKind, rights: &[AccessMask]) -> Self {
        let mask = rights.iter().fold(0, |acc, right| acc | right);
        AccessRequest { kind, mask }
    }

    pub fn validate(&self) -> NativeResult<ValidatedMask> {
        AccessDescriptor::validate(self.mask, self.kind)
    }
}

/// A mask that passed validation, with generic rights expanded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ValidatedMask {
    kind: ObjectKind,
    requested: AccessMask,
    effective: AccessMask,
}

impl ValidatedMask {
    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    /// The mask exactly as requested; this is what the native open receives
    pub fn requested(&self) -> AccessMask {
        self.requested
    }

    /// Specific and standard rights after generic expansion
    pub fn effective(&self) -> AccessMask {
        self.effective
    }

    pub fn allows(&self, rights: AccessMask) -> bool {
        self.effective & rights == rights
    }
}

impl fmt::Display for ValidatedMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} access 0x{:08X} (effective 0x{:08X})",
            self.kind, self.requested, self.effective
        )
    }
}

/// Validates and expands access masks per object kind
pub struct AccessDescriptor;

impl AccessDescriptor {
    /// Check `requested` against the rights legal for `kind`
    pub fn validate(requested: AccessMask, kind: ObjectKind) -> NativeResult<ValidatedMask> {
        let table = match rights_table(kind) {
            Some(table) => table,
            None if requested == 0 => {
                return Ok(ValidatedMask {
                    kind,
                    requested,
                    effective: 0,
                })
            }
            None => {
                return Err(NativeError::invalid_access(
                    kind,
                    format!("object is not securable; requested 0x{:08X}", requested),
                ))
            }
        };

        if requested == 0 {
            return Err(NativeError::invalid_access(kind, "empty access mask"));
        }

        let legal = table.specific
            | table.standard
            | standard::GENERIC_MASK
            | standard::ACCESS_SYSTEM_SECURITY
            | standard::MAXIMUM_ALLOWED;
        let unknown = requested & !legal;
        if unknown != 0 {
            return Err(NativeError::invalid_access(
                kind,
                format!("unknown bits 0x{:08X}", unknown),
            ));
        }

        for (a, b, reason) in table.exclusive {
            if requested & a != 0 && requested & b != 0 {
                return Err(NativeError::invalid_access(kind, *reason));
            }
        }

        Ok(ValidatedMask {
            kind,
            requested,
            effective: Self::expand(requested, &table.mapping),
        })
    }

    /// Check the control flags a kind carries next to its access mask.
    ///
    /// Jobs take CPU-rate control flags, whose modes exclude each other.
    /// No other kind takes any.
    pub fn validate_control_flags(flags: u32, kind: ObjectKind) -> NativeResult<u32> {
        match kind {
            ObjectKind::Job => ResourceControlPolicy::check_flags(flags).map(|()| flags),
            _ if flags == 0 => Ok(0),
            _ => Err(NativeError::ConflictingFlags(format!(
                "{} objects take no control flags; got 0x{:X}",
                kind, flags
            ))),
        }
    }

    /// Replace GENERIC_* bits with the kind's specific equivalents
    pub fn expand(mask: AccessMask, mapping: &GenericMapping) -> AccessMask {
        let mut effective = mask & !standard::GENERIC_MASK;
        if mask & standard::GENERIC_READ != 0 {
            effective |= mapping.read;
        }
        if mask & standard::GENERIC_WRITE != 0 {
            effective |= mapping.write;
        }
        if mask & standard::GENERIC_EXECUTE != 0 {
            effective |= mapping.execute;
        }
        if mask & standard::GENERIC_ALL != 0 {
            effective |= mapping.all;
        }
        effective
    }
}

/// Group attribute bits on a token's group SIDs
pub mod group_attributes {
    pub const SE_GROUP_MANDATORY: u32 = 0x0000_0001;
    pub const SE_GROUP_ENABLED_BY_DEFAULT: u32 = 0x0000_0002;
    pub const SE_GROUP_ENABLED: u32 = 0x0000_0004;
    pub const SE_GROUP_OWNER: u32 = 0x0000_0008;
    pub const SE_GROUP_USE_FOR_DENY_ONLY: u32 = 0x0000_0010;
    pub const SE_GROUP_INTEGRITY: u32 = 0x0000_0020;
    pub const SE_GROUP_INTEGRITY_ENABLED: u32 = 0x0000_0040;
    pub const SE_GROUP_RESOURCE: u32 = 0x2000_0000;
    pub const SE_GROUP_LOGON_ID: u32 = 0xC000_0000;
    pub const VALID_MASK: u32 = 0xE000_007F;
}

/// Attributes of one group identifier in a token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GroupAttributes(u32);

impl GroupAttributes {
    pub fn validate(bits: u32) -> NativeResult<Self> {
        use group_attributes::*;

        let unknown = bits & !VALID_MASK;
        if unknown != 0 {
            return Err(NativeError::invalid_access(
                ObjectKind::Token,
                format!("unknown group attribute bits 0x{:08X}", unknown),
            ));
        }
        let has = |flag: u32| bits & flag != 0;
        if has(SE_GROUP_USE_FOR_DENY_ONLY) && has(SE_GROUP_ENABLED) {
            return Err(NativeError::invalid_access(
                ObjectKind::Token,
                "a deny-only group cannot be enabled",
            ));
        }
        if has(SE_GROUP_USE_FOR_DENY_ONLY) && has(SE_GROUP_ENABLED_BY_DEFAULT) {
            return Err(NativeError::invalid_access(
                ObjectKind::Token,
                "a deny-only group cannot be enabled by default",
            ));
        }
        if has(SE_GROUP_MANDATORY) && !has(SE_GROUP_ENABLED) {
            return Err(NativeError::invalid_access(
                ObjectKind::Token,
                "a mandatory group must be enabled",
            ));
        }
        if has(SE_GROUP_INTEGRITY_ENABLED) && !has(SE_GROUP_INTEGRITY) {
            return Err(NativeError::invalid_access(
                ObjectKind::Token,
                "integrity-enabled requires the integrity attribute",
            ));
        }
        Ok(GroupAttributes(bits))
    }

    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn is_enabled(&self) -> bool {
        self.0 & group_attributes::SE_GROUP_ENABLED != 0
    }

    pub fn is_deny_only(&self) -> bool {
        self.0 & group_attributes::SE_GROUP_USE_FOR_DENY_ONLY != 0
    }
}
