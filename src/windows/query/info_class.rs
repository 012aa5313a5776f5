//! Typed information classes
//!
//! A native query selects its payload layout through a numeric class id.
//! Each [`InfoClass`] ties that id to the name used in errors, the
//! minimum payload size and the decoder, so callers never handle raw tags
//! or untyped buffers.

use crate::core::types::{Luid, NativeError, NativeResult, PrivilegeEntry};
use serde::Serialize;

/// One family of information-class queries
pub trait InfoClass {
    type Output;

    /// Name used when reporting failures
    fn name(&self) -> &'static str;

    /// The numeric tag passed to the native call
    fn class_id(&self) -> u32;

    /// Smallest payload that can hold a valid record
    fn min_size(&self) -> usize;

    fn decode(&self, payload: &[u8]) -> NativeResult<Self::Output>;
}

/// `TOKEN_INFORMATION_CLASS` values this crate understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenInfoClass {
    Privileges,
    SessionId,
    ElevationType,
    Elevation,
}

/// How the token relates to a split (UAC) token pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ElevationType {
    /// No linked token
    Default,
    Full,
    Limited,
}

/// Decoded token information
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenInfo {
    Privileges(Vec<PrivilegeEntry>),
    SessionId(u32),
    ElevationType(ElevationType),
    Elevated(bool),
}

/// Size of one LUID_AND_ATTRIBUTES record
const LUID_AND_ATTRIBUTES_SIZE: usize = 12;

fn read_u32(payload: &[u8], offset: usize) -> Option<u32> {
    payload
        .get(offset..offset + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

impl TokenInfoClass {
    fn decode_privileges(&self, payload: &[u8]) -> NativeResult<Vec<PrivilegeEntry>> {
        let count = read_u32(payload, 0)
            .ok_or_else(|| NativeError::malformed(self.name(), "missing privilege count"))?
            as usize;
        let needed = count
            .checked_mul(LUID_AND_ATTRIBUTES_SIZE)
            .and_then(|n| n.checked_add(4))
            .ok_or_else(|| NativeError::malformed(self.name(), "privilege count overflows"))?;
        if payload.len() < needed {
            return Err(NativeError::malformed(
                self.name(),
                format!(
                    "{} privileges need {} bytes, payload has {}",
                    count,
                    needed,
                    payload.len()
                ),
            ));
        }

        let entries = payload[4..needed]
            .chunks_exact(LUID_AND_ATTRIBUTES_SIZE)
            .map(|record| {
                let word = |i: usize| {
                    u32::from_le_bytes([record[i], record[i + 1], record[i + 2], record[i + 3]])
                };
                PrivilegeEntry {
                    luid: Luid::new(word(0), word(4) as i32),
                    attributes: word(8),
                }
            })
            .collect();
        Ok(entries)
    }
}

impl InfoClass for TokenInfoClass {
    type Output = TokenInfo;

    fn name(&self) -> &'static str {
        match self {
            TokenInfoClass::Privileges => "TokenPrivileges",
            TokenInfoClass::SessionId => "TokenSessionId",
            TokenInfoClass::ElevationType => "TokenElevationType",
            TokenInfoClass::Elevation => "TokenElevation",
        }
    }

    fn class_id(&self) -> u32 {
        match self {
            TokenInfoClass::Privileges => 3,
            TokenInfoClass::SessionId => 12,
            TokenInfoClass::ElevationType => 18,
            TokenInfoClass::Elevation => 20,
        }
    }

    fn min_size(&self) -> usize {
        4
    }

    fn decode(&self, payload: &[u8]) -> NativeResult<TokenInfo> {
        if payload.len() < self.min_size() {
            return Err(NativeError::malformed(
                self.name(),
                format!("expected at least {} bytes, got {}", self.min_size(), payload.len()),
            ));
        }
        let word = read_u32(payload, 0).unwrap_or_default();

        match self {
            TokenInfoClass::Privileges => {
                self.decode_privileges(payload).map(TokenInfo::Privileges)
            }
            TokenInfoClass::SessionId => Ok(TokenInfo::SessionId(word)),
            TokenInfoClass::Elevation => Ok(TokenInfo::Elevated(word != 0)),
            TokenInfoClass::ElevationType => match word {
                1 => Ok(TokenInfo::ElevationType(ElevationType::Default)),
                2 => Ok(TokenInfo::ElevationType(ElevationType::Full)),
                3 => Ok(TokenInfo::ElevationType(ElevationType::Limited)),
                other => Err(NativeError::malformed(
                    self.name(),
                    format!("unknown elevation type {}", other),
                )),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{PrivilegeState, SE_PRIVILEGE_ENABLED};
    use pretty_assertions::assert_eq;

    fn privileges_payload(entries: &[(u32, i32, u32)]) -> Vec<u8> {
        let mut payload = (entries.len() as u32).to_le_bytes().to_vec();
        for (low, high, attrs) in entries {
            payload.extend_from_slice(&low.to_le_bytes());
            payload.extend_from_slice(&high.to_le_bytes());
            payload.extend_from_slice(&attrs.to_le_bytes());
        }
        payload
    }

    #[test]
    fn test_class_ids() {
        assert_eq!(TokenInfoClass::Privileges.class_id(), 3);
        assert_eq!(TokenInfoClass::SessionId.class_id(), 12);
        assert_eq!(TokenInfoClass::ElevationType.class_id(), 18);
        assert_eq!(TokenInfoClass::Elevation.class_id(), 20);
    }

    #[test]
    fn test_decode_privileges() {
        let payload = privileges_payload(&[(20, 0, SE_PRIVILEGE_ENABLED), (23, 0, 0)]);
        let decoded = TokenInfoClass::Privileges.decode(&payload).unwrap();
        let TokenInfo::Privileges(entries) = decoded else {
            panic!("Expected privileges");
        };
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].luid, Luid::new(20, 0));
        assert_eq!(entries[0].state(), PrivilegeState::Enabled);
        assert_eq!(entries[1].state(), PrivilegeState::Disabled);
    }

    #[test]
    fn test_decode_privileges_ignores_trailing_slack() {
        let mut payload = privileges_payload(&[(5, 1, 0)]);
        payload.extend_from_slice(&[0xAA; 9]);
        let decoded = TokenInfoClass::Privileges.decode(&payload).unwrap();
        assert_eq!(
            decoded,
            TokenInfo::Privileges(vec![PrivilegeEntry {
                luid: Luid::new(5, 1),
                attributes: 0,
            }])
        );
    }

    #[test]
    fn test_decode_truncated_privileges() {
        let mut payload = privileges_payload(&[(20, 0, 0), (23, 0, 0)]);
        payload.truncate(20);
        let err = TokenInfoClass::Privileges.decode(&payload).unwrap_err();
        assert!(err.to_string().contains("TokenPrivileges"));
    }

    #[test]
    fn test_decode_scalars() {
        assert_eq!(
            TokenInfoClass::SessionId.decode(&1u32.to_le_bytes()).unwrap(),
            TokenInfo::SessionId(1)
        );
        assert_eq!(
            TokenInfoClass::Elevation.decode(&1u32.to_le_bytes()).unwrap(),
            TokenInfo::Elevated(true)
        );
        assert_eq!(
            TokenInfoClass::ElevationType.decode(&3u32.to_le_bytes()).unwrap(),
            TokenInfo::ElevationType(ElevationType::Limited)
        );
        assert!(TokenInfoClass::ElevationType.decode(&9u32.to_le_bytes()).is_err());
        assert!(TokenInfoClass::SessionId.decode(&[1, 0]).is_err());
    }
}
