//! Scoped privilege acquisition
//!
//! A [`PrivilegeSession`] enables named privileges on a token, remembers
//! what each one looked like beforehand and puts every touched privilege
//! back in reverse order when released or dropped. Names the token cannot
//! enable are reported, not fatal; the caller decides whether the partial
//! grant is enough.

use crate::core::types::{ErrorCode, ErrorKind, Luid, NativeError, NativeResult};
use serde::Serialize;
use tracing::{debug, warn};

/// Token operations a session needs
pub trait PrivilegeOps {
    /// Resolve a privilege name to its LUID
    fn lookup_privilege(&mut self, name: &str) -> Result<Luid, ErrorCode>;

    /// Enable or disable `luid`, returning whether it was enabled before
    fn set_privilege(&mut self, luid: Luid, enabled: bool) -> Result<bool, ErrorCode>;
}

impl<T: PrivilegeOps + ?Sized> PrivilegeOps for &mut T {
    fn lookup_privilege(&mut self, name: &str) -> Result<Luid, ErrorCode> {
        (**self).lookup_privilege(name)
    }

    fn set_privilege(&mut self, luid: Luid, enabled: bool) -> Result<bool, ErrorCode> {
        (**self).set_privilege(luid, enabled)
    }
}

/// A privilege the session enabled, with its prior state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrivilegeGrant {
    pub name: String,
    pub luid: Luid,
    pub previously_enabled: bool,
}

/// A requested privilege that could not be enabled
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedPrivilege {
    pub name: String,
    pub kind: ErrorKind,
    pub code: ErrorCode,
}

/// What happened when a session put its privileges back
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReleaseReport {
    pub restored: Vec<String>,
    pub failed: Vec<(String, ErrorCode)>,
}

impl ReleaseReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Privileges held enabled on a token for the lifetime of the session
pub struct PrivilegeSession<T: PrivilegeOps> {
    token: T,
    grants: Vec<PrivilegeGrant>,
    skipped: Vec<SkippedPrivilege>,
    released: bool,
}

impl<T: PrivilegeOps> PrivilegeSession<T> {
    /// Enable each of `names` on `token`
    pub fn acquire(mut token: T, names: &[&str]) -> Self {
        let mut grants = Vec::with_capacity(names.len());
        let mut skipped = Vec::new();

        for &name in names {
            let luid = match token.lookup_privilege(name) {
                Ok(luid) => luid,
                Err(code) => {
                    debug!(privilege = name, %code, "privilege lookup failed");
                    skipped.push(SkippedPrivilege {
                        name: name.to_string(),
                        kind: ErrorKind::NotFound,
                        code,
                    });
                    continue;
                }
            };

            match token.set_privilege(luid, true) {
                Ok(previously_enabled) => {
                    debug!(privilege = name, previously_enabled, "privilege enabled");
                    grants.push(PrivilegeGrant {
                        name: name.to_string(),
                        luid,
                        previously_enabled,
                    });
                }
                Err(code) => {
                    debug!(privilege = name, %code, "privilege not granted");
                    skipped.push(SkippedPrivilege {
                        name: name.to_string(),
                        kind: code.kind(),
                        code,
                    });
                }
            }
        }

        PrivilegeSession {
            token,
            grants,
            skipped,
            released: false,
        }
    }

    /// Run `f` with the privileges enabled and release afterwards.
    ///
    /// Restoration also happens if `f` unwinds.
    pub fn scoped<R, F>(token: T, names: &[&str], f: F) -> (R, ReleaseReport)
    where
        F: FnOnce(&mut Self) -> R,
    {
        let mut session = Self::acquire(token, names);
        let result = f(&mut session);
        (result, session.release())
    }

    pub fn grants(&self) -> &[PrivilegeGrant] {
        &self.grants
    }

    pub fn skipped(&self) -> &[SkippedPrivilege] {
        &self.skipped
    }

    pub fn is_fully_granted(&self) -> bool {
        self.skipped.is_empty()
    }

    pub fn is_granted(&self, name: &str) -> bool {
        self.grants.iter().any(|grant| grant.name.eq_ignore_ascii_case(name))
    }

    /// Turn the first skipped privilege into an error
    pub fn require_all(&self) -> NativeResult<()> {
        match self.skipped.first() {
            None => Ok(()),
            Some(skipped) => Err(NativeError::call(
                format!("enable {}", skipped.name),
                ErrorCode::with_kind(skipped.code.status(), skipped.kind),
            )),
        }
    }

    pub fn token(&self) -> &T {
        &self.token
    }

    pub fn token_mut(&mut self) -> &mut T {
        &mut self.token
    }

    /// Restore every touched privilege, most recent first
    pub fn release(mut self) -> ReleaseReport {
        self.restore()
    }

    fn restore(&mut self) -> ReleaseReport {
        let mut report = ReleaseReport::default();
        if self.released {
            return report;
        }
        self.released = true;

        for grant in self.grants.iter().rev() {
            if grant.previously_enabled {
                report.restored.push(grant.name.clone());
                continue;
            }
            match self.token.set_privilege(grant.luid, false) {
                Ok(_) => report.restored.push(grant.name.clone()),
                Err(code) => {
                    warn!(privilege = %grant.name, %code, "failed to restore privilege");
                    report.failed.push((grant.name.clone(), code));
                }
            }
        }
        report
    }
}

impl<T: PrivilegeOps> Drop for PrivilegeSession<T> {
    fn drop(&mut self) {
        if !self.released {
            self.restore();
        }
    }
}
