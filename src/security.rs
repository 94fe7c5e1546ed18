//! A minimal ACL stub gating mutating vs. read-only statements, matching
//! §1's framing of security/ACL checks as thin routine glue.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Read,
    Write,
}

#[derive(Debug, Error)]
#[error("permission denied: '{user}' lacks {permission:?} access")]
pub struct PermissionDenied {
    pub user: String,
    pub permission: Permission,
}

#[derive(Debug, Clone)]
pub struct SecurityContext {
    user: String,
    can_read: bool,
    can_write: bool,
}

impl SecurityContext {
    pub fn new(user: impl Into<String>, can_read: bool, can_write: bool) -> Self {
        SecurityContext { user: user.into(), can_read, can_write }
    }

    /// A context with unrestricted read/write, used when no ACL is
    /// configured (the default in a single-user embedded deployment).
    pub fn unrestricted(user: impl Into<String>) -> Self {
        SecurityContext::new(user, true, true)
    }

    pub fn check(&self, permission: Permission) -> Result<(), PermissionDenied> {
        let allowed = match permission {
            Permission::Read => self.can_read,
            Permission::Write => self.can_write,
        };
        if allowed {
            Ok(())
        } else {
            Err(PermissionDenied { user: self.user.clone(), permission })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrestricted_allows_both() {
        let ctx = SecurityContext::unrestricted("root");
        assert!(ctx.check(Permission::Read).is_ok());
        assert!(ctx.check(Permission::Write).is_ok());
    }

    #[test]
    fn read_only_context_rejects_writes() {
        let ctx = SecurityContext::new("viewer", true, false);
        assert!(ctx.check(Permission::Read).is_ok());
        assert!(ctx.check(Permission::Write).is_err());
    }
}
