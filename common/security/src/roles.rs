use crate::context::TenantContext;
use crate::SecurityError;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Membership role, scoped to a single (user, tenant) pair.
///
/// Ordering matters for [`Role::at_least`]: `Viewer < Engineer < Admin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Viewer,
    Engineer,
    Admin,
}

impl Role {
    pub fn parse_role(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => Some(Role::Admin),
            "ENGINEER" => Some(Role::Engineer),
            "VIEWER" => Some(Role::Viewer),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Engineer => "ENGINEER",
            Role::Viewer => "VIEWER",
        }
    }

    /// VIEWER may read; ENGINEER and ADMIN may mutate.
    pub fn can_write(&self) -> bool {
        matches!(self, Role::Engineer | Role::Admin)
    }

    /// Only ADMIN may view the audit log.
    pub fn can_view_audit(&self) -> bool {
        matches!(self, Role::Admin)
    }

    /// A non-owner may only remove another member's saved view as ADMIN.
    pub fn can_delete_foreign_saved_view(&self) -> bool {
        matches!(self, Role::Admin)
    }

    pub fn at_least(&self, required: Role) -> bool {
        *self >= required
    }
}

impl std::str::FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::parse_role(s).ok_or(())
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn ensure_role(ctx: &TenantContext, required: Role) -> Result<(), SecurityError> {
    if ctx.role.at_least(required) {
        return Ok(());
    }
    warn!(tenant_id = %ctx.tenant_id, ?required, role = ?ctx.role, "role_check_failed");
    Err(SecurityError::Forbidden)
}

pub fn ensure_write(ctx: &TenantContext) -> Result<(), SecurityError> {
    if ctx.role.can_write() {
        return Ok(());
    }
    warn!(tenant_id = %ctx.tenant_id, role = ?ctx.role, "write_check_failed");
    Err(SecurityError::Forbidden)
}

pub fn ensure_admin(ctx: &TenantContext) -> Result<(), SecurityError> {
    ensure_role(ctx, Role::Admin)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_ordering() {
        assert!(Role::Admin > Role::Engineer);
        assert!(Role::Engineer > Role::Viewer);
    }

    #[test]
    fn viewer_cannot_write() {
        assert!(!Role::Viewer.can_write());
        assert!(Role::Engineer.can_write());
        assert!(Role::Admin.can_write());
    }

    #[test]
    fn only_admin_views_audit() {
        assert!(!Role::Viewer.can_view_audit());
        assert!(!Role::Engineer.can_view_audit());
        assert!(Role::Admin.can_view_audit());
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(Role::parse_role("admin"), Some(Role::Admin));
        assert_eq!(Role::parse_role("Engineer"), Some(Role::Engineer));
        assert_eq!(Role::parse_role("bogus"), None);
    }
}
