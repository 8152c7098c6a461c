//! Role-based capability checks.
//!
//! Each [`Role`] maps to a [`PermissionSet`] of `(Resource, Action)` grants.
//! Every management operation calls [`authorize`] before touching data.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::DashboardError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "admin" => Some(Self::Admin),
            "user" => Some(Self::User),
            _ => None,
        }
    }

    pub fn permissions(self) -> PermissionSet {
        let mut perms = PermissionSet::new();
        perms.grant(Resource::Dashboard, Action::Read);
        perms.grant(Resource::Export, Action::Create);

        if self == Self::Admin {
            perms.grant(Resource::Users, Action::All);
            perms.grant(Resource::Clients, Action::All);
            perms.grant(Resource::AuditLog, Action::Read);
        }
        perms
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Dashboard,
    Export,
    Users,
    Clients,
    AuditLog,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
    /// Reset credentials such as MFA or recovery codes.
    Reset,
    All,
}

/// Grants held by a role, keyed by resource.
#[derive(Debug, Clone, Default)]
pub struct PermissionSet {
    permissions: HashMap<Resource, Vec<Action>>,
}

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(&mut self, resource: Resource, action: Action) {
        self.permissions.entry(resource).or_default().push(action);
    }

    /// True if the exact action or `Action::All` is granted on `resource`.
    pub fn can(&self, resource: Resource, action: Action) -> bool {
        self.permissions
            .get(&resource)
            .is_some_and(|actions| actions.iter().any(|a| *a == Action::All || *a == action))
    }
}

/// Fails with `Forbidden` unless `role` may perform `action` on `resource`.
pub fn authorize(role: Role, resource: Resource, action: Action) -> Result<(), DashboardError> {
    if role.permissions().can(resource, action) {
        Ok(())
    } else {
        Err(DashboardError::forbidden(
            "Access denied. Tenant admin privileges required.",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_can_manage() {
        for (resource, action) in [
            (Resource::Users, Action::Create),
            (Resource::Users, Action::Reset),
            (Resource::Clients, Action::Delete),
            (Resource::AuditLog, Action::Read),
            (Resource::Dashboard, Action::Read),
        ] {
            assert!(authorize(Role::Admin, resource, action).is_ok());
        }
    }

    #[test]
    fn test_user_cannot_manage() {
        assert!(authorize(Role::User, Resource::Dashboard, Action::Read).is_ok());
        assert!(authorize(Role::User, Resource::Export, Action::Create).is_ok());

        for (resource, action) in [
            (Resource::Users, Action::Read),
            (Resource::Users, Action::Reset),
            (Resource::Clients, Action::Create),
            (Resource::AuditLog, Action::Read),
        ] {
            assert!(matches!(
                authorize(Role::User, resource, action),
                Err(DashboardError::Forbidden(_))
            ));
        }
    }

    #[test]
    fn test_role_parse() {
        assert_eq!(Role::parse("admin"), Some(Role::Admin));
        assert_eq!(Role::parse("user"), Some(Role::User));
        assert_eq!(Role::parse("owner"), None);
        assert_eq!(Role::Admin.to_string(), "admin");
    }
}
