//! Role model shared by every HR surface.
//!
//! Each user holds exactly one [`Role`]. Route handlers gate actions with
//! [`require_any`], which keeps the allowed-role lists next to the handler
//! that needs them.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("role {role} may not {action}")]
    Denied { role: Role, action: String },
    #[error("unknown role {0}")]
    UnknownRole(String),
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Management,
    Manager,
    Employee,
    Hr,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Management, Role::Manager, Role::Employee, Role::Hr];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Management => "MANAGEMENT",
            Role::Manager => "MANAGER",
            Role::Employee => "EMPLOYEE",
            Role::Hr => "HR",
        }
    }

    pub fn parse(value: &str) -> Result<Self, AuthzError> {
        match value.trim().to_ascii_uppercase().as_str() {
            "MANAGEMENT" => Ok(Role::Management),
            "MANAGER" => Ok(Role::Manager),
            "EMPLOYEE" => Ok(Role::Employee),
            "HR" => Ok(Role::Hr),
            _ => Err(AuthzError::UnknownRole(value.to_string())),
        }
    }

    /// Roles that see every record of the organisation.
    pub fn is_org_wide(self) -> bool {
        matches!(self, Role::Management | Role::Hr)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role groups reused across handlers.
pub mod groups {
    use super::Role;

    pub const ADMINISTRATION: &[Role] = &[Role::Hr, Role::Management];
    pub const PEOPLE_LEADS: &[Role] = &[Role::Hr, Role::Management, Role::Manager];
    pub const TASK_ASSIGNERS: &[Role] = &[Role::Management, Role::Manager];
    pub const INDICATOR_OWNERS: &[Role] = &[Role::Management];
    pub const INDICATOR_EDITORS: &[Role] = &[Role::Management, Role::Manager];
}

pub fn require_any(role: Role, allowed: &[Role], action: &str) -> Result<(), AuthzError> {
    if allowed.contains(&role) {
        Ok(())
    } else {
        Err(AuthzError::Denied {
            role,
            action: action.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_role_names_case_insensitively() {
        assert_eq!(Role::parse("hr"), Ok(Role::Hr));
        assert_eq!(Role::parse(" Management "), Ok(Role::Management));
        assert!(matches!(Role::parse("owner"), Err(AuthzError::UnknownRole(_))));
        for role in Role::ALL {
            assert_eq!(Role::parse(role.as_str()), Ok(role));
        }
    }

    #[test]
    fn gates_reject_roles_outside_the_list() {
        assert!(require_any(Role::Hr, groups::ADMINISTRATION, "create users").is_ok());
        let err = require_any(Role::Employee, groups::ADMINISTRATION, "create users")
            .expect_err("employees cannot administer users");
        assert_eq!(err.to_string(), "role EMPLOYEE may not create users");
    }

    #[test]
    fn only_management_and_hr_are_org_wide() {
        let org_wide: Vec<Role> = Role::ALL.into_iter().filter(|r| r.is_org_wide()).collect();
        assert_eq!(org_wide, vec![Role::Management, Role::Hr]);
    }
}
