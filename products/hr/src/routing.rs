//! Who decides a leave request.
//!
//! | Applicant   | Days          | Dept has an active Manager | Decided by              |
//! |-------------|---------------|----------------------------|-------------------------|
//! | Employee    | <= threshold  | yes                        | Manager of a shared dept|
//! | Employee    | <= threshold  | no                         | Management              |
//! | Employee    | > threshold   | any                        | Management              |
//! | Manager, HR | any           | any                        | Management              |
//! | Management  | any           | any                        | another Management user |

use platform_authz::Role;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalAuthority {
    Management,
    Manager,
}

impl ApprovalAuthority {
    pub fn as_str(self) -> &'static str {
        match self {
            ApprovalAuthority::Management => "MANAGEMENT",
            ApprovalAuthority::Manager => "MANAGER",
        }
    }

    pub fn role(self) -> Role {
        match self {
            ApprovalAuthority::Management => Role::Management,
            ApprovalAuthority::Manager => Role::Manager,
        }
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DecisionDenied {
    #[error("nobody may decide their own leave")]
    OwnLeave,
    #[error("this leave must be decided by {0:?}")]
    WrongRole(ApprovalAuthority),
    #[error("manager does not share a department with the applicant")]
    NoSharedDepartment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutingPolicy {
    /// Longest employee leave a department manager may decide.
    pub manager_max_days: i32,
}

impl Default for RoutingPolicy {
    fn default() -> Self {
        Self {
            manager_max_days: 2,
        }
    }
}

/// A user taking part in a decision, with the departments they belong to.
#[derive(Debug, Clone, Copy)]
pub struct Party<'a, Id> {
    pub id: Id,
    pub role: Role,
    pub departments: &'a [Id],
}

impl RoutingPolicy {
    /// `reachable_manager` is true when an active Manager shares a department
    /// with the applicant; otherwise nobody could decide a Manager-routed leave.
    pub fn authority(
        &self,
        applicant: Role,
        days: i32,
        reachable_manager: bool,
    ) -> ApprovalAuthority {
        match applicant {
            Role::Employee if days <= self.manager_max_days && reachable_manager => {
                ApprovalAuthority::Manager
            }
            Role::Employee | Role::Manager | Role::Hr | Role::Management => {
                ApprovalAuthority::Management
            }
        }
    }

    pub fn may_decide<Id: PartialEq>(
        &self,
        approver: &Party<'_, Id>,
        applicant: &Party<'_, Id>,
        authority: ApprovalAuthority,
    ) -> Result<(), DecisionDenied> {
        if approver.id == applicant.id {
            return Err(DecisionDenied::OwnLeave);
        }
        if approver.role != authority.role() {
            return Err(DecisionDenied::WrongRole(authority));
        }
        if authority == ApprovalAuthority::Manager
            && !approver
                .departments
                .iter()
                .any(|dept| applicant.departments.contains(dept))
        {
            return Err(DecisionDenied::NoSharedDepartment);
        }
        Ok(())
    }
}
