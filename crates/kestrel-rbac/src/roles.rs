//! Role definitions for the configuration core's authorization model.
//!
//! Spec §3: a totally ordered three-level role, `admin ⊃ editor ⊃ viewer`,
//! bound per `(user_id, project_id)`. A user holds at most one role per
//! project.

use serde::{Deserialize, Serialize};

use kestrel_types::{ProjectId, UserId};

/// A role level within a project. Ordered by `PartialOrd`/`Ord` derive
/// order — declaration order below is load-bearing: `Viewer < Editor <
/// Admin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RoleLevel {
    Viewer,
    Editor,
    Admin,
}

impl RoleLevel {
    /// True iff `self` is at or above `required` in the partial order
    /// `admin > editor > viewer` (spec §4.5, "Role ordering").
    pub fn has_minimum(self, required: RoleLevel) -> bool {
        self >= required
    }
}

impl std::fmt::Display for RoleLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RoleLevel::Viewer => "viewer",
            RoleLevel::Editor => "editor",
            RoleLevel::Admin => "admin",
        };
        write!(f, "{s}")
    }
}

/// A `(user_id, project_id) -> role_level` binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub user_id: UserId,
    pub project_id: ProjectId,
    pub level: RoleLevel,
}
