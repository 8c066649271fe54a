//! Authorization enforcement for configuration operations.
//!
//! The `RoleRegistry` trait is the coordination layer's lookup port into
//! whatever catalog collaborator stores `(user_id, project_id) ->
//! role_level` bindings (spec §3, Role; §4.5, "Authorization coupling").
//! Enforcement itself is pure: given a looked-up level and a required
//! level, `require` either succeeds or returns `RbacError::Forbidden`.

use thiserror::Error;

use kestrel_types::{ProjectId, UserId};

use crate::roles::RoleLevel;

/// The operation-class requirement a coordination-layer call enforces
/// before ever reaching consensus (spec §4.5): reads need `Viewer`,
/// writes need `Editor`, rollback and delete need `Admin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    Write,
    RollbackOrDelete,
}

impl Operation {
    pub fn required_level(self) -> RoleLevel {
        match self {
            Operation::Read => RoleLevel::Viewer,
            Operation::Write => RoleLevel::Editor,
            Operation::RollbackOrDelete => RoleLevel::Admin,
        }
    }
}

/// Lookup port into the catalog collaborator's role bindings.
///
/// A role is looked up fresh on every call — no caching inside this crate
/// — because role assignments are not part of the replicated state and can
/// change between a read and the write it's gating (spec §3, "Ownership").
pub trait RoleRegistry: Send + Sync {
    fn role_of(&self, user_id: UserId, project_id: ProjectId) -> Option<RoleLevel>;
}

/// Looks up the caller's role and checks it against `operation`'s
/// requirement. Any level value other than a recognized `RoleLevel` — in
/// this in-process model, the absence of an assignment — is treated as no
/// access (spec §4.5, "Role ordering").
#[tracing::instrument(skip(registry), fields(%user_id, %project_id, ?operation))]
pub fn require(
    registry: &dyn RoleRegistry,
    user_id: UserId,
    project_id: ProjectId,
    operation: Operation,
) -> Result<RoleLevel, RbacError> {
    let required = operation.required_level();
    match registry.role_of(user_id, project_id) {
        Some(level) if level.has_minimum(required) => Ok(level),
        Some(level) => {
            tracing::warn!(%level, %required, "role below required level");
            Err(RbacError::Forbidden { required })
        }
        None => {
            tracing::warn!(%required, "no role assignment for project");
            Err(RbacError::Forbidden { required })
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RbacError {
    #[error("requires at least {required} role on this project")]
    Forbidden { required: RoleLevel },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeRegistry(Mutex<HashMap<(UserId, ProjectId), RoleLevel>>);

    impl FakeRegistry {
        fn with(user: UserId, project: ProjectId, level: RoleLevel) -> Self {
            let mut map = HashMap::new();
            map.insert((user, project), level);
            Self(Mutex::new(map))
        }
    }

    impl RoleRegistry for FakeRegistry {
        fn role_of(&self, user_id: UserId, project_id: ProjectId) -> Option<RoleLevel> {
            self.0.lock().unwrap().get(&(user_id, project_id)).copied()
        }
    }

    #[test]
    fn viewer_can_read_but_not_write() {
        let registry = FakeRegistry::with(UserId::new(1), ProjectId::new(1), RoleLevel::Viewer);
        assert!(require(&registry, UserId::new(1), ProjectId::new(1), Operation::Read).is_ok());
        assert!(require(&registry, UserId::new(1), ProjectId::new(1), Operation::Write).is_err());
    }

    #[test]
    fn editor_can_write_but_not_rollback() {
        let registry = FakeRegistry::with(UserId::new(1), ProjectId::new(1), RoleLevel::Editor);
        assert!(require(&registry, UserId::new(1), ProjectId::new(1), Operation::Write).is_ok());
        assert!(
            require(&registry, UserId::new(1), ProjectId::new(1), Operation::RollbackOrDelete)
                .is_err()
        );
    }

    #[test]
    fn admin_can_do_everything() {
        let registry = FakeRegistry::with(UserId::new(1), ProjectId::new(1), RoleLevel::Admin);
        for op in [Operation::Read, Operation::Write, Operation::RollbackOrDelete] {
            assert!(require(&registry, UserId::new(1), ProjectId::new(1), op).is_ok());
        }
    }

    #[test]
    fn missing_assignment_is_forbidden_not_a_panic() {
        let registry = FakeRegistry::default();
        assert!(require(&registry, UserId::new(9), ProjectId::new(9), Operation::Read).is_err());
    }
}
