//! The catalog collaborator.
//!
//! Spec §1/§3/§9 scope projects, users and role bindings out of the core
//! as an unspecified "relational collaborator" and only require its
//! *operation contract*. This repo still needs something behind that
//! contract to be runnable and testable, so this module defines the
//! trait surfaces the `CoordinationLayer` depends on
//! ([`ProjectDirectory`], [`UserDirectory`]) plus in-memory reference
//! implementations. The physical relational schema remains out of scope;
//! these are test/reference doubles, not a production store — the same
//! role `kestrel_schema::InMemorySchemaRegistry` plays for schemas.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use kestrel_rbac::{RoleLevel, RoleRegistry};
use kestrel_types::{Project, ProjectId, UserId};

/// Failure modes for catalog operations (spec §7 kinds `AlreadyExists`/
/// `NotFound`, scoped to the project directory).
#[derive(Debug, Clone, thiserror::Error)]
pub enum CatalogError {
    #[error("a project named '{0}' already exists")]
    NameExists(String),
    #[error("project not found")]
    NotFound,
}

/// Lookup port for projects (spec §3, Project; §4.5,
/// `ReadConfigByAPIKey`'s "resolves project by api_key").
pub trait ProjectDirectory: Send + Sync {
    fn create(&self, name: &str, owner_user_id: UserId) -> Result<Project, CatalogError>;
    fn get(&self, id: ProjectId) -> Option<Project>;
    fn get_by_name(&self, name: &str) -> Option<Project>;
    fn get_by_api_key(&self, api_key: &str) -> Option<Project>;
    fn list(&self) -> Vec<Project>;
    /// Cascading delete: spec §3, "deleting a project cascades" — this
    /// directory only removes its own row; cascading the live FSM
    /// documents and role bindings is the coordination layer's job since
    /// only it holds references to every collaborator.
    fn delete(&self, id: ProjectId) -> Result<(), CatalogError>;
}

/// Opaque, byte-random bearer token generation for a new project's API
/// key (spec §SUPPLEMENT-2: "API-key *generation* is in scope as a thin
/// byte-opaque token, not a credential-hashing subsystem").
fn generate_api_key() -> String {
    let mut bytes = [0u8; 32];
    rand::Rng::fill(&mut rand::thread_rng(), &mut bytes);
    blake3::hash(&bytes).to_hex().to_string()
}

/// In-memory `ProjectDirectory`, guarded by a single `RwLock` — project
/// mutation is rare relative to config reads/writes, matching the coarse
/// locking choice `kestrel_schema::InMemorySchemaRegistry` makes for the
/// same reason.
#[derive(Default)]
pub struct InMemoryProjectDirectory {
    projects: RwLock<HashMap<ProjectId, Project>>,
    next_id: AtomicU64,
}

impl InMemoryProjectDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&self) -> ProjectId {
        ProjectId::new(self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

impl ProjectDirectory for InMemoryProjectDirectory {
    fn create(&self, name: &str, owner_user_id: UserId) -> Result<Project, CatalogError> {
        let mut guard = self.projects.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        if guard.values().any(|p| p.name == name) {
            return Err(CatalogError::NameExists(name.to_string()));
        }

        let project = Project {
            id: self.allocate_id(),
            name: name.to_string(),
            api_key: generate_api_key(),
            owner_user_id,
        };
        guard.insert(project.id, project.clone());
        tracing::info!(project_id = %project.id, %name, "project created");
        Ok(project)
    }

    fn get(&self, id: ProjectId) -> Option<Project> {
        self.projects.read().unwrap_or_else(std::sync::PoisonError::into_inner).get(&id).cloned()
    }

    fn get_by_name(&self, name: &str) -> Option<Project> {
        self.projects
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .values()
            .find(|p| p.name == name)
            .cloned()
    }

    fn get_by_api_key(&self, api_key: &str) -> Option<Project> {
        self.projects
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .values()
            .find(|p| p.api_key == api_key)
            .cloned()
    }

    fn list(&self) -> Vec<Project> {
        self.projects.read().unwrap_or_else(std::sync::PoisonError::into_inner).values().cloned().collect()
    }

    fn delete(&self, id: ProjectId) -> Result<(), CatalogError> {
        let mut guard = self.projects.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        if guard.remove(&id).is_none() {
            return Err(CatalogError::NotFound);
        }
        tracing::info!(project_id = %id, "project deleted");
        Ok(())
    }
}

/// Lookup port for the user email used to annotate `GetHistory` rows
/// (spec §4.5, "delegates to RevisionLog with join on user emails for
/// display"). Password hashing and user CRUD are out of scope (spec §1);
/// this is a thin directory covering only the lookup the core itself
/// needs.
pub trait UserDirectory: Send + Sync {
    fn email_of(&self, user_id: UserId) -> Option<String>;
}

/// In-memory `UserDirectory` reference double.
#[derive(Default)]
pub struct InMemoryUserDirectory {
    emails: RwLock<HashMap<UserId, String>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, user_id: UserId, email: impl Into<String>) {
        self.emails.write().unwrap_or_else(std::sync::PoisonError::into_inner).insert(user_id, email.into());
    }
}

impl UserDirectory for InMemoryUserDirectory {
    fn email_of(&self, user_id: UserId) -> Option<String> {
        self.emails.read().unwrap_or_else(std::sync::PoisonError::into_inner).get(&user_id).cloned()
    }
}

/// In-memory `RoleRegistry` reference double backing `kestrel_rbac`'s
/// enforcement (spec §3, Role: "at most one role per project").
#[derive(Default)]
pub struct InMemoryRoleRegistry {
    roles: RwLock<HashMap<(UserId, ProjectId), RoleLevel>>,
}

impl InMemoryRoleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns (or overwrites) the single role a user may hold on a
    /// project (spec §3, Role).
    pub fn assign(&self, user_id: UserId, project_id: ProjectId, level: RoleLevel) {
        self.roles.write().unwrap_or_else(std::sync::PoisonError::into_inner).insert((user_id, project_id), level);
    }

    pub fn revoke(&self, user_id: UserId, project_id: ProjectId) {
        self.roles.write().unwrap_or_else(std::sync::PoisonError::into_inner).remove(&(user_id, project_id));
    }
}

impl RoleRegistry for InMemoryRoleRegistry {
    fn role_of(&self, user_id: UserId, project_id: ProjectId) -> Option<RoleLevel> {
        self.roles.read().unwrap_or_else(std::sync::PoisonError::into_inner).get(&(user_id, project_id)).copied()
    }
}
