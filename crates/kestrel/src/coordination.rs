//! `CoordinationLayer`: the write-path orchestrator (spec §4.5).
//!
//! Write path: validate inputs → fetch current version and schema →
//! `SchemaRegistry` (validate content) → `ConsensusLayer` (propose
//! command) → `ReplicatedFSM` (apply on majority commit) → `RevisionLog`
//! (append immutable record) → best-effort event. Read path bypasses
//! consensus entirely and serves straight from the FSM.
//!
//! Authorization runs first and short-circuits before any of the above:
//! a caller without the required role never reaches consensus or the
//! schema registry.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;

use kestrel_consensus::{Replica, Transport};
use kestrel_kernel::ConfigDocumentOutcome;
use kestrel_rbac::{require, Operation, RoleRegistry};
use kestrel_revisions::{InMemoryRevisionLog, RevisionLogError};
use kestrel_schema::{InMemorySchemaRegistry, ValidationOutcome};
use kestrel_types::{Command, ConfigDocument, ConfigKey, ConfigRevision, DomainEvent, ProjectId, SchemaId, UserId, Version};

use crate::catalog::{ProjectDirectory, UserDirectory};
use crate::error::CoordinationError;
use crate::events::EventSink;

/// What an unauthenticated, API-key-scoped read is allowed to see (spec
/// §4.5, `ReadConfigByAPIKey`: "no metadata leakage to unauthenticated
/// clients" — no `project_id`, `schema_id`, or `updated_by`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublicConfigView {
    pub key: ConfigKey,
    pub version: Version,
    pub content: serde_json::Value,
}

/// One row of `GetHistory`'s output: a revision annotated with the
/// creator's display email (spec §4.5, "delegates to RevisionLog with
/// join on user emails for display").
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub revision: ConfigRevision,
    pub creator_email: Option<String>,
}

/// Orchestrates every `CoordinationLayer` operation in spec §4.5 over a
/// single replica and its collaborators.
pub struct CoordinationLayer<T: Transport> {
    replica: Arc<Replica<T>>,
    revisions: Arc<InMemoryRevisionLog>,
    schemas: Arc<InMemorySchemaRegistry>,
    projects: Arc<dyn ProjectDirectory>,
    roles: Arc<dyn RoleRegistry>,
    users: Arc<dyn UserDirectory>,
    events: Arc<dyn EventSink>,
    propose_timeout: Duration,
}

impl<T: Transport + 'static> CoordinationLayer<T> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        replica: Arc<Replica<T>>,
        revisions: Arc<InMemoryRevisionLog>,
        schemas: Arc<InMemorySchemaRegistry>,
        projects: Arc<dyn ProjectDirectory>,
        roles: Arc<dyn RoleRegistry>,
        users: Arc<dyn UserDirectory>,
        events: Arc<dyn EventSink>,
        propose_timeout: Duration,
    ) -> Self {
        Self { replica, revisions, schemas, projects, roles, users, events, propose_timeout }
    }

    fn authorize(&self, actor_id: UserId, project_id: ProjectId, op: Operation) -> Result<(), CoordinationError> {
        require(self.roles.as_ref(), actor_id, project_id, op)?;
        Ok(())
    }

    fn validate_against(&self, schema_id: SchemaId, content: &serde_json::Value) -> Result<(), CoordinationError> {
        match self.schemas.validate(schema_id, content)? {
            ValidationOutcome::Valid => Ok(()),
            ValidationOutcome::Errors(errors) => Err(CoordinationError::SchemaValidationFailed(errors)),
        }
    }

    async fn propose(&self, command: Command) -> Result<(ConfigDocumentOutcome, Vec<kestrel_kernel::Effect>), CoordinationError> {
        let applied = self.replica.propose(command, self.propose_timeout).await?;
        Ok(applied?)
    }

    /// Records the write just committed by consensus into `RevisionLog`.
    /// An `AppendFailed` (the relational store was unreachable, say) does
    /// not fail the caller's operation — the FSM already committed the
    /// mutation, so the write stands regardless of whether history could
    /// be recorded for it (spec §4.3: "the write is still considered
    /// accepted... surfaced as a detectable inconsistency, not silently
    /// swallowed"). It is surfaced here as a `tracing::warn!` rather than
    /// swallowed outright. Any other error (e.g. `AlreadyExists`, which
    /// would mean the log's own invariant is already broken) still fails
    /// the operation.
    fn record_revision(
        &self,
        project_id: ProjectId,
        key: ConfigKey,
        version: Version,
        content: serde_json::Value,
        actor_id: UserId,
    ) -> Result<(), CoordinationError> {
        match self.revisions.append(project_id, key.clone(), version, content, actor_id) {
            Ok(_) => Ok(()),
            Err(RevisionLogError::AppendFailed { reason, .. }) => {
                tracing::warn!(%project_id, %key, %version, reason, "revision log append failed after commit; write stands");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// spec §4.5, `CreateConfig`.
    #[tracing::instrument(skip(self, content), fields(%project_id, %key))]
    pub async fn create_config(
        &self,
        project_id: ProjectId,
        key: ConfigKey,
        schema_id: SchemaId,
        content: serde_json::Value,
        actor_id: UserId,
    ) -> Result<ConfigDocument, CoordinationError> {
        self.authorize(actor_id, project_id, Operation::Write)?;

        self.projects
            .get(project_id)
            .ok_or_else(|| CoordinationError::not_found(format!("project {project_id} not found")))?;
        self.schemas
            .get(schema_id)
            .ok_or_else(|| CoordinationError::not_found(format!("schema {schema_id} not found")))?;
        self.validate_against(schema_id, &content)?;

        if self.replica.get(project_id, &key).is_some() {
            return Err(CoordinationError::AlreadyExists(format!(
                "config already exists: project={project_id} key={key}"
            )));
        }

        let command = Command::Create { project_id, key: key.clone(), schema_id, content: content.clone(), actor_id };
        let (outcome, _effects) = self.propose(command).await?;
        let document = expect_live(outcome);

        self.record_revision(project_id, key.clone(), document.version, content.clone(), actor_id)?;
        self.events.publish(DomainEvent::ConfigCreated {
            project_id,
            key,
            to_version: document.version,
            content,
            actor_id,
            timestamp: Utc::now(),
        });
        Ok(document)
    }

    /// spec §4.5, `ReadConfig`. Served directly from the FSM; never
    /// blocks on consensus.
    pub fn read_config(
        &self,
        project_id: ProjectId,
        key: &ConfigKey,
        actor_id: UserId,
    ) -> Result<ConfigDocument, CoordinationError> {
        self.authorize(actor_id, project_id, Operation::Read)?;
        self.replica
            .get(project_id, key)
            .ok_or_else(|| CoordinationError::not_found(format!("config not found: project={project_id} key={key}")))
    }

    /// spec §4.5, `ReadConfigByAPIKey`. No role check: the api_key itself
    /// is the authentication, and the caller is anonymous and unscoped
    /// beyond the resolved project — so the view returned is stripped of
    /// metadata a member could otherwise see.
    pub fn read_config_by_api_key(&self, api_key: &str, key: &ConfigKey) -> Result<PublicConfigView, CoordinationError> {
        let project = self.projects.get_by_api_key(api_key).ok_or(CoordinationError::Unauthorized)?;
        let document = self
            .replica
            .get(project.id, key)
            .ok_or_else(|| CoordinationError::not_found(format!("config not found: key={key}")))?;
        Ok(PublicConfigView { key: document.key, version: document.version, content: document.content })
    }

    /// spec §4.5, `UpdateConfig`.
    #[tracing::instrument(skip(self, content), fields(%project_id, %key, %expected_version))]
    pub async fn update_config(
        &self,
        project_id: ProjectId,
        key: ConfigKey,
        expected_version: Version,
        content: serde_json::Value,
        actor_id: UserId,
    ) -> Result<ConfigDocument, CoordinationError> {
        self.authorize(actor_id, project_id, Operation::Write)?;

        let current = self
            .replica
            .get(project_id, &key)
            .ok_or_else(|| CoordinationError::not_found(format!("config not found: project={project_id} key={key}")))?;
        self.validate_against(current.schema_id, &content)?;

        let command = Command::Update { project_id, key: key.clone(), expected_version, content: content.clone(), actor_id };
        let (outcome, _effects) = self.propose(command).await?;
        let document = expect_live(outcome);

        self.record_revision(project_id, key.clone(), document.version, content.clone(), actor_id)?;
        self.events.publish(DomainEvent::ConfigUpdated {
            project_id,
            key,
            from_version: expected_version,
            to_version: document.version,
            content,
            actor_id,
            timestamp: Utc::now(),
        });
        Ok(document)
    }

    /// spec §4.5, `RollbackConfig`. Preconditions: `target_version >= 1`,
    /// `target_version < current.version`, `expected_version ==
    /// current.version`. The retrieved content is re-validated against
    /// the *current* (not the historical) schema before being re-applied
    /// as an ordinary `Update` — the FSM draws no distinction between an
    /// update and a rollback.
    #[tracing::instrument(skip(self), fields(%project_id, %key, %target_version, %expected_version))]
    pub async fn rollback_config(
        &self,
        project_id: ProjectId,
        key: ConfigKey,
        target_version: Version,
        expected_version: Version,
        actor_id: UserId,
    ) -> Result<ConfigDocument, CoordinationError> {
        self.authorize(actor_id, project_id, Operation::RollbackOrDelete)?;

        let current = self
            .replica
            .get(project_id, &key)
            .ok_or_else(|| CoordinationError::not_found(format!("config not found: project={project_id} key={key}")))?;

        if target_version.as_u64() < 1 {
            return Err(CoordinationError::InvalidInput("target_version must be >= 1".into()));
        }
        if target_version >= current.version {
            return Err(CoordinationError::InvalidInput(format!(
                "target_version {target_version} must be less than the current version {}",
                current.version
            )));
        }
        if expected_version != current.version {
            return Err(CoordinationError::VersionConflict { expected: expected_version, current: current.version });
        }

        let target_revision = self
            .revisions
            .get_by_version(project_id, &key, target_version)
            .ok_or_else(|| CoordinationError::not_found(format!("revision {project_id}/{key}@{target_version} not found")))?;
        self.validate_against(current.schema_id, &target_revision.content)?;

        let command = Command::Update {
            project_id,
            key: key.clone(),
            expected_version: current.version,
            content: target_revision.content.clone(),
            actor_id,
        };
        let (outcome, _effects) = self.propose(command).await?;
        let document = expect_live(outcome);

        self.record_revision(project_id, key.clone(), document.version, target_revision.content.clone(), actor_id)?;
        self.events.publish(DomainEvent::ConfigRolledBack {
            project_id,
            key,
            from_version: current.version,
            to_version: document.version,
            content: target_revision.content,
            actor_id,
            timestamp: Utc::now(),
        });
        Ok(document)
    }

    /// spec §4.5, `DeleteConfig`. Removes the live entry; all historical
    /// revisions remain queryable through `RevisionLog`.
    #[tracing::instrument(skip(self), fields(%project_id, %key))]
    pub async fn delete_config(&self, project_id: ProjectId, key: ConfigKey, actor_id: UserId) -> Result<(), CoordinationError> {
        self.authorize(actor_id, project_id, Operation::RollbackOrDelete)?;

        let current = self
            .replica
            .get(project_id, &key)
            .ok_or_else(|| CoordinationError::not_found(format!("config not found: project={project_id} key={key}")))?;

        let command = Command::Delete { project_id, key: key.clone(), actor_id };
        self.propose(command).await?;

        self.events.publish(DomainEvent::ConfigDeleted {
            project_id,
            key,
            from_version: current.version,
            actor_id,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// spec §4.5, `GetHistory`.
    pub fn get_history(
        &self,
        project_id: ProjectId,
        key: &ConfigKey,
        limit: usize,
        actor_id: UserId,
    ) -> Result<Vec<HistoryEntry>, CoordinationError> {
        self.authorize(actor_id, project_id, Operation::Read)?;
        Ok(self
            .revisions
            .list_by_key(project_id, key, limit, 0)
            .into_iter()
            .map(|revision| {
                let creator_email = self.users.email_of(revision.creator_id);
                HistoryEntry { revision, creator_email }
            })
            .collect())
    }
}

/// `Create`/`Update` always produce `ConfigDocumentOutcome::Live`; only
/// `Delete` produces `Deleted`, and this helper is never called on a
/// `Delete` outcome.
fn expect_live(outcome: ConfigDocumentOutcome) -> ConfigDocument {
    match outcome {
        ConfigDocumentOutcome::Live(doc) => doc,
        ConfigDocumentOutcome::Deleted => unreachable!("Create/Update never produce ConfigDocumentOutcome::Deleted"),
    }
}
