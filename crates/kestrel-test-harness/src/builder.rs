//! [`TestKestrel`]: a fluent builder that assembles a single-node
//! [`CoordinationLayer`] plus every in-memory collaborator it needs,
//! behind one call. Generalizes the `harness()` helper
//! `kestrel::coordination::tests` hand-rolled for its own module and the
//! phase-1 "builder wrapping open + in-process server" shape this
//! workspace's teacher repo uses for its own cross-crate test harness.
//!
//! Not a mock: every collaborator behind the builder is the same
//! in-memory reference implementation (`InMemoryRevisionLog`,
//! `InMemorySchemaRegistry`, ...) the core ships for embedders who don't
//! need a real relational store yet (spec §9, "an embedded key-value
//! store is also acceptable").

use std::sync::Arc;
use std::time::Duration;

use kestrel::catalog::{InMemoryProjectDirectory, InMemoryRoleRegistry, InMemoryUserDirectory};
use kestrel::events::{ChannelEventSink, EventSink, NoopEventSink};
use kestrel::CoordinationLayer;
use kestrel_consensus::Replica;
use kestrel_rbac::RoleLevel;
use kestrel_revisions::InMemoryRevisionLog;
use kestrel_schema::InMemorySchemaRegistry;
use kestrel_types::{ProjectId, SchemaId, UserId};

use crate::router::{ClusterRouter, RoutedTransport};

/// Default timeout `TestKestrel::build` hands to every
/// `CoordinationLayer` operation — generous for an in-process,
/// single-node cluster where "majority" is always just the leader
/// itself.
const DEFAULT_PROPOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// A seed project, queued up by [`TestKestrelBuilder::with_project`] and
/// registered once the builder has allocated an id.
struct SeedProject {
    name: String,
    owner: UserId,
}

/// A seed schema, queued up by [`TestKestrelBuilder::with_schema`].
struct SeedSchema {
    name: String,
    schema_text: String,
    creator: UserId,
}

/// A seed role binding, queued up by [`TestKestrelBuilder::with_role`].
/// Resolved by project *name* rather than id since callers typically
/// don't have the allocated `ProjectId` in hand until `build()` runs.
struct SeedRole {
    user: UserId,
    project_name: String,
    level: RoleLevel,
}

/// Builds a single-node [`CoordinationLayer`] with every collaborator
/// pre-populated. Call [`TestKestrel::builder`] to start.
#[derive(Default)]
pub struct TestKestrelBuilder {
    node_id: String,
    projects: Vec<SeedProject>,
    schemas: Vec<SeedSchema>,
    roles: Vec<SeedRole>,
    event_channel_capacity: Option<usize>,
}

impl TestKestrelBuilder {
    fn new() -> Self {
        Self { node_id: "test-node".to_string(), ..Default::default() }
    }

    /// Overrides the single node's id (default: `"test-node"`).
    #[must_use]
    pub fn node_id(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = node_id.into();
        self
    }

    /// Seeds a project, owned by `owner`, before the layer is handed back.
    #[must_use]
    pub fn with_project(mut self, name: impl Into<String>, owner: UserId) -> Self {
        self.projects.push(SeedProject { name: name.into(), owner });
        self
    }

    /// Seeds a JSON Schema under `name`.
    #[must_use]
    pub fn with_schema(mut self, name: impl Into<String>, schema_text: impl Into<String>, creator: UserId) -> Self {
        self.schemas.push(SeedSchema { name: name.into(), schema_text: schema_text.into(), creator });
        self
    }

    /// Grants `user` `level` on the project most recently added via
    /// [`Self::with_project`] (by name) — call `with_project` first.
    #[must_use]
    pub fn with_role(mut self, user: UserId, project_name: impl Into<String>, level: RoleLevel) -> Self {
        self.roles.push(SeedRole { user, project_name: project_name.into(), level });
        self
    }

    /// Buffers emitted [`kestrel_types::DomainEvent`]s on a channel of
    /// the given capacity instead of discarding them, and returns the
    /// receiving half from [`TestKestrelBuilder::build`].
    #[must_use]
    pub fn with_event_channel(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = Some(capacity);
        self
    }

    /// Assembles the cluster and every collaborator, runs the
    /// single-node election so the replica is immediately a leader, and
    /// returns the ready-to-use harness.
    pub async fn build(self) -> TestKestrel {
        let router = ClusterRouter::new();
        let replicas = router.build_cluster(&[self.node_id.as_str()]).await;
        let replica = Arc::clone(&replicas[0]);
        assert!(replica.run_election().await, "single-node cluster must always elect itself leader");

        let revisions = Arc::new(InMemoryRevisionLog::new());
        let schemas = Arc::new(InMemorySchemaRegistry::new());
        let projects = Arc::new(InMemoryProjectDirectory::new());
        let roles = Arc::new(InMemoryRoleRegistry::new());
        let users = Arc::new(InMemoryUserDirectory::new());

        let mut schema_ids = Vec::with_capacity(self.schemas.len());
        for seed in self.schemas {
            let schema = schemas
                .create(&seed.name, &seed.schema_text, seed.creator)
                .expect("seed schema text must be a valid JSON Schema");
            schema_ids.push(schema.id);
        }

        let mut project_ids = Vec::with_capacity(self.projects.len());
        let mut project_by_name = std::collections::HashMap::new();
        for seed in self.projects {
            let project = projects.create(&seed.name, seed.owner).expect("seed project names must be unique");
            project_by_name.insert(seed.name, project.id);
            project_ids.push(project.id);
        }

        for seed in self.roles {
            let project_id = *project_by_name
                .get(&seed.project_name)
                .expect("with_role must name a project already added via with_project");
            roles.assign(seed.user, project_id, seed.level);
        }

        let (events, event_receiver): (Arc<dyn EventSink>, Option<tokio::sync::mpsc::Receiver<_>>) =
            match self.event_channel_capacity {
                Some(capacity) => {
                    let (sink, receiver) = ChannelEventSink::new(capacity);
                    (Arc::new(sink), Some(receiver))
                }
                None => (Arc::new(NoopEventSink), None),
            };

        let layer = CoordinationLayer::new(
            replica,
            revisions,
            schemas,
            projects,
            roles,
            users,
            events,
            DEFAULT_PROPOSE_TIMEOUT,
        );

        TestKestrel { layer, project_ids, schema_ids, event_receiver }
    }
}

/// A ready-to-exercise single-node `CoordinationLayer` plus the ids of
/// whatever projects and schemas the builder seeded, in the order they
/// were added.
pub struct TestKestrel {
    pub layer: CoordinationLayer<RoutedTransport>,
    pub project_ids: Vec<ProjectId>,
    pub schema_ids: Vec<SchemaId>,
    pub event_receiver: Option<tokio::sync::mpsc::Receiver<kestrel_types::DomainEvent>>,
}

impl TestKestrel {
    pub fn builder() -> TestKestrelBuilder {
        TestKestrelBuilder::new()
    }

    /// The id of the `n`th project added via `with_project`, in order.
    pub fn project(&self, n: usize) -> ProjectId {
        self.project_ids[n]
    }

    /// The id of the `n`th schema added via `with_schema`, in order.
    pub fn schema(&self, n: usize) -> SchemaId {
        self.schema_ids[n]
    }
}

/// Starts a bare single-node `Replica` with no `CoordinationLayer`
/// wrapped around it, for tests that only need the consensus + kernel
/// layers (spec §4.1/§4.2) without schemas, projects or roles.
pub async fn bare_replica(node_id: &str) -> Arc<Replica<RoutedTransport>> {
    let router = ClusterRouter::new();
    let replicas = router.build_cluster(&[node_id]).await;
    replicas[0].run_election().await;
    Arc::clone(&replicas[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn builder_seeds_projects_schemas_and_roles() {
        let harness = TestKestrel::builder()
            .with_schema("flags", r#"{"type":"object"}"#, UserId::new(1))
            .with_project("acme", UserId::new(1))
            .with_role(UserId::new(1), "acme", RoleLevel::Admin)
            .build()
            .await;

        let key = kestrel_types::ConfigKey::new("feature-flags");
        let doc = harness
            .layer
            .create_config(harness.project(0), key.clone(), harness.schema(0), serde_json::json!({"on": true}), UserId::new(1))
            .await
            .unwrap();
        assert_eq!(doc.version, kestrel_types::Version::FIRST);
    }

    #[tokio::test]
    async fn builder_without_role_rejects_writes() {
        let harness = TestKestrel::builder()
            .with_schema("flags", r#"{"type":"object"}"#, UserId::new(1))
            .with_project("acme", UserId::new(1))
            .build()
            .await;

        let err = harness
            .layer
            .create_config(harness.project(0), kestrel_types::ConfigKey::new("k"), harness.schema(0), serde_json::json!({}), UserId::new(2))
            .await
            .unwrap_err();
        assert!(matches!(err, kestrel::CoordinationError::Forbidden { .. }));
    }

    #[tokio::test]
    async fn event_channel_receives_published_events() {
        let mut harness = TestKestrel::builder()
            .with_schema("flags", r#"{"type":"object"}"#, UserId::new(1))
            .with_project("acme", UserId::new(1))
            .with_role(UserId::new(1), "acme", RoleLevel::Admin)
            .with_event_channel(8)
            .build()
            .await;

        harness
            .layer
            .create_config(harness.project(0), kestrel_types::ConfigKey::new("k"), harness.schema(0), serde_json::json!({}), UserId::new(1))
            .await
            .unwrap();

        let event = harness.event_receiver.as_mut().unwrap().recv().await.unwrap();
        assert!(matches!(event, kestrel_types::DomainEvent::ConfigCreated { .. }));
    }

    #[tokio::test]
    async fn bare_replica_serves_fsm_reads_with_no_coordination_layer() {
        let replica = bare_replica("solo").await;
        assert!(replica.is_leader().await);
        assert!(replica.get(ProjectId::new(1), &kestrel_types::ConfigKey::new("k")).is_none());
    }
}
