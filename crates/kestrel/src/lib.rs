//! # kestrel: the CoordinationLayer crate
//!
//! This crate wires together the replicated configuration core: the pure
//! [`kestrel_kernel::ReplicatedFsm`], the Raft [`kestrel_consensus::Replica`],
//! the [`kestrel_revisions::InMemoryRevisionLog`], the
//! [`kestrel_schema::InMemorySchemaRegistry`] and [`kestrel_rbac`]
//! enforcement, plus the catalog collaborator ([`catalog`]) that stands
//! in for the out-of-core relational store (spec §1, §3).
//!
//! # Architecture
//!
//! ```text
//! client request
//!       │
//!       ▼
//! ┌───────────────────┐     validate → authorize → propose
//! │ CoordinationLayer  │ ───────────────────────────────────┐
//! └───────────────────┘                                     │
//!       │  reads bypass consensus                           ▼
//!       ▼                                          ┌──────────────────┐
//! ┌───────────────┐   commit on majority            │  ConsensusLayer   │
//! │ ReplicatedFSM  │ ◀────────────────────────────── │   (Replica<T>)    │
//! └───────────────┘                                  └──────────────────┘
//!       │
//!       ▼
//! ┌───────────────┐
//! │  RevisionLog   │  (immutable history, best-effort DomainEvent)
//! └───────────────┘
//! ```
//!
//! # Quick start
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use kestrel::{CoordinationLayer, catalog::{InMemoryProjectDirectory, InMemoryRoleRegistry, InMemoryUserDirectory}, events::NoopEventSink};
//!
//! let layer = CoordinationLayer::new(
//!     replica, revisions, schemas,
//!     Arc::new(InMemoryProjectDirectory::new()),
//!     Arc::new(InMemoryRoleRegistry::new()),
//!     Arc::new(InMemoryUserDirectory::new()),
//!     Arc::new(NoopEventSink),
//!     Duration::from_secs(5),
//! );
//! layer.create_config(project_id, key, schema_id, content, actor_id).await?;
//! ```

pub mod catalog;
pub mod coordination;
pub mod error;
pub mod events;

pub use catalog::{CatalogError, InMemoryProjectDirectory, InMemoryRoleRegistry, InMemoryUserDirectory, ProjectDirectory, UserDirectory};
pub use coordination::{CoordinationLayer, HistoryEntry, PublicConfigView};
pub use error::CoordinationError;
pub use events::{ChannelEventSink, EventSink, NoopEventSink};

// Re-exported so embedders pulling in only `kestrel` still have the
// vocabulary types (spec §3) and the collaborator crates at hand without
// an extra `Cargo.toml` entry.
pub use kestrel_consensus::{Membership, NodeConfig, Replica, Transport};
pub use kestrel_kernel::ReplicatedFsm;
pub use kestrel_rbac::{Operation, RoleLevel, RoleRegistry};
pub use kestrel_revisions::InMemoryRevisionLog;
pub use kestrel_schema::InMemorySchemaRegistry;
pub use kestrel_types::{Command, ConfigDocument, ConfigKey, ConfigRevision, DomainEvent, Project, ProjectId, SchemaId, UserId, Version};
