//! # kestrel-types: shared domain types for the configuration core
//!
//! This crate contains the types shared across every layer of the
//! replicated configuration store:
//! - Entity IDs ([`ProjectId`], [`SchemaId`], [`UserId`], [`RevisionId`])
//! - The optimistic-locking [`Version`] counter
//! - The live and historical document shapes ([`ConfigDocument`],
//!   [`ConfigRevision`])
//! - The replicated command union ([`Command`])
//! - Out-of-band notification events ([`DomainEvent`])
//!
//! None of these types touch I/O; they are the vocabulary every other
//! `kestrel-*` crate shares so that command, state and event shapes never
//! drift between the kernel, the consensus layer and the coordination
//! layer.

use std::fmt::{self, Display};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Entity IDs — all Copy (cheap 8-byte values)
// ============================================================================

macro_rules! opaque_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(u64);

        impl $name {
            pub const fn new(id: u64) -> Self {
                Self(id)
            }

            pub const fn as_u64(self) -> u64 {
                self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }

        impl From<$name> for u64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

opaque_id!(ProjectId, "Unique identifier for a project (tenant).");
opaque_id!(SchemaId, "Unique identifier for a JSON Schema document.");
opaque_id!(UserId, "Unique identifier for a user.");
opaque_id!(RevisionId, "Unique identifier for a historical revision row.");

/// The monotone optimistic-concurrency counter attached to every
/// [`ConfigDocument`].
///
/// Starts at 1 on creation and increments by exactly 1 on every accepted
/// `Update` or rollback. Never decreases, never skips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version(u64);

impl Version {
    pub const FIRST: Version = Version(1);

    pub const fn new(v: u64) -> Self {
        Self(v)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the next version in sequence.
    #[must_use]
    pub const fn next(self) -> Self {
        Version(self.0 + 1)
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The name of a configuration key within a project.
///
/// Wrapped rather than a bare `String` so that the composite identity
/// `(ProjectId, ConfigKey)` reads clearly at every call site.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConfigKey(String);

impl ConfigKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ConfigKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ConfigKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// ============================================================================
// Project
// ============================================================================

/// Identity for a tenant. Owns configs; lifecycle independent of configs but
/// deleting a project cascades.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    /// Opaque bearer credential, unique across all projects.
    pub api_key: String,
    pub owner_user_id: UserId,
}

// ============================================================================
// Live state — ConfigDocument
// ============================================================================

/// The authoritative current value of a configuration key within a project.
///
/// Held exclusively by the `ReplicatedFSM`. Composite identity is
/// `(project_id, key)`, unique within a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigDocument {
    pub project_id: ProjectId,
    pub key: ConfigKey,
    pub version: Version,
    pub schema_id: SchemaId,
    pub content: serde_json::Value,
    pub updated_by: UserId,
}

// ============================================================================
// Historical state — ConfigRevision
// ============================================================================

/// One immutable row per accepted version of a `ConfigDocument`.
///
/// Held exclusively by the `RevisionLog`. For a given `(project_id, key)`,
/// revisions form a dense, strictly increasing sequence of versions
/// starting at 1: no gaps, no duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigRevision {
    pub revision_id: RevisionId,
    pub project_id: ProjectId,
    pub key: ConfigKey,
    pub version: Version,
    pub content: serde_json::Value,
    pub creator_id: UserId,
    pub timestamp: DateTime<Utc>,
}

// ============================================================================
// Command — the replicated tagged union
// ============================================================================

/// Tagged union of commands accepted into the replicated log.
///
/// `Apply`-ing a `Command` against the `ReplicatedFSM` is the only way live
/// state changes; every replica applies the same log prefix and reaches
/// the same state (see [`crate::Command`] determinism requirement in the
/// kernel crate).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    Create {
        project_id: ProjectId,
        key: ConfigKey,
        schema_id: SchemaId,
        content: serde_json::Value,
        actor_id: UserId,
    },
    Update {
        project_id: ProjectId,
        key: ConfigKey,
        expected_version: Version,
        content: serde_json::Value,
        actor_id: UserId,
    },
    Delete {
        project_id: ProjectId,
        key: ConfigKey,
        actor_id: UserId,
    },
}

impl Command {
    pub fn project_id(&self) -> ProjectId {
        match self {
            Command::Create { project_id, .. }
            | Command::Update { project_id, .. }
            | Command::Delete { project_id, .. } => *project_id,
        }
    }

    pub fn key(&self) -> &ConfigKey {
        match self {
            Command::Create { key, .. } | Command::Update { key, .. } | Command::Delete { key, .. } => key,
        }
    }

    pub fn actor_id(&self) -> UserId {
        match self {
            Command::Create { actor_id, .. }
            | Command::Update { actor_id, .. }
            | Command::Delete { actor_id, .. } => *actor_id,
        }
    }
}

// ============================================================================
// Events — best-effort, out-of-band notifications
// ============================================================================

/// Out-of-core notification emitted alongside an accepted mutation.
///
/// Events are a best-effort notification stream: they are not durable
/// within the core and not delivered transactionally with the commit.
/// Consumers must treat them as hints (spec §9, "Event emission").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DomainEvent {
    ConfigCreated {
        project_id: ProjectId,
        key: ConfigKey,
        to_version: Version,
        content: serde_json::Value,
        actor_id: UserId,
        timestamp: DateTime<Utc>,
    },
    ConfigUpdated {
        project_id: ProjectId,
        key: ConfigKey,
        from_version: Version,
        to_version: Version,
        content: serde_json::Value,
        actor_id: UserId,
        timestamp: DateTime<Utc>,
    },
    ConfigRolledBack {
        project_id: ProjectId,
        key: ConfigKey,
        from_version: Version,
        to_version: Version,
        content: serde_json::Value,
        actor_id: UserId,
        timestamp: DateTime<Utc>,
    },
    ConfigDeleted {
        project_id: ProjectId,
        key: ConfigKey,
        from_version: Version,
        actor_id: UserId,
        timestamp: DateTime<Utc>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_increments_by_one() {
        let v = Version::FIRST;
        assert_eq!(v.next().as_u64(), 2);
        assert_eq!(v.next().next().as_u64(), 3);
    }

    #[test]
    fn ids_round_trip_through_u64() {
        let id = ProjectId::new(42);
        assert_eq!(u64::from(id), 42);
        assert_eq!(ProjectId::from(42u64), id);
    }

    #[test]
    fn command_accessors_match_variant_fields() {
        let cmd = Command::Update {
            project_id: ProjectId::new(1),
            key: ConfigKey::new("feature-flags"),
            expected_version: Version::FIRST,
            content: serde_json::json!({"dark_mode": true}),
            actor_id: UserId::new(7),
        };
        assert_eq!(cmd.project_id(), ProjectId::new(1));
        assert_eq!(cmd.key().as_str(), "feature-flags");
        assert_eq!(cmd.actor_id(), UserId::new(7));
    }
}
