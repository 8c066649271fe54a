//! Error taxonomy for the `RevisionLog` contract (spec §4.3, §7).

use thiserror::Error;

use kestrel_types::{ConfigKey, ProjectId, Version};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RevisionLogError {
    #[error("revision already exists: project={project_id} key={key} version={version}")]
    AlreadyExists {
        project_id: ProjectId,
        key: ConfigKey,
        version: Version,
    },

    #[error("no revision found: project={project_id} key={key} version={version:?}")]
    NotFound {
        project_id: ProjectId,
        key: ConfigKey,
        version: Option<Version>,
    },

    /// The append-after-commit step failed (e.g. relational store
    /// unavailable). Spec §4.3: the write is still considered accepted —
    /// the FSM remains authoritative for "current" — but this is surfaced
    /// as a detectable inconsistency, not silently swallowed.
    #[error("revision append failed for project={project_id} key={key} version={version}: {reason}")]
    AppendFailed {
        project_id: ProjectId,
        key: ConfigKey,
        version: Version,
        reason: String,
    },
}
