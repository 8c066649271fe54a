//! `CoordinationError`: the taxonomy from spec §7.
//!
//! This is the only error type that is meant to cross the boundary to a
//! hypothetical transport layer: it implements
//! `From` for every leaf error produced by the components the
//! `CoordinationLayer` orchestrates, so `?` composes across crate
//! boundaries without losing the kind a transport would need for HTTP
//! status mapping.

use kestrel_consensus::ConsensusError;
use kestrel_kernel::KernelError;
use kestrel_rbac::{RbacError, RoleLevel};
use kestrel_revisions::RevisionLogError;
use kestrel_schema::{FieldError, SchemaError};
use kestrel_types::Version;

/// Error kinds a `CoordinationLayer` operation can return (spec §7).
///
/// Variant names are kinds, not HTTP status codes — a transport crate
/// outside this repository's scope maps each to the status spec §7
/// documents (`InvalidInput` → 400, `VersionConflict` → 409, and so on).
#[derive(Debug, Clone, thiserror::Error)]
pub enum CoordinationError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("content failed schema validation ({} field error(s))", .0.len())]
    SchemaValidationFailed(Vec<FieldError>),

    #[error("authentication required")]
    Unauthorized,

    #[error("requires at least {required} role on this project")]
    Forbidden { required: RoleLevel },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("version conflict: expected {expected} but current is {current}")]
    VersionConflict { expected: Version, current: Version },

    #[error("not leader{}", .leader_address.as_deref().map(|a| format!("; leader at {a}")).unwrap_or_default())]
    NotLeader { leader_address: Option<String> },

    #[error("consensus proposal outcome unknown; re-read current state before retrying")]
    ConsensusTimeout,

    #[error("internal error: {0}")]
    Internal(String),
}

impl CoordinationError {
    /// Only `ConsensusTimeout`, `NotLeader`, and transient transport
    /// faults are retryable by clients (spec §7, "Retries"). Everything
    /// else — in particular `VersionConflict` — requires the caller to
    /// re-read and resubmit with fresh inputs rather than blindly retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoordinationError::ConsensusTimeout | CoordinationError::NotLeader { .. })
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        CoordinationError::NotFound(msg.into())
    }
}

impl From<KernelError> for CoordinationError {
    fn from(err: KernelError) -> Self {
        match err {
            KernelError::AlreadyExists { project_id, key } => {
                CoordinationError::AlreadyExists(format!("config already exists: project={project_id} key={key}"))
            }
            KernelError::NotFound { project_id, key } => {
                CoordinationError::NotFound(format!("config not found: project={project_id} key={key}"))
            }
            KernelError::VersionConflict { expected, current, .. } => {
                CoordinationError::VersionConflict { expected, current }
            }
        }
    }
}

impl From<ConsensusError> for CoordinationError {
    fn from(err: ConsensusError) -> Self {
        match err {
            ConsensusError::NotLeader { leader_id } => {
                CoordinationError::NotLeader { leader_address: leader_id }
            }
            ConsensusError::Timeout => CoordinationError::ConsensusTimeout,
            ConsensusError::Transport(msg) => CoordinationError::Internal(format!("transport error: {msg}")),
            ConsensusError::BootstrapOnNonEmptyLog => {
                CoordinationError::Internal("bootstrap requested on a node with existing persisted log state".into())
            }
            ConsensusError::Membership(e) => CoordinationError::Internal(e.to_string()),
            ConsensusError::Storage(e) => CoordinationError::Internal(format!("durable storage error: {e}")),
        }
    }
}

impl From<SchemaError> for CoordinationError {
    fn from(err: SchemaError) -> Self {
        match err {
            SchemaError::Invalid { reason } => CoordinationError::InvalidInput(reason),
            SchemaError::NameExists(name) => {
                CoordinationError::AlreadyExists(format!("schema named '{name}' already exists"))
            }
            SchemaError::NotFound(id) => CoordinationError::NotFound(format!("schema {id} not found")),
            // Not reached by any `CoordinationLayer` operation in spec §4.5
            // (schema deletion is outside the config read/write paths this
            // layer exposes); kept for completeness since the dependency
            // is shared.
            SchemaError::InUse(id) => {
                CoordinationError::Internal(format!("schema {id} is in use and cannot be deleted"))
            }
        }
    }
}

impl From<RbacError> for CoordinationError {
    fn from(err: RbacError) -> Self {
        match err {
            RbacError::Forbidden { required } => CoordinationError::Forbidden { required },
        }
    }
}

impl From<RevisionLogError> for CoordinationError {
    fn from(err: RevisionLogError) -> Self {
        match err {
            RevisionLogError::NotFound { project_id, key, version } => CoordinationError::NotFound(format!(
                "no revision for project={project_id} key={key} version={version:?}"
            )),
            // An `AlreadyExists` here means the log saw the version the
            // FSM just produced already recorded — an internal invariant
            // breach, not a client-facing condition.
            RevisionLogError::AlreadyExists { project_id, key, version } => CoordinationError::Internal(format!(
                "revision log invariant violated: project={project_id} key={key} version={version} already recorded"
            )),
            RevisionLogError::AppendFailed { reason, .. } => CoordinationError::Internal(reason),
        }
    }
}
