//! Error taxonomy for the `SchemaRegistry` contract (spec §4.4, §7).

use thiserror::Error;

use kestrel_types::SchemaId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("schema text is not a valid JSON Schema: {reason}")]
    Invalid { reason: String },

    #[error("a schema named '{0}' already exists")]
    NameExists(String),

    #[error("schema {0} not found")]
    NotFound(SchemaId),

    #[error("schema {0} is in use by at least one live config and cannot be deleted")]
    InUse(SchemaId),
}
