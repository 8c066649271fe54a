//! # kestrel-schema: the `SchemaRegistry` component
//!
//! Stores JSON Schema documents and validates configuration content
//! against them (spec §4.4). Schemas live outside the replicated FSM —
//! this crate's registry is a leaf collaborator the coordination layer
//! consults before ever proposing a command to consensus.

pub mod error;
pub mod registry;
pub mod schema;
pub mod validation;

pub use error::SchemaError;
pub use registry::InMemorySchemaRegistry;
pub use schema::ConfigSchema;
pub use validation::{FieldError, ValidationOutcome};
