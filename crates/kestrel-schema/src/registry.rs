//! The `SchemaRegistry` contract (spec §4.4) and an in-memory reference
//! implementation.
//!
//! Schema storage lives outside the replicated FSM (spec §3, "Ownership"):
//! schemas, like projects, users and roles, belong to the relational
//! collaborator whose physical schema is out of scope. `InMemorySchemaRegistry`
//! is a test/reference double behind the same trait, the same role
//! `kestrel::catalog`'s in-memory `ProjectDirectory` plays for projects.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use kestrel_types::{SchemaId, UserId};

use crate::error::SchemaError;
use crate::schema::ConfigSchema;
use crate::validation::{self, ValidationOutcome};

/// In-memory `SchemaRegistry` (spec §4.4), guarded by a single `RwLock` over the whole
/// map — schema mutation is low-frequency compared to config reads, so a
/// coarse lock is simpler than per-entry locking and matches the FSM's own
/// reader/writer discipline (spec §4.1).
#[derive(Default)]
pub struct InMemorySchemaRegistry {
    schemas: RwLock<HashMap<SchemaId, ConfigSchema>>,
    next_id: AtomicU64,
}

impl InMemorySchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&self) -> SchemaId {
        SchemaId::new(self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

impl InMemorySchemaRegistry {
    pub fn create(&self, name: &str, schema_text: &str, creator: UserId) -> Result<ConfigSchema, SchemaError> {
        validation::compile(schema_text)?;

        let mut guard = self.schemas.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        if guard.values().any(|s| s.name == name) {
            return Err(SchemaError::NameExists(name.to_string()));
        }

        let schema = ConfigSchema {
            id: self.allocate_id(),
            name: name.to_string(),
            schema_text: schema_text.to_string(),
            creator_id: creator,
        };
        guard.insert(schema.id, schema.clone());
        tracing::info!(schema_id = %schema.id, %name, "schema created");
        Ok(schema)
    }

    pub fn get(&self, id: SchemaId) -> Option<ConfigSchema> {
        self.schemas.read().unwrap_or_else(std::sync::PoisonError::into_inner).get(&id).cloned()
    }

    pub fn get_by_name(&self, name: &str) -> Option<ConfigSchema> {
        self.schemas
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .values()
            .find(|s| s.name == name)
            .cloned()
    }

    pub fn list(&self) -> Vec<ConfigSchema> {
        self.schemas
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    pub fn list_by_creator(&self, creator: UserId) -> Vec<ConfigSchema> {
        self.schemas
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .values()
            .filter(|s| s.creator_id == creator)
            .cloned()
            .collect()
    }

    /// Updates optional fields. If `schema_text` changes it must remain a
    /// valid JSON Schema; existing live documents are **not**
    /// re-validated here (spec §4.4, "Updating a schema does not
    /// re-validate existing live documents" — see `DESIGN.md` for the
    /// lazy-revalidation choice).
    pub fn update(
        &self,
        id: SchemaId,
        name: Option<&str>,
        schema_text: Option<&str>,
    ) -> Result<ConfigSchema, SchemaError> {
        if let Some(text) = schema_text {
            validation::compile(text)?;
        }

        let mut guard = self.schemas.write().unwrap_or_else(std::sync::PoisonError::into_inner);

        if let Some(name) = name {
            if guard.values().any(|s| s.id != id && s.name == name) {
                return Err(SchemaError::NameExists(name.to_string()));
            }
        }

        let schema = guard.get_mut(&id).ok_or(SchemaError::NotFound(id))?;
        if let Some(name) = name {
            schema.name = name.to_string();
        }
        if let Some(text) = schema_text {
            schema.schema_text = text.to_string();
        }
        tracing::info!(schema_id = %id, "schema updated");
        Ok(schema.clone())
    }

    /// Deletes the schema, first checking `in_use` — a predicate supplied
    /// by the coordination layer, which alone can ask the FSM whether any
    /// live document still references this schema.
    pub fn delete(&self, id: SchemaId, in_use: impl FnOnce(SchemaId) -> bool) -> Result<(), SchemaError> {
        let mut guard = self.schemas.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        if !guard.contains_key(&id) {
            return Err(SchemaError::NotFound(id));
        }
        if in_use(id) {
            return Err(SchemaError::InUse(id));
        }
        guard.remove(&id);
        tracing::info!(schema_id = %id, "schema deleted");
        Ok(())
    }

    pub fn validate(&self, id: SchemaId, content: &serde_json::Value) -> Result<ValidationOutcome, SchemaError> {
        let schema = self.get(id).ok_or(SchemaError::NotFound(id))?;
        validation::validate(&schema.schema_text, content)
    }
}
