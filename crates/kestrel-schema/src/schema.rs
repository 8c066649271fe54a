//! The `ConfigSchema` entity (spec §3).

use serde::{Deserialize, Serialize};

use kestrel_types::{SchemaId, UserId};

/// A named JSON Schema document that `ConfigDocument`s reference by
/// `schema_id`. Immutable reference, not immutable content: `Update` may
/// change `schema_text`, but a schema may not be deleted while any live
/// document references it (spec §3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSchema {
    pub id: SchemaId,
    pub name: String,
    pub schema_text: String,
    pub creator_id: UserId,
}
