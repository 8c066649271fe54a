//! Effects produced by the kernel.
//!
//! Effects describe what happened, for the runtime to turn into durable
//! revisions and best-effort event notifications. The kernel itself never
//! timestamps or publishes anything — it has no clock and no I/O — so
//! effects carry only the data the kernel actually knows.

use kestrel_types::{ConfigKey, ProjectId, UserId, Version};
use serde::{Deserialize, Serialize};

/// An effect produced by [`crate::kernel::apply_committed`].
///
/// The FSM sees no distinction between an `Update` and a rollback (spec
/// §4.5): both produce `Effect::ConfigUpdated`. It is the coordination
/// layer's job — which alone knows whether it proposed a rollback — to
/// turn that into a `ConfigRolledBack` event rather than a
/// `ConfigUpdated` one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    ConfigCreated {
        project_id: ProjectId,
        key: ConfigKey,
        to_version: Version,
        content: serde_json::Value,
        actor_id: UserId,
    },
    ConfigUpdated {
        project_id: ProjectId,
        key: ConfigKey,
        from_version: Version,
        to_version: Version,
        content: serde_json::Value,
        actor_id: UserId,
    },
    ConfigDeleted {
        project_id: ProjectId,
        key: ConfigKey,
        from_version: Version,
        actor_id: UserId,
    },
}
