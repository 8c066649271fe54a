//! The `ReplicatedFsm` runtime: the reader/writer-locked wrapper around
//! [`State`] that the consensus layer drives.
//!
//! `Apply` takes the writer lock; `Get`/`ListByProject`/`Snapshot` take the
//! reader lock (spec §4.1, "Concurrency inside the FSM"). The FSM's
//! in-memory apply is strictly CPU-bound once the writer lock is held, so
//! this type is `Sync` and cheap to share behind an `Arc`.

use std::sync::RwLock;

use kestrel_types::{Command, ConfigDocument, ConfigKey, ProjectId};

use crate::effects::Effect;
use crate::kernel::{self, KernelError};
use crate::state::State;

/// The authoritative, in-memory map of every live `ConfigDocument`.
///
/// One instance per replica. Every replica's `ReplicatedFsm` reaches
/// identical state after applying identical log prefixes (spec §8,
/// "Determinism").
#[derive(Debug, Default)]
pub struct ReplicatedFsm {
    state: RwLock<State>,
}

impl ReplicatedFsm {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::new()),
        }
    }

    /// Applies one committed command. Called once per committed log entry,
    /// in log order, on every replica.
    #[tracing::instrument(skip(self, cmd), fields(project_id = %cmd.project_id(), key = %cmd.key()))]
    pub fn apply(&self, cmd: Command) -> Result<(ConfigDocumentOutcome, Vec<Effect>), KernelError> {
        let mut guard = self
            .state
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let project_id = cmd.project_id();
        let key = cmd.key().clone();
        let was_delete = matches!(cmd, Command::Delete { .. });

        let (new_state, effects) = kernel::apply_committed(guard.clone(), cmd)?;
        *guard = new_state;

        let outcome = if was_delete {
            ConfigDocumentOutcome::Deleted
        } else {
            ConfigDocumentOutcome::Live(guard.get(project_id, &key).cloned().expect(
                "apply_committed succeeded for Create/Update so the document must now exist",
            ))
        };

        if !matches!(outcome, ConfigDocumentOutcome::Deleted) {
            tracing::info!("config document applied");
        }

        Ok((outcome, effects))
    }

    /// Read-only; never blocks on consensus.
    pub fn get(&self, project_id: ProjectId, key: &ConfigKey) -> Option<ConfigDocument> {
        self.read().get(project_id, key).cloned()
    }

    pub fn list_by_project(&self, project_id: ProjectId) -> Vec<ConfigDocument> {
        self.read()
            .list_by_project(project_id)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Produces a deep-copy snapshot of the full state at the current log
    /// index. Subsequent applies never mutate the returned value.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            version: SNAPSHOT_FORMAT_VERSION,
            state: self.read().clone(),
        }
    }

    /// Replaces all state from a previously taken snapshot.
    pub fn restore(&self, snapshot: Snapshot) {
        let mut guard = self
            .state
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard = snapshot.state;
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, State> {
        self.state
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// What `apply` produced for the affected `(project_id, key)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigDocumentOutcome {
    Live(ConfigDocument),
    Deleted,
}

/// Current on-disk/on-wire snapshot envelope version.
///
/// Bumped whenever the serialized shape of [`State`] changes in a way that
/// isn't forward/backward compatible (spec §6, "version tag in the
/// snapshot envelope").
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// A serializable, opaque blob representing full FSM state at a log index.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Snapshot {
    version: u32,
    state: State,
}

impl Snapshot {
    pub fn format_version(&self) -> u32 {
        self.version
    }

    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_types::{SchemaId, UserId};

    fn create(project: u64, key: &str) -> Command {
        Command::Create {
            project_id: ProjectId::new(project),
            key: ConfigKey::new(key),
            schema_id: SchemaId::new(1),
            content: serde_json::json!({"ok": true}),
            actor_id: UserId::new(1),
        }
    }

    #[test]
    fn apply_then_get_round_trips() {
        let fsm = ReplicatedFsm::new();
        fsm.apply(create(1, "a")).unwrap();
        let doc = fsm.get(ProjectId::new(1), &ConfigKey::new("a")).unwrap();
        assert_eq!(doc.version.as_u64(), 1);
    }

    #[test]
    fn snapshot_restore_round_trip_is_indistinguishable() {
        let fsm = ReplicatedFsm::new();
        fsm.apply(create(1, "a")).unwrap();
        fsm.apply(create(1, "b")).unwrap();
        let snap = fsm.snapshot();

        let restored = ReplicatedFsm::new();
        restored.restore(snap);

        assert_eq!(
            restored.list_by_project(ProjectId::new(1)).len(),
            fsm.list_by_project(ProjectId::new(1)).len()
        );
        assert_eq!(
            restored.get(ProjectId::new(1), &ConfigKey::new("a")),
            fsm.get(ProjectId::new(1), &ConfigKey::new("a"))
        );
    }

    #[test]
    fn snapshot_is_a_deep_copy_unaffected_by_later_applies() {
        let fsm = ReplicatedFsm::new();
        fsm.apply(create(1, "a")).unwrap();
        let snap = fsm.snapshot();

        fsm.apply(create(1, "b")).unwrap();

        let restored = ReplicatedFsm::new();
        restored.restore(snap);
        assert!(restored.get(ProjectId::new(1), &ConfigKey::new("b")).is_none());
    }

    #[test]
    fn delete_outcome_reports_deleted() {
        let fsm = ReplicatedFsm::new();
        fsm.apply(create(1, "a")).unwrap();
        let (outcome, _) = fsm
            .apply(Command::Delete {
                project_id: ProjectId::new(1),
                key: ConfigKey::new("a"),
                actor_id: UserId::new(1),
            })
            .unwrap();
        assert_eq!(outcome, ConfigDocumentOutcome::Deleted);
    }
}
