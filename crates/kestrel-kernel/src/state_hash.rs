//! A content hash over [`State`], used to cheaply assert that two replicas
//! (or a replica before/after a snapshot round-trip) agree without
//! comparing full document sets.
//!
//! This is a diagnostic, not part of the replicated contract: consensus
//! commitment never depends on hash equality, only on applying the same
//! log prefix (spec §8, "Determinism").

use blake3::Hasher;

use crate::state::State;

/// Blake3 digest of every live document, folded in `(project_id, key)`
/// order (the same order `State`'s `BTreeMap` iterates in), so the hash is
/// independent of insertion order.
pub fn hash_state(state: &State) -> [u8; 32] {
    let mut hasher = Hasher::new();
    for ((project_id, key), doc) in state.documents() {
        hasher.update(&project_id.as_u64().to_le_bytes());
        hasher.update(key.as_str().as_bytes());
        hasher.update(&doc.version.as_u64().to_le_bytes());
        hasher.update(&doc.schema_id.as_u64().to_le_bytes());
        hasher.update(&doc.updated_by.as_u64().to_le_bytes());
        // `serde_json::Value` has no canonical byte form, but `to_vec` on a
        // parsed value is deterministic for a given in-memory representation,
        // which is all two replicas that applied the same commands share.
        if let Ok(bytes) = serde_json::to_vec(&doc.content) {
            hasher.update(&bytes);
        }
    }
    *hasher.finalize().as_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_types::{Command, ConfigKey, ProjectId, SchemaId, UserId};

    fn create(project: u64, key: &str) -> Command {
        Command::Create {
            project_id: ProjectId::new(project),
            key: ConfigKey::new(key),
            schema_id: SchemaId::new(1),
            content: serde_json::json!({"a": 1}),
            actor_id: UserId::new(1),
        }
    }

    #[test]
    fn identical_log_prefixes_hash_identically() {
        let (state_a, _) =
            crate::kernel::apply_committed_batch(State::new(), vec![create(1, "a"), create(1, "b")])
                .unwrap();
        let (state_b, _) =
            crate::kernel::apply_committed_batch(State::new(), vec![create(1, "a"), create(1, "b")])
                .unwrap();
        assert_eq!(hash_state(&state_a), hash_state(&state_b));
    }

    #[test]
    fn different_content_hashes_differently() {
        let (state_a, _) = crate::kernel::apply_committed_batch(State::new(), vec![create(1, "a")]).unwrap();
        let (state_b, _) = crate::kernel::apply_committed_batch(State::new(), vec![create(1, "b")]).unwrap();
        assert_ne!(hash_state(&state_a), hash_state(&state_b));
    }
}
