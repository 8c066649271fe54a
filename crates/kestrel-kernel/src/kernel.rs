//! The kernel — pure functional core of the ReplicatedFSM.
//!
//! `apply_committed` is the only way live state changes. It is completely
//! pure: no IO, no clocks, no randomness, no schema validation, no
//! authorization (those are the coordination layer's job — see spec §4.1,
//! "weak schema references", and §9, "a hard requirement for replicated
//! state machines"). Given the same log prefix, every replica that calls
//! `apply_committed` in order reaches byte-identical state.

use kestrel_types::{Command, ConfigDocument, Version};

use crate::effects::Effect;
use crate::state::State;

/// Applies one committed [`Command`] to `state`, producing the new state
/// and the effects the runtime should execute (revision append, event
/// emission).
///
/// Failures are deterministic return values, not exceptions or panics:
/// every replica applying the same command against the same state reaches
/// the same `Err` variant (spec §4.1, "Apply semantics").
pub fn apply_committed(state: State, cmd: Command) -> Result<(State, Vec<Effect>), KernelError> {
    match cmd {
        Command::Create {
            project_id,
            key,
            schema_id,
            content,
            actor_id,
        } => {
            if state.exists(project_id, &key) {
                return Err(KernelError::AlreadyExists { project_id, key });
            }

            let doc = ConfigDocument {
                project_id,
                key: key.clone(),
                version: Version::FIRST,
                schema_id,
                content: content.clone(),
                updated_by: actor_id,
            };

            let effects = vec![Effect::ConfigCreated {
                project_id,
                key,
                to_version: Version::FIRST,
                content,
                actor_id,
            }];

            Ok((state.with_document(doc), effects))
        }

        Command::Update {
            project_id,
            key,
            expected_version,
            content,
            actor_id,
        } => {
            let current = state
                .get(project_id, &key)
                .ok_or_else(|| KernelError::NotFound {
                    project_id,
                    key: key.clone(),
                })?;

            if current.version != expected_version {
                return Err(KernelError::VersionConflict {
                    project_id,
                    key,
                    expected: expected_version,
                    current: current.version,
                });
            }

            let new_version = current.version.next();
            let schema_id = current.schema_id;
            let doc = ConfigDocument {
                project_id,
                key: key.clone(),
                version: new_version,
                schema_id,
                content: content.clone(),
                updated_by: actor_id,
            };

            let effects = vec![Effect::ConfigUpdated {
                project_id,
                key,
                from_version: expected_version,
                to_version: new_version,
                content,
                actor_id,
            }];

            Ok((state.with_document(doc), effects))
        }

        Command::Delete {
            project_id,
            key,
            actor_id,
        } => {
            let current = state
                .get(project_id, &key)
                .ok_or_else(|| KernelError::NotFound {
                    project_id,
                    key: key.clone(),
                })?;

            let from_version = current.version;
            let effects = vec![Effect::ConfigDeleted {
                project_id,
                key: key.clone(),
                from_version,
                actor_id,
            }];

            Ok((state.without_document(project_id, &key), effects))
        }
    }
}

/// Applies a batch of already-committed commands in order, short-circuiting
/// on the first failure.
///
/// Used by snapshot-free replica bootstrap and by tests that want to
/// replay a log prefix in one call (spec §8, "Determinism" invariant).
pub fn apply_committed_batch(
    mut state: State,
    commands: Vec<kestrel_types::Command>,
) -> Result<(State, Vec<Effect>), KernelError> {
    let mut all_effects = Vec::new();
    for cmd in commands {
        let (next_state, effects) = apply_committed(state, cmd)?;
        state = next_state;
        all_effects.extend(effects);
    }
    Ok((state, all_effects))
}

/// Deterministic failure outcomes from [`apply_committed`].
///
/// Every variant here corresponds to a verdict in spec §4.1's Apply
/// semantics table — every replica reaches the same variant for the same
/// input, which is what lets `NotFound`/`AlreadyExists`/`VersionConflict`
/// be ordinary `Err` values instead of something that would need
/// out-of-band reconciliation.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum KernelError {
    #[error("config already exists: project={project_id} key={key}")]
    AlreadyExists {
        project_id: kestrel_types::ProjectId,
        key: kestrel_types::ConfigKey,
    },

    #[error("config not found: project={project_id} key={key}")]
    NotFound {
        project_id: kestrel_types::ProjectId,
        key: kestrel_types::ConfigKey,
    },

    #[error(
        "version conflict: project={project_id} key={key} expected={expected} current={current}"
    )]
    VersionConflict {
        project_id: kestrel_types::ProjectId,
        key: kestrel_types::ConfigKey,
        expected: Version,
        current: Version,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_types::{ConfigKey, ProjectId, SchemaId, UserId};

    fn create_cmd(project: u64, key: &str, version_seed: u64) -> Command {
        Command::Create {
            project_id: ProjectId::new(project),
            key: ConfigKey::new(key),
            schema_id: SchemaId::new(1),
            content: serde_json::json!({"seed": version_seed}),
            actor_id: UserId::new(1),
        }
    }

    #[test]
    fn create_on_absent_key_succeeds_at_version_one() {
        let (state, effects) = apply_committed(State::new(), create_cmd(1, "a", 0)).unwrap();
        let doc = state.get(ProjectId::new(1), &ConfigKey::new("a")).unwrap();
        assert_eq!(doc.version, Version::FIRST);
        assert_eq!(effects.len(), 1);
    }

    #[test]
    fn create_on_existing_key_is_rejected() {
        let (state, _) = apply_committed(State::new(), create_cmd(1, "a", 0)).unwrap();
        let err = apply_committed(state, create_cmd(1, "a", 1)).unwrap_err();
        assert!(matches!(err, KernelError::AlreadyExists { .. }));
    }

    #[test]
    fn update_with_stale_expected_version_conflicts() {
        let (state, _) = apply_committed(State::new(), create_cmd(1, "a", 0)).unwrap();
        let update = Command::Update {
            project_id: ProjectId::new(1),
            key: ConfigKey::new("a"),
            expected_version: Version::new(7),
            content: serde_json::json!({}),
            actor_id: UserId::new(1),
        };
        let err = apply_committed(state, update).unwrap_err();
        assert_eq!(
            err,
            KernelError::VersionConflict {
                project_id: ProjectId::new(1),
                key: ConfigKey::new("a"),
                expected: Version::new(7),
                current: Version::FIRST,
            }
        );
    }

    #[test]
    fn update_increments_version_by_exactly_one() {
        let (state, _) = apply_committed(State::new(), create_cmd(1, "a", 0)).unwrap();
        let update = Command::Update {
            project_id: ProjectId::new(1),
            key: ConfigKey::new("a"),
            expected_version: Version::FIRST,
            content: serde_json::json!({"v": 2}),
            actor_id: UserId::new(2),
        };
        let (state, effects) = apply_committed(state, update).unwrap();
        let doc = state.get(ProjectId::new(1), &ConfigKey::new("a")).unwrap();
        assert_eq!(doc.version, Version::new(2));
        assert_eq!(doc.updated_by, UserId::new(2));
        assert!(matches!(effects[0], Effect::ConfigUpdated { .. }));
    }

    #[test]
    fn delete_removes_live_entry() {
        let (state, _) = apply_committed(State::new(), create_cmd(1, "a", 0)).unwrap();
        let (state, effects) = apply_committed(
            state,
            Command::Delete {
                project_id: ProjectId::new(1),
                key: ConfigKey::new("a"),
                actor_id: UserId::new(1),
            },
        )
        .unwrap();
        assert!(!state.exists(ProjectId::new(1), &ConfigKey::new("a")));
        assert!(matches!(effects[0], Effect::ConfigDeleted { .. }));
    }

    #[test]
    fn delete_of_absent_key_is_not_found() {
        let err = apply_committed(
            State::new(),
            Command::Delete {
                project_id: ProjectId::new(1),
                key: ConfigKey::new("missing"),
                actor_id: UserId::new(1),
            },
        )
        .unwrap_err();
        assert!(matches!(err, KernelError::NotFound { .. }));
    }

    #[test]
    fn replaying_same_log_prefix_is_deterministic() {
        let commands = vec![
            create_cmd(1, "a", 0),
            Command::Update {
                project_id: ProjectId::new(1),
                key: ConfigKey::new("a"),
                expected_version: Version::FIRST,
                content: serde_json::json!({"v": 2}),
                actor_id: UserId::new(1),
            },
        ];

        let (state_a, _) = apply_committed_batch(State::new(), commands.clone()).unwrap();
        let (state_b, _) = apply_committed_batch(State::new(), commands).unwrap();
        assert_eq!(state_a, state_b);
    }
}
