//! The `RevisionLog` contract (spec §4.3) and an in-memory reference
//! implementation.
//!
//! The relational store's physical schema is out of scope (spec §9); only
//! its operation contract matters. `InMemoryRevisionLog` satisfies that
//! contract — including the unique `(project_id, key, version)` index and
//! efficient `(project_id, key)` and `(user_id, time)` lookup spec §6
//! requires of the real store — behind a single `RwLock`.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use chrono::Utc;

use kestrel_types::{ConfigKey, ConfigRevision, ProjectId, RevisionId, UserId, Version};

use crate::error::RevisionLogError;

type RevisionKey = (ProjectId, ConfigKey, Version);

/// Durable, append-only log of every accepted `ConfigDocument` version.
#[derive(Default)]
pub struct InMemoryRevisionLog {
    revisions: RwLock<BTreeMap<RevisionKey, ConfigRevision>>,
    next_revision_id: AtomicU64,
}

impl InMemoryRevisionLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&self) -> RevisionId {
        RevisionId::new(self.next_revision_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Persists one `ConfigRevision`. Fails if `(project, key, version)`
    /// already exists (spec §4.3, `Append`).
    #[tracing::instrument(skip(self, content), fields(%project_id, %key, %version))]
    pub fn append(
        &self,
        project_id: ProjectId,
        key: ConfigKey,
        version: Version,
        content: serde_json::Value,
        creator_id: UserId,
    ) -> Result<ConfigRevision, RevisionLogError> {
        let mut guard = self.revisions.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        let revision_key = (project_id, key.clone(), version);

        if guard.contains_key(&revision_key) {
            return Err(RevisionLogError::AlreadyExists { project_id, key, version });
        }

        let revision = ConfigRevision {
            revision_id: self.allocate_id(),
            project_id,
            key: key.clone(),
            version,
            content,
            creator_id,
            timestamp: Utc::now(),
        };

        guard.insert(revision_key, revision.clone());
        tracing::info!("revision appended");
        Ok(revision)
    }

    pub fn get_by_version(
        &self,
        project_id: ProjectId,
        key: &ConfigKey,
        version: Version,
    ) -> Option<ConfigRevision> {
        self.revisions
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&(project_id, key.clone(), version))
            .cloned()
    }

    /// Revisions for `(project, key)`, ordered by version descending,
    /// paginated.
    pub fn list_by_key(
        &self,
        project_id: ProjectId,
        key: &ConfigKey,
        limit: usize,
        offset: usize,
    ) -> Vec<ConfigRevision> {
        let guard = self.revisions.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut matching: Vec<ConfigRevision> = guard
            .range((project_id, key.clone(), Version::new(0))..(project_id, key.clone(), Version::new(u64::MAX)))
            .map(|(_, rev)| rev.clone())
            .collect();
        matching.sort_by(|a, b| b.version.cmp(&a.version));
        matching.into_iter().skip(offset).take(limit).collect()
    }

    pub fn get_latest(&self, project_id: ProjectId, key: &ConfigKey) -> Option<ConfigRevision> {
        self.list_by_key(project_id, key, 1, 0).into_iter().next()
    }

    pub fn list_by_project(&self, project_id: ProjectId) -> Vec<ConfigRevision> {
        self.revisions
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .values()
            .filter(|rev| rev.project_id == project_id)
            .cloned()
            .collect()
    }

    /// Most recent revisions across all projects created by `user_id`.
    pub fn list_by_user(&self, user_id: UserId, limit: usize) -> Vec<ConfigRevision> {
        let guard = self.revisions.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut matching: Vec<ConfigRevision> = guard
            .values()
            .filter(|rev| rev.creator_id == user_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        matching.truncate(limit);
        matching
    }

    pub fn get_in_version_range(
        &self,
        project_id: ProjectId,
        key: &ConfigKey,
        min_v: Version,
        max_v: Version,
    ) -> Vec<ConfigRevision> {
        self.revisions
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .range((project_id, key.clone(), min_v)..=(project_id, key.clone(), max_v))
            .map(|(_, rev)| rev.clone())
            .collect()
    }

    pub fn count(&self, project_id: ProjectId, key: &ConfigKey) -> usize {
        self.revisions
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .keys()
            .filter(|(p, k, _)| *p == project_id && k == key)
            .count()
    }

    pub fn count_by_project(&self, project_id: ProjectId) -> usize {
        self.revisions
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .keys()
            .filter(|(p, _, _)| *p == project_id)
            .count()
    }

    /// Retention operation: removes revisions with `version < min_version`.
    /// The caller is responsible for ensuring the current document's
    /// version remains `>= min_version` (spec §4.3) — this type has no
    /// visibility into the FSM to enforce that itself.
    pub fn delete_older_than(&self, project_id: ProjectId, key: &ConfigKey, min_version: Version) -> usize {
        let mut guard = self.revisions.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        let to_remove: Vec<RevisionKey> = guard
            .keys()
            .filter(|(p, k, v)| *p == project_id && k == key && *v < min_version)
            .cloned()
            .collect();
        let removed = to_remove.len();
        for k in to_remove {
            guard.remove(&k);
        }
        removed
    }

    /// Versions present for `(project, key)`, for gap detection via
    /// [`crate::index::find_gaps`].
    pub fn versions_for(&self, project_id: ProjectId, key: &ConfigKey) -> Vec<Version> {
        self.revisions
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .keys()
            .filter(|(p, k, _)| *p == project_id && k == key)
            .map(|(_, _, v)| *v)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content(n: i64) -> serde_json::Value {
        serde_json::json!({ "n": n })
    }

    #[test]
    fn append_then_get_by_version_round_trips() {
        let log = InMemoryRevisionLog::new();
        let key = ConfigKey::new("k");
        log.append(ProjectId::new(1), key.clone(), Version::FIRST, content(1), UserId::new(1))
            .unwrap();
        let rev = log.get_by_version(ProjectId::new(1), &key, Version::FIRST).unwrap();
        assert_eq!(rev.content, content(1));
    }

    #[test]
    fn duplicate_version_append_is_rejected() {
        let log = InMemoryRevisionLog::new();
        let key = ConfigKey::new("k");
        log.append(ProjectId::new(1), key.clone(), Version::FIRST, content(1), UserId::new(1))
            .unwrap();
        let err = log
            .append(ProjectId::new(1), key, Version::FIRST, content(2), UserId::new(1))
            .unwrap_err();
        assert!(matches!(err, RevisionLogError::AlreadyExists { .. }));
    }

    #[test]
    fn list_by_key_orders_versions_descending() {
        let log = InMemoryRevisionLog::new();
        let key = ConfigKey::new("k");
        for v in 1..=3u64 {
            log.append(ProjectId::new(1), key.clone(), Version::new(v), content(v as i64), UserId::new(1))
                .unwrap();
        }
        let listed = log.list_by_key(ProjectId::new(1), &key, 10, 0);
        let versions: Vec<u64> = listed.iter().map(|r| r.version.as_u64()).collect();
        assert_eq!(versions, vec![3, 2, 1]);
    }

    #[test]
    fn get_latest_returns_highest_version() {
        let log = InMemoryRevisionLog::new();
        let key = ConfigKey::new("k");
        for v in 1..=3u64 {
            log.append(ProjectId::new(1), key.clone(), Version::new(v), content(v as i64), UserId::new(1))
                .unwrap();
        }
        assert_eq!(log.get_latest(ProjectId::new(1), &key).unwrap().version.as_u64(), 3);
    }

    #[test]
    fn delete_older_than_removes_below_threshold_only() {
        let log = InMemoryRevisionLog::new();
        let key = ConfigKey::new("k");
        for v in 1..=5u64 {
            log.append(ProjectId::new(1), key.clone(), Version::new(v), content(v as i64), UserId::new(1))
                .unwrap();
        }
        let removed = log.delete_older_than(ProjectId::new(1), &key, Version::new(3));
        assert_eq!(removed, 2);
        assert_eq!(log.count(ProjectId::new(1), &key), 3);
    }

    #[test]
    fn count_by_project_spans_multiple_keys() {
        let log = InMemoryRevisionLog::new();
        log.append(ProjectId::new(1), ConfigKey::new("a"), Version::FIRST, content(1), UserId::new(1))
            .unwrap();
        log.append(ProjectId::new(1), ConfigKey::new("b"), Version::FIRST, content(2), UserId::new(1))
            .unwrap();
        assert_eq!(log.count_by_project(ProjectId::new(1)), 2);
    }

    #[test]
    fn list_by_user_sorts_newest_first_and_respects_limit() {
        let log = InMemoryRevisionLog::new();
        for v in 1..=3u64 {
            log.append(ProjectId::new(1), ConfigKey::new("k"), Version::new(v), content(v as i64), UserId::new(1))
                .unwrap();
        }
        let recent = log.list_by_user(UserId::new(1), 2);
        assert_eq!(recent.len(), 2);
    }
}
