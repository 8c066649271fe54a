//! Kernel state management.
//!
//! The kernel maintains the in-memory map of every *live* `ConfigDocument`,
//! keyed by the composite identity `(project_id, key)`. State transitions
//! are done by taking ownership and returning a new state (builder
//! pattern), matching the functional-core style the rest of this codebase
//! uses for its replicated state.

use std::collections::BTreeMap;

use kestrel_types::{ConfigDocument, ConfigKey, ProjectId};
use serde::{Deserialize, Serialize};

/// Composite identity of a live document: `(project_id, key)`.
///
/// A plain tuple is sufficient here — both halves already implement `Ord`,
/// so no separator-based string-fusion is needed to avoid collisions (see
/// spec §9, "Composite keys").
pub type DocKey = (ProjectId, ConfigKey);

/// The kernel's in-memory state: every live `ConfigDocument`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct State {
    documents: BTreeMap<DocKey, ConfigDocument>,
}

impl State {
    /// Creates a new empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the document for `(project_id, key)`, if it exists.
    pub fn get(&self, project_id: ProjectId, key: &ConfigKey) -> Option<&ConfigDocument> {
        self.documents.get(&(project_id, key.clone()))
    }

    /// Returns true if a document exists at `(project_id, key)`.
    pub fn exists(&self, project_id: ProjectId, key: &ConfigKey) -> bool {
        self.documents.contains_key(&(project_id, key.clone()))
    }

    /// Returns every live document belonging to `project_id`.
    ///
    /// Ordering is unspecified beyond `BTreeMap`'s key order (spec §4.1).
    pub fn list_by_project(&self, project_id: ProjectId) -> Vec<&ConfigDocument> {
        self.documents
            .range((project_id, ConfigKey::new(""))..)
            .take_while(|((p, _), _)| *p == project_id)
            .map(|(_, doc)| doc)
            .collect()
    }

    /// Returns the number of live documents across all projects.
    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    /// Returns a reference to every live document, for snapshotting.
    pub(crate) fn documents(&self) -> &BTreeMap<DocKey, ConfigDocument> {
        &self.documents
    }

    /// Replaces the entire document map — used by `Restore`.
    pub(crate) fn with_documents(documents: BTreeMap<DocKey, ConfigDocument>) -> Self {
        Self { documents }
    }

    /// Inserts or overwrites a document. Internal to the kernel — external
    /// code should use `apply_committed`, which handles preconditions and
    /// effect production.
    pub(crate) fn with_document(mut self, doc: ConfigDocument) -> Self {
        self.documents.insert((doc.project_id, doc.key.clone()), doc);
        self
    }

    /// Removes a document. No-op if absent.
    pub(crate) fn without_document(mut self, project_id: ProjectId, key: &ConfigKey) -> Self {
        self.documents.remove(&(project_id, key.clone()));
        self
    }
}
