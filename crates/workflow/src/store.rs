//! Optional in-memory named workflow store.
//!
//! Workflows are stored as raw JSON keyed by a fresh UUID; the JSON is
//! validated (it must parse as a payload) on register and update, and the
//! stored copy is independent of any caller-mutable buffer. All
//! operations go through one read-write lock.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::payload::WorkflowPayload;

/// Failure from a store operation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No workflow with the given id.
    #[error("workflow `{0}` not found")]
    NotFound(Uuid),

    /// The submitted JSON does not parse as a workflow payload.
    #[error("workflow data is not a valid payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
struct StoredWorkflow {
    name: String,
    description: String,
    data: String,
    node_count: usize,
    edge_count: usize,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Lightweight listing entry; the payload itself is not cloned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowSummary {
    /// Store-assigned identifier.
    pub id: Uuid,
    /// Registration name.
    pub name: String,
    /// Registration description.
    pub description: String,
    /// Node count of the stored payload.
    pub node_count: usize,
    /// Edge count of the stored payload.
    pub edge_count: usize,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

/// In-memory name → workflow registry.
#[derive(Debug, Default)]
pub struct WorkflowStore {
    inner: RwLock<HashMap<Uuid, StoredWorkflow>>,
}

impl WorkflowStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `data` and store it under a fresh UUID.
    pub fn register(
        &self,
        name: impl Into<String>,
        description: impl Into<String>,
        data: &str,
    ) -> Result<Uuid, StoreError> {
        let payload: WorkflowPayload = serde_json::from_str(data)?;
        let id = Uuid::new_v4();
        let now = Utc::now();
        self.inner.write().insert(
            id,
            StoredWorkflow {
                name: name.into(),
                description: description.into(),
                data: data.to_owned(),
                node_count: payload.nodes.len(),
                edge_count: payload.edges.len(),
                created_at: now,
                updated_at: now,
            },
        );
        Ok(id)
    }

    /// Fetch the stored JSON.
    pub fn get(&self, id: Uuid) -> Result<String, StoreError> {
        self.inner
            .read()
            .get(&id)
            .map(|w| w.data.clone())
            .ok_or(StoreError::NotFound(id))
    }

    /// Replace the stored JSON after re-validating it.
    pub fn update(&self, id: Uuid, data: &str) -> Result<(), StoreError> {
        let payload: WorkflowPayload = serde_json::from_str(data)?;
        let mut inner = self.inner.write();
        let stored = inner.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        stored.data = data.to_owned();
        stored.node_count = payload.nodes.len();
        stored.edge_count = payload.edges.len();
        stored.updated_at = Utc::now();
        Ok(())
    }

    /// Remove a workflow.
    pub fn unregister(&self, id: Uuid) -> Result<(), StoreError> {
        self.inner
            .write()
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound(id))
    }

    /// Summaries of every stored workflow, sorted by name then id.
    #[must_use]
    pub fn list(&self) -> Vec<WorkflowSummary> {
        let inner = self.inner.read();
        let mut summaries: Vec<WorkflowSummary> = inner
            .iter()
            .map(|(id, w)| WorkflowSummary {
                id: *id,
                name: w.name.clone(),
                description: w.description.clone(),
                node_count: w.node_count,
                edge_count: w.edge_count,
                updated_at: w.updated_at,
            })
            .collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        summaries
    }

    /// True when `id` is registered.
    #[must_use]
    pub fn has(&self, id: Uuid) -> bool {
        self.inner.read().contains_key(&id)
    }

    /// Number of stored workflows.
    #[must_use]
    pub fn count(&self) -> usize {
        self.inner.read().len()
    }

    /// Drop every stored workflow.
    pub fn clear(&self) {
        self.inner.write().clear();
    }

    /// Creation time of a stored workflow.
    pub fn created_at(&self, id: Uuid) -> Result<DateTime<Utc>, StoreError> {
        self.inner
            .read()
            .get(&id)
            .map(|w| w.created_at)
            .ok_or(StoreError::NotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{"nodes": [{"id": "a", "data": {"value": 1}}], "edges": []}"#;

    #[test]
    fn register_get_roundtrip() {
        let store = WorkflowStore::new();
        let id = store.register("calc", "adds numbers", VALID).unwrap();
        assert_eq!(store.get(id).unwrap(), VALID);
        assert!(store.has(id));
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn register_rejects_unparseable_json() {
        let store = WorkflowStore::new();
        let err = store.register("bad", "", "{nodes").unwrap_err();
        assert!(matches!(err, StoreError::InvalidPayload(_)));
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn stored_copy_is_independent_of_caller_buffer() {
        let store = WorkflowStore::new();
        let mut buffer = String::from(VALID);
        let id = store.register("calc", "", &buffer).unwrap();
        buffer.clear();
        assert_eq!(store.get(id).unwrap(), VALID);
    }

    #[test]
    fn update_replaces_and_revalidates() {
        let store = WorkflowStore::new();
        let id = store.register("calc", "", VALID).unwrap();

        assert!(store.update(id, "not json").is_err());
        // Failed update leaves the original intact.
        assert_eq!(store.get(id).unwrap(), VALID);

        let next = r#"{"nodes": [], "edges": []}"#;
        store.update(id, next).unwrap();
        assert_eq!(store.get(id).unwrap(), next);
    }

    #[test]
    fn unregister_and_missing_ids() {
        let store = WorkflowStore::new();
        let id = store.register("calc", "", VALID).unwrap();
        store.unregister(id).unwrap();
        assert!(!store.has(id));
        assert!(matches!(store.get(id), Err(StoreError::NotFound(_))));
        assert!(matches!(store.unregister(id), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn list_sorted_by_name_with_counts() {
        let store = WorkflowStore::new();
        store.register("zeta", "", VALID).unwrap();
        store.register("alpha", "first", VALID).unwrap();

        let summaries = store.list();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].name, "alpha");
        assert_eq!(summaries[0].description, "first");
        assert_eq!(summaries[0].node_count, 1);
        assert_eq!(summaries[1].name, "zeta");
    }

    #[test]
    fn clear_empties_the_store() {
        let store = WorkflowStore::new();
        store.register("calc", "", VALID).unwrap();
        store.clear();
        assert_eq!(store.count(), 0);
    }
}
