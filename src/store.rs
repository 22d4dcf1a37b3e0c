//! Sequence persistence: CRUD over named sequence documents.
//!
//! A [`Sequence`] is a graph snapshot plus bookkeeping (`name`, timestamps).
//! The store owns the documents exclusively; the compiler only ever reads a
//! snapshot handed to it by the route layer. `updated_at` is refreshed on
//! every mutation and drives the listing order.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use miette::Diagnostic;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::graph::{Edge, Node, SequenceGraph};

/// Name given to sequences created without one.
pub const DEFAULT_SEQUENCE_NAME: &str = "Untitled Sequence";

/// A persisted sequence document.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Sequence {
    pub id: String,
    pub name: String,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Sequence {
    /// The graph snapshot this document holds.
    #[must_use]
    pub fn graph(&self) -> SequenceGraph {
        SequenceGraph::new(self.nodes.clone(), self.edges.clone())
    }
}

/// Errors surfaced by sequence stores.
#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    /// No sequence with the requested id.
    #[error("sequence not found: {id}")]
    #[diagnostic(code(coldflow::store::not_found))]
    NotFound { id: String },

    /// The backing storage is unavailable or misbehaving.
    #[error("sequence store backend error: {message}")]
    #[diagnostic(code(coldflow::store::backend))]
    Backend { message: String },
}

/// CRUD interface over persisted sequences.
#[async_trait]
pub trait SequenceStore: Send + Sync {
    /// Create a sequence; `None` name falls back to
    /// [`DEFAULT_SEQUENCE_NAME`].
    async fn create(
        &self,
        name: Option<String>,
        nodes: Vec<Node>,
        edges: Vec<Edge>,
    ) -> Result<Sequence, StoreError>;

    async fn get(&self, id: &str) -> Result<Sequence, StoreError>;

    /// All sequences, most recently updated first.
    async fn list(&self) -> Result<Vec<Sequence>, StoreError>;

    /// Replace name and graph; refreshes `updated_at`.
    async fn update(
        &self,
        id: &str,
        name: Option<String>,
        nodes: Vec<Node>,
        edges: Vec<Edge>,
    ) -> Result<Sequence, StoreError>;

    async fn delete(&self, id: &str) -> Result<(), StoreError>;
}

/// Volatile sequence store for tests and development.
#[derive(Default)]
pub struct InMemorySequenceStore {
    sequences: Mutex<FxHashMap<String, Sequence>>,
}

impl InMemorySequenceStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SequenceStore for InMemorySequenceStore {
    async fn create(
        &self,
        name: Option<String>,
        nodes: Vec<Node>,
        edges: Vec<Edge>,
    ) -> Result<Sequence, StoreError> {
        let now = Utc::now();
        let sequence = Sequence {
            id: Uuid::new_v4().to_string(),
            name: name.unwrap_or_else(|| DEFAULT_SEQUENCE_NAME.to_string()),
            nodes,
            edges,
            created_at: now,
            updated_at: now,
        };
        self.sequences
            .lock()
            .insert(sequence.id.clone(), sequence.clone());
        Ok(sequence)
    }

    async fn get(&self, id: &str) -> Result<Sequence, StoreError> {
        self.sequences
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })
    }

    async fn list(&self) -> Result<Vec<Sequence>, StoreError> {
        let mut all: Vec<Sequence> = self.sequences.lock().values().cloned().collect();
        all.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(all)
    }

    async fn update(
        &self,
        id: &str,
        name: Option<String>,
        nodes: Vec<Node>,
        edges: Vec<Edge>,
    ) -> Result<Sequence, StoreError> {
        let mut sequences = self.sequences.lock();
        let existing = sequences
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;
        if let Some(name) = name {
            existing.name = name;
        }
        existing.nodes = nodes;
        existing.edges = edges;
        existing.updated_at = Utc::now();
        Ok(existing.clone())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.sequences
            .lock()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_applies_default_name() {
        let store = InMemorySequenceStore::new();
        let seq = store.create(None, vec![], vec![]).await.expect("create");
        assert_eq!(seq.name, DEFAULT_SEQUENCE_NAME);
    }

    #[tokio::test]
    async fn list_orders_by_updated_at_desc() {
        let store = InMemorySequenceStore::new();
        let a = store
            .create(Some("a".to_string()), vec![], vec![])
            .await
            .expect("create a");
        let _b = store
            .create(Some("b".to_string()), vec![], vec![])
            .await
            .expect("create b");
        // Touch "a" so it becomes the most recent.
        store
            .update(&a.id, None, vec![], vec![])
            .await
            .expect("update a");

        let listed = store.list().await.expect("list");
        assert_eq!(listed[0].name, "a");
        assert_eq!(listed[1].name, "b");
    }

    #[tokio::test]
    async fn missing_ids_surface_not_found() {
        let store = InMemorySequenceStore::new();
        assert!(matches!(
            store.get("nope").await,
            Err(StoreError::NotFound { .. })
        ));
        assert!(matches!(
            store.update("nope", None, vec![], vec![]).await,
            Err(StoreError::NotFound { .. })
        ));
        assert!(matches!(
            store.delete("nope").await,
            Err(StoreError::NotFound { .. })
        ));
    }
}
