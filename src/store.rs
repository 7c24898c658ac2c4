#![allow(dead_code)]
//! Node store: the collections normalized nodes are emitted into.
//!
//! [`GraphStore`] is the in-memory implementation used by the CLI. Clones
//! share one `Arc<RwLock<..>>`, so concurrent writers are serialized by the
//! store itself.

use indexmap::IndexMap;
use serde::Serialize;
use std::sync::{Arc, RwLock};
use tracing::debug;

use crate::error::StoreError;
use crate::node::Node;

/// Consumer of the normalized graph.
pub trait NodeStore: Send + Sync {
    /// Declare a collection. Declaring twice is a no-op.
    fn add_collection(&self, name: &str);

    /// Declare `field` on nodes of `collection` as a reference into `target`.
    fn add_reference(&self, collection: &str, field: &str, target: &str) -> Result<(), StoreError>;

    fn add_node(&self, collection: &str, node: Node) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Collection {
    pub references: IndexMap<String, String>,
    pub nodes: Vec<Node>,
}

#[derive(Debug, Default, Serialize)]
struct Graph {
    collections: IndexMap<String, Collection>,
}

/// In-memory node graph.
#[derive(Debug, Clone, Default)]
pub struct GraphStore {
    inner: Arc<RwLock<Graph>>,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collection_names(&self) -> Vec<String> {
        self.inner.read().unwrap().collections.keys().cloned().collect()
    }

    /// Snapshot of one collection.
    pub fn collection(&self, name: &str) -> Option<Collection> {
        self.inner.read().unwrap().collections.get(name).cloned()
    }

    pub fn node_count(&self) -> usize {
        self.inner
            .read()
            .unwrap()
            .collections
            .values()
            .map(|c| c.nodes.len())
            .sum()
    }

    /// The whole graph as JSON.
    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(&*self.inner.read().unwrap())
    }
}

impl NodeStore for GraphStore {
    fn add_collection(&self, name: &str) {
        let mut graph = self.inner.write().unwrap();
        if !graph.collections.contains_key(name) {
            debug!("GraphStore: added collection '{}'", name);
            graph.collections.insert(name.to_string(), Collection::default());
        }
    }

    fn add_reference(&self, collection: &str, field: &str, target: &str) -> Result<(), StoreError> {
        let mut graph = self.inner.write().unwrap();
        let entry = graph
            .collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))?;
        entry.references.insert(field.to_string(), target.to_string());
        Ok(())
    }

    fn add_node(&self, collection: &str, node: Node) -> Result<(), StoreError> {
        let mut graph = self.inner.write().unwrap();
        let entry = graph
            .collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))?;
        entry.nodes.push(node);
        Ok(())
    }
}
