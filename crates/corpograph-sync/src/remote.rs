//! Capability contract for the remote graph store.
//!
//! The engine needs exactly four primitives of its remote collaborator:
//! fetch, create and update by identity, plus a batched edge-link
//! operation. Any graph store offering these can back the engine; the
//! ArangoDB client in [`crate::arango`] is one implementation.

use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Opaque reference to an entity in the remote graph store.
///
/// Handles are valid for the duration of one synchronization run; the
/// local-to-remote mapping built around them is rebuilt on every run and
/// discarded afterward.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteHandle {
    /// Remote collection (derived from the local `node_type`).
    pub collection: String,
    /// Remote document key within the collection.
    pub key: String,
}

impl RemoteHandle {
    pub fn new(collection: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            key: key.into(),
        }
    }

    /// The `collection/key` form used by document APIs.
    pub fn document_id(&self) -> String {
        format!("{}/{}", self.collection, self.key)
    }
}

/// Operations the synchronization engine requires of a remote graph store.
///
/// Implementations must make `create_node` + `update_node` together behave
/// as an upsert on the `(collection, key)` identity, and should leave any
/// fields this engine does not own (remote bookkeeping such as creation
/// timestamps) untouched on update.
#[async_trait]
pub trait RemoteGraph: Send + Sync {
    /// Look up an entity by identity. `Ok(None)` when it does not exist.
    async fn fetch_node(&self, collection: &str, key: &str) -> Result<Option<RemoteHandle>>;

    /// Create a new entity under the given identity.
    async fn create_node(
        &self,
        collection: &str,
        key: &str,
        name: &str,
        sub_type: &str,
        attributes: &BTreeMap<String, String>,
    ) -> Result<RemoteHandle>;

    /// Update an existing entity's name and attributes.
    async fn update_node(
        &self,
        handle: &RemoteHandle,
        name: &str,
        attributes: &BTreeMap<String, String>,
    ) -> Result<()>;

    /// Insert one batch of `(from, to)` links of a single relationship
    /// type. Batches arrive already de-duplicated within a run; inserts of
    /// links that exist remotely from a prior run must not fail.
    async fn link_edges(
        &self,
        edge_type: &str,
        links: &[(RemoteHandle, RemoteHandle)],
    ) -> Result<()>;
}
