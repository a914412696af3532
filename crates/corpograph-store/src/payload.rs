//! Wire-level payload types produced by upstream extraction agents.
//!
//! A [`NodePayloadList`] is the unit of ingestion: upstream collaborators
//! emit batches of [`NodePayload`] describing one entity each, plus its
//! outgoing relationships. Attribute values are opaque strings; no schema
//! beyond the required fields is enforced here.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// One outgoing relationship declared by a [`NodePayload`].
///
/// The target is addressed by its natural key; targets that are not present
/// in the store (or earlier in the same batch) are dropped at ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EdgePayload {
    /// The type of the target node.
    pub to_node_type: String,
    /// The unique key identifying the target node within its type.
    pub to_lookup_key: String,
    /// The type or label of the edge relationship.
    pub edge_type: String,
}

/// One entity and its outgoing relationships.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodePayload {
    /// The type/category of the node, e.g. `OrganizationUnit`.
    pub node_type: String,
    /// Secondary classification, e.g. `Company`, `Product`.
    pub sub_type: String,
    /// A unique identifier for this node within its type.
    pub lookup_key: String,
    /// Structured key-value data representing the node's attributes.
    pub data: BTreeMap<String, String>,
    /// Outgoing edges from this node.
    #[serde(default)]
    pub edges: Vec<EdgePayload>,
}

/// A batch of node payloads to be merged into the staging store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodePayloadList {
    pub payloads: Vec<NodePayload>,
}

impl EdgePayload {
    fn validate(&self, owner: &str) -> Result<(), StoreError> {
        if self.to_node_type.is_empty() {
            return Err(StoreError::InvalidPayload(format!(
                "edge on {owner}: to_node_type must not be empty"
            )));
        }
        if self.to_lookup_key.is_empty() {
            return Err(StoreError::InvalidPayload(format!(
                "edge on {owner}: to_lookup_key must not be empty"
            )));
        }
        if self.edge_type.is_empty() {
            return Err(StoreError::InvalidPayload(format!(
                "edge on {owner}: edge_type must not be empty"
            )));
        }
        Ok(())
    }
}

impl NodePayload {
    /// Check the required fields. Called once per payload during ingestion;
    /// a failure aborts the whole batch.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.node_type.is_empty() {
            return Err(StoreError::InvalidPayload(format!(
                "node_type must not be empty (lookup_key {:?})",
                self.lookup_key
            )));
        }
        if self.lookup_key.is_empty() {
            return Err(StoreError::InvalidPayload(format!(
                "lookup_key must not be empty (node_type {:?})",
                self.node_type
            )));
        }
        for edge in &self.edges {
            edge.validate(&self.lookup_key)?;
        }
        Ok(())
    }
}
