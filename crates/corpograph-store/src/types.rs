//! Stored graph records and export containers.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored node.
///
/// `id` is the store-internal surrogate key used to link edges; callers
/// address nodes by `(node_type, lookup_key)`, which is unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: i64,
    pub node_type: String,
    pub sub_type: String,
    pub lookup_key: String,
    pub data: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
    /// Advances only when `data` actually changes.
    pub updated_at: DateTime<Utc>,
}

/// A stored relationship. `(from_id, to_id, edge_type)` is unique; parallel
/// edges of the same type between the same endpoints are collapsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub from_id: i64,
    pub to_id: i64,
    pub edge_type: String,
    pub created_at: DateTime<Utc>,
}

/// Snapshot returned by the export operations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphExport {
    pub nodes: Vec<NodeRecord>,
    pub edges: Vec<EdgeRecord>,
}
