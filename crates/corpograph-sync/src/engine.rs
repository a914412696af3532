//! Export of connected subgraphs from the staging store into a remote
//! graph store.

use std::collections::{BTreeMap, HashMap, HashSet};

use corpograph_store::{GraphStore, NodeRecord};
use tracing::{debug, info};

use crate::error::SyncError;
use crate::remote::{RemoteGraph, RemoteHandle};

/// Pushes connected subgraphs from the local staging store into a remote
/// graph store, translating surrogate ids into remote identities and
/// de-duplicating relationships.
///
/// The exporter owns its remote client for exactly one run scope; dropping
/// the exporter releases the client on every exit path, including after a
/// failed run. It never mutates local state.
pub struct GraphExporter<R> {
    store: GraphStore,
    remote: R,
}

impl<R: RemoteGraph> GraphExporter<R> {
    pub fn new(store: GraphStore, remote: R) -> Self {
        Self { store, remote }
    }

    /// Export the connected component rooted at `lookup_key` and return the
    /// remote handle of the root.
    ///
    /// Every remote write is an idempotent upsert, so a run that failed
    /// partway (nodes written, edges not yet linked) converges when
    /// re-invoked: creates become updates and edge inserts become no-ops.
    pub async fn store_subgraph(&self, lookup_key: &str) -> Result<RemoteHandle, SyncError> {
        let root = self
            .store
            .find_by_lookup_key(lookup_key)?
            .ok_or_else(|| SyncError::RootNotFound(lookup_key.to_string()))?;

        let subgraph = self.store.export_reachable(root.id)?;
        info!(
            "exporting subgraph rooted at {:?}: {} nodes, {} edges",
            lookup_key,
            subgraph.nodes.len(),
            subgraph.edges.len()
        );

        // Upsert nodes, building the run-local id map.
        let mut handles: HashMap<i64, RemoteHandle> = HashMap::new();
        let mut root_handle = None;
        for node in &subgraph.nodes {
            let handle = self.upsert_node(node).await?;
            if node.id == root.id {
                root_handle = Some(handle.clone());
            }
            handles.insert(node.id, handle);
        }

        // Group edges by type and translate endpoints through the id map.
        let mut by_type: BTreeMap<&str, Vec<(RemoteHandle, RemoteHandle)>> = BTreeMap::new();
        for edge in &subgraph.edges {
            let (from, to) = match (handles.get(&edge.from_id), handles.get(&edge.to_id)) {
                (Some(from), Some(to)) => (from.clone(), to.clone()),
                _ => {
                    debug!(
                        "skipping edge {} -> {} ({}): endpoint not mapped",
                        edge.from_id, edge.to_id, edge.edge_type
                    );
                    continue;
                }
            };
            by_type.entry(&edge.edge_type).or_default().push((from, to));
        }

        // One batched link call per relationship type, duplicate pairs
        // suppressed in first-seen order.
        for (edge_type, links) in &by_type {
            let mut seen: HashSet<(String, String)> = HashSet::new();
            let unique: Vec<(RemoteHandle, RemoteHandle)> = links
                .iter()
                .filter(|(from, to)| seen.insert((from.document_id(), to.document_id())))
                .cloned()
                .collect();
            self.remote
                .link_edges(edge_type, &unique)
                .await
                .map_err(SyncError::remote)?;
            debug!("linked {} {} edges", unique.len(), edge_type);
        }

        // The root is always the first node the traversal visits.
        root_handle.ok_or_else(|| SyncError::RootNotFound(lookup_key.to_string()))
    }

    /// Fetch-then-update or create one node remotely.
    async fn upsert_node(&self, node: &NodeRecord) -> Result<RemoteHandle, SyncError> {
        let existing = self
            .remote
            .fetch_node(&node.node_type, &node.lookup_key)
            .await
            .map_err(SyncError::remote)?;
        match existing {
            Some(handle) => {
                self.remote
                    .update_node(&handle, &node.lookup_key, &node.data)
                    .await
                    .map_err(SyncError::remote)?;
                Ok(handle)
            }
            None => self
                .remote
                .create_node(
                    &node.node_type,
                    &node.lookup_key,
                    &node.lookup_key,
                    &node.sub_type,
                    &node.data,
                )
                .await
                .map_err(SyncError::remote),
        }
    }
}
