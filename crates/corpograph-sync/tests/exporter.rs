//! Engine tests against an in-memory mock of the remote graph store.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use corpograph_store::{EdgePayload, GraphStore, NodePayload};
use corpograph_sync::{GraphExporter, RemoteGraph, RemoteHandle, SyncError};
use tempfile::tempdir;

#[derive(Default)]
struct RemoteState {
    /// document id -> attributes, the mock's picture of the remote store.
    nodes: Mutex<HashMap<String, BTreeMap<String, String>>>,
    creates: AtomicUsize,
    updates: AtomicUsize,
    /// Every link batch as issued: (edge type, document-id pairs).
    link_batches: Mutex<Vec<(String, Vec<(String, String)>)>>,
    fail_links: AtomicBool,
}

#[derive(Clone, Default)]
struct MockRemote {
    state: Arc<RemoteState>,
}

impl MockRemote {
    fn state(&self) -> Arc<RemoteState> {
        Arc::clone(&self.state)
    }
}

#[async_trait]
impl RemoteGraph for MockRemote {
    async fn fetch_node(&self, collection: &str, key: &str) -> Result<Option<RemoteHandle>> {
        let nodes = self.state.nodes.lock().expect("nodes");
        if nodes.contains_key(&format!("{collection}/{key}")) {
            Ok(Some(RemoteHandle::new(collection, key)))
        } else {
            Ok(None)
        }
    }

    async fn create_node(
        &self,
        collection: &str,
        key: &str,
        _name: &str,
        _sub_type: &str,
        attributes: &BTreeMap<String, String>,
    ) -> Result<RemoteHandle> {
        let handle = RemoteHandle::new(collection, key);
        self.state
            .nodes
            .lock()
            .expect("nodes")
            .insert(handle.document_id(), attributes.clone());
        self.state.creates.fetch_add(1, Ordering::SeqCst);
        Ok(handle)
    }

    async fn update_node(
        &self,
        handle: &RemoteHandle,
        _name: &str,
        attributes: &BTreeMap<String, String>,
    ) -> Result<()> {
        let mut nodes = self.state.nodes.lock().expect("nodes");
        let entry = nodes
            .get_mut(&handle.document_id())
            .ok_or_else(|| anyhow!("update of unknown document {}", handle.document_id()))?;
        entry.extend(attributes.clone());
        self.state.updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn link_edges(
        &self,
        edge_type: &str,
        links: &[(RemoteHandle, RemoteHandle)],
    ) -> Result<()> {
        if self.state.fail_links.load(Ordering::SeqCst) {
            return Err(anyhow!("simulated remote failure"));
        }
        let pairs = links
            .iter()
            .map(|(from, to)| (from.document_id(), to.document_id()))
            .collect();
        self.state
            .link_batches
            .lock()
            .expect("links")
            .push((edge_type.to_string(), pairs));
        Ok(())
    }
}

fn payload(node_type: &str, lookup_key: &str, edges: Vec<EdgePayload>) -> NodePayload {
    NodePayload {
        node_type: node_type.to_string(),
        sub_type: "Test".to_string(),
        lookup_key: lookup_key.to_string(),
        data: BTreeMap::from([("name".to_string(), lookup_key.to_string())]),
        edges,
    }
}

fn edge(to_node_type: &str, to_lookup_key: &str, edge_type: &str) -> EdgePayload {
    EdgePayload {
        to_node_type: to_node_type.to_string(),
        to_lookup_key: to_lookup_key.to_string(),
        edge_type: edge_type.to_string(),
    }
}

/// Company with two products, plus an unrelated isolated node.
fn seed_store(dir: &tempfile::TempDir) -> GraphStore {
    let store = GraphStore::new(dir.path().join("staging.duckdb")).expect("store");
    store
        .upsert_payloads(&[
            payload(
                "OrganizationUnit",
                "Acme",
                vec![
                    edge("DomainEntity", "Widget", "PartOfProduct"),
                    edge("DomainEntity", "Gadget", "PartOfProduct"),
                ],
            ),
            payload("DomainEntity", "Widget", Vec::new()),
            payload("DomainEntity", "Gadget", Vec::new()),
            payload("OrganizationUnit", "Unrelated", Vec::new()),
        ])
        .expect("seed");
    store
}

#[tokio::test]
async fn first_run_creates_second_run_updates() {
    let dir = tempdir().expect("tempdir");
    let store = seed_store(&dir);
    let remote = MockRemote::default();
    let state = remote.state();
    let exporter = GraphExporter::new(store, remote);

    let root = exporter.store_subgraph("Acme").await.expect("first run");
    assert_eq!(root.document_id(), "OrganizationUnit/Acme");
    assert_eq!(state.creates.load(Ordering::SeqCst), 3);
    assert_eq!(state.updates.load(Ordering::SeqCst), 0);

    let root = exporter.store_subgraph("Acme").await.expect("second run");
    assert_eq!(root.document_id(), "OrganizationUnit/Acme");
    // No new remote entities; everything became an update.
    assert_eq!(state.creates.load(Ordering::SeqCst), 3);
    assert_eq!(state.updates.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn link_batches_are_grouped_and_duplicate_free() {
    let dir = tempdir().expect("tempdir");
    let store = seed_store(&dir);
    let remote = MockRemote::default();
    let state = remote.state();
    let exporter = GraphExporter::new(store, remote);

    exporter.store_subgraph("Acme").await.expect("run");
    exporter.store_subgraph("Acme").await.expect("re-run");

    let batches = state.link_batches.lock().expect("links");
    // One batch per relationship type per run.
    assert_eq!(batches.len(), 2);
    for (edge_type, pairs) in batches.iter() {
        assert_eq!(edge_type, "PartOfProduct");
        assert_eq!(pairs.len(), 2);
        let unique: HashSet<&(String, String)> = pairs.iter().collect();
        assert_eq!(unique.len(), pairs.len(), "duplicate pair in link batch");
        for (from, _) in pairs {
            assert_eq!(from, "OrganizationUnit/Acme");
        }
    }
}

#[tokio::test]
async fn isolated_nodes_stay_local() {
    let dir = tempdir().expect("tempdir");
    let store = seed_store(&dir);
    let remote = MockRemote::default();
    let state = remote.state();
    let exporter = GraphExporter::new(store, remote);

    exporter.store_subgraph("Acme").await.expect("run");

    let nodes = state.nodes.lock().expect("nodes");
    assert_eq!(nodes.len(), 3);
    assert!(!nodes.contains_key("OrganizationUnit/Unrelated"));
}

#[tokio::test]
async fn rerun_after_link_failure_converges() {
    let dir = tempdir().expect("tempdir");
    let store = seed_store(&dir);
    let remote = MockRemote::default();
    let state = remote.state();
    let exporter = GraphExporter::new(store, remote);

    // First run writes all nodes, then dies linking edges.
    state.fail_links.store(true, Ordering::SeqCst);
    let err = exporter
        .store_subgraph("Acme")
        .await
        .expect_err("link failure");
    assert!(matches!(err, SyncError::Remote(_)));
    assert_eq!(state.creates.load(Ordering::SeqCst), 3);
    assert!(state.link_batches.lock().expect("links").is_empty());

    // Re-invocation completes the edge phase without re-creating nodes.
    state.fail_links.store(false, Ordering::SeqCst);
    exporter.store_subgraph("Acme").await.expect("second run");
    assert_eq!(state.creates.load(Ordering::SeqCst), 3);
    assert_eq!(state.updates.load(Ordering::SeqCst), 3);
    let batches = state.link_batches.lock().expect("links");
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].1.len(), 2);
}

#[tokio::test]
async fn unknown_root_is_a_not_found_error() {
    let dir = tempdir().expect("tempdir");
    let store = seed_store(&dir);
    let exporter = GraphExporter::new(store, MockRemote::default());

    let err = exporter
        .store_subgraph("Missing")
        .await
        .expect_err("unknown root");
    assert!(matches!(err, SyncError::RootNotFound(_)));
}

#[tokio::test]
async fn node_attributes_reach_the_remote() {
    let dir = tempdir().expect("tempdir");
    let store = GraphStore::new(dir.path().join("staging.duckdb")).expect("store");
    let mut company = payload("OrganizationUnit", "Acme", Vec::new());
    company
        .data
        .insert("industry".to_string(), "Widgets".to_string());
    store.upsert_payloads(&[company]).expect("seed");

    let remote = MockRemote::default();
    let state = remote.state();
    let exporter = GraphExporter::new(store, remote);
    exporter.store_subgraph("Acme").await.expect("run");

    let nodes = state.nodes.lock().expect("nodes");
    let attrs = nodes.get("OrganizationUnit/Acme").expect("document");
    assert_eq!(attrs.get("industry").map(String::as_str), Some("Widgets"));
}
