//! Durable, idempotent staging store for a property graph.
//!
//! Nodes are keyed by `(node_type, lookup_key)`; edges by
//! `(from_id, to_id, edge_type)`. Repeated ingestion of overlapping payload
//! batches merges node attributes and collapses duplicate edges, so callers
//! can resubmit batches freely.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use duckdb::{params, Connection, Row};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::migrations;
use crate::payload::NodePayload;
use crate::types::{EdgeRecord, GraphExport, NodeRecord};

/// Retry policy for transient lock contention on the database file.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Maximum attempts for one logical write operation.
    pub max_retries: u32,
    /// Backoff before the first retry; doubles on each subsequent one.
    pub initial_backoff: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
        }
    }
}

/// Durable node/edge store backed by a DuckDB file.
///
/// Cheap to clone; every operation opens its own connection, so one
/// instance can be shared across threads. Concurrent writers serialize on
/// the database file, and contention surfaces as retried transient errors
/// rather than corruption.
#[derive(Debug, Clone)]
pub struct GraphStore {
    db_path: PathBuf,
    config: StoreConfig,
}

impl GraphStore {
    /// Create or open the store at `db_path` and run migrations.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, StoreError> {
        Self::with_config(db_path, StoreConfig::default())
    }

    /// Same as [`GraphStore::new`] with an explicit retry policy.
    pub fn with_config<P: AsRef<Path>>(
        db_path: P,
        config: StoreConfig,
    ) -> Result<Self, StoreError> {
        let db_path = db_path.as_ref().to_path_buf();
        if let Some(dir) = db_path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let conn = Connection::open(&db_path)?;
        migrations::run(&conn)?;
        Ok(Self { db_path, config })
    }

    /// Fresh connection to the database file.
    fn conn(&self) -> Result<Connection, duckdb::Error> {
        Connection::open(&self.db_path)
    }

    /// Merge a batch of payloads into the store.
    ///
    /// The batch runs as one transaction in two passes: all nodes are
    /// written first (insert, or shallow-merge update where the incoming
    /// value wins per key), then all edges are resolved and inserted
    /// if absent. Edges whose target cannot be resolved are dropped
    /// silently. Any failure rolls the whole batch back; transient lock
    /// contention retries the whole attempt with exponential backoff.
    pub fn upsert_payloads(&self, payloads: &[NodePayload]) -> Result<(), StoreError> {
        let mut delay = self.config.initial_backoff;
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_upsert(payloads) {
                Ok(()) => return Ok(()),
                Err(StoreError::Database(err)) if is_transient(&err) => {
                    if attempt >= self.config.max_retries {
                        warn!("store still locked after {} attempts, giving up", attempt);
                        return Err(StoreError::Busy { attempts: attempt });
                    }
                    warn!("store locked, retrying in {:?}", delay);
                    std::thread::sleep(delay);
                    delay *= 2;
                }
                Err(other) => return Err(other),
            }
        }
    }

    /// One transactional attempt at the two-pass upsert.
    fn try_upsert(&self, payloads: &[NodePayload]) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute_batch("BEGIN TRANSACTION;")?;
        match upsert_tx(&conn, payloads) {
            Ok(()) => {
                conn.execute_batch("COMMIT;")?;
                Ok(())
            }
            Err(err) => {
                if let Err(rb) = conn.execute_batch("ROLLBACK;") {
                    warn!("rollback after failed batch also failed: {}", rb);
                }
                Err(err)
            }
        }
    }

    /// Fetch a node by its natural key.
    pub fn find_node(
        &self,
        node_type: &str,
        lookup_key: &str,
    ) -> Result<Option<NodeRecord>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{NODE_SELECT} WHERE node_type = ? AND lookup_key = ?"
        ))?;
        let mut rows = stmt.query(params![node_type, lookup_key])?;
        match rows.next()? {
            Some(row) => Ok(Some(node_from_row(row)?)),
            None => Ok(None),
        }
    }

    /// Fetch a node by lookup key alone, across node types. Used to locate
    /// subgraph roots whose type the caller does not know.
    pub fn find_by_lookup_key(&self, lookup_key: &str) -> Result<Option<NodeRecord>, StoreError> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare(&format!("{NODE_SELECT} WHERE lookup_key = ? ORDER BY id"))?;
        let mut rows = stmt.query(params![lookup_key])?;
        match rows.next()? {
            Some(row) => Ok(Some(node_from_row(row)?)),
            None => Ok(None),
        }
    }

    /// Every node and edge, nodes ordered by id, edges by endpoint pair.
    pub fn export_all(&self) -> Result<GraphExport, StoreError> {
        let conn = self.conn()?;

        let mut nodes = Vec::new();
        let mut stmt = conn.prepare(&format!("{NODE_SELECT} ORDER BY id"))?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            nodes.push(node_from_row(row)?);
        }

        let mut edges = Vec::new();
        let mut stmt = conn.prepare(&format!("{EDGE_SELECT} ORDER BY from_id, to_id"))?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            edges.push(edge_from_row(row)?);
        }

        Ok(GraphExport { nodes, edges })
    }

    /// The connected component reachable from the named root, following
    /// edges in both directions.
    pub fn export_subgraph(
        &self,
        lookup_key: &str,
        node_type: &str,
    ) -> Result<GraphExport, StoreError> {
        match self.find_node(node_type, lookup_key)? {
            Some(root) => self.export_reachable(root.id),
            None => Err(StoreError::NotFound {
                node_type: node_type.to_string(),
                lookup_key: lookup_key.to_string(),
            }),
        }
    }

    /// Same traversal keyed by surrogate id. The synchronization engine
    /// calls this after resolving its root.
    pub fn export_reachable(&self, root_id: i64) -> Result<GraphExport, StoreError> {
        let conn = self.conn()?;

        let mut node_stmt = conn.prepare(&format!("{NODE_SELECT} WHERE id = ?"))?;
        let mut edge_stmt =
            conn.prepare(&format!("{EDGE_SELECT} WHERE from_id = ? OR to_id = ?"))?;

        let mut to_visit = VecDeque::from([root_id]);
        let mut visited: HashSet<i64> = HashSet::new();
        let mut edge_seen: HashSet<(i64, i64, String)> = HashSet::new();
        let mut nodes = Vec::new();
        let mut edges = Vec::new();

        while let Some(nid) = to_visit.pop_front() {
            if !visited.insert(nid) {
                continue;
            }

            let mut rows = node_stmt.query(params![nid])?;
            match rows.next()? {
                Some(row) => nodes.push(node_from_row(row)?),
                None => {
                    warn!("edge references missing node id {}", nid);
                    continue;
                }
            }

            let mut rows = edge_stmt.query(params![nid, nid])?;
            while let Some(row) = rows.next()? {
                let edge = edge_from_row(row)?;
                let other = if edge.from_id == nid {
                    edge.to_id
                } else {
                    edge.from_id
                };
                if !visited.contains(&other) {
                    to_visit.push_back(other);
                }
                if edge_seen.insert((edge.from_id, edge.to_id, edge.edge_type.clone())) {
                    edges.push(edge);
                }
            }
        }

        Ok(GraphExport { nodes, edges })
    }

    pub fn node_count(&self) -> Result<i64, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT COUNT(*) FROM nodes")?;
        let count = stmt.query_row([], |row| row.get(0))?;
        Ok(count)
    }

    pub fn edge_count(&self) -> Result<i64, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT COUNT(*) FROM edges")?;
        let count = stmt.query_row([], |row| row.get(0))?;
        Ok(count)
    }
}

const NODE_SELECT: &str = "SELECT id, node_type, sub_type, lookup_key, data, \
     CAST(created_at AS TEXT) AS created_at, CAST(updated_at AS TEXT) AS updated_at \
     FROM nodes";

const EDGE_SELECT: &str = "SELECT from_id, to_id, edge_type, \
     CAST(created_at AS TEXT) AS created_at \
     FROM edges";

/// Body of one upsert attempt; runs inside an open transaction.
fn upsert_tx(conn: &Connection, payloads: &[NodePayload]) -> Result<(), StoreError> {
    // Pass 1: nodes. Every node lands before any edge is resolved, so edges
    // may reference nodes introduced later in the same batch.
    for payload in payloads {
        payload.validate()?;

        match node_id_and_data(conn, &payload.node_type, &payload.lookup_key)? {
            Some((id, current)) => {
                // Shallow merge, incoming value wins per key.
                let mut merged = current.clone();
                for (k, v) in &payload.data {
                    merged.insert(k.clone(), v.clone());
                }
                if merged != current {
                    let mut stmt = conn.prepare(
                        "UPDATE nodes SET data = ?, updated_at = current_timestamp WHERE id = ?",
                    )?;
                    stmt.execute(params![serde_json::to_string(&merged)?, id])?;
                }
            }
            None => {
                let mut stmt = conn.prepare(
                    "INSERT INTO nodes (node_type, sub_type, lookup_key, data) \
                     VALUES (?, ?, ?, ?)",
                )?;
                stmt.execute(params![
                    payload.node_type,
                    payload.sub_type,
                    payload.lookup_key,
                    serde_json::to_string(&payload.data)?
                ])?;
            }
        }
    }

    // Pass 2: edges. Unresolvable targets are skipped, never stored dangling.
    for payload in payloads {
        if payload.edges.is_empty() {
            continue;
        }
        let from_id = match node_id(conn, &payload.node_type, &payload.lookup_key)? {
            Some(id) => id,
            None => continue,
        };
        for edge in &payload.edges {
            match node_id(conn, &edge.to_node_type, &edge.to_lookup_key)? {
                Some(to_id) => {
                    let mut stmt = conn.prepare(
                        "INSERT OR IGNORE INTO edges (from_id, to_id, edge_type) \
                         VALUES (?, ?, ?)",
                    )?;
                    stmt.execute(params![from_id, to_id, edge.edge_type])?;
                }
                None => {
                    debug!(
                        "dropping edge {} -> {}/{}: target not in store",
                        payload.lookup_key, edge.to_node_type, edge.to_lookup_key
                    );
                }
            }
        }
    }

    Ok(())
}

fn node_id(
    conn: &Connection,
    node_type: &str,
    lookup_key: &str,
) -> Result<Option<i64>, duckdb::Error> {
    let mut stmt = conn.prepare("SELECT id FROM nodes WHERE node_type = ? AND lookup_key = ?")?;
    let mut rows = stmt.query(params![node_type, lookup_key])?;
    match rows.next()? {
        Some(row) => Ok(Some(row.get(0)?)),
        None => Ok(None),
    }
}

fn node_id_and_data(
    conn: &Connection,
    node_type: &str,
    lookup_key: &str,
) -> Result<Option<(i64, BTreeMap<String, String>)>, StoreError> {
    let mut stmt =
        conn.prepare("SELECT id, data FROM nodes WHERE node_type = ? AND lookup_key = ?")?;
    let mut rows = stmt.query(params![node_type, lookup_key])?;
    match rows.next()? {
        Some(row) => {
            let id: i64 = row.get(0)?;
            let raw: String = row.get(1)?;
            let data: BTreeMap<String, String> = serde_json::from_str(&raw)?;
            Ok(Some((id, data)))
        }
        None => Ok(None),
    }
}

fn node_from_row(row: &Row) -> Result<NodeRecord, StoreError> {
    let id: i64 = row.get(0)?;
    let node_type: String = row.get(1)?;
    let sub_type: String = row.get(2)?;
    let lookup_key: String = row.get(3)?;
    let raw: String = row.get(4)?;
    let created_at: String = row.get(5)?;
    let updated_at: String = row.get(6)?;
    let data: BTreeMap<String, String> = serde_json::from_str(&raw)?;
    Ok(NodeRecord {
        id,
        node_type,
        sub_type,
        lookup_key,
        data,
        created_at: parse_ts(&created_at),
        updated_at: parse_ts(&updated_at),
    })
}

fn edge_from_row(row: &Row) -> Result<EdgeRecord, StoreError> {
    let from_id: i64 = row.get(0)?;
    let to_id: i64 = row.get(1)?;
    let edge_type: String = row.get(2)?;
    let created_at: String = row.get(3)?;
    Ok(EdgeRecord {
        from_id,
        to_id,
        edge_type,
        created_at: parse_ts(&created_at),
    })
}

/// DuckDB renders TIMESTAMP columns as naive local text.
fn parse_ts(raw: &str) -> DateTime<Utc> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .map(|dt| dt.and_utc())
        .unwrap_or_else(|_| Utc::now())
}

/// Lock contention between connections is safe to retry; everything else
/// is surfaced as-is.
fn is_transient(err: &duckdb::Error) -> bool {
    let msg = err.to_string().to_lowercase();
    msg.contains("lock") || msg.contains("conflict")
}
