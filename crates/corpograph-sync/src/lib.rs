//! Subgraph synchronization engine for corpograph.
//!
//! This crate reads a connected subgraph out of the local staging store
//! ([`corpograph_store::GraphStore`]) and pushes it into a remote graph
//! database, translating local surrogate ids into remote identities and
//! de-duplicating relationships.
//!
//! # Design
//!
//! - **Idempotent Upserts**: nodes are fetched-then-updated or created, and
//!   edge batches carry no duplicate pairs, so re-running a synchronization
//!   after a partial failure converges instead of duplicating data.
//! - **Run-Scoped Identity Map**: the `local id -> remote handle` mapping
//!   is rebuilt on every run and discarded afterward; nothing about the
//!   remote store is persisted locally.
//! - **Pluggable Remote**: the remote side is the four-operation
//!   [`RemoteGraph`] trait; an ArangoDB client over the HTTP document API
//!   ships in [`arango`], and any backend with fetch/create/update by
//!   identity plus batched edge linking can stand in.
//!
//! # Usage
//!
//! ```ignore
//! use corpograph_store::GraphStore;
//! use corpograph_sync::{ArangoConfig, ArangoRemote, GraphExporter};
//!
//! let store = GraphStore::new("staging.duckdb")?;
//! let remote = ArangoRemote::new(ArangoConfig::default())?;
//! let exporter = GraphExporter::new(store, remote);
//!
//! let root = exporter.store_subgraph("Apple Inc.").await?;
//! println!("root stored as {}", root.document_id());
//! ```

pub mod arango;
pub mod engine;
pub mod error;
pub mod remote;

pub use arango::{ArangoConfig, ArangoRemote};
pub use engine::GraphExporter;
pub use error::SyncError;
pub use remote::{RemoteGraph, RemoteHandle};
