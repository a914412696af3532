//! ArangoDB implementation of [`RemoteGraph`] over the HTTP document API.
//!
//! Only the document and collection endpoints are used; no AQL. Vertex and
//! edge collections are created lazily on first write. Edge documents get a
//! deterministic `_key` derived from their endpoints, so re-synchronizing a
//! subgraph inserts nothing new on the remote side.

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value as JsonValue};
use tracing::debug;

use crate::remote::{RemoteGraph, RemoteHandle};

/// Connection parameters for one ArangoDB database. Supplied at
/// construction; nothing here is read from process-global state.
#[derive(Debug, Clone)]
pub struct ArangoConfig {
    pub base_url: String,
    pub database: String,
    pub username: String,
    pub password: String,
    pub timeout: Duration,
}

impl Default for ArangoConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8529".to_string(),
            database: "corpograph".to_string(),
            username: "root".to_string(),
            password: String::new(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// [`RemoteGraph`] backed by ArangoDB.
pub struct ArangoRemote {
    config: ArangoConfig,
    client: reqwest::Client,
    /// Collections confirmed to exist, so each is ensured at most once.
    ensured: Mutex<HashSet<String>>,
}

impl ArangoRemote {
    pub fn new(config: ArangoConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            config,
            client,
            ensured: Mutex::new(HashSet::new()),
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!(
            "{}/_db/{}/_api/{}",
            self.config.base_url, self.config.database, path
        )
    }

    fn request(&self, method: reqwest::Method, url: String) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .basic_auth(&self.config.username, Some(&self.config.password))
    }

    /// Restrict a lookup key to ArangoDB's document-key charset. The
    /// mapping is deterministic so fetch, create and edge-key derivation
    /// always agree on the same remote identity.
    fn document_key(key: &str) -> String {
        key.chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || "_-:.@()+,=;$!*'%".contains(c) {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }

    /// Deterministic `_key` for an edge document, so repeated link batches
    /// are remote no-ops.
    fn edge_key(from: &RemoteHandle, to: &RemoteHandle) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(from.document_id().as_bytes());
        hasher.update(&[0]);
        hasher.update(to.document_id().as_bytes());
        hasher.finalize().to_hex().to_string()
    }

    fn already_ensured(&self, name: &str) -> bool {
        self.ensured
            .lock()
            .map(|set| set.contains(name))
            .unwrap_or(false)
    }

    fn mark_ensured(&self, name: &str) {
        if let Ok(mut set) = self.ensured.lock() {
            set.insert(name.to_string());
        }
    }

    /// Create the collection if needed; an already-exists conflict is fine.
    async fn ensure_collection(&self, name: &str, edge: bool) -> Result<()> {
        if self.already_ensured(name) {
            return Ok(());
        }
        let body = json!({
            "name": name,
            "type": if edge { 3 } else { 2 },
        });
        let resp = self
            .request(reqwest::Method::POST, self.api_url("collection"))
            .json(&body)
            .send()
            .await
            .with_context(|| format!("creating collection {name}"))?;
        match resp.status() {
            StatusCode::CONFLICT => {}
            status if status.is_success() => {
                debug!("created collection {}", name);
            }
            status => return Err(anyhow!("creating collection {name}: HTTP {status}")),
        }
        self.mark_ensured(name);
        Ok(())
    }
}

#[async_trait]
impl RemoteGraph for ArangoRemote {
    async fn fetch_node(&self, collection: &str, key: &str) -> Result<Option<RemoteHandle>> {
        let key = Self::document_key(key);
        let url = self.api_url(&format!("document/{collection}/{key}"));
        let resp = self
            .request(reqwest::Method::GET, url)
            .send()
            .await
            .with_context(|| format!("fetching {collection}/{key}"))?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(RemoteHandle::new(collection, key))),
            status => Err(anyhow!("fetching {collection}/{key}: HTTP {status}")),
        }
    }

    async fn create_node(
        &self,
        collection: &str,
        key: &str,
        name: &str,
        sub_type: &str,
        attributes: &BTreeMap<String, String>,
    ) -> Result<RemoteHandle> {
        self.ensure_collection(collection, false).await?;
        let key = Self::document_key(key);
        let body = json!({
            "_key": key,
            "name": name,
            "sub_type": sub_type,
            "attributes": attributes,
        });
        let url = self.api_url(&format!("document/{collection}"));
        let resp = self
            .request(reqwest::Method::POST, url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("creating {collection}/{key}"))?;
        if !resp.status().is_success() {
            return Err(anyhow!(
                "creating {collection}/{key}: HTTP {}",
                resp.status()
            ));
        }
        debug!("created {}/{}", collection, key);
        Ok(RemoteHandle::new(collection, key))
    }

    async fn update_node(
        &self,
        handle: &RemoteHandle,
        name: &str,
        attributes: &BTreeMap<String, String>,
    ) -> Result<()> {
        // PATCH merges into the existing document, so remote bookkeeping
        // fields (creation timestamps etc.) survive.
        let body = json!({
            "name": name,
            "attributes": attributes,
        });
        let url = self.api_url(&format!(
            "document/{}/{}",
            handle.collection, handle.key
        ));
        let resp = self
            .request(reqwest::Method::PATCH, url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("updating {}", handle.document_id()))?;
        if !resp.status().is_success() {
            return Err(anyhow!(
                "updating {}: HTTP {}",
                handle.document_id(),
                resp.status()
            ));
        }
        Ok(())
    }

    async fn link_edges(
        &self,
        edge_type: &str,
        links: &[(RemoteHandle, RemoteHandle)],
    ) -> Result<()> {
        if links.is_empty() {
            return Ok(());
        }
        self.ensure_collection(edge_type, true).await?;
        let docs: Vec<JsonValue> = links
            .iter()
            .map(|(from, to)| {
                json!({
                    "_key": Self::edge_key(from, to),
                    "_from": from.document_id(),
                    "_to": to.document_id(),
                })
            })
            .collect();
        let url = self.api_url(&format!("document/{edge_type}?overwriteMode=ignore"));
        let resp = self
            .request(reqwest::Method::POST, url)
            .json(&docs)
            .send()
            .await
            .with_context(|| format!("linking {} edges into {edge_type}", links.len()))?;
        if !resp.status().is_success() {
            return Err(anyhow!(
                "linking {} edges into {edge_type}: HTTP {}",
                links.len(),
                resp.status()
            ));
        }
        debug!("linked {} edges into {}", links.len(), edge_type);
        Ok(())
    }
}
