//! Chroma vector store over its REST API.
//!
//! Chroma answers queries with nested, column-oriented lists
//! (`ids[query][i]`, `metadatas[query][i]`, ...). Those are flattened into
//! [`MemoryRecord`]s right here; a response that does not line up is an
//! error rather than a silently shorter result.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bionic_core::utils::{format_datetime, parse_datetime};
use bionic_core::{
    MemoryRecord, NewDocument, RecordMetadata, Selector, SourceType, VectorStore, WhereFilter,
};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::{SDKError, SDKResult};

const SERVICE: &str = "vector_store";

/// Vector store backed by a Chroma server.
pub struct ChromaStore {
    client: Client,
    base_url: String,
    timeout: Duration,
    /// Collection name to Chroma's collection id.
    collections: RwLock<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct CollectionResponse {
    id: String,
}

#[derive(Debug, Default, Deserialize)]
struct GetResponse {
    ids: Vec<String>,
    #[serde(default)]
    documents: Option<Vec<Option<String>>>,
    #[serde(default)]
    metadatas: Option<Vec<Option<Map<String, Value>>>>,
    #[serde(default)]
    embeddings: Option<Vec<Option<Vec<f32>>>>,
}

#[derive(Debug, Default, Deserialize)]
struct QueryResponse {
    ids: Vec<Vec<String>>,
    #[serde(default)]
    documents: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    metadatas: Option<Vec<Vec<Option<Map<String, Value>>>>>,
    #[serde(default)]
    distances: Option<Vec<Vec<f64>>>,
    #[serde(default)]
    embeddings: Option<Vec<Vec<Option<Vec<f32>>>>>,
}

impl ChromaStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(30),
            collections: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn call<Resp: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> SDKResult<Resp> {
        let url = format!("{}/api/v1/{}", self.base_url, path);
        debug!(url = %url, "Chroma request");

        let mut request = self.client.request(method, &url).timeout(self.timeout);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                SDKError::timeout(self.timeout.as_millis() as u64)
            } else {
                SDKError::Http(e)
            }
        })?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(SDKError::malformed(SERVICE, format!("HTTP {}: {}", status, text)));
        }
        serde_json::from_str(&text)
            .map_err(|e| SDKError::malformed(SERVICE, format!("undecodable body: {}", e)))
    }

    async fn collection_id(&self, name: &str) -> bionic_core::Result<String> {
        if let Some(id) = self.collections.read().await.get(name) {
            return Ok(id.clone());
        }
        Err(bionic_core::Error::CollectionNotFound(name.to_string()))
    }

    async fn get_raw(&self, collection_id: &str, selector: &Selector, include: &[&str]) -> SDKResult<GetResponse> {
        let mut body = json!({ "include": include });
        match selector {
            Selector::Ids(ids) if ids.is_empty() => return Ok(GetResponse::default()),
            Selector::Ids(ids) => body["ids"] = json!(ids),
            Selector::Where(filter) => {
                if let Some(clause) = where_clause(filter) {
                    body["where"] = clause;
                }
            }
            Selector::All => {}
        }
        self.call(Method::POST, &format!("collections/{}/get", collection_id), Some(body))
            .await
    }
}

fn collaborator(e: SDKError) -> bionic_core::Error {
    e.into_collaborator(SERVICE)
}

/// Chroma `where` clause for a filter, `None` when it matches everything.
fn where_clause(filter: &WhereFilter) -> Option<Value> {
    filter
        .user_id
        .as_ref()
        .map(|uid| json!({ "user_id": { "$eq": uid } }))
}

/// Flat scalar map; Chroma metadata cannot nest.
fn metadata_to_json(metadata: &RecordMetadata) -> Value {
    json!({
        "content": metadata.content,
        "valid_access_count": metadata.valid_access_count,
        "last_updated": format_datetime(&metadata.last_updated),
        "created_at": format_datetime(&metadata.created_at),
        "total_access_count": metadata.total_access_count,
        "source_type": metadata.source_type.as_str(),
        "user_id": metadata.user_id,
    })
}

fn metadata_from_json(map: &Map<String, Value>) -> SDKResult<RecordMetadata> {
    let string = |key: &str| -> SDKResult<&str> {
        map.get(key)
            .and_then(Value::as_str)
            .ok_or_else(|| SDKError::malformed(SERVICE, format!("metadata missing `{}`", key)))
    };
    let timestamp = |key: &str| -> SDKResult<_> {
        let raw = string(key)?;
        parse_datetime(raw)
            .ok_or_else(|| SDKError::malformed(SERVICE, format!("bad timestamp in `{}`: {}", key, raw)))
    };

    let last_updated = timestamp("last_updated")?;
    Ok(RecordMetadata {
        content: string("content").unwrap_or_default().to_string(),
        valid_access_count: map
            .get("valid_access_count")
            .and_then(Value::as_f64)
            .unwrap_or(1.0),
        last_updated,
        created_at: timestamp("created_at").unwrap_or(last_updated),
        total_access_count: map
            .get("total_access_count")
            .and_then(Value::as_u64)
            .unwrap_or(1),
        source_type: string("source_type")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(SourceType::Other),
        user_id: string("user_id")?.to_string(),
    })
}

fn column<T: Clone + Default>(values: Option<&Vec<T>>, len: usize, name: &str) -> SDKResult<Vec<T>> {
    match values {
        None => Ok(vec![T::default(); len]),
        Some(v) if v.len() == len => Ok(v.clone()),
        Some(v) => Err(SDKError::malformed(
            SERVICE,
            format!("`{}` has {} entries for {} ids", name, v.len(), len),
        )),
    }
}

fn assemble(
    ids: Vec<String>,
    documents: Option<&Vec<Option<String>>>,
    metadatas: Option<&Vec<Option<Map<String, Value>>>>,
    embeddings: Option<&Vec<Option<Vec<f32>>>>,
    distances: Option<&Vec<f64>>,
) -> SDKResult<Vec<MemoryRecord>> {
    let len = ids.len();
    let documents = column(documents, len, "documents")?;
    let metadatas = column(metadatas, len, "metadatas")?;
    let embeddings = column(embeddings, len, "embeddings")?;
    let distances: Vec<Option<f64>> = match distances {
        Some(d) => column(Some(d), len, "distances")?.into_iter().map(Some).collect(),
        None => vec![None; len],
    };

    ids.into_iter()
        .zip(documents)
        .zip(metadatas)
        .zip(embeddings)
        .zip(distances)
        .map(|((((id, document), metadata), embedding), distance)| {
            let metadata = metadata
                .ok_or_else(|| SDKError::malformed(SERVICE, format!("record {} has no metadata", id)))?;
            let metadata = metadata_from_json(&metadata)?;
            Ok(MemoryRecord {
                id,
                summary: document.unwrap_or_default(),
                metadata,
                embedding: embedding.filter(|e| !e.is_empty()),
                distance,
                cluster_size: 1,
            })
        })
        .collect()
}

fn normalize_get(response: GetResponse) -> SDKResult<Vec<MemoryRecord>> {
    assemble(
        response.ids,
        response.documents.as_ref(),
        response.metadatas.as_ref(),
        response.embeddings.as_ref(),
        None,
    )
}

/// First row of a per-query result list.
fn first<T>(rows: Option<Vec<Vec<T>>>) -> Option<Vec<T>> {
    rows.and_then(|rows| rows.into_iter().next())
}

/// Flatten the single-query result lists.
fn normalize_query(response: QueryResponse) -> SDKResult<Vec<MemoryRecord>> {
    let Some(ids) = response.ids.into_iter().next() else {
        return Ok(Vec::new());
    };
    let documents = first(response.documents);
    let metadatas = first(response.metadatas);
    let embeddings = first(response.embeddings);
    let distances = first(response.distances);
    assemble(
        ids,
        documents.as_ref(),
        metadatas.as_ref(),
        embeddings.as_ref(),
        distances.as_ref(),
    )
}

#[async_trait]
impl VectorStore for ChromaStore {
    async fn get_or_create_collection(&self, name: &str) -> bionic_core::Result<()> {
        if self.collections.read().await.contains_key(name) {
            return Ok(());
        }
        let body = json!({
            "name": name,
            "get_or_create": true,
            "metadata": { "hnsw:space": "cosine" },
        });
        let collection: CollectionResponse = self
            .call(Method::POST, "collections", Some(body))
            .await
            .map_err(collaborator)?;
        info!(collection = name, id = %collection.id, "Chroma collection ready");
        self.collections
            .write()
            .await
            .insert(name.to_string(), collection.id);
        Ok(())
    }

    async fn add(&self, collection: &str, documents: Vec<NewDocument>) -> bionic_core::Result<()> {
        if documents.is_empty() {
            return Ok(());
        }
        let id = self.collection_id(collection).await?;
        let body = json!({
            "ids": documents.iter().map(|d| &d.id).collect::<Vec<_>>(),
            "embeddings": documents.iter().map(|d| &d.embedding).collect::<Vec<_>>(),
            "documents": documents.iter().map(|d| &d.summary).collect::<Vec<_>>(),
            "metadatas": documents.iter().map(|d| metadata_to_json(&d.metadata)).collect::<Vec<_>>(),
        });
        self.call::<Value>(Method::POST, &format!("collections/{}/upsert", id), Some(body))
            .await
            .map_err(collaborator)?;
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        embedding: &[f32],
        n_results: usize,
        filter: Option<&WhereFilter>,
    ) -> bionic_core::Result<Vec<MemoryRecord>> {
        if n_results == 0 {
            return Ok(Vec::new());
        }
        let id = self.collection_id(collection).await?;
        let mut body = json!({
            "query_embeddings": [embedding],
            "n_results": n_results,
            "include": ["documents", "metadatas", "distances", "embeddings"],
        });
        if let Some(clause) = filter.and_then(where_clause) {
            body["where"] = clause;
        }
        let response: QueryResponse = self
            .call(Method::POST, &format!("collections/{}/query", id), Some(body))
            .await
            .map_err(collaborator)?;
        normalize_query(response).map_err(collaborator)
    }

    async fn get(&self, collection: &str, selector: &Selector) -> bionic_core::Result<Vec<MemoryRecord>> {
        let id = self.collection_id(collection).await?;
        let response = self
            .get_raw(&id, selector, &["documents", "metadatas", "embeddings"])
            .await
            .map_err(collaborator)?;
        normalize_get(response).map_err(collaborator)
    }

    async fn update(
        &self,
        collection: &str,
        updates: Vec<(String, RecordMetadata)>,
    ) -> bionic_core::Result<()> {
        if updates.is_empty() {
            return Ok(());
        }
        let id = self.collection_id(collection).await?;
        let body = json!({
            "ids": updates.iter().map(|(id, _)| id).collect::<Vec<_>>(),
            "metadatas": updates.iter().map(|(_, m)| metadata_to_json(m)).collect::<Vec<_>>(),
        });
        self.call::<Value>(Method::POST, &format!("collections/{}/update", id), Some(body))
            .await
            .map_err(collaborator)?;
        Ok(())
    }

    async fn delete(&self, collection: &str, selector: &Selector) -> bionic_core::Result<Vec<String>> {
        let id = self.collection_id(collection).await?;
        // Resolve ids first so the caller learns what was actually removed
        let existing = self
            .get_raw(&id, selector, &[])
            .await
            .map_err(collaborator)?
            .ids;
        if existing.is_empty() {
            return Ok(existing);
        }
        self.call::<Value>(
            Method::POST,
            &format!("collections/{}/delete", id),
            Some(json!({ "ids": existing })),
        )
        .await
        .map_err(collaborator)?;
        Ok(existing)
    }

    async fn count(&self, collection: &str) -> bionic_core::Result<usize> {
        let id = self.collection_id(collection).await?;
        self.call(Method::GET, &format!("collections/{}/count", id), None)
            .await
            .map_err(collaborator)
    }
}
