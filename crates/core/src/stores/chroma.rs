use crate::error::PipelineError;
use crate::models::Category;
use crate::store::{CollectionRecord, QueryHit, VectorCollection};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

/// Client for one named collection on a Chroma server (REST v1 API). The
/// collection is resolved to its id once at connect time; records and
/// queries then go through `/api/v1/collections/{id}/...`.
pub struct ChromaCollection {
    client: Client,
    endpoint: String,
    name: String,
    collection_id: String,
}

impl ChromaCollection {
    /// Resolves (or creates) the named collection and returns a bound
    /// client. Collections are created with cosine distance so indexed and
    /// query vectors share one metric space.
    pub async fn connect(
        endpoint: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<Self, PipelineError> {
        let endpoint = endpoint.into();
        let name = name.into();
        let client = Client::new();

        let response = client
            .post(format!("{endpoint}/api/v1/collections"))
            .json(&json!({
                "name": name,
                "get_or_create": true,
                "metadata": {"hnsw:space": "cosine"},
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PipelineError::BackendResponse {
                backend: "chroma".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        let collection_id = parsed
            .pointer("/id")
            .and_then(Value::as_str)
            .ok_or_else(|| PipelineError::BackendResponse {
                backend: "chroma".to_string(),
                details: "collection response had no id".to_string(),
            })?
            .to_string();

        Ok(Self {
            client,
            endpoint,
            name,
            collection_id,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Drops the named collection. Used by ingestion `--reset`.
    pub async fn drop_collection(
        endpoint: &str,
        name: &str,
    ) -> Result<(), PipelineError> {
        let response = Client::new()
            .delete(format!("{endpoint}/api/v1/collections/{name}"))
            .send()
            .await?;

        // 404 means there was nothing to drop; that is fine for a reset.
        if !response.status().is_success() && response.status().as_u16() != 404 {
            return Err(PipelineError::BackendResponse {
                backend: "chroma".to_string(),
                details: response.status().to_string(),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl VectorCollection for ChromaCollection {
    async fn add(&self, records: &[CollectionRecord]) -> Result<(), PipelineError> {
        if records.is_empty() {
            return Ok(());
        }

        let ids: Vec<&str> = records.iter().map(|record| record.id.as_str()).collect();
        let embeddings: Vec<&[f32]> = records.iter().map(|record| record.vector.as_slice()).collect();
        let documents: Vec<&str> = records.iter().map(|record| record.document.as_str()).collect();
        let metadatas: Vec<&Value> = records.iter().map(|record| &record.metadata).collect();

        let response = self
            .client
            .post(format!(
                "{}/api/v1/collections/{}/add",
                self.endpoint, self.collection_id
            ))
            .json(&json!({
                "ids": ids,
                "embeddings": embeddings,
                "documents": documents,
                "metadatas": metadatas,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PipelineError::BackendResponse {
                backend: "chroma".to_string(),
                details: response.status().to_string(),
            });
        }

        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        category: Option<Category>,
    ) -> Result<Vec<QueryHit>, PipelineError> {
        let mut payload = json!({
            "query_embeddings": [vector],
            "n_results": top_k,
            "include": ["documents", "metadatas", "distances"],
        });

        if let Some(category) = category {
            payload["where"] = json!({"category": category.label()});
        }

        let response = self
            .client
            .post(format!(
                "{}/api/v1/collections/{}/query",
                self.endpoint, self.collection_id
            ))
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PipelineError::BackendResponse {
                backend: "chroma".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        parse_query_response(&parsed)
    }

    async fn count(&self) -> Result<u64, PipelineError> {
        let response = self
            .client
            .get(format!(
                "{}/api/v1/collections/{}/count",
                self.endpoint, self.collection_id
            ))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PipelineError::BackendResponse {
                backend: "chroma".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        parsed.as_u64().ok_or_else(|| PipelineError::BackendResponse {
            backend: "chroma".to_string(),
            details: "count response was not an integer".to_string(),
        })
    }
}

/// Chroma answers query batches as parallel column arrays, one inner array
/// per query vector; we always send exactly one.
pub(crate) fn parse_query_response(payload: &Value) -> Result<Vec<QueryHit>, PipelineError> {
    let ids = payload
        .pointer("/ids/0")
        .and_then(Value::as_array)
        .ok_or_else(|| PipelineError::BackendResponse {
            backend: "chroma".to_string(),
            details: "query response had no ids".to_string(),
        })?;

    let documents = payload.pointer("/documents/0").and_then(Value::as_array);
    let metadatas = payload.pointer("/metadatas/0").and_then(Value::as_array);
    let distances = payload.pointer("/distances/0").and_then(Value::as_array);

    let mut hits = Vec::with_capacity(ids.len());
    for (position, id) in ids.iter().enumerate() {
        let id = id.as_str().unwrap_or_default().to_string();
        let document = documents
            .and_then(|column| column.get(position))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let metadata = metadatas
            .and_then(|column| column.get(position))
            .cloned()
            .unwrap_or(Value::Null);
        let distance = distances
            .and_then(|column| column.get(position))
            .and_then(Value::as_f64)
            .unwrap_or(0.0);

        hits.push(QueryHit {
            id,
            document,
            metadata,
            distance,
        });
    }

    Ok(hits)
}
