use crate::error::PipelineError;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;

/// Text-embedding capability boundary: one unit-normalized vector per input
/// string, order preserved, fixed dimension per deployment. The same
/// implementation must serve ingestion and query time so both live in the
/// same cosine space.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn dimensions(&self) -> usize;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError>;
}

/// Vision-embedding capability boundary for the image collection. The
/// encoder itself is external; this just moves bytes.
#[async_trait]
pub trait ImageEmbedder: Send + Sync {
    async fn embed_image(&self, path: &Path) -> Result<Vec<f32>, PipelineError>;
}

pub(crate) fn l2_normalize(vector: &mut [f32]) {
    let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
    if magnitude > 0.0 {
        for value in vector.iter_mut() {
            *value /= magnitude;
        }
    }
}

/// Client for an OpenAI-compatible `/embeddings` endpoint. Vectors are
/// re-normalized locally so the cosine-space invariant never depends on
/// backend behavior.
pub struct HttpEmbedder {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    dimensions: usize,
}

impl HttpEmbedder {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        dimensions: usize,
        timeout: Duration,
    ) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            model: model.into(),
            dimensions,
        })
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .post(format!("{}/embeddings", self.endpoint))
            .json(&json!({
                "model": self.model,
                "input": texts,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PipelineError::BackendResponse {
                backend: "embeddings".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        let vectors = parse_embedding_response(&parsed, texts.len())?;
        Ok(vectors)
    }
}

pub(crate) fn parse_embedding_response(
    payload: &Value,
    expected: usize,
) -> Result<Vec<Vec<f32>>, PipelineError> {
    let data = payload
        .pointer("/data")
        .and_then(Value::as_array)
        .ok_or_else(|| PipelineError::BackendResponse {
            backend: "embeddings".to_string(),
            details: "response had no data array".to_string(),
        })?;

    // Entries carry an index field; sort by it so batch order survives
    // backends that reorder.
    let mut indexed: Vec<(usize, Vec<f32>)> = Vec::with_capacity(data.len());
    for entry in data {
        let index = entry
            .pointer("/index")
            .and_then(Value::as_u64)
            .unwrap_or(indexed.len() as u64) as usize;
        let mut vector = entry
            .pointer("/embedding")
            .and_then(Value::as_array)
            .map(|values| {
                values
                    .iter()
                    .filter_map(Value::as_f64)
                    .map(|value| value as f32)
                    .collect::<Vec<f32>>()
            })
            .unwrap_or_default();

        l2_normalize(&mut vector);
        indexed.push((index, vector));
    }

    indexed.sort_by_key(|(index, _)| *index);
    let vectors: Vec<Vec<f32>> = indexed.into_iter().map(|(_, vector)| vector).collect();

    if vectors.len() != expected {
        return Err(PipelineError::EmbeddingCount {
            expected,
            got: vectors.len(),
        });
    }

    Ok(vectors)
}

/// Client for a vision-embedding endpoint that accepts the image as base64
/// and answers `{"embedding": [..]}`.
pub struct HttpImageEmbedder {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpImageEmbedder {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl ImageEmbedder for HttpImageEmbedder {
    async fn embed_image(&self, path: &Path) -> Result<Vec<f32>, PipelineError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|error| PipelineError::Request(format!("unable to read image: {error}")))?;

        let response = self
            .client
            .post(&self.endpoint)
            .json(&json!({
                "image_base64": STANDARD.encode(bytes),
                "source_path": path.to_string_lossy(),
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PipelineError::BackendResponse {
                backend: "vision-embeddings".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        let mut vector = parsed
            .pointer("/embedding")
            .and_then(Value::as_array)
            .map(|values| {
                values
                    .iter()
                    .filter_map(Value::as_f64)
                    .map(|value| value as f32)
                    .collect::<Vec<f32>>()
            })
            .ok_or_else(|| PipelineError::BackendResponse {
                backend: "vision-embeddings".to_string(),
                details: "response had no embedding array".to_string(),
            })?;

        l2_normalize(&mut vector);
        Ok(vector)
    }
}

/// Deterministic local embedder over hashed character trigrams. Not a
/// semantic model; used by tests and as an offline stand-in when no
/// embedding backend is reachable.
#[derive(Debug, Clone, Copy)]
pub struct HashedNgramEmbedder {
    pub dimensions: usize,
}

impl Default for HashedNgramEmbedder {
    fn default() -> Self {
        Self { dimensions: 128 }
    }
}

impl HashedNgramEmbedder {
    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions.max(1)];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        if chars.is_empty() {
            return vector;
        }

        for window in chars.windows(3) {
            let token = window.iter().collect::<String>();
            let mut hash = 1469598103934665603u64;
            for byte in token.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        l2_normalize(&mut vector);
        vector
    }
}

#[async_trait]
impl Embedder for HashedNgramEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
        Ok(texts.iter().map(|text| self.embed_one(text)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn ngram_embedder_is_deterministic_and_normalized() {
        let embedder = HashedNgramEmbedder::default();
        let texts = vec!["alta censal en el Modelo 036".to_string()];

        let first = embedder.embed_batch(&texts).await.unwrap();
        let second = embedder.embed_batch(&texts).await.unwrap();
        assert_eq!(first, second);

        let magnitude = first[0].iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn batch_preserves_input_order() {
        let embedder = HashedNgramEmbedder { dimensions: 32 };
        let texts = vec!["uno".to_string(), "dos".to_string()];

        let batch = embedder.embed_batch(&texts).await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0], embedder.embed_one("uno"));
        assert_eq!(batch[1], embedder.embed_one("dos"));
    }

    #[test]
    fn embedding_response_is_reordered_by_index() {
        let payload = json!({
            "data": [
                {"index": 1, "embedding": [0.0, 2.0]},
                {"index": 0, "embedding": [3.0, 0.0]},
            ]
        });

        let vectors = parse_embedding_response(&payload, 2).unwrap();
        assert_eq!(vectors[0], vec![1.0, 0.0]);
        assert_eq!(vectors[1], vec![0.0, 1.0]);
    }

    #[test]
    fn embedding_count_mismatch_is_an_error() {
        let payload = json!({"data": [{"index": 0, "embedding": [1.0]}]});
        let result = parse_embedding_response(&payload, 2);
        assert!(matches!(
            result,
            Err(PipelineError::EmbeddingCount { expected: 2, got: 1 })
        ));
    }
}
