use crate::error::PipelineError;
use crate::models::Category;
use async_trait::async_trait;
use serde_json::Value;

/// One record to index: id, vector, display text, and free-form metadata.
#[derive(Debug, Clone)]
pub struct CollectionRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub document: String,
    pub metadata: Value,
}

/// One ranked nearest-neighbor hit. `distance` is cosine distance, smaller
/// is closer.
#[derive(Debug, Clone)]
pub struct QueryHit {
    pub id: String,
    pub document: String,
    pub metadata: Value,
    pub distance: f64,
}

/// Similarity-search capability boundary. Two instances exist per
/// deployment: document-text chunks and image descriptors, each a named
/// collection that persists across restarts.
#[async_trait]
pub trait VectorCollection: Send + Sync {
    async fn add(&self, records: &[CollectionRecord]) -> Result<(), PipelineError>;

    /// Top-k nearest neighbors of `vector`, optionally filtered to one
    /// category via metadata. An empty result is a valid outcome, distinct
    /// from an `Err`.
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        category: Option<Category>,
    ) -> Result<Vec<QueryHit>, PipelineError>;

    async fn count(&self) -> Result<u64, PipelineError>;
}
