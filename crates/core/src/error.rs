use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("metadata file error: {0}")]
    Metadata(String),

    #[error("path has no file name: {0}")]
    MissingFileName(String),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("pipeline backend failed during ingestion: {0}")]
    Backend(#[from] PipelineError),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("completion was empty or malformed: {0}")]
    MalformedCompletion(String),

    #[error("embedding batch mismatch: expected {expected}, got {got}")]
    EmbeddingCount { expected: usize, got: usize },

    #[error("request failed: {0}")]
    Request(String),
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
