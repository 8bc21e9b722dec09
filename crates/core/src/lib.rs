pub mod chunking;
pub mod embeddings;
pub mod error;
pub mod generator;
pub mod ingest;
pub mod judge;
pub mod llm;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod prompts;
pub mod retriever;
pub mod router;
pub mod store;
pub mod stores;

pub use chunking::{chunk_parent_child, split_text, HierarchicalChunk};
pub use embeddings::{Embedder, HashedNgramEmbedder, HttpEmbedder, HttpImageEmbedder, ImageEmbedder};
pub use error::{IngestError, PipelineError};
pub use generator::AnswerGenerator;
pub use ingest::{
    discover_text_files, ingest_folder, ingest_images, load_category_index, ImageIngestionReport,
    IngestionReport, SkippedDocument,
};
pub use judge::QualityJudges;
pub use llm::{CompletionClient, OpenAiCompatClient};
pub use models::{
    Category, ChatMessage, ChildRecord, ChunkingConfig, Citation, FragmentKind, ImageDescriptor,
    JudgeVerdict, PipelineState, RetrievalOptions, RetrievedFragment, Route,
};
pub use normalize::clean_extracted_text;
pub use pipeline::{Pipeline, PipelineOptions, TurnFailure};
pub use prompts::{GREETING_REPLY, REFUSAL};
pub use retriever::{Retrieval, Retriever};
pub use router::CategoryRouter;
pub use store::{CollectionRecord, QueryHit, VectorCollection};
pub use stores::ChromaCollection;
