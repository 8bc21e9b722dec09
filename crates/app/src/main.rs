use chrono::Utc;
use clap::{Parser, Subcommand};
use foral_rag_core::{
    ingest_folder, ingest_images, ChromaCollection, ChunkingConfig, HttpEmbedder,
    HttpImageEmbedder, OpenAiCompatClient, Pipeline, PipelineOptions, RetrievalOptions,
    VectorCollection,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "foral-rag", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// ChromaDB base URL
    #[arg(long, env = "CHROMA_URL", default_value = "http://localhost:8000")]
    chroma_url: String,

    /// Text chunk collection name
    #[arg(long, default_value = "documentos_normativa")]
    text_collection: String,

    /// Image descriptor collection name
    #[arg(long, default_value = "imagenes_normativa")]
    image_collection: String,

    /// OpenAI-compatible completion endpoint base URL
    #[arg(long, env = "LLM_URL", default_value = "http://localhost:11434/v1")]
    llm_url: String,

    /// Completion model name
    #[arg(long, env = "LLM_MODEL", default_value = "llama3.1:8b")]
    llm_model: String,

    /// OpenAI-compatible embedding endpoint base URL
    #[arg(long, env = "EMBED_URL", default_value = "http://localhost:11434/v1")]
    embed_url: String,

    /// Embedding model name
    #[arg(long, env = "EMBED_MODEL", default_value = "nomic-embed-text")]
    embed_model: String,

    /// Embedding vector size; must match the collections.
    #[arg(long, default_value = "768")]
    embed_dimensions: usize,

    /// Vision embedding endpoint URL for image ingestion
    #[arg(long, env = "IMAGE_EMBED_URL", default_value = "http://localhost:8001/embed_image")]
    image_embed_url: String,

    /// Per-request timeout in seconds for all backends
    #[arg(long, default_value = "120")]
    timeout_secs: u64,
}

#[derive(Subcommand)]
enum Command {
    /// Index a folder of extracted document text into the text collection.
    Ingest {
        /// Folder with `.txt` files, searched recursively.
        #[arg(long)]
        folder: PathBuf,
        /// Category sidecar (`metadata_pdf.json`). Optional.
        #[arg(long)]
        metadata: Option<PathBuf>,
        /// Image sidecar (`metadata_imagenes.json`). Optional.
        #[arg(long)]
        images_metadata: Option<PathBuf>,
        /// Classify uncatalogued documents with the completion model
        /// instead of defaulting to 'otros'.
        #[arg(long, default_value_t = false)]
        classify: bool,
        /// Drop both collections before indexing.
        #[arg(long, default_value_t = false)]
        reset: bool,
    },
    /// Answer a question grounded in the indexed corpus.
    Ask {
        /// The user question.
        #[arg(long)]
        question: String,
        /// Text fragments to retrieve.
        #[arg(long, default_value = "5")]
        top_k: usize,
        /// Image descriptors to retrieve.
        #[arg(long, default_value = "2")]
        top_k_images: usize,
        /// Skip hypothetical-document query expansion.
        #[arg(long, default_value_t = false)]
        no_hyde: bool,
        /// Run the fidelity and relevance judges on the answer.
        #[arg(long, default_value_t = false)]
        judge: bool,
    },
    /// Print collection record counts.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let timeout = Duration::from_secs(cli.timeout_secs);

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "foral-rag boot"
    );

    match cli.command {
        Command::Ingest {
            folder,
            metadata,
            images_metadata,
            classify,
            reset,
        } => {
            if reset {
                ChromaCollection::drop_collection(&cli.chroma_url, &cli.text_collection)
                    .await
                    .map_err(|error| anyhow::anyhow!(error.to_string()))?;
                ChromaCollection::drop_collection(&cli.chroma_url, &cli.image_collection)
                    .await
                    .map_err(|error| anyhow::anyhow!(error.to_string()))?;
                info!("collections dropped");
            }

            let embedder = HttpEmbedder::new(
                &cli.embed_url,
                &cli.embed_model,
                cli.embed_dimensions,
                timeout,
            )
            .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            let texts = ChromaCollection::connect(&cli.chroma_url, &cli.text_collection)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            let classifier = if classify {
                Some(
                    OpenAiCompatClient::new(&cli.llm_url, &cli.llm_model, timeout)
                        .map_err(|error| anyhow::anyhow!(error.to_string()))?,
                )
            } else {
                None
            };

            let report = ingest_folder(
                &folder,
                metadata.as_deref(),
                classifier
                    .as_ref()
                    .map(|llm| llm as &dyn foral_rag_core::CompletionClient),
                &embedder,
                &texts,
                &ChunkingConfig::default(),
            )
            .await
            .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            for skipped in &report.skipped {
                warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipped document");
            }
            println!(
                "{} documents indexed ({} chunks, {} skipped) at {}",
                report.documents,
                report.chunks,
                report.skipped.len(),
                Utc::now().to_rfc3339()
            );

            if let Some(images_metadata) = images_metadata {
                let image_embedder = HttpImageEmbedder::new(&cli.image_embed_url, timeout)
                    .map_err(|error| anyhow::anyhow!(error.to_string()))?;
                let images = ChromaCollection::connect(&cli.chroma_url, &cli.image_collection)
                    .await
                    .map_err(|error| anyhow::anyhow!(error.to_string()))?;

                let report = ingest_images(&images_metadata, &image_embedder, &images)
                    .await
                    .map_err(|error| anyhow::anyhow!(error.to_string()))?;
                for skipped in &report.skipped {
                    warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipped image");
                }
                println!(
                    "{} images indexed ({} skipped)",
                    report.images,
                    report.skipped.len()
                );
            }
        }
        Command::Ask {
            ref question,
            top_k,
            top_k_images,
            no_hyde,
            judge,
        } => {
            let pipeline = build_pipeline(&cli, timeout, top_k, top_k_images, !no_hyde).await?;

            let state = match pipeline.answer(&question, Vec::new()).await {
                Ok(state) => state,
                Err(failure) => {
                    for step in &failure.state.trace {
                        eprintln!("  {step}");
                    }
                    return Err(anyhow::anyhow!(failure.error.to_string()));
                }
            };

            println!("{}", state.answer);

            if !state.citations.is_empty() {
                println!("\nFuentes:");
                for citation in &state.citations {
                    println!("  - {} ({})", citation.document, citation.chunk_id);
                }
            }

            println!("\nTraza:");
            for step in &state.trace {
                println!("  {step}");
            }

            if judge {
                let verdict = pipeline.evaluate(&state).await;
                match verdict.grounded {
                    Some(grounded) => println!("fidelidad: {}", if grounded { 1 } else { 0 }),
                    None => println!("fidelidad: sin veredicto"),
                }
                match verdict.relevance {
                    Some(score) => println!("relevancia: {score}/5"),
                    None => println!("relevancia: sin veredicto"),
                }
            }
        }
        Command::Status => {
            let texts = ChromaCollection::connect(&cli.chroma_url, &cli.text_collection)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            let images = ChromaCollection::connect(&cli.chroma_url, &cli.image_collection)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            let text_count = texts
                .count()
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            let image_count = images
                .count()
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            println!("{}: {} chunks", cli.text_collection, text_count);
            println!("{}: {} imágenes", cli.image_collection, image_count);
        }
    }

    Ok(())
}

async fn build_pipeline(
    cli: &Cli,
    timeout: Duration,
    top_k: usize,
    top_k_images: usize,
    use_hyde: bool,
) -> anyhow::Result<
    Pipeline<OpenAiCompatClient, HttpEmbedder, ChromaCollection, ChromaCollection>,
> {
    let llm = OpenAiCompatClient::new(&cli.llm_url, &cli.llm_model, timeout)
        .map_err(|error| anyhow::anyhow!(error.to_string()))?;
    let embedder = HttpEmbedder::new(
        &cli.embed_url,
        &cli.embed_model,
        cli.embed_dimensions,
        timeout,
    )
    .map_err(|error| anyhow::anyhow!(error.to_string()))?;
    let texts = ChromaCollection::connect(&cli.chroma_url, &cli.text_collection)
        .await
        .map_err(|error| anyhow::anyhow!(error.to_string()))?;
    let images = ChromaCollection::connect(&cli.chroma_url, &cli.image_collection)
        .await
        .map_err(|error| anyhow::anyhow!(error.to_string()))?;

    let options = PipelineOptions {
        retrieval: RetrievalOptions {
            top_k_text: top_k,
            top_k_images,
            use_hyde,
        },
        ..PipelineOptions::default()
    };

    Ok(Pipeline::new(
        Arc::new(llm),
        Arc::new(embedder),
        Arc::new(texts),
        Arc::new(images),
        options,
    ))
}
