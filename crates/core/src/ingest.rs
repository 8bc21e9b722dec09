use crate::chunking::chunk_parent_child;
use crate::embeddings::{Embedder, ImageEmbedder};
use crate::error::IngestError;
use crate::llm::CompletionClient;
use crate::models::{Category, ChatMessage, ChildRecord, ChunkingConfig, ImageDescriptor};
use crate::normalize::clean_extracted_text;
use crate::prompts::classifier_prompt;
use crate::store::{CollectionRecord, VectorCollection};
use serde_json::json;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;
use walkdir::WalkDir;

/// Discovers pre-extracted document text files. PDF text extraction itself
/// is an external collaborator; this pipeline ingests its `.txt` output.
pub fn discover_text_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_text = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"));

        if is_text {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

/// Loads the `[{"archivo": ..., "categoria": ...}]` sidecar. A missing or
/// unparsable file logs a warning and yields an empty index so every
/// document falls back to its default category; one bad record never
/// aborts the batch.
pub fn load_category_index(path: &Path) -> HashMap<String, Category> {
    #[derive(serde::Deserialize)]
    struct DocumentMeta {
        archivo: String,
        #[serde(default)]
        categoria: Option<String>,
    }

    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) => {
            tracing::warn!(path = %path.display(), %error, "category metadata not found, using default category");
            return HashMap::new();
        }
    };

    let entries: Vec<DocumentMeta> = match serde_json::from_str(&raw) {
        Ok(entries) => entries,
        Err(error) => {
            tracing::warn!(path = %path.display(), %error, "category metadata unparsable, using default category");
            return HashMap::new();
        }
    };

    entries
        .into_iter()
        .map(|entry| {
            let category = entry
                .categoria
                .as_deref()
                .and_then(Category::parse_lenient)
                .unwrap_or(Category::Otros);
            (entry.archivo, category)
        })
        .collect()
}

/// Single-shot LLM classification of one document into the closed category
/// set. Fails closed to `otros` on any error or out-of-set label.
pub async fn classify_document(
    llm: &dyn CompletionClient,
    file_name: &str,
    text_head: &str,
) -> Category {
    let head: String = text_head.chars().take(1_000).collect();
    let messages = [ChatMessage::user(format!(
        "Clasifica este documento:\n\nARCHIVO: {file_name}\nTEXTO:\n\"{head}\"\n\nCATEGORIA:"
    ))];

    match llm.complete(&classifier_prompt(), &messages, 0.0).await {
        Ok(raw) => match Category::parse_lenient(&raw) {
            Some(category) => category,
            None => {
                tracing::warn!(file = file_name, reply = %raw, "classifier label outside the closed set, using 'otros'");
                Category::Otros
            }
        },
        Err(error) => {
            tracing::warn!(file = file_name, %error, "document classification failed, using 'otros'");
            Category::Otros
        }
    }
}

/// Normalize, chunk parent/child, and shape one document's child records.
/// Only child text will be embedded; the parent rides along as metadata.
pub fn build_child_records(
    file_name: &str,
    category: Category,
    raw_text: &str,
    config: &ChunkingConfig,
) -> Result<Vec<ChildRecord>, IngestError> {
    let normalized = clean_extracted_text(raw_text);
    let chunks = chunk_parent_child(&normalized, config)?;

    Ok(chunks
        .into_iter()
        .enumerate()
        .map(|(index, chunk)| ChildRecord {
            id: format!("{file_name}_child_{index}"),
            source: file_name.to_string(),
            category,
            parent_id: chunk.parent_index,
            text: chunk.child_text,
            parent_text: chunk.parent_text,
        })
        .collect())
}

fn to_collection_record(record: ChildRecord, vector: Vec<f32>) -> CollectionRecord {
    CollectionRecord {
        metadata: json!({
            "source": record.source,
            "category": record.category.label(),
            "type": "child",
            "parent_id": record.parent_id,
            "contexto_expandido": record.parent_text,
        }),
        id: record.id,
        vector,
        document: record.text,
    }
}

#[derive(Debug)]
pub struct SkippedDocument {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct IngestionReport {
    pub documents: usize,
    pub chunks: usize,
    pub skipped: Vec<SkippedDocument>,
}

/// Best-effort batch ingestion of a document folder into the text
/// collection. Per-document failures are reported and skipped, never
/// fatal. Categories come from the sidecar when present, else from the
/// optional classifier, else `otros`.
pub async fn ingest_folder(
    folder: &Path,
    category_metadata: Option<&Path>,
    classifier: Option<&dyn CompletionClient>,
    embedder: &dyn Embedder,
    collection: &dyn VectorCollection,
    config: &ChunkingConfig,
) -> Result<IngestionReport, IngestError> {
    let files = discover_text_files(folder);
    if files.is_empty() {
        return Err(IngestError::InvalidArgument(format!(
            "no extracted text files found in {}",
            folder.display()
        )));
    }

    let category_index = category_metadata
        .map(load_category_index)
        .unwrap_or_default();

    let mut report = IngestionReport::default();

    for path in files {
        let file_name = match path.file_name().and_then(|name| name.to_str()) {
            Some(name) => name.to_string(),
            None => {
                report.skipped.push(SkippedDocument {
                    reason: "path has no file name".to_string(),
                    path,
                });
                continue;
            }
        };

        let raw_text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(error) => {
                report.skipped.push(SkippedDocument {
                    reason: error.to_string(),
                    path,
                });
                continue;
            }
        };

        let category = match category_index.get(&file_name) {
            Some(category) => *category,
            None => match classifier {
                Some(llm) => classify_document(llm, &file_name, &raw_text).await,
                None => Category::Otros,
            },
        };

        let records = match build_child_records(&file_name, category, &raw_text, config) {
            Ok(records) => records,
            Err(error) => {
                report.skipped.push(SkippedDocument {
                    reason: error.to_string(),
                    path,
                });
                continue;
            }
        };

        if records.is_empty() {
            tracing::warn!(file = %file_name, "document produced no chunks, skipping");
            report.skipped.push(SkippedDocument {
                reason: "empty document".to_string(),
                path,
            });
            continue;
        }

        let child_texts: Vec<String> = records.iter().map(|record| record.text.clone()).collect();

        let indexed = async {
            let vectors = embedder.embed_batch(&child_texts).await?;
            let collection_records: Vec<CollectionRecord> = records
                .into_iter()
                .zip(vectors)
                .map(|(record, vector)| to_collection_record(record, vector))
                .collect();
            collection.add(&collection_records).await?;
            Ok::<usize, crate::error::PipelineError>(collection_records.len())
        }
        .await;

        match indexed {
            Ok(count) => {
                tracing::info!(file = %file_name, category = %category, chunks = count, "document indexed");
                report.documents += 1;
                report.chunks += count;
            }
            Err(error) => {
                report.skipped.push(SkippedDocument {
                    reason: error.to_string(),
                    path,
                });
            }
        }
    }

    Ok(report)
}

#[derive(Debug, Default)]
pub struct ImageIngestionReport {
    pub images: usize,
    pub skipped: Vec<SkippedDocument>,
}

/// Indexes the image sidecar
/// (`[{"nombre_archivo", "pdf_origen", "pagina", "categoria", "ruta_imagen"}]`)
/// into the image collection. Vectors come from the vision capability;
/// per-record failures are logged and skipped.
pub async fn ingest_images(
    metadata_path: &Path,
    embedder: &dyn ImageEmbedder,
    collection: &dyn VectorCollection,
) -> Result<ImageIngestionReport, IngestError> {
    let raw = fs::read_to_string(metadata_path)
        .map_err(|error| IngestError::Metadata(format!("{}: {error}", metadata_path.display())))?;
    let descriptors: Vec<ImageDescriptor> = serde_json::from_str(&raw)
        .map_err(|error| IngestError::Metadata(format!("{}: {error}", metadata_path.display())))?;

    let mut report = ImageIngestionReport::default();

    for descriptor in descriptors {
        let image_path = PathBuf::from(&descriptor.image_path);
        let vector = match embedder.embed_image(&image_path).await {
            Ok(vector) => vector,
            Err(error) => {
                tracing::warn!(image = %descriptor.file_name, %error, "image embedding failed, skipping");
                report.skipped.push(SkippedDocument {
                    path: image_path,
                    reason: error.to_string(),
                });
                continue;
            }
        };

        let category = descriptor
            .category
            .as_deref()
            .and_then(Category::parse_lenient)
            .unwrap_or(Category::Otros);

        let record = CollectionRecord {
            id: Uuid::new_v4().to_string(),
            vector,
            document: descriptor.file_name.clone(),
            metadata: json!({
                "pdf_origen": descriptor.source_pdf,
                "category": category.label(),
                "pagina": descriptor.page,
                "nombre_archivo": descriptor.file_name,
                "tipo": "imagen",
            }),
        };

        match collection.add(std::slice::from_ref(&record)).await {
            Ok(()) => report.images += 1,
            Err(error) => {
                tracing::warn!(image = %record.document, %error, "image insert failed, skipping");
                report.skipped.push(SkippedDocument {
                    path: image_path,
                    reason: error.to_string(),
                });
            }
        }
    }

    Ok(report)
}
