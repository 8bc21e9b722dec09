use crate::embeddings::Embedder;
use crate::error::PipelineError;
use crate::llm::CompletionClient;
use crate::models::{
    Category, ChatMessage, Citation, FragmentKind, RetrievalOptions, RetrievedFragment,
};
use crate::prompts::HYDE_PROMPT;
use crate::store::{QueryHit, VectorCollection};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

/// What one retrieval pass hands to the generator: deduplicated
/// parent-level context plus a per-hit citation list kept separate from the
/// context text.
#[derive(Debug, Clone, Default)]
pub struct Retrieval {
    pub fragments: Vec<RetrievedFragment>,
    pub citations: Vec<Citation>,
}

/// Dual-collection retriever. Children are what gets searched; every text
/// hit is expanded to its stored parent context before the generator sees
/// it, and parents retrieved through several children count once.
pub struct Retriever<C, E, T, I> {
    llm: Arc<C>,
    embedder: Arc<E>,
    texts: Arc<T>,
    images: Arc<I>,
    options: RetrievalOptions,
}

impl<C, E, T, I> Retriever<C, E, T, I>
where
    C: CompletionClient,
    E: Embedder,
    T: VectorCollection,
    I: VectorCollection,
{
    pub fn new(
        llm: Arc<C>,
        embedder: Arc<E>,
        texts: Arc<T>,
        images: Arc<I>,
        options: RetrievalOptions,
    ) -> Self {
        Self {
            llm,
            embedder,
            texts,
            images,
            options,
        }
    }

    /// Best-effort hypothetical-document rewrite: on any failure the raw
    /// question is used unchanged.
    async fn expand_query(&self, question: &str) -> String {
        if !self.options.use_hyde {
            return question.to_string();
        }

        let messages = [ChatMessage::user(question)];
        match self.llm.complete(HYDE_PROMPT, &messages, 0.3).await {
            Ok(passage) => passage,
            Err(error) => {
                tracing::warn!(%error, "HyDE rewrite failed, querying with the raw question");
                question.to_string()
            }
        }
    }

    pub async fn retrieve(
        &self,
        question: &str,
        category: Category,
    ) -> Result<Retrieval, PipelineError> {
        let query_text = self.expand_query(question).await;

        let vectors = self.embedder.embed_batch(&[query_text]).await?;
        let vector = vectors
            .into_iter()
            .next()
            .ok_or(PipelineError::EmbeddingCount { expected: 1, got: 0 })?;

        // A fallback-category turn queries unfiltered: a router hiccup must
        // degrade recall, not blank it.
        let filter = match category {
            Category::Otros => None,
            routed => Some(routed),
        };

        let (text_hits, image_hits) = tokio::join!(
            self.texts
                .query(&vector, self.options.top_k_text, filter),
            self.images
                .query(&vector, self.options.top_k_images, filter),
        );

        let text_hits = text_hits?;
        let image_hits = match image_hits {
            Ok(hits) => hits,
            Err(error) => {
                tracing::warn!(%error, "image collection query failed, continuing text-only");
                Vec::new()
            }
        };

        Ok(assemble(&text_hits, &image_hits))
    }
}

fn metadata_str<'a>(metadata: &'a Value, key: &str) -> Option<&'a str> {
    metadata.get(key).and_then(Value::as_str)
}

/// Merges both hit lists into generator-ready fragments. Text hits are
/// substituted with their expanded parent context and deduplicated by
/// (document, parent id); citations are built per hit before that
/// deduplication.
fn assemble(text_hits: &[QueryHit], image_hits: &[QueryHit]) -> Retrieval {
    let mut fragments = Vec::new();
    let mut citations = Vec::new();
    let mut seen_parents: HashSet<(String, i64)> = HashSet::new();
    let mut seen_citations: HashSet<String> = HashSet::new();

    for hit in text_hits {
        let source = metadata_str(&hit.metadata, "source")
            .unwrap_or_default()
            .to_string();
        let parent_id = hit
            .metadata
            .get("parent_id")
            .and_then(Value::as_i64)
            .unwrap_or(-1);

        if seen_citations.insert(hit.id.clone()) {
            citations.push(Citation {
                document: source.clone(),
                chunk_id: hit.id.clone(),
            });
        }

        if !seen_parents.insert((source.clone(), parent_id)) {
            continue;
        }

        let parent_text = metadata_str(&hit.metadata, "contexto_expandido")
            .unwrap_or(hit.document.as_str())
            .to_string();

        fragments.push(RetrievedFragment {
            chunk_id: hit.id.clone(),
            source,
            text: parent_text,
            kind: FragmentKind::Text,
            distance: hit.distance,
        });
    }

    for hit in image_hits {
        let source_pdf = metadata_str(&hit.metadata, "pdf_origen")
            .unwrap_or_default()
            .to_string();
        let file_name = metadata_str(&hit.metadata, "nombre_archivo").unwrap_or(&hit.document);
        let page = hit.metadata.get("pagina").and_then(Value::as_u64);

        let description = match page {
            Some(page) => format!("[Imagen {file_name} de {source_pdf}, página {page}]"),
            None => format!("[Imagen {file_name} de {source_pdf}]"),
        };

        if seen_citations.insert(hit.id.clone()) {
            citations.push(Citation {
                document: source_pdf.clone(),
                chunk_id: hit.id.clone(),
            });
        }

        fragments.push(RetrievedFragment {
            chunk_id: hit.id.clone(),
            source: source_pdf,
            text: description,
            kind: FragmentKind::Image,
            distance: hit.distance,
        });
    }

    Retrieval {
        fragments,
        citations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashedNgramEmbedder;
    use crate::store::CollectionRecord;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeCompletion {
        fail: bool,
    }

    #[async_trait]
    impl CompletionClient for FakeCompletion {
        async fn complete(
            &self,
            _system_prompt: &str,
            _messages: &[ChatMessage],
            _temperature: f32,
        ) -> Result<String, PipelineError> {
            if self.fail {
                Err(PipelineError::Request("llm down".to_string()))
            } else {
                Ok("El Modelo 036 regula la declaración censal.".to_string())
            }
        }
    }

    struct FakeCollection {
        hits: Result<Vec<QueryHit>, ()>,
        queries: AtomicUsize,
    }

    impl FakeCollection {
        fn with_hits(hits: Vec<QueryHit>) -> Self {
            Self {
                hits: Ok(hits),
                queries: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                hits: Err(()),
                queries: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl VectorCollection for FakeCollection {
        async fn add(&self, _records: &[CollectionRecord]) -> Result<(), PipelineError> {
            Ok(())
        }

        async fn query(
            &self,
            _vector: &[f32],
            _top_k: usize,
            _category: Option<Category>,
        ) -> Result<Vec<QueryHit>, PipelineError> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            self.hits
                .clone()
                .map_err(|_| PipelineError::Request("store down".to_string()))
        }

        async fn count(&self) -> Result<u64, PipelineError> {
            Ok(0)
        }
    }

    fn text_hit(id: &str, source: &str, parent_id: i64, parent_text: &str) -> QueryHit {
        QueryHit {
            id: id.to_string(),
            document: "texto hijo".to_string(),
            metadata: json!({
                "source": source,
                "parent_id": parent_id,
                "contexto_expandido": parent_text,
            }),
            distance: 0.2,
        }
    }

    fn retriever(
        llm_fails: bool,
        texts: FakeCollection,
        images: FakeCollection,
    ) -> Retriever<FakeCompletion, HashedNgramEmbedder, FakeCollection, FakeCollection> {
        Retriever::new(
            Arc::new(FakeCompletion { fail: llm_fails }),
            Arc::new(HashedNgramEmbedder::default()),
            Arc::new(texts),
            Arc::new(images),
            RetrievalOptions::default(),
        )
    }

    #[tokio::test]
    async fn text_hits_are_expanded_to_parent_context_and_deduplicated() {
        let texts = FakeCollection::with_hits(vec![
            text_hit("doc.pdf_child_0", "doc.pdf", 0, "texto completo del padre cero"),
            text_hit("doc.pdf_child_1", "doc.pdf", 0, "texto completo del padre cero"),
            text_hit("doc.pdf_child_7", "doc.pdf", 2, "texto completo del padre dos"),
        ]);
        let images = FakeCollection::with_hits(Vec::new());

        let result = retriever(false, texts, images)
            .retrieve("¿Qué es el Modelo 036?", Category::Fiscal)
            .await
            .unwrap();

        // One parent retrieved through two children counts once.
        assert_eq!(result.fragments.len(), 2);
        assert_eq!(result.fragments[0].text, "texto completo del padre cero");
        assert_eq!(result.fragments[1].text, "texto completo del padre dos");

        // Citations stay per-hit, independent of the dedup.
        assert_eq!(result.citations.len(), 3);
        assert!(result
            .citations
            .iter()
            .all(|citation| citation.document == "doc.pdf"));
    }

    #[tokio::test]
    async fn image_hits_are_appended_with_descriptors() {
        let texts = FakeCollection::with_hits(vec![text_hit(
            "guia.pdf_child_0",
            "guia.pdf",
            0,
            "contexto padre",
        )]);
        let images = FakeCollection::with_hits(vec![QueryHit {
            id: "img-uuid-1".to_string(),
            document: "esquema_batuz.png".to_string(),
            metadata: json!({
                "pdf_origen": "guia_batuz.pdf",
                "nombre_archivo": "esquema_batuz.png",
                "pagina": 4,
            }),
            distance: 0.4,
        }]);

        let result = retriever(false, texts, images)
            .retrieve("esquema de batuz", Category::Fiscal)
            .await
            .unwrap();

        assert_eq!(result.fragments.len(), 2);
        assert_eq!(result.fragments[1].kind, FragmentKind::Image);
        assert!(result.fragments[1].text.contains("esquema_batuz.png"));
        assert!(result.fragments[1].text.contains("página 4"));
        assert_eq!(result.citations[1].document, "guia_batuz.pdf");
    }

    #[tokio::test]
    async fn image_collection_failure_degrades_to_text_only() {
        let texts = FakeCollection::with_hits(vec![text_hit(
            "doc.pdf_child_0",
            "doc.pdf",
            0,
            "contexto padre",
        )]);

        let result = retriever(false, texts, FakeCollection::failing())
            .retrieve("pregunta", Category::Laboral)
            .await
            .unwrap();

        assert_eq!(result.fragments.len(), 1);
    }

    #[tokio::test]
    async fn text_collection_failure_is_an_error_not_an_empty_result() {
        let result = retriever(false, FakeCollection::failing(), FakeCollection::with_hits(Vec::new()))
            .retrieve("pregunta", Category::Laboral)
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn empty_results_are_a_valid_outcome() {
        let result = retriever(
            false,
            FakeCollection::with_hits(Vec::new()),
            FakeCollection::with_hits(Vec::new()),
        )
        .retrieve("algo sin cobertura", Category::Fiscal)
        .await
        .unwrap();

        assert!(result.fragments.is_empty());
        assert!(result.citations.is_empty());
    }

    #[tokio::test]
    async fn hyde_failure_falls_back_to_the_raw_question() {
        let texts = FakeCollection::with_hits(Vec::new());
        let images = FakeCollection::with_hits(Vec::new());

        let result = retriever(true, texts, images)
            .retrieve("¿plazo del modelo 140?", Category::Fiscal)
            .await;

        assert!(result.is_ok());
    }
}
