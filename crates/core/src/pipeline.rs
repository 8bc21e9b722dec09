use crate::embeddings::Embedder;
use crate::error::PipelineError;
use crate::generator::AnswerGenerator;
use crate::judge::QualityJudges;
use crate::llm::CompletionClient;
use crate::models::{ChatMessage, JudgeVerdict, PipelineState, RetrievalOptions, Route};
use crate::prompts::GREETING_REPLY;
use crate::retriever::Retriever;
use crate::router::CategoryRouter;
use crate::store::VectorCollection;
use std::sync::Arc;

#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    pub retrieval: RetrievalOptions,
    pub generation_temperature: f32,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            retrieval: RetrievalOptions::default(),
            generation_temperature: 0.2,
        }
    }
}

/// A critical-path stage failed. The partial state rides along so the
/// accumulated trace still reaches the caller for diagnosis.
#[derive(Debug)]
pub struct TurnFailure {
    pub error: PipelineError,
    pub state: PipelineState,
}

impl std::fmt::Display for TurnFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "turn failed: {}", self.error)
    }
}

impl std::error::Error for TurnFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// One request/response cycle:
/// `START → ROUTE → (GREETING_REPLY | RETRIEVE) → GENERATE → (JUDGE)* → DONE`.
///
/// Each stage appends a human-readable label to the state's trace. Routing
/// never aborts (it falls closed); retrieval failure degrades to an empty
/// context; only a generator failure surfaces as a turn-level error, and
/// even then the partial trace is preserved. Judges run separately via
/// [`Pipeline::evaluate`], after the answer has already been returned, so
/// they can never block or fail a turn.
pub struct Pipeline<C, E, T, I> {
    router: CategoryRouter<C>,
    retriever: Retriever<C, E, T, I>,
    generator: AnswerGenerator<C>,
    judges: QualityJudges<C>,
}

impl<C, E, T, I> Pipeline<C, E, T, I>
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
        options: PipelineOptions,
    ) -> Self {
        Self {
            router: CategoryRouter::new(llm.clone()),
            retriever: Retriever::new(
                llm.clone(),
                embedder,
                texts,
                images,
                options.retrieval,
            ),
            generator: AnswerGenerator::new(llm.clone(), options.generation_temperature),
            judges: QualityJudges::new(llm),
        }
    }

    pub async fn answer(
        &self,
        question: &str,
        history: Vec<ChatMessage>,
    ) -> Result<PipelineState, TurnFailure> {
        let mut state = PipelineState::new(question, history);

        match self.router.route(question).await {
            Route::Greeting => {
                state.answer = GREETING_REPLY.to_string();
                state
                    .trace
                    .push("ROUTER: saludo detectado, respuesta directa".to_string());
                return Ok(state);
            }
            Route::Topic(category) => {
                state.category = category;
                state.trace.push(format!(
                    "ROUTER: categoría detectada '{}'",
                    category.label()
                ));
            }
        }

        match self.retriever.retrieve(question, state.category).await {
            Ok(retrieval) => {
                state.trace.push(format!(
                    "RETRIEVER: {} fragmentos, {} citas",
                    retrieval.fragments.len(),
                    retrieval.citations.len()
                ));
                state.fragments = retrieval.fragments;
                state.citations = retrieval.citations;
            }
            Err(error) => {
                // Not critical-path: the generator's refusal logic covers
                // the empty context, but the trace must distinguish a
                // failure from a genuinely empty result.
                tracing::error!(%error, "retrieval failed, continuing without context");
                state
                    .trace
                    .push("RETRIEVER: fallo en la búsqueda, se continúa sin contexto".to_string());
            }
        }

        match self
            .generator
            .generate(question, &state.history, &state.fragments)
            .await
        {
            Ok(answer) => {
                state.answer = answer;
                state.trace.push("GENERATOR: respuesta generada".to_string());
                Ok(state)
            }
            Err(error) => {
                state.trace.push("GENERATOR: fallo en la generación".to_string());
                Err(TurnFailure { error, state })
            }
        }
    }

    /// Post-hoc quality pass over a completed turn. Greeting turns and
    /// failed judge calls simply leave verdict fields unset.
    pub async fn evaluate(&self, state: &PipelineState) -> JudgeVerdict {
        if state.answer.is_empty() {
            return JudgeVerdict::default();
        }

        let context = state
            .fragments
            .iter()
            .map(|fragment| fragment.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        JudgeVerdict {
            grounded: self.judges.fidelity(&context, &state.answer).await,
            relevance: self.judges.relevance(&state.question, &state.answer).await,
        }
    }
}
