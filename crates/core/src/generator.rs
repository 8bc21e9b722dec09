use crate::error::PipelineError;
use crate::llm::CompletionClient;
use crate::models::{ChatMessage, RetrievedFragment};
use crate::prompts::{GENERATOR_PROMPT, REFUSAL};
use std::sync::Arc;

/// Synthesizes a grounded answer strictly from the supplied context. With
/// zero fragments there is nothing to ground on, so the refusal literal is
/// returned directly; no model call can improve on that.
pub struct AnswerGenerator<C> {
    llm: Arc<C>,
    temperature: f32,
}

impl<C> AnswerGenerator<C>
where
    C: CompletionClient,
{
    pub fn new(llm: Arc<C>, temperature: f32) -> Self {
        Self { llm, temperature }
    }

    pub async fn generate(
        &self,
        question: &str,
        history: &[ChatMessage],
        fragments: &[RetrievedFragment],
    ) -> Result<String, PipelineError> {
        if fragments.is_empty() {
            return Ok(REFUSAL.to_string());
        }

        let context = build_context_block(fragments);

        let mut messages = history.to_vec();
        messages.push(ChatMessage::user(format!(
            "CONTEXTO:\n{context}\n\nPREGUNTA: {question}"
        )));

        self.llm
            .complete(GENERATOR_PROMPT, &messages, self.temperature)
            .await
    }
}

fn build_context_block(fragments: &[RetrievedFragment]) -> String {
    fragments
        .iter()
        .enumerate()
        .map(|(position, fragment)| {
            format!(
                "[Fragmento {} | Fuente: {}]\n{}",
                position + 1,
                fragment.source,
                fragment.text,
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
