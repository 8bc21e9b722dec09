use crate::llm::CompletionClient;
use crate::models::ChatMessage;
use crate::prompts::{FIDELITY_JUDGE_PROMPT, RELEVANCE_JUDGE_PROMPT};
use std::sync::Arc;

/// LLM-as-judge evaluators, run post-hoc for telemetry. Both discard
/// malformed or out-of-range model output instead of failing the turn, so
/// every method returns `Option` rather than `Result`.
pub struct QualityJudges<C> {
    llm: Arc<C>,
}

impl<C> QualityJudges<C>
where
    C: CompletionClient,
{
    pub fn new(llm: Arc<C>) -> Self {
        Self { llm }
    }

    /// Binary fidelity verdict: `true` when every claim in the answer is
    /// supported by the context (paraphrase allowed), `false` on
    /// contradiction or invention.
    pub async fn fidelity(&self, context: &str, answer: &str) -> Option<bool> {
        let messages = [ChatMessage::user(format!(
            "CONTEXTO:\n{context}\n\nRESPUESTA:\n{answer}"
        ))];

        let raw = match self.llm.complete(FIDELITY_JUDGE_PROMPT, &messages, 0.0).await {
            Ok(raw) => raw,
            Err(error) => {
                tracing::warn!(%error, "fidelity judge call failed, verdict discarded");
                return None;
            }
        };

        match first_digit(&raw) {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => {
                tracing::warn!(reply = %raw, "fidelity judge reply was not 0/1, discarded");
                None
            }
        }
    }

    /// Ordinal relevance score 1-5 (1 = non-answer, 5 = complete and
    /// precise).
    pub async fn relevance(&self, question: &str, answer: &str) -> Option<u8> {
        let messages = [ChatMessage::user(format!(
            "PREGUNTA:\n{question}\n\nRESPUESTA:\n{answer}"
        ))];

        let raw = match self
            .llm
            .complete(RELEVANCE_JUDGE_PROMPT, &messages, 0.0)
            .await
        {
            Ok(raw) => raw,
            Err(error) => {
                tracing::warn!(%error, "relevance judge call failed, verdict discarded");
                return None;
            }
        };

        match first_digit(&raw) {
            Some(score @ 1..=5) => Some(score),
            _ => {
                tracing::warn!(reply = %raw, "relevance judge reply outside 1-5, discarded");
                None
            }
        }
    }
}

fn first_digit(raw: &str) -> Option<u8> {
    raw.chars()
        .find(char::is_ascii_digit)
        .and_then(|digit| digit.to_digit(10))
        .map(|digit| digit as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use async_trait::async_trait;

    struct FixedCompletion {
        reply: Result<&'static str, ()>,
    }

    #[async_trait]
    impl CompletionClient for FixedCompletion {
        async fn complete(
            &self,
            _system_prompt: &str,
            _messages: &[ChatMessage],
            _temperature: f32,
        ) -> Result<String, PipelineError> {
            self.reply
                .map(str::to_string)
                .map_err(|_| PipelineError::Request("llm unavailable".to_string()))
        }
    }

    fn judges(reply: Result<&'static str, ()>) -> QualityJudges<FixedCompletion> {
        QualityJudges::new(Arc::new(FixedCompletion { reply }))
    }

    #[tokio::test]
    async fn paraphrased_claim_supported_by_context_is_grounded() {
        // Judge model decides; here it answers 1 for a paraphrase.
        let verdict = judges(Ok("1"))
            .fidelity(
                "el plazo finaliza el día 20",
                "debes presentar antes del día 20",
            )
            .await;
        assert_eq!(verdict, Some(true));
    }

    #[tokio::test]
    async fn contradicted_claim_is_not_grounded() {
        let verdict = judges(Ok("0"))
            .fidelity(
                "la ayuda es para menores de 30 años",
                "la ayuda es para mayores de 45 años",
            )
            .await;
        assert_eq!(verdict, Some(false));
    }

    #[tokio::test]
    async fn malformed_fidelity_reply_is_discarded() {
        assert_eq!(judges(Ok("sí, totalmente")).fidelity("c", "a").await, None);
        assert_eq!(judges(Ok("7")).fidelity("c", "a").await, None);
        assert_eq!(judges(Err(())).fidelity("c", "a").await, None);
    }

    #[tokio::test]
    async fn relevance_accepts_scores_in_range_only() {
        assert_eq!(judges(Ok("5")).relevance("q", "a").await, Some(5));
        assert_eq!(judges(Ok("Puntuación: 3")).relevance("q", "a").await, Some(3));
        assert_eq!(judges(Ok("0")).relevance("q", "a").await, None);
        assert_eq!(judges(Ok("excelente")).relevance("q", "a").await, None);
        assert_eq!(judges(Err(())).relevance("q", "a").await, None);
    }
}
