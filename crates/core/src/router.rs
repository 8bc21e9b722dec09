use crate::llm::CompletionClient;
use crate::models::{Category, ChatMessage, Route};
use crate::prompts::{router_prompt, GREETING_LABEL};
use std::sync::Arc;

/// Single-shot intent classifier over the closed label set. Routing is
/// non-critical: any backend failure or out-of-enumeration label falls
/// closed to `Category::Otros` instead of aborting the turn. One attempt,
/// temperature 0, so reclassification of the same question is deterministic
/// for a fixed model.
pub struct CategoryRouter<C> {
    llm: Arc<C>,
}

impl<C> CategoryRouter<C>
where
    C: CompletionClient,
{
    pub fn new(llm: Arc<C>) -> Self {
        Self { llm }
    }

    pub async fn route(&self, question: &str) -> Route {
        let messages = [ChatMessage::user(question)];

        match self.llm.complete(&router_prompt(), &messages, 0.0).await {
            Ok(raw) => parse_route(&raw),
            Err(error) => {
                tracing::warn!(%error, "router call failed, falling back to 'otros'");
                Route::Topic(Category::Otros)
            }
        }
    }
}

/// Strict greeting rule: only a bare `SALUDO` token (case-insensitive,
/// punctuation trimmed) counts as a greeting. Everything else is matched
/// against the category labels, with `otros` as the fail-closed default.
pub fn parse_route(raw: &str) -> Route {
    let token = raw.trim().trim_matches(|ch: char| !ch.is_alphanumeric());

    if token.eq_ignore_ascii_case(GREETING_LABEL) {
        return Route::Greeting;
    }

    match Category::parse_lenient(raw) {
        Some(category) => Route::Topic(category),
        None => {
            tracing::warn!(label = raw, "router returned a label outside the closed set");
            Route::Topic(Category::Otros)
        }
    }
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

    #[tokio::test]
    async fn greeting_label_routes_to_greeting() {
        let router = CategoryRouter::new(Arc::new(FixedCompletion { reply: Ok("SALUDO") }));
        assert_eq!(router.route("hola").await, Route::Greeting);
    }

    #[tokio::test]
    async fn category_labels_route_by_topic() {
        let router = CategoryRouter::new(Arc::new(FixedCompletion { reply: Ok("Fiscal") }));
        assert_eq!(
            router.route("¿Qué es el Modelo 036?").await,
            Route::Topic(Category::Fiscal)
        );
    }

    #[tokio::test]
    async fn out_of_set_label_falls_back_to_otros() {
        let router = CategoryRouter::new(Arc::new(FixedCompletion { reply: Ok("Deportes") }));
        assert_eq!(
            router.route("cualquier cosa").await,
            Route::Topic(Category::Otros)
        );
    }

    #[tokio::test]
    async fn backend_failure_falls_back_to_otros() {
        let router = CategoryRouter::new(Arc::new(FixedCompletion { reply: Err(()) }));
        assert_eq!(
            router.route("¿plazos del IRPF?").await,
            Route::Topic(Category::Otros)
        );
    }

    #[test]
    fn parse_route_always_lands_inside_the_closed_set() {
        for raw in ["saludo.", "FISCAL", "laboral\n", "ayudas_y_subvenciones", "", "????", "42"] {
            match parse_route(raw) {
                Route::Greeting => {}
                Route::Topic(category) => {
                    assert!(
                        Category::ROUTABLE.contains(&category) || category == Category::Otros
                    );
                }
            }
        }
    }

    #[test]
    fn mixed_greeting_plus_question_is_not_a_greeting_token() {
        // The model is told to classify mixed messages by topic; a reply
        // that still mentions SALUDO inside a longer sentence is not a bare
        // token and must not short-circuit.
        assert_eq!(
            parse_route("SALUDO porque empieza con hola, pero pregunta por IVA"),
            Route::Topic(Category::Otros)
        );
    }
}
