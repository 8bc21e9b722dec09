use crate::error::PipelineError;
use crate::models::ChatMessage;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

/// Completion capability boundary. Router, HyDE rewriter, generator, and
/// both judges all go through this single seam, each with its own fixed
/// system prompt.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(
        &self,
        system_prompt: &str,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> Result<String, PipelineError>;
}

/// Client for any OpenAI-compatible chat endpoint (Ollama, vLLM, ...).
pub struct OpenAiCompatClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

impl OpenAiCompatClient {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            model: model.into(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompatClient {
    async fn complete(
        &self,
        system_prompt: &str,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> Result<String, PipelineError> {
        let mut payload_messages = vec![ChatMessage::system(system_prompt)];
        payload_messages.extend_from_slice(messages);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.endpoint))
            .json(&json!({
                "model": self.model,
                "messages": payload_messages,
                "temperature": temperature,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PipelineError::BackendResponse {
                backend: "llm".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        extract_completion_text(&parsed)
    }
}

pub(crate) fn extract_completion_text(payload: &Value) -> Result<String, PipelineError> {
    let text = payload
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(|content| content.trim().to_string())
        .unwrap_or_default();

    if text.is_empty() {
        return Err(PipelineError::MalformedCompletion(
            "response had no choices[0].message.content".to_string(),
        ));
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::extract_completion_text;
    use serde_json::json;

    #[test]
    fn completion_text_is_extracted_and_trimmed() {
        let payload = json!({
            "choices": [{"message": {"role": "assistant", "content": "  Fiscal \n"}}]
        });
        assert_eq!(extract_completion_text(&payload).unwrap(), "Fiscal");
    }

    #[test]
    fn empty_or_missing_content_is_a_malformed_completion() {
        assert!(extract_completion_text(&json!({"choices": []})).is_err());
        assert!(extract_completion_text(&json!({
            "choices": [{"message": {"content": "   "}}]
        }))
        .is_err());
    }
}
