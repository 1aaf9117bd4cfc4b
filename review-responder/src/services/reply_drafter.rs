use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::LlmConfiguration;
use crate::error::ServerError;

const PERSONA: &str = "You are a business owner replying to Google reviews. \
Keep replies short, professional, and grateful.";

/// Produces reply text for a single review.
#[async_trait]
pub trait ReplyDrafter: Send + Sync {
    async fn complete(&self, review_text: &str) -> Result<String, ServerError>;
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

fn chat_request<'a>(model: &'a str, review_text: &str) -> ChatRequest<'a> {
    ChatRequest {
        model,
        messages: vec![
            ChatMessage {
                role: "system",
                content: PERSONA.to_string(),
            },
            ChatMessage {
                role: "user",
                content: format!("Reply to this review: \"{}\"", review_text),
            },
        ],
    }
}

fn first_content(response: ChatResponse) -> Option<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
}

/// Chat-completions client for OpenAI-compatible endpoints. Single attempt per draft.
pub struct OpenAiDrafter {
    client: Client,
    api_key: SecretString,
    model: String,
    endpoint: String,
}

impl OpenAiDrafter {
    pub fn new(config: &LlmConfiguration) -> Result<Self, ServerError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| ServerError::Configuration(format!("Failed to build LLM client: {}", e)))?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl ReplyDrafter for OpenAiDrafter {
    #[tracing::instrument(skip_all, fields(model = %self.model))]
    async fn complete(&self, review_text: &str) -> Result<String, ServerError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .json(&chat_request(&self.model, review_text))
            .send()
            .await
            .map_err(|e| ServerError::Upstream(format!("LLM request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%status, "LLM completion failed");
            return Err(ServerError::Upstream(format!(
                "LLM API error: {} - {}",
                status, body
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ServerError::Upstream(format!("Unreadable LLM response: {}", e)))?;

        let reply = first_content(parsed)
            .ok_or_else(|| ServerError::Upstream("LLM response had no content".to_string()))?;
        tracing::debug!(chars = reply.len(), "Drafted reply");
        Ok(reply)
    }
}
