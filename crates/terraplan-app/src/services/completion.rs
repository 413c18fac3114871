//! Text-completion collaborator.
//!
//! One request, one response, no retry layered on top; callers decide what a
//! failed call means for their stage.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

const COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("missing OpenAI API key")]
    MissingApiKey,
    #[error("completion request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("completion request rejected with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("completion response carried no choices")]
    EmptyResponse,
}

/// Collaborator issuing a single completion exchange against a named model.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, model: &str, user_prompt: &str) -> Result<String, CompletionError>;
}

/// OpenAI chat-completions client with a fixed system role.
pub struct OpenAiClient {
    http: Client,
    api_key: String,
    system_prompt: String,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            api_key: api_key.into(),
            system_prompt: system_prompt.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, model: &str, user_prompt: &str) -> Result<String, CompletionError> {
        if self.api_key.trim().is_empty() {
            return Err(CompletionError::MissingApiKey);
        }

        let body = json!({
            "model": model,
            "messages": [
                { "role": "system", "content": self.system_prompt },
                { "role": "user", "content": user_prompt }
            ],
        });

        let response = self
            .http
            .post(COMPLETIONS_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(CompletionError::EmptyResponse);
        }
        Ok(trimmed.to_owned())
    }
}
