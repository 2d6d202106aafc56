//! OpenAI-compatible AI gateway client for chat completions.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::Settings;

/// Errors from any upstream AI service (completion gateway or RAG backend).
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("upstream rate limited the request")]
    RateLimited,

    #[error("upstream reports insufficient credit")]
    PaymentRequired,

    #[error("upstream error ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("request to upstream failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed upstream response: {0}")]
    Decode(String),

    #[error("{0} is not configured")]
    NotConfigured(&'static str),
}

impl GatewayError {
    /// Classify a non-success status the way every upstream is classified.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            429 => GatewayError::RateLimited,
            402 => GatewayError::PaymentRequired,
            _ => GatewayError::Status { status, body },
        }
    }
}

/// Sampling knobs for a single completion.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompletionOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// Anything that turns a prompt into a reply.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(
        &self,
        messages: Vec<Message>,
        options: CompletionOptions,
    ) -> Result<String, GatewayError>;
}

/// Gateway client for chat completions.
#[derive(Clone)]
pub struct GatewayClient {
    client: Client,
    url: String,
    api_key: String,
    model: String,
}

impl GatewayClient {
    pub fn from_settings(client: Client, settings: &Settings) -> Result<Self, GatewayError> {
        let api_key = settings
            .gateway_api_key
            .clone()
            .ok_or(GatewayError::NotConfigured("AI_GATEWAY_API_KEY"))?;

        Ok(Self {
            client,
            url: settings.gateway_url.clone(),
            api_key,
            model: settings.model.clone(),
        })
    }
}

#[async_trait]
impl CompletionBackend for GatewayClient {
    async fn complete(
        &self,
        messages: Vec<Message>,
        options: CompletionOptions,
    ) -> Result<String, GatewayError> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        };

        debug!("Sending request to AI gateway: model={}", request.model);

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("AI gateway error ({}): {}", status, error_text);
            return Err(GatewayError::from_status(status.as_u16(), error_text));
        }

        let response: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))?;

        if let Some(usage) = &response.usage {
            info!(
                "AI gateway response: {} tokens (prompt: {}, completion: {})",
                usage.total_tokens, usage.prompt_tokens, usage.completion_tokens
            );
        }

        Ok(response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }
}

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

// ============================================================================
// Message types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}
