//! Dify conversational backend used by `rag-chat`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, error};

use crate::config::Settings;
use crate::gateway::GatewayError;

/// One question for the retrieval backend.
#[derive(Debug, Clone, PartialEq)]
pub struct RagQuery {
    pub query: String,
    pub user: String,
    pub inputs: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RagAnswer {
    pub answer: String,
    pub sources: Vec<Value>,
}

#[async_trait]
pub trait RagBackend: Send + Sync {
    async fn ask(&self, query: RagQuery) -> Result<RagAnswer, GatewayError>;
}

#[derive(Clone)]
pub struct DifyClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl DifyClient {
    pub fn from_settings(client: Client, settings: &Settings) -> Result<Self, GatewayError> {
        let api_key = settings
            .dify_api_key
            .clone()
            .ok_or(GatewayError::NotConfigured("DIFY_API_KEY"))?;
        Ok(Self {
            client,
            base_url: settings.dify_url.clone(),
            api_key,
        })
    }
}

#[derive(Debug, Serialize)]
struct ChatMessagesRequest<'a> {
    inputs: &'a Map<String, Value>,
    query: &'a str,
    response_mode: &'static str,
    conversation_id: &'static str,
    user: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatMessagesResponse {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    retriever_resources: Option<Vec<Value>>,
}

impl From<ChatMessagesResponse> for RagAnswer {
    fn from(response: ChatMessagesResponse) -> Self {
        RagAnswer {
            answer: response.answer.unwrap_or_default(),
            sources: response
                .metadata
                .and_then(|m| m.retriever_resources)
                .unwrap_or_default(),
        }
    }
}

#[async_trait]
impl RagBackend for DifyClient {
    async fn ask(&self, query: RagQuery) -> Result<RagAnswer, GatewayError> {
        let body = ChatMessagesRequest {
            inputs: &query.inputs,
            query: &query.query,
            response_mode: "blocking",
            conversation_id: "",
            user: &query.user,
        };

        debug!("Calling Dify chat-messages for user {}", query.user);

        let response = self
            .client
            .post(format!("{}/chat-messages", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Dify API error ({}): {}", status, error_text);
            return Err(GatewayError::from_status(status.as_u16(), error_text));
        }

        let parsed: ChatMessagesResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))?;
        Ok(parsed.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_blocking_request_shape() {
        let mut inputs = Map::new();
        inputs.insert("document_context".into(), json!("करार"));
        let body = ChatMessagesRequest {
            inputs: &inputs,
            query: "तलब?",
            response_mode: "blocking",
            conversation_id: "",
            user: "anonymous",
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["response_mode"], "blocking");
        assert_eq!(value["conversation_id"], "");
        assert_eq!(value["inputs"]["document_context"], "करार");
    }

    #[test]
    fn test_sources_come_from_retriever_resources() {
        let response: ChatMessagesResponse = serde_json::from_value(json!({
            "answer": "उत्तर",
            "metadata": { "retriever_resources": [{ "document_name": "labour-law.pdf" }] }
        }))
        .unwrap();
        let answer = RagAnswer::from(response);
        assert_eq!(answer.answer, "उत्तर");
        assert_eq!(answer.sources.len(), 1);

        let bare: ChatMessagesResponse = serde_json::from_value(json!({ "answer": null })).unwrap();
        let answer = RagAnswer::from(bare);
        assert!(answer.answer.is_empty());
        assert!(answer.sources.is_empty());
    }
}
