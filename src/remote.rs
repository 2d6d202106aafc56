//! Client for a deployed set of remote functions (`FUNCTIONS_URL`).

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error};

use crate::error::AidError;
use crate::schema::DocumentAnalysis;
use crate::services::{
    AnalyzeRequest, ChatReply, ChatRequest, ChatTransport, DocumentAnalyzer, TranslateReply,
    TranslateRequest, Translator,
};

#[derive(Clone)]
pub struct FunctionsClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

/// Map a function's status code onto the error taxonomy.
fn classify(status: u16, body: String) -> AidError {
    match status {
        429 => AidError::UpstreamRateLimited,
        402 => AidError::UpstreamBillingRequired,
        _ => AidError::UpstreamUnavailable(format!("{}: {}", status, body)),
    }
}

impl FunctionsClient {
    /// `api_key` is sent as a bearer token when present.
    pub fn new(client: Client, base_url: String, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url,
            api_key,
        }
    }

    async fn invoke<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        function: &str,
        body: &B,
    ) -> Result<T, AidError> {
        let mut request = self
            .client
            .post(format!("{}/{}", self.base_url, function))
            .json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key).header("apikey", key);
        }

        debug!("Invoking remote function {}", function);
        let response = request
            .send()
            .await
            .map_err(|e| AidError::UpstreamUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            error!("Remote function {} failed ({}): {}", function, status, text);
            return Err(classify(status.as_u16(), text));
        }

        response
            .json()
            .await
            .map_err(|e| AidError::UpstreamUnavailable(format!("{}: {}", function, e)))
    }
}

#[async_trait]
impl DocumentAnalyzer for FunctionsClient {
    async fn analyze(&self, request: &AnalyzeRequest) -> Result<DocumentAnalysis, AidError> {
        self.invoke("analyze-document", request).await
    }
}

#[async_trait]
impl ChatTransport for FunctionsClient {
    async fn send(&self, request: &ChatRequest) -> Result<ChatReply, AidError> {
        self.invoke("rag-chat", request).await
    }
}

#[async_trait]
impl Translator for FunctionsClient {
    async fn translate(&self, request: &TranslateRequest) -> Result<String, AidError> {
        let reply: TranslateReply = self.invoke("translate", request).await?;
        Ok(reply.translation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(matches!(classify(429, String::new()), AidError::UpstreamRateLimited));
        assert!(matches!(classify(402, String::new()), AidError::UpstreamBillingRequired));
        match classify(500, "{\"error\":\"x\"}".into()) {
            AidError::UpstreamUnavailable(detail) => assert!(detail.starts_with("500")),
            other => panic!("unexpected {other:?}"),
        }
    }
}
