//! Capability traits for the remote AI collaborators and their wire bodies.
//!
//! The pipeline and the chat controller only see these traits. In-process
//! implementations live in [`crate::functions`]; [`crate::remote::FunctionsClient`]
//! calls a deployed set of functions over HTTP.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AidError;
use crate::schema::{DocumentAnalysis, Language, Role};

/// `POST analyze-document` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    pub ocr_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_type: Option<String>,
}

/// One prior transcript entry sent along with a chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
}

/// `POST rag-chat` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub chat_history: Vec<HistoryEntry>,
    #[serde(default)]
    pub chat_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    /// Compact rendering of a document the user asked about.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_context: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    pub answer: String,
    #[serde(default)]
    pub sources: Vec<serde_json::Value>,
}

/// `POST translate` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateRequest {
    pub text: String,
    pub from_lang: Language,
    pub to_lang: Language,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslateReply {
    pub translation: String,
}

/// Classifies extracted document text.
#[async_trait]
pub trait DocumentAnalyzer: Send + Sync {
    /// Fails with `UpstreamRateLimited`, `UpstreamBillingRequired` or
    /// `UpstreamUnavailable`. An unparseable model reply is not a failure.
    async fn analyze(&self, request: &AnalyzeRequest) -> Result<DocumentAnalysis, AidError>;
}

/// Answers a chat message and persists both sides of the exchange.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send(&self, request: &ChatRequest) -> Result<ChatReply, AidError>;
}

#[async_trait]
pub trait Translator: Send + Sync {
    /// An empty translation is a valid answer.
    async fn translate(&self, request: &TranslateRequest) -> Result<String, AidError>;
}

/// The three collaborators, in-process or remote.
#[derive(Clone)]
pub struct Services {
    pub analyzer: Arc<dyn DocumentAnalyzer>,
    pub chat: Arc<dyn ChatTransport>,
    pub translator: Arc<dyn Translator>,
}
