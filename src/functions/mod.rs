//! In-process versions of the three remote functions.
//!
//! Each module pairs a capability implementation with its HTTP handler.
//! Handlers answer with the bodies the deployed functions use, including the
//! degraded fallbacks.

pub mod analyze;
pub mod dify;
pub mod rag_chat;
pub mod translate;

use std::sync::Arc;

use axum::routing::post;
use axum::Router;

use crate::config::Settings;
use crate::gateway::{CompletionBackend, GatewayClient};
use crate::services::Services;
use crate::store::ChatStore;

/// Routes mounted under `/functions/v1`.
pub fn router() -> Router<Services> {
    Router::new()
        .route("/analyze-document", post(analyze::handler))
        .route("/rag-chat", post(rag_chat::handler))
        .route("/translate", post(translate::handler))
}

/// Build the in-process implementations. Needs the gateway and Dify keys.
pub fn local_services(
    client: reqwest::Client,
    settings: &Settings,
    chats: Arc<dyn ChatStore>,
) -> anyhow::Result<Services> {
    let gateway: Arc<dyn CompletionBackend> =
        Arc::new(GatewayClient::from_settings(client.clone(), settings)?);
    let dify = Arc::new(dify::DifyClient::from_settings(client, settings)?);

    Ok(Services {
        analyzer: Arc::new(analyze::LocalAnalyzer::new(gateway.clone())),
        chat: Arc::new(rag_chat::LocalChatTransport::new(dify, chats)),
        translator: Arc::new(translate::LocalTranslator::new(gateway)),
    })
}
