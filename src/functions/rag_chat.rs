//! `rag-chat`: answer through the retrieval backend and persist the exchange.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Map};
use tracing::{error, info, warn};

use super::dify::{RagBackend, RagQuery};
use crate::error::AidError;
use crate::locale;
use crate::schema::{NewMessage, Role};
use crate::services::{ChatReply, ChatRequest, ChatTransport, Services};
use crate::store::ChatStore;

const TITLE_MAX_CHARS: usize = 50;

/// Title derived from the first user message: at most 50 characters plus `...`.
pub fn derive_title(message: &str) -> String {
    if message.chars().count() > TITLE_MAX_CHARS {
        let head: String = message.chars().take(TITLE_MAX_CHARS).collect();
        format!("{}...", head)
    } else {
        message.to_string()
    }
}

pub struct LocalChatTransport {
    rag: Arc<dyn RagBackend>,
    chats: Arc<dyn ChatStore>,
}

impl LocalChatTransport {
    pub fn new(rag: Arc<dyn RagBackend>, chats: Arc<dyn ChatStore>) -> Self {
        Self { rag, chats }
    }

    async fn persist_exchange(
        &self,
        chat_id: &str,
        message: &str,
        answer: &str,
    ) -> Result<(), AidError> {
        self.chats
            .insert_message(NewMessage {
                chat_id: chat_id.to_string(),
                role: Role::User,
                content: message.to_string(),
                metadata: None,
            })
            .await?;
        self.chats
            .insert_message(NewMessage {
                chat_id: chat_id.to_string(),
                role: Role::Assistant,
                content: answer.to_string(),
                metadata: Some(json!({ "source": "dify" })),
            })
            .await?;

        // A chat holding only this exchange is named after its first question.
        let title = match self.chats.count_messages(chat_id, 3).await {
            Ok(count) if count <= 2 => Some(derive_title(message)),
            Ok(_) => None,
            Err(e) => {
                warn!("Could not count messages in chat {}: {}", chat_id, e);
                None
            }
        };
        if let Err(e) = self.chats.touch_chat(chat_id, title.as_deref()).await {
            warn!("Could not update chat {}: {}", chat_id, e);
        }
        Ok(())
    }
}

#[async_trait]
impl ChatTransport for LocalChatTransport {
    async fn send(&self, request: &ChatRequest) -> Result<ChatReply, AidError> {
        let user_id = request.user_id.as_deref().filter(|u| !u.is_empty());

        let persist_to = match (request.chat_id.as_deref(), user_id) {
            (Some(chat_id), Some(user_id)) => {
                self.chats
                    .get_chat(user_id, chat_id)
                    .await?
                    .ok_or_else(|| AidError::NotFound(format!("chat {}", chat_id)))?;
                Some(chat_id)
            }
            (Some(chat_id), None) => {
                warn!("Chat {} given without a user, exchange will not be saved", chat_id);
                None
            }
            _ => None,
        };

        let mut inputs = Map::new();
        if let Some(context) = &request.document_context {
            inputs.insert("document_context".to_string(), json!(context));
        }

        let reply = self
            .rag
            .ask(RagQuery {
                query: request.message.clone(),
                user: user_id.unwrap_or("anonymous").to_string(),
                inputs,
            })
            .await
            .map_err(|e| {
                error!("RAG backend failure: {}", e);
                AidError::from(e)
            })?;

        let answer = if reply.answer.trim().is_empty() {
            locale::CHAT_NO_INFORMATION.to_string()
        } else {
            reply.answer
        };

        if let Some(chat_id) = persist_to {
            self.persist_exchange(chat_id, &request.message, &answer).await?;
        }

        Ok(ChatReply {
            answer,
            sources: reply.sources,
        })
    }
}

/// `POST /functions/v1/rag-chat`
pub async fn handler(
    State(services): State<Services>,
    Json(request): Json<ChatRequest>,
) -> Response {
    info!(
        "RAG chat request received (chat {:?}, {} history entries)",
        request.chat_id,
        request.chat_history.len()
    );

    match services.chat.send(&request).await {
        Ok(reply) => Json(reply).into_response(),
        Err(AidError::UpstreamRateLimited) => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "error": locale::RATE_LIMITED, "answer": locale::CHAT_APOLOGY })),
        )
            .into_response(),
        Err(err) => {
            let status = match err {
                AidError::NotFound(_) => StatusCode::NOT_FOUND,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (
                status,
                Json(json!({ "error": err.user_message(), "answer": locale::CHAT_APOLOGY })),
            )
                .into_response()
        }
    }
}
