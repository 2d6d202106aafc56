//! `translate`: one-shot translation through the completion gateway.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::{error, info};

use crate::error::AidError;
use crate::gateway::{CompletionBackend, CompletionOptions, Message};
use crate::locale;
use crate::schema::Language;
use crate::services::{Services, TranslateReply, TranslateRequest, Translator};

const OPTIONS: CompletionOptions = CompletionOptions {
    temperature: Some(0.1),
    max_tokens: Some(2000),
};

fn system_prompt(from: Language, to: Language) -> String {
    format!(
        "You are a professional translator. Translate the following text from {} to {}. \
         Only output the translation, nothing else. Preserve the original meaning and tone.",
        from.display_name(),
        to.display_name()
    )
}

pub struct LocalTranslator {
    backend: Arc<dyn CompletionBackend>,
}

impl LocalTranslator {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Translator for LocalTranslator {
    async fn translate(&self, request: &TranslateRequest) -> Result<String, AidError> {
        let messages = vec![
            Message::system(system_prompt(request.from_lang, request.to_lang)),
            Message::user(request.text.clone()),
        ];
        let reply = self.backend.complete(messages, OPTIONS).await.map_err(|e| {
            error!("Translation upstream failure: {}", e);
            AidError::from(e)
        })?;
        Ok(reply.trim().to_string())
    }
}

/// `POST /functions/v1/translate`
pub async fn handler(
    State(services): State<Services>,
    Json(request): Json<TranslateRequest>,
) -> Response {
    info!(
        "Translation request: {} -> {} ({} chars)",
        request.from_lang.code(),
        request.to_lang.code(),
        request.text.chars().count()
    );

    match services.translator.translate(&request).await {
        Ok(translation) => Json(TranslateReply { translation }).into_response(),
        Err(AidError::UpstreamRateLimited) => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "error": locale::RATE_LIMITED_SHORT })),
        )
            .into_response(),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": locale::TRANSLATE_FAILED, "translation": "" })),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::GatewayError;
    use std::sync::Mutex;

    struct EchoBackend {
        seen: Mutex<Vec<(Vec<Message>, CompletionOptions)>>,
    }

    #[async_trait]
    impl CompletionBackend for EchoBackend {
        async fn complete(
            &self,
            messages: Vec<Message>,
            options: CompletionOptions,
        ) -> Result<String, GatewayError> {
            let reply = format!(" [{}] \n", messages[1].content);
            self.seen.lock().unwrap().push((messages, options));
            Ok(reply)
        }
    }

    #[test]
    fn test_prompt_uses_display_names() {
        let prompt = system_prompt(Language::Ne, Language::My);
        assert!(prompt.contains("from नेपाली to Bahasa Melayu."));
    }

    #[tokio::test]
    async fn test_translate_trims_reply() {
        let backend = Arc::new(EchoBackend {
            seen: Mutex::new(Vec::new()),
        });
        let translator = LocalTranslator::new(backend.clone());

        let out = translator
            .translate(&TranslateRequest {
                text: "नमस्ते".into(),
                from_lang: Language::Ne,
                to_lang: Language::En,
            })
            .await
            .unwrap();
        assert_eq!(out, "[नमस्ते]");

        let seen = backend.seen.lock().unwrap();
        assert_eq!(seen[0].1.temperature, Some(0.1));
        assert_eq!(seen[0].1.max_tokens, Some(2000));
    }
}
