//! `analyze-document`: classify OCR text and flag risky clauses.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use regex::Regex;
use serde_json::json;
use tracing::{error, info, warn};

use crate::error::AidError;
use crate::gateway::{CompletionBackend, CompletionOptions, Message};
use crate::locale;
use crate::schema::DocumentAnalysis;
use crate::services::{AnalyzeRequest, DocumentAnalyzer, Services};

const ANALYSIS_PROMPT: &str = r#"तपाईं नेपाली आप्रवासी कामदारहरूको लागि कागजात विश्लेषक हुनुहुन्छ।
यो कागजात विश्लेषण गर्नुहोस् र निम्न जानकारी दिनुहोस्:

1) कागजातको प्रकार (contract/visa/offer letter/ID/other)
2) सरल नेपाली व्याख्या
3) स्पष्टता स्कोर (0-100)
4) रातो झण्डाहरू (Red flags) - जस्तै: तलब उल्लेख नभएको, पासपोर्ट राख्ने धारा, अस्पष्ट समाप्ति धारा, आदि
5) परामर्शदातालाई सोध्नु पर्ने प्रश्नहरू

JSON ढाँचामा जवाफ दिनुहोस्:
{
  "doc_type": "contract|visa|offer_letter|id|other",
  "summary": "नेपालीमा संक्षिप्त व्याख्या",
  "clarity_score": 75,
  "red_flags": ["रातो झण्डा 1", "रातो झण्डा 2"],
  "questions_to_ask": ["प्रश्न 1", "प्रश्न 2"]
}"#;

const OPTIONS: CompletionOptions = CompletionOptions {
    temperature: Some(0.2),
    max_tokens: Some(2000),
};

/// Analyzer backed by the completion gateway.
pub struct LocalAnalyzer {
    backend: Arc<dyn CompletionBackend>,
}

impl LocalAnalyzer {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self { backend }
    }
}

fn user_content(request: &AnalyzeRequest) -> String {
    let type_hint = match request.document_type.as_deref() {
        Some(t) if !t.is_empty() => format!("कागजातको प्रकार: {}", t),
        _ => String::new(),
    };
    format!("कागजातको पाठ:\n\n{}\n\n{}", request.ocr_text, type_hint)
}

/// Parse the first `{...}` span of a model reply, degrading to an unstructured record.
pub fn parse_analysis(reply: &str, document_type: Option<&str>) -> DocumentAnalysis {
    static OBJECT: OnceLock<Regex> = OnceLock::new();
    let object = OBJECT.get_or_init(|| Regex::new(r"\{[\s\S]*\}").expect("static pattern"));

    let parsed = object
        .find(reply)
        .ok_or_else(|| "no JSON object in reply".to_string())
        .and_then(|m| {
            serde_json::from_str::<DocumentAnalysis>(m.as_str()).map_err(|e| e.to_string())
        });

    match parsed {
        Ok(analysis) => analysis,
        Err(reason) => {
            warn!("Unstructured analysis reply ({}), using fallback", reason);
            DocumentAnalysis::unstructured(document_type.filter(|t| !t.is_empty()), reply)
        }
    }
}

#[async_trait]
impl DocumentAnalyzer for LocalAnalyzer {
    async fn analyze(&self, request: &AnalyzeRequest) -> Result<DocumentAnalysis, AidError> {
        let messages = vec![Message::system(ANALYSIS_PROMPT), Message::user(user_content(request))];

        let reply = self.backend.complete(messages, OPTIONS).await.map_err(|e| {
            error!("Document analysis upstream failure: {}", e);
            AidError::from(e)
        })?;

        info!("AI analysis received ({} chars)", reply.chars().count());
        Ok(parse_analysis(&reply, request.document_type.as_deref()))
    }
}

/// `POST /functions/v1/analyze-document`
pub async fn handler(
    State(services): State<Services>,
    Json(request): Json<AnalyzeRequest>,
) -> Response {
    info!(
        "Document analysis request received ({} chars)",
        request.ocr_text.chars().count()
    );

    match services.analyzer.analyze(&request).await {
        Ok(analysis) => Json(analysis).into_response(),
        Err(AidError::UpstreamRateLimited) => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "error": locale::RATE_LIMITED })),
        )
            .into_response(),
        Err(AidError::UpstreamBillingRequired) => (
            StatusCode::PAYMENT_REQUIRED,
            Json(json!({ "error": locale::CREDIT_REQUIRED })),
        )
            .into_response(),
        Err(err) => {
            let fallback = DocumentAnalysis {
                clarity_score: 0,
                ..DocumentAnalysis::unstructured(None, locale::ANALYSIS_FAILED_SUMMARY)
            };
            let mut body = json!(fallback);
            body["error"] = json!(err.user_message());
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
        }
    }
}
