//! Error taxonomy shared by the pipeline, the chat controller and the HTTP layer.
//!
//! Every variant carries a localized message for the person using the app;
//! the technical detail goes to the log, never to the response body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::gateway::GatewayError;
use crate::locale;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum AidError {
    /// The file is neither an image nor a PDF.
    #[error("unsupported file type: {0}")]
    UnsupportedFormat(String),

    /// OCR ran but produced only whitespace.
    #[error("no text could be extracted from the document")]
    EmptyExtraction,

    /// The OCR engine or the PDF renderer failed.
    #[error("OCR failed: {0}")]
    OcrFailed(String),

    #[error("upstream AI service is rate limited")]
    UpstreamRateLimited,

    #[error("upstream AI service requires credit")]
    UpstreamBillingRequired,

    #[error("upstream service unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("persistence failure: {0}")]
    PersistenceFailure(String),

    #[error("no authenticated user")]
    Unauthenticated,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    /// Speech capture or playback failed.
    #[error("speech failed: {0}")]
    SpeechFailed(String),
}

impl AidError {
    /// Message shown to the person using the app.
    pub fn user_message(&self) -> &'static str {
        match self {
            AidError::UnsupportedFormat(_) => locale::UNSUPPORTED_FORMAT,
            AidError::EmptyExtraction => locale::EMPTY_EXTRACTION,
            AidError::OcrFailed(_) => locale::DOCUMENT_FAILED,
            AidError::UpstreamRateLimited => locale::RATE_LIMITED,
            AidError::UpstreamBillingRequired => locale::CREDIT_REQUIRED,
            AidError::UpstreamUnavailable(_) => locale::UNKNOWN_ERROR,
            AidError::PersistenceFailure(_) => locale::SAVE_FAILED,
            AidError::Unauthenticated => locale::SIGN_IN_REQUIRED,
            AidError::NotFound(_) => locale::NOT_FOUND,
            AidError::BadRequest(_) => locale::UNKNOWN_ERROR,
            AidError::SpeechFailed(_) => locale::SPEECH_FAILED,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AidError::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AidError::EmptyExtraction => StatusCode::UNPROCESSABLE_ENTITY,
            AidError::OcrFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AidError::UpstreamRateLimited => StatusCode::TOO_MANY_REQUESTS,
            AidError::UpstreamBillingRequired => StatusCode::PAYMENT_REQUIRED,
            AidError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            AidError::PersistenceFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AidError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AidError::NotFound(_) => StatusCode::NOT_FOUND,
            AidError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AidError::SpeechFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<GatewayError> for AidError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::RateLimited => AidError::UpstreamRateLimited,
            GatewayError::PaymentRequired => AidError::UpstreamBillingRequired,
            other => AidError::UpstreamUnavailable(other.to_string()),
        }
    }
}

impl From<StoreError> for AidError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => AidError::NotFound(what),
            other => AidError::PersistenceFailure(other.to_string()),
        }
    }
}

impl IntoResponse for AidError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        let body = match &self {
            AidError::BadRequest(detail) => json!({ "error": detail }),
            _ => json!({ "error": self.user_message() }),
        };
        (status, Json(body)).into_response()
    }
}
