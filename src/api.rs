//! HTTP surface: app API, hosted remote functions and the router.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    middleware,
    response::Json,
    routing::{get, patch, post},
    Extension, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::advisors::{self, AdvisorDirectory};
use crate::auth::{self, AuthUser, JwtVerifier};
use crate::chat::{ChatSessionController, SendOutcome};
use crate::error::AidError;
use crate::functions;
use crate::locale;
use crate::ocr::{OcrExtractor, ProgressReporter, SourceFile};
use crate::pipeline::{DocumentContext, DocumentPipeline, PipelineResult, Stage};
use crate::schema::{
    ChatSession, Contact, ContactKind, Document, Language, Message, Profile, ProfileUpdate,
    COUNTRIES, DEFAULT_CHAT_TITLE,
};
use crate::services::Services;
use crate::store::Stores;
use crate::translation::{TranslationSession, TranslationView};

/// Camera photos and scanned PDFs.
const BODY_LIMIT: usize = 20 * 1024 * 1024;

const DEFAULT_COUNTRY: &str = "UAE";

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub stores: Stores,
    pub services: Services,
    pub extractor: OcrExtractor,
    pub auth: Option<Arc<JwtVerifier>>,
}

/// Build the router. `functions` hosts the remote functions in this process.
pub fn app(state: AppState, functions: Option<Services>) -> Router {
    let protected = Router::new()
        .route("/api/documents", post(upload_document).get(list_documents))
        .route("/api/chats", get(list_chats).post(create_chat))
        .route("/api/chats/{id}", patch(rename_chat).delete(delete_chat))
        .route("/api/chats/{id}/messages", get(chat_messages))
        .route("/api/chat/send", post(send_message))
        .route("/api/translate", post(translate))
        .route("/api/contacts", get(list_contacts))
        .route("/api/profile", get(get_profile).put(update_profile))
        .route_layer(middleware::from_fn_with_state(
            state.auth.clone(),
            auth::require_user,
        ));

    let mut router = Router::new()
        .route("/health", get(health))
        .route("/api/advisors", get(legal_advisors))
        .route("/api/languages", get(languages))
        .route("/api/contacts/options", get(contact_options))
        .merge(protected)
        .with_state(state);

    if let Some(services) = functions {
        router = router.nest("/functions/v1", functions::router().with_state(services));
    }

    router
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

async fn legal_advisors() -> Json<AdvisorDirectory> {
    Json(advisors::directory())
}

#[derive(Debug, Serialize)]
struct LanguageOption {
    code: Language,
    name: &'static str,
}

async fn languages() -> Json<Vec<LanguageOption>> {
    Json(
        Language::ALL
            .iter()
            .map(|&code| LanguageOption {
                code,
                name: code.display_name(),
            })
            .collect(),
    )
}

#[derive(Debug, Serialize)]
struct KindOption {
    value: ContactKind,
    label: &'static str,
}

#[derive(Debug, Serialize)]
struct ContactOptions {
    countries: &'static [&'static str],
    default_country: &'static str,
    kinds: Vec<KindOption>,
}

/// Filters offered by the contact directory.
async fn contact_options() -> Json<ContactOptions> {
    let kinds = [ContactKind::Embassy, ContactKind::Labor, ContactKind::Ngo]
        .into_iter()
        .map(|value| KindOption {
            value,
            label: value.label(),
        })
        .collect();
    Json(ContactOptions {
        countries: &COUNTRIES,
        default_country: DEFAULT_COUNTRY,
        kinds,
    })
}

#[derive(Debug, Serialize)]
struct UploadResponse {
    stage: Stage,
    notice: &'static str,
    result: PipelineResult,
}

/// Upload a document and run it through OCR and analysis.
async fn upload_document(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AidError> {
    let mut file: Option<SourceFile> = None;
    let mut chat_id: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AidError::BadRequest(format!("Multipart error: {}", e)))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let filename = field.file_name().unwrap_or("document").to_string();
                let mime = field.content_type().unwrap_or_default().to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AidError::BadRequest(format!("Failed to read file: {}", e)))?;
                file = Some(SourceFile::new(filename, mime, data.to_vec()));
            }
            Some("chat_id") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AidError::BadRequest(format!("Failed to read chat_id: {}", e)))?;
                chat_id = Some(text).filter(|t| !t.trim().is_empty());
            }
            _ => {}
        }
    }

    let file = file
        .filter(|f| !f.data.is_empty())
        .ok_or_else(|| AidError::BadRequest("No file uploaded".to_string()))?;
    info!("Received file: {} ({} bytes, {})", file.filename, file.data.len(), file.mime);

    if let Some(chat_id) = &chat_id {
        state
            .stores
            .chats
            .get_chat(&user_id, chat_id)
            .await?
            .ok_or_else(|| AidError::NotFound(format!("chat {}", chat_id)))?;
    }

    let mut pipeline = DocumentPipeline::new(
        state.extractor.clone(),
        state.services.analyzer.clone(),
        state.stores.documents.clone(),
    )
    .with_user(Some(user_id));
    pipeline.set_chat(chat_id);

    let (progress, mut ticks) = ProgressReporter::channel();
    let filename = file.filename.clone();
    tokio::spawn(async move {
        while let Some(tick) = ticks.recv().await {
            debug!("OCR progress for {}: {}%", filename, tick);
        }
    });

    let result = pipeline.submit(file, &progress).await?.clone();
    Ok(Json(UploadResponse {
        stage: pipeline.stage(),
        notice: locale::DOCUMENT_DONE,
        result,
    }))
}

async fn list_documents(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Result<Json<Vec<Document>>, AidError> {
    Ok(Json(state.stores.documents.list_documents(&user_id).await?))
}

fn controller(state: &AppState, user_id: String) -> ChatSessionController {
    ChatSessionController::new(
        state.stores.chats.clone(),
        state.services.chat.clone(),
        Some(user_id),
    )
}

async fn list_chats(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Result<Json<Vec<ChatSession>>, AidError> {
    Ok(Json(controller(&state, user_id).list_sessions().await?))
}

#[derive(Debug, Default, Deserialize)]
struct CreateChatBody {
    title: Option<String>,
}

async fn create_chat(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    body: Bytes,
) -> Result<Json<ChatSession>, AidError> {
    let body: CreateChatBody = if body.is_empty() {
        CreateChatBody::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AidError::BadRequest(format!("Invalid body: {}", e)))?
    };
    let title = body
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(DEFAULT_CHAT_TITLE);
    Ok(Json(state.stores.chats.create_chat(&user_id, title).await?))
}

#[derive(Debug, Deserialize)]
struct RenameBody {
    title: String,
}

async fn rename_chat(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(body): Json<RenameBody>,
) -> Result<Json<serde_json::Value>, AidError> {
    controller(&state, user_id).rename(&id, &body.title).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

async fn delete_chat(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AidError> {
    controller(&state, user_id).delete(&id).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

async fn chat_messages(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Message>>, AidError> {
    let mut controller = controller(&state, user_id);
    controller.open(&id).await?;
    Ok(Json(controller.into_state().messages))
}

#[derive(Debug, Deserialize)]
struct SendBody {
    #[serde(default)]
    chat_id: Option<String>,
    message: String,
    #[serde(default)]
    document_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct SendResponse {
    #[serde(flatten)]
    outcome: SendOutcome,
    messages: Vec<Message>,
}

/// Send a chat message, creating a session when none is given.
async fn send_message(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Json(body): Json<SendBody>,
) -> Result<Json<SendResponse>, AidError> {
    let mut controller = controller(&state, user_id.clone());
    if let Some(chat_id) = body.chat_id.as_deref().filter(|id| !id.is_empty()) {
        controller.open(chat_id).await?;
    }
    if let Some(document_id) = &body.document_id {
        let document = state
            .stores
            .documents
            .get_document(&user_id, document_id)
            .await?
            .ok_or_else(|| AidError::NotFound(format!("document {}", document_id)))?;
        controller.set_document_context(Some(DocumentContext::from_document(&document)));
    }

    let outcome = controller.send(&body.message).await?;
    Ok(Json(SendResponse {
        outcome,
        messages: controller.into_state().messages,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranslateBody {
    text: String,
    from_lang: Language,
    to_lang: Language,
}

async fn translate(
    State(state): State<AppState>,
    Json(body): Json<TranslateBody>,
) -> Result<Json<TranslationView>, AidError> {
    let mut session = TranslationSession::new(state.services.translator.clone())
        .with_languages(body.from_lang, body.to_lang);
    session.set_input(body.text);
    session.translate().await?;
    Ok(Json(session.view()))
}

#[derive(Debug, Deserialize)]
struct ContactQuery {
    country: Option<String>,
    #[serde(rename = "type")]
    kind: Option<ContactKind>,
}

async fn list_contacts(
    State(state): State<AppState>,
    Query(query): Query<ContactQuery>,
) -> Result<Json<Vec<Contact>>, AidError> {
    let country = query.country.as_deref().unwrap_or(DEFAULT_COUNTRY);
    Ok(Json(state.stores.directory.list_contacts(country, query.kind).await?))
}

async fn get_profile(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Result<Json<Option<Profile>>, AidError> {
    Ok(Json(state.stores.profiles.get_profile(&user_id).await?))
}

async fn update_profile(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<Profile>, AidError> {
    Ok(Json(state.stores.profiles.update_profile(&user_id, update).await?))
}
