//! Runtime settings.
//!
//! Loaded from `.env` plus the process environment. Parsing goes through a key
//! lookup function so tests can feed a plain map.

use anyhow::{Context, Result};
use std::collections::HashMap;
use tracing::info;

use crate::ocr::OcrProviderKind;

const DEFAULT_GATEWAY_URL: &str = "https://ai.gateway.lovable.dev/v1/chat/completions";
const DEFAULT_MODEL: &str = "google/gemini-3-flash-preview";
const DEFAULT_DIFY_URL: &str = "https://api.dify.ai/v1";
const DEFAULT_TESSERACT_URL: &str = "http://localhost:8884";

/// Supabase project access. Absent means the in-memory store is used.
#[derive(Debug, Clone)]
pub struct SupabaseSettings {
    pub url: String,
    pub service_role_key: String,
    pub storage_bucket: String,
}

#[derive(Debug, Clone)]
pub struct OcrSettings {
    pub provider: OcrProviderKind,
    pub tesseract_url: String,
    pub languages: String,
    pub mistral_api_key: Option<String>,
    pub pdfium_lib_path: Option<String>,
    pub max_pdf_pages: usize,
    pub pdf_scale: f32,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub bind_addr: String,
    pub supabase: Option<SupabaseSettings>,
    pub jwt_secret: Option<String>,
    pub gateway_url: String,
    pub gateway_api_key: Option<String>,
    pub model: String,
    pub dify_url: String,
    pub dify_api_key: Option<String>,
    /// When set, document analysis, chat and translation go to deployed functions.
    pub functions_url: Option<String>,
    /// JSON contact rows loaded into the in-memory directory.
    pub contacts_file: Option<String>,
    pub ocr: OcrSettings,
}

impl Settings {
    /// Read `.env` (if present) and the process environment.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let settings = Self::from_lookup(|key| std::env::var(key).ok())?;
        info!(
            "Settings loaded: bind={}, supabase={}, ocr={:?}, remote functions={}",
            settings.bind_addr,
            settings.supabase.is_some(),
            settings.ocr.provider,
            settings.functions_url.is_some()
        );
        Ok(settings)
    }

    /// Build settings from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let supabase = match (get("SUPABASE_URL"), get("SUPABASE_SERVICE_ROLE_KEY")) {
            (Some(url), Some(service_role_key)) => Some(SupabaseSettings {
                url: url.trim_end_matches('/').to_string(),
                service_role_key,
                storage_bucket: get("STORAGE_BUCKET").unwrap_or_else(|| "documents".to_string()),
            }),
            (Some(_), None) => anyhow::bail!("SUPABASE_URL is set but SUPABASE_SERVICE_ROLE_KEY is not"),
            _ => None,
        };

        let provider = match get("OCR_PROVIDER") {
            Some(name) => OcrProviderKind::from_str(&name)
                .with_context(|| format!("Unknown OCR_PROVIDER: {}", name))?,
            None => OcrProviderKind::Tesseract,
        };

        let max_pdf_pages = match get("OCR_MAX_PDF_PAGES") {
            Some(raw) => raw
                .parse::<usize>()
                .with_context(|| format!("Invalid OCR_MAX_PDF_PAGES: {}", raw))?,
            None => 5,
        };
        if max_pdf_pages == 0 {
            anyhow::bail!("OCR_MAX_PDF_PAGES must be at least 1");
        }

        let pdf_scale = match get("OCR_PDF_SCALE") {
            Some(raw) => raw
                .parse::<f32>()
                .with_context(|| format!("Invalid OCR_PDF_SCALE: {}", raw))?,
            None => 2.0,
        };

        Ok(Self {
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
            supabase,
            jwt_secret: get("SUPABASE_JWT_SECRET"),
            gateway_url: get("AI_GATEWAY_URL").unwrap_or_else(|| DEFAULT_GATEWAY_URL.to_string()),
            gateway_api_key: get("AI_GATEWAY_API_KEY").or_else(|| get("LOVABLE_API_KEY")),
            model: get("AI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            dify_url: get("DIFY_API_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_DIFY_URL.to_string()),
            dify_api_key: get("DIFY_API_KEY"),
            functions_url: get("FUNCTIONS_URL").map(|u| u.trim_end_matches('/').to_string()),
            contacts_file: get("CONTACTS_FILE"),
            ocr: OcrSettings {
                provider,
                tesseract_url: get("TESSERACT_URL")
                    .unwrap_or_else(|| DEFAULT_TESSERACT_URL.to_string()),
                languages: get("OCR_LANGUAGES").unwrap_or_else(|| "eng+nep".to_string()),
                mistral_api_key: get("MISTRAL_API_KEY"),
                pdfium_lib_path: get("PDFIUM_LIB_PATH"),
                max_pdf_pages,
                pdf_scale,
            },
        })
    }

    /// Convenience for tests and tools: settings from a literal key/value list.
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Result<Self> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self::from_lookup(|key| map.get(key).cloned())
    }
}
