//! OCR engines, PDF rasterization and the extractor that drives them.
//!
//! Defines the [`OcrEngine`] trait so different OCR backends (Tesseract
//! sidecar, Mistral OCR) can be swapped via configuration.

pub mod extractor;
pub mod mistral;
pub mod pdf;
pub mod progress;
pub mod tesseract;

use std::sync::Arc;

pub use extractor::{Extraction, OcrExtractor, SourceFile, SourceKind};
pub use pdf::{PdfRasterizer, PdfiumRasterizer};
pub use progress::ProgressReporter;

use crate::config::OcrSettings;

/// One image handed to an engine.
#[derive(Debug, Clone)]
pub struct OcrImage {
    pub filename: String,
    pub mime: String,
    pub data: Vec<u8>,
}

/// Per-image progress callback, fraction in `[0, 1]`.
pub type ProgressFn<'a> = &'a (dyn Fn(f32) + Send + Sync);

/// Async trait implemented by each OCR backend.
#[async_trait::async_trait]
pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &str;
    async fn recognize(&self, image: &OcrImage, on_progress: ProgressFn<'_>)
        -> anyhow::Result<String>;
}

/// Known engine identifiers used for configuration lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OcrProviderKind {
    Tesseract,
    MistralOcr,
}

impl OcrProviderKind {
    /// Parse a configuration string into a provider kind.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "tesseract" => Some(Self::Tesseract),
            "mistral_ocr" => Some(Self::MistralOcr),
            _ => None,
        }
    }
}

/// Build the configured engine.
pub fn build_engine(
    settings: &OcrSettings,
    client: reqwest::Client,
) -> anyhow::Result<Arc<dyn OcrEngine>> {
    let engine: Arc<dyn OcrEngine> = match settings.provider {
        OcrProviderKind::Tesseract => Arc::new(tesseract::TesseractProvider::new(
            client,
            settings.tesseract_url.clone(),
            settings.languages.clone(),
        )),
        OcrProviderKind::MistralOcr => {
            let api_key = settings
                .mistral_api_key
                .clone()
                .ok_or_else(|| anyhow::anyhow!("MISTRAL_API_KEY not set"))?;
            Arc::new(mistral::MistralOcrProvider::new(client, api_key))
        }
    };
    tracing::info!("OCR engine: {}", engine.name());
    Ok(engine)
}
