//! Tesseract sidecar OCR engine.

use super::{OcrEngine, OcrImage, ProgressFn};
use serde::Deserialize;
use tracing::debug;

/// Sidecar response (private deserialization type).
#[derive(Debug, Deserialize)]
struct RecognizeResponse {
    #[serde(default)]
    text: String,
}

pub struct TesseractProvider {
    url: String,
    languages: String,
    client: reqwest::Client,
}

impl TesseractProvider {
    /// `languages` uses Tesseract's `+` syntax, e.g. `eng+nep`.
    pub fn new(client: reqwest::Client, url: String, languages: String) -> Self {
        Self {
            url,
            languages,
            client,
        }
    }
}

#[async_trait::async_trait]
impl OcrEngine for TesseractProvider {
    fn name(&self) -> &str {
        "tesseract"
    }

    async fn recognize(&self, image: &OcrImage, on_progress: ProgressFn<'_>) -> anyhow::Result<String> {
        use reqwest::multipart::{Form, Part};

        on_progress(0.0);

        let part = Part::bytes(image.data.clone())
            .file_name(image.filename.clone())
            .mime_str(&image.mime)?;
        let form = Form::new()
            .part("file", part)
            .text("languages", self.languages.clone());

        let response = self
            .client
            .post(format!("{}/recognize", self.url))
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Tesseract sidecar error ({}): {}", status, error_text);
        }

        let recognized: RecognizeResponse = response.json().await?;
        debug!(
            "TesseractProvider: {} -> {} chars",
            image.filename,
            recognized.text.chars().count()
        );

        on_progress(1.0);
        Ok(recognized.text)
    }
}
