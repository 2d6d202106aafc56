//! Mistral OCR engine (uses Mistral's OCR API).

use super::{OcrEngine, OcrImage, ProgressFn};
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const OCR_ENDPOINT: &str = "https://api.mistral.ai/v1/ocr";

pub struct MistralOcrProvider {
    api_key: String,
    client: reqwest::Client,
}

impl MistralOcrProvider {
    pub fn new(client: reqwest::Client, api_key: String) -> Self {
        Self { api_key, client }
    }
}

// ── Mistral API request/response types ──────────────────────────────────────

#[derive(Serialize)]
struct OcrRequest {
    model: &'static str,
    document: DocumentSource,
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum DocumentSource {
    #[serde(rename = "image_url")]
    Image { image_url: String },
}

#[derive(Deserialize)]
struct OcrResponse {
    pages: Vec<MistralPage>,
}

#[derive(Deserialize)]
struct MistralPage {
    markdown: String,
}

fn data_url(image: &OcrImage) -> String {
    format!(
        "data:{};base64,{}",
        image.mime,
        base64::engine::general_purpose::STANDARD.encode(&image.data)
    )
}

// ── Engine implementation ───────────────────────────────────────────────────

#[async_trait::async_trait]
impl OcrEngine for MistralOcrProvider {
    fn name(&self) -> &str {
        "mistral_ocr"
    }

    async fn recognize(&self, image: &OcrImage, on_progress: ProgressFn<'_>) -> anyhow::Result<String> {
        on_progress(0.0);

        let body = OcrRequest {
            model: "mistral-ocr-latest",
            document: DocumentSource::Image {
                image_url: data_url(image),
            },
        };

        info!("MistralOcrProvider: calling OCR API for {}", image.filename);

        let resp = self
            .client
            .post(OCR_ENDPOINT)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("Mistral OCR API error ({}): {}", status, text);
        }

        let raw_text = resp.text().await?;
        debug!("MistralOcrProvider: raw response ({} bytes)", raw_text.len());
        let ocr: OcrResponse = serde_json::from_str(&raw_text)?;

        let text = ocr
            .pages
            .iter()
            .map(|p| p.markdown.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        on_progress(1.0);
        Ok(text)
    }
}
