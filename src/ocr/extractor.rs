//! Text extraction from an uploaded image or PDF.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use super::{OcrEngine, OcrImage, PdfRasterizer, ProgressReporter};
use crate::config::OcrSettings;
use crate::error::AidError;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif", "bmp", "tif", "tiff"];

/// A user-supplied file.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub filename: String,
    pub mime: String,
    pub data: Arc<[u8]>,
}

impl SourceFile {
    pub fn new(filename: impl Into<String>, mime: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            mime: mime.into(),
            data: data.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Image,
    Pdf,
}

impl SourceKind {
    /// Classify by MIME type. Generic MIME types fall back to the file extension.
    pub fn classify(mime: &str, filename: &str) -> Result<Self, AidError> {
        let mime = mime.trim().to_ascii_lowercase();
        if mime.starts_with("image/") {
            return Ok(Self::Image);
        }
        if mime == "application/pdf" {
            return Ok(Self::Pdf);
        }
        if mime.is_empty() || mime == "application/octet-stream" {
            let ext = Path::new(filename)
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_ascii_lowercase())
                .unwrap_or_default();
            if ext == "pdf" {
                return Ok(Self::Pdf);
            }
            if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
                return Ok(Self::Image);
            }
        }
        Err(AidError::UnsupportedFormat(if mime.is_empty() {
            filename.to_string()
        } else {
            mime
        }))
    }
}

/// Result of one extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub text: String,
    pub kind: SourceKind,
    pub pages_processed: usize,
    pub total_pages: usize,
}

/// Drives an [`OcrEngine`] over an image, or over the first pages of a PDF.
#[derive(Clone)]
pub struct OcrExtractor {
    engine: Arc<dyn OcrEngine>,
    rasterizer: Arc<dyn PdfRasterizer>,
    max_pdf_pages: usize,
    pdf_scale: f32,
}

impl OcrExtractor {
    pub fn new(engine: Arc<dyn OcrEngine>, rasterizer: Arc<dyn PdfRasterizer>) -> Self {
        Self {
            engine,
            rasterizer,
            max_pdf_pages: 5,
            pdf_scale: 2.0,
        }
    }

    pub fn from_settings(
        engine: Arc<dyn OcrEngine>,
        rasterizer: Arc<dyn PdfRasterizer>,
        settings: &OcrSettings,
    ) -> Self {
        Self {
            max_pdf_pages: settings.max_pdf_pages,
            pdf_scale: settings.pdf_scale,
            ..Self::new(engine, rasterizer)
        }
    }

    /// Extract text, reporting overall progress through `progress`.
    ///
    /// The returned text is trimmed and never empty.
    pub async fn extract(
        &self,
        file: &SourceFile,
        progress: &ProgressReporter,
    ) -> Result<Extraction, AidError> {
        let kind = SourceKind::classify(&file.mime, &file.filename)?;
        progress.report(0.0);

        let (raw, pages_processed, total_pages) = match kind {
            SourceKind::Image => {
                let image = OcrImage {
                    filename: file.filename.clone(),
                    mime: file.mime.clone(),
                    data: file.data.to_vec(),
                };
                let text = self
                    .engine
                    .recognize(&image, &|p| progress.report(p * 100.0))
                    .await
                    .map_err(|e| AidError::OcrFailed(e.to_string()))?;
                (text, 1, 1)
            }
            SourceKind::Pdf => self.extract_pdf(file, progress).await?,
        };

        let text = raw.trim();
        if text.is_empty() {
            warn!("No text recognized in {}", file.filename);
            return Err(AidError::EmptyExtraction);
        }
        progress.finish();

        info!(
            "Extracted {} chars from {} ({}/{} pages)",
            text.chars().count(),
            file.filename,
            pages_processed,
            total_pages
        );
        Ok(Extraction {
            text: text.to_string(),
            kind,
            pages_processed,
            total_pages,
        })
    }

    async fn extract_pdf(
        &self,
        file: &SourceFile,
        progress: &ProgressReporter,
    ) -> Result<(String, usize, usize), AidError> {
        let total = self
            .rasterizer
            .page_count(&file.data)
            .map_err(|e| AidError::OcrFailed(e.to_string()))?;
        let pages = total.min(self.max_pdf_pages);
        if pages < total {
            info!(
                "{} has {} pages, reading the first {}",
                file.filename, total, pages
            );
        }

        let rendered = self
            .rasterizer
            .render_pages(file.data.clone(), pages, self.pdf_scale)
            .await
            .map_err(|e| AidError::OcrFailed(e.to_string()))?;

        let mut text = String::new();
        for (index, png) in rendered.into_iter().enumerate() {
            let image = OcrImage {
                filename: format!("{}-page-{}.png", file.filename, index + 1),
                mime: "image/png".to_string(),
                data: png,
            };

            let share = 100.0 / pages as f32;
            let base = index as f32 * share;
            let page_text = self
                .engine
                .recognize(&image, &|p| progress.report(base + p.clamp(0.0, 1.0) * share))
                .await
                .map_err(|e| AidError::OcrFailed(format!("page {}: {}", index + 1, e)))?;

            text.push_str(&page_text);
            text.push_str("\n\n");
        }

        Ok((text, pages, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Answers with a fixed text per image and reports halfway progress.
    struct ScriptedEngine {
        seen: Mutex<Vec<String>>,
        reply: fn(&OcrImage) -> String,
    }

    impl ScriptedEngine {
        fn new(reply: fn(&OcrImage) -> String) -> Arc<Self> {
            Arc::new(Self {
                seen: Mutex::new(Vec::new()),
                reply,
            })
        }
    }

    #[async_trait::async_trait]
    impl OcrEngine for ScriptedEngine {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn recognize(
            &self,
            image: &OcrImage,
            on_progress: super::super::ProgressFn<'_>,
        ) -> anyhow::Result<String> {
            self.seen.lock().unwrap().push(image.filename.clone());
            on_progress(0.0);
            on_progress(0.5);
            on_progress(1.0);
            Ok((self.reply)(image))
        }
    }

    /// Pretends every input is a PDF with a fixed page count; pages render to their index.
    struct FakeRasterizer {
        pages: usize,
        /// `(count, scale)` of every render call.
        calls: Mutex<Vec<(usize, f32)>>,
    }

    #[async_trait::async_trait]
    impl PdfRasterizer for FakeRasterizer {
        fn page_count(&self, _pdf: &[u8]) -> anyhow::Result<usize> {
            Ok(self.pages)
        }

        async fn render_pages(&self, _pdf: Arc<[u8]>, count: usize, scale: f32) -> anyhow::Result<Vec<Vec<u8>>> {
            self.calls.lock().unwrap().push((count, scale));
            Ok((0..count).map(|index| vec![index as u8]).collect())
        }
    }

    fn rasterizer(pages: usize) -> Arc<FakeRasterizer> {
        Arc::new(FakeRasterizer {
            pages,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn page_text(image: &OcrImage) -> String {
        format!("page {}", image.data[0] + 1)
    }

    fn drain(rx: &mut tokio::sync::mpsc::UnboundedReceiver<u8>) -> Vec<u8> {
        let mut ticks = Vec::new();
        while let Ok(t) = rx.try_recv() {
            ticks.push(t);
        }
        ticks
    }

    #[test]
    fn test_classify() {
        assert_eq!(SourceKind::classify("image/jpeg", "a.jpg").unwrap(), SourceKind::Image);
        assert_eq!(SourceKind::classify("application/pdf", "a").unwrap(), SourceKind::Pdf);
        assert_eq!(
            SourceKind::classify("application/octet-stream", "Contract.PDF").unwrap(),
            SourceKind::Pdf
        );
        assert_eq!(SourceKind::classify("", "photo.png").unwrap(), SourceKind::Image);
        assert!(matches!(
            SourceKind::classify("application/msword", "a.doc"),
            Err(AidError::UnsupportedFormat(_))
        ));
    }

    #[tokio::test]
    async fn test_seven_page_pdf_reads_first_five() {
        let engine = ScriptedEngine::new(page_text);
        let raster = rasterizer(7);
        let extractor = OcrExtractor::new(engine.clone(), raster.clone());
        let (progress, mut rx) = ProgressReporter::channel();

        let file = SourceFile::new("contract.pdf", "application/pdf", vec![0; 8]);
        let result = extractor.extract(&file, &progress).await.unwrap();

        assert_eq!(result.pages_processed, 5);
        assert_eq!(result.total_pages, 7);
        assert_eq!(result.text, "page 1\n\npage 2\n\npage 3\n\npage 4\n\npage 5");
        assert_eq!(engine.seen.lock().unwrap().len(), 5);
        // one render call for all five pages, at twice the page size
        assert_eq!(*raster.calls.lock().unwrap(), vec![(5, 2.0)]);

        let ticks = drain(&mut rx);
        assert!(ticks.windows(2).all(|w| w[0] < w[1]), "{:?}", ticks);
        assert_eq!(ticks.first(), Some(&0));
        assert_eq!(ticks.last(), Some(&100));
        // page boundaries at 20% steps, halfway points in between
        assert!(ticks.contains(&10) && ticks.contains(&20) && ticks.contains(&90));
    }

    #[tokio::test]
    async fn test_short_pdf_reads_every_page() {
        let engine = ScriptedEngine::new(page_text);
        let extractor = OcrExtractor::new(engine.clone(), rasterizer(2));
        let file = SourceFile::new("letter.pdf", "application/pdf", vec![0; 8]);

        let result = extractor.extract(&file, &ProgressReporter::silent()).await.unwrap();
        assert_eq!(result.text, "page 1\n\npage 2");
        assert_eq!(
            *engine.seen.lock().unwrap(),
            vec!["letter.pdf-page-1.png", "letter.pdf-page-2.png"]
        );
    }

    #[tokio::test]
    async fn test_image_progress_and_trim() {
        let engine = ScriptedEngine::new(|_| "  नमस्ते \n".to_string());
        let extractor = OcrExtractor::new(engine, rasterizer(0));
        let (progress, mut rx) = ProgressReporter::channel();

        let file = SourceFile::new("visa.jpg", "image/jpeg", vec![1, 2]);
        let result = extractor.extract(&file, &progress).await.unwrap();

        assert_eq!(result.text, "नमस्ते");
        assert_eq!(result.kind, SourceKind::Image);
        assert_eq!(drain(&mut rx), vec![0, 50, 100]);
    }

    #[tokio::test]
    async fn test_whitespace_only_is_empty_extraction() {
        let engine = ScriptedEngine::new(|_| " \n\t ".to_string());
        let extractor = OcrExtractor::new(engine, rasterizer(3));
        let file = SourceFile::new("blank.pdf", "application/pdf", vec![0]);

        let err = extractor.extract(&file, &ProgressReporter::silent()).await.unwrap_err();
        assert!(matches!(err, AidError::EmptyExtraction));
    }

    #[tokio::test]
    async fn test_unsupported_format_skips_engine() {
        let engine = ScriptedEngine::new(page_text);
        let extractor = OcrExtractor::new(engine.clone(), rasterizer(1));
        let (progress, mut rx) = ProgressReporter::channel();
        let file = SourceFile::new("notes.txt", "text/plain", b"hello".to_vec());

        let err = extractor.extract(&file, &progress).await.unwrap_err();
        assert!(matches!(err, AidError::UnsupportedFormat(_)));
        assert!(engine.seen.lock().unwrap().is_empty());
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_page_limit_from_settings() {
        let settings = crate::config::Settings::from_pairs(&[("OCR_MAX_PDF_PAGES", "2")])
            .unwrap()
            .ocr;
        let engine = ScriptedEngine::new(page_text);
        let extractor = OcrExtractor::from_settings(engine.clone(), rasterizer(9), &settings);
        let file = SourceFile::new("long.pdf", "application/pdf", vec![0]);

        let result = extractor.extract(&file, &ProgressReporter::silent()).await.unwrap();
        assert_eq!(result.pages_processed, 2);
        assert_eq!(engine.seen.lock().unwrap().len(), 2);
    }
}
