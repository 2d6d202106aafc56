//! Document ingestion: upload → ocr → analysis → result.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::AidError;
use crate::ocr::{Extraction, OcrExtractor, ProgressReporter, SourceFile, SourceKind};
use crate::schema::{Document, DocumentAnalysis, NewDocument};
use crate::services::{AnalyzeRequest, DocumentAnalyzer};
use crate::store::DocumentStore;

/// Longest slice of extracted text forwarded to the chat backend.
const CONTEXT_EXCERPT_CHARS: usize = 4000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Upload,
    Ocr,
    Analysis,
    Result,
}

/// Everything the result view shows.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub filename: String,
    pub text: String,
    pub analysis: DocumentAnalysis,
    pub pages_processed: usize,
    pub total_pages: usize,
    /// Set when the document row was saved.
    pub document_id: Option<String>,
    pub storage_path: Option<String>,
}

/// A document handed to the chat as conversational context.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentContext {
    pub filename: String,
    pub text: String,
    pub analysis: DocumentAnalysis,
}

impl DocumentContext {
    /// Rebuild the context from a saved document row.
    pub fn from_document(document: &Document) -> Self {
        Self {
            filename: document.original_filename.clone().unwrap_or_default(),
            text: document.ocr_text.clone().unwrap_or_default(),
            analysis: DocumentAnalysis {
                doc_type: document.doc_type.clone().unwrap_or_else(|| "other".to_string()),
                summary: document.analysis.clone().unwrap_or_default(),
                clarity_score: document.clarity_score.unwrap_or(50).min(100),
                red_flags: document.red_flags.clone(),
                questions_to_ask: Vec::new(),
            },
        }
    }

    /// Compact plain-text form sent alongside chat messages.
    pub fn render(&self) -> String {
        let mut out = format!(
            "कागजात: {}\nप्रकार: {}\nसारांश: {}\nस्पष्टता स्कोर: {}/100\n",
            self.filename,
            self.analysis.doc_type_label(),
            self.analysis.summary,
            self.analysis.clarity_score
        );
        if !self.analysis.red_flags.is_empty() {
            out.push_str("रातो झण्डाहरू:\n");
            for flag in &self.analysis.red_flags {
                out.push_str("- ");
                out.push_str(flag);
                out.push('\n');
            }
        }
        let excerpt: String = self.text.chars().take(CONTEXT_EXCERPT_CHARS).collect();
        out.push_str("\nकागजातको पाठ:\n");
        out.push_str(&excerpt);
        out
    }
}

/// One pipeline per upload view. Not re-entrant: `submit` takes `&mut self`.
pub struct DocumentPipeline {
    extractor: OcrExtractor,
    analyzer: Arc<dyn DocumentAnalyzer>,
    documents: Arc<dyn DocumentStore>,
    user_id: Option<String>,
    chat_id: Option<String>,
    stage: Stage,
    result: Option<PipelineResult>,
}

impl DocumentPipeline {
    pub fn new(
        extractor: OcrExtractor,
        analyzer: Arc<dyn DocumentAnalyzer>,
        documents: Arc<dyn DocumentStore>,
    ) -> Self {
        Self {
            extractor,
            analyzer,
            documents,
            user_id: None,
            chat_id: None,
            stage: Stage::Upload,
            result: None,
        }
    }

    /// Owner of saved documents. Without one nothing is saved.
    pub fn with_user(mut self, user_id: Option<String>) -> Self {
        self.user_id = user_id;
        self
    }

    /// Chat the next saved document is linked to.
    pub fn set_chat(&mut self, chat_id: Option<String>) {
        self.chat_id = chat_id;
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn result(&self) -> Option<&PipelineResult> {
        self.result.as_ref()
    }

    /// Run a file through OCR and analysis, then save it.
    ///
    /// Submitting from `Result` starts over. Any failure returns the pipeline
    /// to `Upload` with nothing retained; `AidError::user_message` is the
    /// notice to show.
    pub async fn submit(
        &mut self,
        file: SourceFile,
        progress: &ProgressReporter,
    ) -> Result<&PipelineResult, AidError> {
        if self.stage == Stage::Result {
            self.scan_another();
        }
        SourceKind::classify(&file.mime, &file.filename).map_err(|e| {
            warn!("Rejected upload {}: {}", file.filename, e);
            e
        })?;

        self.stage = Stage::Ocr;
        debug!("Pipeline: ocr {}", file.filename);
        let extraction = match self.extractor.extract(&file, progress).await {
            Ok(extraction) => extraction,
            Err(e) => {
                debug!("OCR of {} stopped at {}%", file.filename, progress.current().unwrap_or(0));
                return Err(self.fail(e));
            }
        };

        self.stage = Stage::Analysis;
        debug!(
            "Pipeline: analysis of {:?} text ({} chars)",
            extraction.kind,
            extraction.text.len()
        );
        let request = AnalyzeRequest {
            ocr_text: extraction.text.clone(),
            document_type: None,
        };
        let analysis = match self.analyzer.analyze(&request).await {
            Ok(analysis) => analysis,
            Err(e) => return Err(self.fail(e)),
        };

        let (document_id, storage_path) = self.persist(&file, &extraction, &analysis).await;

        self.stage = Stage::Result;
        info!(
            "Document {} analysed as {} (clarity {})",
            file.filename, analysis.doc_type, analysis.clarity_score
        );
        let result = self.result.insert(PipelineResult {
            filename: file.filename,
            text: extraction.text,
            analysis,
            pages_processed: extraction.pages_processed,
            total_pages: extraction.total_pages,
            document_id,
            storage_path,
        });
        Ok(&*result)
    }

    /// "Ask about this document": the context for the chat view.
    pub fn ask_about(&self) -> Option<DocumentContext> {
        self.result.as_ref().map(|r| DocumentContext {
            filename: r.filename.clone(),
            text: r.text.clone(),
            analysis: r.analysis.clone(),
        })
    }

    /// "Scan another": back to `Upload` with nothing retained.
    pub fn scan_another(&mut self) {
        self.stage = Stage::Upload;
        self.result = None;
    }

    fn fail(&mut self, error: AidError) -> AidError {
        warn!("Pipeline failed during {:?}: {}", self.stage, error);
        self.scan_another();
        error
    }

    /// Best effort: failures are logged and leave the ids unset.
    async fn persist(
        &self,
        file: &SourceFile,
        extraction: &Extraction,
        analysis: &DocumentAnalysis,
    ) -> (Option<String>, Option<String>) {
        let Some(user_id) = self.user_id.as_deref() else {
            debug!("No signed-in user, {} is not saved", file.filename);
            return (None, None);
        };

        let storage_path = match self
            .documents
            .upload_original(user_id, &file.filename, &file.mime, &file.data)
            .await
        {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("Could not store original {}: {}", file.filename, e);
                None
            }
        };

        let row = NewDocument {
            user_id: user_id.to_string(),
            chat_id: self.chat_id.clone(),
            original_filename: file.filename.clone(),
            ocr_text: extraction.text.clone(),
            doc_type: analysis.doc_type.clone(),
            clarity_score: analysis.clarity_score,
            red_flags: analysis.red_flags.clone(),
            analysis: analysis.summary.clone(),
            storage_path: storage_path.clone(),
        };
        match self.documents.insert_document(row).await {
            Ok(document) => (Some(document.id), storage_path),
            Err(e) => {
                warn!("Could not save document {}: {}", file.filename, e);
                (None, storage_path)
            }
        }
    }
}
