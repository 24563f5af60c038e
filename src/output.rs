//! Request and result types for one pipeline invocation.
//!
//! One [`AnalysisRequest`] produces exactly one ordered sequence of
//! [`PageExtraction`]s, which reduces to one [`DocumentText`], which —
//! together with the request's custom prompt — yields one
//! [`AnalysisResult`]. None of these outlive the request that created
//! them; the pipeline is stateless between invocations.

use serde::{Deserialize, Serialize};

/// A single pipeline invocation's input.
///
/// `scan_model` and `analysis_model` are optional; the orchestrator
/// substitutes the configured defaults before validation. The file must be
/// a non-empty PDF — checked by the orchestrator, not at construction.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    /// Original filename, echoed back in the result.
    pub filename: String,
    /// Raw PDF bytes.
    pub file: Vec<u8>,
    /// Vision model for the scan stage. `None` selects the configured default.
    pub scan_model: Option<String>,
    /// Language model for the analysis stage. `None` selects the configured default.
    pub analysis_model: Option<String>,
    /// Caller-supplied analysis instruction. `None` selects the built-in
    /// summarisation instruction.
    pub custom_prompt: Option<String>,
}

impl AnalysisRequest {
    /// A request for `file` with every model left at its default.
    pub fn new(filename: impl Into<String>, file: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            file,
            scan_model: None,
            analysis_model: None,
            custom_prompt: None,
        }
    }

    pub fn scan_model(mut self, model: impl Into<String>) -> Self {
        self.scan_model = Some(model.into());
        self
    }

    pub fn analysis_model(mut self, model: impl Into<String>) -> Self {
        self.analysis_model = Some(model.into());
        self
    }

    pub fn custom_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.custom_prompt = Some(prompt.into());
        self
    }
}

/// The vision model's transcription of one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageExtraction {
    /// 0-based page index. Assembly order is strictly increasing in this
    /// field regardless of the order extractions complete.
    pub page_index: usize,
    /// Plain-text transcription, including textual descriptions of
    /// diagrams and tables.
    pub text: String,
}

/// The assembled output of the scan stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentText {
    /// Per-page extractions in increasing `page_index` order.
    pub pages: Vec<PageExtraction>,
    /// Total pages in the source document.
    pub page_count: usize,
}

impl DocumentText {
    /// Join the page texts into one document string with deterministic
    /// `--- Page N ---` markers (1-indexed, matching what readers expect
    /// from page numbering).
    ///
    /// Identical page extractions always produce byte-identical output, so
    /// `text_content` is reproducible whenever the scan backend is
    /// deterministic.
    pub fn assemble(&self) -> String {
        let mut out = String::new();
        for page in &self.pages {
            if !out.is_empty() {
                out.push_str("\n\n");
            }
            out.push_str(&format!("--- Page {} ---\n", page.page_index + 1));
            out.push_str(page.text.trim_end());
        }
        out
    }
}

/// The terminal, immutable output of one pipeline invocation.
///
/// Field names are the crate's wire contract: the HTTP surface serialises
/// this struct as-is.
///
/// `page_count` and `text_content` are reproducible for identical input
/// bytes against a deterministic scan backend; `analysis` may legitimately
/// vary when the analysis backend samples non-deterministically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub filename: String,
    pub text_content: String,
    pub analysis: String,
    pub scan_model_used: String,
    pub analysis_model_used: String,
    pub page_count: usize,
}

/// One model known to the registry.
///
/// Fetched fresh on every registry query and never cached across requests;
/// the registry is the source of truth and may change between calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Model identifier, e.g. `gemma3:4b`.
    pub name: String,
    /// Whatever else the registry reports about the model (size, digest,
    /// family details). Opaque to the pipeline.
    #[serde(flatten)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}
