//! Error types for the pdfsight library.
//!
//! Every failure carries the pipeline [`Stage`] it belongs to, so callers
//! (and the HTTP surface) can report *where* a request died without parsing
//! message strings. The taxonomy keeps three distinctions the caller cares
//! about:
//!
//! * validation errors — surfaced immediately, never retried, and raised
//!   before any model invocation happens;
//! * `ServiceUnavailable` vs. `StageTimeout` — "try again later" vs.
//!   "this document is too large or slow";
//! * `ExtractionFailed` / `AnalysisFailed` — the model call survived
//!   transport but produced no usable result after exhausting retries.
//!
//! Nothing here is fatal to the process; every error is scoped to one
//! request.

use thiserror::Error;

/// The pipeline stage a request was in when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Upload and model-name validation, including the registry check.
    Validation,
    /// The scan stage: rasterisation and per-page vision extraction.
    Scan,
    /// The analysis stage: language-model summarisation.
    Analysis,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Validation => write!(f, "validation"),
            Stage::Scan => write!(f, "scan"),
            Stage::Analysis => write!(f, "analysis"),
        }
    }
}

/// All errors returned by the pdfsight pipeline.
#[derive(Debug, Error)]
pub enum AnalysisError {
    // ── Validation errors ─────────────────────────────────────────────────
    /// The uploaded file was empty.
    #[error("Uploaded file is empty")]
    EmptyUpload,

    /// The upload does not start with the PDF magic bytes.
    #[error("Uploaded file is not a PDF (first bytes: {magic:?})")]
    NotAPdf { magic: [u8; 4] },

    /// A requested model is not present in the model registry.
    #[error(
        "Model '{model}' for the {stage} stage is not available \
         ({available} models known to the registry)"
    )]
    UnknownModel {
        model: String,
        stage: Stage,
        available: usize,
    },

    /// Configuration rejected at construction time.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Registry errors ───────────────────────────────────────────────────
    /// The model-serving process could not be reached for a registry query.
    #[error("Model registry at '{url}' is unreachable: {detail}")]
    RegistryUnavailable { url: String, detail: String },

    /// The registry responded but the payload could not be understood.
    #[error("Malformed model registry response: {detail}")]
    RegistryError { detail: String },

    // ── Scan-stage errors ─────────────────────────────────────────────────
    /// The PDF could not be opened or contains no pages.
    #[error("Unsupported document: {detail}")]
    UnsupportedDocument { detail: String },

    /// A page's vision extraction failed after all retries.
    #[error("Extraction failed on page {page} after {retries} retries: {detail}")]
    ExtractionFailed {
        page: usize,
        retries: u32,
        detail: String,
    },

    // ── Analysis-stage errors ─────────────────────────────────────────────
    /// The analysis model call failed after all retries.
    #[error("Analysis failed after {retries} retries: {detail}")]
    AnalysisFailed { retries: u32, detail: String },

    // ── Transport / timing ────────────────────────────────────────────────
    /// The model-serving process was unreachable during a pipeline stage.
    #[error("Model service at '{url}' is unavailable during {stage}: {detail}")]
    ServiceUnavailable {
        url: String,
        stage: Stage,
        detail: String,
    },

    /// A whole stage overran its configured deadline.
    #[error("The {stage} stage timed out after {secs}s")]
    StageTimeout { stage: Stage, secs: u64 },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error during a pipeline stage.
    #[error("Internal error during {stage}: {detail}")]
    Internal { stage: Stage, detail: String },
}

impl AnalysisError {
    /// The stage this error belongs to.
    pub fn stage(&self) -> Stage {
        match self {
            AnalysisError::EmptyUpload
            | AnalysisError::NotAPdf { .. }
            | AnalysisError::UnknownModel { .. }
            | AnalysisError::InvalidConfig(_)
            | AnalysisError::RegistryUnavailable { .. }
            | AnalysisError::RegistryError { .. } => Stage::Validation,
            AnalysisError::UnsupportedDocument { .. }
            | AnalysisError::ExtractionFailed { .. } => Stage::Scan,
            AnalysisError::AnalysisFailed { .. } => Stage::Analysis,
            AnalysisError::ServiceUnavailable { stage, .. }
            | AnalysisError::StageTimeout { stage, .. }
            | AnalysisError::Internal { stage, .. } => *stage,
        }
    }

    /// True for errors raised before any model invocation.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            AnalysisError::EmptyUpload
                | AnalysisError::NotAPdf { .. }
                | AnalysisError::UnknownModel { .. }
                | AnalysisError::InvalidConfig(_)
        )
    }
}
