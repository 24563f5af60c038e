//! # pdfsight
//!
//! Analyse PDF documents with locally hosted Ollama models.
//!
//! ## Why this crate?
//!
//! Plain text extraction loses everything a PDF carries outside its text
//! layer — diagrams, charts, scanned tables. pdfsight rasterises each page
//! and lets a multimodal vision model read it as a human would, then hands
//! the assembled text to a second language model for summarisation or any
//! caller-supplied instruction. Everything runs against a local model
//! server; no cloud API, no keys.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF bytes
//!  │
//!  ├─ 1. Validate  magic bytes + model names against the registry
//!  ├─ 2. Render    rasterise pages via pdfium (CPU-bound, spawn_blocking)
//!  ├─ 3. Encode    PNG → base64
//!  ├─ 4. Scan      concurrent vision-model calls, reassembled in page order
//!  ├─ 5. Analyze   one language-model call over the assembled text
//!  └─ 6. Output    AnalysisResult { text_content, analysis, page_count, … }
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdfsight::{AnalyzerConfig, AnalysisRequest, PdfAnalyzer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let analyzer = PdfAnalyzer::new(AnalyzerConfig::default())?;
//!
//!     let bytes = std::fs::read("contract.pdf")?;
//!     let result = analyzer
//!         .analyze(
//!             AnalysisRequest::new("contract.pdf", bytes)
//!                 .custom_prompt("List every obligation and its deadline."),
//!         )
//!         .await?;
//!
//!     println!("{} pages", result.page_count);
//!     println!("{}", result.analysis);
//!     Ok(())
//! }
//! ```
//!
//! ## Guarantees
//!
//! * Pages are assembled in strictly increasing page order, regardless of
//!   the order concurrent extractions complete.
//! * `page_count` and `text_content` are reproducible for identical input
//!   against a deterministic scan model; `analysis` may vary when the
//!   analysis model samples non-deterministically.
//! * A request yields either one complete [`AnalysisResult`] or one error
//!   naming the failed stage — never a partial result.
//! * Unknown model names fail validation before any extraction or analysis
//!   call is made.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyzer;
pub mod backend;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod registry;

#[cfg(feature = "server")]
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyzer::{PdfAnalyzer, RequestState};
pub use backend::{BackendError, GenerateRequest, MockBackend, ModelBackend, OllamaBackend};
pub use config::{AnalyzerConfig, AnalyzerConfigBuilder};
pub use error::{AnalysisError, Stage};
pub use output::{
    AnalysisRequest, AnalysisResult, DocumentText, ModelDescriptor, PageExtraction,
};
pub use progress::{AnalysisProgressCallback, ProgressCallback};
