//! Pipeline orchestrator: validation, stage sequencing, and result
//! assembly.
//!
//! [`PdfAnalyzer`] owns the configuration and the model backend, both
//! injected at construction — there is no ambient state to leak between
//! tests or requests. Each call to [`PdfAnalyzer::analyze`] walks one
//! request through the state machine
//!
//! ```text
//! Received → Validating → Extracting → Analyzing → Completed
//!                  │            │           │
//!                  └────────────┴───────────┴──▶ Failed(stage)
//! ```
//!
//! Terminal states are never left. Validation failures make zero model
//! calls beyond the registry query; an extraction failure means the
//! analyzer is never invoked; an analysis failure discards the extraction
//! output so the caller sees either a complete [`AnalysisResult`] or a
//! single error, never a partial result.

use crate::backend::{ModelBackend, OllamaBackend};
use crate::config::AnalyzerConfig;
use crate::error::{AnalysisError, Stage};
use crate::output::{AnalysisRequest, AnalysisResult, ModelDescriptor};
use crate::pipeline::{analyze, encode, render, scan};
use crate::progress::ProgressCallback;
use crate::registry;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, info, trace};

/// Where a request currently is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Received,
    Validating,
    Extracting,
    Analyzing,
    Completed,
    Failed(Stage),
}

impl RequestState {
    /// Terminal states admit no further transition.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestState::Completed | RequestState::Failed(_))
    }

    fn advance(&mut self, next: RequestState) {
        debug_assert!(!self.is_terminal(), "transition out of terminal state");
        trace!("request state: {:?} -> {:?}", self, next);
        *self = next;
    }
}

/// The document-analysis pipeline.
///
/// # Example
/// ```rust,no_run
/// use pdfsight::{AnalyzerConfig, AnalysisRequest, PdfAnalyzer};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let analyzer = PdfAnalyzer::new(AnalyzerConfig::default())?;
/// let bytes = std::fs::read("report.pdf")?;
/// let result = analyzer
///     .analyze(AnalysisRequest::new("report.pdf", bytes))
///     .await?;
/// println!("{}", result.analysis);
/// # Ok(())
/// # }
/// ```
pub struct PdfAnalyzer {
    config: AnalyzerConfig,
    backend: Arc<dyn ModelBackend>,
    progress: Option<ProgressCallback>,
}

impl PdfAnalyzer {
    /// Create an analyzer talking to the Ollama instance named in `config`.
    pub fn new(config: AnalyzerConfig) -> Result<Self, AnalysisError> {
        let backend = OllamaBackend::new(&config.ollama_base_url, config.request_timeout_secs)
            .map_err(|e| AnalysisError::Internal {
                stage: Stage::Validation,
                detail: e.to_string(),
            })?;
        Ok(Self {
            config,
            backend: Arc::new(backend),
            progress: None,
        })
    }

    /// Create an analyzer over an explicit backend. Tests use this to run
    /// the whole pipeline against [`crate::backend::MockBackend`].
    pub fn with_backend(config: AnalyzerConfig, backend: Arc<dyn ModelBackend>) -> Self {
        Self {
            config,
            backend,
            progress: None,
        }
    }

    /// Attach a progress callback.
    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    /// The configuration this analyzer was built with.
    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Query the model registry for the currently available models.
    ///
    /// Fetched fresh on every call; the registry may change between
    /// queries and nothing is cached here.
    pub async fn list_models(&self) -> Result<Vec<ModelDescriptor>, AnalysisError> {
        registry::list_models(self.backend.as_ref()).await
    }

    /// Run one request through the full pipeline.
    pub async fn analyze(
        &self,
        request: AnalysisRequest,
    ) -> Result<AnalysisResult, AnalysisError> {
        let started = Instant::now();
        let mut state = RequestState::Received;
        info!("Analysing '{}' ({} bytes)", request.filename, request.file.len());

        let result = self.run(&mut state, request).await;

        match &result {
            Ok(r) => {
                state.advance(RequestState::Completed);
                if let Some(cb) = &self.progress {
                    cb.on_complete(Ok(r.analysis.len()));
                }
                info!(
                    "Completed '{}': {} pages, {}ms",
                    r.filename,
                    r.page_count,
                    started.elapsed().as_millis()
                );
            }
            Err(e) => {
                if !state.is_terminal() {
                    state.advance(RequestState::Failed(e.stage()));
                }
                if let Some(cb) = &self.progress {
                    cb.on_complete(Err(&e.stage().to_string()));
                }
                info!("Failed in {} stage: {e}", e.stage());
            }
        }

        result
    }

    async fn run(
        &self,
        state: &mut RequestState,
        request: AnalysisRequest,
    ) -> Result<AnalysisResult, AnalysisError> {
        // ── Validation ───────────────────────────────────────────────────
        state.advance(RequestState::Validating);
        validate_upload(&request.file)?;

        let scan_model = resolve_model(&request.scan_model, &self.config.default_scan_model);
        let analysis_model =
            resolve_model(&request.analysis_model, &self.config.default_analysis_model);

        // One registry query validates both identifiers before any
        // extraction work is committed.
        let available = registry::list_models(self.backend.as_ref()).await?;
        registry::validate_model(&scan_model, &available, Stage::Scan)?;
        registry::validate_model(&analysis_model, &available, Stage::Analysis)?;
        debug!("Models validated: scan={scan_model}, analysis={analysis_model}");

        // ── Scan stage ───────────────────────────────────────────────────
        state.advance(RequestState::Extracting);
        let scan_deadline = Duration::from_secs(self.config.scan_timeout_secs);
        let document = timeout(scan_deadline, async {
            let (rendered, page_count) =
                render::render_pages(request.file, self.config.max_rendered_pixels).await?;

            if let Some(cb) = &self.progress {
                cb.on_scan_start(page_count);
            }

            let mut pages = Vec::with_capacity(rendered.len());
            for (idx, img) in &rendered {
                let page = encode::encode_page(*idx, img).map_err(|e| {
                    AnalysisError::Internal {
                        stage: Stage::Scan,
                        detail: format!("image encoding failed on page {}: {e}", idx + 1),
                    }
                })?;
                pages.push(page);
            }

            scan::scan_pages(
                &self.backend,
                pages,
                page_count,
                &scan_model,
                &self.config,
                self.progress.as_ref(),
            )
            .await
        })
        .await
        .map_err(|_| AnalysisError::StageTimeout {
            stage: Stage::Scan,
            secs: self.config.scan_timeout_secs,
        })??;

        if document.pages.iter().all(|p| p.text.is_empty()) {
            return Err(AnalysisError::UnsupportedDocument {
                detail: "no extractable content in any page".into(),
            });
        }

        let text_content = document.assemble();

        // ── Analysis stage ───────────────────────────────────────────────
        state.advance(RequestState::Analyzing);
        if let Some(cb) = &self.progress {
            cb.on_analysis_start();
        }

        let analysis_deadline = Duration::from_secs(self.config.analysis_timeout_secs);
        let analysis = timeout(
            analysis_deadline,
            analyze::analyze_text(
                &self.backend,
                &text_content,
                &analysis_model,
                request.custom_prompt.as_deref(),
                &self.config,
            ),
        )
        .await
        .map_err(|_| AnalysisError::StageTimeout {
            stage: Stage::Analysis,
            secs: self.config.analysis_timeout_secs,
        })??;

        Ok(AnalysisResult {
            filename: request.filename,
            text_content,
            analysis,
            scan_model_used: scan_model,
            analysis_model_used: analysis_model,
            page_count: document.page_count,
        })
    }
}

/// Reject uploads that cannot possibly be a PDF.
fn validate_upload(file: &[u8]) -> Result<(), AnalysisError> {
    if file.is_empty() {
        return Err(AnalysisError::EmptyUpload);
    }
    let mut magic = [0u8; 4];
    let n = file.len().min(4);
    magic[..n].copy_from_slice(&file[..n]);
    if &magic != b"%PDF" {
        return Err(AnalysisError::NotAPdf { magic });
    }
    Ok(())
}

/// A requested model that is absent or blank resolves to the configured
/// default.
fn resolve_model(requested: &Option<String>, default: &str) -> String {
    match requested.as_deref().map(str::trim) {
        Some(m) if !m.is_empty() => m.to_string(),
        _ => default.to_string(),
    }
}
