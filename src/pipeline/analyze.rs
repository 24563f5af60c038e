//! Analysis stage: one language-model call over the assembled document
//! text.
//!
//! ## Oversized documents
//!
//! Local models have practical input limits well below "every page of a
//! 400-page scan". Rather than guessing a chunking scheme, the policy is
//! deterministic truncation: the first `max_analysis_chars` characters are
//! sent, with an explicit marker line appended so neither the model nor the
//! caller mistakes a truncated document for a complete one. Tests can
//! assert exactly where the cut lands.
//!
//! Retry behaviour mirrors the scan stage: transient failures back off
//! exponentially up to `max_retries`, permanent failures surface at once.

use crate::backend::{BackendError, GenerateRequest, ModelBackend};
use crate::config::AnalyzerConfig;
use crate::error::{AnalysisError, Stage};
use crate::prompts::{analysis_prompt, truncation_marker, DEFAULT_ANALYSIS_INSTRUCTION};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

/// Trim the document text to the analysis input budget.
///
/// Counts characters, not bytes, so the cut never lands inside a UTF-8
/// sequence. Unchanged input passes through verbatim.
pub fn prepare_input(document_text: &str, max_chars: usize) -> String {
    let total = document_text.chars().count();
    if total <= max_chars {
        return document_text.to_string();
    }

    let truncated: String = document_text.chars().take(max_chars).collect();
    format!(
        "{}\n\n{}",
        truncated,
        truncation_marker(max_chars, total)
    )
}

/// Run the analysis model over the document text.
pub async fn analyze_text(
    backend: &Arc<dyn ModelBackend>,
    document_text: &str,
    model: &str,
    custom_prompt: Option<&str>,
    config: &AnalyzerConfig,
) -> Result<String, AnalysisError> {
    let instruction = custom_prompt.unwrap_or(DEFAULT_ANALYSIS_INSTRUCTION);
    let input = prepare_input(document_text, config.max_analysis_chars);
    let prompt = analysis_prompt(instruction, &input);

    let request = GenerateRequest {
        model: model.to_string(),
        prompt,
        system: None,
        images: Vec::new(),
        temperature: config.temperature,
        max_tokens: config.max_tokens,
    };

    let mut last_err: Option<BackendError> = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = config.retry_backoff_ms * 2u64.pow(attempt - 1);
            warn!(
                "Analysis: retry {}/{} after {}ms",
                attempt, config.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        match backend.generate(&request).await {
            Ok(analysis) => {
                debug!("Analysis produced {} chars", analysis.len());
                return Ok(analysis);
            }
            Err(e) => {
                warn!("Analysis: attempt {} failed — {}", attempt + 1, e);
                let transient = e.is_transient();
                last_err = Some(e);
                if !transient {
                    break;
                }
            }
        }
    }

    let err = last_err.unwrap_or(BackendError::MalformedResponse {
        detail: "no attempts made".into(),
    });
    Err(match err {
        BackendError::Unavailable { url, detail } => AnalysisError::ServiceUnavailable {
            url,
            stage: Stage::Analysis,
            detail,
        },
        other => AnalysisError::AnalysisFailed {
            retries: config.max_retries,
            detail: other.to_string(),
        },
    })
}
