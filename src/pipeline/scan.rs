//! Scan stage: convert encoded page images to text via the vision model.
//!
//! Pages are embarrassingly parallel, so they run through a bounded
//! `buffer_unordered` pool sized by `scan_concurrency`. Completion order is
//! whatever the model service makes of it; reassembly sorts strictly by
//! page index, so the assembled document is identical no matter which page
//! finished first.
//!
//! ## Retry strategy
//!
//! Transient failures (connection refused, timeout, 429/5xx) are retried
//! with exponential backoff: `retry_backoff_ms * 2^(attempt-1)`, so the
//! default 500 ms base gives 500 ms → 1 s → 2 s. Permanent failures (4xx,
//! undecodable body) surface immediately.
//!
//! ## Partial pages
//!
//! If any single page fails irrecoverably the whole extraction fails.
//! Downstream analysis assumes document completeness; a summary of
//! three-quarters of a contract is worse than no summary.

use crate::backend::{BackendError, GenerateRequest, ModelBackend};
use crate::config::AnalyzerConfig;
use crate::error::{AnalysisError, Stage};
use crate::output::{DocumentText, PageExtraction};
use crate::pipeline::cleanup;
use crate::pipeline::encode::PageImage;
use crate::progress::ProgressCallback;
use crate::prompts::DEFAULT_SCAN_PROMPT;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

/// Extract text from every page, concurrently, and reassemble in page
/// order.
pub async fn scan_pages(
    backend: &Arc<dyn ModelBackend>,
    pages: Vec<PageImage>,
    page_count: usize,
    model: &str,
    config: &AnalyzerConfig,
    progress: Option<&ProgressCallback>,
) -> Result<DocumentText, AnalysisError> {
    let total = pages.len();

    let mut results: Vec<Result<PageExtraction, (usize, AnalysisError)>> =
        stream::iter(pages.into_iter().map(|page| {
            let backend = Arc::clone(backend);
            let model = model.to_string();
            let config = config.clone();
            let progress = progress.cloned();
            async move {
                let page_num = page.page_index + 1;
                let result = extract_page(&backend, page, &model, &config).await;
                if let (Some(cb), Ok(extraction)) = (&progress, &result) {
                    cb.on_page_complete(page_num, total, extraction.text.len());
                }
                result.map_err(|e| (page_num, e))
            }
        }))
        .buffer_unordered(config.scan_concurrency)
        .collect()
        .await;

    // Surface the lowest-numbered page's failure so the error is
    // deterministic regardless of completion order. Every failure carries
    // its page number here, even variants that don't record one.
    let mut failures: Vec<(usize, AnalysisError)> = Vec::new();
    let mut extractions: Vec<PageExtraction> = Vec::new();
    for result in results.drain(..) {
        match result {
            Ok(extraction) => extractions.push(extraction),
            Err(failure) => failures.push(failure),
        }
    }
    if !failures.is_empty() {
        failures.sort_by_key(|(page_num, _)| *page_num);
        return Err(failures.remove(0).1);
    }

    extractions.sort_by_key(|p| p.page_index);

    Ok(DocumentText {
        pages: extractions,
        page_count,
    })
}

/// Drive the vision model for one page, retrying transient failures.
async fn extract_page(
    backend: &Arc<dyn ModelBackend>,
    page: PageImage,
    model: &str,
    config: &AnalyzerConfig,
) -> Result<PageExtraction, AnalysisError> {
    let page_num = page.page_index + 1;
    let prompt = config.scan_prompt.as_deref().unwrap_or(DEFAULT_SCAN_PROMPT);

    let request = GenerateRequest {
        model: model.to_string(),
        prompt: prompt.to_string(),
        system: None,
        images: vec![page.base64_png],
        temperature: config.temperature,
        max_tokens: config.max_tokens,
    };

    let mut last_err: Option<BackendError> = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = config.retry_backoff_ms * 2u64.pow(attempt - 1);
            warn!(
                "Page {}: retry {}/{} after {}ms",
                page_num, attempt, config.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        match backend.generate(&request).await {
            Ok(text) => {
                debug!("Page {}: extracted {} chars", page_num, text.len());
                return Ok(PageExtraction {
                    page_index: page.page_index,
                    text: cleanup::clean_text(&text),
                });
            }
            Err(e) => {
                warn!("Page {}: attempt {} failed — {}", page_num, attempt + 1, e);
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
            stage: Stage::Scan,
            detail,
        },
        other => AnalysisError::ExtractionFailed {
            page: page_num,
            retries: config.max_retries,
            detail: other.to_string(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;

    fn fake_pages(n: usize) -> Vec<PageImage> {
        (0..n)
            .map(|i| PageImage {
                page_index: i,
                base64_png: format!("cGFnZQ=={i}"),
            })
            .collect()
    }

    fn config() -> AnalyzerConfig {
        AnalyzerConfig::builder()
            .scan_concurrency(4)
            .max_retries(1)
            .retry_backoff_ms(1)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn pages_reassemble_in_index_order_despite_completion_order() {
        // First-submitted pages answer slowest, so completion order is
        // reversed relative to page order.
        let backend: Arc<dyn ModelBackend> = Arc::new(
            MockBackend::new(&["qwen2.5vl:latest"])
                .with_handler(|i, _| Ok(format!("text of page {i}")))
                .with_delays_ms(vec![60, 40, 20, 1]),
        );

        let doc = scan_pages(
            &backend,
            fake_pages(4),
            4,
            "qwen2.5vl:latest",
            &config(),
            None,
        )
        .await
        .unwrap();

        let indices: Vec<usize> = doc.pages.iter().map(|p| p.page_index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
        assert_eq!(doc.pages[2].text, "text of page 2");
        assert_eq!(doc.page_count, 4);
    }

    #[tokio::test]
    async fn single_page_failure_fails_the_whole_extraction() {
        let backend: Arc<dyn ModelBackend> =
            Arc::new(MockBackend::new(&["m"]).with_handler(|i, _| {
                if i == 1 {
                    Err(BackendError::Api {
                        status: 400,
                        body: "bad image".into(),
                    })
                } else {
                    Ok("fine".into())
                }
            }));

        let err = scan_pages(&backend, fake_pages(3), 3, "m", &config(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::ExtractionFailed { page: 2, .. }));
    }

    #[tokio::test]
    async fn lowest_page_transport_failure_wins_regardless_of_completion_order() {
        // Both pages fail with a transport error (which carries no page
        // number of its own); page 2 answers first. The surfaced error
        // must still be page 1's.
        let backend: Arc<dyn ModelBackend> = Arc::new(
            MockBackend::new(&["m"])
                .with_handler(|i, _| {
                    Err(BackendError::Unavailable {
                        url: format!("http://localhost:11434/call-{i}"),
                        detail: "refused".into(),
                    })
                })
                .with_delays_ms(vec![50, 1]),
        );

        let no_retry = AnalyzerConfig::builder()
            .scan_concurrency(2)
            .max_retries(0)
            .build()
            .unwrap();

        let err = scan_pages(&backend, fake_pages(2), 2, "m", &no_retry, None)
            .await
            .unwrap_err();
        match err {
            AnalysisError::ServiceUnavailable { url, .. } => {
                assert_eq!(url, "http://localhost:11434/call-0");
            }
            other => panic!("expected ServiceUnavailable, got {other}"),
        }
    }

    #[tokio::test]
    async fn transient_failure_is_retried_then_succeeds() {
        let backend = Arc::new(MockBackend::new(&["m"]).with_handler(|i, _| {
            if i == 0 {
                Err(BackendError::Api {
                    status: 503,
                    body: "loading model".into(),
                })
            } else {
                Ok("recovered".into())
            }
        }));
        let dyn_backend: Arc<dyn ModelBackend> = backend.clone();

        let doc = scan_pages(&dyn_backend, fake_pages(1), 1, "m", &config(), None)
            .await
            .unwrap();
        assert_eq!(doc.pages[0].text, "recovered");
        assert_eq!(backend.generate_calls(), 2);
    }

    #[tokio::test]
    async fn permanent_failure_is_not_retried() {
        let backend = Arc::new(MockBackend::new(&["m"]).with_handler(|_, _| {
            Err(BackendError::Api {
                status: 404,
                body: "no such model".into(),
            })
        }));
        let dyn_backend: Arc<dyn ModelBackend> = backend.clone();

        let err = scan_pages(&dyn_backend, fake_pages(1), 1, "m", &config(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::ExtractionFailed { .. }));
        assert_eq!(backend.generate_calls(), 1);
    }

    #[tokio::test]
    async fn scan_requests_carry_the_page_image() {
        let backend = Arc::new(MockBackend::new(&["m"]));
        let dyn_backend: Arc<dyn ModelBackend> = backend.clone();

        scan_pages(&dyn_backend, fake_pages(1), 1, "m", &config(), None)
            .await
            .unwrap();

        let requests = backend.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].images.len(), 1);
        assert_eq!(requests[0].model, "m");
        assert!(requests[0].prompt.contains("Transcribe"));
    }
}
