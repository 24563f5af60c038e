//! Integration tests for the scan and analysis stages, driven through a
//! scriptable mock backend. No model server or PDF renderer is needed;
//! everything here runs in CI.

use pdfsight::backend::{BackendError, MockBackend, ModelBackend};
use pdfsight::pipeline::analyze::analyze_text;
use pdfsight::pipeline::encode::PageImage;
use pdfsight::pipeline::scan::scan_pages;
use pdfsight::prompts::TRUNCATION_MARKER_PREFIX;
use pdfsight::{
    AnalysisError, AnalysisProgressCallback, AnalysisRequest, AnalyzerConfig, PdfAnalyzer, Stage,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

fn page_images(n: usize) -> Vec<PageImage> {
    (0..n)
        .map(|i| PageImage {
            page_index: i,
            base64_png: format!("cGFnZQ=={i}"),
        })
        .collect()
}

fn config() -> AnalyzerConfig {
    AnalyzerConfig::builder()
        .scan_concurrency(3)
        .max_retries(0)
        .retry_backoff_ms(1)
        .build()
        .unwrap()
}

// ── Scan stage through to document assembly ──────────────────────────────

#[tokio::test]
async fn assembled_document_is_page_ordered_under_concurrency() {
    // Each call answers with text identifying its submission index; later
    // pages answer faster than earlier ones.
    let backend = Arc::new(
        MockBackend::new(&["vision:latest"])
            .with_handler(|i, _| Ok(format!("content of page {}", i + 1)))
            .with_delays_ms(vec![80, 40, 10]),
    ) as Arc<dyn ModelBackend>;

    let document = scan_pages(&backend, page_images(3), 3, "vision:latest", &config(), None)
        .await
        .unwrap();

    let text = document.assemble();
    let p1 = text.find("--- Page 1 ---").unwrap();
    let p2 = text.find("--- Page 2 ---").unwrap();
    let p3 = text.find("--- Page 3 ---").unwrap();
    assert!(p1 < p2 && p2 < p3, "markers out of order:\n{text}");
    assert!(text.contains("content of page 1"));
    assert!(text.contains("content of page 3"));
}

#[tokio::test]
async fn scan_output_is_reproducible_for_identical_input() {
    // Two runs over the same pages against an identically scripted
    // backend, with different completion orders, must yield byte-identical
    // assembled text and the same page count.
    let script = |i: usize, _: &pdfsight::GenerateRequest| -> Result<String, BackendError> {
        Ok(format!("page text {}", i + 1))
    };

    let first = Arc::new(
        MockBackend::new(&["vision:latest"])
            .with_handler(script)
            .with_delays_ms(vec![30, 20, 10]),
    ) as Arc<dyn ModelBackend>;
    let second = Arc::new(
        MockBackend::new(&["vision:latest"])
            .with_handler(script)
            .with_delays_ms(vec![10, 20, 30]),
    ) as Arc<dyn ModelBackend>;

    let doc_a = scan_pages(&first, page_images(3), 3, "vision:latest", &config(), None)
        .await
        .unwrap();
    let doc_b = scan_pages(&second, page_images(3), 3, "vision:latest", &config(), None)
        .await
        .unwrap();

    assert_eq!(doc_a.assemble(), doc_b.assemble());
    assert_eq!(doc_a.page_count, doc_b.page_count);
}

#[tokio::test]
async fn fenced_page_output_is_cleaned_before_assembly() {
    let backend = Arc::new(
        MockBackend::new(&["vision:latest"])
            .with_handler(|_, _| Ok("```markdown\nActual page text\n```".to_string())),
    ) as Arc<dyn ModelBackend>;

    let document = scan_pages(&backend, page_images(1), 1, "vision:latest", &config(), None)
        .await
        .unwrap();

    assert_eq!(document.pages[0].text, "Actual page text");
    assert!(!document.assemble().contains("```"));
}

#[tokio::test]
async fn page_completion_events_fire_for_every_page() {
    struct Counting {
        completed: AtomicUsize,
        totals: Mutex<Vec<usize>>,
    }

    impl AnalysisProgressCallback for Counting {
        fn on_page_complete(&self, _page: usize, total: usize, _len: usize) {
            self.completed.fetch_add(1, Ordering::SeqCst);
            self.totals.lock().unwrap().push(total);
        }
    }

    let cb = Arc::new(Counting {
        completed: AtomicUsize::new(0),
        totals: Mutex::new(Vec::new()),
    });
    let progress: Arc<dyn AnalysisProgressCallback> = cb.clone();

    let backend = Arc::new(MockBackend::new(&["vision:latest"])) as Arc<dyn ModelBackend>;
    scan_pages(
        &backend,
        page_images(4),
        4,
        "vision:latest",
        &config(),
        Some(&progress),
    )
    .await
    .unwrap();

    assert_eq!(cb.completed.load(Ordering::SeqCst), 4);
    assert!(cb.totals.lock().unwrap().iter().all(|&t| t == 4));
}

#[tokio::test]
async fn lowest_failing_page_is_reported() {
    // Pages 2 and 4 fail permanently; the error must name page 2 no matter
    // which failure completed first.
    let backend = Arc::new(MockBackend::new(&["vision:latest"]).with_handler(|i, _| {
        if i == 1 || i == 3 {
            Err(BackendError::Api {
                status: 400,
                body: "bad image".into(),
            })
        } else {
            Ok("ok".into())
        }
    })) as Arc<dyn ModelBackend>;

    let err = scan_pages(&backend, page_images(4), 4, "vision:latest", &config(), None)
        .await
        .unwrap_err();

    match err {
        AnalysisError::ExtractionFailed { page, .. } => assert_eq!(page, 2),
        other => panic!("expected ExtractionFailed, got {other}"),
    }
}

// ── Scan output feeding the analysis stage ───────────────────────────────

#[tokio::test]
async fn analysis_prompt_carries_assembled_pages_and_instruction() {
    let scan_backend = Arc::new(
        MockBackend::new(&["vision:latest"])
            .with_handler(|i, _| Ok(format!("page body {}", i + 1))),
    ) as Arc<dyn ModelBackend>;

    let document = scan_pages(
        &scan_backend,
        page_images(2),
        2,
        "vision:latest",
        &config(),
        None,
    )
    .await
    .unwrap();
    let text = document.assemble();

    let analysis_backend = Arc::new(MockBackend::new(&["llm:latest"]));
    let dyn_backend: Arc<dyn ModelBackend> = analysis_backend.clone();

    let answer = analyze_text(
        &dyn_backend,
        &text,
        "llm:latest",
        Some("List every date mentioned."),
        &config(),
    )
    .await
    .unwrap();
    assert_eq!(answer, "mock response");

    let requests = analysis_backend.requests();
    assert_eq!(requests.len(), 1);
    let prompt = &requests[0].prompt;
    assert!(prompt.contains("List every date mentioned."));
    assert!(prompt.contains("--- Page 1 ---"));
    assert!(prompt.contains("page body 2"));
    assert!(requests[0].images.is_empty());
}

#[tokio::test]
async fn oversized_document_is_truncated_in_the_prompt() {
    let mut cfg = config();
    cfg.max_analysis_chars = 100;

    let backend = Arc::new(MockBackend::new(&["llm:latest"]));
    let dyn_backend: Arc<dyn ModelBackend> = backend.clone();

    let long_text = "x".repeat(500);
    analyze_text(&dyn_backend, &long_text, "llm:latest", None, &cfg)
        .await
        .unwrap();

    let prompt = &backend.requests()[0].prompt;
    assert!(prompt.contains(TRUNCATION_MARKER_PREFIX), "no marker in:\n{prompt}");
    assert!(!prompt.contains(&"x".repeat(101)));
}

// ── Validation surface of the orchestrator ───────────────────────────────

fn analyzer(backend: Arc<MockBackend>) -> PdfAnalyzer {
    let cfg = AnalyzerConfig::builder()
        .default_scan_model("qwen2.5vl:latest")
        .default_analysis_model("gemma3:4b")
        .max_retries(0)
        .build()
        .unwrap();
    PdfAnalyzer::with_backend(cfg, backend)
}

#[tokio::test]
async fn non_pdf_upload_is_rejected_without_model_calls() {
    let backend = Arc::new(MockBackend::new(&["qwen2.5vl:latest", "gemma3:4b"]));
    let a = analyzer(backend.clone());

    let err = a
        .analyze(AnalysisRequest::new("image.png", vec![0x89, b'P', b'N', b'G']))
        .await
        .unwrap_err();

    assert!(matches!(err, AnalysisError::NotAPdf { .. }));
    assert_eq!(err.stage(), Stage::Validation);
    assert_eq!(backend.generate_calls(), 0);
    assert_eq!(backend.registry_calls(), 0);
}

#[tokio::test]
async fn unknown_model_error_names_the_requested_model() {
    let backend = Arc::new(MockBackend::new(&["gemma3:4b"]));
    let a = analyzer(backend.clone());

    let err = a
        .analyze(AnalysisRequest::new("doc.pdf", b"%PDF-1.4".to_vec()).scan_model("missing:7b"))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("missing:7b"), "got: {err}");
}

#[tokio::test]
async fn failure_outcome_reaches_the_progress_callback() {
    struct Recording {
        outcome: Mutex<Option<Result<usize, String>>>,
    }

    impl AnalysisProgressCallback for Recording {
        fn on_complete(&self, outcome: Result<usize, &str>) {
            *self.outcome.lock().unwrap() = Some(outcome.map_err(str::to_string));
        }
    }

    let cb = Arc::new(Recording {
        outcome: Mutex::new(None),
    });
    let backend = Arc::new(MockBackend::new(&["qwen2.5vl:latest", "gemma3:4b"]));
    let a = analyzer(backend).with_progress(cb.clone() as Arc<dyn AnalysisProgressCallback>);

    let _ = a
        .analyze(AnalysisRequest::new("empty.pdf", Vec::new()))
        .await;

    let outcome = cb.outcome.lock().unwrap().clone();
    assert_eq!(outcome, Some(Err("validation".to_string())));
}
