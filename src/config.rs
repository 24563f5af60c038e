//! Configuration for the analysis pipeline.
//!
//! Every knob lives in [`AnalyzerConfig`], built via its
//! [`AnalyzerConfigBuilder`] and handed to [`crate::PdfAnalyzer`] at
//! construction. There is deliberately no ambient state: default model
//! identifiers come from this struct, never from environment lookups inside
//! the pipeline, so tests can inject distinct defaults per case.

use crate::error::AnalysisError;
use serde::{Deserialize, Serialize};

/// Configuration for a [`crate::PdfAnalyzer`].
///
/// Built via [`AnalyzerConfig::builder()`] or [`AnalyzerConfig::default()`].
///
/// # Example
/// ```rust
/// use pdfsight::AnalyzerConfig;
///
/// let config = AnalyzerConfig::builder()
///     .default_scan_model("qwen2.5vl:latest")
///     .default_analysis_model("gemma3:4b")
///     .scan_concurrency(2)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Base URL of the local Ollama instance. Default: `http://localhost:11434`.
    pub ollama_base_url: String,

    /// Vision model used for the scan stage when the request names none.
    /// Default: `qwen2.5vl:latest`.
    pub default_scan_model: String,

    /// Language model used for the analysis stage when the request names
    /// none. Default: `gemma3:4b`.
    pub default_analysis_model: String,

    /// Concurrent vision calls during the scan stage. Default: 2.
    ///
    /// A locally hosted model server is typically single-GPU and serialises
    /// inference internally; a small bound keeps requests queued at the
    /// HTTP layer instead of piling timeouts onto the backend.
    pub scan_concurrency: usize,

    /// Maximum retry attempts for a transient model-call failure. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (doubles per attempt). Default: 500.
    pub retry_backoff_ms: u64,

    /// Deadline for the whole scan stage in seconds. Default: 600.
    ///
    /// Vision extraction over many pages legitimately takes far longer than
    /// text analysis, hence a separate budget per stage.
    pub scan_timeout_secs: u64,

    /// Deadline for the whole analysis stage in seconds. Default: 180.
    pub analysis_timeout_secs: u64,

    /// Per-HTTP-call timeout towards the model service in seconds.
    /// Default: 120.
    pub request_timeout_secs: u64,

    /// Maximum rendered page dimension (width or height) in pixels.
    /// Default: 2000.
    ///
    /// Caps rasterisation memory independently of page size; an A0 poster
    /// would otherwise produce an image large enough to exhaust memory.
    pub max_rendered_pixels: u32,

    /// Sampling temperature for both model stages. Default: 0.1.
    ///
    /// Low temperature keeps the vision model faithful to what is on the
    /// page, which is what transcription needs.
    pub temperature: f32,

    /// Maximum tokens a model may generate per call. Default: 4096.
    pub max_tokens: u32,

    /// Maximum characters of document text forwarded to the analysis model.
    /// Default: 24_000.
    ///
    /// Longer documents are truncated deterministically with an explicit
    /// marker (see [`crate::pipeline::analyze`]) rather than silently
    /// overflowing the model's context window.
    pub max_analysis_chars: usize,

    /// Override for the scan-stage extraction prompt. `None` uses
    /// [`crate::prompts::DEFAULT_SCAN_PROMPT`].
    pub scan_prompt: Option<String>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            ollama_base_url: "http://localhost:11434".to_string(),
            default_scan_model: "qwen2.5vl:latest".to_string(),
            default_analysis_model: "gemma3:4b".to_string(),
            scan_concurrency: 2,
            max_retries: 3,
            retry_backoff_ms: 500,
            scan_timeout_secs: 600,
            analysis_timeout_secs: 180,
            request_timeout_secs: 120,
            max_rendered_pixels: 2000,
            temperature: 0.1,
            max_tokens: 4096,
            max_analysis_chars: 24_000,
            scan_prompt: None,
        }
    }
}

impl AnalyzerConfig {
    /// Create a new builder for `AnalyzerConfig`.
    pub fn builder() -> AnalyzerConfigBuilder {
        AnalyzerConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`AnalyzerConfig`].
#[derive(Debug)]
pub struct AnalyzerConfigBuilder {
    config: AnalyzerConfig,
}

impl AnalyzerConfigBuilder {
    pub fn ollama_base_url(mut self, url: impl Into<String>) -> Self {
        let url: String = url.into();
        self.config.ollama_base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn default_scan_model(mut self, model: impl Into<String>) -> Self {
        self.config.default_scan_model = model.into();
        self
    }

    pub fn default_analysis_model(mut self, model: impl Into<String>) -> Self {
        self.config.default_analysis_model = model.into();
        self
    }

    pub fn scan_concurrency(mut self, n: usize) -> Self {
        self.config.scan_concurrency = n.max(1);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn scan_timeout_secs(mut self, secs: u64) -> Self {
        self.config.scan_timeout_secs = secs;
        self
    }

    pub fn analysis_timeout_secs(mut self, secs: u64) -> Self {
        self.config.analysis_timeout_secs = secs;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: u32) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_analysis_chars(mut self, n: usize) -> Self {
        self.config.max_analysis_chars = n;
        self
    }

    pub fn scan_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.scan_prompt = Some(prompt.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AnalyzerConfig, AnalysisError> {
        let c = &self.config;
        if c.ollama_base_url.is_empty() {
            return Err(AnalysisError::InvalidConfig(
                "ollama_base_url must not be empty".into(),
            ));
        }
        if c.default_scan_model.is_empty() || c.default_analysis_model.is_empty() {
            return Err(AnalysisError::InvalidConfig(
                "default model identifiers must not be empty".into(),
            ));
        }
        if c.scan_concurrency == 0 {
            return Err(AnalysisError::InvalidConfig(
                "scan_concurrency must be >= 1".into(),
            ));
        }
        if c.max_analysis_chars == 0 {
            return Err(AnalysisError::InvalidConfig(
                "max_analysis_chars must be >= 1".into(),
            ));
        }
        Ok(self.config)
    }
}
