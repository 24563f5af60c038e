//! Model-service transport: the [`ModelBackend`] seam and its Ollama
//! implementation.
//!
//! The pipeline never talks HTTP directly; it goes through `ModelBackend`
//! so every stage is testable against [`MockBackend`] without a live model
//! server. [`OllamaBackend`] drives the two Ollama endpoints the pipeline
//! needs:
//!
//! * `GET  /api/tags`     — the model registry
//! * `POST /api/generate` — text and vision generation (images ride along
//!   as base64 in the request body)
//!
//! Transport failures are classified into [`BackendError`] variants; the
//! retry loops in the pipeline stages consult [`BackendError::is_transient`]
//! to decide whether another attempt is worthwhile.

use crate::output::ModelDescriptor;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use thiserror::Error;
use tracing::debug;

/// A single generation call towards the model service.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    /// Model identifier, e.g. `qwen2.5vl:latest`.
    pub model: String,
    /// User prompt.
    pub prompt: String,
    /// Optional system prompt.
    pub system: Option<String>,
    /// Base64-encoded PNG images for multimodal models. Empty for pure
    /// text calls.
    pub images: Vec<String>,
    /// Sampling temperature.
    pub temperature: f32,
    /// Generation token cap (`num_predict` in Ollama terms).
    pub max_tokens: u32,
}

/// Transport-level failures from the model service.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// The service process could not be reached at all.
    #[error("model service at '{url}' is unreachable: {detail}")]
    Unavailable { url: String, detail: String },

    /// A single HTTP call exceeded the client timeout.
    #[error("model service call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The service answered with a non-success status.
    #[error("model service returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    /// The service answered 2xx but the body could not be decoded.
    #[error("malformed model service response: {detail}")]
    MalformedResponse { detail: String },

    /// The HTTP client itself could not be constructed.
    #[error("failed to initialise HTTP client: {detail}")]
    ClientInit { detail: String },
}

impl BackendError {
    /// Whether a retry has a realistic chance of succeeding.
    ///
    /// Connection failures, timeouts, 429 and 5xx responses are expected
    /// transients for a locally hosted model server (model loading, GPU
    /// contention). 4xx responses and decode failures are permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            BackendError::Unavailable { .. } | BackendError::Timeout { .. } => true,
            BackendError::Api { status, .. } => *status == 429 || *status >= 500,
            BackendError::MalformedResponse { .. } | BackendError::ClientInit { .. } => false,
        }
    }
}

/// The model-serving service, as the pipeline sees it.
///
/// Implementations must be `Send + Sync`; the scan stage issues concurrent
/// calls through a shared reference.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Fetch the currently available models, in registry order.
    async fn list_models(&self) -> Result<Vec<ModelDescriptor>, BackendError>;

    /// Run one generation call and return the produced text.
    async fn generate(&self, request: &GenerateRequest) -> Result<String, BackendError>;

    /// The service URL, for error reporting.
    fn base_url(&self) -> &str;
}

// ── Ollama implementation ────────────────────────────────────────────────

/// Request body for Ollama `POST /api/generate`.
#[derive(Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: &'a Vec<String>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

/// Response body from Ollama `POST /api/generate`.
#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

/// Response body from Ollama `GET /api/tags`.
#[derive(Deserialize)]
struct OllamaTagsResponse {
    models: Vec<ModelDescriptor>,
}

/// HTTP client for a local Ollama instance.
pub struct OllamaBackend {
    base_url: String,
    client: reqwest::Client,
    timeout_secs: u64,
}

impl OllamaBackend {
    /// Create a backend for the Ollama instance at `base_url` with a
    /// per-call timeout.
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| BackendError::ClientInit {
                detail: e.to_string(),
            })?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout_secs,
        })
    }

    fn classify(&self, e: reqwest::Error) -> BackendError {
        if e.is_timeout() {
            BackendError::Timeout {
                secs: self.timeout_secs,
            }
        } else if e.is_connect() {
            BackendError::Unavailable {
                url: self.base_url.clone(),
                detail: e.to_string(),
            }
        } else {
            BackendError::MalformedResponse {
                detail: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl ModelBackend for OllamaBackend {
    async fn list_models(&self) -> Result<Vec<ModelDescriptor>, BackendError> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: OllamaTagsResponse =
            response
                .json()
                .await
                .map_err(|e| BackendError::MalformedResponse {
                    detail: e.to_string(),
                })?;

        debug!("Registry reports {} models", parsed.models.len());
        Ok(parsed.models)
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<String, BackendError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = OllamaGenerateRequest {
            model: &request.model,
            prompt: &request.prompt,
            system: request.system.as_deref(),
            images: &request.images,
            stream: false,
            options: OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: OllamaGenerateResponse =
            response
                .json()
                .await
                .map_err(|e| BackendError::MalformedResponse {
                    detail: e.to_string(),
                })?;

        Ok(parsed.response)
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}

// ── Mock implementation ──────────────────────────────────────────────────

type GenerateHandler =
    dyn Fn(usize, &GenerateRequest) -> Result<String, BackendError> + Send + Sync;

/// Scriptable backend for tests.
///
/// The handler receives the 0-based call index (calls start in submission
/// order) and the full request, so tests can return per-page text, inject
/// failures on specific calls, or count invocations. Optional per-call
/// delays let tests force out-of-order completion under concurrency.
pub struct MockBackend {
    models: Vec<String>,
    handler: Box<GenerateHandler>,
    delays_ms: Vec<u64>,
    calls: Mutex<Vec<GenerateRequest>>,
    list_calls: Mutex<usize>,
}

impl MockBackend {
    /// A backend advertising `models` whose every generation call returns
    /// `"mock response"`.
    pub fn new(models: &[&str]) -> Self {
        Self {
            models: models.iter().map(|m| m.to_string()).collect(),
            handler: Box::new(|_, _| Ok("mock response".to_string())),
            delays_ms: Vec::new(),
            calls: Mutex::new(Vec::new()),
            list_calls: Mutex::new(0),
        }
    }

    /// Replace the generation handler.
    pub fn with_handler(
        mut self,
        handler: impl Fn(usize, &GenerateRequest) -> Result<String, BackendError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.handler = Box::new(handler);
        self
    }

    /// Sleep `delays_ms[i]` before answering the i-th generation call.
    /// Calls beyond the list answer immediately.
    pub fn with_delays_ms(mut self, delays_ms: Vec<u64>) -> Self {
        self.delays_ms = delays_ms;
        self
    }

    /// Number of generation calls made so far.
    pub fn generate_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Number of registry queries made so far.
    pub fn registry_calls(&self) -> usize {
        *self.list_calls.lock().unwrap()
    }

    /// Snapshot of every generation request received, in call order.
    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelBackend for MockBackend {
    async fn list_models(&self) -> Result<Vec<ModelDescriptor>, BackendError> {
        *self.list_calls.lock().unwrap() += 1;
        Ok(self
            .models
            .iter()
            .map(|name| ModelDescriptor {
                name: name.clone(),
                metadata: serde_json::Map::new(),
            })
            .collect())
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<String, BackendError> {
        let index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(request.clone());
            calls.len() - 1
        };

        if let Some(&delay) = self.delays_ms.get(index) {
            tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
        }

        (self.handler)(index, request)
    }

    fn base_url(&self) -> &str {
        "mock://backend"
    }
}
