//! HTTP surface over the pipeline (feature `server`).
//!
//! Two routes, matching the deployment this crate grew out of:
//!
//! * `GET /ollama/models` — list available model identifiers
//! * `POST /pdf/analyze`  — multipart upload: `file` (required),
//!   `scan_model`, `analysis_model`, `custom_prompt` (all optional)
//!
//! Success bodies are [`AnalysisResult`] serialised as-is. Failures carry
//! `{ "stage": ..., "error": ... }` with a status code reflecting the
//! failing stage; internal model-service stack traces never reach the
//! wire. CORS is fully permissive — the deployment is local and
//! unauthenticated by design.

use crate::error::AnalysisError;
use crate::output::{AnalysisRequest, AnalysisResult};
use crate::PdfAnalyzer;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Uploads beyond this size are rejected before the pipeline sees them.
const MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub analyzer: Arc<PdfAnalyzer>,
}

/// Build the application router.
pub fn router(analyzer: Arc<PdfAnalyzer>) -> Router {
    Router::new()
        .route("/ollama/models", get(list_models))
        .route("/pdf/analyze", post(analyze_pdf))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { analyzer })
}

#[derive(Serialize)]
struct ModelsResponse {
    models: Vec<String>,
}

#[derive(Serialize)]
struct ErrorBody {
    stage: String,
    error: String,
}

/// An error ready to leave over HTTP.
enum ApiError {
    Pipeline(AnalysisError),
    BadRequest(String),
}

impl From<AnalysisError> for ApiError {
    fn from(e: AnalysisError) -> Self {
        ApiError::Pipeline(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, stage, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "validation".to_string(), msg),
            ApiError::Pipeline(e) => {
                let status = match &e {
                    AnalysisError::EmptyUpload
                    | AnalysisError::NotAPdf { .. }
                    | AnalysisError::UnknownModel { .. }
                    | AnalysisError::InvalidConfig(_)
                    | AnalysisError::UnsupportedDocument { .. } => StatusCode::BAD_REQUEST,
                    AnalysisError::RegistryUnavailable { .. }
                    | AnalysisError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
                    AnalysisError::RegistryError { .. }
                    | AnalysisError::ExtractionFailed { .. }
                    | AnalysisError::AnalysisFailed { .. } => StatusCode::BAD_GATEWAY,
                    AnalysisError::StageTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                    AnalysisError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, e.stage().to_string(), e.to_string())
            }
        };

        let body = Json(ErrorBody {
            stage,
            error: message,
        });
        (status, body).into_response()
    }
}

/// `GET /ollama/models`
async fn list_models(State(state): State<AppState>) -> Result<Json<ModelsResponse>, ApiError> {
    let models = state.analyzer.list_models().await?;
    Ok(Json(ModelsResponse {
        models: models.into_iter().map(|m| m.name).collect(),
    }))
}

/// `POST /pdf/analyze`
async fn analyze_pdf(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<AnalysisResult>, ApiError> {
    let mut filename = String::from("upload.pdf");
    let mut file: Option<Vec<u8>> = None;
    let mut scan_model: Option<String> = None;
    let mut analysis_model: Option<String> = None;
    let mut custom_prompt: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("malformed multipart body: {e}")))?
    {
        match field.name().unwrap_or_default() {
            "file" => {
                if let Some(name) = field.file_name() {
                    filename = name.to_string();
                }
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("failed to read upload: {e}")))?;
                file = Some(bytes.to_vec());
            }
            "scan_model" => scan_model = Some(read_text_field(field).await?),
            "analysis_model" => analysis_model = Some(read_text_field(field).await?),
            "custom_prompt" => custom_prompt = Some(read_text_field(field).await?),
            other => {
                info!("Ignoring unknown multipart field '{other}'");
            }
        }
    }

    let file = file.ok_or_else(|| ApiError::BadRequest("missing 'file' field".to_string()))?;

    let request = AnalysisRequest {
        filename,
        file,
        scan_model,
        analysis_model,
        custom_prompt,
    };

    let result = state.analyzer.analyze(request).await?;
    Ok(Json(result))
}

async fn read_text_field(field: axum::extract::multipart::Field<'_>) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|e| ApiError::BadRequest(format!("failed to read form field: {e}")))
}
