//! HTTP surface for docsum.
//!
//! The router exposes a handful of endpoints:
//!
//! - `GET /health` – Plain-text liveness probe.
//! - `POST /upload-document` – Multipart upload with a `document` file (PDF, JPEG, or PNG) and an
//!   optional `summaryLength` (`short` | `medium` | `long`, default `medium`). Returns
//!   `{ "message", "summary" }`.
//! - `GET /metrics` – Pipeline counters since startup.
//! - `GET /commands` – Machine-readable catalog of the endpoints above.
//!
//! Every failure is reported with the same JSON shape, `{ "error", "stage", "details" }`, and a
//! status derived from the stage that failed: 400 for upload problems, 413 for oversized bodies,
//! 500 for extraction and summarization failures, and 504 when either external call times out.

use crate::pipeline::{PipelineError, PipelineStage, SummaryApi};
use crate::prompt::SummaryRequest;
use crate::upload::{DOCUMENT_FIELD, IncomingDocument, SUMMARY_LENGTH_FIELD, UploadError};
use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, Multipart, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use std::sync::Arc;

/// Body returned by `GET /health`.
pub const HEALTH_MESSAGE: &str = "Backend is up and running!";
/// Message accompanying every generated summary.
pub const SUCCESS_MESSAGE: &str = "Summary generated successfully!";

const UNNAMED_UPLOAD: &str = "upload";
const UNKNOWN_CONTENT_TYPE: &str = "application/octet-stream";

/// Build the HTTP router, limiting request bodies to `max_upload_bytes`.
pub fn create_router<S>(service: Arc<S>, max_upload_bytes: usize) -> Router
where
    S: SummaryApi + 'static,
{
    Router::new()
        .route("/health", get(health))
        .route("/upload-document", post(upload_document::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .route("/commands", get(get_commands))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(service)
}

async fn health() -> &'static str {
    HEALTH_MESSAGE
}

/// Success response for `POST /upload-document`.
#[derive(Serialize)]
struct UploadResponse {
    message: &'static str,
    summary: String,
}

/// Fields read from the multipart form.
#[derive(Default)]
struct UploadForm {
    document: Option<IncomingDocument>,
    summary_length: Option<String>,
}

/// Summarize an uploaded document.
///
/// The form is read in full before the pipeline starts, so `summaryLength` may appear before or
/// after the file part. Only the first `document` part is used.
async fn upload_document<S>(
    State(service): State<Arc<S>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, AppError>
where
    S: SummaryApi,
{
    let mut multipart = multipart
        .map_err(|rejection| PipelineError::from(UploadError::Malformed(rejection.body_text())))?;
    let form = read_upload_form(&mut multipart).await?;
    let request = SummaryRequest::from_form_value(form.summary_length.as_deref());

    let outcome = service.summarize_upload(form.document, request).await?;
    Ok(Json(UploadResponse {
        message: SUCCESS_MESSAGE,
        summary: outcome.summary,
    }))
}

async fn read_upload_form(multipart: &mut Multipart) -> Result<UploadForm, PipelineError> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(DOCUMENT_FIELD) if form.document.is_none() => {
                let original_name = field.file_name().unwrap_or(UNNAMED_UPLOAD).to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or(UNKNOWN_CONTENT_TYPE)
                    .to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                form.document = Some(IncomingDocument {
                    field_name: DOCUMENT_FIELD.to_string(),
                    original_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            Some(SUMMARY_LENGTH_FIELD) => {
                form.summary_length = Some(field.text().await.map_err(multipart_error)?);
            }
            name => {
                tracing::debug!(field = ?name, "Ignoring unexpected form field");
            }
        }
    }
    Ok(form)
}

fn multipart_error(error: MultipartError) -> PipelineError {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        UploadError::TooLarge.into()
    } else {
        UploadError::Malformed(error.body_text()).into()
    }
}

/// Return pipeline counters accumulated since startup.
async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<crate::metrics::MetricsSnapshot>
where
    S: SummaryApi,
{
    Json(service.metrics_snapshot())
}

/// Descriptor for a single command in the discovery catalog.
#[derive(Serialize)]
struct CommandDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    form_fields: Option<Vec<&'static str>>,
}

/// Response body for `GET /commands`.
#[derive(Serialize)]
struct CommandsResponse {
    commands: Vec<CommandDescriptor>,
}

/// Enumerate supported HTTP commands for discovery by clients and tools.
async fn get_commands() -> Json<CommandsResponse> {
    Json(CommandsResponse {
        commands: vec![
            CommandDescriptor {
                name: "health",
                method: "GET",
                path: "/health",
                description: "Liveness probe returning a plain-text status line.",
                form_fields: None,
            },
            CommandDescriptor {
                name: "upload_document",
                method: "POST",
                path: "/upload-document",
                description: "Upload a PDF, JPEG, or PNG as multipart form data and receive { \"message\": string, \"summary\": string }. summaryLength is one of short, medium (default), or long.",
                form_fields: Some(vec![DOCUMENT_FIELD, SUMMARY_LENGTH_FIELD]),
            },
            CommandDescriptor {
                name: "metrics",
                method: "GET",
                path: "/metrics",
                description: "Return pipeline counters: documents received, summaries generated, and failures by stage.",
                form_fields: None,
            },
        ],
    })
}

/// Error body shared by every failing endpoint.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
    stage: PipelineStage,
    details: String,
}

struct AppError(PipelineError);

impl AppError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            PipelineError::Upload(UploadError::TooLarge) => StatusCode::PAYLOAD_TOO_LARGE,
            PipelineError::Upload(UploadError::Storage { .. }) => StatusCode::INTERNAL_SERVER_ERROR,
            error => match error.stage() {
                PipelineStage::Upload => StatusCode::BAD_REQUEST,
                PipelineStage::Timeout => StatusCode::GATEWAY_TIMEOUT,
                PipelineStage::Extraction | PipelineStage::Summarization => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.0.public_message(),
            stage: self.0.stage(),
            details: self.0.public_details(),
        };
        (self.status(), Json(body)).into_response()
    }
}

impl From<PipelineError> for AppError {
    fn from(inner: PipelineError) -> Self {
        Self(inner)
    }
}
