use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Multipart, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::{
    error::AppError,
    models::{ExtractRequest, ExtractedText, SummarizeRequest, SummaryResult},
    source::{ExtractionRequest, Resolver},
    summarize::Gateway,
};

const FILE_FIELD: &str = "file";

#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<Resolver>,
    pub gateway: Arc<Gateway>,
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/extract", post(extract_endpoint))
        .route(
            "/api/upload",
            post(upload_endpoint).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/api/summarize", post(summarize_endpoint))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

async fn extract_endpoint(
    State(state): State<AppState>,
    payload: Result<Json<ExtractRequest>, JsonRejection>,
) -> Result<Json<ExtractedText>, AppError> {
    let Json(req) = payload?;
    let request = match req {
        ExtractRequest::Url(body) => ExtractionRequest::Url(body.url),
        ExtractRequest::Text(body) => ExtractionRequest::Text(body.text),
    };
    let text = state.resolver.resolve(request).await?;
    Ok(Json(text))
}

async fn upload_endpoint(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ExtractedText>, AppError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field
            .file_name()
            .map(str::to_string)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| AppError::InvalidInput("Uploaded file has no filename".to_string()))?;

        let bytes = field.bytes().await?;

        tracing::info!(%filename, size = bytes.len(), "received upload");

        let text = state
            .resolver
            .resolve(ExtractionRequest::File {
                filename,
                bytes: bytes.to_vec(),
            })
            .await?;
        return Ok(Json(text));
    }

    Err(AppError::InvalidInput("No file uploaded".to_string()))
}

async fn summarize_endpoint(
    State(state): State<AppState>,
    payload: Result<Json<SummarizeRequest>, JsonRejection>,
) -> Result<Json<SummaryResult>, AppError> {
    let Json(req) = payload?;
    let result = state.gateway.summarize(&req.content).await?;
    Ok(Json(result))
}
