use crate::api_errors::AppError;
use crate::app_state::AppState;
use crate::content_filter::{FilterVerdict, NO_TEXT_PROVIDED};
use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Request, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

/// Error text for a `text` field that is present but not a string
pub const TEXT_NOT_A_STRING: &str = "text must be a string";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct FilterRequest {
    #[serde(default)]
    pub text: Option<String>,
}

/// Build the router exposing the filter endpoint, status and health checks.
/// Request bodies are not size-limited; long text is truncated by the
/// tokenizer instead.
pub fn build_filter_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/filter/text", post(filter_text))
        .route("/api/filter/status", get(filter_status))
        // health endpoints
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .layer(DefaultBodyLimit::disable())
        .layer(TraceLayer::new_for_http().make_span_with(|req: &Request| {
            tracing::info_span!(
                "http_request",
                request_id = %Uuid::new_v4(),
                method = %req.method(),
                uri = %req.uri(),
            )
        }))
        .with_state(state)
}

#[axum::debug_handler]
async fn filter_text(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<FilterRequest>, JsonRejection>,
) -> Result<Json<FilterVerdict>, AppError> {
    let text = match payload {
        Ok(Json(FilterRequest { text: Some(text) })) if !text.is_empty() => text,
        Ok(_) => return Err(AppError::bad_request(NO_TEXT_PROVIDED)),
        Err(rejection) => return Err(rejection_error(rejection)),
    };

    // Inference is CPU-bound; keep it off the async workers
    let filter = state.filter.clone();
    let verdict = tokio::task::spawn_blocking(move || filter.evaluate(&text))
        .await
        .map_err(|e| AppError::internal(format!("filter worker failed: {e}")))?
        .map_err(|e| {
            tracing::error!("filter request failed: {e}");
            AppError::from(e)
        })?;

    tracing::info!(blocked = verdict.blocked, "text filtered");
    Ok(Json(verdict))
}

fn rejection_error(rejection: JsonRejection) -> AppError {
    tracing::debug!("unreadable filter request body: {rejection}");
    match rejection {
        // Well-formed JSON of the wrong shape, e.g. `{"text": 123}`
        JsonRejection::JsonDataError(_) => AppError::bad_request(TEXT_NOT_A_STRING),
        // The body itself could not be read
        JsonRejection::BytesRejection(e) => AppError::bad_request(e.body_text()),
        _ => AppError::bad_request(NO_TEXT_PROVIDED),
    }
}

async fn filter_status(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(state.status())
}

async fn healthz() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn readyz(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "ready": true,
        "model_id": state.model.model_id,
    }))
}
