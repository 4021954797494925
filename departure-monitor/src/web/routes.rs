//! HTTP route handlers.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::Value;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::coordinator::TimetableSource;

use super::dto::*;
use super::state::AppState;

/// Create the application router.
pub fn create_router<S: TimetableSource + 'static>(state: AppState<S>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/departure", get(departure::<S>))
        .route("/departure/raw", get(raw_departure::<S>))
        .route("/config", post(update_config::<S>))
        .route("/refresh", post(refresh::<S>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// The next departure towards the configured destination.
async fn departure<S: TimetableSource>(State(state): State<AppState<S>>) -> Json<DepartureView> {
    let destination = state.coordinator.config().destination.as_str();
    Json(DepartureView::collect(state.store(), destination).await)
}

/// The last stored payload, verbatim.
async fn raw_departure<S: TimetableSource>(
    State(state): State<AppState<S>>,
) -> Result<Json<Value>, AppError> {
    let payload = state
        .store()
        .raw_payload()
        .await
        .ok_or_else(|| AppError::NotFound {
            message: "no timetable has been stored yet".to_string(),
        })?;

    Ok(Json(Value::clone(&payload)))
}

/// Change a live setting.
async fn update_config<S: TimetableSource>(
    State(state): State<AppState<S>>,
    Json(req): Json<ConfigRequest>,
) -> Result<Json<ConfigResponse>, AppError> {
    if !state.coordinator.set_config(&req.key, req.value).await {
        return Err(AppError::BadRequest {
            message: format!("rejected setting {}={}", req.key, req.value),
        });
    }

    info!(key = %req.key, value = req.value, "config updated");
    Ok(Json(ConfigResponse { applied: true }))
}

/// Run one refresh now.
async fn refresh<S: TimetableSource>(State(state): State<AppState<S>>) -> Json<RefreshResponse> {
    let outcome = state.coordinator.refresh().await;
    Json(RefreshResponse::from(&outcome))
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    BadRequest { message: String },
    NotFound { message: String },
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest { message } => (StatusCode::BAD_REQUEST, message),
            AppError::NotFound { message } => (StatusCode::NOT_FOUND, message),
        };

        warn!(%status, %message, "request failed");

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}
