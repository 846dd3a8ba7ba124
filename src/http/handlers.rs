use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::domain::event::S3Event;
use crate::domain::moderation::HandlerResponse;
use crate::http::AppError;
use crate::AppState;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

pub(crate) async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub async fn process_event(
    State(state): State<AppState>,
    Json(event): Json<S3Event>,
) -> Result<(StatusCode, Json<HandlerResponse>), AppError> {
    let uploads = event.upload_events();
    if uploads.is_empty() {
        return Err(AppError::bad_request("event contains no records"));
    }

    let response = state.moderation.handle_all(&uploads).await.map_err(|err| {
        tracing::error!(error = ?err, step = %err.step, "failed to process upload event");
        AppError::internal(err.to_string())
    })?;

    let status = StatusCode::from_u16(response.status_code)
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    Ok((status, Json(response)))
}
