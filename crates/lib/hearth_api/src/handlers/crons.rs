//! Cron job endpoints (superusers only).

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use hearth_core::cron::Job;
use tracing::info;

use crate::AppState;
use crate::error::{AppError, AppResult};

/// `GET /api/crons`: list registered jobs, system jobs last.
pub async fn list_crons_handler(State(state): State<AppState>) -> Json<Vec<Job>> {
    Json(state.app.cron().jobs())
}

/// `POST /api/crons/{id}`: start a job in the background.
///
/// Responds before the job finishes; job failures are only logged.
pub async fn run_cron_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let job = state
        .app
        .cron()
        .find(&id)
        .ok_or_else(|| AppError::NotFound("Missing or invalid cron job.".into()))?;

    info!(job = %job.id(), "cron job triggered manually");
    job.spawn();

    Ok(StatusCode::NO_CONTENT)
}
