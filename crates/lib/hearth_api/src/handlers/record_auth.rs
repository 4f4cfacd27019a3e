//! Record auth request handlers.

use axum::Json;
use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use hearth_core::auth::AuthContext;
use hearth_core::hooks::AuthResponse;

use super::read_body;
use crate::AppState;
use crate::error::AppResult;
use crate::middleware::client::ClientKey;
use crate::services::record_auth;

/// `{token, record}`, or 204 when a hook ended the chain without one.
fn auth_response(resp: Option<AuthResponse>) -> Response {
    match resp {
        Some(resp) => Json(resp).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

/// `POST /api/collections/{collection}/auth-refresh`
pub async fn auth_refresh_handler(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Extension(auth): Extension<AuthContext>,
    ClientKey(client): ClientKey,
) -> AppResult<Response> {
    let resp = record_auth::auth_refresh(&state.app, &collection, &auth, &client).await?;
    Ok(auth_response(resp))
}

/// `POST /api/collections/{collection}/impersonate/{id}`
pub async fn impersonate_handler(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
    ClientKey(client): ClientKey,
    body: Result<Bytes, BytesRejection>,
) -> AppResult<Response> {
    let body = read_body(body)?;
    let resp = record_auth::impersonate(&state.app, &collection, &id, &body, &client).await?;
    Ok(auth_response(resp))
}

/// `POST /api/collections/{collection}/request-email-change`
pub async fn request_email_change_handler(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Extension(auth): Extension<AuthContext>,
    ClientKey(client): ClientKey,
    body: Result<Bytes, BytesRejection>,
) -> AppResult<StatusCode> {
    let body = read_body(body)?;
    record_auth::request_email_change(&state.app, &collection, &auth, &body, &client).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/collections/{collection}/confirm-email-change`
pub async fn confirm_email_change_handler(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    ClientKey(client): ClientKey,
    body: Result<Bytes, BytesRejection>,
) -> AppResult<StatusCode> {
    let body = read_body(body)?;
    record_auth::confirm_email_change(&state.app, &collection, &body, &client).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/collections/{collection}/confirm-verification`
pub async fn confirm_verification_handler(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    ClientKey(client): ClientKey,
    body: Result<Bytes, BytesRejection>,
) -> AppResult<StatusCode> {
    let body = read_body(body)?;
    record_auth::confirm_verification(&state.app, &collection, &body, &client).await?;
    Ok(StatusCode::NO_CONTENT)
}
