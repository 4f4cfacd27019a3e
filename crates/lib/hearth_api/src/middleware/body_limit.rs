//! Request body size limits.

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use tower_http::limit::RequestBodyLimitLayer;

use crate::config::ApiConfig;
use crate::error::AppError;

/// Limit layer for `route`, using its override when one is configured.
///
/// Each route carries exactly one of these, so an override replaces the
/// global limit instead of stacking under it.
pub fn for_route(config: &ApiConfig, route: &str) -> RequestBodyLimitLayer {
    RequestBodyLimitLayer::new(config.body_limit_for(route))
}

/// Rewrite the plain-text 413 produced by a rejected `Content-Length` into
/// the JSON error body.
pub async fn payload_too_large_as_json(response: Response) -> Response {
    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"));
    if response.status() == StatusCode::PAYLOAD_TOO_LARGE && !is_json {
        return AppError::PayloadTooLarge.into_response();
    }
    response
}
