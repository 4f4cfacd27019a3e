//! Route guard middleware.
//!
//! Attach with `route_layer(from_fn_with_state(guard, enforce_guard))` so the
//! matched path parameters are available to the guard.

use std::collections::HashMap;

use axum::{
    extract::{RawPathParams, Request, State, rejection::RawPathParamsRejection},
    middleware::Next,
    response::Response,
};
use hearth_core::auth::{AuthContext, Guard};

use crate::error::AppError;

/// Axum middleware: evaluates `guard` against the request's `AuthContext`.
pub async fn enforce_guard(
    State(guard): State<Guard>,
    params: Result<RawPathParams, RawPathParamsRejection>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let params: HashMap<String, String> = params
        .map(|p| {
            p.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        })
        .unwrap_or_default();
    let auth = request
        .extensions()
        .get::<AuthContext>()
        .cloned()
        .unwrap_or_default();

    guard.check(&auth, &params)?;

    Ok(next.run(request).await)
}
