//! Authentication middleware: resolves the caller identity for every request.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use hearth_core::auth::resolver;

use crate::AppState;

/// Axum middleware: reads `Authorization`, resolves it against the record
/// store and injects the resulting `AuthContext` into request extensions.
///
/// Never rejects. Invalid or missing tokens leave the caller a guest and the
/// route guards decide what guests may do.
pub async fn load_auth(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let auth = resolver::resolve(&state.app, header.as_deref()).await;
    request.extensions_mut().insert(auth);

    next.run(request).await
}
