//! # hearth_api
//!
//! HTTP API library for Hearth: record auth endpoints, cron management and
//! the middleware stack around them.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod services;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware::{from_fn_with_state, map_response};
use axum::routing::{get, post};
use hearth_core::App;
use hearth_core::auth::Guard;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};

use crate::config::ApiConfig;
use crate::handlers::{crons, health, record_auth};
use crate::middleware::body_limit;
use crate::middleware::guards::enforce_guard;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application handle: store, hooks, settings, mailer, cron.
    pub app: App,
    /// API configuration.
    pub config: ApiConfig,
}

pub const HEALTH_ROUTE: &str = "/api/health";
pub const CRONS_ROUTE: &str = "/api/crons";
pub const CRON_RUN_ROUTE: &str = "/api/crons/{id}";
pub const AUTH_REFRESH_ROUTE: &str = "/api/collections/{collection}/auth-refresh";
pub const IMPERSONATE_ROUTE: &str = "/api/collections/{collection}/impersonate/{id}";
pub const REQUEST_EMAIL_CHANGE_ROUTE: &str = "/api/collections/{collection}/request-email-change";
pub const CONFIRM_EMAIL_CHANGE_ROUTE: &str = "/api/collections/{collection}/confirm-email-change";
pub const CONFIRM_VERIFICATION_ROUTE: &str = "/api/collections/{collection}/confirm-verification";

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let same_collection = || from_fn_with_state(Guard::same_collection_context(), enforce_guard);
    let superuser = || from_fn_with_state(Guard::SuperuserAuth, enforce_guard);
    let limit = |route: &str| body_limit::for_route(&state.config, route);

    let record_auth_routes = Router::new()
        .route(
            AUTH_REFRESH_ROUTE,
            post(record_auth::auth_refresh_handler)
                .route_layer(same_collection())
                .layer(limit(AUTH_REFRESH_ROUTE)),
        )
        .route(
            IMPERSONATE_ROUTE,
            post(record_auth::impersonate_handler)
                .route_layer(superuser())
                .layer(limit(IMPERSONATE_ROUTE)),
        )
        .route(
            REQUEST_EMAIL_CHANGE_ROUTE,
            post(record_auth::request_email_change_handler)
                .route_layer(same_collection())
                .layer(limit(REQUEST_EMAIL_CHANGE_ROUTE)),
        )
        .route(
            CONFIRM_EMAIL_CHANGE_ROUTE,
            post(record_auth::confirm_email_change_handler)
                .layer(limit(CONFIRM_EMAIL_CHANGE_ROUTE)),
        )
        .route(
            CONFIRM_VERIFICATION_ROUTE,
            post(record_auth::confirm_verification_handler)
                .layer(limit(CONFIRM_VERIFICATION_ROUTE)),
        );

    let cron_routes = Router::new()
        .route(
            CRONS_ROUTE,
            get(crons::list_crons_handler)
                .route_layer(superuser())
                .layer(limit(CRONS_ROUTE)),
        )
        .route(
            CRON_RUN_ROUTE,
            post(crons::run_cron_handler)
                .route_layer(superuser())
                .layer(limit(CRON_RUN_ROUTE)),
        );

    // Body limits live on each route. The extractor default is disabled so
    // it cannot cap a raised override.
    Router::new()
        .route(
            HEALTH_ROUTE,
            get(health::health_handler).layer(limit(HEALTH_ROUTE)),
        )
        .merge(record_auth_routes)
        .merge(cron_routes)
        .layer(from_fn_with_state(state.clone(), middleware::auth::load_auth))
        .layer(DefaultBodyLimit::disable())
        .layer(map_response(body_limit::payload_too_large_as_json))
        .layer(CatchPanicLayer::custom(middleware::panic::handle_panic))
        .layer(cors)
        .with_state(state)
}
