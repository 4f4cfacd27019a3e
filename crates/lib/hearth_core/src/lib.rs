//! # hearth_core
//!
//! Core domain logic for Hearth: record tokens, request identity, route
//! guards, rate limiting, the hook pipeline and the record-auth flows'
//! supporting services.

pub mod app;
pub mod auth;
pub mod cron;
pub mod error;
pub mod hooks;
pub mod mailer;
pub mod models;
pub mod ratelimit;
pub mod settings;
pub mod store;

pub use app::{App, Transaction};
pub use error::{Error, Result};

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
