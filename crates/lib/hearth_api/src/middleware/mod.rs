//! Request middleware and extractors.

pub mod auth;
pub mod body_limit;
pub mod client;
pub mod guards;
pub mod panic;
