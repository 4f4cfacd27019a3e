//! Request flows shared by the handlers.

pub mod record_auth;
