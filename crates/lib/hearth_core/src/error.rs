//! Request-level error type shared by hooks, flows and the HTTP layer.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

use crate::auth::tokens::TokenError;
use crate::mailer::MailerError;
use crate::store::StoreError;

/// Convenience alias used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

pub const VALIDATION_REQUIRED: &str = "validation_required";
pub const VALIDATION_INVALID_TOKEN: &str = "validation_invalid_token";
pub const VALIDATION_TOKEN_COLLECTION_MISMATCH: &str = "validation_token_collection_mismatch";
pub const VALIDATION_INVALID_PASSWORD: &str = "validation_invalid_password";
pub const VALIDATION_INVALID_NEW_EMAIL: &str = "validation_invalid_new_email";
pub const VALIDATION_INVALID_EMAIL: &str = "validation_invalid_email";
pub const VALIDATION_MIN_VALUE: &str = "validation_min_value";
pub const VALIDATION_MAX_VALUE: &str = "validation_max_value";

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub code: String,
    pub message: String,
}

/// Field name → failure, ordered by field name for stable output.
pub type FieldErrors = BTreeMap<String, FieldError>;

/// Errors surfaced to the caller of a request.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to validate the submitted data")]
    Validation(FieldErrors),

    #[error("{0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Too many requests")]
    TooManyRequests,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Validation error for a single field.
    pub fn field(name: &str, code: &str, message: &str) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(
            name.to_string(),
            FieldError {
                code: code.to_string(),
                message: message.to_string(),
            },
        );
        Error::Validation(errors)
    }

    /// The invalid/expired/wrong-purpose token error reported on `field`.
    pub fn invalid_token(field: &str) -> Self {
        Error::field(field, VALIDATION_INVALID_TOKEN, "Invalid or expired token.")
    }
}

/// Accumulates field errors while validating a request body.
#[derive(Debug, Default)]
pub struct Validator {
    errors: FieldErrors,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `validation_required` for `name` when `value` is blank.
    pub fn required(&mut self, name: &str, value: &str) -> &mut Self {
        if value.trim().is_empty() {
            self.add(name, VALIDATION_REQUIRED, "Cannot be blank.");
        }
        self
    }

    pub fn add(&mut self, name: &str, code: &str, message: &str) -> &mut Self {
        self.errors.entry(name.to_string()).or_insert(FieldError {
            code: code.to_string(),
            message: message.to_string(),
        });
        self
    }

    pub fn has(&self, name: &str) -> bool {
        self.errors.contains_key(name)
    }

    pub fn finish(&mut self) -> Result<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(std::mem::take(&mut self.errors)))
        }
    }
}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(msg) => Error::NotFound(msg),
            StoreError::Conflict(msg) => Error::BadRequest(msg),
            StoreError::Internal(msg) => Error::Internal(msg),
        }
    }
}

impl From<TokenError> for Error {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Encode(msg) => Error::Internal(msg),
            _ => Error::invalid_token("token"),
        }
    }
}

impl From<MailerError> for Error {
    fn from(e: MailerError) -> Self {
        Error::Internal(e.to_string())
    }
}
