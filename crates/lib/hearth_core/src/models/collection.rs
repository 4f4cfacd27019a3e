//! Collection model and per-purpose token options.

use serde::{Deserialize, Serialize};

use super::{random_id, random_secret};
use crate::auth::tokens::TokenKind;

/// Name of the system collection holding superuser accounts.
pub const SUPERUSERS_COLLECTION: &str = "_superusers";

/// Length of generated purpose secrets.
const SECRET_LENGTH: usize = 50;

/// Default token lifetimes (seconds).
const AUTH_TOKEN_DURATION: i64 = 7 * 24 * 60 * 60;
const VERIFICATION_TOKEN_DURATION: i64 = 3 * 24 * 60 * 60;
const PASSWORD_RESET_TOKEN_DURATION: i64 = 30 * 60;
const EMAIL_CHANGE_TOKEN_DURATION: i64 = 30 * 60;
const FILE_TOKEN_DURATION: i64 = 3 * 60;

/// Collection kind. Only auth collections can own signed tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CollectionKind {
    Base,
    Auth,
}

/// Signing secret and lifetime for one token purpose.
#[derive(Clone, Serialize, Deserialize)]
pub struct TokenOptions {
    pub secret: String,
    /// Lifetime in seconds.
    pub duration: i64,
}

impl TokenOptions {
    fn generate(duration: i64) -> Self {
        Self {
            secret: random_secret(SECRET_LENGTH),
            duration,
        }
    }
}

impl std::fmt::Debug for TokenOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenOptions")
            .field("secret", &"[REDACTED]")
            .field("duration", &self.duration)
            .finish()
    }
}

/// A record collection.
///
/// Every purpose secret is independent: leaking the verification secret does
/// not let anyone mint auth tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub id: String,
    pub name: String,
    pub kind: CollectionKind,
    /// Refuse auth refresh for unverified records.
    pub only_verified: bool,
    /// Whether password login is enabled. Verification works regardless.
    pub password_auth: bool,
    pub auth_token: TokenOptions,
    pub verification_token: TokenOptions,
    pub password_reset_token: TokenOptions,
    pub email_change_token: TokenOptions,
    pub file_token: TokenOptions,
}

impl Collection {
    fn with_kind(name: &str, kind: CollectionKind) -> Self {
        Self {
            id: random_id(),
            name: name.to_string(),
            kind,
            only_verified: false,
            password_auth: kind == CollectionKind::Auth,
            auth_token: TokenOptions::generate(AUTH_TOKEN_DURATION),
            verification_token: TokenOptions::generate(VERIFICATION_TOKEN_DURATION),
            password_reset_token: TokenOptions::generate(PASSWORD_RESET_TOKEN_DURATION),
            email_change_token: TokenOptions::generate(EMAIL_CHANGE_TOKEN_DURATION),
            file_token: TokenOptions::generate(FILE_TOKEN_DURATION),
        }
    }

    /// New auth collection with freshly generated purpose secrets.
    pub fn new_auth(name: &str) -> Self {
        Self::with_kind(name, CollectionKind::Auth)
    }

    /// New plain data collection.
    pub fn new_base(name: &str) -> Self {
        Self::with_kind(name, CollectionKind::Base)
    }

    pub fn is_auth(&self) -> bool {
        self.kind == CollectionKind::Auth
    }

    pub fn is_superusers(&self) -> bool {
        self.name == SUPERUSERS_COLLECTION
    }

    /// Whether `name_or_id` refers to this collection.
    pub fn matches(&self, name_or_id: &str) -> bool {
        self.id == name_or_id || self.name == name_or_id
    }

    /// Options for the given token purpose.
    pub fn token_options(&self, kind: TokenKind) -> &TokenOptions {
        match kind {
            TokenKind::Auth => &self.auth_token,
            TokenKind::Verification => &self.verification_token,
            TokenKind::PasswordReset => &self.password_reset_token,
            TokenKind::EmailChange => &self.email_change_token,
            TokenKind::File => &self.file_token,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn purpose_secrets_are_independent() {
        let c = Collection::new_auth("users");
        let secrets = [
            &c.auth_token.secret,
            &c.verification_token.secret,
            &c.password_reset_token.secret,
            &c.email_change_token.secret,
            &c.file_token.secret,
        ];
        for (i, a) in secrets.iter().enumerate() {
            for b in &secrets[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn matches_name_or_id() {
        let c = Collection::new_auth("users");
        assert!(c.matches("users"));
        assert!(c.matches(&c.id));
        assert!(!c.matches("clients"));
    }

    #[test]
    fn debug_redacts_secrets() {
        let c = Collection::new_base("demo");
        let out = format!("{c:?}");
        assert!(!out.contains(&c.auth_token.secret));
        assert!(out.contains("[REDACTED]"));
    }
}
