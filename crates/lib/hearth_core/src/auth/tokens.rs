//! Record token codec.
//!
//! Tokens are HS256 JWTs. The signing key is the record's current `tokenKey`
//! concatenated with the collection secret for the token's purpose, so a
//! token only verifies while both secrets are unchanged. Rotating a record's
//! token key revokes every token issued for it.

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{Collection, Record};

/// Token codec errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("invalid token signature")]
    InvalidSignature,

    #[error("token expired")]
    Expired,

    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("token encode: {0}")]
    Encode(String),
}

/// Token purpose, serialized as the `type` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TokenKind {
    Auth,
    Verification,
    PasswordReset,
    EmailChange,
    File,
}

/// Claims shared by every token purpose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimsHeader {
    pub id: String,
    pub collection_id: String,
    /// Absolute expiry (unix seconds), set when signing.
    #[serde(default)]
    pub exp: i64,
}

impl ClaimsHeader {
    fn for_record(record: &Record) -> Self {
        Self {
            id: record.id.clone(),
            collection_id: record.collection_id.clone(),
            exp: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthClaims {
    #[serde(flatten)]
    pub header: ClaimsHeader,
    #[serde(default)]
    pub refreshable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationClaims {
    #[serde(flatten)]
    pub header: ClaimsHeader,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordResetClaims {
    #[serde(flatten)]
    pub header: ClaimsHeader,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailChangeClaims {
    #[serde(flatten)]
    pub header: ClaimsHeader,
    /// The record email at issuance, to detect stale tokens.
    pub email: String,
    pub new_email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileClaims {
    #[serde(flatten)]
    pub header: ClaimsHeader,
}

/// Claim set of a record token, dispatched on the `type` claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TokenClaims {
    Auth(AuthClaims),
    Verification(VerificationClaims),
    PasswordReset(PasswordResetClaims),
    EmailChange(EmailChangeClaims),
    File(FileClaims),
}

impl TokenClaims {
    pub fn auth(record: &Record, refreshable: bool) -> Self {
        TokenClaims::Auth(AuthClaims {
            header: ClaimsHeader::for_record(record),
            refreshable,
        })
    }

    pub fn verification(record: &Record) -> Self {
        TokenClaims::Verification(VerificationClaims {
            header: ClaimsHeader::for_record(record),
            email: record.email.clone(),
        })
    }

    pub fn password_reset(record: &Record) -> Self {
        TokenClaims::PasswordReset(PasswordResetClaims {
            header: ClaimsHeader::for_record(record),
            email: record.email.clone(),
        })
    }

    pub fn email_change(record: &Record, new_email: &str) -> Self {
        TokenClaims::EmailChange(EmailChangeClaims {
            header: ClaimsHeader::for_record(record),
            email: record.email.clone(),
            new_email: new_email.to_string(),
        })
    }

    pub fn file(record: &Record) -> Self {
        TokenClaims::File(FileClaims {
            header: ClaimsHeader::for_record(record),
        })
    }

    pub fn kind(&self) -> TokenKind {
        match self {
            TokenClaims::Auth(_) => TokenKind::Auth,
            TokenClaims::Verification(_) => TokenKind::Verification,
            TokenClaims::PasswordReset(_) => TokenKind::PasswordReset,
            TokenClaims::EmailChange(_) => TokenKind::EmailChange,
            TokenClaims::File(_) => TokenKind::File,
        }
    }

    pub fn header(&self) -> &ClaimsHeader {
        match self {
            TokenClaims::Auth(c) => &c.header,
            TokenClaims::Verification(c) => &c.header,
            TokenClaims::PasswordReset(c) => &c.header,
            TokenClaims::EmailChange(c) => &c.header,
            TokenClaims::File(c) => &c.header,
        }
    }

    fn header_mut(&mut self) -> &mut ClaimsHeader {
        match self {
            TokenClaims::Auth(c) => &mut c.header,
            TokenClaims::Verification(c) => &mut c.header,
            TokenClaims::PasswordReset(c) => &mut c.header,
            TokenClaims::EmailChange(c) => &mut c.header,
            TokenClaims::File(c) => &mut c.header,
        }
    }
}

/// Signing key: `tokenKey ++ purposeSecret`.
fn signing_key(token_key: &str, secret: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(token_key.len() + secret.len());
    key.extend_from_slice(token_key.as_bytes());
    key.extend_from_slice(secret.as_bytes());
    key
}

fn map_jwt_error(e: jsonwebtoken::errors::Error) -> TokenError {
    match e.kind() {
        ErrorKind::InvalidSignature => TokenError::InvalidSignature,
        ErrorKind::ExpiredSignature => TokenError::Expired,
        _ => TokenError::Malformed(e.to_string()),
    }
}

/// Sign `claims`, setting `exp` to now + `duration` seconds.
pub fn sign(
    mut claims: TokenClaims,
    secret: &str,
    token_key: &str,
    duration: i64,
) -> Result<String, TokenError> {
    claims.header_mut().exp = Utc::now().timestamp() + duration;
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(&signing_key(token_key, secret)),
    )
    .map_err(|e| TokenError::Encode(e.to_string()))
}

/// Verify signature and expiry, returning the claims.
pub fn verify(token: &str, secret: &str, token_key: &str) -> Result<TokenClaims, TokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.set_required_spec_claims(&["exp"]);
    decode::<TokenClaims>(
        token,
        &DecodingKey::from_secret(&signing_key(token_key, secret)),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(map_jwt_error)
}

/// Decode claims without checking signature or expiry.
///
/// Only used to find which record and collection to verify against; the
/// result must never be trusted on its own.
pub fn parse_unverified(token: &str) -> Result<TokenClaims, TokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.required_spec_claims.clear();
    decode::<TokenClaims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims)
        .map_err(map_jwt_error)
}

/// Issue a token for `record` using the collection's options for the claims' purpose.
pub fn issue(
    record: &Record,
    collection: &Collection,
    claims: TokenClaims,
) -> Result<String, TokenError> {
    let options = collection.token_options(claims.kind());
    sign(claims, &options.secret, &record.token_key, options.duration)
}

/// Issue a token with an explicit lifetime (seconds).
pub fn issue_with_duration(
    record: &Record,
    collection: &Collection,
    claims: TokenClaims,
    duration: i64,
) -> Result<String, TokenError> {
    let options = collection.token_options(claims.kind());
    sign(claims, &options.secret, &record.token_key, duration)
}

/// Verify a token of purpose `kind` against `record`'s current token key.
pub fn verify_for(
    token: &str,
    record: &Record,
    collection: &Collection,
    kind: TokenKind,
) -> Result<TokenClaims, TokenError> {
    let options = collection.token_options(kind);
    let claims = verify(token, &options.secret, &record.token_key)?;
    if claims.kind() != kind {
        return Err(TokenError::Malformed(format!(
            "expected {kind:?} token, got {:?}",
            claims.kind()
        )));
    }
    if claims.header().id != record.id || claims.header().collection_id != collection.id {
        return Err(TokenError::Malformed("token subject mismatch".into()));
    }
    Ok(claims)
}
