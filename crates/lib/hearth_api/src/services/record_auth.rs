//! Record auth flows: token refresh, impersonation, email change and
//! verification.
//!
//! Every flow runs the same way: resolve the auth collection from the route
//! (404 when missing or not an auth collection), count the request against
//! the rate limiter, validate the body, then trigger the flow's hook with a
//! final step doing the actual work. Record writes in final steps go through
//! a transaction so a hook handler wrapping them can veto the change.

use futures_util::future::BoxFuture;
use hearth_core::App;
use hearth_core::auth::AuthContext;
use hearth_core::auth::tokens::{self, TokenClaims, TokenKind};
use hearth_core::error::{
    Error, Result, VALIDATION_INVALID_EMAIL, VALIDATION_INVALID_NEW_EMAIL,
    VALIDATION_INVALID_PASSWORD, VALIDATION_MAX_VALUE, VALIDATION_MIN_VALUE,
    VALIDATION_TOKEN_COLLECTION_MISMATCH, Validator,
};
use hearth_core::hooks::{
    AuthResponse, MailerRecordEvent, RecordAuthRefreshRequestEvent, RecordAuthRequestEvent,
    RecordConfirmEmailChangeRequestEvent, RecordConfirmVerificationRequestEvent,
    RecordRequestEmailChangeRequestEvent,
};
use hearth_core::mailer;
use hearth_core::models::{Collection, Record};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

/// Rate limit action names.
pub const ACTION_AUTH_REFRESH: &str = "authRefresh";
pub const ACTION_IMPERSONATE: &str = "impersonate";
pub const ACTION_REQUEST_EMAIL_CHANGE: &str = "requestEmailChange";
pub const ACTION_CONFIRM_EMAIL_CHANGE: &str = "confirmEmailChange";
pub const ACTION_CONFIRM_VERIFICATION: &str = "confirmVerification";

/// Longest impersonation token lifetime (seconds): ten years.
pub const MAX_IMPERSONATE_DURATION: i64 = 10 * 365 * 24 * 60 * 60;

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ImpersonateBody {
    /// Token lifetime in seconds; 0 means the collection default.
    pub duration: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RequestEmailChangeBody {
    pub new_email: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConfirmEmailChangeBody {
    pub token: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConfirmVerificationBody {
    pub token: String,
}

/// Parse a JSON request body. An empty body is the default value.
pub fn parse_body<T: DeserializeOwned + Default>(body: &[u8]) -> Result<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| {
        debug!(error = %e, "invalid request body");
        Error::BadRequest("Failed to load the submitted data due to invalid formatting.".into())
    })
}

/// Minimal address check: `local@domain.tld`, no whitespace.
pub fn is_valid_email(email: &str) -> bool {
    if email.len() > 254 || email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && domain.split('.').all(|label| !label.is_empty())
}

// ---------------------------------------------------------------------------
// Shared steps
// ---------------------------------------------------------------------------

fn missing_collection() -> Error {
    Error::NotFound("Missing or invalid auth collection context.".into())
}

async fn find_auth_collection(app: &App, name_or_id: &str) -> Result<Collection> {
    let collection = app
        .find_collection(name_or_id)
        .await
        .map_err(|_| missing_collection())?;
    if !collection.is_auth() {
        return Err(missing_collection());
    }
    Ok(collection)
}

/// Load and verify a `kind` token for `collection`.
///
/// Structural problems, expiry and signature failures all report
/// `validation_invalid_token`; a valid token for another collection reports
/// `validation_token_collection_mismatch`.
async fn load_token_record(
    app: &App,
    collection: &Collection,
    token: &str,
    kind: TokenKind,
) -> Result<(Record, TokenClaims)> {
    let invalid = || Error::invalid_token("token");

    let claims = tokens::parse_unverified(token).map_err(|_| invalid())?;
    if claims.kind() != kind {
        return Err(invalid());
    }
    let token_collection = app
        .find_collection(&claims.header().collection_id)
        .await
        .map_err(|_| invalid())?;
    let record = app
        .find_record(&token_collection.id, &claims.header().id)
        .await
        .map_err(|_| invalid())?;
    let claims = tokens::verify_for(token, &record, &token_collection, kind)?;

    if token_collection.id != collection.id {
        return Err(Error::field(
            "token",
            VALIDATION_TOKEN_COLLECTION_MISMATCH,
            "The provided token is for different auth collection.",
        ));
    }
    Ok((record, claims))
}

/// Trigger `on_record_auth_request` and return the auth response it builds.
///
/// `None` when a handler ended the chain without producing a response.
pub async fn record_auth_response(
    app: &App,
    collection: Collection,
    record: Record,
    token: String,
    auth_method: &str,
) -> Result<Option<AuthResponse>> {
    let mut event = RecordAuthRequestEvent {
        app: app.clone(),
        collection,
        record,
        token,
        auth_method: auth_method.to_string(),
        meta: None,
        response: None,
    };
    app.hooks()
        .on_record_auth_request
        .trigger(&mut event, build_auth_response)
        .await?;
    Ok(event.response)
}

fn build_auth_response(e: &mut RecordAuthRequestEvent) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        e.response = Some(AuthResponse {
            token: e.token.clone(),
            record: e.record.clone(),
            meta: e.meta.clone(),
        });
        Ok(())
    })
}

// ---------------------------------------------------------------------------
// Auth refresh
// ---------------------------------------------------------------------------

/// Re-issue the caller's auth token.
///
/// Refreshable tokens are replaced with a fresh refreshable token.
/// Non-refreshable tokens are handed back unchanged.
pub async fn auth_refresh(
    app: &App,
    collection: &str,
    auth: &AuthContext,
    client: &str,
) -> Result<Option<AuthResponse>> {
    let identity = auth.identity().cloned().ok_or_else(|| {
        Error::Unauthorized("The request requires valid record authorization token.".into())
    })?;
    let collection = find_auth_collection(app, collection).await?;
    app.check_rate_limit(&collection.name, ACTION_AUTH_REFRESH, client)
        .await?;

    let mut event = RecordAuthRefreshRequestEvent {
        app: app.clone(),
        collection,
        record: identity.record.clone(),
        auth: identity,
        response: None,
    };
    app.hooks()
        .on_record_auth_refresh_request
        .trigger(&mut event, refresh_token)
        .await?;
    Ok(event.response)
}

fn refresh_token(e: &mut RecordAuthRefreshRequestEvent) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        if e.collection.only_verified && !e.record.verified {
            return Err(Error::Forbidden("Please verify your account first.".into()));
        }
        let token = if e.auth.refreshable {
            tokens::issue(&e.record, &e.collection, TokenClaims::auth(&e.record, true))?
        } else {
            e.auth.token.clone()
        };
        e.response = record_auth_response(
            &e.app,
            e.collection.clone(),
            e.record.clone(),
            token,
            "refresh",
        )
        .await?;
        Ok(())
    })
}

// ---------------------------------------------------------------------------
// Impersonate
// ---------------------------------------------------------------------------

/// Issue a non-refreshable auth token for record `id` on behalf of a superuser.
pub async fn impersonate(
    app: &App,
    collection: &str,
    id: &str,
    body: &[u8],
    client: &str,
) -> Result<Option<AuthResponse>> {
    let collection = find_auth_collection(app, collection).await?;
    app.check_rate_limit(&collection.name, ACTION_IMPERSONATE, client)
        .await?;

    let body: ImpersonateBody = parse_body(body)?;
    if body.duration < 0 {
        return Err(Error::field(
            "duration",
            VALIDATION_MIN_VALUE,
            "Must be no less than 0.",
        ));
    }
    if body.duration > MAX_IMPERSONATE_DURATION {
        return Err(Error::field(
            "duration",
            VALIDATION_MAX_VALUE,
            &format!("Must be no greater than {MAX_IMPERSONATE_DURATION}."),
        ));
    }

    let record = app
        .find_record(&collection.id, id)
        .await
        .map_err(|_| Error::NotFound("The requested resource wasn't found.".into()))?;

    let claims = TokenClaims::auth(&record, false);
    let token = if body.duration > 0 {
        tokens::issue_with_duration(&record, &collection, claims, body.duration)?
    } else {
        tokens::issue(&record, &collection, claims)?
    };

    record_auth_response(app, collection, record, token, "impersonate").await
}

// ---------------------------------------------------------------------------
// Email change
// ---------------------------------------------------------------------------

/// Send an email change confirmation link to the requested new address.
pub async fn request_email_change(
    app: &App,
    collection: &str,
    auth: &AuthContext,
    body: &[u8],
    client: &str,
) -> Result<()> {
    let record = auth.record().cloned().ok_or_else(|| {
        Error::Unauthorized("The request requires valid record authorization token.".into())
    })?;
    let collection = find_auth_collection(app, collection).await?;
    app.check_rate_limit(&collection.name, ACTION_REQUEST_EMAIL_CHANGE, client)
        .await?;

    let body: RequestEmailChangeBody = parse_body(body)?;
    let mut v = Validator::new();
    v.required("newEmail", &body.new_email);
    if !v.has("newEmail") && !is_valid_email(&body.new_email) {
        v.add(
            "newEmail",
            VALIDATION_INVALID_EMAIL,
            "Must be a valid email address.",
        );
    }
    if !v.has("newEmail")
        && app
            .find_auth_record_by_email(&collection.id, &body.new_email)
            .await?
            .is_some()
    {
        v.add(
            "newEmail",
            VALIDATION_INVALID_NEW_EMAIL,
            "Invalid new email address.",
        );
    }
    v.finish()?;

    let mut event = RecordRequestEmailChangeRequestEvent {
        app: app.clone(),
        collection,
        record,
        new_email: body.new_email,
    };
    app.hooks()
        .on_record_request_email_change_request
        .trigger(&mut event, send_email_change)
        .await
}

fn send_email_change(e: &mut RecordRequestEmailChangeRequestEvent) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let token = tokens::issue(
            &e.record,
            &e.collection,
            TokenClaims::email_change(&e.record, &e.new_email),
        )?;
        let settings = e.app.settings().await;
        let message = mailer::email_change_message(&settings.meta, &e.record, &e.new_email, &token);

        let mut meta = Map::new();
        meta.insert("token".into(), Value::String(token));
        meta.insert("newEmail".into(), Value::String(e.new_email.clone()));
        let mut mail = MailerRecordEvent {
            app: e.app.clone(),
            record: e.record.clone(),
            message,
            meta,
        };
        e.app
            .hooks()
            .on_mailer_record_email_change_send
            .trigger(&mut mail, deliver_mail)
            .await
    })
}

fn deliver_mail(e: &mut MailerRecordEvent) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        e.app.mailer().send(&e.message).await?;
        Ok(())
    })
}

/// Apply a confirmed email change. Marks the record verified and rotates its
/// token key, revoking every token issued before the change.
pub async fn confirm_email_change(
    app: &App,
    collection: &str,
    body: &[u8],
    client: &str,
) -> Result<()> {
    let collection = find_auth_collection(app, collection).await?;
    app.check_rate_limit(&collection.name, ACTION_CONFIRM_EMAIL_CHANGE, client)
        .await?;

    let body: ConfirmEmailChangeBody = parse_body(body)?;
    Validator::new()
        .required("token", &body.token)
        .required("password", &body.password)
        .finish()?;

    let (record, claims) =
        load_token_record(app, &collection, &body.token, TokenKind::EmailChange).await?;
    let TokenClaims::EmailChange(claims) = claims else {
        return Err(Error::invalid_token("token"));
    };
    if claims.email != record.email {
        return Err(Error::invalid_token("token"));
    }
    if !record.validate_password(&body.password) {
        return Err(Error::field(
            "password",
            VALIDATION_INVALID_PASSWORD,
            "Missing or invalid auth record password.",
        ));
    }
    if app
        .find_auth_record_by_email(&collection.id, &claims.new_email)
        .await?
        .is_some()
    {
        return Err(Error::field(
            "token",
            VALIDATION_INVALID_NEW_EMAIL,
            "The new email address is already in use.",
        ));
    }

    let mut event = RecordConfirmEmailChangeRequestEvent {
        app: app.clone(),
        collection,
        record,
        new_email: claims.new_email,
    };
    app.hooks()
        .on_record_confirm_email_change_request
        .trigger(&mut event, apply_email_change)
        .await
}

fn apply_email_change(e: &mut RecordConfirmEmailChangeRequestEvent) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let mut record = e.record.clone();
        record.email = e.new_email.clone();
        record.verified = true;
        record.refresh_token_key();

        let tx = e.app.begin();
        let saved = tx.app().save_record(record).await?;
        tx.commit().await?;
        e.record = saved;
        Ok(())
    })
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

/// Mark the token's record as verified. Already verified records are left
/// untouched, so repeating the call fires no model events.
pub async fn confirm_verification(
    app: &App,
    collection: &str,
    body: &[u8],
    client: &str,
) -> Result<()> {
    let collection = find_auth_collection(app, collection).await?;
    app.check_rate_limit(&collection.name, ACTION_CONFIRM_VERIFICATION, client)
        .await?;

    let body: ConfirmVerificationBody = parse_body(body)?;
    Validator::new().required("token", &body.token).finish()?;

    let (record, claims) =
        load_token_record(app, &collection, &body.token, TokenKind::Verification).await?;
    let TokenClaims::Verification(claims) = claims else {
        return Err(Error::invalid_token("token"));
    };
    if claims.email != record.email {
        return Err(Error::invalid_token("token"));
    }

    let mut event = RecordConfirmVerificationRequestEvent {
        app: app.clone(),
        collection,
        record,
    };
    app.hooks()
        .on_record_confirm_verification_request
        .trigger(&mut event, mark_verified)
        .await
}

fn mark_verified(e: &mut RecordConfirmVerificationRequestEvent) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        if e.record.verified {
            return Ok(());
        }
        let mut record = e.record.clone();
        record.verified = true;

        let tx = e.app.begin();
        let saved = tx.app().save_record(record).await?;
        tx.commit().await?;
        e.record = saved;
        Ok(())
    })
}
