//! Turns an `Authorization` header into an [`AuthContext`].
//!
//! Resolution never fails the request: any problem with the token simply
//! leaves the caller a guest. Guards decide later whether a guest is allowed.

use tracing::debug;

use super::context::{AuthContext, AuthIdentity};
use super::tokens::{self, TokenClaims, TokenKind};
use crate::app::App;
use crate::error::{Error, Result};

/// Strip an optional case-insensitive `Bearer ` prefix. Blank means no token.
pub fn extract_token(header: &str) -> Option<&str> {
    let header = header.trim();
    let token = match header.get(..7) {
        Some(prefix) if prefix.eq_ignore_ascii_case("bearer ") => header[7..].trim_start(),
        _ => header,
    };
    (!token.is_empty()).then_some(token)
}

/// Resolve the caller identity from the raw `Authorization` header value.
pub async fn resolve(app: &App, header: Option<&str>) -> AuthContext {
    let Some(token) = header.and_then(extract_token) else {
        return AuthContext::guest();
    };
    match identify(app, token).await {
        Ok(identity) => AuthContext::authenticated(identity),
        Err(e) => {
            debug!(error = %e, "auth token rejected, continuing as guest");
            AuthContext::guest()
        }
    }
}

async fn identify(app: &App, token: &str) -> Result<AuthIdentity> {
    let TokenClaims::Auth(claims) = tokens::parse_unverified(token)? else {
        return Err(Error::Unauthorized("not an auth token".into()));
    };
    let collection = app.find_collection(&claims.header.collection_id).await?;
    if !collection.is_auth() {
        return Err(Error::Unauthorized("not an auth collection".into()));
    }
    let record = app.find_record(&collection.id, &claims.header.id).await?;
    let TokenClaims::Auth(verified) =
        tokens::verify_for(token, &record, &collection, TokenKind::Auth)?
    else {
        return Err(Error::Unauthorized("not an auth token".into()));
    };
    Ok(AuthIdentity {
        record,
        collection,
        token: token.to_string(),
        refreshable: verified.refreshable,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::mailer::TestMailer;
    use crate::models::{Collection, Record};
    use crate::settings::Settings;
    use crate::store::MemoryStore;

    struct Fixture {
        app: App,
        users: Collection,
        record: Record,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let users = Collection::new_auth("users");
        let demo = Collection::new_base("demo1");
        let mut record = Record::new(&users);
        record.email = "test@example.com".into();
        store.insert_collection(users.clone());
        store.insert_collection(demo);
        store.insert_record(record.clone());
        Fixture {
            app: App::new(store, Arc::new(TestMailer::new()), Settings::default()),
            users,
            record,
        }
    }

    #[test]
    fn extracts_bearer_case_insensitively() {
        assert_eq!(extract_token("Bearer abc"), Some("abc"));
        assert_eq!(extract_token("bEaReR abc"), Some("abc"));
        assert_eq!(extract_token("abc"), Some("abc"));
        assert_eq!(extract_token("  "), None);
        assert_eq!(extract_token("Bearer "), None);
    }

    #[tokio::test]
    async fn valid_token_resolves_identity() {
        let f = fixture();
        let token = tokens::issue(&f.record, &f.users, TokenClaims::auth(&f.record, true)).unwrap();
        let header = format!("Bearer {token}");

        let ctx = resolve(&f.app, Some(&header)).await;
        let identity = ctx.identity().unwrap();
        assert_eq!(identity.record.id, f.record.id);
        assert_eq!(identity.token, token);
        assert!(identity.refreshable);
        assert!(!ctx.is_superuser());
    }

    #[tokio::test]
    async fn resolution_is_deterministic() {
        let f = fixture();
        let token = tokens::issue(&f.record, &f.users, TokenClaims::auth(&f.record, false)).unwrap();
        let a = resolve(&f.app, Some(&token)).await;
        let b = resolve(&f.app, Some(&token)).await;
        assert_eq!(a.record().unwrap().id, b.record().unwrap().id);
        assert_eq!(a.identity().unwrap().refreshable, b.identity().unwrap().refreshable);
    }

    #[tokio::test]
    async fn bad_tokens_resolve_to_guest() {
        let f = fixture();
        assert!(resolve(&f.app, None).await.is_guest());
        assert!(resolve(&f.app, Some("garbage")).await.is_guest());

        // wrong purpose
        let verification =
            tokens::issue(&f.record, &f.users, TokenClaims::verification(&f.record)).unwrap();
        assert!(resolve(&f.app, Some(&verification)).await.is_guest());

        // revoked by token key rotation
        let token = tokens::issue(&f.record, &f.users, TokenClaims::auth(&f.record, true)).unwrap();
        let mut rotated = f.record.clone();
        rotated.refresh_token_key();
        f.app.store().save_records(vec![rotated]).await.unwrap();
        assert!(resolve(&f.app, Some(&token)).await.is_guest());
    }

    #[tokio::test]
    async fn unknown_record_resolves_to_guest() {
        let f = fixture();
        let ghost = Record::new(&f.users);
        let token = tokens::issue(&ghost, &f.users, TokenClaims::auth(&ghost, true)).unwrap();
        assert!(resolve(&f.app, Some(&token)).await.is_guest());
    }
}
