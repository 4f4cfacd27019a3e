//! Integration tests: `POST /api/collections/{collection}/confirm-verification`.

mod common;

use axum::http::StatusCode;
use common::{TestApp, post};
use hearth_core::error::Error;
use hearth_core::settings::RateLimitRule;

const CONFIRM: &str = "/api/collections/users/confirm-verification";

fn body(token: &str) -> String {
    serde_json::json!({ "token": token }).to_string()
}

#[tokio::test]
async fn unknown_or_base_collection_is_not_found() {
    let t = TestApp::new();
    let token = t.verification_token(&t.user);
    for uri in [
        "/api/collections/missing/confirm-verification",
        "/api/collections/demo1/confirm-verification",
    ] {
        let resp = post(t.router(), uri, None, Some(&body(&token))).await;
        assert_eq!(resp.status, StatusCode::NOT_FOUND, "{uri}");
    }
    t.events.assert_exact(&[]);
}

#[tokio::test]
async fn token_is_required() {
    let t = TestApp::new();
    for payload in [None, Some(r#"{"token":""}"#)] {
        let resp = post(t.router(), CONFIRM, None, payload).await;
        assert_eq!(resp.status, StatusCode::BAD_REQUEST);
        assert_eq!(resp.body["data"]["token"]["code"], "validation_required");
    }
}

#[tokio::test]
async fn invalid_or_wrong_purpose_token_is_rejected() {
    let t = TestApp::new();
    let cases = [
        "invalid".to_string(),
        t.email_change_token(&t.user, "change@example.com"),
        t.auth_token(&t.user, true),
    ];
    for token in cases {
        let resp = post(t.router(), CONFIRM, None, Some(&body(&token))).await;
        assert_eq!(resp.status, StatusCode::BAD_REQUEST);
        assert_eq!(resp.body["data"]["token"]["code"], "validation_invalid_token");
    }
    assert!(!t.reload(&t.user).await.verified);
    t.events.assert_exact(&[]);
}

#[tokio::test]
async fn token_of_other_collection_is_rejected() {
    let t = TestApp::new();
    let token = t.verification_token(&t.client);
    let resp = post(t.router(), CONFIRM, None, Some(&body(&token))).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        resp.body["data"]["token"]["code"],
        "validation_token_collection_mismatch"
    );
    assert!(!t.reload(&t.client).await.verified);
}

#[tokio::test]
async fn token_for_previous_email_is_rejected() {
    let t = TestApp::new();
    let token = t.verification_token(&t.user);
    let mut record = t.user.clone();
    record.email = "moved@example.com".into();
    t.store.insert_record(record);

    let resp = post(t.router(), CONFIRM, None, Some(&body(&token))).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.body["data"]["token"]["code"], "validation_invalid_token");
}

#[tokio::test]
async fn unverified_record_becomes_verified() {
    let t = TestApp::new();
    let token = t.verification_token(&t.user);
    let resp = post(t.router(), CONFIRM, None, Some(&body(&token))).await;

    assert_eq!(resp.status, StatusCode::NO_CONTENT);
    assert!(resp.raw.is_empty());
    let stored = t.reload(&t.user).await;
    assert!(stored.verified);
    // Verification does not revoke existing sessions.
    assert_eq!(stored.token_key, t.user.token_key);

    t.events.assert_exact(&[
        ("on_record_after_update_success", 1),
        ("on_record_confirm_verification_request", 1),
        ("on_record_update", 1),
    ]);
}

#[tokio::test]
async fn repeated_confirmation_is_a_no_op() {
    let t = TestApp::new();
    let token = t.verification_token(&t.user);
    let first = post(t.router(), CONFIRM, None, Some(&body(&token))).await;
    assert_eq!(first.status, StatusCode::NO_CONTENT);
    let second = post(t.router(), CONFIRM, None, Some(&body(&token))).await;
    assert_eq!(second.status, StatusCode::NO_CONTENT);

    t.events.assert_exact(&[
        ("on_record_after_update_success", 1),
        ("on_record_confirm_verification_request", 2),
        ("on_record_update", 1),
    ]);
}

#[tokio::test]
async fn already_verified_record_fires_no_model_events() {
    let t = TestApp::new();
    let token = t.verification_token(&t.user2);
    let resp = post(t.router(), CONFIRM, None, Some(&body(&token))).await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);
    t.events
        .assert_exact(&[("on_record_confirm_verification_request", 1)]);
}

#[tokio::test]
async fn works_without_password_auth() {
    let t = TestApp::new();
    let token = t.verification_token(&t.nologin_user);
    let resp = post(
        t.router(),
        "/api/collections/nologin/confirm-verification",
        None,
        Some(&body(&token)),
    )
    .await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);
    assert!(t.reload(&t.nologin_user).await.verified);
}

#[tokio::test]
async fn handler_can_skip_the_update() {
    let t = TestApp::new();
    t.app
        .hooks()
        .on_record_confirm_verification_request
        .bind_fn(|_, _| Box::pin(async { Ok(()) }));

    let token = t.verification_token(&t.user);
    let resp = post(t.router(), CONFIRM, None, Some(&body(&token))).await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);
    assert!(!t.reload(&t.user).await.verified);
    t.events
        .assert_exact(&[("on_record_confirm_verification_request", 1)]);
}

#[tokio::test]
async fn handler_can_veto_verification_inside_transaction() {
    let t = TestApp::new();
    let hook = &t.app.hooks().on_record_confirm_verification_request;
    hook.bind_fn(|e, next| Box::pin(next.run_in_transaction(e)));
    hook.bind_fn(|e, next| {
        Box::pin(async move {
            next.run(e).await?;
            Err(Error::BadRequest("verification vetoed".into()))
        })
    });

    let token = t.verification_token(&t.user);
    let resp = post(t.router(), CONFIRM, None, Some(&body(&token))).await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.body["message"], "verification vetoed");
    assert!(!t.reload(&t.user).await.verified);

    t.events.assert_exact(&[
        ("on_record_confirm_verification_request", 1),
        ("on_record_update", 1),
    ]);
}

#[tokio::test]
async fn rate_limited_per_client() {
    let t = TestApp::new();
    t.enable_rate_limits(vec![RateLimitRule::new("users:confirmVerification", 1, 60)])
        .await;

    let first = post(t.router(), CONFIRM, None, None).await;
    assert_eq!(first.status, StatusCode::BAD_REQUEST);
    let second = post(t.router(), CONFIRM, None, None).await;
    assert_eq!(second.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(second.body["status"], 429);

    // Other collections have no matching rule.
    let other = post(t.router(), "/api/collections/clients/confirm-verification", None, None).await;
    assert_eq!(other.status, StatusCode::BAD_REQUEST);
}
