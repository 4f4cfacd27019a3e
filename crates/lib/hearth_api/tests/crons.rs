//! Integration tests: `/api/crons` listing and manual runs.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use axum::http::StatusCode;
use common::{TestApp, get, post};

fn register(t: &TestApp, id: &str, runs: Arc<AtomicU32>) {
    t.app.cron().add(id, "*/5 * * * *", move || {
        let runs = runs.clone();
        Box::pin(async move {
            runs.fetch_add(1, Ordering::SeqCst);
        })
    });
}

#[tokio::test]
async fn list_requires_superuser() {
    let t = TestApp::new();
    let resp = get(t.router(), "/api/crons", None).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);

    let token = t.auth_token(&t.user, true);
    let resp = get(t.router(), "/api/crons", Some(&token)).await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn list_puts_system_jobs_last() {
    let t = TestApp::new();
    let runs = Arc::new(AtomicU32::new(0));
    for id in ["__b", "test", "a", "__a"] {
        register(&t, id, runs.clone());
    }

    let token = t.auth_token(&t.superuser, true);
    let resp = get(t.router(), "/api/crons", Some(&token)).await;
    assert_eq!(resp.status, StatusCode::OK);

    let ids: Vec<&str> = resp
        .body
        .as_array()
        .unwrap()
        .iter()
        .map(|job| job["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, ["a", "test", "__a", "__b"]);
    assert_eq!(resp.body[0]["expression"], "*/5 * * * *");
    assert_eq!(runs.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn empty_list() {
    let t = TestApp::new();
    let token = t.auth_token(&t.superuser, true);
    let resp = get(t.router(), "/api/crons", Some(&token)).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body, serde_json::json!([]));
}

#[tokio::test]
async fn run_requires_superuser() {
    let t = TestApp::new();
    let runs = Arc::new(AtomicU32::new(0));
    register(&t, "test", runs.clone());

    let resp = post(t.router(), "/api/crons/test", None, None).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    let token = t.auth_token(&t.user2, true);
    let resp = post(t.router(), "/api/crons/test", Some(&token), None).await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(runs.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn run_unknown_job_is_not_found() {
    let t = TestApp::new();
    let token = t.auth_token(&t.superuser, true);
    let resp = post(t.router(), "/api/crons/missing", Some(&token), None).await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert_eq!(resp.body["status"], 404);
}

#[tokio::test]
async fn run_starts_job_in_background() {
    let t = TestApp::new();
    let runs = Arc::new(AtomicU32::new(0));
    register(&t, "test", runs.clone());

    let token = t.auth_token(&t.superuser, true);
    let resp = post(t.router(), "/api/crons/test", Some(&token), None).await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);

    for _ in 0..100 {
        if runs.load(Ordering::SeqCst) == 1 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job did not run");
}

#[tokio::test]
async fn panicking_job_still_responds() {
    let t = TestApp::new();
    t.app.cron().add("broken", "* * * * *", || {
        Box::pin(async {
            if true {
                panic!("job failure");
            }
        })
    });

    let token = t.auth_token(&t.superuser, true);
    let resp = post(t.router(), "/api/crons/broken", Some(&token), None).await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);
}
