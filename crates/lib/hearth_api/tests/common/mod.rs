//! Shared fixture for the API integration tests.
//!
//! Seeds an in-memory store with auth collections and records, issues tokens
//! through the real token codec and counts every hook event by hook name.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, OnceLock};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use hearth_api::{AppState, config::ApiConfig};
use hearth_core::App;
use hearth_core::auth::password::hash_password;
use hearth_core::auth::tokens::{self, TokenClaims};
use hearth_core::error::Result;
use hearth_core::hooks::{Handler, Next};
use hearth_core::mailer::TestMailer;
use hearth_core::models::{Collection, Record, SUPERUSERS_COLLECTION};
use hearth_core::settings::Settings;
use hearth_core::store::MemoryStore;
use tower::ServiceExt;

pub const PASSWORD: &str = "1234567890";

/// bcrypt is slow; hash the shared fixture password once.
fn password_hash() -> String {
    static HASH: OnceLock<String> = OnceLock::new();
    HASH.get_or_init(|| hash_password(PASSWORD).unwrap()).clone()
}

/// Hook event counts keyed by hook name.
#[derive(Clone, Default)]
pub struct EventCounter(Arc<Mutex<BTreeMap<String, usize>>>);

impl EventCounter {
    fn hit(&self, name: &str) {
        *self.0.lock().unwrap().entry(name.to_string()).or_default() += 1;
    }

    pub fn get(&self, name: &str) -> usize {
        self.0.lock().unwrap().get(name).copied().unwrap_or(0)
    }

    pub fn snapshot(&self) -> BTreeMap<String, usize> {
        self.0.lock().unwrap().clone()
    }

    pub fn total(&self) -> usize {
        self.0.lock().unwrap().values().sum()
    }

    /// Assert the exact set of fired hooks and their counts.
    pub fn assert_exact(&self, expected: &[(&str, usize)]) {
        let expected: BTreeMap<String, usize> = expected
            .iter()
            .map(|(name, n)| (name.to_string(), *n))
            .collect();
        assert_eq!(self.snapshot(), expected);
    }
}

struct CountingHandler {
    name: &'static str,
    counter: EventCounter,
}

#[async_trait]
impl<E: Send + 'static> Handler<E> for CountingHandler {
    async fn handle(&self, event: &mut E, next: Next<'_, E>) -> Result<()> {
        self.counter.hit(self.name);
        next.run(event).await
    }
}

pub struct TestApp {
    pub app: App,
    pub store: Arc<MemoryStore>,
    pub mailer: Arc<TestMailer>,
    pub events: EventCounter,

    pub users: Collection,
    pub clients: Collection,
    pub nologin: Collection,
    pub demo1: Collection,
    pub superusers: Collection,

    /// users: test@example.com, unverified.
    pub user: Record,
    /// users: test2@example.com, verified.
    pub user2: Record,
    /// clients (only verified): test@example.com, unverified.
    pub client: Record,
    /// clients (only verified): test2@example.com, verified.
    pub client2: Record,
    /// nologin: test@example.com, unverified.
    pub nologin_user: Record,
    /// _superusers: admin@example.com.
    pub superuser: Record,
}

fn seed_record(store: &MemoryStore, collection: &Collection, email: &str, verified: bool) -> Record {
    let mut record = Record::new(collection);
    record.email = email.to_string();
    record.verified = verified;
    record.password_hash = password_hash();
    store.insert_record(record.clone());
    record
}

impl TestApp {
    pub fn new() -> Self {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter("warn")
            .try_init();

        let store = Arc::new(MemoryStore::new());

        let users = Collection::new_auth("users");
        let mut clients = Collection::new_auth("clients");
        clients.only_verified = true;
        let mut nologin = Collection::new_auth("nologin");
        nologin.password_auth = false;
        let demo1 = Collection::new_base("demo1");
        let superusers = Collection::new_auth(SUPERUSERS_COLLECTION);
        for c in [&users, &clients, &nologin, &demo1, &superusers] {
            store.insert_collection(c.clone());
        }

        let user = seed_record(&store, &users, "test@example.com", false);
        let user2 = seed_record(&store, &users, "test2@example.com", true);
        let client = seed_record(&store, &clients, "test@example.com", false);
        let client2 = seed_record(&store, &clients, "test2@example.com", true);
        let nologin_user = seed_record(&store, &nologin, "test@example.com", false);
        let superuser = seed_record(&store, &superusers, "admin@example.com", true);

        let mailer = Arc::new(TestMailer::new());
        let app = App::new(store.clone(), mailer.clone(), Settings::default());

        let events = EventCounter::default();
        bind_counters(&app, &events);

        Self {
            app,
            store,
            mailer,
            events,
            users,
            clients,
            nologin,
            demo1,
            superusers,
            user,
            user2,
            client,
            client2,
            nologin_user,
            superuser,
        }
    }

    pub fn router(&self) -> Router {
        self.router_with(ApiConfig::default())
    }

    pub fn router_with(&self, config: ApiConfig) -> Router {
        hearth_api::router(AppState {
            app: self.app.clone(),
            config,
        })
    }

    pub fn collection_of(&self, record: &Record) -> &Collection {
        [
            &self.users,
            &self.clients,
            &self.nologin,
            &self.demo1,
            &self.superusers,
        ]
        .into_iter()
        .find(|c| c.id == record.collection_id)
        .expect("record collection is part of the fixture")
    }

    pub fn auth_token(&self, record: &Record, refreshable: bool) -> String {
        tokens::issue(
            record,
            self.collection_of(record),
            TokenClaims::auth(record, refreshable),
        )
        .unwrap()
    }

    /// Refreshable auth token with a short custom lifetime.
    pub fn short_auth_token(&self, record: &Record, duration: i64) -> String {
        tokens::issue_with_duration(
            record,
            self.collection_of(record),
            TokenClaims::auth(record, true),
            duration,
        )
        .unwrap()
    }

    pub fn verification_token(&self, record: &Record) -> String {
        tokens::issue(record, self.collection_of(record), TokenClaims::verification(record)).unwrap()
    }

    pub fn email_change_token(&self, record: &Record, new_email: &str) -> String {
        tokens::issue(
            record,
            self.collection_of(record),
            TokenClaims::email_change(record, new_email),
        )
        .unwrap()
    }

    /// Current stored copy of `record`.
    pub async fn reload(&self, record: &Record) -> Record {
        self.app
            .find_record(&record.collection_id, &record.id)
            .await
            .unwrap()
    }

    pub async fn enable_rate_limits(&self, rules: Vec<hearth_core::settings::RateLimitRule>) {
        self.app
            .update_settings(|s| {
                s.rate_limits.enabled = true;
                s.rate_limits.rules = rules;
            })
            .await;
    }
}

fn bind_counters(app: &App, events: &EventCounter) {
    let hooks = app.hooks();
    macro_rules! count {
        ($($hook:ident),+ $(,)?) => {
            $(
                hooks.$hook.bind(CountingHandler {
                    name: stringify!($hook),
                    counter: events.clone(),
                });
            )+
        };
    }
    count!(
        on_record_auth_request,
        on_record_auth_refresh_request,
        on_record_request_email_change_request,
        on_record_confirm_email_change_request,
        on_record_confirm_verification_request,
        on_record_update,
        on_record_after_update_success,
        on_mailer_record_email_change_send,
    );
}

/// Response status and JSON body (`Null` when empty).
pub struct TestResponse {
    pub status: StatusCode,
    pub body: serde_json::Value,
    pub raw: Vec<u8>,
}

pub async fn send(
    router: Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<&str>,
) -> TestResponse {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", token);
    }
    if body.is_some() {
        builder = builder.header("content-type", "application/json");
    }
    let req = builder
        .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
        .unwrap();

    let resp = router.oneshot(req).await.expect("request");
    let status = resp.status();
    let raw = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body")
        .to_vec();
    let body = if raw.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&raw).unwrap_or(serde_json::Value::Null)
    };
    TestResponse { status, body, raw }
}

pub async fn post(router: Router, uri: &str, token: Option<&str>, body: Option<&str>) -> TestResponse {
    send(router, Method::POST, uri, token, body).await
}

pub async fn get(router: Router, uri: &str, token: Option<&str>) -> TestResponse {
    send(router, Method::GET, uri, token, None).await
}
