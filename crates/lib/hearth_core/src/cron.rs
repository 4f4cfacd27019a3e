//! Registered background jobs.
//!
//! Jobs are identified by id and carry a cron expression for display. Ids
//! starting with `__` are system jobs and sort after user jobs.

use std::sync::{Arc, PoisonError, RwLock};

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde::Serialize;
use tracing::{debug, error};

/// Prefix of system job ids.
pub const SYSTEM_JOB_PREFIX: &str = "__";

type JobFn = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// A registered job.
#[derive(Clone, Serialize)]
pub struct Job {
    id: String,
    expression: String,
    #[serde(skip)]
    func: JobFn,
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("expression", &self.expression)
            .finish_non_exhaustive()
    }
}

impl Job {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn is_system(&self) -> bool {
        self.id.starts_with(SYSTEM_JOB_PREFIX)
    }

    /// Run the job to completion. A panic inside the job is caught and logged.
    pub async fn execute(&self) {
        debug!(job = %self.id, "cron job started");
        let outcome = std::panic::AssertUnwindSafe((self.func)())
            .catch_unwind()
            .await;
        if outcome.is_err() {
            error!(job = %self.id, "cron job panicked");
        }
    }

    /// Start the job in the background without waiting for it.
    pub fn spawn(&self) {
        let job = self.clone();
        tokio::spawn(async move { job.execute().await });
    }
}

/// Job registry.
#[derive(Default)]
pub struct Cron {
    jobs: RwLock<Vec<Job>>,
}

impl Cron {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `func` under `id`, replacing any job with the same id.
    pub fn add<F>(&self, id: &str, expression: &str, func: F)
    where
        F: Fn() -> BoxFuture<'static, ()> + Send + Sync + 'static,
    {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        jobs.retain(|j| j.id != id);
        jobs.push(Job {
            id: id.to_string(),
            expression: expression.to_string(),
            func: Arc::new(func),
        });
    }

    pub fn remove(&self, id: &str) -> bool {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        let before = jobs.len();
        jobs.retain(|j| j.id != id);
        jobs.len() != before
    }

    pub fn find(&self, id: &str) -> Option<Job> {
        self.jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|j| j.id == id)
            .cloned()
    }

    /// All jobs: user jobs by id, then system jobs by id.
    pub fn jobs(&self) -> Vec<Job> {
        let mut jobs = self
            .jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        jobs.sort_by(|a, b| {
            a.is_system()
                .cmp(&b.is_system())
                .then_with(|| a.id.cmp(&b.id))
        });
        jobs
    }
}
