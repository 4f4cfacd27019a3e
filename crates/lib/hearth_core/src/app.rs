//! Application handle.
//!
//! [`App`] is cheap to clone and is what hooks and request flows operate on.
//! A transactional app (from [`App::begin`]) shares hooks, settings, mailer
//! and limiter with its parent but routes record reads and writes through a
//! [`StagedStore`].

use std::sync::{Arc, Mutex, PoisonError};

use futures_util::future::BoxFuture;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::cron::Cron;
use crate::error::Result;
use crate::hooks::{Hooks, RecordEvent, noop};
use crate::mailer::Mailer;
use crate::models::{Collection, Record};
use crate::ratelimit::RateLimiter;
use crate::settings::Settings;
use crate::store::{RecordStore, StagedStore};

struct Shared {
    hooks: Hooks,
    settings: RwLock<Settings>,
    mailer: Arc<dyn Mailer>,
    rate_limiter: RateLimiter,
    cron: Cron,
}

struct TxState {
    staged: Arc<StagedStore>,
    /// Records whose after-success events wait for the outermost commit.
    after_commit: Mutex<Vec<Record>>,
}

#[derive(Clone)]
pub struct App {
    shared: Arc<Shared>,
    store: Arc<dyn RecordStore>,
    tx: Option<Arc<TxState>>,
}

impl App {
    pub fn new(store: Arc<dyn RecordStore>, mailer: Arc<dyn Mailer>, settings: Settings) -> Self {
        Self {
            shared: Arc::new(Shared {
                hooks: Hooks::default(),
                settings: RwLock::new(settings),
                mailer,
                rate_limiter: RateLimiter::new(),
                cron: Cron::new(),
            }),
            store,
            tx: None,
        }
    }

    pub fn hooks(&self) -> &Hooks {
        &self.shared.hooks
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn mailer(&self) -> &Arc<dyn Mailer> {
        &self.shared.mailer
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.shared.rate_limiter
    }

    pub fn cron(&self) -> &Cron {
        &self.shared.cron
    }

    /// Snapshot of the current settings.
    pub async fn settings(&self) -> Settings {
        self.shared.settings.read().await.clone()
    }

    pub async fn update_settings(&self, f: impl FnOnce(&mut Settings)) {
        f(&mut *self.shared.settings.write().await);
    }

    pub fn is_transactional(&self) -> bool {
        self.tx.is_some()
    }

    // ------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------

    pub async fn find_collection(&self, name_or_id: &str) -> Result<Collection> {
        Ok(self.store.find_collection_by_name_or_id(name_or_id).await?)
    }

    pub async fn find_record(&self, collection_id: &str, id: &str) -> Result<Record> {
        Ok(self.store.find_record_by_id(collection_id, id).await?)
    }

    pub async fn find_auth_record_by_email(
        &self,
        collection_id: &str,
        email: &str,
    ) -> Result<Option<Record>> {
        Ok(self
            .store
            .find_auth_record_by_email(collection_id, email)
            .await?)
    }

    /// Count a request against the rate limit rules in force.
    pub async fn check_rate_limit(&self, collection: &str, action: &str, client: &str) -> Result<()> {
        let settings = self.shared.settings.read().await;
        self.shared
            .rate_limiter
            .check(&settings.rate_limits, collection, action, client)
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Persist an update to `record`, firing the record model events.
    ///
    /// `on_record_update` wraps the write itself. `on_record_after_update_success`
    /// fires right away outside a transaction, otherwise after the outermost
    /// commit.
    pub async fn save_record(&self, record: Record) -> Result<Record> {
        let mut event = RecordEvent {
            app: self.clone(),
            record,
        };
        self.hooks()
            .on_record_update
            .trigger(&mut event, write_record)
            .await?;
        let saved = event.record;

        match &self.tx {
            Some(tx) => {
                tx.after_commit
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(saved.clone());
            }
            None => self.after_update_success(saved.clone()).await,
        }
        Ok(saved)
    }

    async fn after_update_success(&self, record: Record) {
        let mut event = RecordEvent {
            app: self.clone(),
            record,
        };
        if let Err(e) = self
            .hooks()
            .on_record_after_update_success
            .trigger(&mut event, noop)
            .await
        {
            warn!(record = %event.record.id, error = %e, "after update hook failed");
        }
    }

    // ------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------

    /// Start a transaction. Nested transactions stage into their parent.
    pub fn begin(&self) -> Transaction {
        let staged = Arc::new(StagedStore::new(Arc::clone(&self.store)));
        let app = App {
            shared: Arc::clone(&self.shared),
            store: staged.clone(),
            tx: Some(Arc::new(TxState {
                staged,
                after_commit: Mutex::new(Vec::new()),
            })),
        };
        Transaction {
            parent: self.clone(),
            app,
            done: false,
        }
    }
}

fn write_record(event: &mut RecordEvent) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        event.record.updated = chrono::Utc::now();
        event
            .app
            .store()
            .save_records(vec![event.record.clone()])
            .await?;
        Ok(())
    })
}

/// An open transaction. Dropping it without committing rolls back.
pub struct Transaction {
    parent: App,
    app: App,
    done: bool,
}

impl Transaction {
    /// The transactional app handle.
    pub fn app(&self) -> &App {
        &self.app
    }

    fn state(&self) -> Option<&Arc<TxState>> {
        self.app.tx.as_ref()
    }

    /// Flush staged writes to the parent and release after-commit events.
    pub async fn commit(mut self) -> Result<()> {
        self.done = true;
        let Some(state) = self.state().cloned() else {
            return Ok(());
        };
        state.staged.commit().await?;

        let pending = std::mem::take(
            &mut *state
                .after_commit
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        match &self.parent.tx {
            Some(outer) => {
                outer
                    .after_commit
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .extend(pending);
            }
            None => {
                for record in pending {
                    self.parent.after_update_success(record).await;
                }
            }
        }
        Ok(())
    }

    pub fn rollback(mut self) {
        self.discard();
    }

    fn discard(&mut self) {
        if self.done {
            return;
        }
        self.done = true;
        if let Some(state) = self.state() {
            debug!(pending = state.staged.pending(), "transaction rolled back");
            state.staged.rollback();
        }
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        self.discard();
    }
}
