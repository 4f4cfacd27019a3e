//! Hook pipeline.
//!
//! A [`Hook`] holds an ordered chain of handlers for one event type.
//! [`Hook::trigger`] runs the chain: each handler receives the event and a
//! [`Next`] continuation. Calling [`Next::run`] proceeds to the following
//! handler, and after the last one to the final step supplied by the caller.
//! A handler that returns without calling `next` short-circuits the rest of
//! the chain; a handler that returns an error after calling `next` turns the
//! whole trigger into that error.
//!
//! Handlers that want the downstream work to run inside a transaction swap
//! the event's [`App`] for a transactional one with [`AppScope`] (or use
//! [`Next::run_in_transaction`]). The original handle is restored when the
//! scope drops, on every exit path.

pub mod events;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use futures_util::future::BoxFuture;

use crate::app::App;
use crate::error::Result;

pub use events::{
    AuthResponse, MailerRecordEvent, RecordAuthRefreshRequestEvent, RecordAuthRequestEvent,
    RecordConfirmEmailChangeRequestEvent, RecordConfirmVerificationRequestEvent, RecordEvent,
    RecordRequestEmailChangeRequestEvent,
};

/// Identifier returned by [`Hook::bind`], usable with [`Hook::unbind`].
pub type HandlerId = u64;

/// Event types that carry the application handle.
pub trait HookEvent: Send + 'static {
    fn app(&self) -> &App;
    fn app_mut(&mut self) -> &mut App;
}

/// A bound hook handler.
#[async_trait]
pub trait Handler<E: Send + 'static>: Send + Sync {
    /// Handle `event`. Call `next.run(event)` to continue the chain.
    async fn handle(&self, event: &mut E, next: Next<'_, E>) -> Result<()>;
}

/// Continuation handed to each handler.
pub struct Next<'a, E: Send + 'static> {
    handlers: &'a [Arc<dyn Handler<E>>],
    finalizer: &'a (dyn for<'b> Fn(&'b mut E) -> BoxFuture<'b, Result<()>> + Send + Sync + 'a),
}

impl<'a, E: Send + 'static> Next<'a, E> {
    /// Run the remaining handlers and then the final step.
    pub async fn run(self, event: &mut E) -> Result<()> {
        match self.handlers.split_first() {
            Some((head, rest)) => {
                head.handle(
                    event,
                    Next {
                        handlers: rest,
                        finalizer: self.finalizer,
                    },
                )
                .await
            }
            None => (self.finalizer)(event).await,
        }
    }
}

impl<'a, E: HookEvent> Next<'a, E> {
    /// Run the rest of the chain inside a transaction bound to the event.
    ///
    /// Commits when the chain succeeds and rolls back when it fails.
    pub async fn run_in_transaction(self, event: &mut E) -> Result<()> {
        let tx = event.app().begin();
        let result = {
            let mut scope = AppScope::bind(event, tx.app().clone());
            self.run(scope.event()).await
        };
        match result {
            Ok(()) => tx.commit().await,
            Err(e) => {
                tx.rollback();
                Err(e)
            }
        }
    }
}

/// Temporarily replaces an event's app handle; restores it on drop.
pub struct AppScope<'e, E: HookEvent> {
    event: &'e mut E,
    original: Option<App>,
}

impl<'e, E: HookEvent> AppScope<'e, E> {
    pub fn bind(event: &'e mut E, app: App) -> Self {
        let original = std::mem::replace(event.app_mut(), app);
        Self {
            event,
            original: Some(original),
        }
    }

    pub fn event(&mut self) -> &mut E {
        self.event
    }
}

impl<E: HookEvent> Drop for AppScope<'_, E> {
    fn drop(&mut self) {
        if let Some(original) = self.original.take() {
            *self.event.app_mut() = original;
        }
    }
}

struct FnHandler<F>(F);

#[async_trait]
impl<E, F> Handler<E> for FnHandler<F>
where
    E: Send + 'static,
    F: for<'a> Fn(&'a mut E, Next<'a, E>) -> BoxFuture<'a, Result<()>> + Send + Sync,
{
    async fn handle(&self, event: &mut E, next: Next<'_, E>) -> Result<()> {
        (self.0)(event, next).await
    }
}

/// Ordered handler chain for one event type.
///
/// Binding takes a write lock; triggering clones a snapshot under a read lock
/// and runs without holding it, so handlers may bind or unbind while serving.
pub struct Hook<E: Send + 'static> {
    handlers: RwLock<Vec<(HandlerId, Arc<dyn Handler<E>>)>>,
    next_id: AtomicU64,
}

impl<E: Send + 'static> Default for Hook<E> {
    fn default() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl<E: Send + 'static> Hook<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler to the chain.
    pub fn bind<H: Handler<E> + 'static>(&self, handler: H) -> HandlerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(handler)));
        id
    }

    /// Append a closure handler, e.g. `hook.bind_fn(|e, next| Box::pin(async move { next.run(e).await }))`.
    pub fn bind_fn<F>(&self, f: F) -> HandlerId
    where
        F: for<'a> Fn(&'a mut E, Next<'a, E>) -> BoxFuture<'a, Result<()>> + Send + Sync + 'static,
    {
        self.bind(FnHandler(f))
    }

    /// Remove a handler. Returns whether it was bound.
    pub fn unbind(&self, id: HandlerId) -> bool {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        let before = handlers.len();
        handlers.retain(|(hid, _)| *hid != id);
        handlers.len() != before
    }

    pub fn len(&self) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self) -> Vec<Arc<dyn Handler<E>>> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, h)| Arc::clone(h))
            .collect()
    }

    /// Run the handler chain, ending with `finalizer`.
    pub async fn trigger<F>(&self, event: &mut E, finalizer: F) -> Result<()>
    where
        F: for<'b> Fn(&'b mut E) -> BoxFuture<'b, Result<()>> + Send + Sync,
    {
        let handlers = self.snapshot();
        Next {
            handlers: &handlers,
            finalizer: &finalizer,
        }
        .run(event)
        .await
    }
}

/// Final step that does nothing.
pub fn noop<E>(_event: &mut E) -> BoxFuture<'_, Result<()>> {
    Box::pin(async { Ok(()) })
}

/// Every hook exposed by the application.
#[derive(Default)]
pub struct Hooks {
    pub on_record_auth_request: Hook<RecordAuthRequestEvent>,
    pub on_record_auth_refresh_request: Hook<RecordAuthRefreshRequestEvent>,
    pub on_record_request_email_change_request: Hook<RecordRequestEmailChangeRequestEvent>,
    pub on_record_confirm_email_change_request: Hook<RecordConfirmEmailChangeRequestEvent>,
    pub on_record_confirm_verification_request: Hook<RecordConfirmVerificationRequestEvent>,
    pub on_record_update: Hook<RecordEvent>,
    pub on_record_after_update_success: Hook<RecordEvent>,
    pub on_mailer_record_email_change_send: Hook<MailerRecordEvent>,
}
