//! Fixed-window request rate limiter.
//!
//! Rules come from [`RateLimitSettings`]. For a `(collection, action)` pair
//! the rules labelled `<collection>:<action>` take precedence over
//! `*:<action>`; among rules of the same specificity the strictest (lowest
//! `max_requests`) wins. Counters are kept per `(rule label, client)`.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::debug;

use crate::error::{Error, Result};
use crate::settings::{RateLimitRule, RateLimitSettings};

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    length: Duration,
    count: u32,
}

impl Window {
    fn expired(&self, now: Instant) -> bool {
        now.duration_since(self.started) >= self.length
    }
}

/// Shared rate limiter state.
///
/// Windows are keyed by the governing rule's label and the client, not by
/// the requested collection. A wildcard rule such as `*:authRefresh`
/// therefore spends one budget per client across every collection it
/// governs.
#[derive(Debug, Default)]
pub struct RateLimiter {
    windows: DashMap<(String, String), Window>,
}

/// Pick the rule governing `collection:action`, if any.
pub fn resolve_rule<'r>(
    rules: &'r [RateLimitRule],
    collection: &str,
    action: &str,
) -> Option<&'r RateLimitRule> {
    let exact = format!("{collection}:{action}");
    let wildcard = format!("*:{action}");
    rules
        .iter()
        .filter(|r| r.label == exact)
        .min_by_key(|r| r.max_requests)
        .or_else(|| {
            rules
                .iter()
                .filter(|r| r.label == wildcard)
                .min_by_key(|r| r.max_requests)
        })
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one request by `client` against `collection:action`.
    ///
    /// Returns [`Error::TooManyRequests`] when the governing rule's budget
    /// for the current window is exhausted.
    pub fn check(
        &self,
        settings: &RateLimitSettings,
        collection: &str,
        action: &str,
        client: &str,
    ) -> Result<()> {
        if !settings.enabled {
            return Ok(());
        }
        let Some(rule) = resolve_rule(&settings.rules, collection, action) else {
            return Ok(());
        };
        if self.hit(rule, client, Instant::now()) {
            Ok(())
        } else {
            debug!(rule = %rule.label, client, "rate limit exceeded");
            Err(Error::TooManyRequests)
        }
    }

    /// Register a hit at `now`; false when over budget.
    fn hit(&self, rule: &RateLimitRule, client: &str, now: Instant) -> bool {
        if rule.max_requests == 0 {
            return false;
        }
        let length = Duration::from_secs(rule.duration);
        let mut window = self
            .windows
            .entry((rule.label.clone(), client.to_string()))
            .or_insert(Window {
                started: now,
                length,
                count: 0,
            });
        if window.expired(now) || window.length != length {
            *window = Window {
                started: now,
                length,
                count: 0,
            };
        }
        if window.count >= rule.max_requests {
            return false;
        }
        window.count += 1;
        true
    }

    /// Drop every expired window. Returns how many were removed.
    pub fn prune_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.windows.len();
        self.windows.retain(|_, w| !w.expired(now));
        before - self.windows.len()
    }

    /// Number of tracked windows.
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}
