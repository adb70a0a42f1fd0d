use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::limiter::RateLimiter;
use crate::payload::{EditorSnapshot, SuggestionPayload};

/// Pipeline tunables. Defaults match the reference deployment.
#[derive(Clone, Copy, Debug)]
pub struct SuggestConfig {
    pub debounce: Duration,
    pub max_requests: usize,
    pub window: Duration,
}

impl Default for SuggestConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(300),
            max_requests: 6,
            window: Duration::from_secs(60),
        }
    }
}

/// Resolves a completion for a payload. `None` means no suggestion.
#[async_trait::async_trait]
pub trait SuggestionFetcher: Send + Sync {
    async fn fetch(&self, payload: &SuggestionPayload) -> Option<String>;
}

struct Inner {
    limiter: RateLimiter,
    current: Option<CancellationToken>,
    waiting: bool,
    suggestion: Option<String>,
}

/// Debounced, superseding, rate-limited completion requester for one editor
/// session.
///
/// At most one request is in flight: every new trigger cancels its
/// predecessor, and a cancelled request's resolution is discarded rather
/// than applied. Refused triggers (rate limit, blank document) clear any
/// displayed suggestion without touching the network.
pub struct SuggestionPipeline {
    fetcher: Box<dyn SuggestionFetcher>,
    config: SuggestConfig,
    inner: Mutex<Inner>,
}

impl SuggestionPipeline {
    pub fn new(fetcher: Box<dyn SuggestionFetcher>, config: SuggestConfig) -> Self {
        Self {
            fetcher,
            config,
            inner: Mutex::new(Inner {
                limiter: RateLimiter::new(config.max_requests, config.window),
                current: None,
                waiting: false,
                suggestion: None,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("pipeline mutex poisoned")
    }

    /// Run one edit trigger to resolution.
    ///
    /// Returns once this trigger resolved, was refused, or was superseded by
    /// a newer one. The editor fires this on every relevant edit.
    pub async fn trigger(&self, snapshot: EditorSnapshot) {
        let token = CancellationToken::new();
        {
            let mut inner = self.lock();
            if let Some(previous) = inner.current.take() {
                previous.cancel();
            }
            // Refuse locally while at the bound; clear any stale suggestion.
            if !inner.limiter.check(Instant::now()) {
                tracing::debug!("suggestion refused: rate limit reached");
                inner.suggestion = None;
                inner.waiting = false;
                return;
            }
            inner.waiting = true;
            inner.current = Some(token.clone());
        }

        // Debounce: only the last trigger inside the window survives.
        tokio::select! {
            _ = token.cancelled() => return,
            _ = tokio::time::sleep(self.config.debounce) => {}
        }

        let payload = {
            let mut inner = self.lock();
            if token.is_cancelled() {
                return;
            }
            let now = Instant::now();
            // Re-check the limit right before firing.
            if !inner.limiter.check(now) {
                inner.suggestion = None;
                inner.waiting = false;
                inner.current = None;
                return;
            }
            let Some(payload) = snapshot.payload() else {
                inner.suggestion = None;
                inner.waiting = false;
                inner.current = None;
                return;
            };
            inner.limiter.record(now);
            payload
        };

        let fetched = tokio::select! {
            _ = token.cancelled() => return,
            fetched = self.fetcher.fetch(&payload) => fetched,
        };

        let mut inner = self.lock();
        if token.is_cancelled() {
            // Superseded while resolving; never apply a stale result.
            return;
        }
        inner.waiting = false;
        inner.suggestion = fetched;
        inner.current = None;
    }

    /// Suggestion to display. Suppressed while a request is pending.
    pub fn suggestion(&self) -> Option<String> {
        let inner = self.lock();
        if inner.waiting {
            None
        } else {
            inner.suggestion.clone()
        }
    }

    /// Accept the current suggestion: insert at `cursor`, advance the cursor
    /// past the insertion, and clear the suggestion, all under one lock so a
    /// stale suggestion can never be reapplied.
    pub fn accept(&self, code: &str, cursor: usize) -> Option<(String, usize)> {
        let mut inner = self.lock();
        let suggestion = inner.suggestion.take()?;
        let cursor = cursor.min(code.len());
        let mut updated = String::with_capacity(code.len() + suggestion.len());
        updated.push_str(&code[..cursor]);
        updated.push_str(&suggestion);
        updated.push_str(&code[cursor..]);
        Some((updated, cursor + suggestion.len()))
    }

    /// Cancel any pending request (editor teardown).
    pub fn cancel_pending(&self) {
        let mut inner = self.lock();
        if let Some(current) = inner.current.take() {
            current.cancel();
        }
        inner.waiting = false;
    }
}
