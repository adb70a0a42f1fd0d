use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

/// Sliding-window rate limiter: a queue of request timestamps, evicted
/// lazily. A request is allowed while fewer than `max_requests` timestamps
/// fall inside the trailing window.
///
/// Session-scoped and owned by its pipeline; callers pass `now` so the
/// window follows the runtime clock.
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    timestamps: VecDeque<Instant>,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            timestamps: VecDeque::new(),
        }
    }

    fn evict(&mut self, now: Instant) {
        while let Some(&oldest) = self.timestamps.front() {
            if now.duration_since(oldest) >= self.window {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    /// True if another request may fire at `now`.
    pub fn check(&mut self, now: Instant) -> bool {
        self.evict(now);
        self.timestamps.len() < self.max_requests
    }

    /// Record a fired request.
    pub fn record(&mut self, now: Instant) {
        self.timestamps.push_back(now);
    }
}
