//! Process-local request throttling for the storefront endpoints.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Throttle decision seam; the HTTP layer holds an `Arc<dyn RateLimiter>`.
pub trait RateLimiter: Send + Sync {
    fn check(&self, key: &str) -> Result<(), RateLimitExceeded>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("too many requests, retry after {retry_after_secs}s")]
pub struct RateLimitExceeded {
    pub retry_after_secs: u64,
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

impl Window {
    fn expired(&self, now: Instant, length: Duration) -> bool {
        now.saturating_duration_since(self.started) >= length
    }
}

#[derive(Debug, Default)]
struct Windows {
    by_key: HashMap<String, Window>,
    last_sweep: Option<Instant>,
}

/// Fixed budget of requests per client key; a key's window opens with its first request.
///
/// Expired keys are swept at most once per window length. State lives in process
/// memory only; separate instances do not share counts.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    max_requests: u32,
    window: Duration,
    windows: Mutex<Windows>,
}

impl FixedWindowLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests: max_requests.max(1),
            window,
            windows: Mutex::new(Windows::default()),
        }
    }

    pub fn check_at(&self, key: &str, now: Instant) -> Result<(), RateLimitExceeded> {
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        let window_length = self.window;
        let sweep_due = windows
            .last_sweep
            .map_or(true, |swept| now.saturating_duration_since(swept) >= window_length);
        if sweep_due {
            windows
                .by_key
                .retain(|_, entry| !entry.expired(now, window_length));
            windows.last_sweep = Some(now);
        }

        let fresh = Window {
            started: now,
            count: 0,
        };
        let entry = windows.by_key.entry(key.to_string()).or_insert(fresh);
        if entry.expired(now, window_length) {
            *entry = fresh;
        }

        if entry.count >= self.max_requests {
            let elapsed = now.saturating_duration_since(entry.started);
            let remaining = window_length.saturating_sub(elapsed);
            return Err(RateLimitExceeded {
                retry_after_secs: remaining.as_secs().max(1),
            });
        }

        entry.count += 1;
        Ok(())
    }

    pub fn tracked_keys(&self) -> usize {
        self.windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .by_key
            .len()
    }
}

impl RateLimiter for FixedWindowLimiter {
    fn check(&self, key: &str) -> Result<(), RateLimitExceeded> {
        self.check_at(key, Instant::now())
    }
}

/// Limiter that never throttles; used when limits are disabled and in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unlimited;

impl RateLimiter for Unlimited {
    fn check(&self, _key: &str) -> Result<(), RateLimitExceeded> {
        Ok(())
    }
}
