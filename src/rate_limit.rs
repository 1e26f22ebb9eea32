//! In-memory rate limiting for public endpoints.
//!
//! DESIGN
//! ======
//! Sliding-window counters backed by `HashMap<String, VecDeque<Instant>>`.
//! Each limiter enforces two limits:
//! - Per-key (normally the caller's phone number)
//! - Global, across every key
//!
//! Public booking and patient chat use separate limiters so a chat burst
//! never blocks the booking form. Limits are tuned per scope through
//! `RATE_LIMIT_<SCOPE>_PER_KEY`, `RATE_LIMIT_<SCOPE>_PER_KEY_WINDOW_SECS`,
//! `RATE_LIMIT_<SCOPE>_GLOBAL` and `RATE_LIMIT_<SCOPE>_GLOBAL_WINDOW_SECS`.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::config::env_parse;
use crate::frame::ErrorCode;

const DEFAULT_PER_KEY_LIMIT: usize = 10;
const DEFAULT_PER_KEY_WINDOW_SECS: u64 = 60;

const DEFAULT_GLOBAL_LIMIT: usize = 300;
const DEFAULT_GLOBAL_WINDOW_SECS: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub per_key_limit: usize,
    pub per_key_window: Duration,
    pub global_limit: usize,
    pub global_window: Duration,
}

impl RateLimitConfig {
    /// Read limits for one scope (`BOOKING`, `CHAT`, ...) from the environment.
    #[must_use]
    pub fn from_env(scope: &str) -> Self {
        let key = |suffix: &str| format!("RATE_LIMIT_{scope}_{suffix}");
        Self {
            per_key_limit: env_parse(&key("PER_KEY"), DEFAULT_PER_KEY_LIMIT),
            per_key_window: Duration::from_secs(env_parse(&key("PER_KEY_WINDOW_SECS"), DEFAULT_PER_KEY_WINDOW_SECS)),
            global_limit: env_parse(&key("GLOBAL"), DEFAULT_GLOBAL_LIMIT),
            global_window: Duration::from_secs(env_parse(&key("GLOBAL_WINDOW_SECS"), DEFAULT_GLOBAL_WINDOW_SECS)),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_key_limit: DEFAULT_PER_KEY_LIMIT,
            per_key_window: Duration::from_secs(DEFAULT_PER_KEY_WINDOW_SECS),
            global_limit: DEFAULT_GLOBAL_LIMIT,
            global_window: Duration::from_secs(DEFAULT_GLOBAL_WINDOW_SECS),
        }
    }
}

// =============================================================================
// ERROR TYPE
// =============================================================================

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[allow(clippy::enum_variant_names)]
pub enum RateLimitError {
    #[error("too many requests (max {limit} per {window_secs}s)")]
    PerKeyExceeded { limit: usize, window_secs: u64 },
    #[error("service busy (max {limit} requests per {window_secs}s)")]
    GlobalExceeded { limit: usize, window_secs: u64 },
}

impl ErrorCode for RateLimitError {
    fn error_code(&self) -> &'static str {
        "E_RATE_LIMITED"
    }

    fn retryable(&self) -> bool {
        true
    }
}

// =============================================================================
// RATE LIMITER
// =============================================================================

#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Mutex<RateLimiterInner>>,
    config: RateLimitConfig,
}

#[derive(Default)]
struct RateLimiterInner {
    /// Per-key request timestamps.
    key_requests: HashMap<String, VecDeque<Instant>>,
    /// Global request timestamps.
    global_requests: VecDeque<Instant>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self { inner: Arc::new(Mutex::new(RateLimiterInner::default())), config }
    }

    /// Check both per-key and global limits, then record the request.
    ///
    /// # Errors
    ///
    /// Returns the limit that would be exceeded. Nothing is recorded then.
    pub fn check_and_record(&self, key: &str) -> Result<(), RateLimitError> {
        self.check_and_record_at(key, Instant::now())
    }

    fn check_and_record_at(&self, key: &str, now: Instant) -> Result<(), RateLimitError> {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let cfg = self.config;

        prune_window(&mut inner.global_requests, now, cfg.global_window);
        if inner.global_requests.len() >= cfg.global_limit {
            return Err(RateLimitError::GlobalExceeded {
                limit: cfg.global_limit,
                window_secs: cfg.global_window.as_secs(),
            });
        }

        let key_deque = inner.key_requests.entry(key.to_owned()).or_default();
        prune_window(key_deque, now, cfg.per_key_window);
        if key_deque.len() >= cfg.per_key_limit {
            return Err(RateLimitError::PerKeyExceeded {
                limit: cfg.per_key_limit,
                window_secs: cfg.per_key_window.as_secs(),
            });
        }

        key_deque.push_back(now);
        inner.global_requests.push_back(now);

        // Evict idle keys once the map grows large.
        if inner.key_requests.len() > 4096 {
            let window = cfg.per_key_window;
            inner
                .key_requests
                .retain(|_, deque| deque.back().is_some_and(|last| now.duration_since(*last) <= window));
        }

        Ok(())
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

fn prune_window(deque: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(&front) = deque.front() {
        if now.duration_since(front) > window {
            deque.pop_front();
        } else {
            break;
        }
    }
}

#[cfg(test)]
#[path = "rate_limit_test.rs"]
mod tests;
