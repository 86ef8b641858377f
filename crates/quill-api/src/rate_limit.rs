use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use quill_core::util::user_fingerprint;
use tokio::sync::Mutex;

use crate::config::AppConfig;
use crate::error::AppError;

#[derive(Clone)]
pub struct EndpointRateLimiter {
    state: Arc<Mutex<RateWindows>>,
    window: Duration,
    post_limit: u32,
    comment_limit: u32,
    metrics: Arc<RateLimitMetrics>,
}

#[derive(Debug, Clone, Copy)]
pub enum ProtectedEndpoint {
    /// Creating posts and requesting image upload URLs
    PostWrite,
    CommentWrite,
}

#[derive(Default)]
struct RateLimitMetrics {
    post_allowed: AtomicU64,
    post_limited: AtomicU64,
    comment_allowed: AtomicU64,
    comment_limited: AtomicU64,
}

#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct RateLimitMetricsSnapshot {
    pub post_allowed: u64,
    pub post_limited: u64,
    pub comment_allowed: u64,
    pub comment_limited: u64,
}

#[derive(Debug, Clone, Copy)]
struct RateWindow {
    started_at: Instant,
    count: u32,
}

struct RateWindows {
    entries: HashMap<String, RateWindow>,
    last_pruned: Instant,
}

impl RateWindows {
    /// Drop expired windows, at most once per `window`
    fn prune(&mut self, now: Instant, window: Duration) {
        if now.duration_since(self.last_pruned) < window {
            return;
        }
        self.entries.retain(|_, entry| now.duration_since(entry.started_at) < window);
        self.last_pruned = now;
    }
}

impl EndpointRateLimiter {
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.rate_limit_window,
            config.post_write_rate_limit_per_window,
            config.comment_write_rate_limit_per_window,
        )
    }

    pub fn new(window: Duration, post_limit: u32, comment_limit: u32) -> Self {
        Self {
            state: Arc::new(Mutex::new(RateWindows {
                entries: HashMap::new(),
                last_pruned: Instant::now(),
            })),
            window,
            post_limit,
            comment_limit,
            metrics: Arc::new(RateLimitMetrics::default()),
        }
    }

    pub async fn check(&self, endpoint: ProtectedEndpoint, user_id: &str) -> Result<(), AppError> {
        let limit = match endpoint {
            ProtectedEndpoint::PostWrite => self.post_limit,
            ProtectedEndpoint::CommentWrite => self.comment_limit,
        };

        let key = format!("{}:{user_id}", endpoint.label());
        let now = Instant::now();
        let mut guard = self.state.lock().await;
        guard.prune(now, self.window);
        let entry = guard.entries.entry(key).or_insert(RateWindow {
            started_at: now,
            count: 0,
        });

        if now.duration_since(entry.started_at) >= self.window {
            entry.started_at = now;
            entry.count = 0;
        }

        if entry.count >= limit {
            let retry_after_secs = self
                .window
                .saturating_sub(now.duration_since(entry.started_at))
                .as_secs()
                .max(1);
            self.mark(endpoint, false);
            tracing::warn!(
                endpoint = endpoint.label(),
                user = user_fingerprint(user_id),
                retry_after_secs,
                "Rate limit exceeded"
            );
            return Err(AppError::too_many_requests(
                format!("Too many {} requests", endpoint.label()),
                retry_after_secs,
            ));
        }

        entry.count += 1;
        self.mark(endpoint, true);
        Ok(())
    }

    pub fn metrics_snapshot(&self) -> RateLimitMetricsSnapshot {
        RateLimitMetricsSnapshot {
            post_allowed: self.metrics.post_allowed.load(Ordering::Relaxed),
            post_limited: self.metrics.post_limited.load(Ordering::Relaxed),
            comment_allowed: self.metrics.comment_allowed.load(Ordering::Relaxed),
            comment_limited: self.metrics.comment_limited.load(Ordering::Relaxed),
        }
    }

    fn mark(&self, endpoint: ProtectedEndpoint, allowed: bool) {
        let counter = match (endpoint, allowed) {
            (ProtectedEndpoint::PostWrite, true) => &self.metrics.post_allowed,
            (ProtectedEndpoint::PostWrite, false) => &self.metrics.post_limited,
            (ProtectedEndpoint::CommentWrite, true) => &self.metrics.comment_allowed,
            (ProtectedEndpoint::CommentWrite, false) => &self.metrics.comment_limited,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

impl ProtectedEndpoint {
    pub const fn label(self) -> &'static str {
        match self {
            Self::PostWrite => "post_write",
            Self::CommentWrite => "comment_write",
        }
    }
}
