//! Publish rate limiting
//!
//! Fixed-window throttle, one window per flux. This is an approximation of
//! a sliding log: a caller can burst up to twice the quota across a window
//! boundary, in exchange for O(1) memory and update cost per flux.

use std::collections::HashMap;

use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

use crate::config::HubConfig;
use crate::registry::FluxId;

/// Per-flux window state
///
/// `count` is at least 1 once the window exists; `started_at` only ever
/// advances.
#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    started_at: Instant,
}

/// Per-flux publish throttle
pub struct RateLimiter {
    windows: Mutex<HashMap<FluxId, Window>>,
    window_len: Duration,
    max_requests: u32,
}

impl RateLimiter {
    /// Create a limiter allowing `max_requests` per `window_len` per flux
    pub fn new(window_len: Duration, max_requests: u32) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            window_len,
            max_requests,
        }
    }

    /// Create a limiter from hub configuration
    pub fn from_config(config: &HubConfig) -> Self {
        Self::new(config.rate_limit_window, config.max_requests_per_window)
    }

    /// Record one publish attempt and report whether it is allowed
    ///
    /// Opens a fresh window when none exists or the current one has
    /// expired; otherwise increments the count and compares it against the
    /// quota.
    pub async fn check_and_record(&self, flux: &FluxId) -> bool {
        let mut windows = self.windows.lock().await;
        let now = Instant::now();

        match windows.get_mut(flux) {
            Some(window) if now.duration_since(window.started_at) <= self.window_len => {
                window.count += 1;
                window.count <= self.max_requests
            }
            _ => {
                windows.insert(
                    flux.clone(),
                    Window {
                        count: 1,
                        started_at: now,
                    },
                );
                true
            }
        }
    }

    /// Drop windows that have expired
    ///
    /// Evicting an idle window is equivalent to letting it reset on the
    /// next call, so this only bounds memory; it never changes outcomes.
    pub async fn evict_idle(&self) {
        let mut windows = self.windows.lock().await;
        let now = Instant::now();
        let window_len = self.window_len;

        windows.retain(|_, window| now.duration_since(window.started_at) <= window_len);
    }

    /// Number of fluxes with live window state
    pub async fn window_count(&self) -> usize {
        self.windows.lock().await.len()
    }
}
