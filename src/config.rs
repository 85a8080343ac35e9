//! Hub configuration

use std::time::Duration;

/// Configuration for the flux hub
///
/// Defaults match the limits the hosted service runs with.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Maximum simultaneous sessions across all fluxes (0 = unlimited is
    /// not supported; admission always checks this cap)
    pub max_connections: usize,

    /// Maximum simultaneous sessions per flux
    pub max_connections_per_flux: usize,

    /// Period between keepalive pushes per session
    pub heartbeat_interval: Duration,

    /// Idle threshold for stale sessions; also the sweep period
    pub connection_timeout: Duration,

    /// Maximum size of a published payload in bytes
    pub max_payload_size: usize,

    /// Length of the publish rate-limit window
    pub rate_limit_window: Duration,

    /// Publishes allowed per window per flux
    pub max_requests_per_window: u32,

    /// Capacity of each session's delivery queue; overflow counts as a
    /// delivery failure
    pub delivery_buffer: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            max_connections: 10_000,
            max_connections_per_flux: 250,
            heartbeat_interval: Duration::from_secs(30),
            connection_timeout: Duration::from_secs(300),
            max_payload_size: 2000,
            rate_limit_window: Duration::from_secs(60),
            max_requests_per_window: 100,
            delivery_buffer: 32,
        }
    }
}

impl HubConfig {
    /// Set the global session cap
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the per-flux session cap
    pub fn max_connections_per_flux(mut self, max: usize) -> Self {
        self.max_connections_per_flux = max;
        self
    }

    /// Set the heartbeat period
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Set the idle threshold and sweep period
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Set the payload size cap
    pub fn max_payload_size(mut self, max: usize) -> Self {
        self.max_payload_size = max;
        self
    }

    /// Set the rate-limit window length
    pub fn rate_limit_window(mut self, window: Duration) -> Self {
        self.rate_limit_window = window;
        self
    }

    /// Set the publish quota per window
    pub fn max_requests_per_window(mut self, max: u32) -> Self {
        self.max_requests_per_window = max;
        self
    }

    /// Set the per-session delivery queue capacity
    pub fn delivery_buffer(mut self, capacity: usize) -> Self {
        self.delivery_buffer = capacity;
        self
    }
}
