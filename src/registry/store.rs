//! Flux registry implementation
//!
//! The central registry that owns all live sessions, enforces admission
//! control, and fans published events out to subscribers.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tokio::time::Instant;

use super::error::RegistryError;
use super::event::{FluxEvent, FluxId};
use super::session::{Session, Subscription};
use crate::config::HubConfig;

/// Registry-wide counters
#[derive(Debug, Clone)]
pub struct RegistryStats {
    /// Live sessions across all fluxes
    pub sessions: usize,
    /// Fluxes with at least one live session
    pub fluxes: usize,
}

/// Mutable registry state, guarded by a single lock
///
/// Sessions live in one owned map and are referenced by ID from the
/// per-flux sets; there are no back-pointers. Invariants:
/// `sessions.len()` equals the sum of the per-flux set sizes, and a
/// `by_flux` entry exists iff its set is non-empty.
struct RegistryState {
    sessions: HashMap<u64, Session>,
    by_flux: HashMap<FluxId, HashSet<u64>>,
}

/// Central registry for all live sessions
///
/// Thread-safe via `RwLock`. Every mutation (admission, teardown, fan-out
/// with its activity stamps) runs under the write guard without crossing an
/// await point, so admission decisions are atomic and the sweep can never
/// observe a half-applied mutation.
pub struct FluxRegistry {
    state: RwLock<RegistryState>,

    /// Configuration
    config: HubConfig,

    /// Next session ID to allocate
    next_session_id: AtomicU64,
}

impl FluxRegistry {
    /// Create a new registry with default configuration
    pub fn new() -> Self {
        Self::with_config(HubConfig::default())
    }

    /// Create a new registry with custom configuration
    pub fn with_config(config: HubConfig) -> Self {
        Self {
            state: RwLock::new(RegistryState {
                sessions: HashMap::new(),
                by_flux: HashMap::new(),
            }),
            config,
            next_session_id: AtomicU64::new(1),
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Admit a new subscriber to a flux
    ///
    /// Fails with `CapacityExceeded` when the global session cap is
    /// reached, or `FluxCapacityExceeded` when this flux is full. The
    /// capacity checks and the registration happen under one write guard,
    /// so no concurrent subscribe can slip between check and increment.
    pub async fn subscribe(
        self: &Arc<Self>,
        flux: &FluxId,
    ) -> Result<Subscription, RegistryError> {
        let mut state = self.state.write().await;

        if state.sessions.len() >= self.config.max_connections {
            tracing::warn!(
                flux = %flux,
                limit = self.config.max_connections,
                "Subscriber rejected: connection limit reached"
            );
            return Err(RegistryError::CapacityExceeded {
                limit: self.config.max_connections,
            });
        }

        let flux_sessions = state.by_flux.get(flux).map_or(0, HashSet::len);
        if flux_sessions >= self.config.max_connections_per_flux {
            tracing::warn!(
                flux = %flux,
                limit = self.config.max_connections_per_flux,
                "Subscriber rejected: flux limit reached"
            );
            return Err(RegistryError::FluxCapacityExceeded {
                flux: flux.clone(),
                limit: self.config.max_connections_per_flux,
            });
        }

        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        let (sink, events) = mpsc::channel(self.config.delivery_buffer.max(1));

        let mut session = Session::new(session_id, flux.clone(), sink);
        session.heartbeat = Some(self.spawn_heartbeat(session_id));

        state.sessions.insert(session_id, session);
        state
            .by_flux
            .entry(flux.clone())
            .or_default()
            .insert(session_id);

        tracing::info!(
            flux = %flux,
            session_id = session_id,
            subscribers = flux_sessions + 1,
            "Subscriber added"
        );

        Ok(Subscription::new(session_id, flux.clone(), events))
    }

    /// Tear down a session
    ///
    /// Idempotent: returns false if the session was already removed.
    pub async fn unsubscribe(&self, session_id: u64) -> bool {
        let mut state = self.state.write().await;

        match Self::remove_session(&mut state, session_id) {
            Some(session) => {
                tracing::info!(
                    flux = %session.flux,
                    session_id = session_id,
                    "Subscriber removed"
                );
                true
            }
            None => false,
        }
    }

    /// Fan an event out to every session of a flux
    ///
    /// Returns the number of sessions the event was queued for. A flux with
    /// no sessions is a successful no-op. A failed push tears that session
    /// down without affecting delivery to the others; completion means all
    /// dispatch attempts were issued, not that every subscriber has read
    /// the event.
    pub async fn publish(&self, flux: &FluxId, event: FluxEvent) -> usize {
        let mut state = self.state.write().await;

        let ids: Vec<u64> = match state.by_flux.get(flux) {
            Some(set) => set.iter().copied().collect(),
            None => return 0,
        };

        let mut delivered = 0;
        let mut failed = Vec::new();

        for id in ids {
            if let Some(session) = state.sessions.get_mut(&id) {
                if session.deliver(event.clone()) {
                    delivered += 1;
                } else {
                    failed.push(id);
                }
            }
        }

        for id in failed {
            if Self::remove_session(&mut state, id).is_some() {
                tracing::info!(
                    flux = %flux,
                    session_id = id,
                    "Delivery failed, session torn down"
                );
            }
        }

        tracing::debug!(flux = %flux, delivered = delivered, "Publish fan-out");
        delivered
    }

    /// Push a single event to one session
    ///
    /// Used for the snapshot-on-connect delivery. A failed push tears the
    /// session down, same as a fan-out failure.
    pub async fn deliver_to(&self, session_id: u64, event: FluxEvent) -> bool {
        let mut state = self.state.write().await;

        let ok = match state.sessions.get_mut(&session_id) {
            Some(session) => session.deliver(event),
            None => return false,
        };

        if !ok {
            if let Some(session) = Self::remove_session(&mut state, session_id) {
                tracing::info!(
                    flux = %session.flux,
                    session_id = session_id,
                    "Delivery failed, session torn down"
                );
            }
        }

        ok
    }

    /// Evict every session idle longer than `connection_timeout`
    ///
    /// Runs entirely under the write guard, so it cannot interleave with a
    /// subscribe or unsubscribe mid-mutation.
    pub async fn sweep(&self) {
        let mut state = self.state.write().await;
        let now = Instant::now();
        let timeout = self.config.connection_timeout;

        let stale: Vec<u64> = state
            .sessions
            .values()
            .filter(|session| session.is_stale(now, timeout))
            .map(|session| session.id)
            .collect();

        for id in stale {
            if let Some(session) = Self::remove_session(&mut state, id) {
                tracing::info!(
                    flux = %session.flux,
                    session_id = id,
                    "Session removed by sweep"
                );
            }
        }
    }

    /// Spawn the background sweep task
    ///
    /// Runs `sweep` on a `connection_timeout` period. Returns a handle that
    /// can be used to abort the task.
    pub fn spawn_sweep_task(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let registry = Arc::clone(self);
        let period = registry.config.connection_timeout;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                registry.sweep().await;
            }
        })
    }

    /// Total live sessions
    pub async fn session_count(&self) -> usize {
        self.state.read().await.sessions.len()
    }

    /// Fluxes with at least one live session
    pub async fn flux_count(&self) -> usize {
        self.state.read().await.by_flux.len()
    }

    /// Live sessions for one flux
    pub async fn flux_session_count(&self, flux: &FluxId) -> usize {
        self.state
            .read()
            .await
            .by_flux
            .get(flux)
            .map_or(0, HashSet::len)
    }

    /// Registry-wide counters
    pub async fn stats(&self) -> RegistryStats {
        let state = self.state.read().await;
        RegistryStats {
            sessions: state.sessions.len(),
            fluxes: state.by_flux.len(),
        }
    }

    /// Remove a session from both maps and close it
    ///
    /// Prunes the flux entry when its set becomes empty, keeping memory
    /// bounded by live activity rather than historical flux count.
    fn remove_session(state: &mut RegistryState, session_id: u64) -> Option<Session> {
        let mut session = state.sessions.remove(&session_id)?;

        if let Some(set) = state.by_flux.get_mut(&session.flux) {
            set.remove(&session_id);
            if set.is_empty() {
                state.by_flux.remove(&session.flux);
            }
        }

        session.close();
        Some(session)
    }

    /// Push a heartbeat to one session, tearing it down on failure
    ///
    /// Returns false once the session is gone so the heartbeat task can
    /// exit; a heartbeat that races with teardown sees the session missing
    /// and its outcome is discarded.
    async fn heartbeat(&self, session_id: u64) -> bool {
        self.deliver_to(session_id, FluxEvent::heartbeat()).await
    }

    fn spawn_heartbeat(self: &Arc<Self>, session_id: u64) -> tokio::task::JoinHandle<()> {
        let registry = Arc::clone(self);
        let period = registry.config.heartbeat_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick of an interval completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if !registry.heartbeat(session_id).await {
                    break;
                }
            }
        })
    }
}

impl Default for FluxRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;

    use super::*;
    use crate::registry::EventKind;

    fn registry(config: HubConfig) -> Arc<FluxRegistry> {
        Arc::new(FluxRegistry::with_config(config))
    }

    #[tokio::test]
    async fn test_per_flux_capacity() {
        let registry = registry(HubConfig::default().max_connections_per_flux(3));
        let flux = FluxId::new("abc");

        let mut subs = Vec::new();
        for n in 1..=3 {
            subs.push(registry.subscribe(&flux).await.unwrap());
            assert_eq!(registry.flux_session_count(&flux).await, n);
        }

        let result = registry.subscribe(&flux).await;
        assert!(matches!(
            result,
            Err(RegistryError::FluxCapacityExceeded { limit: 3, .. })
        ));
        assert_eq!(registry.flux_session_count(&flux).await, 3);
    }

    #[tokio::test]
    async fn test_global_capacity() {
        let registry = registry(HubConfig::default().max_connections(2));

        let _a = registry.subscribe(&FluxId::new("a")).await.unwrap();
        let _b = registry.subscribe(&FluxId::new("b")).await.unwrap();

        // Cap applies regardless of which flux is targeted
        let result = registry.subscribe(&FluxId::new("c")).await;
        assert!(matches!(
            result,
            Err(RegistryError::CapacityExceeded { limit: 2 })
        ));
        assert_eq!(registry.session_count().await, 2);
    }

    #[tokio::test]
    async fn test_unsubscribe_is_idempotent() {
        let registry = registry(HubConfig::default());
        let flux = FluxId::new("abc");

        let sub = registry.subscribe(&flux).await.unwrap();
        assert_eq!(registry.session_count().await, 1);

        assert!(registry.unsubscribe(sub.session_id).await);
        assert!(!registry.unsubscribe(sub.session_id).await);

        assert_eq!(registry.session_count().await, 0);
        // Empty flux entries are pruned immediately
        assert_eq!(registry.flux_count().await, 0);
    }

    #[tokio::test]
    async fn test_publish_without_sessions_is_noop() {
        let registry = registry(HubConfig::default());

        let delivered = registry
            .publish(&FluxId::new("xyz"), FluxEvent::data(Bytes::from_static(b"x")))
            .await;
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn test_publish_reaches_all_subscribers_in_order() {
        let registry = registry(HubConfig::default());
        let flux = FluxId::new("abc");

        let mut first = registry.subscribe(&flux).await.unwrap();
        let mut second = registry.subscribe(&flux).await.unwrap();

        registry
            .publish(&flux, FluxEvent::data(Bytes::from_static(b"one")))
            .await;
        registry
            .publish(&flux, FluxEvent::data(Bytes::from_static(b"two")))
            .await;

        for sub in [&mut first, &mut second] {
            let a = sub.recv().await.unwrap();
            let b = sub.recv().await.unwrap();
            assert_eq!(&a.payload[..], b"one");
            assert_eq!(&b.payload[..], b"two");
        }
    }

    #[tokio::test]
    async fn test_delivery_failure_is_isolated() {
        let registry = registry(HubConfig::default());
        let flux = FluxId::new("abc");

        let mut alive_a = registry.subscribe(&flux).await.unwrap();
        let dead = registry.subscribe(&flux).await.unwrap();
        let mut alive_b = registry.subscribe(&flux).await.unwrap();

        // Dropping the subscription closes its delivery sink
        drop(dead);

        let delivered = registry
            .publish(&flux, FluxEvent::data(Bytes::from_static(b"hello")))
            .await;

        assert_eq!(delivered, 2);
        assert_eq!(registry.flux_session_count(&flux).await, 2);

        assert_eq!(&alive_a.recv().await.unwrap().payload[..], b"hello");
        assert_eq!(&alive_b.recv().await.unwrap().payload[..], b"hello");
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_evicts_stale_sessions() {
        // Heartbeat period longer than the timeout, so nothing refreshes
        // the session before it goes stale
        let config = HubConfig::default()
            .heartbeat_interval(Duration::from_secs(3600))
            .connection_timeout(Duration::from_secs(5));
        let registry = registry(config);
        let flux = FluxId::new("abc");

        let mut sub = registry.subscribe(&flux).await.unwrap();

        tokio::time::advance(Duration::from_secs(6)).await;
        registry.sweep().await;

        assert_eq!(registry.session_count().await, 0);
        assert_eq!(registry.flux_count().await, 0);

        // The sink was dropped on teardown; no further events arrive
        assert!(sub.recv().await.is_none());

        // A swept session receives no further publishes
        let delivered = registry
            .publish(&flux, FluxEvent::data(Bytes::from_static(b"late")))
            .await;
        assert_eq!(delivered, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_keeps_recently_active_sessions() {
        let config = HubConfig::default()
            .heartbeat_interval(Duration::from_secs(3600))
            .connection_timeout(Duration::from_secs(10));
        let registry = registry(config);
        let flux = FluxId::new("abc");

        let _sub = registry.subscribe(&flux).await.unwrap();

        tokio::time::advance(Duration::from_secs(6)).await;
        // A successful delivery refreshes last-activity
        registry
            .publish(&flux, FluxEvent::data(Bytes::from_static(b"ping")))
            .await;

        tokio::time::advance(Duration::from_secs(6)).await;
        registry.sweep().await;

        assert_eq!(registry.session_count().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_task_runs_on_timeout_period() {
        let config = HubConfig::default()
            .heartbeat_interval(Duration::from_secs(3600))
            .connection_timeout(Duration::from_secs(5));
        let registry = registry(config);

        let sweeper = registry.spawn_sweep_task();
        let _sub = registry.subscribe(&FluxId::new("abc")).await.unwrap();

        tokio::time::advance(Duration::from_secs(6)).await;
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;

        assert_eq!(registry.session_count().await, 0);
        sweeper.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_delivery() {
        let config = HubConfig::default().heartbeat_interval(Duration::from_secs(30));
        let registry = registry(config);

        let mut sub = registry.subscribe(&FluxId::new("abc")).await.unwrap();

        // The paused clock advances to the next timer when the test awaits
        let event = sub.recv().await.unwrap();
        assert_eq!(event.kind, EventKind::Heartbeat);
        assert!(event.payload.is_empty());

        assert_eq!(registry.session_count().await, 1);
    }

    #[tokio::test]
    async fn test_heartbeat_failure_tears_down() {
        let config = HubConfig::default().heartbeat_interval(Duration::from_millis(10));
        let registry = registry(config);

        let sub = registry.subscribe(&FluxId::new("abc")).await.unwrap();
        drop(sub);

        // First heartbeat push after the drop fails and evicts the session
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(registry.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_slow_consumer_overflow_tears_down() {
        let config = HubConfig::default().delivery_buffer(2);
        let registry = registry(config);
        let flux = FluxId::new("abc");

        let _sub = registry.subscribe(&flux).await.unwrap();

        // Fill the queue without draining it
        for _ in 0..2 {
            let delivered = registry
                .publish(&flux, FluxEvent::data(Bytes::from_static(b"x")))
                .await;
            assert_eq!(delivered, 1);
        }

        // Queue full: counted as a delivery failure
        let delivered = registry
            .publish(&flux, FluxEvent::data(Bytes::from_static(b"x")))
            .await;
        assert_eq!(delivered, 0);
        assert_eq!(registry.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_stats() {
        let registry = registry(HubConfig::default());

        let _a = registry.subscribe(&FluxId::new("a")).await.unwrap();
        let _b1 = registry.subscribe(&FluxId::new("b")).await.unwrap();
        let _b2 = registry.subscribe(&FluxId::new("b")).await.unwrap();

        let stats = registry.stats().await;
        assert_eq!(stats.sessions, 3);
        assert_eq!(stats.fluxes, 2);
    }
}
