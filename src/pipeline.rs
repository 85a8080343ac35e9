//! Publish pipeline
//!
//! Orchestrates one write: payload gate, rate limit, persistence, then
//! fan-out. The rate check runs before any expensive work so abusive
//! callers are rejected cheaply, and the value is persisted before the
//! broadcast so a subscriber asking for the current value on connect never
//! observes a value older than one it already received live. A broadcast
//! failure never rolls back the persisted value; late subscribers re-read
//! the store, so transient divergence is acceptable.

use std::sync::Arc;

use bytes::Bytes;

use crate::limiter::RateLimiter;
use crate::registry::{FluxEvent, FluxId, FluxRegistry, RegistryError, Subscription};
use crate::store::{FluxStore, StoreError};

/// Error type for publish requests
#[derive(Debug)]
pub enum PublishError {
    /// The flux exceeded its publish quota for the current window
    RateLimitExceeded {
        /// The throttled flux
        flux: FluxId,
    },
    /// Payload larger than the configured cap
    PayloadTooLarge {
        /// Actual payload size in bytes
        size: usize,
        /// The configured cap
        limit: usize,
    },
    /// The external store failed; nothing was broadcast
    Store(StoreError),
}

impl std::fmt::Display for PublishError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PublishError::RateLimitExceeded { flux } => {
                write!(f, "Rate limit exceeded for flux {}", flux)
            }
            PublishError::PayloadTooLarge { size, limit } => {
                write!(f, "Payload too large: {} bytes (limit {})", size, limit)
            }
            PublishError::Store(err) => write!(f, "Persistence failed: {}", err),
        }
    }
}

impl std::error::Error for PublishError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PublishError::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for PublishError {
    fn from(err: StoreError) -> Self {
        PublishError::Store(err)
    }
}

/// Outcome of a successful publish
#[derive(Debug, Clone)]
pub struct PublishReceipt {
    /// Number of sessions the value was queued for
    pub receivers: usize,
}

/// One write request end to end
pub struct PublishPipeline<S> {
    registry: Arc<FluxRegistry>,
    limiter: RateLimiter,
    store: S,
    max_payload_size: usize,
}

impl<S: FluxStore> PublishPipeline<S> {
    /// Create a pipeline over a registry and an external store
    ///
    /// The rate limiter and the payload cap come from the registry's
    /// configuration.
    pub fn new(registry: Arc<FluxRegistry>, store: S) -> Self {
        let limiter = RateLimiter::from_config(registry.config());
        let max_payload_size = registry.config().max_payload_size;
        Self {
            limiter,
            max_payload_size,
            store,
            registry,
        }
    }

    /// The underlying registry
    pub fn registry(&self) -> &Arc<FluxRegistry> {
        &self.registry
    }

    /// The external store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Publish a value to a flux
    ///
    /// Size gate, then rate limit, then persistence, then fan-out. A store
    /// failure aborts before the registry is touched.
    pub async fn publish(
        &self,
        flux: &FluxId,
        payload: Bytes,
    ) -> Result<PublishReceipt, PublishError> {
        if payload.len() > self.max_payload_size {
            return Err(PublishError::PayloadTooLarge {
                size: payload.len(),
                limit: self.max_payload_size,
            });
        }

        if !self.limiter.check_and_record(flux).await {
            tracing::warn!(flux = %flux, "Publish throttled");
            return Err(PublishError::RateLimitExceeded { flux: flux.clone() });
        }

        self.store.set_value(flux, payload.clone()).await?;

        let receivers = self.registry.publish(flux, FluxEvent::data(payload)).await;
        tracing::debug!(flux = %flux, receivers = receivers, "Value published");

        Ok(PublishReceipt { receivers })
    }

    /// Subscribe to a flux's live feed
    ///
    /// With `send_current` set, the stored value (if any) is delivered as a
    /// snapshot event before live data. An absent flux or value, or a store
    /// read failure, skips the snapshot rather than failing an admission
    /// that already succeeded.
    pub async fn subscribe(
        &self,
        flux: &FluxId,
        send_current: bool,
    ) -> Result<Subscription, RegistryError> {
        let subscription = self.registry.subscribe(flux).await?;

        if send_current {
            match self.store.get_value(flux).await {
                Ok(Some(value)) => {
                    self.registry
                        .deliver_to(subscription.session_id, FluxEvent::snapshot(value))
                        .await;
                }
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(flux = %flux, error = %err, "Snapshot read failed");
                }
            }
        }

        Ok(subscription)
    }
}
