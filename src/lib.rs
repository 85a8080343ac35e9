//! # fluxcast
//!
//! In-memory session registry and broadcast engine for named channels
//! ("fluxes"). Writers publish a value to a flux; any number of subscribers
//! follow a live feed of that value over long-lived connections.
//!
//! The crate owns the concurrent core of such a system and nothing else:
//!
//! - admission control — a global and a per-flux cap on live sessions;
//! - fan-out — one published value pushed to every subscriber of a flux,
//!   with per-session failure isolation;
//! - keepalive — per-session heartbeats and a periodic sweep that evicts
//!   idle sessions;
//! - publish rate limiting — a fixed window per flux.
//!
//! Persistence, credential verification, HTTP routing, and transport wire
//! formats are external; the engine pushes [`FluxEvent`]s into an abstract
//! per-subscriber queue and consumes storage through the [`FluxStore`]
//! seam.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use bytes::Bytes;
//! use fluxcast::{FluxId, FluxRegistry, HubConfig, MemoryStore, PublishPipeline};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = Arc::new(FluxRegistry::with_config(HubConfig::default()));
//! let pipeline = PublishPipeline::new(Arc::clone(&registry), MemoryStore::new());
//! let _sweeper = registry.spawn_sweep_task();
//!
//! let flux = FluxId::new("abc");
//! let mut sub = pipeline.subscribe(&flux, true).await?;
//!
//! pipeline.publish(&flux, Bytes::from_static(b"hello")).await?;
//! let event = sub.recv().await.expect("session closed");
//! assert_eq!(&event.payload[..], b"hello");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod limiter;
pub mod pipeline;
pub mod registry;
pub mod store;

pub use config::HubConfig;
pub use limiter::RateLimiter;
pub use pipeline::{PublishError, PublishPipeline, PublishReceipt};
pub use registry::{
    EventKind, FluxEvent, FluxId, FluxRegistry, RegistryError, RegistryStats, Subscription,
};
pub use store::{FluxStore, MemoryStore, StoreError};
