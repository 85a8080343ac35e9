//! Local feed demo
//!
//! Run with: cargo run --example local_feed
//!
//! Wires the full engine together in one process: an in-memory store, the
//! session registry with its sweep task, and the publish pipeline. Two
//! subscribers follow the same flux; one asks for the current value on
//! connect, then a writer publishes a few updates.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use fluxcast::{EventKind, FluxId, FluxRegistry, HubConfig, MemoryStore, PublishPipeline};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = HubConfig::default().heartbeat_interval(Duration::from_secs(5));
    let registry = Arc::new(FluxRegistry::with_config(config));
    let _sweeper = registry.spawn_sweep_task();

    let store = MemoryStore::new();
    let flux = FluxId::new("demo");
    store.create_flux(flux.clone(), None).await;

    let pipeline = Arc::new(PublishPipeline::new(Arc::clone(&registry), store));

    // Seed a value so the late joiner sees a snapshot on connect
    pipeline.publish(&flux, Bytes::from_static(b"seed")).await?;

    let mut live = pipeline.subscribe(&flux, false).await?;
    let mut catchup = pipeline.subscribe(&flux, true).await?;
    let session_ids = [live.session_id, catchup.session_id];

    let reader_a = tokio::spawn(async move {
        while let Some(event) = live.recv().await {
            match event.kind {
                EventKind::Heartbeat => println!("[live] heartbeat"),
                _ => println!("[live] {:?}: {:?}", event.kind, event.payload),
            }
        }
        println!("[live] feed closed");
    });

    let reader_b = tokio::spawn(async move {
        while let Some(event) = catchup.recv().await {
            match event.kind {
                EventKind::Heartbeat => println!("[catchup] heartbeat"),
                _ => println!("[catchup] {:?}: {:?}", event.kind, event.payload),
            }
        }
        println!("[catchup] feed closed");
    });

    for n in 1..=3u32 {
        let payload = Bytes::from(format!("update {}", n));
        let receipt = pipeline.publish(&flux, payload).await?;
        println!("published update {} to {} receivers", n, receipt.receivers);
        tokio::time::sleep(Duration::from_secs(2)).await;
    }

    let stats = registry.stats().await;
    println!("{} sessions across {} fluxes", stats.sessions, stats.fluxes);

    // Tear everything down; both readers observe the end of their feeds
    for id in session_ids {
        registry.unsubscribe(id).await;
    }

    reader_a.await?;
    reader_b.await?;
    Ok(())
}
