//! External persistence interface
//!
//! The core never owns flux records; it reads and writes last values
//! through this seam and tolerates absent fluxes without failing. Channel
//! lifecycle (creation, credential issuance, deletion) belongs to the
//! surrounding system.

use std::collections::HashMap;

use bytes::Bytes;
use tokio::sync::RwLock;

use crate::registry::FluxId;

/// Error type for store operations
#[derive(Debug, Clone)]
pub enum StoreError {
    /// The backing store could not complete the operation
    Backend(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Backend(reason) => write!(f, "Store backend failure: {}", reason),
        }
    }
}

impl std::error::Error for StoreError {}

/// Persistence operations the core consumes
///
/// Implementations are external; [`MemoryStore`] exists for tests and
/// demos. "Not found" is expressed as `Ok(None)`, never as an error.
#[allow(async_fn_in_trait)]
pub trait FluxStore: Send + Sync {
    /// Read the last value of a flux
    async fn get_value(&self, flux: &FluxId) -> Result<Option<Bytes>, StoreError>;

    /// Persist the last value of a flux
    async fn set_value(&self, flux: &FluxId, value: Bytes) -> Result<(), StoreError>;

    /// Read the hashed credential of a flux
    async fn get_credential(&self, flux: &FluxId) -> Result<Option<String>, StoreError>;

    /// Delete a flux record
    async fn delete_flux(&self, flux: &FluxId) -> Result<(), StoreError>;
}

struct FluxRecord {
    value: Option<Bytes>,
    credential: Option<String>,
}

/// In-memory `FluxStore` for tests and demos
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<FluxId, FluxRecord>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a flux record with no value yet
    ///
    /// Stands in for the external system's channel creation; the
    /// credential is stored opaquely, hashing is not this crate's concern.
    pub async fn create_flux(&self, flux: FluxId, credential: Option<String>) {
        self.records.write().await.insert(
            flux,
            FluxRecord {
                value: None,
                credential,
            },
        );
    }

    /// Number of flux records
    pub async fn flux_count(&self) -> usize {
        self.records.read().await.len()
    }
}

impl FluxStore for MemoryStore {
    async fn get_value(&self, flux: &FluxId) -> Result<Option<Bytes>, StoreError> {
        Ok(self
            .records
            .read()
            .await
            .get(flux)
            .and_then(|record| record.value.clone()))
    }

    async fn set_value(&self, flux: &FluxId, value: Bytes) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        match records.get_mut(flux) {
            Some(record) => record.value = Some(value),
            None => {
                records.insert(
                    flux.clone(),
                    FluxRecord {
                        value: Some(value),
                        credential: None,
                    },
                );
            }
        }
        Ok(())
    }

    async fn get_credential(&self, flux: &FluxId) -> Result<Option<String>, StoreError> {
        Ok(self
            .records
            .read()
            .await
            .get(flux)
            .and_then(|record| record.credential.clone()))
    }

    async fn delete_flux(&self, flux: &FluxId) -> Result<(), StoreError> {
        self.records.write().await.remove(flux);
        Ok(())
    }
}
