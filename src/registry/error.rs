//! Registry error types
//!
//! Error types for admission control.

use super::event::FluxId;

/// Error type for registry operations
#[derive(Debug, Clone)]
pub enum RegistryError {
    /// Global session cap reached
    CapacityExceeded {
        /// The configured global limit
        limit: usize,
    },
    /// Per-flux session cap reached
    FluxCapacityExceeded {
        /// The flux that is full
        flux: FluxId,
        /// The configured per-flux limit
        limit: usize,
    },
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::CapacityExceeded { limit } => {
                write!(f, "Connection capacity exceeded (limit {})", limit)
            }
            RegistryError::FluxCapacityExceeded { flux, limit } => {
                write!(f, "Flux {} capacity exceeded (limit {})", flux, limit)
            }
        }
    }
}

impl std::error::Error for RegistryError {}
