//! Event types for flux routing
//!
//! This module defines the key type for identifying fluxes and the events
//! that are pushed to subscribers.

use bytes::Bytes;

/// Opaque identifier for a flux
///
/// The core never creates or destroys fluxes; it only keys its registry and
/// rate-limit state by this ID. The external store owns the flux lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FluxId(String);

impl FluxId {
    /// Create a flux ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FluxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for FluxId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for FluxId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Kind of event pushed to a subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// A published value
    Data,
    /// Keepalive with no application payload
    Heartbeat,
    /// The stored value delivered once on connect
    Snapshot,
}

/// An event pushed to subscribers of a flux
///
/// Cheap to clone: `Bytes` is reference counted, so every subscriber of a
/// fan-out shares the same payload allocation.
#[derive(Debug, Clone)]
pub struct FluxEvent {
    /// Kind of event
    pub kind: EventKind,
    /// Payload (empty for heartbeats)
    pub payload: Bytes,
}

impl FluxEvent {
    /// Create a data event
    pub fn data(payload: Bytes) -> Self {
        Self {
            kind: EventKind::Data,
            payload,
        }
    }

    /// Create a heartbeat event
    pub fn heartbeat() -> Self {
        Self {
            kind: EventKind::Heartbeat,
            payload: Bytes::new(),
        }
    }

    /// Create a snapshot event carrying the stored value
    pub fn snapshot(payload: Bytes) -> Self {
        Self {
            kind: EventKind::Snapshot,
            payload,
        }
    }
}
