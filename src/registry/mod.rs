//! Session registry and broadcast engine
//!
//! The registry owns every live subscriber session, gates admission by a
//! global and a per-flux cap, and fans published events out to all sessions
//! of a flux. A background sweep evicts sessions that have gone idle.
//!
//! # Architecture
//!
//! ```text
//!                       Arc<FluxRegistry>
//!                 ┌──────────────────────────────┐
//!                 │ sessions: HashMap<u64,       │
//!                 │   Session {                  │
//!                 │     sink: mpsc::Sender,      │
//!                 │     last_activity,           │
//!                 │     heartbeat task,          │
//!                 │   }                          │
//!                 │ >                            │
//!                 │ by_flux: HashMap<FluxId,     │
//!                 │   HashSet<u64>>              │
//!                 └──────────────┬───────────────┘
//!                                │
//!            ┌───────────────────┼───────────────────┐
//!            │                   │                    │
//!            ▼                   ▼                    ▼
//!       [Publisher]         [Subscriber]         [Subscriber]
//!       publish()           sub.recv()           sub.recv()
//!            │                   │                    │
//!            └──► per-session try_send ──► bounded queue ──► caller
//! ```
//!
//! # Failure isolation
//!
//! Each session has its own bounded delivery queue. A push that fails
//! (receiver dropped, or queue full) tears down only that session; the
//! other subscribers of the same publish are unaffected. Teardown always
//! cancels the session's heartbeat task and drops its sender, so the
//! subscriber's receiver terminates and nothing stays registered.
//!
//! # Zero-copy fan-out
//!
//! Event payloads are `bytes::Bytes`: cloning an event for each subscriber
//! only bumps a reference count, every queue shares one allocation.

pub mod error;
pub mod event;
pub mod session;
pub mod store;

pub use error::RegistryError;
pub use event::{EventKind, FluxEvent, FluxId};
pub use session::{Session, SessionPhase, Subscription};
pub use store::{FluxRegistry, RegistryStats};
