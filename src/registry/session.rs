//! Session state
//!
//! Tracks one subscriber's lifecycle from admission to teardown.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};

use super::event::{FluxEvent, FluxId};

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Admitted, eligible for delivery
    Active,
    /// Teardown in progress
    Closing,
    /// Torn down; no further delivery attempted
    Closed,
}

/// One subscriber's live connection state
///
/// Owned exclusively by the registry. The delivery sink is the sending half
/// of a bounded channel whose receiving half lives in the subscriber's
/// [`Subscription`]; a failed push (receiver gone, or queue full because the
/// consumer stopped draining) is the signal that drives teardown.
pub struct Session {
    /// Unique session ID
    pub id: u64,

    /// The flux this session subscribes to
    pub flux: FluxId,

    /// Current phase
    pub phase: SessionPhase,

    /// When the session was admitted
    pub created_at: Instant,

    /// Last successful delivery (heartbeats included)
    pub last_activity: Instant,

    /// Delivery sink
    sink: mpsc::Sender<FluxEvent>,

    /// Heartbeat task handle, aborted on teardown
    pub(super) heartbeat: Option<JoinHandle<()>>,
}

impl Session {
    /// Create a new session stamped with the current time
    pub(super) fn new(id: u64, flux: FluxId, sink: mpsc::Sender<FluxEvent>) -> Self {
        let now = Instant::now();
        Self {
            id,
            flux,
            phase: SessionPhase::Active,
            created_at: now,
            last_activity: now,
            sink,
            heartbeat: None,
        }
    }

    /// Attempt to push an event to this session's subscriber
    ///
    /// Refreshes `last_activity` on success. Returns false when the push
    /// fails, which the registry treats as the teardown trigger.
    pub(super) fn deliver(&mut self, event: FluxEvent) -> bool {
        if self.phase != SessionPhase::Active {
            return false;
        }

        match self.sink.try_send(event) {
            Ok(()) => {
                self.last_activity = Instant::now();
                true
            }
            Err(_) => false,
        }
    }

    /// Whether the session has been idle longer than `timeout`
    pub(super) fn is_stale(&self, now: Instant, timeout: Duration) -> bool {
        now.duration_since(self.last_activity) > timeout
    }

    /// Tear the session down
    ///
    /// Idempotent: only the first call has effect. Cancels the heartbeat
    /// task; dropping the session afterwards drops the sink, which ends the
    /// subscriber's receiver.
    pub(super) fn close(&mut self) {
        if self.phase != SessionPhase::Active {
            return;
        }
        self.phase = SessionPhase::Closing;
        if let Some(handle) = self.heartbeat.take() {
            handle.abort();
        }
        self.phase = SessionPhase::Closed;
    }

    /// Session age
    pub fn duration(&self) -> Duration {
        self.created_at.elapsed()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

/// A live subscription handed to the caller by `FluxRegistry::subscribe`
///
/// Events arrive in publish order. `recv` returning `None` means the
/// session was torn down (explicitly, by a delivery failure, or by the
/// sweep) and nothing further will arrive.
pub struct Subscription {
    /// ID of the underlying session
    pub session_id: u64,

    /// The subscribed flux
    pub flux: FluxId,

    events: mpsc::Receiver<FluxEvent>,
}

impl Subscription {
    pub(super) fn new(session_id: u64, flux: FluxId, events: mpsc::Receiver<FluxEvent>) -> Self {
        Self {
            session_id,
            flux,
            events,
        }
    }

    /// Receive the next event, or `None` once the session is closed
    pub async fn recv(&mut self) -> Option<FluxEvent> {
        self.events.recv().await
    }

    /// Non-blocking receive
    pub fn try_recv(&mut self) -> Option<FluxEvent> {
        self.events.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::EventKind;
    use bytes::Bytes;

    #[tokio::test]
    async fn test_deliver_refreshes_activity() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut session = Session::new(1, FluxId::new("f"), tx);
        let before = session.last_activity;

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(session.deliver(FluxEvent::data(Bytes::from_static(b"x"))));
        assert!(session.last_activity > before);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind, EventKind::Data);
    }

    #[tokio::test]
    async fn test_deliver_fails_when_receiver_dropped() {
        let (tx, rx) = mpsc::channel(4);
        let mut session = Session::new(1, FluxId::new("f"), tx);
        drop(rx);

        assert!(!session.deliver(FluxEvent::heartbeat()));
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_stops_delivery() {
        let (tx, _rx) = mpsc::channel(4);
        let mut session = Session::new(1, FluxId::new("f"), tx);

        session.close();
        assert_eq!(session.phase, SessionPhase::Closed);
        session.close();
        assert_eq!(session.phase, SessionPhase::Closed);

        assert!(!session.deliver(FluxEvent::heartbeat()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_staleness() {
        let (tx, _rx) = mpsc::channel(4);
        let session = Session::new(1, FluxId::new("f"), tx);
        let timeout = Duration::from_secs(300);

        assert!(!session.is_stale(Instant::now(), timeout));

        tokio::time::advance(Duration::from_secs(301)).await;
        assert!(session.is_stale(Instant::now(), timeout));
    }
}
