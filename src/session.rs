//! A single client connection and the tools it exposes.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::GatewayError;
use crate::registry::ToolRegistry;
use crate::transport::OutboundEvent;

pub type SessionId = Arc<str>;

/// Fresh random session identifier.
pub fn session_id() -> SessionId {
    uuid::Uuid::new_v4().to_string().into()
}

/// Lifecycle of a session. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    Open = 0,
    Closing = 1,
    Closed = 2,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SessionState::Open,
            1 => SessionState::Closing,
            _ => SessionState::Closed,
        }
    }
}

pub struct Session {
    id: SessionId,
    tools: ToolRegistry,
    outbound: mpsc::Sender<OutboundEvent>,
    state: AtomicU8,
    ct: CancellationToken,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("tools", &self.tools.len())
            .field("state", &self.state())
            .finish()
    }
}

impl Session {
    pub fn new(id: SessionId, tools: ToolRegistry, outbound: mpsc::Sender<OutboundEvent>) -> Self {
        Self {
            id,
            tools,
            outbound,
            state: AtomicU8::new(SessionState::Open as u8),
            ct: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_open(&self) -> bool {
        self.state() == SessionState::Open
    }

    /// Cancelled once the session is closed.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.ct
    }

    /// Queue a frame on the session's stream.
    ///
    /// Waits for room in the queue, but gives up as soon as the session closes
    /// or the stream consumer is gone.
    pub async fn send(&self, event: OutboundEvent) -> Result<(), GatewayError> {
        tokio::select! {
            sent = self.outbound.send(event) => sent.map_err(|_| GatewayError::StreamClosed),
            _ = self.ct.cancelled() => Err(GatewayError::StreamClosed),
        }
    }

    /// Non-blocking enqueue, used for the endpoint frame on a fresh stream.
    pub(crate) fn try_send(&self, event: OutboundEvent) -> Result<(), GatewayError> {
        self.outbound
            .try_send(event)
            .map_err(|_| GatewayError::StreamClosed)
    }

    /// Open → Closing. Only the first caller gets `true`.
    pub(crate) fn begin_close(&self) -> bool {
        self.state
            .compare_exchange(
                SessionState::Open as u8,
                SessionState::Closing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Closing → Closed; ends the outbound stream.
    pub(crate) fn finish_close(&self) {
        self.state.store(SessionState::Closed as u8, Ordering::Release);
        self.ct.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::outbound_channel;

    fn session() -> (Session, mpsc::Receiver<OutboundEvent>) {
        let (tx, rx) = outbound_channel(4);
        (Session::new(session_id(), ToolRegistry::new(), tx), rx)
    }

    #[test]
    fn test_session_ids_are_unique() {
        assert_ne!(session_id(), session_id());
    }

    #[test]
    fn test_close_latch_runs_once() {
        let (session, _rx) = session();
        assert_eq!(session.state(), SessionState::Open);
        assert!(session.begin_close());
        assert!(!session.begin_close());
        assert_eq!(session.state(), SessionState::Closing);
        session.finish_close();
        assert_eq!(session.state(), SessionState::Closed);
        assert!(!session.begin_close());
        assert!(session.cancellation_token().is_cancelled());
    }

    #[tokio::test]
    async fn test_send_delivers_whole_frames() {
        let (session, mut rx) = session();
        session
            .send(OutboundEvent::Message("{\"a\":1}".to_string()))
            .await
            .unwrap();
        assert_eq!(
            rx.recv().await,
            Some(OutboundEvent::Message("{\"a\":1}".to_string()))
        );
    }

    #[tokio::test]
    async fn test_send_after_consumer_dropped_fails() {
        let (session, rx) = session();
        drop(rx);
        let result = session.send(OutboundEvent::Message("x".to_string())).await;
        assert!(matches!(result, Err(GatewayError::StreamClosed)));
    }

    #[tokio::test]
    async fn test_send_on_full_queue_unblocks_when_closed() {
        let (tx, _rx) = outbound_channel(1);
        let session = Arc::new(Session::new(session_id(), ToolRegistry::new(), tx));
        session.try_send(OutboundEvent::Message("fill".to_string())).unwrap();

        let waiter = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.send(OutboundEvent::Message("late".to_string())).await })
        };
        assert!(session.begin_close());
        session.finish_close();
        let result = waiter.await.unwrap();
        assert!(matches!(result, Err(GatewayError::StreamClosed)));
    }
}
