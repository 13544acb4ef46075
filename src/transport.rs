//! The duplex channel behind a session: a bounded outbound queue of whole
//! frames, drained by exactly one stream consumer.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::stream::{BoxStream, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::manager::SessionManager;
use crate::session::{Session, SessionId};

/// One server → client frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundEvent {
    /// Tells the client where to POST its messages for this session.
    Endpoint(String),
    /// A complete, already serialized JSON-RPC message.
    Message(String),
}

impl OutboundEvent {
    pub fn name(&self) -> &'static str {
        match self {
            OutboundEvent::Endpoint(_) => "endpoint",
            OutboundEvent::Message(_) => "message",
        }
    }

    pub fn data(&self) -> &str {
        match self {
            OutboundEvent::Endpoint(data) | OutboundEvent::Message(data) => data,
        }
    }
}

/// Create the outbound queue for a new session.
///
/// Each item is a whole frame, so concurrent writers are serialized by the
/// queue itself and never interleave.
pub fn outbound_channel(
    capacity: usize,
) -> (mpsc::Sender<OutboundEvent>, mpsc::Receiver<OutboundEvent>) {
    mpsc::channel(capacity.max(1))
}

/// Handle returned by open-stream.
///
/// Yields the session's outbound frames until the session is closed. Dropping
/// the handle (the client went away) tears the session down.
pub struct StreamHandle {
    session: Arc<Session>,
    events: BoxStream<'static, OutboundEvent>,
    _teardown: TeardownGuard,
}

impl std::fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHandle")
            .field("session_id", self.session.id())
            .finish_non_exhaustive()
    }
}

impl StreamHandle {
    pub(crate) fn new(
        session: Arc<Session>,
        rx: mpsc::Receiver<OutboundEvent>,
        manager: Arc<SessionManager>,
    ) -> Self {
        let events = ReceiverStream::new(rx)
            .take_until(session.cancellation_token().clone().cancelled_owned())
            .boxed();
        let teardown = TeardownGuard {
            manager,
            session_id: session.id().clone(),
        };
        Self {
            session,
            events,
            _teardown: teardown,
        }
    }

    pub fn session_id(&self) -> &SessionId {
        self.session.id()
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }
}

impl Stream for StreamHandle {
    type Item = OutboundEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.poll_next_unpin(cx)
    }
}

struct TeardownGuard {
    manager: Arc<SessionManager>,
    session_id: SessionId,
}

impl Drop for TeardownGuard {
    fn drop(&mut self) {
        self.manager.close(&self.session_id);
    }
}
