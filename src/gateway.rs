//! The two entry points the HTTP front calls: open-stream and deliver-message.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::manager::SessionManager;
use crate::protocol::{dispatch, JsonRpcMessage};
use crate::session::Session;
use crate::tools::default_registry;
use crate::transport::{outbound_channel, OutboundEvent, StreamHandle};

#[derive(Debug, Clone)]
pub struct Gateway {
    config: Arc<GatewayConfig>,
    sessions: Arc<SessionManager>,
}

impl Gateway {
    pub fn new(config: GatewayConfig) -> Self {
        Self::with_manager(config, Arc::new(SessionManager::new()))
    }

    pub fn with_manager(config: GatewayConfig, sessions: Arc<SessionManager>) -> Self {
        Self {
            config: Arc::new(config),
            sessions,
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Create and register a session for a new connection.
    ///
    /// The first frame on the returned stream is the endpoint the client must
    /// POST to. Dropping the handle closes the session.
    pub fn open_stream(&self) -> StreamHandle {
        let (tx, rx) = outbound_channel(self.config.channel_capacity);
        let tools = default_registry(self.config.default_timeout_ms);
        let session = self
            .sessions
            .register(move |id| Session::new(id, tools, tx));

        let endpoint = format!("{}?sessionId={}", self.config.post_path, session.id());
        if session.try_send(OutboundEvent::Endpoint(endpoint)).is_err() {
            warn!(session_id = %session.id(), "could not queue endpoint event");
        }

        StreamHandle::new(session, rx, Arc::clone(&self.sessions))
    }

    /// Route one inbound message to its session.
    ///
    /// The message is answered asynchronously on the session's stream; the
    /// returned task finishes once that answer has been queued (or dropped
    /// because the session went away). Unknown sessions are rejected without
    /// touching the session table.
    pub fn deliver_message(
        &self,
        session_id: &str,
        raw_payload: &[u8],
    ) -> Result<JoinHandle<()>, GatewayError> {
        let session = self.sessions.lookup(session_id)?;
        let message: JsonRpcMessage = serde_json::from_slice(raw_payload)?;
        debug!(session_id, method = %message.method, "message delivered");

        Ok(tokio::spawn(async move {
            let Some(response) = dispatch(session.tools(), message).await else {
                return;
            };
            let frame = match serde_json::to_string(&response) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(session_id = %session.id(), error = %e, "failed to encode response");
                    return;
                }
            };
            if session.send(OutboundEvent::Message(frame)).await.is_err() {
                debug!(session_id = %session.id(), "session closed before response was written");
            }
        }))
    }

    /// Explicitly close a session from the server side.
    pub fn close_session(&self, session_id: &str) -> bool {
        self.sessions.close(session_id)
    }

    /// Close every live session.
    pub fn shutdown(&self) -> usize {
        self.sessions.close_all()
    }
}
