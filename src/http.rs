//! axum front: `GET {sse_path}` opens a session stream, `POST {post_path}`
//! delivers a message to it.

use std::convert::Infallible;
use std::future::IntoFuture;
use std::io;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Router,
};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, Instrument};

use crate::error::GatewayError;
use crate::gateway::Gateway;
use crate::transport::OutboundEvent;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostMessageQuery {
    pub session_id: String,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        match self {
            GatewayError::SessionNotFound(_) => {
                (StatusCode::NOT_FOUND, "Session not found").into_response()
            }
            GatewayError::MalformedMessage(e) => {
                (StatusCode::BAD_REQUEST, format!("Invalid JSON-RPC message: {e}")).into_response()
            }
            GatewayError::StreamClosed => (StatusCode::GONE, "Session stream closed").into_response(),
        }
    }
}

fn sse_event(event: OutboundEvent) -> Event {
    Event::default().event(event.name()).data(event.data())
}

async fn sse_handler(
    State(gateway): State<Gateway>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let handle = gateway.open_stream();
    info!(session_id = %handle.session_id(), "sse connection");
    let stream = handle.map(|event| Ok(sse_event(event)));
    Sse::new(stream).keep_alive(KeepAlive::new().interval(gateway.config().keep_alive()))
}

async fn post_message_handler(
    State(gateway): State<Gateway>,
    Query(PostMessageQuery { session_id }): Query<PostMessageQuery>,
    body: Bytes,
) -> Result<StatusCode, GatewayError> {
    gateway.deliver_message(&session_id, &body)?;
    Ok(StatusCode::ACCEPTED)
}

pub fn router(gateway: Gateway) -> Router {
    let config = gateway.config();
    Router::new()
        .route(&config.sse_path, get(sse_handler))
        .route(&config.post_path, post(post_message_handler))
        .with_state(gateway)
}

/// Bind the configured address and serve until `ct` is cancelled.
pub async fn serve(gateway: Gateway, ct: CancellationToken) -> io::Result<()> {
    let listener = TcpListener::bind(gateway.config().bind).await?;
    serve_on(listener, gateway, ct).await
}

/// Serve on an already bound listener.
///
/// On cancellation every live session is closed, which ends the open event
/// streams and lets the graceful shutdown complete.
pub async fn serve_on(
    listener: TcpListener,
    gateway: Gateway,
    ct: CancellationToken,
) -> io::Result<()> {
    let bind_address = listener.local_addr()?;
    info!(%bind_address, "shell gateway listening");

    let app = router(gateway.clone());
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        ct.cancelled().await;
        let closed = gateway.shutdown();
        info!(closed, "shutting down, sessions closed");
    });
    server
        .into_future()
        .instrument(tracing::info_span!("shell-gateway", %bind_address))
        .await
}
