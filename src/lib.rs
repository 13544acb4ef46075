//! A session-multiplexed MCP gateway that runs shell commands.
//!
//! Clients open a long-lived SSE stream, receive the endpoint for their
//! session, and POST JSON-RPC messages to it. Answers come back on the stream.
//!
//! ```text
//!  GET /sse ──► Gateway::open_stream ──► SessionManager::register
//!                     │                        │
//!                     ▼                        ▼
//!               StreamHandle ◄── frames ── Session ── ToolRegistry ── run_command
//!                                              ▲
//!  POST /messages?sessionId=… ──► Gateway::deliver_message
//! ```

pub mod config;
pub mod error;
pub mod executor;
pub mod filter;
pub mod gateway;
pub mod http;
pub mod manager;
pub mod protocol;
pub mod registry;
pub mod session;
pub mod tools;
pub mod transport;

pub use config::GatewayConfig;
pub use error::{GatewayError, ToolError};
pub use gateway::Gateway;
pub use manager::SessionManager;
pub use registry::{InputSchema, ParamDef, ParamType, ToolDefinition, ToolHandler, ToolRegistry};
pub use session::{Session, SessionId, SessionState};
pub use transport::{OutboundEvent, StreamHandle};
