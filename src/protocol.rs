//! JSON-RPC 2.0 envelopes and the MCP methods a session answers.

use rmcp::model::{
    CallToolResult, Content, ErrorCode, ErrorData, Implementation, JsonObject, ProtocolVersion,
    ServerCapabilities, ServerInfo,
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::registry::ToolRegistry;

pub const JSONRPC_VERSION: &str = "2.0";

const SERVER_INSTRUCTIONS: &str = r#"A shell gateway that exposes run_command for executing commands on the host.

run_command parameters:
- command: the full command line, run through the host shell
- timeout: milliseconds before the command is killed (default 30000)
- grep_pattern / invert_grep / head / tail: optional stdout filtering"#;

/// An inbound request or notification. Notifications carry no `id`; an
/// explicit `"id": null` is still a request.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcMessage {
    #[serde(deserialize_with = "jsonrpc_version")]
    pub jsonrpc: String,
    #[serde(default, deserialize_with = "present")]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

fn jsonrpc_version<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let version = String::deserialize(deserializer)?;
    if version != JSONRPC_VERSION {
        return Err(serde::de::Error::custom(format!(
            "unsupported jsonrpc version {version:?}, expected \"{JSONRPC_VERSION}\""
        )));
    }
    Ok(version)
}

fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

impl JsonRpcMessage {
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorData>,
}

impl JsonRpcResponse {
    pub fn new(id: Value, outcome: Result<Value, ErrorData>) -> Self {
        let (result, error) = match outcome {
            Ok(result) => (Some(result), None),
            Err(error) => (None, Some(error)),
        };
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result,
            error,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CallToolParams {
    name: String,
    #[serde(default)]
    arguments: Option<JsonObject>,
}

pub fn server_info() -> ServerInfo {
    ServerInfo {
        protocol_version: ProtocolVersion::V_2024_11_05,
        capabilities: ServerCapabilities::builder().enable_tools().build(),
        server_info: Implementation {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            ..Default::default()
        },
        instructions: Some(SERVER_INSTRUCTIONS.to_string()),
    }
}

/// Answer one inbound message against a session's tools.
///
/// Returns `None` for notifications. Tool execution failures become an
/// `isError` tool result; unknown tools and bad arguments become JSON-RPC
/// invalid-params errors.
pub async fn dispatch(tools: &ToolRegistry, message: JsonRpcMessage) -> Option<JsonRpcResponse> {
    let JsonRpcMessage {
        id, method, params, ..
    } = message;

    let Some(id) = id else {
        debug!(%method, "notification received");
        return None;
    };

    let outcome = match method.as_str() {
        "initialize" => to_value(server_info()),
        "ping" => Ok(json!({})),
        "tools/list" => Ok(json!({ "tools": tools.list() })),
        "tools/call" => call_tool(tools, params).await,
        _ => Err(ErrorData::new(
            ErrorCode::METHOD_NOT_FOUND,
            format!("Method not found: {method}"),
            None,
        )),
    };

    Some(JsonRpcResponse::new(id, outcome))
}

async fn call_tool(tools: &ToolRegistry, params: Option<Value>) -> Result<Value, ErrorData> {
    let params: CallToolParams = serde_json::from_value(params.unwrap_or(Value::Null))
        .map_err(|e| ErrorData::invalid_params(format!("Invalid tools/call params: {e}"), None))?;

    info!(tool = %params.name, "tool call");
    match tools.invoke(&params.name, params.arguments).await {
        Ok(result) => to_value(result),
        Err(e) if e.is_request_error() => Err(ErrorData::invalid_params(e.to_string(), None)),
        Err(e) => {
            info!(tool = %params.name, error = %e, "tool call failed");
            to_value(CallToolResult::error(vec![Content::text(e.to_string())]))
        }
    }
}

fn to_value<T: Serialize>(value: T) -> Result<Value, ErrorData> {
    serde_json::to_value(value).map_err(|e| ErrorData::internal_error(e.to_string(), None))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::default_registry;

    fn request(id: i64, method: &str, params: Value) -> JsonRpcMessage {
        serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params
        }))
        .unwrap()
    }

    async fn respond(message: JsonRpcMessage) -> Value {
        let response = dispatch(&default_registry(30_000), message).await.unwrap();
        serde_json::to_value(response).unwrap()
    }

    #[tokio::test]
    async fn test_notification_gets_no_response() {
        let message: JsonRpcMessage = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "method": "notifications/initialized"
        }))
        .unwrap();
        assert!(message.is_notification());
        assert!(dispatch(&ToolRegistry::new(), message).await.is_none());
    }

    #[test]
    fn test_wrong_version_is_rejected() {
        for version in [json!("1.0"), json!(2.0), Value::Null] {
            let result = serde_json::from_value::<JsonRpcMessage>(json!({
                "jsonrpc": version,
                "id": 1,
                "method": "ping"
            }));
            assert!(result.is_err(), "accepted jsonrpc {version}");
        }
        let missing = serde_json::from_value::<JsonRpcMessage>(json!({"id": 1, "method": "ping"}));
        assert!(missing.is_err());
    }

    #[tokio::test]
    async fn test_null_id_is_a_request() {
        let message: JsonRpcMessage = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": null,
            "method": "ping"
        }))
        .unwrap();
        assert!(!message.is_notification());

        let response = dispatch(&ToolRegistry::new(), message).await.unwrap();
        let response = serde_json::to_value(response).unwrap();
        assert_eq!(response["id"], Value::Null);
        assert_eq!(response["result"], json!({}));
    }

    #[tokio::test]
    async fn test_initialize() {
        let response = respond(request(1, "initialize", json!({}))).await;
        assert_eq!(response["id"], json!(1));
        assert_eq!(response["result"]["protocolVersion"], json!("2024-11-05"));
        assert!(response["result"]["capabilities"]["tools"].is_object());
        assert_eq!(
            response["result"]["serverInfo"]["name"],
            json!(env!("CARGO_PKG_NAME"))
        );
    }

    #[tokio::test]
    async fn test_ping() {
        let response = respond(request(7, "ping", Value::Null)).await;
        assert_eq!(response["result"], json!({}));
        assert!(response.get("error").is_none());
    }

    #[tokio::test]
    async fn test_tools_list() {
        let response = respond(request(2, "tools/list", json!({}))).await;
        let tools = response["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0]["name"], json!("run_command"));
        assert_eq!(tools[0]["inputSchema"]["required"], json!(["command"]));
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let response = respond(request(3, "resources/list", json!({}))).await;
        assert_eq!(response["error"]["code"], json!(-32601));
    }

    #[tokio::test]
    async fn test_unknown_tool_is_invalid_params() {
        let response = respond(request(
            4,
            "tools/call",
            json!({"name": "nonexistent_tool", "arguments": {}}),
        ))
        .await;
        assert_eq!(response["error"]["code"], json!(-32602));
        assert!(response["error"]["message"]
            .as_str()
            .unwrap()
            .contains("nonexistent_tool"));
    }

    #[tokio::test]
    async fn test_missing_command_is_invalid_params() {
        let response = respond(request(
            5,
            "tools/call",
            json!({"name": "run_command", "arguments": {}}),
        ))
        .await;
        assert_eq!(response["error"]["code"], json!(-32602));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_is_error_result() {
        let response = respond(request(
            6,
            "tools/call",
            json!({"name": "run_command", "arguments": {"command": "sleep 5", "timeout": 100}}),
        ))
        .await;
        assert!(response.get("error").is_none());
        assert_eq!(response["result"]["isError"], json!(true));
        assert!(response["result"]["content"][0]["text"]
            .as_str()
            .unwrap()
            .contains("timed out"));
    }
}
