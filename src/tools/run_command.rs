use std::time::Duration;

use async_trait::async_trait;
use rmcp::model::{CallToolResult, Content, JsonObject};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::error::ToolError;
use crate::executor::{run_command, shell_command, CommandOutput, DEFAULT_TIMEOUT_MS};
use crate::filter::OutputFilter;
use crate::registry::{InputSchema, ParamDef, ParamType, ToolDefinition, ToolHandler};

pub const NAME: &str = "run_command";

const DESCRIPTION: &str = "Executes a shell command on the host and returns its captured stdout and stderr.

Optional output filtering applied to stdout, in order grep -> head -> tail:
- grep_pattern: keep lines matching a regex (invert_grep: true to drop them instead)
- head/tail: keep the first/last N lines";

/// Arguments accepted by `run_command`, after schema validation.
#[derive(Debug, Deserialize)]
pub struct RunCommandRequest {
    /// The full command line, interpreted by the host shell
    pub command: String,

    /// Timeout in milliseconds
    pub timeout: i64,

    #[serde(flatten)]
    pub filter: OutputFilter,
}

impl RunCommandRequest {
    fn timeout(&self) -> Result<Duration, ToolError> {
        if self.timeout <= 0 {
            return Err(ToolError::InvalidArguments(format!(
                "timeout must be a positive number of milliseconds, got {}",
                self.timeout
            )));
        }
        Ok(Duration::from_millis(self.timeout as u64))
    }
}

/// Handler behind the `run_command` tool.
#[derive(Debug, Clone)]
pub struct RunCommandTool {
    default_timeout_ms: u64,
}

impl Default for RunCommandTool {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT_MS)
    }
}

impl RunCommandTool {
    pub fn new(default_timeout_ms: u64) -> Self {
        Self { default_timeout_ms }
    }

    pub fn input_schema(&self) -> InputSchema {
        InputSchema::new(vec![
            ParamDef::required("command", ParamType::String)
                .with_description("The command to run"),
            ParamDef::optional("timeout", ParamType::Integer)
                .with_default(self.default_timeout_ms)
                .with_description("Timeout in milliseconds"),
            ParamDef::optional("grep_pattern", ParamType::String)
                .with_description("Regex; keep only matching stdout lines"),
            ParamDef::optional("invert_grep", ParamType::Boolean)
                .with_default(false)
                .with_description("Drop matching lines instead of keeping them"),
            ParamDef::optional("head", ParamType::Integer)
                .with_description("Keep only the first N stdout lines"),
            ParamDef::optional("tail", ParamType::Integer)
                .with_description("Keep only the last N stdout lines"),
        ])
    }

    pub fn into_definition(self) -> ToolDefinition {
        ToolDefinition::new(NAME, DESCRIPTION, self.input_schema(), self)
    }
}

#[async_trait]
impl ToolHandler for RunCommandTool {
    async fn call(&self, arguments: JsonObject) -> Result<CallToolResult, ToolError> {
        let req: RunCommandRequest = serde_json::from_value(Value::Object(arguments))
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
        if req.command.trim().is_empty() {
            return Err(ToolError::InvalidArguments(
                "command must not be empty".to_string(),
            ));
        }
        let timeout = req.timeout()?;
        let filter = req.filter.compile()?;

        info!(command = %req.command, timeout_ms = req.timeout, "running command");
        let output = run_command(shell_command(&req.command), timeout).await?;
        let output = CommandOutput {
            stdout: output.stdout.and_then(|stdout| filter.apply(stdout)),
            ..output
        };

        let content = Content::json(&output)
            .map_err(|e| ToolError::HandlerFailed(e.message.to_string()))?;
        Ok(CallToolResult::success(vec![content]))
    }
}
