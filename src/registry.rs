//! Per-session tool registry: declarative input schemas, argument validation
//! and panic-safe handler dispatch.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use rmcp::model::{CallToolResult, JsonObject, Tool};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::ToolError;

/// Primitive type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl std::fmt::Display for ParamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Array => "array",
            ParamType::Object => "object",
        };
        f.write_str(name)
    }
}

impl ParamType {
    /// Check if a JSON value matches this type
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Integer => value.is_i64() || value.is_u64(),
            ParamType::Number => value.is_number(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::Array => value.is_array(),
            ParamType::Object => value.is_object(),
        }
    }
}

/// One declared parameter of a tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamDef {
    pub name: String,
    pub param_type: ParamType,
    pub required: bool,
    pub default: Option<Value>,
    pub description: Option<String>,
}

impl ParamDef {
    pub fn required(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            name: name.into(),
            param_type,
            required: true,
            default: None,
            description: None,
        }
    }

    pub fn optional(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            required: false,
            ..Self::required(name, param_type)
        }
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Declarative description of the arguments a tool accepts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputSchema {
    params: Vec<ParamDef>,
}

impl InputSchema {
    pub fn new(params: Vec<ParamDef>) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &[ParamDef] {
        &self.params
    }

    /// Check raw arguments and fill in defaults.
    ///
    /// Unknown fields are passed through untouched. A JSON `null` counts as
    /// absent.
    pub fn validate(&self, raw: Option<JsonObject>) -> Result<JsonObject, ToolError> {
        let mut args = raw.unwrap_or_default();

        for param in &self.params {
            match args.get(&param.name) {
                Some(value) if !value.is_null() => {
                    if !param.param_type.matches(value) {
                        return Err(ToolError::InvalidArguments(format!(
                            "'{}' must be of type {}, got {}",
                            param.name, param.param_type, value
                        )));
                    }
                }
                _ => {
                    if let Some(default) = &param.default {
                        args.insert(param.name.clone(), default.clone());
                    } else if param.required {
                        return Err(ToolError::InvalidArguments(format!(
                            "missing required argument '{}'",
                            param.name
                        )));
                    } else {
                        args.remove(&param.name);
                    }
                }
            }
        }

        Ok(args)
    }

    /// Render as a JSON Schema object for `tools/list`.
    pub fn to_json_schema(&self) -> JsonObject {
        let mut properties = JsonObject::new();
        let mut required = Vec::new();

        for param in &self.params {
            let mut property = JsonObject::new();
            property.insert("type".into(), Value::String(param.param_type.to_string()));
            if let Some(description) = &param.description {
                property.insert("description".into(), Value::String(description.clone()));
            }
            if let Some(default) = &param.default {
                property.insert("default".into(), default.clone());
            }
            properties.insert(param.name.clone(), Value::Object(property));
            if param.required && param.default.is_none() {
                required.push(Value::String(param.name.clone()));
            }
        }

        let mut schema = JsonObject::new();
        schema.insert("type".into(), Value::String("object".into()));
        schema.insert("properties".into(), Value::Object(properties));
        if !required.is_empty() {
            schema.insert("required".into(), Value::Array(required));
        }
        schema
    }
}

/// The executable half of a tool.
///
/// Handlers receive arguments that already passed schema validation.
#[async_trait]
pub trait ToolHandler: Send + Sync + 'static {
    async fn call(&self, arguments: JsonObject) -> Result<CallToolResult, ToolError>;
}

/// Definition of a tool
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: InputSchema,
    pub handler: Arc<dyn ToolHandler>,
}

impl std::fmt::Debug for ToolDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("input_schema", &self.input_schema)
            .finish_non_exhaustive()
    }
}

impl ToolDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: InputSchema,
        handler: impl ToolHandler,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            handler: Arc::new(handler),
        }
    }

    /// Wire representation advertised to clients.
    pub fn to_tool(&self) -> Tool {
        Tool::new(
            self.name.clone(),
            self.description.clone(),
            Arc::new(self.input_schema.to_json_schema()),
        )
    }
}

/// Tools available on one session.
///
/// Each session builds its own registry; nothing here is shared between
/// streams.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: DashMap<String, Arc<ToolDefinition>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. A tool with the same name is replaced and returned.
    pub fn register(&self, tool: ToolDefinition) -> Option<Arc<ToolDefinition>> {
        self.tools.insert(tool.name.clone(), Arc::new(tool))
    }

    pub fn get(&self, name: &str) -> Option<Arc<ToolDefinition>> {
        self.tools.get(name).map(|entry| Arc::clone(entry.value()))
    }

    pub(crate) fn len(&self) -> usize {
        self.tools.len()
    }

    /// All tools, sorted by name.
    pub fn list(&self) -> Vec<Tool> {
        let mut tools: Vec<Tool> = self.tools.iter().map(|entry| entry.value().to_tool()).collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }

    /// Validate `raw` against the tool's schema and run its handler.
    ///
    /// The handler runs on its own task, so a panicking handler comes back as
    /// [`ToolError::HandlerFailed`] instead of tearing down the caller.
    pub async fn invoke(
        &self,
        name: &str,
        raw: Option<JsonObject>,
    ) -> Result<CallToolResult, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        let arguments = tool.input_schema.validate(raw)?;

        debug!(tool = %name, "invoking tool");
        let handler = Arc::clone(&tool.handler);
        tokio::spawn(async move { handler.call(arguments).await })
            .await
            .map_err(|e| ToolError::HandlerFailed(e.to_string()))?
    }
}
