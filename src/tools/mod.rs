pub mod run_command;

pub use run_command::RunCommandTool;

use crate::registry::ToolRegistry;

/// Build a fresh registry holding the tools every session starts with.
pub fn default_registry(default_timeout_ms: u64) -> ToolRegistry {
    let registry = ToolRegistry::new();
    registry.register(RunCommandTool::new(default_timeout_ms).into_definition());
    registry
}
