use parley_core::ParleyResult;
use serde::{Deserialize, Serialize};

/// Metadata describing a tool's call signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object.
    pub parameters_schema: serde_json::Value,
}

impl ToolDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters_schema: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters_schema,
        }
    }

    /// OpenAI-compatible function-calling entry for the `tools` array.
    pub fn function_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters_schema,
            }
        })
    }
}

/// Trait that every tool implements.
///
/// `execute` is synchronous and may have arbitrary side effects. An `Err` is
/// turned into an `ERROR: ...` tool result by the runner, it never aborts the
/// conversation.
pub trait Tool: Send + Sync {
    fn descriptor(&self) -> &ToolDescriptor;

    fn execute(&self, arguments: &serde_json::Value) -> ParleyResult<String>;
}

/// A tool backed by a closure.
pub struct FnTool<F> {
    descriptor: ToolDescriptor,
    func: F,
}

impl<F> FnTool<F>
where
    F: Fn(&serde_json::Value) -> ParleyResult<String> + Send + Sync,
{
    pub fn new(descriptor: ToolDescriptor, func: F) -> Self {
        Self { descriptor, func }
    }
}

impl<F> Tool for FnTool<F>
where
    F: Fn(&serde_json::Value) -> ParleyResult<String> + Send + Sync,
{
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    fn execute(&self, arguments: &serde_json::Value) -> ParleyResult<String> {
        (self.func)(arguments)
    }
}
