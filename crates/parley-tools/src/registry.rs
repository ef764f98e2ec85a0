use crate::tool::{Tool, ToolDescriptor};
use parley_core::{ParleyError, ParleyResult};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Central registry for all available tools.
///
/// Descriptors are reported in registration order so the tool catalog sent
/// to the backend is stable from one request to the next.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Registers a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.descriptor().name.clone();
        if self.tools.insert(name.clone(), tool).is_some() {
            warn!(tool = %name, "Replaced previously registered tool");
        } else {
            info!(tool = %name, "Registered tool");
            self.order.push(name);
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.descriptor().clone())
            .collect()
    }

    /// Execute a tool by name on the blocking pool.
    ///
    /// Returns [`ParleyError::UnknownTool`] when nothing is registered under
    /// `name`, and [`ParleyError::ToolExecution`] when the tool fails or panics.
    pub async fn execute(&self, name: &str, arguments: serde_json::Value) -> ParleyResult<String> {
        let tool = self
            .tools
            .get(name)
            .cloned()
            .ok_or_else(|| ParleyError::UnknownTool(name.to_string()))?;

        let result = tokio::task::spawn_blocking(move || tool.execute(&arguments))
            .await
            .map_err(|e| ParleyError::ToolExecution(format!("tool '{name}' did not complete: {e}")))?;

        result.map_err(|e| match e {
            ParleyError::ToolExecution(msg) => ParleyError::ToolExecution(msg),
            other => ParleyError::ToolExecution(other.to_string()),
        })
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
