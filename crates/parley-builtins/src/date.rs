use parley_core::ParleyResult;
use parley_tools::{Tool, ToolDescriptor};

/// Returns today's local date as `YYYY-MM-DD`.
pub struct GetDateTool {
    descriptor: ToolDescriptor,
}

impl GetDateTool {
    pub fn new() -> Self {
        Self {
            descriptor: ToolDescriptor::new(
                "get_date",
                "Get the current date on the format YYYY-MM-DD",
                serde_json::json!({ "type": "object", "properties": {} }),
            ),
        }
    }
}

impl Default for GetDateTool {
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for GetDateTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    fn execute(&self, _arguments: &serde_json::Value) -> ParleyResult<String> {
        Ok(chrono::Local::now().format("%Y-%m-%d").to_string())
    }
}
