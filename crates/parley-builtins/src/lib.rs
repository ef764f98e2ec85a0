//! Built-in tools for Parley.
//!
//! # Main entry points
//!
//! - [`register_builtins()`]: Register the standard set of built-in tools.

/// Current date tool.
pub mod date;
/// Weather lookup tool (mocked).
pub mod weather;

pub use date::GetDateTool;
pub use weather::GetWeatherTool;

use parley_tools::ToolRegistry;
use std::sync::Arc;

/// Register all built-in tools into the given registry.
pub fn register_builtins(registry: &mut ToolRegistry) {
    registry.register(Arc::new(GetDateTool::new()));
    registry.register(Arc::new(GetWeatherTool::new()));
}
