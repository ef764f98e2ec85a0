pub mod registry;
pub mod tool;

pub use registry::ToolRegistry;
pub use tool::{FnTool, Tool, ToolDescriptor};
