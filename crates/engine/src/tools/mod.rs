pub mod handlers;
pub mod registry;
pub mod truncation;

pub use registry::{SessionCounters, ToolHandler, ToolHandlerContext, ToolRegistry};
