pub mod error;
pub mod execution_context;
pub mod tools;
pub mod registry;
pub mod schema;

pub use error::ToolError;
pub use execution_context::ExecutionContext;
pub use registry::ToolRegistry;
pub use schema::{validate_input, validate_schema};
pub use tools::{EchoTool, FnTool, Tool};
