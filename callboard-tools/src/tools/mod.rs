pub mod base;
pub mod echo;
pub mod func;

pub use base::Tool;
pub use echo::EchoTool;
pub use func::FnTool;
