pub mod config;
pub mod repl;
pub mod sample_tools;
