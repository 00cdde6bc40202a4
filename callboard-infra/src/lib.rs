//! Storage backends and coordination primitives for Callboard sessions.

pub mod infra;
