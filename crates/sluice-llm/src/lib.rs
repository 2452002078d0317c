//! Sluice LLM - genai-backed agent execution
//!
//! Implements the [`sluice_stream::AgentEngine`] boundary on top of genai and
//! provides the tools agents may call.

pub mod engine;
pub mod tools;

pub use engine::GenaiEngine;
pub use tools::{AgentTool, ToolDescriptor, ToolRegistry};
