//! Sluice Common - Shared utilities and types
//!
//! This crate provides the error type, configuration structs, constants
//! and domain records used across all Sluice components.

pub mod config;
pub mod constants;
pub mod error;
pub mod types;

// Re-export commonly used items
pub use config::{AgentSeed, ProviderConfig, ServerConfig, StreamSettings};
pub use error::{Result, SluiceError};
pub use types::{AgentProfile, AgentStatus, ModelParams, Pagination, Visibility};
