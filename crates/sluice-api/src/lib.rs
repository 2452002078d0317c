//! Sluice API - HTTP surface for agent management and live answer streams

pub mod api;
pub mod auth;
pub mod error;
pub mod sink;
pub mod state;
pub mod store;

pub use api::router;
pub use state::AppState;
