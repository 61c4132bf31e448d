//! devlink Server - Axum-based HTTP server
//!
//! This crate provides the device-facing linking API and the activation pages.

pub mod http;
pub mod state;

pub use http::create_router;
pub use state::AppState;
