//! devlink Core - Shared configuration and error types
//!
//! This crate provides the foundational types used across all devlink components.

pub mod config;
pub mod error;

pub use config::{Config, DEFAULT_CODE_TTL_SECS, MAX_CODE_RANGE_LEN};
pub use error::{Error, Result};
