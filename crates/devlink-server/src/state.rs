//! Shared application state

use devlink_auth::LinkingManager;
use devlink_core::Config;
use std::sync::Arc;

/// Shared application state
pub struct AppState {
    /// Configuration
    pub config: Config,
    /// Linking protocol over the code and link registries
    pub linking: Arc<LinkingManager>,
}

impl AppState {
    /// Create a new application state
    pub fn new(config: Config, linking: Arc<LinkingManager>) -> Self {
        Self { config, linking }
    }
}
