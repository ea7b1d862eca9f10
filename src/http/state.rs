//! Application state for the HTTP server.

use std::sync::Arc;

use crate::db::repository::FullRepository;
use crate::services::auth::AuthConfig;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Repository instance for database operations
    pub repository: Arc<dyn FullRepository>,
    /// Token signing/verification configuration
    pub auth: Arc<AuthConfig>,
}

impl AppState {
    /// Create a new application state.
    pub fn new(repository: Arc<dyn FullRepository>, auth: AuthConfig) -> Self {
        Self {
            repository,
            auth: Arc::new(auth),
        }
    }
}
