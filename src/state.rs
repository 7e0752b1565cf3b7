//! Shared application state for request handlers.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::health::HealthService;

/// Shared application state, cloneable across handlers.
///
/// Holds the immutable configuration built at startup and the health probe.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub health: HealthService,
}

impl AppState {
    /// Creates state with the production health service.
    pub fn new(config: AppConfig) -> Self {
        let health = HealthService::new(&config);
        Self::with_health(config, health)
    }

    pub fn with_health(config: AppConfig, health: HealthService) -> Self {
        Self {
            config: Arc::new(config),
            health,
        }
    }
}
