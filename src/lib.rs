//! Beacon: a backend service scaffold with cluster-aware health checks.
//!
//! Exposes `/health`, `/health/cluster` and `/health/detailed`, backed by
//! environment-driven configuration for the application, the monitoring stack
//! and the test harness.

pub mod config;
pub mod error;
pub mod health;
pub mod http;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::{AppConfig, ConfigError};
pub use error::{CommandError, ProbeError};
pub use routes::create_router;
pub use state::AppState;
