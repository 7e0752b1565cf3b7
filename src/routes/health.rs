//! Health check endpoints for container orchestration.
//!
//! `/health` is a liveness probe that only touches process metrics.
//! `/health/cluster` adds node identity and Docker Swarm role. A node that
//! cannot resolve its own hostname gets `status: "error"` in the body; the
//! HTTP status stays 200.

use axum::extract::State;

use crate::health::{BasicReport, ClusterHealth, DetailedHealth};
use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> BasicReport {
    state.health.basic()
}

pub async fn cluster(State(state): State<AppState>) -> ClusterHealth {
    state.health.cluster().await
}

pub async fn detailed(State(state): State<AppState>) -> DetailedHealth {
    state.health.detailed().await
}
