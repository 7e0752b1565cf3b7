//! Health report shapes as serialized to clients.

use std::collections::BTreeMap;

use axum::{
    response::{IntoResponse, Response},
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use super::metrics::{MemoryUsage, ProcessSnapshot};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Current time as an ISO-8601 UTC timestamp with millisecond precision.
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterRole {
    Manager,
    Worker,
    Unknown,
}

/// Memory usage rounded to whole megabytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryReport {
    pub rss_mb: u64,
    pub heap_used_mb: u64,
    pub heap_total_mb: u64,
}

impl From<MemoryUsage> for MemoryReport {
    fn from(memory: MemoryUsage) -> Self {
        fn to_mb(bytes: u64) -> u64 {
            (bytes as f64 / BYTES_PER_MB).round() as u64
        }
        Self {
            rss_mb: to_mb(memory.rss),
            heap_used_mb: to_mb(memory.heap_used),
            heap_total_mb: to_mb(memory.heap_total),
        }
    }
}

/// Liveness report built from process metrics only.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicReport {
    pub status: Status,
    pub timestamp: String,
    pub uptime_seconds: f64,
    pub environment: String,
    pub process_id: u32,
    pub runtime_version: String,
    pub memory: MemoryReport,
}

impl BasicReport {
    pub fn from_snapshot(snapshot: ProcessSnapshot) -> Self {
        Self {
            status: Status::Ok,
            timestamp: timestamp_now(),
            uptime_seconds: snapshot.uptime.as_secs_f64(),
            environment: snapshot.environment,
            process_id: snapshot.pid,
            runtime_version: snapshot.runtime_version,
            memory: snapshot.memory.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeInfo {
    pub id: String,
    pub hostname: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterInfo {
    pub role: ClusterRole,
    pub swarm_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyStatus {
    pub status: Status,
    pub message: String,
}

impl DependencyStatus {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: Status::Ok,
            message: message.into(),
        }
    }
}

/// Full cluster-aware report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterReport {
    #[serde(flatten)]
    pub basic: BasicReport,
    pub node: NodeInfo,
    pub cluster: ClusterInfo,
    pub dependencies: BTreeMap<String, DependencyStatus>,
}

/// Replaces a report when the probe fails outright.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    pub status: Status,
    pub error: String,
    pub timestamp: String,
}

impl ErrorReport {
    pub fn new(error: impl std::fmt::Display) -> Self {
        Self {
            status: Status::Error,
            error: error.to_string(),
            timestamp: timestamp_now(),
        }
    }
}

/// Outcome of the cluster probe: a full report or an error in its place.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ClusterHealth {
    Report(Box<ClusterReport>),
    Failed(ErrorReport),
}

impl ClusterHealth {
    pub fn status(&self) -> Status {
        match self {
            ClusterHealth::Report(report) => report.basic.status,
            ClusterHealth::Failed(error) => error.status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombinedReport {
    pub basic: BasicReport,
    pub cluster: ClusterHealth,
}

/// Basic and cluster reports side by side, or an error if they could not be built.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DetailedHealth {
    Combined(CombinedReport),
    Failed(ErrorReport),
}

// Failures are reported in the body only; the response itself is always 200
// so liveness checks keyed on the HTTP status do not restart the container.

impl IntoResponse for BasicReport {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

impl IntoResponse for ClusterHealth {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

impl IntoResponse for DetailedHealth {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}
