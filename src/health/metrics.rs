//! Process metrics source for health reports.

use std::time::{Duration, Instant};

use sysinfo::System;

/// Version string reported in health responses
pub const RUNTIME_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Memory figures in bytes.
///
/// Rust has no managed heap, so `heap_used` is the resident set and
/// `heap_total` the virtual memory size of the process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryUsage {
    pub rss: u64,
    pub heap_used: u64,
    pub heap_total: u64,
}

/// Point-in-time view of the running process.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessSnapshot {
    pub uptime: Duration,
    pub memory: MemoryUsage,
    pub pid: u32,
    pub runtime_version: String,
    pub environment: String,
}

/// Supplies process metrics. Reading metrics never fails; values that cannot
/// be determined read as zero.
pub trait ProcessMetrics: Send + Sync {
    fn snapshot(&self) -> ProcessSnapshot;
}

/// `ProcessMetrics` backed by `sysinfo`.
#[derive(Debug, Clone)]
pub struct SysinfoMetrics {
    started: Instant,
    environment: String,
}

impl SysinfoMetrics {
    /// Uptime is measured from this call, so construct it once at startup.
    pub fn new(environment: impl Into<String>) -> Self {
        Self {
            started: Instant::now(),
            environment: environment.into(),
        }
    }

    fn memory() -> MemoryUsage {
        let Ok(pid) = sysinfo::get_current_pid() else {
            return MemoryUsage::default();
        };

        let mut system = System::new();
        if !system.refresh_process(pid) {
            return MemoryUsage::default();
        }

        system
            .process(pid)
            .map(|process| MemoryUsage {
                rss: process.memory(),
                heap_used: process.memory(),
                heap_total: process.virtual_memory(),
            })
            .unwrap_or_default()
    }
}

impl ProcessMetrics for SysinfoMetrics {
    fn snapshot(&self) -> ProcessSnapshot {
        ProcessSnapshot {
            uptime: self.started.elapsed(),
            memory: Self::memory(),
            pid: std::process::id(),
            runtime_version: RUNTIME_VERSION.to_string(),
            environment: self.environment.clone(),
        }
    }
}
