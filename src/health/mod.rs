//! Cluster-aware health probe.
//!
//! `HealthService` builds three reports:
//! - basic: process metrics only, never fails
//! - cluster: basic + node identity, swarm role and dependency checks
//! - detailed: basic and cluster side by side
//!
//! The hostname lookup is the only hard dependency of the cluster report.
//! Swarm queries degrade to `unknown` / `false` when Docker is missing, the
//! node is not in a swarm, or the output is not what we expect.

pub mod executor;
pub mod metrics;
pub mod report;
pub mod swarm;

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use tracing::{debug, instrument, warn, Instrument};

use crate::config::AppConfig;
use crate::error::ProbeError;

pub use executor::{CommandExecutor, TokioCommandExecutor};
pub use metrics::{ProcessMetrics, SysinfoMetrics};
pub use report::{
    BasicReport, ClusterHealth, ClusterInfo, ClusterReport, ClusterRole, CombinedReport,
    DependencyStatus, DetailedHealth, ErrorReport, NodeInfo, Status,
};

/// Builds health reports from process metrics and external commands.
///
/// Cheap to clone; collaborators are shared behind `Arc`.
#[derive(Clone)]
pub struct HealthService {
    executor: Arc<dyn CommandExecutor>,
    metrics: Arc<dyn ProcessMetrics>,
    node_id: Option<String>,
    docker_bin: String,
}

impl HealthService {
    /// Production service: real subprocesses and sysinfo-backed metrics.
    pub fn new(config: &AppConfig) -> Self {
        Self::with_collaborators(
            Arc::new(TokioCommandExecutor::new(config.health.command_timeout())),
            Arc::new(SysinfoMetrics::new(config.app.environment.clone())),
            config,
        )
    }

    pub fn with_collaborators(
        executor: Arc<dyn CommandExecutor>,
        metrics: Arc<dyn ProcessMetrics>,
        config: &AppConfig,
    ) -> Self {
        Self {
            executor,
            metrics,
            node_id: config.app.node_id.clone(),
            docker_bin: config.health.docker_bin.clone(),
        }
    }

    pub fn basic(&self) -> BasicReport {
        BasicReport::from_snapshot(self.metrics.snapshot())
    }

    /// Cluster report, or an error report when the probe fails outright.
    ///
    /// The probe runs on its own task so a panic inside it still produces an
    /// error report.
    #[instrument(name = "health::cluster", skip(self))]
    pub async fn cluster(&self) -> ClusterHealth {
        let service = self.clone();
        let result = guarded(async move { service.probe_cluster().await })
            .await
            .and_then(|result| result);
        match result {
            Ok(report) => ClusterHealth::Report(Box::new(report)),
            Err(e) => {
                warn!(error = %e, "Cluster health probe failed");
                ClusterHealth::Failed(ErrorReport::new(e))
            }
        }
    }

    /// Basic and cluster reports together, or an error report if assembling
    /// them panics.
    #[instrument(name = "health::detailed", skip(self))]
    pub async fn detailed(&self) -> DetailedHealth {
        let service = self.clone();
        let combined = guarded(async move {
            let basic = service.basic();
            let cluster = service.cluster().await;
            CombinedReport { basic, cluster }
        })
        .await;

        match combined {
            Ok(combined) => DetailedHealth::Combined(combined),
            Err(e) => {
                warn!(error = %e, "Detailed health probe failed");
                DetailedHealth::Failed(ErrorReport::new(e))
            }
        }
    }

    async fn probe_cluster(&self) -> Result<ClusterReport, ProbeError> {
        let basic = self.basic();

        let hostname = self
            .executor
            .run(swarm::HOSTNAME_PROGRAM, &[])
            .await
            .map_err(ProbeError::Hostname)?
            .trim()
            .to_string();

        let node = NodeInfo {
            id: self.node_id.clone().unwrap_or_else(|| hostname.clone()),
            hostname,
        };

        let (role, swarm_active) = tokio::join!(self.role(), self.swarm_active());

        Ok(ClusterReport {
            basic,
            node,
            cluster: ClusterInfo { role, swarm_active },
            dependencies: check_dependencies(),
        })
    }

    async fn role(&self) -> ClusterRole {
        match self
            .executor
            .run(&self.docker_bin, swarm::NODE_LIST_ARGS)
            .await
        {
            Ok(output) => swarm::parse_role(&output),
            Err(e) => {
                debug!(error = %e, "Swarm node list unavailable");
                ClusterRole::Unknown
            }
        }
    }

    async fn swarm_active(&self) -> bool {
        match self
            .executor
            .run(&self.docker_bin, swarm::SWARM_STATE_ARGS)
            .await
        {
            Ok(output) => swarm::parse_swarm_active(&output),
            Err(e) => {
                debug!(error = %e, "Swarm state unavailable");
                false
            }
        }
    }
}

/// Run `future` on its own task, inside the caller's span.
async fn guarded<F>(future: F) -> Result<F::Output, ProbeError>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    Ok(tokio::spawn(future.in_current_span()).await?)
}

/// Status of the service's backing dependencies.
///
/// Nothing is wired up yet, so every entry is a placeholder.
pub fn check_dependencies() -> BTreeMap<String, DependencyStatus> {
    BTreeMap::from([
        (
            "database".to_string(),
            DependencyStatus::ok("Not configured yet"),
        ),
        (
            "external".to_string(),
            DependencyStatus::ok("No external dependencies configured"),
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CommandError;
    use crate::health::metrics::{MemoryUsage, ProcessSnapshot};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::time::Duration;

    /// Answers commands from a table; anything not listed fails to spawn.
    struct ScriptedExecutor {
        responses: HashMap<String, Result<String, i32>>,
    }

    impl ScriptedExecutor {
        fn new(responses: &[(&str, Result<&str, i32>)]) -> Arc<Self> {
            Arc::new(Self {
                responses: responses
                    .iter()
                    .map(|(cmd, result)| (cmd.to_string(), result.map(str::to_string)))
                    .collect(),
            })
        }
    }

    #[async_trait]
    impl CommandExecutor for ScriptedExecutor {
        async fn run(&self, program: &str, args: &[&str]) -> Result<String, CommandError> {
            let key = std::iter::once(program)
                .chain(args.iter().copied())
                .collect::<Vec<_>>()
                .join(" ");
            match self.responses.get(&key) {
                Some(Ok(stdout)) => Ok(stdout.clone()),
                Some(Err(code)) => Err(CommandError::Failed {
                    program: program.to_string(),
                    code: Some(*code),
                    stderr: "scripted failure".to_string(),
                }),
                None => Err(CommandError::Spawn {
                    program: program.to_string(),
                    source: std::io::Error::from(std::io::ErrorKind::NotFound),
                }),
            }
        }
    }

    struct FixedMetrics;

    impl ProcessMetrics for FixedMetrics {
        fn snapshot(&self) -> ProcessSnapshot {
            ProcessSnapshot {
                uptime: Duration::from_secs(12),
                memory: MemoryUsage {
                    rss: 64 * 1024 * 1024,
                    heap_used: 32 * 1024 * 1024,
                    heap_total: 128 * 1024 * 1024,
                },
                pid: 4242,
                runtime_version: "0.0.0-test".to_string(),
                environment: "test".to_string(),
            }
        }
    }

    const NODE_LS: &str = "docker node ls --format {{.Self}} {{.ManagerStatus}}";
    const DOCKER_INFO: &str = "docker info --format {{.Swarm.LocalNodeState}}";

    fn service(executor: Arc<ScriptedExecutor>, node_id: Option<&str>) -> HealthService {
        let mut config = AppConfig::default();
        config.app.node_id = node_id.map(str::to_string);
        HealthService::with_collaborators(executor, Arc::new(FixedMetrics), &config)
    }

    fn expect_report(health: ClusterHealth) -> ClusterReport {
        match health {
            ClusterHealth::Report(report) => *report,
            ClusterHealth::Failed(e) => panic!("probe failed: {}", e.error),
        }
    }

    #[test]
    fn test_basic_report_uses_metrics() {
        let report = service(ScriptedExecutor::new(&[]), None).basic();
        assert_eq!(report.status, Status::Ok);
        assert_eq!(report.process_id, 4242);
        assert_eq!(report.environment, "test");
        assert_eq!(report.uptime_seconds, 12.0);
        assert_eq!(report.memory.rss_mb, 64);
        assert_eq!(report.memory.heap_used_mb, 32);
        assert_eq!(report.memory.heap_total_mb, 128);
    }

    #[tokio::test]
    async fn test_manager_in_active_swarm() {
        let executor = ScriptedExecutor::new(&[
            ("hostname", Ok("web-1\n")),
            (NODE_LS, Ok("true Leader\nfalse \n")),
            (DOCKER_INFO, Ok("active\n")),
        ]);
        let report = expect_report(service(executor, None).cluster().await);

        assert_eq!(report.basic.status, Status::Ok);
        assert_eq!(report.node.hostname, "web-1");
        assert_eq!(report.node.id, "web-1");
        assert_eq!(report.cluster.role, ClusterRole::Manager);
        assert!(report.cluster.swarm_active);
    }

    #[tokio::test]
    async fn test_hostname_is_trimmed() {
        let executor = ScriptedExecutor::new(&[("hostname", Ok("  node-7\n"))]);
        let report = expect_report(service(executor, None).cluster().await);
        assert_eq!(report.node.hostname, "node-7");
    }

    #[tokio::test]
    async fn test_node_id_override() {
        let executor = ScriptedExecutor::new(&[("hostname", Ok("node-7\n"))]);
        let report = expect_report(service(executor, Some("c0ffee")).cluster().await);
        assert_eq!(report.node.id, "c0ffee");
        assert_eq!(report.node.hostname, "node-7");
    }

    #[tokio::test]
    async fn test_worker_when_self_is_not_leader() {
        let executor = ScriptedExecutor::new(&[
            ("hostname", Ok("web-2\n")),
            (NODE_LS, Ok("false Leader\ntrue \n")),
            (DOCKER_INFO, Ok("active\n")),
        ]);
        let report = expect_report(service(executor, None).cluster().await);
        assert_eq!(report.cluster.role, ClusterRole::Worker);
    }

    #[tokio::test]
    async fn test_swarm_failures_degrade_gracefully() {
        let executor = ScriptedExecutor::new(&[
            ("hostname", Ok("standalone\n")),
            (NODE_LS, Err(1)),
            (DOCKER_INFO, Err(1)),
        ]);
        let report = expect_report(service(executor, None).cluster().await);

        assert_eq!(report.basic.status, Status::Ok);
        assert_eq!(report.cluster.role, ClusterRole::Unknown);
        assert!(!report.cluster.swarm_active);
    }

    #[tokio::test]
    async fn test_missing_docker_degrades_gracefully() {
        let executor = ScriptedExecutor::new(&[("hostname", Ok("standalone\n"))]);
        let report = expect_report(service(executor, None).cluster().await);
        assert_eq!(report.cluster.role, ClusterRole::Unknown);
        assert!(!report.cluster.swarm_active);
    }

    #[tokio::test]
    async fn test_inactive_swarm() {
        let executor = ScriptedExecutor::new(&[
            ("hostname", Ok("web-3\n")),
            (DOCKER_INFO, Ok("inactive\n")),
        ]);
        let report = expect_report(service(executor, None).cluster().await);
        assert!(!report.cluster.swarm_active);
    }

    #[tokio::test]
    async fn test_hostname_failure_is_error_report() {
        let executor = ScriptedExecutor::new(&[
            ("hostname", Err(127)),
            (NODE_LS, Ok("true Leader\n")),
            (DOCKER_INFO, Ok("active\n")),
        ]);
        let health = service(executor, None).cluster().await;

        assert_eq!(health.status(), Status::Error);
        match health {
            ClusterHealth::Failed(e) => assert!(e.error.contains("hostname")),
            ClusterHealth::Report(_) => panic!("expected error report"),
        }
    }

    #[tokio::test]
    async fn test_dependencies_are_reported() {
        let executor = ScriptedExecutor::new(&[("hostname", Ok("web-1\n"))]);
        let report = expect_report(service(executor, None).cluster().await);
        assert_eq!(report.dependencies, check_dependencies());
        assert_eq!(report.dependencies["database"].status, Status::Ok);
        assert_eq!(report.dependencies["external"].status, Status::Ok);
    }

    #[tokio::test]
    async fn test_repeated_probes_are_stable() {
        let executor = ScriptedExecutor::new(&[
            ("hostname", Ok("web-1\n")),
            (NODE_LS, Ok("true Leader\n")),
            (DOCKER_INFO, Ok("active\n")),
        ]);
        let service = service(executor, None);

        let mut first = expect_report(service.cluster().await);
        let mut second = expect_report(service.cluster().await);
        first.basic.timestamp.clear();
        second.basic.timestamp.clear();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_detailed_combines_reports() {
        let executor = ScriptedExecutor::new(&[
            ("hostname", Ok("web-1\n")),
            (NODE_LS, Ok("true \n")),
        ]);
        match service(executor, None).detailed().await {
            DetailedHealth::Combined(combined) => {
                assert_eq!(combined.basic.status, Status::Ok);
                let cluster = expect_report(combined.cluster);
                assert_eq!(cluster.cluster.role, ClusterRole::Worker);
            }
            DetailedHealth::Failed(e) => panic!("detailed failed: {}", e.error),
        }
    }

    #[tokio::test]
    async fn test_detailed_keeps_cluster_error_inline() {
        let executor = ScriptedExecutor::new(&[]);
        match service(executor, None).detailed().await {
            DetailedHealth::Combined(combined) => {
                assert_eq!(combined.basic.status, Status::Ok);
                assert_eq!(combined.cluster.status(), Status::Error);
            }
            DetailedHealth::Failed(e) => panic!("detailed failed: {}", e.error),
        }
    }

    struct PanickingExecutor;

    #[async_trait]
    impl CommandExecutor for PanickingExecutor {
        async fn run(&self, _program: &str, _args: &[&str]) -> Result<String, CommandError> {
            panic!("executor blew up")
        }
    }

    struct PanickingMetrics;

    impl ProcessMetrics for PanickingMetrics {
        fn snapshot(&self) -> ProcessSnapshot {
            panic!("metrics blew up")
        }
    }

    #[tokio::test]
    async fn test_cluster_panic_becomes_error_report() {
        let service = HealthService::with_collaborators(
            Arc::new(PanickingExecutor),
            Arc::new(FixedMetrics),
            &AppConfig::default(),
        );
        match service.cluster().await {
            ClusterHealth::Failed(e) => {
                assert_eq!(e.status, Status::Error);
                assert!(e.error.contains("task failed"));
            }
            ClusterHealth::Report(_) => panic!("expected error report"),
        }
    }

    #[tokio::test]
    async fn test_detailed_panic_becomes_error_report() {
        let service = HealthService::with_collaborators(
            ScriptedExecutor::new(&[("hostname", Ok("web-1\n"))]),
            Arc::new(PanickingMetrics),
            &AppConfig::default(),
        );
        match service.detailed().await {
            DetailedHealth::Failed(e) => assert_eq!(e.status, Status::Error),
            DetailedHealth::Combined(_) => panic!("expected error report"),
        }
    }

    mod spans {
        use super::*;
        use std::sync::Mutex;
        use tracing::{Instrument, Subscriber};
        use tracing_subscriber::layer::{Context, SubscriberExt};
        use tracing_subscriber::registry::LookupSpan;
        use tracing_subscriber::Layer;

        /// Records the span names enclosing every event.
        #[derive(Clone, Default)]
        struct ScopeRecorder {
            scopes: Arc<Mutex<Vec<Vec<String>>>>,
        }

        impl<S> Layer<S> for ScopeRecorder
        where
            S: Subscriber + for<'a> LookupSpan<'a>,
        {
            fn on_event(&self, event: &tracing::Event<'_>, ctx: Context<'_, S>) {
                let names = ctx
                    .event_scope(event)
                    .map(|scope| scope.from_root().map(|span| span.name().to_string()).collect())
                    .unwrap_or_default();
                self.scopes.lock().unwrap().push(names);
            }
        }

        #[tokio::test]
        async fn test_spawned_probe_keeps_request_span() {
            let recorder = ScopeRecorder::default();
            let subscriber = tracing_subscriber::registry().with(recorder.clone());
            let _guard = tracing::subscriber::set_default(subscriber);

            let executor = ScriptedExecutor::new(&[("hostname", Ok("web-1\n"))]);
            service(executor, None)
                .detailed()
                .instrument(tracing::info_span!("request"))
                .await;

            let scopes = recorder.scopes.lock().unwrap();
            assert!(!scopes.is_empty());
            for scope in scopes.iter() {
                assert_eq!(scope.first().map(String::as_str), Some("request"), "{scope:?}");
            }
            assert!(scopes
                .iter()
                .any(|scope| scope.iter().any(|name| name == "health::cluster")));
        }
    }
}
