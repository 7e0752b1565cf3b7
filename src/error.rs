use std::io;
use std::time::Duration;

/// Failure to run an external command or to read its output.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("'{program}' exited with status {code:?}: {stderr}")]
    Failed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("'{program}' timed out after {timeout:?}")]
    Timeout { program: String, timeout: Duration },

    #[error("'{program}' produced non-UTF-8 output")]
    InvalidOutput { program: String },
}

/// Hard failure of the cluster health probe.
///
/// Soft failures (swarm queries) never surface as this type; they degrade to
/// fallback values inside the probe.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("Failed to determine hostname: {0}")]
    Hostname(#[source] CommandError),

    #[error("Health probe task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
