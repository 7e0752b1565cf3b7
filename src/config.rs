//! Configuration loading and constants.
//!
//! Configuration is assembled once at startup: defaults, then an optional TOML
//! file, then environment variable overrides. The resulting `AppConfig` is
//! immutable and shared by reference through `AppState`; nothing downstream
//! reads the process environment directly.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use const_format::formatcp;
use serde::Deserialize;

// =============================================================================
// HTTP
// =============================================================================

/// Cache-Control for health endpoints; probes must always see fresh state
pub const CACHE_CONTROL_HEALTH: &str = "no-store";

/// How long in-flight requests may drain after SIGTERM/SIGINT
pub const SHUTDOWN_GRACE_PERIOD_SECS: u64 = 30;

// =============================================================================
// Application Defaults
// =============================================================================

/// Deployment environment name when `NODE_ENV` is not set
pub const DEFAULT_ENVIRONMENT: &str = "development";

pub const DEFAULT_APP_HOST: &str = "localhost";
pub const DEFAULT_APP_PORT: u16 = 3000;
pub const DEFAULT_APP_NAME: &str = "backend-nestjs-boilerplate";

// =============================================================================
// Database Defaults
// =============================================================================

pub const DEFAULT_DATABASE_HOST: &str = "localhost";
pub const DEFAULT_DATABASE_PORT: u16 = 5432;
pub const DEFAULT_DATABASE_NAME: &str = "nestjs_db";
pub const DEFAULT_DATABASE_USER: &str = "postgres";
pub const DEFAULT_DATABASE_PASSWORD: &str = "postgres";
pub const DEFAULT_DATABASE_URL: &str = formatcp!(
    "postgresql://{}:{}@{}:{}/{}",
    DEFAULT_DATABASE_USER,
    DEFAULT_DATABASE_PASSWORD,
    DEFAULT_DATABASE_HOST,
    DEFAULT_DATABASE_PORT,
    DEFAULT_DATABASE_NAME
);

/// Test database runs on a separate port so it can live next to the dev database
pub const DEFAULT_TEST_DATABASE_PORT: u16 = 5433;
pub const DEFAULT_TEST_DATABASE_NAME: &str = "nestjs_test_db";
pub const DEFAULT_TEST_DATABASE_USER: &str = "test";
pub const DEFAULT_TEST_DATABASE_PASSWORD: &str = "test";
pub const DEFAULT_TEST_DATABASE_URL: &str = formatcp!(
    "postgresql://{}:{}@{}:{}/{}",
    DEFAULT_TEST_DATABASE_USER,
    DEFAULT_TEST_DATABASE_PASSWORD,
    DEFAULT_DATABASE_HOST,
    DEFAULT_TEST_DATABASE_PORT,
    DEFAULT_TEST_DATABASE_NAME
);

// =============================================================================
// Security, Logging and Testing Defaults
// =============================================================================

pub const DEFAULT_JWT_SECRET: &str = "dev-secret-key-change-in-production";
/// JWT lifetime in seconds
pub const DEFAULT_JWT_EXPIRY_SECS: u64 = 3600;
pub const DEFAULT_API_KEY: &str = "dev-api-key";

/// Default log level when neither `--log-level` nor `RUST_LOG` is given
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default log format (text or json)
pub const DEFAULT_LOG_FORMAT: &str = "json";

/// Per-test timeout in milliseconds
pub const DEFAULT_TEST_TIMEOUT_MS: u64 = 30000;
/// Shell (bats) test suite timeout in seconds
pub const DEFAULT_BATS_TIMEOUT_SECS: u64 = 120;

// =============================================================================
// Health Probe Defaults
// =============================================================================

/// Upper bound for each external command run by the cluster probe
pub const DEFAULT_HEALTH_COMMAND_TIMEOUT_SECS: u64 = 5;

/// Docker CLI binary used for swarm queries
pub const DEFAULT_DOCKER_BIN: &str = "docker";

// =============================================================================
// Monitoring Stack Defaults
// =============================================================================

pub const DEFAULT_MONITORING_HOST: &str = "localhost";
pub const DEFAULT_PROMETHEUS_PORT: u16 = 9090;
pub const DEFAULT_GRAFANA_PORT: u16 = 3000;
pub const DEFAULT_GRAFANA_ADMIN_USER: &str = "admin";
pub const DEFAULT_GRAFANA_ADMIN_PASSWORD: &str = "admin123";
pub const DEFAULT_NODE_EXPORTER_PORT: u16 = 9100;
pub const DEFAULT_NGINX_EXPORTER_PORT: u16 = 9113;
pub const DEFAULT_PORTAINER_PORT: u16 = 9000;
pub const DEFAULT_NGINX_PORT: u16 = 80;
pub const DEFAULT_DOCKER_STACK_NAME: &str = "monitoring";
pub const DEFAULT_COMPOSE_PROJECT_NAME: &str = "backend-nestjs";

/// Root configuration.
///
/// Every section is optional in the TOML file; missing sections take their
/// defaults. Sections that are present must be complete.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSettings,
    pub database: DatabaseConfig,
    pub test_database: DatabaseConfig,
    pub security: SecurityConfig,
    pub logging: LoggingConfig,
    /// Test harness settings
    pub testing: TestingConfig,
    pub monitoring: MonitoringConfig,
    pub health: HealthConfig,
}

/// Application and HTTP listener settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Deployment environment name (development, test, production, ...)
    pub environment: String,
    pub host: String,
    pub port: u16,
    pub name: String,
    /// Explicit node identifier. Falls back to the probed hostname when unset.
    pub node_id: Option<String>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            environment: DEFAULT_ENVIRONMENT.to_string(),
            host: DEFAULT_APP_HOST.to_string(),
            port: DEFAULT_APP_PORT,
            name: DEFAULT_APP_NAME.to_string(),
            node_id: None,
        }
    }
}

/// Database connection settings
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: String,
    pub url: String,
}

impl DatabaseConfig {
    fn development() -> Self {
        Self {
            host: DEFAULT_DATABASE_HOST.to_string(),
            port: DEFAULT_DATABASE_PORT,
            name: DEFAULT_DATABASE_NAME.to_string(),
            user: DEFAULT_DATABASE_USER.to_string(),
            password: DEFAULT_DATABASE_PASSWORD.to_string(),
            url: DEFAULT_DATABASE_URL.to_string(),
        }
    }

    fn test() -> Self {
        Self {
            host: DEFAULT_DATABASE_HOST.to_string(),
            port: DEFAULT_TEST_DATABASE_PORT,
            name: DEFAULT_TEST_DATABASE_NAME.to_string(),
            user: DEFAULT_TEST_DATABASE_USER.to_string(),
            password: DEFAULT_TEST_DATABASE_PASSWORD.to_string(),
            url: DEFAULT_TEST_DATABASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    /// Token lifetime in seconds
    pub jwt_expiry_secs: u64,
    pub api_key: String,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            jwt_expiry_secs: DEFAULT_JWT_EXPIRY_SECS,
            api_key: DEFAULT_API_KEY.to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, e.g. "info" or "beacon=debug"
    pub level: String,
    /// Log format: "json" (structured, default) or "text" (human-readable)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            format: DEFAULT_LOG_FORMAT.to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

/// Test harness configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TestingConfig {
    pub timeout_ms: u64,
    pub bats_timeout_secs: u64,
    pub smart_testing_enabled: bool,
}

impl Default for TestingConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TEST_TIMEOUT_MS,
            bats_timeout_secs: DEFAULT_BATS_TIMEOUT_SECS,
            smart_testing_enabled: false,
        }
    }
}

impl TestingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn bats_timeout(&self) -> Duration {
        Duration::from_secs(self.bats_timeout_secs)
    }
}

/// Cluster health probe settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    pub command_timeout_secs: u64,
    pub docker_bin: String,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            command_timeout_secs: DEFAULT_HEALTH_COMMAND_TIMEOUT_SECS,
            docker_bin: DEFAULT_DOCKER_BIN.to_string(),
        }
    }
}

impl HealthConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

/// A monitoring stack component reachable over HTTP
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    fn local(port: u16) -> Self {
        Self {
            host: DEFAULT_MONITORING_HOST.to_string(),
            port,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GrafanaConfig {
    #[serde(flatten)]
    pub endpoint: Endpoint,
    pub admin_user: String,
    pub admin_password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PortainerConfig {
    #[serde(flatten)]
    pub endpoint: Endpoint,
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DockerConfig {
    pub stack_name: String,
    pub compose_project_name: String,
}

/// Monitoring stack endpoints. Pure configuration, nothing here is probed.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub prometheus: Endpoint,
    pub grafana: GrafanaConfig,
    pub node_exporter: Endpoint,
    pub nginx_exporter: Endpoint,
    pub portainer: PortainerConfig,
    pub nginx: Endpoint,
    pub docker: DockerConfig,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            prometheus: Endpoint::local(DEFAULT_PROMETHEUS_PORT),
            grafana: GrafanaConfig {
                endpoint: Endpoint::local(DEFAULT_GRAFANA_PORT),
                admin_user: DEFAULT_GRAFANA_ADMIN_USER.to_string(),
                admin_password: DEFAULT_GRAFANA_ADMIN_PASSWORD.to_string(),
            },
            node_exporter: Endpoint::local(DEFAULT_NODE_EXPORTER_PORT),
            nginx_exporter: Endpoint::local(DEFAULT_NGINX_EXPORTER_PORT),
            portainer: PortainerConfig {
                endpoint: Endpoint::local(DEFAULT_PORTAINER_PORT),
                enabled: false,
            },
            nginx: Endpoint::local(DEFAULT_NGINX_PORT),
            docker: DockerConfig {
                stack_name: DEFAULT_DOCKER_STACK_NAME.to_string(),
                compose_project_name: DEFAULT_COMPOSE_PROJECT_NAME.to_string(),
            },
        }
    }
}

impl MonitoringConfig {
    /// Name and URL of every configured component, for startup logging.
    /// Portainer is only listed when enabled.
    pub fn endpoints(&self) -> Vec<(&'static str, String)> {
        let mut endpoints = vec![
            ("prometheus", self.prometheus.url()),
            ("grafana", self.grafana.endpoint.url()),
            ("node_exporter", self.node_exporter.url()),
            ("nginx_exporter", self.nginx_exporter.url()),
            ("nginx", self.nginx.url()),
        ];
        if self.portainer.enabled {
            endpoints.push(("portainer", self.portainer.endpoint.url()));
        }
        endpoints
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app: AppSettings::default(),
            database: DatabaseConfig::development(),
            test_database: DatabaseConfig::test(),
            security: SecurityConfig::default(),
            logging: LoggingConfig::default(),
            testing: TestingConfig::default(),
            monitoring: MonitoringConfig::default(),
            health: HealthConfig::default(),
        }
    }
}

/// Reads environment values through a lookup function. Empty values count as unset.
struct EnvOverrides<F> {
    lookup: F,
}

impl<F> EnvOverrides<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|value| !value.is_empty())
    }

    fn string(&self, key: &str, target: &mut String) {
        if let Some(value) = self.get(key) {
            *target = value;
        }
    }

    fn optional(&self, key: &str, target: &mut Option<String>) {
        if let Some(value) = self.get(key) {
            *target = Some(value);
        }
    }

    fn parse<T: FromStr>(&self, key: &str, target: &mut T) -> Result<(), ConfigError> {
        if let Some(value) = self.get(key) {
            *target = value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value,
            })?;
        }
        Ok(())
    }

    /// Only the literal "true" enables a flag
    fn flag(&self, key: &str, target: &mut bool) {
        if let Some(value) = self.get(key) {
            *target = value == "true";
        }
    }

    fn endpoint(&self, prefix: &str, target: &mut Endpoint) -> Result<(), ConfigError> {
        self.string(&format!("{prefix}_HOST"), &mut target.host);
        self.parse(&format!("{prefix}_PORT"), &mut target.port)
    }

    fn database(&self, prefix: &str, target: &mut DatabaseConfig) -> Result<(), ConfigError> {
        self.string(&format!("{prefix}_HOST"), &mut target.host);
        self.parse(&format!("{prefix}_PORT"), &mut target.port)?;
        self.string(&format!("{prefix}_NAME"), &mut target.name);
        self.string(&format!("{prefix}_USER"), &mut target.user);
        self.string(&format!("{prefix}_PASSWORD"), &mut target.password);
        self.string(&format!("{prefix}_URL"), &mut target.url);
        Ok(())
    }
}

impl AppConfig {
    /// Load configuration from an optional TOML file and the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Build configuration from defaults and the given environment lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        config.apply_env(lookup)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Apply environment variable overrides on top of the current values.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvOverrides { lookup };

        env.string("NODE_ENV", &mut self.app.environment);
        env.string("APP_HOST", &mut self.app.host);
        env.parse("APP_PORT", &mut self.app.port)?;
        env.string("APP_NAME", &mut self.app.name);
        env.optional("HOSTNAME", &mut self.app.node_id);

        env.database("DATABASE", &mut self.database)?;
        env.database("TEST_DATABASE", &mut self.test_database)?;

        env.string("JWT_SECRET", &mut self.security.jwt_secret);
        env.parse("JWT_EXPIRY", &mut self.security.jwt_expiry_secs)?;
        env.string("API_KEY", &mut self.security.api_key);

        env.string("LOG_LEVEL", &mut self.logging.level);
        env.string("LOG_FORMAT", &mut self.logging.format);

        env.parse("TEST_TIMEOUT", &mut self.testing.timeout_ms)?;
        env.parse("BATS_TEST_TIMEOUT", &mut self.testing.bats_timeout_secs)?;
        env.flag("SMART_TESTING_ENABLED", &mut self.testing.smart_testing_enabled);

        let monitoring = &mut self.monitoring;
        env.endpoint("PROMETHEUS", &mut monitoring.prometheus)?;
        env.endpoint("GRAFANA", &mut monitoring.grafana.endpoint)?;
        env.string("GRAFANA_ADMIN_USER", &mut monitoring.grafana.admin_user);
        env.string("GRAFANA_ADMIN_PASSWORD", &mut monitoring.grafana.admin_password);
        env.endpoint("NODE_EXPORTER", &mut monitoring.node_exporter)?;
        env.endpoint("NGINX_EXPORTER", &mut monitoring.nginx_exporter)?;
        env.endpoint("PORTAINER", &mut monitoring.portainer.endpoint)?;
        env.flag("PORTAINER_ENABLED", &mut monitoring.portainer.enabled);
        env.endpoint("NGINX", &mut monitoring.nginx)?;
        env.string("DOCKER_STACK_NAME", &mut monitoring.docker.stack_name);
        env.string("COMPOSE_PROJECT_NAME", &mut monitoring.docker.compose_project_name);

        env.parse("HEALTH_COMMAND_TIMEOUT_SECS", &mut self.health.command_timeout_secs)?;
        env.string("HEALTH_DOCKER_BIN", &mut self.health.docker_bin);

        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.health.command_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "health.command_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.health.docker_bin.trim().is_empty() {
            return Err(ConfigError::Validation(
                "health.docker_bin must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
    #[error("Configuration error: {0}")]
    Validation(String),
}
