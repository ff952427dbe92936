//! Configuration loading and types

use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};
use sprout_core::{ConsumerConfig, ReconcilerConfig};
use sprout_store::RedisSettings;
use url::Url;

/// Top-level configuration for the worker
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub kubernetes: KubernetesConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub log: LogConfig,
}

/// State store / event log connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_host")]
    pub host: String,
    #[serde(default = "default_redis_port")]
    pub port: u16,
    #[serde(default)]
    pub db: u32,
    pub password: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub connection_timeout_secs: u64,
    /// Raised to `stream.poll_block_ms` plus a margin when shorter
    #[serde(default = "default_timeout_secs")]
    pub response_timeout_secs: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: default_redis_host(),
            port: default_redis_port(),
            db: 0,
            password: None,
            connection_timeout_secs: default_timeout_secs(),
            response_timeout_secs: default_timeout_secs(),
        }
    }
}

impl RedisConfig {
    /// Connection URL with credentials and database
    ///
    /// # Errors
    /// Returns error if the host does not form a valid URL
    pub fn url(&self) -> Result<Url> {
        let mut url = Url::parse(&format!("redis://{}:{}/{}", self.host, self.port, self.db))
            .wrap_err_with(|| format!("invalid redis host {:?}", self.host))?;
        if let Some(password) = self.password.as_deref().filter(|p| !p.is_empty()) {
            url.set_password(Some(password))
                .map_err(|()| eyre::eyre!("cannot set password on redis url"))?;
        }
        Ok(url)
    }

    /// Connection settings whose response timeout outlasts a `poll_block` read
    ///
    /// # Errors
    /// Returns error if the URL cannot be built
    pub fn settings(&self, poll_block: Duration) -> Result<RedisSettings> {
        let settings = RedisSettings {
            url: self.url()?.to_string(),
            connection_timeout: Duration::from_secs(self.connection_timeout_secs),
            response_timeout: Duration::from_secs(self.response_timeout_secs),
        };
        Ok(settings.covering_poll_block(poll_block))
    }
}

fn default_redis_host() -> String {
    "redis-service".to_string()
}

fn default_redis_port() -> u16 {
    6379
}

fn default_timeout_secs() -> u64 {
    5
}

/// Event stream and consumer group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    #[serde(default = "default_stream_name")]
    pub name: String,
    #[serde(default = "default_group")]
    pub group: String,
    /// Defaults to `consumer-<pid>`
    pub consumer: Option<String>,
    /// Approximate cap applied on every append
    #[serde(default = "default_max_len")]
    pub max_len: usize,
    #[serde(default = "default_poll_block_ms")]
    pub poll_block_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            name: default_stream_name(),
            group: default_group(),
            consumer: None,
            max_len: default_max_len(),
            poll_block_ms: default_poll_block_ms(),
        }
    }
}

fn default_stream_name() -> String {
    "container_events".to_string()
}

fn default_group() -> String {
    "keda-consumer".to_string()
}

fn default_max_len() -> usize {
    1000
}

fn default_poll_block_ms() -> u64 {
    1000
}

/// Orchestration platform connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KubernetesConfig {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Used when no in-cluster service account is mounted
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Bearer token for `api_url`
    pub token: Option<String>,
}

impl Default for KubernetesConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            api_url: default_api_url(),
            token: None,
        }
    }
}

fn default_namespace() -> String {
    "sprout".to_string()
}

fn default_api_url() -> String {
    "http://127.0.0.1:8001".to_string()
}

/// Reconciler and error-budget settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    #[serde(default = "default_max_errors")]
    pub max_consecutive_errors: u32,
    #[serde(default = "default_backoff_step")]
    pub backoff_step_secs: u64,
    #[serde(default = "default_backoff_cap")]
    pub backoff_cap_secs: u64,
    #[serde(flatten)]
    pub reconciler: ReconcilerConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_consecutive_errors: default_max_errors(),
            backoff_step_secs: default_backoff_step(),
            backoff_cap_secs: default_backoff_cap(),
            reconciler: ReconcilerConfig::default(),
        }
    }
}

fn default_max_errors() -> u32 {
    5
}

fn default_backoff_step() -> u64 {
    2
}

fn default_backoff_cap() -> u64 {
    30
}

/// Log output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl Config {
    /// Load configuration from file
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .wrap_err_with(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Load from an explicit path, the default paths, or use defaults
    ///
    /// # Errors
    /// Returns error if a config file exists but cannot be loaded
    pub fn load_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        let paths = [
            Some(PathBuf::from("sprout.toml")),
            Some(PathBuf::from("/etc/sprout/sprout.toml")),
            dirs::config_dir().map(|p| p.join("sprout/sprout.toml")),
        ];

        for path in paths.into_iter().flatten() {
            if path.exists() {
                tracing::debug!(path = %path.display(), "loading config file");
                return Self::load(&path);
            }
        }

        Ok(Config::default())
    }

    /// Apply the deployment's environment variables on top of the file
    ///
    /// # Errors
    /// Returns error if `REDIS_PORT` is not a port number
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(host) = lookup("REDIS_HOST") {
            self.redis.host = host;
        }
        if let Some(port) = lookup("REDIS_PORT") {
            self.redis.port = port
                .parse()
                .wrap_err_with(|| format!("REDIS_PORT is not a port: {port:?}"))?;
        }
        if let Some(password) = lookup("REDIS_PASSWORD") {
            self.redis.password = Some(password);
        }
        if let Some(namespace) = lookup("NAMESPACE") {
            self.kubernetes.namespace = namespace;
        }
        Ok(())
    }

    /// # Errors
    /// Returns error if the redis URL cannot be built
    pub fn redis_settings(&self) -> Result<RedisSettings> {
        self.redis
            .settings(Duration::from_millis(self.stream.poll_block_ms))
    }

    #[must_use]
    pub fn consumer_config(&self) -> ConsumerConfig {
        ConsumerConfig {
            consumer_name: self.stream.consumer.clone(),
            poll_block_ms: self.stream.poll_block_ms,
            max_consecutive_errors: self.worker.max_consecutive_errors,
            backoff_step_secs: self.worker.backoff_step_secs,
            backoff_cap_secs: self.worker.backoff_cap_secs,
        }
    }
}
