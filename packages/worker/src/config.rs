use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

pub use common::config::MqAppConfig;

/// Worker-specific configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct WorkerConfig {
    /// Unique identifier for this worker instance. Default: "worker-1".
    #[serde(default = "default_worker_id")]
    pub id: String,
    /// Number of tasks to process concurrently. Default: 10.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Retries per job before giving up. Default: 3.
    #[serde(default = "default_max_retries")]
    pub max_retries: u8,
    /// Base backoff delay in milliseconds. Default: 1000.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Backoff ceiling in milliseconds. Default: 60000.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Chat-channel provider backend. Default: "noop".
    #[serde(default = "default_channel_provider")]
    pub channel_provider: String,
}

fn default_worker_id() -> String {
    "worker-1".into()
}
fn default_batch_size() -> usize {
    10
}
fn default_max_retries() -> u8 {
    3
}
fn default_base_delay_ms() -> u64 {
    1000
}
fn default_max_delay_ms() -> u64 {
    60_000
}
fn default_channel_provider() -> String {
    "noop".into()
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            id: default_worker_id(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            channel_provider: default_channel_provider(),
        }
    }
}

/// Worker application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct WorkerAppConfig {
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub mq: MqAppConfig,
}

impl WorkerAppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("AGORA_CONFIG").unwrap_or_else(|_| "config/config".to_string());

        let s = Config::builder()
            .set_default("worker.id", "worker-1")?
            .set_default("worker.batch_size", 10_i64)?
            .set_default("worker.max_retries", 3_i64)?
            .set_default("worker.base_delay_ms", 1000_i64)?
            .set_default("worker.max_delay_ms", 60000_i64)?
            .set_default("worker.channel_provider", "noop")?
            .set_default("mq.enabled", true)?
            .set_default("mq.url", "redis://localhost:6379")?
            .set_default("mq.pool_size", 5_i64)?
            .set_default("mq.queue_name", "deferred_tasks")?
            .add_source(File::with_name(&config_path).required(false))
            .add_source(Environment::with_prefix("AGORA").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
