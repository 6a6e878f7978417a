//! Agent configuration

use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Process-level settings, read from `AGENT_*` environment variables.
/// Swap reporting options live in their own file, see `swap_config`.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Node name attached to structured log events
    #[serde(default = "default_node_name")]
    pub node_name: String,

    /// API server port for health/metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Swap collection interval in seconds
    #[serde(default = "default_collection_interval")]
    pub collection_interval_secs: u64,

    /// Failed cycles in a row before the collector reports unhealthy
    #[serde(default = "default_unhealthy_after_failures")]
    pub unhealthy_after_failures: u32,

    /// Optional file with swap reporting options
    #[serde(default)]
    pub swap_config: Option<PathBuf>,
}

fn default_node_name() -> String {
    std::env::var("NODE_NAME")
        .or_else(|_| std::env::var("HOSTNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}

fn default_api_port() -> u16 {
    9100
}

fn default_collection_interval() -> u64 {
    10
}

fn default_unhealthy_after_failures() -> u32 {
    5
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            node_name: default_node_name(),
            api_port: default_api_port(),
            collection_interval_secs: default_collection_interval(),
            unhealthy_after_failures: default_unhealthy_after_failures(),
            swap_config: None,
        }
    }
}

impl AgentConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::Environment::with_prefix("AGENT"))
            .build()?;

        let config: AgentConfig = settings.try_deserialize()?;
        if config.collection_interval_secs == 0 {
            anyhow::bail!("AGENT_COLLECTION_INTERVAL_SECS must be at least 1");
        }
        if config.unhealthy_after_failures == 0 {
            anyhow::bail!("AGENT_UNHEALTHY_AFTER_FAILURES must be at least 1");
        }
        Ok(config)
    }

    pub fn collection_interval(&self) -> Duration {
        Duration::from_secs(self.collection_interval_secs)
    }
}
