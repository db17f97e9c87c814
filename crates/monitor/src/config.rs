//! Monitor configuration

use anyhow::Result;
use monitor_lib::disruption::{BackendConfig, JobType, StaticAllowedDisruption};
use monitor_lib::verdict::VerdictOverrides;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

/// Monitor configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    /// Identifier attached to every structured log line
    #[serde(default = "default_run_id")]
    pub run_id: String,

    /// API server port for health/metrics/intervals
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Condition sampling interval in seconds, 0 disables sampling
    #[serde(default = "default_sample_interval")]
    pub sample_interval_secs: u64,

    /// Where intervals and results are written on shutdown
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: PathBuf,

    /// Platform of the cluster under test, used for budgets and overrides
    #[serde(default)]
    pub platform: Option<String>,

    #[serde(default)]
    pub topology: Option<String>,

    /// Backends to probe for disruption
    #[serde(default)]
    pub backends: Vec<BackendConfig>,

    /// Allowed disruption by backend name (`<name>-<new|reused>-connections`)
    #[serde(default)]
    pub allowed_disruption_secs: HashMap<String, f64>,

    #[serde(default)]
    pub overrides: VerdictOverrides,
}

fn default_run_id() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_sample_interval() -> u64 {
    15
}

fn default_artifact_dir() -> PathBuf {
    PathBuf::from("./artifacts")
}

fn default_config_file() -> String {
    std::env::var("MONITOR_CONFIG").unwrap_or_else(|_| "cluster-monitor.toml".to_string())
}

impl MonitorConfig {
    /// Load configuration from the optional config file, overridden by
    /// `MONITOR_*` environment variables (`__` separates nested keys)
    pub fn load() -> Result<Self> {
        let file = default_config_file();
        let config = config::Config::builder()
            .add_source(config::File::with_name(&file).required(false))
            .add_source(
                config::Environment::with_prefix("MONITOR")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    #[cfg(test)]
    fn from_toml(text: &str) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::from_str(text, config::FileFormat::Toml))
            .build()?;
        Ok(config.try_deserialize()?)
    }

    pub fn job(&self) -> Option<JobType> {
        self.platform.as_ref().map(|platform| JobType {
            platform: platform.clone(),
            topology: self.topology.clone(),
        })
    }

    pub fn allowed_disruption(&self) -> StaticAllowedDisruption {
        StaticAllowedDisruption::from_secs(
            self.allowed_disruption_secs
                .iter()
                .map(|(name, secs)| (name.clone(), *secs)),
        )
    }

    pub fn sample_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sample_interval_secs)
    }
}
