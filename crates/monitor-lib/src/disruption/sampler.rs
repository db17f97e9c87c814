//! Periodic disruption sampling for one backend
//!
//! Each sampler probes its backend once per period and records a transition
//! whenever availability changes. A failure that changes classification
//! (a DNS outage turning into real disruption, or back) records a new
//! begin so the recorded reason always matches the current failure.

use super::messages::{disruption_began, disruption_ended, disruption_locator, BackendConnectionType};
use super::probe::{BackendProbe, HttpProbe};
use crate::error::{MonitorError, ProbeError, Result};
use crate::monitor::Recorder;
use crate::monitorapi::{Condition, Locator};
use crate::observability::{MonitorMetrics, StructuredLogger};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

fn default_timeout_secs() -> u64 {
    15
}

fn default_interval_secs() -> u64 {
    1
}

/// A backend to sample, as configured
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BackendConfig {
    pub name: String,
    pub url: String,
    pub connection: BackendConnectionType,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl BackendConfig {
    pub fn new(name: &str, url: &str, connection: BackendConnectionType) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            connection,
            timeout_secs: default_timeout_secs(),
            interval_secs: default_interval_secs(),
        }
    }

    pub fn locator(&self) -> Locator {
        disruption_locator(&self.name, self.connection)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| MonitorError::InvalidBackend {
            backend: self.name.clone(),
            reason: reason.to_string(),
        };
        if self.name.is_empty() || self.name.contains(' ') || self.name.contains('/') {
            return Err(invalid("name must be non-empty without spaces or slashes"));
        }
        if !(self.url.starts_with("http://") || self.url.starts_with("https://")) {
            return Err(invalid("url must be http or https"));
        }
        if self.timeout_secs == 0 || self.interval_secs == 0 {
            return Err(invalid("timeout and interval must be positive"));
        }
        Ok(())
    }
}

/// Probes one backend and records its disruption transitions
pub struct DisruptionSampler {
    config: BackendConfig,
    locator: Locator,
    probe: Arc<dyn BackendProbe>,
    recorder: Arc<dyn Recorder>,
    logger: StructuredLogger,
    metrics: MonitorMetrics,
}

impl DisruptionSampler {
    pub fn new(
        config: BackendConfig,
        probe: Arc<dyn BackendProbe>,
        recorder: Arc<dyn Recorder>,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            locator: config.locator(),
            config,
            probe,
            recorder,
            logger,
            metrics: MonitorMetrics::new(),
        }
    }

    /// Sampler probing the configured URL over HTTP
    pub fn http(
        config: BackendConfig,
        recorder: Arc<dyn Recorder>,
        logger: StructuredLogger,
    ) -> Result<Self> {
        config.validate()?;
        let probe = HttpProbe::new(&config.url, config.connection, config.timeout())?;
        Ok(Self::new(config, Arc::new(probe), recorder, logger))
    }

    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    pub fn start(self, shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    /// Probe until shutdown, then probe once more so the final state is recorded
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            backend = %self.config.name,
            connection = %self.config.connection,
            interval_secs = self.config.interval_secs,
            "Starting disruption sampler"
        );

        let mut ticker = interval(self.config.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut failing: Option<&'static str> = None;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check(&mut failing).await;
                }
                _ = shutdown.recv() => {
                    self.check(&mut failing).await;
                    info!(backend = %self.config.name, "Stopped disruption sampler");
                    break;
                }
            }
        }
    }

    async fn probe_once(&self) -> std::result::Result<(), ProbeError> {
        let timeout = self.config.timeout();
        match tokio::time::timeout(timeout, self.probe.probe()).await {
            Ok(result) => result,
            Err(_) => Err(ProbeError::Timeout(timeout)),
        }
    }

    /// One probe and the transition it implies. `failing` holds the reason
    /// of the disruption currently open.
    async fn check(&self, failing: &mut Option<&'static str>) {
        let at = Utc::now();
        match self.probe_once().await {
            Ok(()) => {
                if failing.take().is_some() {
                    let ended = disruption_ended(&self.locator, self.config.connection);
                    self.transition(at, Condition::new(ended.level, self.locator.clone(), ended.message), ended.reason);
                }
            }
            Err(err) => {
                let began = disruption_began(&self.locator, self.config.connection, &err.to_string());
                if *failing == Some(began.reason) {
                    debug!(backend = %self.config.name, error = %err, "Backend still unavailable");
                    return;
                }
                *failing = Some(began.reason);
                self.transition(at, Condition::new(began.level, self.locator.clone(), began.message), began.reason);
            }
        }
    }

    fn transition(&self, at: chrono::DateTime<Utc>, condition: Condition, reason: &str) {
        self.logger
            .log_disruption_transition(self.locator.as_str(), reason, condition.message.as_str());
        self.metrics.inc_disruption_transition(&self.config.name, reason);
        self.recorder.record_at(at, vec![condition]);
    }
}
