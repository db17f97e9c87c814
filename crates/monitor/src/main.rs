//! Cluster Monitor - test run monitor
//!
//! This binary runs alongside a test run, sampling backend availability and
//! recording conditions. On shutdown it writes the interval timeline and the
//! disruption verdicts to the artifact directory.

use anyhow::Result;
use chrono::Utc;
use monitor_lib::{
    disruption::{DisruptionIntervalCreator, DisruptionSampler},
    intervals::PodIntervalCreator,
    observability::{MonitorMetrics, StructuredLogger},
    serialization::{write_intervals_file, write_results_file},
    Monitor, TestResult, TestVerdict,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;
mod report;

const MONITOR_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting cluster-monitor");

    let config = config::MonitorConfig::load()?;
    info!(run_id = %config.run_id, platform = ?config.platform, "Monitor configured");

    let metrics = MonitorMetrics::new();
    let logger = StructuredLogger::new(&config.run_id);
    logger.log_startup(MONITOR_VERSION, config.backends.len(), config.sample_interval_secs);

    let monitor = Monitor::builder()
        .interval(config.sample_interval())
        .interval_creator(Arc::new(PodIntervalCreator))
        .interval_creator(Arc::new(DisruptionIntervalCreator))
        .build();
    let started_at = Utc::now();

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let mut handles = Vec::new();

    for backend in &config.backends {
        let sampler = DisruptionSampler::http(backend.clone(), monitor.clone(), logger.clone())?;
        handles.push(sampler.start(shutdown_tx.subscribe()));
    }
    if let Some(handle) = monitor.start_sampling(shutdown_tx.subscribe()) {
        handles.push(handle);
    }

    let app_state = Arc::new(api::AppState::new(monitor.clone(), config.run_id.clone()));
    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");

    // Samplers take one last reading before they exit
    let _ = shutdown_tx.send(());
    for handle in handles {
        if let Err(e) = handle.await {
            warn!(error = %e, "Sampling task did not stop cleanly");
        }
    }
    api_handle.abort();

    let run_duration = (Utc::now() - started_at).to_std().unwrap_or_default();
    let intervals = monitor.event_intervals(None, None);

    let intervals_path = config.artifact_dir.join("intervals.json");
    write_intervals_file(&intervals_path, &intervals)?;
    logger.log_artifact_written(&intervals_path.display().to_string(), intervals.len());

    let verdicts = report::evaluate(&config, &intervals, run_duration);
    report::record_verdicts(&verdicts, &logger, &metrics);

    let results: Vec<TestResult> = verdicts
        .into_iter()
        .flat_map(TestVerdict::into_results)
        .collect();
    let results_path = config.artifact_dir.join("results.json");
    write_results_file(&results_path, &results)?;
    logger.log_artifact_written(&results_path.display().to_string(), results.len());

    info!("Shutting down");
    Ok(())
}
