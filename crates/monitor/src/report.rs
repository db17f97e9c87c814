//! End of run verdicts over the recorded timeline

use crate::config::MonitorConfig;
use monitor_lib::disruption::{
    test_multiple_single_second_disruptions, test_server_availability, AvailabilityContext,
    BackendFilter,
};
use monitor_lib::{Interval, MonitorMetrics, StructuredLogger, TestVerdict};
use std::time::Duration;

/// Owning group for a backend's availability test
fn owner_for(backend: &str) -> &'static str {
    if BackendFilter::Api.allows(backend) {
        "sig-api-machinery"
    } else if BackendFilter::Ingress.allows(backend) {
        "sig-network"
    } else {
        "sig-trt"
    }
}

/// Availability for every configured backend plus the single second
/// disruption tiers, with overrides applied.
pub fn evaluate(config: &MonitorConfig, intervals: &[Interval], run_duration: Duration) -> Vec<TestVerdict> {
    let job = config.job();
    let allowed = config.allowed_disruption();
    let ctx = AvailabilityContext {
        run_duration,
        job: job.as_ref(),
        allowed: &allowed,
        overrides: &config.overrides,
    };

    let mut verdicts: Vec<TestVerdict> = config
        .backends
        .iter()
        .map(|backend| test_server_availability(owner_for(&backend.name), &backend.locator(), intervals, &ctx))
        .collect();

    let platform = config.platform.as_deref();
    verdicts.extend(
        test_multiple_single_second_disruptions(intervals)
            .into_iter()
            .map(|verdict| config.overrides.apply(verdict, platform)),
    );
    verdicts
}

/// Log and count each verdict
pub fn record_verdicts(verdicts: &[TestVerdict], logger: &StructuredLogger, metrics: &MonitorMetrics) {
    for verdict in verdicts {
        let outcome = verdict.state().to_string();
        logger.log_verdict(&verdict.name, &outcome);
        metrics.inc_verdict(&outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use monitor_lib::disruption::{BackendConfig, BackendConnectionType};
    use monitor_lib::verdict::{OverrideRule, ResultState, VerdictOverrides};
    use monitor_lib::{Condition, Locator};
    use std::collections::HashMap;

    fn config(platform: Option<&str>) -> MonitorConfig {
        MonitorConfig {
            run_id: "run-1".into(),
            api_port: 8080,
            sample_interval_secs: 15,
            artifact_dir: "./artifacts".into(),
            platform: platform.map(str::to_string),
            topology: None,
            backends: vec![
                BackendConfig::new("kube-api", "https://api:6443", BackendConnectionType::New),
                BackendConfig::new("cache-service", "http://cache", BackendConnectionType::Reused),
            ],
            allowed_disruption_secs: HashMap::from([
                ("kube-api-new-connections".to_string(), 2.0),
                ("cache-service-reused-connections".to_string(), 60.0),
            ]),
            overrides: VerdictOverrides::default(),
        }
    }

    fn outage(locator: Locator, from: i64, to: i64) -> Interval {
        let base = Utc.with_ymd_and_hms(2022, 3, 7, 12, 0, 0).unwrap();
        Interval::new(
            Condition::error(locator, "reason/DisruptionBegan down"),
            base + chrono::Duration::seconds(from),
            base + chrono::Duration::seconds(to),
        )
    }

    #[test]
    fn test_owner_for() {
        assert_eq!(owner_for("kube-api"), "sig-api-machinery");
        assert_eq!(owner_for("ingress-console"), "sig-network");
        assert_eq!(owner_for("cache-service"), "sig-trt");
    }

    #[test]
    fn test_evaluate_covers_configured_backends() {
        let intervals = vec![outage(Locator::disruption("kube-api", "new"), 0, 10)];

        let verdicts = evaluate(&config(Some("aws")), &intervals, Duration::from_secs(600));

        // two availability tests plus two single second tiers for kube-api
        assert_eq!(verdicts.len(), 4);
        assert!(verdicts[0].name.starts_with("[sig-api-machinery]"));
        assert_eq!(verdicts[0].state(), ResultState::Failed);
        assert!(verdicts[1].name.starts_with("[sig-trt]"));
        assert_eq!(verdicts[1].state(), ResultState::Passed);
    }

    #[test]
    fn test_evaluate_applies_overrides() {
        let mut config = config(Some("azure"));
        config.overrides = VerdictOverrides::new(vec![OverrideRule {
            test_name_contains: "kube-api".into(),
            platform: Some("azure".into()),
            reason: "informing only".into(),
        }]);
        let intervals = vec![outage(Locator::disruption("kube-api", "new"), 0, 10)];

        let verdicts = evaluate(&config, &intervals, Duration::from_secs(600));

        assert_eq!(verdicts[0].state(), ResultState::Flaked);
    }

    #[test]
    fn test_evaluate_without_platform_fails_availability() {
        let verdicts = evaluate(&config(None), &[], Duration::from_secs(600));

        assert_eq!(verdicts.len(), 2);
        assert!(verdicts.iter().all(|v| v.state() == ResultState::Failed));
    }
}
