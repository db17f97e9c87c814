//! Backend availability verdicts
//!
//! Observed disruption per backend is compared against an allowed budget
//! for the job being run. Missing budgets flake rather than pass or fail, so
//! a missing baseline stays visible in the results.

use super::messages::BackendConnectionType;
use crate::error::Result;
use crate::monitorapi::{for_locator, locator_keys, Interval, Level, Locator};
use crate::verdict::{TestVerdict, VerdictOverrides};
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;
use tracing::{debug, warn};

/// Counts above this fail the "nearly zero" single second test
pub const NEARLY_ZERO_SINGLE_SECOND_LIMIT: usize = 20;
/// Counts above this fail the "reasonably few" single second test
pub const REASONABLY_FEW_SINGLE_SECOND_LIMIT: usize = 50;

/// The kind of run, used to select a disruption budget
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobType {
    pub platform: String,
    pub topology: Option<String>,
}

impl JobType {
    pub fn new(platform: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            topology: None,
        }
    }
}

/// Budget for one backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedDisruption {
    Allowed { allowed: Duration, details: String },
    NoHistoricalData { details: String },
}

/// Looks up how much disruption a backend may see for a job
pub trait AllowedDisruptionSource: Send + Sync {
    fn allowed_disruption(&self, backend_name: &str, job: &JobType) -> Result<AllowedDisruption>;
}

/// Budgets declared up front, by backend name
#[derive(Debug, Clone, Default)]
pub struct StaticAllowedDisruption {
    budgets: HashMap<String, Duration>,
}

impl StaticAllowedDisruption {
    pub fn new(budgets: HashMap<String, Duration>) -> Self {
        Self { budgets }
    }

    pub fn from_secs<I, S>(budgets: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self::new(
            budgets
                .into_iter()
                .map(|(name, secs)| (name.into(), Duration::from_secs_f64(secs.max(0.0))))
                .collect(),
        )
    }
}

impl AllowedDisruptionSource for StaticAllowedDisruption {
    fn allowed_disruption(&self, backend_name: &str, job: &JobType) -> Result<AllowedDisruption> {
        Ok(match self.budgets.get(backend_name) {
            Some(allowed) => AllowedDisruption::Allowed {
                allowed: *allowed,
                details: format!("declared budget for {} on {}", backend_name, job.platform),
            },
            None => AllowedDisruption::NoHistoricalData {
                details: format!("no budget declared for {} on {}", backend_name, job.platform),
            },
        })
    }
}

/// Everything an availability test needs beyond the intervals
#[derive(Clone, Copy)]
pub struct AvailabilityContext<'a> {
    pub run_duration: Duration,
    pub job: Option<&'a JobType>,
    pub allowed: &'a dyn AllowedDisruptionSource,
    pub overrides: &'a VerdictOverrides,
}

/// `<name>-<new|reused>-connections`
pub fn backend_name(name: &str, connection: &str) -> String {
    format!("{}-{}-connections", name, connection)
}

/// Rounds half away from zero
pub fn round_to_second(duration: Duration) -> Duration {
    Duration::from_secs(((duration.as_nanos() + 500_000_000) / 1_000_000_000) as u64)
}

/// A recorded period of real unavailability
pub fn is_disruption_interval(interval: &Interval) -> bool {
    interval.level() == Level::Error && !interval.is_instant()
}

/// Total disruption seen by `locator`, with one line per disruption
pub fn backend_disruption_seconds(locator: &Locator, intervals: &[Interval]) -> (Duration, Vec<String>) {
    let mut total = Duration::ZERO;
    let mut lines = Vec::new();
    for interval in for_locator(intervals, locator) {
        if !is_disruption_interval(&interval) {
            continue;
        }
        total += interval.duration().to_std().unwrap_or_default();
        lines.push(interval.to_string());
    }
    (total, lines)
}

/// Compare the disruption observed for one backend against its budget
pub fn test_server_availability(
    owner: &str,
    locator: &Locator,
    intervals: &[Interval],
    ctx: &AvailabilityContext<'_>,
) -> TestVerdict {
    let test_name = format!("[{}] {} should be available throughout the test", owner, locator);
    let run_secs = ctx.run_duration.as_secs_f64();

    let name = backend_name(
        locator.get(locator_keys::BACKEND_DISRUPTION_NAME).unwrap_or_default(),
        locator.get(locator_keys::CONNECTION).unwrap_or_default(),
    );

    let Some(job) = ctx.job else {
        return TestVerdict::fail(&test_name, "error in platform identification").with_duration(run_secs);
    };

    let (allowed, details) = match ctx.allowed.allowed_disruption(&name, job) {
        Ok(AllowedDisruption::Allowed { allowed, details }) => (allowed, details),
        Ok(AllowedDisruption::NoHistoricalData { details }) => {
            debug!(backend = %name, "No historical disruption data");
            return TestVerdict::flake(
                &test_name,
                format!("skipping test due to no historical disruption data: {}", details),
            )
            .with_duration(run_secs);
        }
        Err(err) => {
            warn!(backend = %name, error = %err, "Allowed disruption lookup failed");
            return TestVerdict::fail(&test_name, format!("error in getting allowed disruption: {}", err))
                .with_duration(run_secs);
        }
    };

    let (observed, lines) = backend_disruption_seconds(locator, intervals);
    let allowed = round_to_second(allowed);
    let results = format!(
        "{} was unreachable during disruption testing for at least {:?} of {:?} (maxAllowed={:?}):\n\n{}",
        name, observed, ctx.run_duration, allowed, details
    );

    let verdict = if observed > allowed {
        TestVerdict::fail(&test_name, results).with_system_out(lines.join("\n"))
    } else {
        TestVerdict::pass(&test_name).with_system_out(results)
    };
    ctx.overrides
        .apply(verdict, Some(job.platform.as_str()))
        .with_duration(run_secs)
}

/// Which backends a group of availability tests covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendFilter {
    /// Names ending in `-api`
    Api,
    /// Names starting with `ingress-`
    Ingress,
    Named(String),
}

impl BackendFilter {
    pub fn allows(&self, backend: &str) -> bool {
        match self {
            BackendFilter::Api => backend.ends_with("-api"),
            BackendFilter::Ingress => backend.starts_with("ingress-"),
            BackendFilter::Named(name) => backend == name,
        }
    }
}

/// Distinct backend locators present in `intervals`
fn disruption_locators(intervals: &[Interval]) -> BTreeSet<&Locator> {
    intervals
        .iter()
        .map(Interval::locator)
        .filter(|l| l.get(locator_keys::BACKEND_DISRUPTION_NAME).is_some())
        .collect()
}

/// One availability verdict per sampled backend accepted by `filter`
pub fn test_all_backends_for_disruption(
    owner: &str,
    filter: &BackendFilter,
    intervals: &[Interval],
    ctx: &AvailabilityContext<'_>,
) -> Vec<TestVerdict> {
    disruption_locators(intervals)
        .into_iter()
        .filter(|l| {
            l.get(locator_keys::BACKEND_DISRUPTION_NAME)
                .map_or(false, |name| filter.allows(name))
        })
        .map(|locator| test_server_availability(owner, locator, intervals, ctx))
        .collect()
}

/// Availability of a backend sampled over both connection types
pub fn test_backend_both_connections(
    owner: &str,
    backend: &str,
    intervals: &[Interval],
    ctx: &AvailabilityContext<'_>,
) -> Vec<TestVerdict> {
    [BackendConnectionType::New, BackendConnectionType::Reused]
        .into_iter()
        .map(|conn| {
            let locator = Locator::disruption(backend, conn.as_str());
            test_server_availability(owner, &locator, intervals, ctx)
        })
        .collect()
}

/// Disruptions of at most one second with no other disruption within a
/// second on either side. Adjacent blips are one longer outage.
fn count_single_second_disruptions(locator: &Locator, intervals: &[Interval]) -> usize {
    let one_second = chrono::Duration::seconds(1);
    let disruptions: Vec<Interval> = for_locator(intervals, locator)
        .into_iter()
        .filter(is_disruption_interval)
        .collect();

    let mut count = 0;
    for (idx, interval) in disruptions.iter().enumerate() {
        let duration = interval.duration();
        if duration <= chrono::Duration::zero() || duration > one_second {
            continue;
        }
        if idx > 0 && disruptions[idx - 1].to + one_second > interval.from {
            continue;
        }
        if let Some(next) = disruptions.get(idx + 1) {
            if interval.to + one_second > next.from {
                continue;
            }
        }
        count += 1;
    }
    count
}

/// Two tiers of single second disruption tests per api and ingress backend
pub fn test_multiple_single_second_disruptions(intervals: &[Interval]) -> Vec<TestVerdict> {
    let mut verdicts = Vec::new();
    for locator in disruption_locators(intervals) {
        let Some(name) = locator.get(locator_keys::BACKEND_DISRUPTION_NAME) else {
            continue;
        };
        if !(BackendFilter::Api.allows(name) || BackendFilter::Ingress.allows(name)) {
            continue;
        }

        let count = count_single_second_disruptions(locator, intervals);
        let output = format!("{} had {} single second disruptions", locator, count);

        let nearly_zero = format!(
            "[sig-network] there should be nearly zero single second disruptions for {}",
            locator
        );
        let reasonably_few = format!(
            "[sig-network] there should be reasonably few single second disruptions for {}",
            locator
        );

        verdicts.push(if count > NEARLY_ZERO_SINGLE_SECOND_LIMIT {
            TestVerdict::fail(nearly_zero, output.clone())
        } else {
            TestVerdict::pass(nearly_zero)
        });
        verdicts.push(if count > REASONABLY_FEW_SINGLE_SECOND_LIMIT {
            TestVerdict::fail(reasonably_few, output)
        } else {
            TestVerdict::pass(reasonably_few)
        });
    }
    verdicts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MonitorError;
    use crate::monitorapi::Condition;
    use crate::verdict::{OverrideRule, ResultState, Verdict};
    use chrono::{DateTime, TimeZone, Utc};

    fn at_millis(millis: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000 + millis).unwrap()
    }

    fn api_locator() -> Locator {
        Locator::disruption("kube-api", "new")
    }

    fn outage(locator: &Locator, from_ms: i64, to_ms: i64) -> Interval {
        Interval::new(
            Condition::error(locator.clone(), "reason/DisruptionBegan down"),
            at_millis(from_ms),
            at_millis(to_ms),
        )
    }

    fn budget(secs: f64) -> StaticAllowedDisruption {
        StaticAllowedDisruption::from_secs([("kube-api-new-connections", secs)])
    }

    struct FailingSource;

    impl AllowedDisruptionSource for FailingSource {
        fn allowed_disruption(&self, backend_name: &str, _job: &JobType) -> Result<AllowedDisruption> {
            Err(MonitorError::AllowedDisruptionLookup {
                backend: backend_name.to_string(),
                reason: "query timed out".into(),
            })
        }
    }

    fn context<'a>(
        job: Option<&'a JobType>,
        allowed: &'a dyn AllowedDisruptionSource,
        overrides: &'a VerdictOverrides,
    ) -> AvailabilityContext<'a> {
        AvailabilityContext {
            run_duration: Duration::from_secs(3600),
            job,
            allowed,
            overrides,
        }
    }

    #[test]
    fn test_round_to_second() {
        assert_eq!(round_to_second(Duration::from_millis(2499)), Duration::from_secs(2));
        assert_eq!(round_to_second(Duration::from_millis(2500)), Duration::from_secs(3));
        assert_eq!(round_to_second(Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn test_backend_disruption_seconds_ignores_instants_and_warnings() {
        let locator = api_locator();
        let intervals = vec![
            outage(&locator, 0, 3_000),
            Interval::instant(Condition::error(locator.clone(), "reason/DisruptionBegan down"), at_millis(5_000)),
            Interval::new(
                Condition::warning(locator.clone(), "reason/DisruptionSamplerOutageBegan dns"),
                at_millis(6_000),
                at_millis(9_000),
            ),
            outage(&Locator::disruption("other-api", "new"), 0, 9_000),
        ];

        let (total, lines) = backend_disruption_seconds(&locator, &intervals);
        assert_eq!(total, Duration::from_secs(3));
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn test_within_budget_passes() {
        let locator = api_locator();
        let job = JobType::new("aws");
        let allowed = budget(4.6);
        let overrides = VerdictOverrides::default();

        let verdict = test_server_availability(
            "sig-api-machinery",
            &locator,
            &[outage(&locator, 0, 5_000)],
            &context(Some(&job), &allowed, &overrides),
        );

        assert_eq!(
            verdict.name,
            "[sig-api-machinery] backend-disruption-name/kube-api connection/new should be available throughout the test"
        );
        assert_eq!(verdict.verdict, Verdict::Pass);
        assert_eq!(verdict.duration, Some(3600.0));
        assert!(verdict
            .system_out
            .as_deref()
            .unwrap()
            .starts_with("kube-api-new-connections was unreachable during disruption testing for at least 5s of 3600s (maxAllowed=5s)"));
    }

    #[test]
    fn test_over_budget_fails() {
        let locator = api_locator();
        let job = JobType::new("aws");
        let allowed = budget(2.0);
        let overrides = VerdictOverrides::default();

        let verdict = test_server_availability(
            "sig-api-machinery",
            &locator,
            &[outage(&locator, 0, 3_000)],
            &context(Some(&job), &allowed, &overrides),
        );

        match &verdict.verdict {
            Verdict::Fail(output) => assert!(output.contains("at least 3s of 3600s (maxAllowed=2s)")),
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(verdict.system_out.as_deref().map(|s| s.lines().count()), Some(1));
    }

    #[test]
    fn test_missing_history_flakes() {
        let locator = api_locator();
        let job = JobType::new("metal");
        let allowed = StaticAllowedDisruption::default();
        let overrides = VerdictOverrides::default();

        let verdict = test_server_availability("sig-api-machinery", &locator, &[], &context(Some(&job), &allowed, &overrides));

        assert_eq!(verdict.state(), ResultState::Flaked);
        assert!(verdict
            .verdict
            .output()
            .unwrap()
            .starts_with("skipping test due to no historical disruption data:"));
    }

    #[test]
    fn test_lookup_error_and_unknown_platform_fail() {
        let locator = api_locator();
        let job = JobType::new("aws");
        let overrides = VerdictOverrides::default();

        let verdict = test_server_availability("o", &locator, &[], &context(Some(&job), &FailingSource, &overrides));
        assert!(verdict
            .verdict
            .output()
            .unwrap()
            .starts_with("error in getting allowed disruption:"));

        let allowed = budget(1.0);
        let verdict = test_server_availability("o", &locator, &[], &context(None, &allowed, &overrides));
        assert_eq!(verdict.verdict, Verdict::Fail("error in platform identification".into()));
    }

    #[test]
    fn test_override_turns_failure_into_flake() {
        let locator = api_locator();
        let job = JobType::new("azure");
        let allowed = budget(0.0);
        let overrides = VerdictOverrides::new(vec![OverrideRule {
            test_name_contains: "should be available throughout the test".into(),
            platform: Some("azure".into()),
            reason: "azure disruption is informing only".into(),
        }]);

        let verdict = test_server_availability(
            "sig-api-machinery",
            &locator,
            &[outage(&locator, 0, 10_000)],
            &context(Some(&job), &allowed, &overrides),
        );

        assert_eq!(verdict.state(), ResultState::Flaked);
        assert_eq!(verdict.duration, Some(3600.0));
    }

    #[test]
    fn test_all_backends_respects_filter() {
        let intervals = vec![
            outage(&Locator::disruption("kube-api", "new"), 0, 1_000),
            outage(&Locator::disruption("kube-api", "reused"), 0, 1_000),
            outage(&Locator::disruption("ingress-console", "new"), 0, 1_000),
        ];
        let job = JobType::new("aws");
        let allowed = budget(1.0);
        let overrides = VerdictOverrides::default();
        let ctx = context(Some(&job), &allowed, &overrides);

        assert_eq!(test_all_backends_for_disruption("sig-api-machinery", &BackendFilter::Api, &intervals, &ctx).len(), 2);
        assert_eq!(test_all_backends_for_disruption("sig-network", &BackendFilter::Ingress, &intervals, &ctx).len(), 1);
        assert_eq!(test_backend_both_connections("sig-trt", "kube-api", &intervals, &ctx).len(), 2);
    }

    #[test]
    fn test_half_second_gap_is_one_outage() {
        let locator = api_locator();
        let intervals = vec![outage(&locator, 0, 1_000), outage(&locator, 1_500, 2_500)];

        assert_eq!(count_single_second_disruptions(&locator, &intervals), 0);
    }

    #[test]
    fn test_isolated_blips_are_counted() {
        let locator = api_locator();
        let intervals = vec![
            outage(&locator, 0, 1_000),
            outage(&locator, 5_000, 5_500),
            outage(&locator, 10_000, 13_000),
        ];

        assert_eq!(count_single_second_disruptions(&locator, &intervals), 2);
    }

    fn blips(locator: &Locator, n: i64) -> Vec<Interval> {
        (0..n).map(|i| outage(locator, i * 5_000, i * 5_000 + 1_000)).collect()
    }

    #[test]
    fn test_single_second_tiers() {
        let locator = api_locator();

        let few = test_multiple_single_second_disruptions(&blips(&locator, 20));
        assert_eq!(few.len(), 2);
        assert!(few.iter().all(|v| v.verdict == Verdict::Pass));

        let some = test_multiple_single_second_disruptions(&blips(&locator, 25));
        assert_eq!(
            some[0].verdict,
            Verdict::Fail("backend-disruption-name/kube-api connection/new had 25 single second disruptions".into())
        );
        assert_eq!(some[1].verdict, Verdict::Pass);

        let many = test_multiple_single_second_disruptions(&blips(&locator, 51));
        assert!(many.iter().all(|v| v.state() == ResultState::Failed));
    }

    #[test]
    fn test_single_second_skips_other_backends() {
        let locator = Locator::disruption("cache-service", "new");
        assert!(test_multiple_single_second_disruptions(&blips(&locator, 60)).is_empty());
    }
}
