//! Threshold tests over matched intervals
//!
//! Thresholds are strict: a count equal to a threshold does not exceed it.
//! Output always surfaces the largest evidence.

use super::matcher::{times_an_event_happened, Matcher};
use super::result::TestVerdict;
use crate::monitorapi::{locator_keys, Interval};
use std::sync::Arc;

/// Classifies every matched interval by its repetition count.
///
/// Any count above `fail_threshold` fails the test (only when the fail
/// threshold is positive; use `-1` to never fail). Otherwise any count above
/// `flake_threshold` flakes it.
#[derive(Clone)]
pub struct SingleEventThresholdCheck {
    pub test_name: String,
    pub matcher: Arc<dyn Matcher>,
    pub fail_threshold: i64,
    pub flake_threshold: i64,
}

impl SingleEventThresholdCheck {
    pub fn new(
        test_name: impl Into<String>,
        matcher: Arc<dyn Matcher>,
        fail_threshold: i64,
        flake_threshold: i64,
    ) -> Self {
        Self {
            test_name: test_name.into(),
            matcher,
            fail_threshold,
            flake_threshold,
        }
    }

    pub fn test(&self, intervals: &[Interval]) -> TestVerdict {
        let mut failures = Vec::new();
        let mut flakes = Vec::new();

        for interval in intervals.iter().filter(|i| self.matcher.allows(i, None)) {
            let times = times_an_event_happened(interval);
            let line = format!(
                "event [{} - {}] happened {} times",
                interval.locator(),
                interval.message().human(),
                times
            );
            let compared = i64::try_from(times).unwrap_or(i64::MAX);
            if self.fail_threshold > 0 && compared > self.fail_threshold {
                failures.push(line);
            } else if compared > self.flake_threshold {
                flakes.push(line);
            }
        }

        if !failures.is_empty() {
            let output = failures.join("\n");
            return TestVerdict::fail(&self.test_name, output.clone()).with_system_out(output);
        }
        if !flakes.is_empty() {
            let output = flakes.join("\n");
            return TestVerdict::flake(&self.test_name, output.clone()).with_system_out(output);
        }
        TestVerdict::pass(&self.test_name)
    }
}

/// Flake when the most repeated matched event reaches `flake_threshold`.
///
/// With `namespace`, only intervals whose locator is in that namespace count.
/// The output is the largest occurrence as `HH:MM:SS <interval>`.
pub fn event_match_threshold_test(
    test_name: &str,
    namespace: Option<&str>,
    intervals: &[Interval],
    matcher: &dyn Matcher,
    flake_threshold: u64,
) -> TestVerdict {
    let mut max_times = 0;
    let mut max_output = String::new();

    for interval in intervals {
        if let Some(namespace) = namespace {
            if interval.locator().get(locator_keys::NAMESPACE) != Some(namespace) {
                continue;
            }
        }
        if !matcher.allows(interval, None) {
            continue;
        }
        let times = times_an_event_happened(interval);
        if times > max_times {
            max_times = times;
            max_output = format!("{} {}\n", interval.from.format("%H:%M:%S"), interval);
        }
    }

    if max_times < flake_threshold {
        return TestVerdict::pass(test_name);
    }
    TestVerdict::flake(test_name, max_output)
}

/// How a test built from matched occurrences reports them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Fail,
    Flake,
}

/// Every matched interval is a problem; `summary` explains what it means.
pub fn matched_occurrence_test(
    test_name: &str,
    intervals: &[Interval],
    matcher: &dyn Matcher,
    severity: Severity,
    summary: &str,
) -> TestVerdict {
    let occurrences: Vec<String> = intervals
        .iter()
        .filter(|i| matcher.allows(i, None))
        .map(|i| format!("{} - {}", i.locator(), i.message()))
        .collect();

    if occurrences.is_empty() {
        return TestVerdict::pass(test_name);
    }

    let lines = occurrences.join("\n");
    let output = format!("{} {}\n\n{}", occurrences.len(), summary, lines);
    let verdict = match severity {
        Severity::Fail => TestVerdict::fail(test_name, output),
        Severity::Flake => TestVerdict::flake(test_name, output),
    };
    verdict.with_system_out(lines)
}
