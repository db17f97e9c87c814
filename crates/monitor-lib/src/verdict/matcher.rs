//! Matching intervals against known signatures

use crate::error::Result;
use crate::monitorapi::{annotations, Interval};
use regex::Regex;
use std::sync::OnceLock;

/// Decides whether an interval is an occurrence of a known signature
pub trait Matcher: Send + Sync {
    fn name(&self) -> &str;

    /// `topology` is the cluster topology of the run, when known
    fn allows(&self, interval: &Interval, topology: Option<&str>) -> bool;
}

impl<F> Matcher for F
where
    F: Fn(&Interval) -> bool + Send + Sync,
{
    fn name(&self) -> &str {
        "anonymous"
    }

    fn allows(&self, interval: &Interval, _topology: Option<&str>) -> bool {
        self(interval)
    }
}

/// Matches by regular expressions over locator keys, reason and human message.
///
/// Every configured pattern must match. A matcher limited to a topology only
/// matches runs of that topology.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    name: String,
    locator_keys: Vec<(String, Regex)>,
    reason: Option<Regex>,
    human: Option<Regex>,
    topology: Option<String>,
}

impl PatternMatcher {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            locator_keys: Vec::new(),
            reason: None,
            human: None,
            topology: None,
        }
    }

    /// Require the locator value for `key` to match `pattern`
    pub fn locator_key(mut self, key: &str, pattern: &str) -> Result<Self> {
        self.locator_keys.push((key.to_string(), Regex::new(pattern)?));
        Ok(self)
    }

    pub fn reason(mut self, pattern: &str) -> Result<Self> {
        self.reason = Some(Regex::new(pattern)?);
        Ok(self)
    }

    pub fn human(mut self, pattern: &str) -> Result<Self> {
        self.human = Some(Regex::new(pattern)?);
        Ok(self)
    }

    pub fn topology(mut self, topology: impl Into<String>) -> Self {
        self.topology = Some(topology.into());
        self
    }
}

impl Matcher for PatternMatcher {
    fn name(&self) -> &str {
        &self.name
    }

    fn allows(&self, interval: &Interval, topology: Option<&str>) -> bool {
        if let Some(required) = &self.topology {
            if topology != Some(required.as_str()) {
                return false;
            }
        }

        for (key, pattern) in &self.locator_keys {
            match interval.locator().get(key) {
                Some(value) if pattern.is_match(value) => {}
                _ => return false,
            }
        }

        if let Some(pattern) = &self.reason {
            match interval.message().reason() {
                Some(reason) if pattern.is_match(reason) => {}
                _ => return false,
            }
        }

        if let Some(pattern) = &self.human {
            if !pattern.is_match(interval.message().human()) {
                return false;
            }
        }

        true
    }
}

fn times_regex() -> Option<&'static Regex> {
    static TIMES: OnceLock<Option<Regex>> = OnceLock::new();
    TIMES.get_or_init(|| Regex::new(r"(\d+) times").ok()).as_ref()
}

/// How many times the event behind an interval happened.
///
/// Uses the `count/N` annotation, then an `N times` phrase in the human
/// message, and defaults to 1.
pub fn times_an_event_happened(interval: &Interval) -> u64 {
    let message = interval.message();
    if let Some(count) = message
        .annotation(annotations::COUNT)
        .and_then(|c| c.parse::<u64>().ok())
    {
        return count;
    }
    times_regex()
        .and_then(|re| re.captures(message.human()))
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<u64>().ok())
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitorapi::Condition;
    use chrono::Utc;

    fn interval(locator: &str, message: &str) -> Interval {
        Interval::instant(Condition::warning(locator, message), Utc::now())
    }

    #[test]
    fn test_times_an_event_happened() {
        assert_eq!(times_an_event_happened(&interval("ns/a", "count/7 reason/BackOff x")), 7);
        assert_eq!(
            times_an_event_happened(&interval("ns/a", "reason/BackOff Back-off restarting (24 times)")),
            24
        );
        assert_eq!(
            times_an_event_happened(&interval("ns/a", "reason/Probe probe failed happened 3 times")),
            3
        );
        assert_eq!(times_an_event_happened(&interval("ns/a", "reason/BackOff once")), 1);
    }

    #[test]
    fn test_pattern_matcher() {
        let matcher = PatternMatcher::new("etcd readiness")
            .locator_key("ns", "^openshift-etcd$")
            .unwrap()
            .reason("^Unhealthy$")
            .unwrap()
            .human("Readiness probe")
            .unwrap();

        assert_eq!(matcher.name(), "etcd readiness");
        assert!(matcher.allows(
            &interval("ns/openshift-etcd pod/etcd-0", "reason/Unhealthy Readiness probe failed"),
            None
        ));
        assert!(!matcher.allows(
            &interval("ns/openshift-etcd-operator pod/etcd-0", "reason/Unhealthy Readiness probe failed"),
            None
        ));
        assert!(!matcher.allows(
            &interval("ns/openshift-etcd pod/etcd-0", "reason/Killing Readiness probe failed"),
            None
        ));
        assert!(!matcher.allows(&interval("ns/openshift-etcd", "Readiness probe failed"), None));
    }

    #[test]
    fn test_topology_restriction() {
        let matcher = PatternMatcher::new("single node").topology("SingleReplica");
        let any = interval("ns/a", "reason/X y");
        assert!(matcher.allows(&any, Some("SingleReplica")));
        assert!(!matcher.allows(&any, Some("HighlyAvailable")));
        assert!(!matcher.allows(&any, None));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(PatternMatcher::new("bad").human("(").is_err());
    }

    #[test]
    fn test_closure_matcher() {
        let matcher = |i: &Interval| i.message().contains("oops");
        assert!(matcher.allows(&interval("ns/a", "oops"), None));
        assert_eq!(matcher.name(), "anonymous");
    }
}
