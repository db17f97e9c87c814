//! Locators and messages for backend disruption transitions

use crate::monitorapi::{reasons, Level, Locator, Message};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Whether a backend is probed over fresh or pooled connections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendConnectionType {
    New,
    Reused,
}

impl BackendConnectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendConnectionType::New => "new",
            BackendConnectionType::Reused => "reused",
        }
    }
}

impl fmt::Display for BackendConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `backend-disruption-name/<backend> connection/<new|reused>`
pub fn disruption_locator(backend: &str, connection: BackendConnectionType) -> Locator {
    Locator::disruption(backend, connection.as_str())
}

/// Errors from the machine running the probes rather than the cluster under test
pub const DNS_LOOKUP_PATTERN: &str = r"dial tcp: lookup.*: i/o timeout";

fn dns_lookup_regex() -> Option<&'static Regex> {
    static DNS: OnceLock<Option<Regex>> = OnceLock::new();
    DNS.get_or_init(|| Regex::new(DNS_LOOKUP_PATTERN).ok()).as_ref()
}

pub fn is_dns_lookup_timeout(error: &str) -> bool {
    dns_lookup_regex().map_or(false, |re| re.is_match(error))
}

/// A disruption state change ready to be recorded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisruptionTransition {
    pub message: Message,
    pub reason: &'static str,
    pub level: Level,
}

/// Classify a failed probe.
///
/// DNS lookup timeouts are blamed on the probing side and reported as a
/// sampler outage at `Warning`; everything else is a disruption at `Error`.
pub fn disruption_began(
    locator: &Locator,
    connection: BackendConnectionType,
    error: &str,
) -> DisruptionTransition {
    if is_dns_lookup_timeout(error) {
        let human = format!(
            "DNS lookup timeouts began for {} GET requests over {} connections: {} (likely a problem in cluster running tests, not the cluster under test)",
            locator, connection, error
        );
        return DisruptionTransition {
            message: Message::reasoned(reasons::DISRUPTION_SAMPLER_OUTAGE_BEGAN, human),
            reason: reasons::DISRUPTION_SAMPLER_OUTAGE_BEGAN,
            level: Level::Warning,
        };
    }

    let human = format!(
        "{} stopped responding to GET requests over {} connections: {}",
        locator, connection, error
    );
    DisruptionTransition {
        message: Message::reasoned(reasons::DISRUPTION_BEGAN, human),
        reason: reasons::DISRUPTION_BEGAN,
        level: Level::Error,
    }
}

pub fn disruption_ended(locator: &Locator, connection: BackendConnectionType) -> DisruptionTransition {
    let human = format!(
        "{} started responding to GET requests over {} connections",
        locator, connection
    );
    DisruptionTransition {
        message: Message::reasoned(reasons::DISRUPTION_ENDED, human),
        reason: reasons::DISRUPTION_ENDED,
        level: Level::Info,
    }
}
