//! Test results and their aggregation

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureOutput {
    pub output: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkipMessage {
    pub message: String,
}

/// One reported test case, in the shape consumed by result writers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_output: Option<FailureOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_out: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_message: Option<SkipMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

impl TestResult {
    pub fn passed(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            failure_output: None,
            system_out: None,
            skip_message: None,
            duration: None,
        }
    }

    pub fn failed(name: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            failure_output: Some(FailureOutput {
                output: output.into(),
            }),
            ..Self::passed(name)
        }
    }

    pub fn skipped(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            skip_message: Some(SkipMessage {
                message: message.into(),
            }),
            ..Self::passed(name)
        }
    }

    pub fn with_system_out(mut self, system_out: impl Into<String>) -> Self {
        self.system_out = Some(system_out.into());
        self
    }

    pub fn is_failure(&self) -> bool {
        self.failure_output.is_some()
    }

    pub fn is_skipped(&self) -> bool {
        self.skip_message.is_some()
    }
}

/// Outcome of one evaluated test
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail(String),
    /// Failed, but tolerated. Reported as a failing and a passing result with the same name.
    Flake(String),
}

impl Verdict {
    pub fn state(&self) -> ResultState {
        match self {
            Verdict::Pass => ResultState::Passed,
            Verdict::Fail(_) => ResultState::Failed,
            Verdict::Flake(_) => ResultState::Flaked,
        }
    }

    pub fn output(&self) -> Option<&str> {
        match self {
            Verdict::Pass => None,
            Verdict::Fail(output) | Verdict::Flake(output) => Some(output),
        }
    }
}

/// A named verdict with optional supporting output
#[derive(Debug, Clone, PartialEq)]
pub struct TestVerdict {
    pub name: String,
    pub verdict: Verdict,
    pub system_out: Option<String>,
    /// Seconds covered by the test, if it measured something over time
    pub duration: Option<f64>,
}

impl TestVerdict {
    pub fn pass(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            verdict: Verdict::Pass,
            system_out: None,
            duration: None,
        }
    }

    pub fn fail(name: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            verdict: Verdict::Fail(output.into()),
            system_out: None,
            duration: None,
        }
    }

    pub fn flake(name: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            verdict: Verdict::Flake(output.into()),
            system_out: None,
            duration: None,
        }
    }

    pub fn with_system_out(mut self, system_out: impl Into<String>) -> Self {
        self.system_out = Some(system_out.into());
        self
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration = Some(seconds);
        self
    }

    pub fn state(&self) -> ResultState {
        self.verdict.state()
    }

    /// Expand into result records. A flake becomes a failing and a passing
    /// result with the same name; `system_out` goes on the first record.
    pub fn into_results(self) -> Vec<TestResult> {
        let mut first = match &self.verdict {
            Verdict::Pass => TestResult::passed(&self.name),
            Verdict::Fail(output) | Verdict::Flake(output) => TestResult::failed(&self.name, output),
        };
        first.system_out = self.system_out;
        first.duration = self.duration;

        match self.verdict {
            Verdict::Flake(_) => vec![first, TestResult::passed(self.name)],
            _ => vec![first],
        }
    }
}

/// Final state of a test name across all of its results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultState {
    Passed,
    Failed,
    Flaked,
    Skipped,
}

impl fmt::Display for ResultState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultState::Passed => write!(f, "passed"),
            ResultState::Failed => write!(f, "failed"),
            ResultState::Flaked => write!(f, "flaked"),
            ResultState::Skipped => write!(f, "skipped"),
        }
    }
}

/// Collapse results by name: a name with both a failure and a pass flaked
pub fn aggregate_results(results: &[TestResult]) -> BTreeMap<String, ResultState> {
    #[derive(Default)]
    struct Seen {
        passed: bool,
        failed: bool,
        skipped: bool,
    }

    let mut seen: BTreeMap<&str, Seen> = BTreeMap::new();
    for result in results {
        let entry = seen.entry(result.name.as_str()).or_default();
        if result.is_failure() {
            entry.failed = true;
        } else if result.is_skipped() {
            entry.skipped = true;
        } else {
            entry.passed = true;
        }
    }

    seen.into_iter()
        .map(|(name, s)| {
            let state = match (s.failed, s.passed, s.skipped) {
                (true, true, _) => ResultState::Flaked,
                (true, false, _) => ResultState::Failed,
                (false, true, _) => ResultState::Passed,
                (false, false, _) => ResultState::Skipped,
            };
            (name.to_string(), state)
        })
        .collect()
}
