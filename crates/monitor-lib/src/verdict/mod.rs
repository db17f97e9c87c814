//! Verdicts from matched interval patterns
//!
//! This module provides:
//! - Test results and the pass/fail/flake aggregation over them
//! - Matchers recognising known event signatures
//! - Repetition threshold tests and matched occurrence tests
//! - Configured overrides downgrading known failures to flakes

mod matcher;
mod overrides;
mod result;
mod threshold;

pub use matcher::{times_an_event_happened, Matcher, PatternMatcher};
pub use overrides::{OverrideRule, VerdictOverrides};
pub use result::{
    aggregate_results, FailureOutput, ResultState, SkipMessage, TestResult, TestVerdict, Verdict,
};
pub use threshold::{
    event_match_threshold_test, matched_occurrence_test, Severity, SingleEventThresholdCheck,
};
