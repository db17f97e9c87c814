//! Configured downgrades of known failures
//!
//! Some failures are expected on some platforms. Rather than special casing
//! them in the tests, a rule table turns a matching failure into a flake.

use super::result::{TestVerdict, Verdict};
use serde::Deserialize;
use tracing::info;

/// Downgrade a failing test to a flake.
///
/// A rule applies when the test name contains `test_name_contains` and, if
/// `platform` is set, the run is on that platform.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OverrideRule {
    pub test_name_contains: String,
    #[serde(default)]
    pub platform: Option<String>,
    pub reason: String,
}

impl OverrideRule {
    fn applies(&self, test_name: &str, platform: Option<&str>) -> bool {
        if !test_name.contains(&self.test_name_contains) {
            return false;
        }
        match &self.platform {
            Some(required) => platform == Some(required.as_str()),
            None => true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct VerdictOverrides {
    rules: Vec<OverrideRule>,
}

impl VerdictOverrides {
    pub fn new(rules: Vec<OverrideRule>) -> Self {
        Self { rules }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// First rule that applies to a test
    pub fn matching(&self, test_name: &str, platform: Option<&str>) -> Option<&OverrideRule> {
        self.rules.iter().find(|r| r.applies(test_name, platform))
    }

    /// Downgrade `verdict` if it failed and a rule applies
    pub fn apply(&self, verdict: TestVerdict, platform: Option<&str>) -> TestVerdict {
        let Verdict::Fail(output) = &verdict.verdict else {
            return verdict;
        };
        let Some(rule) = self.matching(&verdict.name, platform) else {
            return verdict;
        };

        info!(
            test = %verdict.name,
            platform = platform.unwrap_or_default(),
            reason = %rule.reason,
            "Downgrading failure to flake"
        );
        let output = format!("{}\n\n{}", rule.reason, output);
        TestVerdict {
            verdict: Verdict::Flake(output),
            ..verdict
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn azure_rule() -> OverrideRule {
        OverrideRule {
            test_name_contains: "remain available".into(),
            platform: Some("azure".into()),
            reason: "disruption on azure is tracked separately".into(),
        }
    }

    #[test]
    fn test_failure_downgraded_on_matching_platform() {
        let overrides = VerdictOverrides::new(vec![azure_rule()]);
        let verdict = TestVerdict::fail("kube-api should remain available", "down 30s");

        let flaked = overrides.apply(verdict.clone(), Some("azure"));
        assert_eq!(
            flaked.verdict,
            Verdict::Flake("disruption on azure is tracked separately\n\ndown 30s".into())
        );

        let kept = overrides.apply(verdict, Some("aws"));
        assert!(matches!(kept.verdict, Verdict::Fail(_)));
    }

    #[test]
    fn test_pass_is_untouched() {
        let overrides = VerdictOverrides::new(vec![azure_rule()]);
        let verdict = TestVerdict::pass("kube-api should remain available");
        assert_eq!(overrides.apply(verdict.clone(), Some("azure")), verdict);
    }

    #[test]
    fn test_rule_without_platform_applies_everywhere() {
        let overrides: VerdictOverrides = serde_json::from_str(
            r#"[{"test_name_contains": "pending alerts", "reason": "informing only"}]"#,
        )
        .unwrap();

        let verdict = overrides.apply(TestVerdict::fail("no pending alerts", "x"), None);
        assert!(matches!(verdict.verdict, Verdict::Flake(_)));
    }
}
