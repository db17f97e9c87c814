//! Interval messages with leading `key/value` annotations
//!
//! A message is rendered as zero or more `key/value` annotation tokens followed
//! by free text, e.g. `reason/Created node/worker-1 pod was created`. Reading
//! stops at the first token without a `/`; everything after it is the human
//! message. This module is the only place that knows the text encoding.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Annotation keys understood by the crate
pub mod annotations {
    pub const REASON: &str = "reason";
    pub const CONTAINER_EXIT_CODE: &str = "code";
    pub const CAUSE: &str = "cause";
    pub const NODE: &str = "node";
    pub const CONSTRUCTED: &str = "constructed";
    pub const POD_PHASE: &str = "phase";
    pub const IS_STATIC_POD: &str = "mirrored";
    pub const DURATION: &str = "duration";
    pub const COUNT: &str = "count";
    pub const REQUEST_AUDIT_ID: &str = "request-audit-id";
}

/// Interval reasons
pub mod reasons {
    pub const POD_CREATED: &str = "Created";
    pub const POD_SCHEDULED: &str = "Scheduled";
    pub const POD_GRACEFUL_DELETE_STARTED: &str = "GracefulDelete";
    pub const POD_FORCE_DELETE: &str = "ForceDelete";
    pub const POD_DELETED: &str = "Deleted";
    pub const POD_DELETED_BEFORE_SCHEDULING: &str = "DeletedBeforeScheduling";
    pub const POD_DELETED_AFTER_COMPLETION: &str = "DeletedAfterCompletion";
    pub const POD_PENDING: &str = "PodIsPending";
    pub const POD_NOT_PENDING: &str = "PodIsNotPending";

    pub const CONTAINER_WAIT: &str = "ContainerWait";
    pub const CONTAINER_START: &str = "ContainerStart";
    pub const CONTAINER_EXIT: &str = "ContainerExit";
    pub const CONTAINER_READY: &str = "Ready";
    pub const CONTAINER_NOT_READY: &str = "NotReady";
    pub const CONTAINER_READINESS_FAILED: &str = "ReadinessFailed";
    pub const CONTAINER_READINESS_ERRORED: &str = "ReadinessErrored";
    pub const CONTAINER_STARTUP_PROBE_FAILED: &str = "StartupProbeFailed";

    pub const DISRUPTION_BEGAN: &str = "DisruptionBegan";
    pub const DISRUPTION_ENDED: &str = "DisruptionEnded";
    pub const DISRUPTION_SAMPLER_OUTAGE_BEGAN: &str = "DisruptionSamplerOutageBegan";

    /// Non-overlapping pod states. A pod does not exist before create or after delete.
    pub const POD_LIFECYCLE_TRANSITIONS: &[&str] = &[
        POD_CREATED,
        POD_SCHEDULED,
        POD_GRACEFUL_DELETE_STARTED,
        POD_DELETED,
    ];

    /// Non-overlapping container states, bounded by ContainerWait and ContainerExit.
    pub const CONTAINER_LIFECYCLE_TRANSITIONS: &[&str] =
        &[CONTAINER_WAIT, CONTAINER_START, CONTAINER_EXIT];

    /// Container readiness states, starting not ready once the container runs.
    pub const CONTAINER_READINESS_TRANSITIONS: &[&str] = &[CONTAINER_READY, CONTAINER_NOT_READY];

    pub const KUBELET_READINESS_CHECKS: &[&str] = &[
        CONTAINER_READINESS_FAILED,
        CONTAINER_READINESS_ERRORED,
        CONTAINER_STARTUP_PROBE_FAILED,
    ];
}

/// Message of a condition
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Message(String);

impl Message {
    /// Wrap already-encoded message text
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn builder() -> MessageBuilder {
        MessageBuilder::default()
    }

    /// `reason/<reason> <human>`
    pub fn reasoned(reason: &str, human: impl Into<String>) -> Self {
        Self::builder().reason(reason).human(human).build()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Leading annotations, in order of appearance
    pub fn annotations(&self) -> Vec<(&str, &str)> {
        let mut out = Vec::new();
        for token in self.0.split(' ') {
            match token.split_once('/') {
                Some((key, value)) => out.push((key, value)),
                None => break,
            }
        }
        out
    }

    pub fn annotation_map(&self) -> BTreeMap<&str, &str> {
        self.annotations().into_iter().collect()
    }

    /// Value of the first annotation with the given key
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations()
            .into_iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }

    pub fn reason(&self) -> Option<&str> {
        self.annotation(annotations::REASON).filter(|r| !r.is_empty())
    }

    pub fn has_reason(&self, reason: &str) -> bool {
        self.reason() == Some(reason)
    }

    /// Text after the annotations
    pub fn human(&self) -> &str {
        let mut offset = 0;
        for token in self.0.split(' ') {
            if !token.contains('/') {
                return &self.0[offset..];
            }
            offset += token.len() + 1;
        }
        ""
    }

    pub fn is_constructed(&self) -> bool {
        self.annotation(annotations::CONSTRUCTED) == Some("true")
    }

    /// Prefix with `constructed/true`, marking an interval built from other intervals
    pub fn constructed(&self) -> Message {
        Message(format!("{}/true {}", annotations::CONSTRUCTED, self.0))
    }

    /// Prefix with an extra annotation
    pub fn with_annotation(&self, key: &str, value: &str) -> Message {
        if self.0.is_empty() {
            return Message(format!("{}/{}", key, sanitize(value)));
        }
        Message(format!("{}/{} {}", key, sanitize(value), self.0))
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.0.contains(needle)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Message {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for Message {
    fn from(text: String) -> Self {
        Self(text)
    }
}

/// Annotation values cannot contain separators
fn sanitize(value: &str) -> String {
    value.replace(' ', "_")
}

/// Builds a message from annotations and human text
#[derive(Debug, Default)]
pub struct MessageBuilder {
    annotations: Vec<(String, String)>,
    human: Option<String>,
}

impl MessageBuilder {
    pub fn reason(self, reason: &str) -> Self {
        self.annotation(annotations::REASON, reason)
    }

    pub fn annotation(mut self, key: &str, value: &str) -> Self {
        self.annotations.push((key.to_string(), sanitize(value)));
        self
    }

    pub fn human(mut self, human: impl Into<String>) -> Self {
        self.human = Some(human.into());
        self
    }

    pub fn build(self) -> Message {
        let mut tokens: Vec<String> = self
            .annotations
            .into_iter()
            .map(|(k, v)| format!("{}/{}", k, v))
            .collect();
        if let Some(human) = self.human {
            tokens.push(human);
        }
        Message(tokens.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_annotations_stop_at_first_plain_token() {
        let message = Message::new("reason/Scheduled node/ip-10-0-141-9 pod was scheduled ok/fine");
        assert_eq!(
            message.annotations(),
            vec![("reason", "Scheduled"), ("node", "ip-10-0-141-9")]
        );
        assert_eq!(message.reason(), Some("Scheduled"));
        assert_eq!(message.human(), "pod was scheduled ok/fine");
    }

    #[test]
    fn test_annotation_only_message() {
        let message = Message::new("reason/ContainerStart cause/ duration/6.00s");
        assert_eq!(message.annotation(annotations::DURATION), Some("6.00s"));
        assert_eq!(message.annotation(annotations::CAUSE), Some(""));
        assert_eq!(message.human(), "");
    }

    #[test]
    fn test_trailing_space_is_kept() {
        let message = Message::new("reason/Created ");
        assert_eq!(message.reason(), Some("Created"));
        assert_eq!(message.human(), "");
        assert_eq!(message.constructed().as_str(), "constructed/true reason/Created ");
    }

    #[test]
    fn test_reasoned_and_missed() {
        let message = Message::reasoned(reasons::CONTAINER_WAIT, "missed real \"ContainerWait\"");
        assert_eq!(
            message.constructed().as_str(),
            "constructed/true reason/ContainerWait missed real \"ContainerWait\""
        );
        assert!(message.constructed().is_constructed());
        assert!(!message.is_constructed());
    }

    #[test]
    fn test_builder_sanitizes_values() {
        let message = Message::builder()
            .reason("Killing")
            .annotation(annotations::NODE, "node a")
            .human("stopping container")
            .build();
        assert_eq!(message.as_str(), "reason/Killing node/node_a stopping container");
    }

    #[test]
    fn test_with_annotation() {
        let message = Message::new("pod sandbox failed");
        let annotated = message.with_annotation(annotations::COUNT, "4");
        assert_eq!(annotated.as_str(), "count/4 pod sandbox failed");
        assert_eq!(annotated.annotation(annotations::COUNT), Some("4"));
    }

    #[test]
    fn test_empty_reason_is_none() {
        assert_eq!(Message::new("reason/ foo").reason(), None);
        assert_eq!(Message::new("plain text").reason(), None);
    }
}
