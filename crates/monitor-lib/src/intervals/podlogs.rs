//! Intervals from matching pod log lines
//!
//! Each gatherer lists the pods matching a label selector, reads one
//! container's log and turns every line containing a known substring into a
//! one second interval located at `<container locator> src/podLog`.

use crate::error::Result;
use crate::monitor::Recorder;
use crate::monitorapi::{locator_keys, Condition, Interval, Level, Locator, LocatorBuilder};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use k8s_openapi::api::core::v1::Pod;
use serde::Deserialize;
use tracing::{debug, error, info, warn};

/// Where pod listings and container logs come from
#[async_trait]
pub trait PodLogSource: Send + Sync {
    /// Pods in `namespace` matching the label `selector`
    async fn list_pods(&self, namespace: &str, selector: &str) -> Result<Vec<Pod>>;

    /// Log lines of one container of `pod`
    async fn container_logs(&self, pod: &Pod, container: &str) -> Result<Vec<String>>;
}

/// A substring to look for and the level of the interval it produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubStringLevel {
    pub sub_string: &'static str,
    pub level: Level,
}

impl SubStringLevel {
    pub const fn warning(sub_string: &'static str) -> Self {
        Self {
            sub_string,
            level: Level::Warning,
        }
    }
}

/// How matched lines are parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLineFormat {
    /// Every line is JSON; a matched line that fails to parse is an error
    Json,
    /// JSON mixed with plain text; unparseable lines are skipped
    MixedJson,
}

/// The fields read from a JSON log line; everything else is ignored
#[derive(Debug, Deserialize)]
struct JsonLogLine {
    ts: DateTime<Utc>,
    msg: String,
}

/// Scans one container's logs across the pods matching a selector
#[derive(Debug, Clone)]
pub struct PodLogIntervalGenerator {
    pub namespace: &'static str,
    pub selector: &'static str,
    pub container: &'static str,
    pub sub_strings: Vec<SubStringLevel>,
    pub format: LogLineFormat,
}

impl PodLogIntervalGenerator {
    /// etcd writes structured JSON
    pub fn etcd() -> Self {
        Self {
            namespace: "openshift-etcd",
            selector: "app=etcd",
            container: "etcd",
            sub_strings: vec![
                SubStringLevel::warning("slow fdatasync"),
                SubStringLevel::warning("dropped internal Raft message since sending buffer is full"),
                SubStringLevel::warning("waiting for ReadIndex response took too long, retrying"),
                SubStringLevel::warning("apply request took too long"),
            ],
            format: LogLineFormat::Json,
        }
    }

    /// kube-apiserver mixes klog text with JSON from its etcd client
    pub fn kube_apiserver() -> Self {
        Self {
            namespace: "openshift-kube-apiserver",
            selector: "app=openshift-kube-apiserver",
            container: "kube-apiserver",
            sub_strings: vec![SubStringLevel::warning("retrying of unary invoker failed")],
            format: LogLineFormat::MixedJson,
        }
    }

    /// The gatherers run by [`intervals_from_pod_logs`]
    pub fn defaults() -> Vec<Self> {
        vec![Self::etcd(), Self::kube_apiserver()]
    }

    pub fn locator(&self, pod: &Pod) -> Locator {
        let namespace = pod.metadata.namespace.as_deref().unwrap_or(self.namespace);
        let name = pod.metadata.name.as_deref().unwrap_or_default();
        let node = pod
            .spec
            .as_ref()
            .and_then(|spec| spec.node_name.as_deref())
            .unwrap_or_default();
        let uid = pod.metadata.uid.as_deref().unwrap_or_default();

        LocatorBuilder::new()
            .with(locator_keys::NAMESPACE, namespace)
            .with(locator_keys::POD, name)
            .with(locator_keys::NODE, node)
            .with(locator_keys::UID, uid)
            .with(locator_keys::CONTAINER, self.container)
            .with(locator_keys::SOURCE, "podLog")
            .build()
    }

    /// Interval for a matched line, or `None` when nothing matches or the
    /// interval falls outside `[beginning, end]`.
    pub fn scan_line(
        &self,
        locator: &Locator,
        line: &str,
        beginning: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Option<Interval>> {
        let Some(matched) = self.sub_strings.iter().find(|s| line.contains(s.sub_string)) else {
            return Ok(None);
        };

        let parsed: JsonLogLine = match (serde_json::from_str(line), self.format) {
            (Ok(parsed), _) => parsed,
            (Err(_), LogLineFormat::MixedJson) => return Ok(None),
            (Err(e), LogLineFormat::Json) => return Err(e.into()),
        };

        let from = parsed.ts;
        let to = from + Duration::seconds(1);
        if from < beginning || from > end || to < beginning || to > end {
            return Ok(None);
        }

        Ok(Some(Interval::new(
            Condition::new(matched.level, locator.clone(), parsed.msg),
            from,
            to,
        )))
    }

    /// Intervals from every matching pod. Failing to list pods is an error;
    /// an unreadable log or a bad line is logged and skipped.
    pub async fn gather(
        &self,
        source: &dyn PodLogSource,
        beginning: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Interval>> {
        let pods = source
            .list_pods(self.namespace, self.selector)
            .await
            .map_err(|e| {
                error!(namespace = self.namespace, error = %e, "Unable to list pods");
                e
            })?;

        let mut intervals = Vec::new();
        for pod in &pods {
            let locator = self.locator(pod);
            let pod_name = pod.metadata.name.as_deref().unwrap_or_default();
            info!(pod = pod_name, %beginning, %end, "Fetching pod logs");

            let lines = match source.container_logs(pod, self.container).await {
                Ok(lines) => lines,
                Err(e) => {
                    warn!(pod = pod_name, container = self.container, error = %e, "Error reading pod logs");
                    continue;
                }
            };

            for line in &lines {
                match self.scan_line(&locator, line, beginning, end) {
                    Ok(Some(interval)) => {
                        debug!(pod = pod_name, interval = %interval, "Added pod log interval");
                        intervals.push(interval);
                    }
                    Ok(None) => {}
                    Err(e) => error!(pod = pod_name, error = %e, line = %line, "Error scanning log line"),
                }
            }
            debug!(pod = pod_name, "Log file completed");
        }
        Ok(intervals)
    }
}

/// Run every default gatherer over `[beginning, end]`
pub async fn intervals_from_pod_logs(
    source: &dyn PodLogSource,
    beginning: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<Interval>> {
    let mut intervals = Vec::new();
    for gatherer in PodLogIntervalGenerator::defaults() {
        intervals.extend(gatherer.gather(source, beginning, end).await?);
    }
    Ok(intervals)
}

/// Record each matched line as an event at its log timestamp. Returns how
/// many were recorded.
pub async fn record_pod_logs(
    source: &dyn PodLogSource,
    recorder: &dyn Recorder,
    beginning: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<usize> {
    let intervals = intervals_from_pod_logs(source, beginning, end).await?;
    let count = intervals.len();
    for interval in intervals {
        recorder.record_at(interval.from, vec![interval.condition]);
    }
    info!(count, "Recorded pod log events");
    Ok(count)
}
