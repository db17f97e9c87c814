//! Snapshot of cluster resources recorded during the run
//!
//! Reconstruction consults these read-only to find authoritative creation and
//! termination times. A missing entry is never an error.

use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{ContainerStatus, Pod};
use std::collections::HashMap;

pub const PODS: &str = "pods";

/// A resource object as last seen by a watcher
#[derive(Debug, Clone)]
pub enum RecordedResource {
    Pod(Box<Pod>),
    Unstructured(serde_json::Value),
}

impl RecordedResource {
    pub fn as_pod(&self) -> Option<&Pod> {
        match self {
            RecordedResource::Pod(pod) => Some(pod),
            RecordedResource::Unstructured(_) => None,
        }
    }
}

impl From<Pod> for RecordedResource {
    fn from(pod: Pod) -> Self {
        RecordedResource::Pod(Box::new(pod))
    }
}

/// `namespace/name` to the recorded object
pub type InstanceMap = HashMap<String, RecordedResource>;

/// Resource kind (e.g. `pods`) to its instances
pub type ResourcesMap = HashMap<String, InstanceMap>;

/// Look up a recorded pod by `namespace/name`
pub fn recorded_pod<'a>(resources: &'a ResourcesMap, namespaced_name: &str) -> Option<&'a Pod> {
    resources
        .get(PODS)
        .and_then(|pods| pods.get(namespaced_name))
        .and_then(RecordedResource::as_pod)
}

/// Non-zero creation timestamp of a pod
pub fn pod_creation_time(pod: &Pod) -> Option<DateTime<Utc>> {
    pod.metadata
        .creation_timestamp
        .as_ref()
        .map(|t| t.0)
        .filter(|t| t.timestamp() != 0)
}

pub fn pod_restart_policy(pod: &Pod) -> Option<&str> {
    pod.spec.as_ref().and_then(|s| s.restart_policy.as_deref())
}

pub fn container_statuses(pod: &Pod) -> &[ContainerStatus] {
    pod.status
        .as_ref()
        .and_then(|s| s.container_statuses.as_deref())
        .unwrap_or_default()
}

pub fn init_container_statuses(pod: &Pod) -> &[ContainerStatus] {
    pod.status
        .as_ref()
        .and_then(|s| s.init_container_statuses.as_deref())
        .unwrap_or_default()
}

/// Termination time of a container that is terminated and not about to run again
pub fn final_termination_time(status: &ContainerStatus) -> Option<DateTime<Utc>> {
    let state = status.state.as_ref()?;
    if state.running.is_some() || state.waiting.is_some() {
        return None;
    }
    state
        .terminated
        .as_ref()
        .and_then(|t| t.finished_at.as_ref())
        .map(|t| t.0)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use k8s_openapi::api::core::v1::{
        ContainerState, ContainerStateRunning, ContainerStateTerminated, PodSpec, PodStatus,
    };
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};

    pub fn terminated(name: &str, finished_at: DateTime<Utc>) -> ContainerStatus {
        ContainerStatus {
            name: name.to_string(),
            state: Some(ContainerState {
                terminated: Some(ContainerStateTerminated {
                    finished_at: Some(Time(finished_at)),
                    exit_code: 0,
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    pub fn running(name: &str) -> ContainerStatus {
        ContainerStatus {
            name: name.to_string(),
            state: Some(ContainerState {
                running: Some(ContainerStateRunning::default()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    pub fn pod(
        namespace: &str,
        name: &str,
        created: Option<DateTime<Utc>>,
        restart_policy: &str,
        statuses: Vec<ContainerStatus>,
    ) -> Pod {
        Pod {
            metadata: ObjectMeta {
                namespace: Some(namespace.to_string()),
                name: Some(name.to_string()),
                creation_timestamp: created.map(Time),
                ..Default::default()
            },
            spec: Some(PodSpec {
                restart_policy: Some(restart_policy.to_string()),
                ..Default::default()
            }),
            status: Some(PodStatus {
                container_statuses: Some(statuses),
                ..Default::default()
            }),
        }
    }

    pub fn resources_with(pods: Vec<Pod>) -> ResourcesMap {
        let mut instances = InstanceMap::new();
        for pod in pods {
            let key = format!(
                "{}/{}",
                pod.metadata.namespace.clone().unwrap_or_default(),
                pod.metadata.name.clone().unwrap_or_default()
            );
            instances.insert(key, pod.into());
        }
        let mut resources = ResourcesMap::new();
        resources.insert(PODS.to_string(), instances);
        resources
    }
}
