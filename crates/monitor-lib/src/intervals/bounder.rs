//! Time bounds for reconstructed intervals
//!
//! Watches start late and events get dropped, so the first and last observed
//! transition of an entity is not always its real start or end. Bounders
//! answer "when could this entity have started/ended" and fall back to their
//! delegate when they know nothing better:
//!
//! readiness -> container lifecycle -> pod lifecycle -> test window

use crate::monitorapi::{
    container_statuses, final_termination_time, init_container_statuses, pod_creation_time,
    pod_restart_policy, reasons, ContainerReference, InstanceMap, Interval, Locator, PodReference,
};
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{ContainerStatus, Pod};
use std::collections::BTreeMap;

/// Instant events grouped by canonical pod or container locator, in time order
pub type TransitionMap = BTreeMap<Locator, Vec<Interval>>;

/// Earliest and latest time an interval about an entity may cover
pub trait TimeBounder {
    fn start_time(&self, locator: &Locator) -> DateTime<Utc>;
    fn end_time(&self, locator: &Locator) -> DateTime<Utc>;
}

/// The overall test window
#[derive(Debug, Clone, Copy)]
pub struct WindowBounder {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl WindowBounder {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }
}

impl TimeBounder for WindowBounder {
    fn start_time(&self, _locator: &Locator) -> DateTime<Utc> {
        self.start
    }

    fn end_time(&self, _locator: &Locator) -> DateTime<Utc> {
        self.end
    }
}

fn first_with_reason(events: Option<&Vec<Interval>>, reason: &str) -> Option<DateTime<Utc>> {
    events?
        .iter()
        .find(|e| e.message().has_reason(reason))
        .map(|e| e.from)
}

fn last_with_reason(events: Option<&Vec<Interval>>, reason: &str) -> Option<DateTime<Utc>> {
    events?
        .iter()
        .rev()
        .find(|e| e.message().has_reason(reason))
        .map(|e| e.from)
}

fn lookup_pod<'a>(recorded_pods: Option<&'a InstanceMap>, pod: &PodReference) -> Option<&'a Pod> {
    recorded_pods?.get(&pod.namespaced_name())?.as_pod()
}

/// Bounds a pod by its recorded creation time, run-once completion, or
/// observed `Created`/`Deleted` events
pub struct PodLifecycleBounder<'a> {
    delegate: &'a dyn TimeBounder,
    transitions: &'a TransitionMap,
    recorded_pods: Option<&'a InstanceMap>,
}

impl<'a> PodLifecycleBounder<'a> {
    pub fn new(
        delegate: &'a dyn TimeBounder,
        transitions: &'a TransitionMap,
        recorded_pods: Option<&'a InstanceMap>,
    ) -> Self {
        Self {
            delegate,
            transitions,
            recorded_pods,
        }
    }

    fn creation_time(&self, pod: &PodReference) -> Option<DateTime<Utc>> {
        lookup_pod(self.recorded_pods, pod).and_then(pod_creation_time)
    }

    /// A pod that never restarts is logically gone once its last container
    /// terminated, whether or not the object was deleted yet.
    fn run_once_end(&self, pod: &PodReference) -> Option<DateTime<Utc>> {
        let recorded = lookup_pod(self.recorded_pods, pod)?;
        if pod_restart_policy(recorded) != Some("Never") {
            return None;
        }
        let main = container_statuses(recorded);
        if main.is_empty() {
            return None;
        }

        let mut latest: Option<DateTime<Utc>> = None;
        for status in main.iter().chain(init_container_statuses(recorded)) {
            let finished = terminated_at(status)?;
            latest = latest.max(finished);
        }
        latest
    }
}

/// Finish time of a terminated container; `None` if it is not terminated
fn terminated_at(status: &ContainerStatus) -> Option<Option<DateTime<Utc>>> {
    let terminated = status.state.as_ref()?.terminated.as_ref()?;
    Some(terminated.finished_at.as_ref().map(|t| t.0))
}

impl TimeBounder for PodLifecycleBounder<'_> {
    fn start_time(&self, locator: &Locator) -> DateTime<Utc> {
        let pod = PodReference::from_locator(locator);
        if let Some(created) = self.creation_time(&pod) {
            return created;
        }
        let key = pod.to_locator();
        first_with_reason(self.transitions.get(&key), reasons::POD_CREATED)
            .unwrap_or_else(|| self.delegate.start_time(&key))
    }

    fn end_time(&self, locator: &Locator) -> DateTime<Utc> {
        let pod = PodReference::from_locator(locator);
        if let Some(finished) = self.run_once_end(&pod) {
            return finished;
        }
        let key = pod.to_locator();
        first_with_reason(self.transitions.get(&key), reasons::POD_DELETED)
            .unwrap_or_else(|| self.delegate.end_time(&key))
    }
}

/// Bounds a container by its recorded final termination, or observed
/// `ContainerWait`/`ContainerExit` events
pub struct ContainerLifecycleBounder<'a> {
    delegate: &'a dyn TimeBounder,
    transitions: &'a TransitionMap,
    recorded_pods: Option<&'a InstanceMap>,
}

impl<'a> ContainerLifecycleBounder<'a> {
    pub fn new(
        delegate: &'a dyn TimeBounder,
        transitions: &'a TransitionMap,
        recorded_pods: Option<&'a InstanceMap>,
    ) -> Self {
        Self {
            delegate,
            transitions,
            recorded_pods,
        }
    }

    /// The recorded status wins over observed exits, which may have been dropped
    fn recorded_end(&self, container: &ContainerReference) -> Option<DateTime<Utc>> {
        let recorded = lookup_pod(self.recorded_pods, &container.pod)?;
        let status = container_statuses(recorded)
            .iter()
            .find(|s| s.name == container.container_name)
            .or_else(|| {
                init_container_statuses(recorded)
                    .iter()
                    .find(|s| s.name == container.container_name)
            })?;
        final_termination_time(status)
    }
}

impl TimeBounder for ContainerLifecycleBounder<'_> {
    fn start_time(&self, locator: &Locator) -> DateTime<Utc> {
        let key = ContainerReference::from_locator(locator).to_locator();
        first_with_reason(self.transitions.get(&key), reasons::CONTAINER_WAIT)
            .unwrap_or_else(|| self.delegate.start_time(&key))
    }

    fn end_time(&self, locator: &Locator) -> DateTime<Utc> {
        let container = ContainerReference::from_locator(locator);
        if let Some(finished) = self.recorded_end(&container) {
            return finished;
        }
        let key = container.to_locator();
        last_with_reason(self.transitions.get(&key), reasons::CONTAINER_EXIT)
            .unwrap_or_else(|| self.delegate.end_time(&key))
    }
}

/// A container can only become ready once it started running
pub struct ContainerReadinessBounder<'a> {
    delegate: &'a dyn TimeBounder,
    lifecycle_transitions: &'a TransitionMap,
}

impl<'a> ContainerReadinessBounder<'a> {
    pub fn new(delegate: &'a dyn TimeBounder, lifecycle_transitions: &'a TransitionMap) -> Self {
        Self {
            delegate,
            lifecycle_transitions,
        }
    }
}

impl TimeBounder for ContainerReadinessBounder<'_> {
    fn start_time(&self, locator: &Locator) -> DateTime<Utc> {
        let key = ContainerReference::from_locator(locator).to_locator();
        first_with_reason(self.lifecycle_transitions.get(&key), reasons::CONTAINER_START)
            .unwrap_or_else(|| self.delegate.start_time(&key))
    }

    fn end_time(&self, locator: &Locator) -> DateTime<Utc> {
        self.delegate.end_time(locator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitorapi::fixtures::{pod, resources_with, running, terminated};
    use crate::monitorapi::{Condition, PODS};
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2022, 3, 14, h, m, 0).unwrap()
    }

    fn window() -> WindowBounder {
        WindowBounder::new(at(12, 0), at(23, 0))
    }

    fn container_locator() -> Locator {
        Locator::container("ns1", "p1", "node1", "uid1", "app")
    }

    #[test]
    fn test_window_bounder() {
        let bounder = window();
        assert_eq!(bounder.start_time(&Locator::new("anything")), at(12, 0));
        assert_eq!(bounder.end_time(&Locator::new("anything")), at(23, 0));
    }

    #[test]
    fn test_pod_bounder_prefers_recorded_creation() {
        let key = PodReference::from_locator(&container_locator()).to_locator();
        let mut transitions = TransitionMap::new();
        transitions.insert(
            key.clone(),
            vec![Interval::instant(
                Condition::info(key.clone(), "reason/Created "),
                at(13, 0),
            )],
        );
        let resources = resources_with(vec![pod("ns1", "p1", Some(at(12, 30)), "Always", vec![])]);
        let base = window();

        let with_record = PodLifecycleBounder::new(&base, &transitions, resources.get(PODS));
        assert_eq!(with_record.start_time(&container_locator()), at(12, 30));

        let without_record = PodLifecycleBounder::new(&base, &transitions, None);
        assert_eq!(without_record.start_time(&container_locator()), at(13, 0));
        assert_eq!(without_record.end_time(&container_locator()), at(23, 0));
    }

    #[test]
    fn test_pod_bounder_run_once_end() {
        let transitions = TransitionMap::new();
        let base = window();

        let finished = resources_with(vec![pod(
            "ns1",
            "p1",
            None,
            "Never",
            vec![terminated("a", at(14, 0)), terminated("b", at(15, 0))],
        )]);
        let bounder = PodLifecycleBounder::new(&base, &transitions, finished.get(PODS));
        assert_eq!(bounder.end_time(&container_locator()), at(15, 0));

        let still_running = resources_with(vec![pod(
            "ns1",
            "p1",
            None,
            "Never",
            vec![terminated("a", at(14, 0)), running("b")],
        )]);
        let bounder = PodLifecycleBounder::new(&base, &transitions, still_running.get(PODS));
        assert_eq!(bounder.end_time(&container_locator()), at(23, 0));

        let restarting = resources_with(vec![pod(
            "ns1",
            "p1",
            None,
            "Always",
            vec![terminated("a", at(14, 0))],
        )]);
        let bounder = PodLifecycleBounder::new(&base, &transitions, restarting.get(PODS));
        assert_eq!(bounder.end_time(&container_locator()), at(23, 0));
    }

    #[test]
    fn test_container_bounder_recorded_termination_wins() {
        let key = container_locator();
        let canonical = ContainerReference::from_locator(&key).to_locator();
        let mut transitions = TransitionMap::new();
        transitions.insert(
            canonical.clone(),
            vec![Interval::instant(
                Condition::info(canonical.clone(), "reason/ContainerExit code/0"),
                at(18, 0),
            )],
        );
        let base = window();
        let pods = TransitionMap::new();
        let pod_bounder = PodLifecycleBounder::new(&base, &pods, None);

        let observed_only = ContainerLifecycleBounder::new(&pod_bounder, &transitions, None);
        assert_eq!(observed_only.end_time(&key), at(18, 0));

        let resources = resources_with(vec![pod(
            "ns1",
            "p1",
            None,
            "Always",
            vec![terminated("app", at(17, 0))],
        )]);
        let recorded = ContainerLifecycleBounder::new(&pod_bounder, &transitions, resources.get(PODS));
        assert_eq!(recorded.end_time(&key), at(17, 0));
    }

    #[test]
    fn test_readiness_starts_with_container_start() {
        let key = container_locator();
        let canonical = ContainerReference::from_locator(&key).to_locator();
        let mut lifecycle = TransitionMap::new();
        lifecycle.insert(
            canonical.clone(),
            vec![Interval::instant(
                Condition::info(canonical.clone(), "reason/ContainerStart cause/"),
                at(16, 0),
            )],
        );
        let base = window();
        let readiness = ContainerReadinessBounder::new(&base, &lifecycle);

        assert_eq!(readiness.start_time(&key), at(16, 0));
        assert_eq!(readiness.end_time(&key), at(23, 0));
    }
}
