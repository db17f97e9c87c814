//! Interval reconstruction from sparse instant events
//!
//! This module provides:
//! - The `TimeBounder` chain used to bound entities whose first or last
//!   transition was never observed
//! - Pod lifecycle, container lifecycle and container readiness intervals
//! - `PodIntervalCreator`, which plugs reconstruction into the monitor
//! - One second intervals from known warning lines in etcd and
//!   kube-apiserver pod logs

mod bounder;
mod pod;
mod podlogs;


pub use bounder::{
    ContainerLifecycleBounder, ContainerReadinessBounder, PodLifecycleBounder, TimeBounder,
    TransitionMap, WindowBounder,
};
pub use pod::{
    build_transitions_for_category, create_pod_intervals_from_instants, pod_lifecycle_cmp,
    sanitize_time,
};
pub use podlogs::{
    intervals_from_pod_logs, record_pod_logs, LogLineFormat, PodLogIntervalGenerator, PodLogSource,
    SubStringLevel,
};

use crate::monitor::IntervalCreator;
use crate::monitorapi::{Interval, ResourcesMap};
use chrono::{DateTime, Utc};

/// Derives pod and container lifecycle intervals for the monitor
#[derive(Debug, Default, Clone, Copy)]
pub struct PodIntervalCreator;

impl IntervalCreator for PodIntervalCreator {
    fn create_intervals(
        &self,
        events: &[Interval],
        resources: &ResourcesMap,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Vec<Interval> {
        create_pod_intervals_from_instants(events, resources, from, to)
    }
}
