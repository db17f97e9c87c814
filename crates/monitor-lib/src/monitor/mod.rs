//! Recording and reconciling conditions during a test run
//!
//! This module provides:
//! - `Monitor`, the per-run recorder for instant events and sampled conditions
//! - The `Sampler`, `IntervalCreator` and `Recorder` seams used by producers
//!   and by the reconstruction layer

mod recorder;
mod sampling;


pub use recorder::{Monitor, MonitorBuilder, DEFAULT_SAMPLE_INTERVAL};

use crate::monitorapi::{Condition, Interval, RecordedResource, ResourcesMap};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// A periodic probe returning the conditions active at `at`.
///
/// Samplers run on every tick and must not block on I/O.
pub trait Sampler: Send + Sync {
    fn sample(&self, at: DateTime<Utc>) -> Vec<Condition>;
}

impl<F> Sampler for F
where
    F: Fn(DateTime<Utc>) -> Vec<Condition> + Send + Sync,
{
    fn sample(&self, at: DateTime<Utc>) -> Vec<Condition> {
        self(at)
    }
}

/// Derives additional intervals from the time sorted instant events of a run
pub trait IntervalCreator: Send + Sync {
    fn create_intervals(
        &self,
        events: &[Interval],
        resources: &ResourcesMap,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Vec<Interval>;
}

impl<F> IntervalCreator for F
where
    F: Fn(&[Interval], &ResourcesMap, DateTime<Utc>, DateTime<Utc>) -> Vec<Interval> + Send + Sync,
{
    fn create_intervals(
        &self,
        events: &[Interval],
        resources: &ResourcesMap,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Vec<Interval> {
        self(events, resources, from, to)
    }
}

/// Write side of the monitor, as seen by watchers and probes
pub trait Recorder: Send + Sync {
    fn record(&self, conditions: Vec<Condition>);
    fn record_at(&self, at: DateTime<Utc>, conditions: Vec<Condition>);
    fn record_resource(&self, kind: &str, key: &str, resource: RecordedResource);
    fn add_sampler(&self, sampler: Arc<dyn Sampler>);
}
