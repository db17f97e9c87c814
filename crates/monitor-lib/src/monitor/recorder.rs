//! The in-memory recorder for one test run
//!
//! All producers append to buffers guarded by a single mutex. Readers copy
//! the buffer handles under the lock and do the sorting and merging outside
//! of it.

use super::sampling::{filter_events, filter_samples, merge_events};
use super::{IntervalCreator, Recorder, Sampler};
use crate::monitorapi::{sort_intervals, Condition, Event, Interval, RecordedResource, ResourcesMap, Sample};
use crate::observability::MonitorMetrics;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::{debug, info, warn};

/// Default sampling period
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Default)]
struct MonitorState {
    samplers: Vec<Arc<dyn Sampler>>,
    interval_creators: Vec<Arc<dyn IntervalCreator>>,
    /// Events recorded at "now", in call order
    events: Vec<Arc<Event>>,
    /// Events recorded with caller supplied times, sorted on read
    unsorted_events: Vec<Arc<Event>>,
    samples: Vec<Arc<Sample>>,
    resources: ResourcesMap,
    /// Whether the last stored sample had any conditions
    previous_sample_active: bool,
}

/// Handles copied out of the monitor under the lock
struct Snapshot {
    samples: Vec<Arc<Sample>>,
    events: Vec<Arc<Event>>,
    unsorted_events: Vec<Arc<Event>>,
    interval_creators: Vec<Arc<dyn IntervalCreator>>,
    resources: ResourcesMap,
}

/// Records events and samples conditions for the lifetime of a test run
pub struct Monitor {
    interval: Duration,
    state: Mutex<MonitorState>,
    metrics: MonitorMetrics,
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new()
    }
}

impl Monitor {
    /// Create a monitor with the default 15 second sampling period
    pub fn new() -> Self {
        Self::with_interval(DEFAULT_SAMPLE_INTERVAL)
    }

    /// Create a monitor sampling at the given period. A zero period disables sampling.
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            state: Mutex::new(MonitorState::default()),
            metrics: MonitorMetrics::new(),
        }
    }

    pub fn builder() -> MonitorBuilder {
        MonitorBuilder::new()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Recorded data must survive a panicking producer, so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, MonitorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a sampler that runs on every tick
    pub fn add_sampler(&self, sampler: Arc<dyn Sampler>) {
        self.lock().samplers.push(sampler);
    }

    /// Register a function that derives extra intervals from the recorded events
    pub fn add_interval_creator(&self, creator: Arc<dyn IntervalCreator>) {
        self.lock().interval_creators.push(creator);
    }

    /// Record conditions as events at the current time, in call order
    pub fn record(&self, conditions: Vec<Condition>) {
        if conditions.is_empty() {
            return;
        }
        let count = conditions.len();
        {
            let mut state = self.lock();
            let at = Utc::now();
            state
                .events
                .extend(conditions.into_iter().map(|condition| Arc::new(Event { at, condition })));
        }
        self.metrics.add_events_recorded(count);
    }

    /// Record conditions observed at a caller supplied time
    pub fn record_at(&self, at: DateTime<Utc>, conditions: Vec<Condition>) {
        if conditions.is_empty() {
            return;
        }
        let count = conditions.len();
        {
            let mut state = self.lock();
            state
                .unsorted_events
                .extend(conditions.into_iter().map(|condition| Arc::new(Event { at, condition })));
        }
        self.metrics.add_events_recorded(count);
    }

    /// Store the latest observed state of a resource, keyed by `namespace/name`
    pub fn record_resource(&self, kind: &str, key: &str, resource: RecordedResource) {
        self.lock()
            .resources
            .entry(kind.to_string())
            .or_default()
            .insert(key.to_string(), resource);
    }

    pub fn current_resource_state(&self) -> ResourcesMap {
        self.lock().resources.clone()
    }

    /// Start the sampling loop. Samples every period and once more on shutdown.
    ///
    /// Returns `None` when sampling is disabled.
    pub fn start_sampling(
        self: &Arc<Self>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Option<JoinHandle<()>> {
        if self.interval.is_zero() {
            debug!("Sampling disabled, interval is zero");
            return None;
        }

        let monitor = Arc::clone(self);
        Some(tokio::spawn(async move {
            info!(
                interval_ms = monitor.interval.as_millis() as u64,
                "Starting condition sampling"
            );
            let mut ticker = interval_at(Instant::now() + monitor.interval, monitor.interval);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        monitor.sample_now();
                    }
                    _ = shutdown.recv() => {
                        monitor.sample_now();
                        info!("Stopped condition sampling");
                        break;
                    }
                }
            }
        }))
    }

    /// Run every sampler once and store the result.
    ///
    /// Empty ticks are only stored right after a non-empty one, so the
    /// interval that just ended is closed without filling memory with nothing.
    pub fn sample_now(&self) {
        let samplers = self.lock().samplers.clone();

        let now = Utc::now();
        let conditions: Vec<Condition> = samplers.iter().flat_map(|s| s.sample(now)).collect();

        let mut state = self.lock();
        if conditions.is_empty() && !state.previous_sample_active {
            return;
        }
        state.previous_sample_active = !conditions.is_empty();
        state.samples.push(Arc::new(Sample {
            at: Utc::now(),
            conditions,
        }));
        drop(state);

        self.metrics.inc_samples_recorded();
    }

    #[cfg(test)]
    pub(crate) fn sample_count(&self) -> usize {
        self.lock().samples.len()
    }

    fn snapshot(&self) -> Snapshot {
        let state = self.lock();
        Snapshot {
            samples: state.samples.clone(),
            events: state.events.clone(),
            unsorted_events: state.unsorted_events.clone(),
            interval_creators: state.interval_creators.clone(),
            resources: state.resources.clone(),
        }
    }

    /// Sampled conditions between `from` and `to`, coalesced into intervals
    pub fn conditions(&self, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Vec<Interval> {
        let snapshot = self.snapshot();
        filter_samples(&snapshot.samples, from, to)
    }

    /// Every recorded event, sampled condition and derived interval between
    /// `from` and `to` (`None` is unbounded), ordered by from, to, message.
    pub fn event_intervals(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Vec<Interval> {
        let snapshot = self.snapshot();

        let mut intervals = filter_samples(&snapshot.samples, from, to);

        let ordered = filter_events(&snapshot.events, from, to);
        for pair in ordered.windows(2) {
            if pair[0].at > pair[1].at {
                warn!(
                    previous_at = %pair[0].at,
                    previous_locator = %pair[0].condition.locator,
                    at = %pair[1].at,
                    locator = %pair[1].condition.locator,
                    "Recorded event is out of order"
                );
                self.metrics.inc_out_of_order_events();
            }
        }

        let instants: Vec<Interval> = merge_events(ordered, filter_events(&snapshot.unsorted_events, from, to))
            .into_iter()
            .map(|event| Interval::instant(event.condition.clone(), event.at))
            .collect();

        let window_start = from
            .or_else(|| instants.first().map(|i| i.from))
            .unwrap_or_else(Utc::now);
        let window_end = to.unwrap_or_else(Utc::now).max(window_start);

        for creator in &snapshot.interval_creators {
            let created = creator.create_intervals(&instants, &snapshot.resources, window_start, window_end);
            self.metrics.add_intervals_constructed(created.len());
            intervals.extend(created);
        }

        intervals.extend(instants);
        sort_intervals(&mut intervals);
        intervals
    }
}

impl Recorder for Monitor {
    fn record(&self, conditions: Vec<Condition>) {
        Monitor::record(self, conditions)
    }

    fn record_at(&self, at: DateTime<Utc>, conditions: Vec<Condition>) {
        Monitor::record_at(self, at, conditions)
    }

    fn record_resource(&self, kind: &str, key: &str, resource: RecordedResource) {
        Monitor::record_resource(self, kind, key, resource)
    }

    fn add_sampler(&self, sampler: Arc<dyn Sampler>) {
        Monitor::add_sampler(self, sampler)
    }
}

/// Builder for a monitor with its samplers and interval creators
pub struct MonitorBuilder {
    interval: Duration,
    samplers: Vec<Arc<dyn Sampler>>,
    interval_creators: Vec<Arc<dyn IntervalCreator>>,
}

impl MonitorBuilder {
    pub fn new() -> Self {
        Self {
            interval: DEFAULT_SAMPLE_INTERVAL,
            samplers: Vec::new(),
            interval_creators: Vec::new(),
        }
    }

    /// Set the sampling period
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn sampler(mut self, sampler: Arc<dyn Sampler>) -> Self {
        self.samplers.push(sampler);
        self
    }

    pub fn interval_creator(mut self, creator: Arc<dyn IntervalCreator>) -> Self {
        self.interval_creators.push(creator);
        self
    }

    pub fn build(self) -> Arc<Monitor> {
        let monitor = Monitor::with_interval(self.interval);
        {
            let mut state = monitor.lock();
            state.samplers = self.samplers;
            state.interval_creators = self.interval_creators;
        }
        Arc::new(monitor)
    }
}

impl Default for MonitorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
