//! Coalescing samples into intervals and merging event buffers

use crate::monitorapi::{Condition, Event, Interval, Sample};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

fn in_window(at: DateTime<Utc>, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> bool {
    from.map_or(true, |from| at >= from) && to.map_or(true, |to| at <= to)
}

/// Expand samples in `[from, to]` into intervals.
///
/// A condition reported by consecutive samples extends the interval it
/// already has; a condition that skips a sample starts a new one.
pub(crate) fn filter_samples(
    samples: &[Arc<Sample>],
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> Vec<Interval> {
    let mut intervals: Vec<Interval> = Vec::with_capacity(samples.len() * 2);
    let mut active: HashMap<&Condition, usize> = HashMap::new();

    for sample in samples.iter().filter(|s| in_window(s.at, from, to)) {
        let mut next_active: HashMap<&Condition, usize> = HashMap::with_capacity(sample.conditions.len());

        for condition in &sample.conditions {
            if next_active.contains_key(condition) {
                continue;
            }
            if let Some(&index) = active.get(condition) {
                intervals[index].to = sample.at;
                next_active.insert(condition, index);
                continue;
            }
            intervals.push(Interval::instant(condition.clone(), sample.at));
            next_active.insert(condition, intervals.len() - 1);
        }

        active = next_active;
    }
    intervals
}

/// Events in `[from, to]`, keeping buffer order
pub(crate) fn filter_events(
    events: &[Arc<Event>],
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> Vec<Arc<Event>> {
    if from.is_none() && to.is_none() {
        return events.to_vec();
    }
    events
        .iter()
        .filter(|e| in_window(e.at, from, to))
        .cloned()
        .collect()
}

/// Merge event lists into one list sorted by time.
///
/// The sort is stable, so events recorded by one call keep their call order.
pub(crate) fn merge_events(ordered: Vec<Arc<Event>>, unsorted: Vec<Arc<Event>>) -> Vec<Arc<Event>> {
    let mut merged = ordered;
    merged.extend(unsorted);
    merged.sort_by_key(|e| e.at);
    merged
}
