//! Pod, container and readiness intervals from instant events

use super::bounder::{
    ContainerLifecycleBounder, ContainerReadinessBounder, PodLifecycleBounder, TimeBounder,
    TransitionMap, WindowBounder,
};
use crate::monitorapi::{
    reasons, sort_intervals, Condition, ContainerReference, Interval, Level, Message,
    PodReference, ResourcesMap, PODS,
};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use tracing::debug;

/// Event ordering used before reconstruction.
///
/// By time, with `Created` before `Scheduled` when they share a timestamp,
/// then by end time and message.
pub fn pod_lifecycle_cmp(lhs: &Interval, rhs: &Interval) -> Ordering {
    lhs.from
        .cmp(&rhs.from)
        .then_with(|| {
            match (lhs.message().reason(), rhs.message().reason()) {
                (Some(reasons::POD_CREATED), Some(reasons::POD_SCHEDULED)) => Ordering::Less,
                (Some(reasons::POD_SCHEDULED), Some(reasons::POD_CREATED)) => Ordering::Greater,
                _ => Ordering::Equal,
            }
        })
        .then_with(|| lhs.to.cmp(&rhs.to))
        .then_with(|| lhs.message().cmp(rhs.message()))
}

/// Turn instant pod and container events into lifecycle intervals.
///
/// Events are grouped by the canonical pod or container locator (without the
/// node, which is not consistently assigned). Events whose locator does not
/// identify a pod are ignored.
pub fn create_pod_intervals_from_instants(
    input: &[Interval],
    resources: &ResourcesMap,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<Interval> {
    let mut events: Vec<&Interval> = input.iter().collect();
    events.sort_by(|a, b| pod_lifecycle_cmp(a, b));

    let mut pod_transitions = TransitionMap::new();
    let mut container_lifecycle = TransitionMap::new();
    let mut container_readiness = TransitionMap::new();

    for event in events {
        let pod = PodReference::from_locator(event.locator());
        if pod.is_empty() {
            continue;
        }
        let Some(reason) = event.message().reason() else {
            continue;
        };
        let container = ContainerReference::from_locator(event.locator());

        let (target, key) = if container.is_empty() {
            if !reasons::POD_LIFECYCLE_TRANSITIONS.contains(&reason) {
                continue;
            }
            (&mut pod_transitions, pod.to_locator())
        } else if reasons::CONTAINER_LIFECYCLE_TRANSITIONS.contains(&reason) {
            (&mut container_lifecycle, container.to_locator())
        } else if reasons::CONTAINER_READINESS_TRANSITIONS.contains(&reason) {
            (&mut container_readiness, container.to_locator())
        } else {
            continue;
        };
        target.entry(key).or_default().push(event.clone());
    }

    debug!(
        pods = pod_transitions.len(),
        containers = container_lifecycle.len(),
        readiness = container_readiness.len(),
        "Reconstructing pod intervals"
    );

    let recorded_pods = resources.get(PODS);
    let window = WindowBounder::new(start, end);
    let pod_bounder = PodLifecycleBounder::new(&window, &pod_transitions, recorded_pods);
    let container_bounder =
        ContainerLifecycleBounder::new(&pod_bounder, &container_lifecycle, recorded_pods);
    let readiness_bounder = ContainerReadinessBounder::new(&container_bounder, &container_lifecycle);

    let mut intervals = build_transitions_for_category(
        &pod_transitions,
        reasons::POD_CREATED,
        Some(reasons::POD_DELETED),
        &pod_bounder,
        (start, end),
    );
    intervals.extend(build_transitions_for_category(
        &container_lifecycle,
        reasons::CONTAINER_WAIT,
        Some(reasons::CONTAINER_EXIT),
        &container_bounder,
        (start, end),
    ));
    intervals.extend(build_transitions_for_category(
        &container_readiness,
        reasons::CONTAINER_NOT_READY,
        None,
        &readiness_bounder,
        (start, end),
    ));

    sort_intervals(&mut intervals);
    intervals
}

/// The transition currently open for a locator
struct OpenTransition {
    message: Option<Message>,
    from: DateTime<Utc>,
}

impl OpenTransition {
    fn closed(at: DateTime<Utc>) -> Self {
        Self { message: None, from: at }
    }
}

/// Walk each locator's transitions in order and emit the interval between
/// consecutive transitions.
///
/// The first transition of a locator opens an interval if it is
/// `start_reason`; any other first transition means the start was missed and
/// yields a `missed real` interval from the bounded start. `end_reason`
/// closes the open interval. A transition still open after the last event
/// runs to the bounded end. Every interval is clamped to the locator's bounds
/// and to `window`.
pub fn build_transitions_for_category(
    transitions: &TransitionMap,
    start_reason: &str,
    end_reason: Option<&str>,
    bounder: &dyn TimeBounder,
    window: (DateTime<Utc>, DateTime<Utc>),
) -> Vec<Interval> {
    let mut intervals = Vec::new();

    for (locator, events) in transitions {
        let (lo, hi) = (window.0, window.1.max(window.0));
        let start = bounder.start_time(locator).clamp(lo, hi);
        let end = bounder.end_time(locator).clamp(lo, hi);
        let mut open = OpenTransition::closed(bounder.start_time(locator));

        for event in events {
            let reason = event.message().reason().unwrap_or_default();
            let span = sanitize_time(
                Interval::new(
                    Condition::new(Level::Info, locator.clone(), Message::default()),
                    open.from,
                    event.from,
                ),
                start,
                end,
            );

            let message = match &open.message {
                None if reason == start_reason => {
                    // Opening: keep the clamped start but take the event's message
                    open = OpenTransition {
                        message: Some(event.message().clone()),
                        from: span.from,
                    };
                    continue;
                }
                None => missed_start(start_reason),
                Some(previous) => previous.constructed(),
            };

            open = if Some(reason) == end_reason {
                OpenTransition::closed(event.from)
            } else {
                OpenTransition {
                    message: Some(event.message().clone()),
                    from: event.from,
                }
            };
            intervals.push(Interval {
                condition: Condition::new(Level::Info, locator.clone(), message),
                ..span
            });
        }

        if let Some(previous) = open.message {
            intervals.push(sanitize_time(
                Interval::new(
                    Condition::new(Level::Info, locator.clone(), previous.constructed()),
                    open.from,
                    bounder.end_time(locator),
                ),
                start,
                end,
            ));
        }
    }

    intervals
}

fn missed_start(start_reason: &str) -> Message {
    Message::reasoned(start_reason, format!("missed real \"{}\"", start_reason)).constructed()
}

/// Clamp `to` into `[start, end]` and `from` up to `start`; if that leaves
/// `to` before `from`, `from` is pulled back to `to`. When `start` is after
/// `end` the result collapses onto `end`.
pub fn sanitize_time(mut interval: Interval, start: DateTime<Utc>, end: DateTime<Utc>) -> Interval {
    interval.to = interval.to.min(end).max(start.min(end));
    if interval.from < start {
        interval.from = start;
    }
    if interval.to < interval.from {
        interval.from = interval.to;
    }
    interval
}
