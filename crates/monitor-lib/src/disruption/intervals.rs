//! Disruption intervals from recorded began/ended transitions

use crate::monitor::IntervalCreator;
use crate::monitorapi::{locator_keys, reasons, Interval, Locator, ResourcesMap};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

fn is_began(interval: &Interval) -> bool {
    matches!(
        interval.message().reason(),
        Some(reasons::DISRUPTION_BEGAN) | Some(reasons::DISRUPTION_SAMPLER_OUTAGE_BEGAN)
    )
}

fn is_ended(interval: &Interval) -> bool {
    interval.message().has_reason(reasons::DISRUPTION_ENDED)
}

/// Pair disruption transitions per backend locator.
///
/// Each interval carries the condition of the transition that opened it. A
/// repeated begin with the same message extends the open interval; a begin
/// with a different message closes it and opens another. Disruptions still
/// open at the end of the window are closed at `to`.
pub fn create_disruption_intervals(events: &[Interval], to: DateTime<Utc>) -> Vec<Interval> {
    let mut by_locator: BTreeMap<&Locator, Vec<&Interval>> = BTreeMap::new();
    for event in events {
        if event.locator().get(locator_keys::BACKEND_DISRUPTION_NAME).is_none() {
            continue;
        }
        if is_began(event) || is_ended(event) {
            by_locator.entry(event.locator()).or_default().push(event);
        }
    }

    let mut out = Vec::new();
    for transitions in by_locator.into_values() {
        let mut open: Option<&Interval> = None;
        for event in transitions {
            if is_ended(event) {
                if let Some(began) = open.take() {
                    out.push(Interval::new(began.condition.clone(), began.from, event.from));
                }
                continue;
            }
            match open {
                Some(began) if began.message() == event.message() => {}
                Some(began) => {
                    out.push(Interval::new(began.condition.clone(), began.from, event.from));
                    open = Some(event);
                }
                None => open = Some(event),
            }
        }
        if let Some(began) = open {
            out.push(Interval::new(began.condition.clone(), began.from, to.max(began.from)));
        }
    }
    out
}

/// Derives disruption intervals for the monitor
#[derive(Debug, Default, Clone, Copy)]
pub struct DisruptionIntervalCreator;

impl IntervalCreator for DisruptionIntervalCreator {
    fn create_intervals(
        &self,
        events: &[Interval],
        _resources: &ResourcesMap,
        _from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Vec<Interval> {
        create_disruption_intervals(events, to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disruption::messages::{disruption_began, disruption_ended, disruption_locator, BackendConnectionType};
    use crate::monitorapi::{Condition, Level};
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn began(locator: &Locator, error: &str, secs: i64) -> Interval {
        let t = disruption_began(locator, BackendConnectionType::New, error);
        Interval::instant(Condition::new(t.level, locator.clone(), t.message), at(secs))
    }

    fn ended(locator: &Locator, secs: i64) -> Interval {
        let t = disruption_ended(locator, BackendConnectionType::New);
        Interval::instant(Condition::new(t.level, locator.clone(), t.message), at(secs))
    }

    #[test]
    fn test_began_and_ended_pair_into_interval() {
        let locator = disruption_locator("kube-api", BackendConnectionType::New);
        let events = vec![began(&locator, "connection refused", 10), ended(&locator, 14)];

        let intervals = create_disruption_intervals(&events, at(100));

        assert_eq!(intervals.len(), 1);
        assert_eq!(intervals[0].level(), Level::Error);
        assert_eq!(intervals[0].from, at(10));
        assert_eq!(intervals[0].to, at(14));
        assert_eq!(intervals[0].message().reason(), Some(reasons::DISRUPTION_BEGAN));
    }

    #[test]
    fn test_open_disruption_closes_at_window_end() {
        let locator = disruption_locator("ingress-console", BackendConnectionType::Reused);
        let intervals = create_disruption_intervals(&[began(&locator, "EOF", 90)], at(100));

        assert_eq!(intervals.len(), 1);
        assert_eq!(intervals[0].to, at(100));
    }

    #[test]
    fn test_reclassified_failure_splits_interval() {
        let locator = disruption_locator("kube-api", BackendConnectionType::New);
        let events = vec![
            began(&locator, "dial tcp: lookup api.example on 10.0.0.10:53: i/o timeout", 10),
            began(&locator, "dial tcp: lookup api.example on 10.0.0.10:53: i/o timeout", 11),
            began(&locator, "connection refused", 12),
            ended(&locator, 15),
        ];

        let intervals = create_disruption_intervals(&events, at(100));

        assert_eq!(intervals.len(), 2);
        assert_eq!(intervals[0].level(), Level::Warning);
        assert_eq!((intervals[0].from, intervals[0].to), (at(10), at(12)));
        assert_eq!(intervals[1].level(), Level::Error);
        assert_eq!((intervals[1].from, intervals[1].to), (at(12), at(15)));
    }

    #[test]
    fn test_unmatched_end_and_foreign_events_ignored() {
        let locator = disruption_locator("kube-api", BackendConnectionType::New);
        let events = vec![
            ended(&locator, 5),
            Interval::instant(Condition::info("ns/a pod/b uid/c", "reason/Created "), at(6)),
        ];
        assert!(create_disruption_intervals(&events, at(100)).is_empty());
    }

    #[test]
    fn test_backends_are_paired_independently() {
        let api = disruption_locator("kube-api", BackendConnectionType::New);
        let ingress = disruption_locator("ingress-console", BackendConnectionType::New);
        let events = vec![
            began(&api, "EOF", 1),
            began(&ingress, "EOF", 2),
            ended(&api, 3),
            ended(&ingress, 6),
        ];

        let intervals = create_disruption_intervals(&events, at(100));

        assert_eq!(intervals.len(), 2);
        let total: i64 = intervals.iter().map(|i| i.duration().num_seconds()).sum();
        assert_eq!(total, 2 + 4);
    }
}
