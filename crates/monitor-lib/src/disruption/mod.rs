//! Backend disruption sampling and availability verdicts
//!
//! This module provides:
//! - `DisruptionSampler`, probing one backend per task and recording
//!   began/ended transitions on the monitor
//! - `DisruptionIntervalCreator`, pairing those transitions into intervals
//! - Availability tests comparing observed disruption against allowed budgets

mod availability;
mod intervals;
mod messages;
mod probe;
mod sampler;

pub use availability::{
    backend_disruption_seconds, backend_name, is_disruption_interval, round_to_second,
    test_all_backends_for_disruption, test_backend_both_connections,
    test_multiple_single_second_disruptions, test_server_availability, AllowedDisruption,
    AllowedDisruptionSource, AvailabilityContext, BackendFilter, JobType,
    StaticAllowedDisruption, NEARLY_ZERO_SINGLE_SECOND_LIMIT, REASONABLY_FEW_SINGLE_SECOND_LIMIT,
};
pub use intervals::{create_disruption_intervals, DisruptionIntervalCreator};
pub use messages::{
    disruption_began, disruption_ended, disruption_locator, is_dns_lookup_timeout,
    BackendConnectionType, DisruptionTransition, DNS_LOOKUP_PATTERN,
};
pub use probe::{BackendProbe, HttpProbe};
pub use sampler::{BackendConfig, DisruptionSampler};
