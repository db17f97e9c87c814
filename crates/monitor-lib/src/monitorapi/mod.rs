//! Shared vocabulary for everything the monitor records
//!
//! Levels, locators, messages, and the condition/event/interval value types,
//! plus the recorded resource snapshot consulted during reconstruction.

mod locator;
mod message;
mod resources;
mod types;

pub use locator::{keys as locator_keys, ContainerReference, Locator, LocatorBuilder, PodReference};
pub use message::{annotations, reasons, Message, MessageBuilder};
pub use resources::{
    container_statuses, final_termination_time, init_container_statuses, pod_creation_time,
    pod_restart_policy, recorded_pod, InstanceMap, RecordedResource, ResourcesMap, PODS,
};
pub use types::{
    filter_intervals, for_locator, interval_strings, is_error, sort_intervals, Condition, Event, Interval,
    Level, Sample,
};

#[cfg(test)]
pub(crate) use resources::fixtures;
