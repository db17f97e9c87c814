//! Monitor library for cluster test runs
//!
//! This crate provides the core functionality for:
//! - Recording instant events and sampled conditions during a run
//! - Reconstructing pod and container lifecycle intervals
//! - Sampling backend availability into disruption intervals
//! - Threshold and availability verdicts over the recorded timeline
//! - Interval artifacts and observability

pub mod disruption;
pub mod error;
pub mod intervals;
pub mod monitor;
pub mod monitorapi;
pub mod observability;
pub mod serialization;
pub mod verdict;

pub use error::{MonitorError, ProbeError, Result};
pub use monitor::{IntervalCreator, Monitor, MonitorBuilder, Recorder, Sampler};
pub use monitorapi::{Condition, Event, Interval, Level, Locator, Message, Sample};
pub use observability::{MonitorMetrics, StructuredLogger};
pub use verdict::{TestResult, TestVerdict, Verdict};
