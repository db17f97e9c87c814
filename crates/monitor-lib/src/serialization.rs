//! JSON artifacts written at the end of a run
//!
//! Intervals are persisted as `{"items": [...]}` with second precision RFC3339
//! timestamps and four-space indentation. Decoding and re-encoding a document
//! yields the same bytes.

use crate::error::{MonitorError, Result};
use crate::monitorapi::Interval;
use crate::verdict::TestResult;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

const INDENT: &[u8] = b"    ";

/// Serde adapter for RFC3339 timestamps truncated to whole seconds
pub mod rfc3339 {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(t: &DateTime<Utc>, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&t.to_rfc3339_opts(SecondsFormat::Secs, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|t| t.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct IntervalsDocument {
    items: Vec<Interval>,
}

fn to_pretty_json<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(INDENT);
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    value.serialize(&mut serializer)?;
    Ok(out)
}

/// Encode intervals in the order given
pub fn intervals_to_json(intervals: &[Interval]) -> Result<Vec<u8>> {
    to_pretty_json(&IntervalsDocument {
        items: intervals.to_vec(),
    })
}

pub fn intervals_from_json(data: &[u8]) -> Result<Vec<Interval>> {
    let document: IntervalsDocument = serde_json::from_slice(data)?;
    Ok(document.items)
}

fn write_artifact(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| MonitorError::Artifact {
            path: parent.display().to_string(),
            source,
        })?;
    }
    std::fs::write(path, data).map_err(|source| MonitorError::Artifact {
        path: path.display().to_string(),
        source,
    })
}

pub fn write_intervals_file(path: &Path, intervals: &[Interval]) -> Result<()> {
    write_artifact(path, &intervals_to_json(intervals)?)?;
    info!(path = %path.display(), intervals = intervals.len(), "Wrote interval artifact");
    Ok(())
}

pub fn write_results_file(path: &Path, results: &[TestResult]) -> Result<()> {
    write_artifact(path, &to_pretty_json(&results)?)?;
    info!(path = %path.display(), results = results.len(), "Wrote verdict results");
    Ok(())
}
