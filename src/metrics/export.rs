//! Session export in structured, JSON and CSV form.
//!
//! `SessionExport` is the only reconstructible format; CSV is a flat view of the
//! viewer history for spreadsheets.

use std::collections::HashMap;
use std::fmt::Write as _;

use chrono::{SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::milestones::Milestone;
use super::series::TimeSeriesPoint;
use super::{LoggedEvent, MetricSnapshot};
use crate::engine::events::Timestamp;
use crate::error::Result;

pub const CSV_HEADER: &str = "timestamp,viewer_count,total_likes,total_gifts,engagement_rate";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Record,
    Json,
    Csv,
}

impl ExportFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "record" | "object" => Some(ExportFormat::Record),
            "json" => Some(ExportFormat::Json),
            "csv" => Some(ExportFormat::Csv),
            _ => None,
        }
    }
}

/// What `export_snapshot` hands back.
#[derive(Debug, Clone)]
pub enum Exported {
    Record(Box<SessionExport>),
    Text(String),
}

impl Exported {
    pub fn into_text(self) -> Result<String> {
        match self {
            Exported::Text(text) => Ok(text),
            Exported::Record(record) => Ok(serde_json::to_string(&record)?),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionBounds {
    pub start: Timestamp,
    pub end: Timestamp,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct History {
    pub viewers: Vec<TimeSeriesPoint>,
    pub likes: Vec<TimeSeriesPoint>,
    pub gifts: Vec<TimeSeriesPoint>,
    pub comments: Vec<TimeSeriesPoint>,
    pub engagement: Vec<TimeSeriesPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionExport {
    pub session: SessionBounds,
    pub metrics: MetricSnapshot,
    pub events: Vec<LoggedEvent>,
    pub milestones: Vec<Milestone>,
    pub history: History,
}

impl SessionExport {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Hex SHA-256 of the compact JSON encoding.
    pub fn fingerprint(&self) -> Result<String> {
        Ok(fingerprint_of(&serde_json::to_vec(self)?))
    }

    /// One row per viewer sample; other columns are matched by timestamp and
    /// fall back to 0.
    pub fn to_csv(&self) -> String {
        let by_ts = |points: &[TimeSeriesPoint]| -> HashMap<Timestamp, f64> {
            points.iter().map(|p| (p.timestamp, p.value)).collect()
        };
        let likes = by_ts(&self.history.likes);
        let gifts = by_ts(&self.history.gifts);
        let engagement = by_ts(&self.history.engagement);

        let mut out = String::from(CSV_HEADER);
        for p in &self.history.viewers {
            let _ = write!(
                out,
                "\n{},{},{},{},{:.2}",
                iso8601(p.timestamp),
                p.value as u64,
                likes.get(&p.timestamp).copied().unwrap_or(0.0) as u64,
                gifts.get(&p.timestamp).copied().unwrap_or(0.0) as u64,
                engagement.get(&p.timestamp).copied().unwrap_or(0.0),
            );
        }
        out
    }
}

pub fn fingerprint_of(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// `2024-01-01T00:00:00.000Z`
pub fn iso8601(ts: Timestamp) -> String {
    match Utc.timestamp_millis_opt(ts as i64).single() {
        Some(dt) => dt.to_rfc3339_opts(SecondsFormat::Millis, true),
        None => ts.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(timestamp: Timestamp, value: f64) -> TimeSeriesPoint {
        TimeSeriesPoint { timestamp, value }
    }

    fn sample_export() -> SessionExport {
        SessionExport {
            session: SessionBounds {
                start: 0,
                end: 2_000,
                duration_ms: 2_000,
            },
            metrics: MetricSnapshot::default(),
            events: Vec::new(),
            milestones: Vec::new(),
            history: History {
                viewers: vec![point(0, 10.0), point(1_000, 12.0)],
                likes: vec![point(0, 3.0), point(1_000, 4.0)],
                gifts: vec![point(0, 1.0)],
                comments: vec![point(0, 0.0), point(1_000, 0.0)],
                engagement: vec![point(0, 40.0), point(1_000, 41.75)],
            },
        }
    }

    #[test]
    fn test_csv_layout() {
        let csv = sample_export().to_csv();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(lines[1], "1970-01-01T00:00:00.000Z,10,3,1,40.00");
        assert_eq!(lines[2], "1970-01-01T00:00:01.000Z,12,4,0,41.75");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_json_round_trip_and_fingerprint() {
        let export = sample_export();
        let text = export.to_json_pretty().unwrap();
        let back = SessionExport::from_json(&text).unwrap();
        assert_eq!(back, export);
        assert_eq!(back.fingerprint().unwrap(), export.fingerprint().unwrap());
        assert_eq!(export.fingerprint().unwrap().len(), 64);
    }

    #[test]
    fn test_format_parse() {
        assert_eq!(ExportFormat::parse("CSV"), Some(ExportFormat::Csv));
        assert_eq!(ExportFormat::parse("json"), Some(ExportFormat::Json));
        assert_eq!(ExportFormat::parse("xml"), None);
    }
}
