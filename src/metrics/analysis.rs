//! Trend and recommendation analysis over the sample history.
//!
//! All functions here are pure: they read series and the event log and return
//! values. `MetricsEngine::analyze` assembles them into an `AnalysisReport`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::series::TimeSeries;
use super::LoggedEvent;
use crate::engine::events::{Payload, Timestamp};

const HOUR_MS: u64 = 3_600_000;
const LONG_SESSION_MS: u64 = 2 * HOUR_MS;
const LOW_ENGAGEMENT_RATE: f64 = 5.0;
const SHRINKING_GROWTH_PCT: f64 = -10.0;
const BREAK_VIEWER_FLOOR: u64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeakHour {
    /// Hour of day, UTC
    pub hour: u32,
    pub average_viewers: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Performer {
    pub name: String,
    /// Comment count for commenters, summed gift value for gifters
    pub total: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopPerformers {
    pub top_commenters: Vec<Performer>,
    pub top_gifters: Vec<Performer>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationKind {
    Engagement,
    Growth,
    Timing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub kind: RecommendationKind,
    pub priority: Priority,
    pub message: String,
    pub action: String,
}

impl Recommendation {
    fn new(kind: RecommendationKind, priority: Priority, message: &str, action: &str) -> Self {
        Self {
            kind,
            priority,
            message: message.to_string(),
            action: action.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub timestamp: Timestamp,
    pub session_duration_ms: u64,
    /// Percent change of the recent viewer window over the one before it
    pub viewer_growth: f64,
    pub engagement_trend: Trend,
    pub peak_hours: Vec<PeakHour>,
    pub top_performers: TopPerformers,
    pub recommendations: Vec<Recommendation>,
}

// =============================================================================
// Calculations
// =============================================================================

/// Percent growth of the last `k` viewer samples over the `k` before them.
/// 0 until `2k` samples exist or when the older window averages zero.
pub fn viewer_growth(viewers: &TimeSeries, k: usize) -> f64 {
    let (Some(recent), Some(older)) = (viewers.window_mean(0, k), viewers.window_mean(k, k)) else {
        return 0.0;
    };
    if older > 0.0 {
        (recent - older) / older * 100.0
    } else {
        0.0
    }
}

/// Compare adjacent `window`-sample means of the engagement series against a
/// relative `band`. Stable until two full windows exist.
pub fn engagement_trend(engagement: &TimeSeries, window: usize, band: f64) -> Trend {
    let (Some(recent), Some(older)) = (
        engagement.window_mean(0, window),
        engagement.window_mean(window, window),
    ) else {
        return Trend::Stable;
    };
    if recent > older * (1.0 + band) {
        Trend::Increasing
    } else if recent < older * (1.0 - band) {
        Trend::Decreasing
    } else {
        Trend::Stable
    }
}

pub fn hour_of_day(ts: Timestamp) -> u32 {
    ((ts / HOUR_MS) % 24) as u32
}

/// Top `n` hours of day by mean viewers. Hours with no samples are skipped;
/// ties go to the earlier hour.
pub fn peak_hours(viewers: &TimeSeries, n: usize) -> Vec<PeakHour> {
    let mut sums = [0.0f64; 24];
    let mut counts = [0u64; 24];
    for p in viewers.iter() {
        let h = hour_of_day(p.timestamp) as usize;
        sums[h] += p.value;
        counts[h] += 1;
    }
    let mut hours: Vec<PeakHour> = (0..24)
        .filter(|&h| counts[h] > 0)
        .map(|h| PeakHour {
            hour: h as u32,
            average_viewers: sums[h] / counts[h] as f64,
        })
        .collect();
    hours.sort_by(|a, b| {
        b.average_viewers
            .total_cmp(&a.average_viewers)
            .then_with(|| a.hour.cmp(&b.hour))
    });
    hours.truncate(n);
    hours
}

/// Most active commenters (by count) and gifters (by summed value) in the event log.
pub fn top_performers<'a>(log: impl IntoIterator<Item = &'a LoggedEvent>, n: usize) -> TopPerformers {
    let mut commenters: HashMap<&str, u64> = HashMap::new();
    let mut gifters: HashMap<&str, u64> = HashMap::new();
    for entry in log {
        match &entry.payload {
            Payload::Comment { author, .. } => *commenters.entry(author.as_str()).or_insert(0) += 1,
            Payload::Gift { sender, value, .. } => {
                let total = gifters.entry(sender.as_str()).or_insert(0u64);
                *total = total.saturating_add(value.unwrap_or(1));
            }
            _ => {}
        }
    }
    TopPerformers {
        top_commenters: rank(commenters, n),
        top_gifters: rank(gifters, n),
    }
}

fn rank(totals: HashMap<&str, u64>, n: usize) -> Vec<Performer> {
    let mut ranked: Vec<Performer> = totals
        .into_iter()
        .map(|(name, total)| Performer {
            name: name.to_string(),
            total,
        })
        .collect();
    ranked.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.name.cmp(&b.name)));
    ranked.truncate(n);
    ranked
}

pub fn recommendations(
    engagement_rate: f64,
    viewer_growth: f64,
    session_duration_ms: u64,
    viewer_count: u64,
) -> Vec<Recommendation> {
    let mut out = Vec::new();
    if engagement_rate < LOW_ENGAGEMENT_RATE {
        out.push(Recommendation::new(
            RecommendationKind::Engagement,
            Priority::High,
            "Engagement is low. Try interacting more with the audience.",
            "increase_interaction",
        ));
    }
    if viewer_growth < SHRINKING_GROWTH_PCT {
        out.push(Recommendation::new(
            RecommendationKind::Growth,
            Priority::High,
            "Audience is shrinking. Consider changing content or schedule.",
            "content_strategy",
        ));
    }
    if session_duration_ms > LONG_SESSION_MS && viewer_count > BREAK_VIEWER_FLOOR {
        out.push(Recommendation::new(
            RecommendationKind::Timing,
            Priority::Medium,
            "Long session with a good audience. Consider taking a break.",
            "take_break",
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::events::Event;

    fn series(values: &[f64]) -> TimeSeries {
        let mut s = TimeSeries::new(3600);
        for (i, v) in values.iter().enumerate() {
            s.push(i as u64 * 1000, *v);
        }
        s
    }

    #[test]
    fn test_growth_needs_two_windows() {
        let s = series(&[10.0; 19]);
        assert_eq!(viewer_growth(&s, 10), 0.0);

        let mut values = vec![100.0; 10];
        values.extend(vec![80.0; 10]);
        let s = series(&values);
        assert!((viewer_growth(&s, 10) + 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_growth_zero_when_older_window_empty() {
        let mut values = vec![0.0; 10];
        values.extend(vec![5.0; 10]);
        assert_eq!(viewer_growth(&series(&values), 10), 0.0);
    }

    #[test]
    fn test_trend_band() {
        assert_eq!(engagement_trend(&series(&[1.0; 9]), 5, 0.1), Trend::Stable);

        let up = series(&[10.0, 10.0, 10.0, 10.0, 10.0, 12.0, 12.0, 12.0, 12.0, 12.0]);
        assert_eq!(engagement_trend(&up, 5, 0.1), Trend::Increasing);

        let flat = series(&[10.0, 10.0, 10.0, 10.0, 10.0, 10.5, 10.5, 10.5, 10.5, 10.5]);
        assert_eq!(engagement_trend(&flat, 5, 0.1), Trend::Stable);

        let down = series(&[10.0, 10.0, 10.0, 10.0, 10.0, 8.0, 8.0, 8.0, 8.0, 8.0]);
        assert_eq!(engagement_trend(&down, 5, 0.1), Trend::Decreasing);
    }

    #[test]
    fn test_peak_hours_only_sampled_hours() {
        let mut s = TimeSeries::new(100);
        s.push(2 * HOUR_MS, 10.0);
        s.push(2 * HOUR_MS + 1, 30.0);
        s.push(5 * HOUR_MS, 50.0);
        s.push(23 * HOUR_MS, 20.0);
        s.push(24 * HOUR_MS + 7, 20.0); // hour 0 of the next day
        let peaks = peak_hours(&s, 3);
        let hours: Vec<u32> = peaks.iter().map(|p| p.hour).collect();
        assert_eq!(hours, vec![5, 0, 2]);
        assert_eq!(peaks[2].average_viewers, 20.0);
    }

    #[test]
    fn test_top_performers() {
        let mk = |id: &str, payload: Payload| LoggedEvent::from(&Event::new(id, 0, payload));
        let comment = |author: &str| Payload::Comment {
            author: author.to_string(),
            text: "hi".to_string(),
        };
        let gift = |sender: &str, value: Option<u64>| Payload::Gift {
            sender: sender.to_string(),
            name: "Rose".to_string(),
            value,
        };
        let log = vec![
            mk("1", comment("ana")),
            mk("2", comment("bob")),
            mk("3", comment("bob")),
            mk("4", gift("ana", Some(100))),
            mk("5", gift("cid", None)),
            mk("6", gift("cid", Some(2))),
        ];
        let top = top_performers(&log, 5);
        assert_eq!(top.top_commenters[0].name, "bob");
        assert_eq!(top.top_commenters[0].total, 2);
        assert_eq!(top.top_gifters[0].name, "ana");
        assert_eq!(top.top_gifters[1].total, 3);

        let top1 = top_performers(&log, 1);
        assert_eq!(top1.top_commenters.len(), 1);
    }

    #[test]
    fn test_recommendation_rules() {
        let recs = recommendations(2.0, -15.0, 3 * HOUR_MS, 60);
        let actions: Vec<&str> = recs.iter().map(|r| r.action.as_str()).collect();
        assert_eq!(actions, vec!["increase_interaction", "content_strategy", "take_break"]);
        assert_eq!(recs[2].priority, Priority::Medium);

        assert!(recommendations(5.0, -10.0, 2 * HOUR_MS, 60).is_empty());
        assert!(recommendations(50.0, 0.0, 3 * HOUR_MS, 50).is_empty());
    }
}
