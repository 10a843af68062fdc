//! Session analytics: counters, bounded history, milestones, analysis, export.
//!
//! ```text
//!   track_event / set_viewer_count ──► counters ──► milestones (eager)
//!   collect_sample (1 Hz)          ──► ring buffers + engagement rate
//!   analyze / hourly_report        ──► AnalysisReport / HourlyReport signals
//! ```
//!
//! The engine owns its state exclusively; the ledger only ever sees the
//! `SessionContext` value derived from it.

pub mod analysis;
pub mod export;
pub mod milestones;
pub mod series;

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::clock::SharedClock;
use crate::config::MetricsConfig;
use crate::engine::events::{Event, EventId, EventKind, Payload, Timestamp};
use crate::engine::signals::{emit, SharedSink, Signal};
use crate::error::{EngineError, Result};
use crate::logging::{log, log_milestone, obj, v_num, Domain, Level};
use crate::scoring::SessionContext;

use analysis::AnalysisReport;
use export::{ExportFormat, Exported, History, SessionBounds, SessionExport};
use milestones::{Milestone, MilestoneMetric, MilestoneSet};
use series::{TimeSeries, TimeSeriesPoint};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSnapshot {
    pub viewer_count: u64,
    pub peak_viewers: u64,
    pub total_likes: u64,
    pub total_gifts: u64,
    pub total_comments: u64,
    pub total_shares: u64,
    pub total_follows: u64,
    pub total_joins: u64,
    /// `100 * (likes + gifts + comments) / max(viewers, 1)` as of the last sample
    pub engagement_rate: f64,
}

impl MetricSnapshot {
    fn milestone_value(&self, metric: MilestoneMetric) -> u64 {
        match metric {
            MilestoneMetric::Viewers => self.viewer_count,
            MilestoneMetric::Likes => self.total_likes,
            MilestoneMetric::Gifts => self.total_gifts,
            MilestoneMetric::Comments => self.total_comments,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggedEvent {
    pub id: EventId,
    pub kind: EventKind,
    pub payload: Payload,
    pub timestamp: Timestamp,
}

impl From<&Event> for LoggedEvent {
    fn from(e: &Event) -> Self {
        Self {
            id: e.id.clone(),
            kind: e.kind(),
            payload: e.payload.clone(),
            timestamp: e.timestamp,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HourlyReport {
    pub timestamp: Timestamp,
    pub session_duration_ms: u64,
    pub metrics: MetricSnapshot,
    pub milestones: Vec<Milestone>,
    pub analysis: AnalysisReport,
}

/// Presentation view: current values plus a short history tail.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsView {
    pub current: MetricSnapshot,
    pub session_duration_ms: u64,
    pub peak_viewers: u64,
    pub viewer_history: Vec<TimeSeriesPoint>,
    pub engagement_history: Vec<TimeSeriesPoint>,
    pub milestones: Vec<Milestone>,
}

pub struct MetricsEngine {
    cfg: MetricsConfig,
    clock: SharedClock,
    sink: SharedSink,
    metrics: MetricSnapshot,
    viewers: TimeSeries,
    likes: TimeSeries,
    gifts: TimeSeries,
    comments: TimeSeries,
    engagement: TimeSeries,
    event_log: VecDeque<LoggedEvent>,
    milestones: MilestoneSet,
    session_start: Timestamp,
    /// First and latest timestamp of the current uninterrupted motion run
    motion_streak: Option<(Timestamp, Timestamp)>,
}

impl MetricsEngine {
    pub fn new(cfg: MetricsConfig, clock: SharedClock, sink: SharedSink) -> Self {
        let cap = cfg.history_capacity;
        let session_start = clock.now_ms();
        Self {
            viewers: TimeSeries::new(cap),
            likes: TimeSeries::new(cap),
            gifts: TimeSeries::new(cap),
            comments: TimeSeries::new(cap),
            engagement: TimeSeries::new(cap),
            event_log: VecDeque::with_capacity(cfg.event_log_capacity.min(4096)),
            milestones: MilestoneSet::standard(),
            metrics: MetricSnapshot::default(),
            session_start,
            motion_streak: None,
            cfg,
            clock,
            sink,
        }
    }

    pub fn with_milestones(mut self, milestones: MilestoneSet) -> Self {
        self.milestones = milestones;
        self
    }

    // =========================================================================
    // Ingestion
    // =========================================================================

    /// Fold an event into the counters. Viewer-count events update the gauge;
    /// everything else is also appended to the bounded event log.
    pub fn track_event(&mut self, event: &Event) {
        let touched = match &event.payload {
            Payload::ViewerCount { count } => {
                self.set_viewer_count(*count);
                return;
            }
            Payload::Like { count } => {
                self.metrics.total_likes = self.metrics.total_likes.saturating_add(count.unwrap_or(1));
                Some(MilestoneMetric::Likes)
            }
            Payload::Gift { value, .. } => {
                self.metrics.total_gifts = self.metrics.total_gifts.saturating_add(value.unwrap_or(1));
                Some(MilestoneMetric::Gifts)
            }
            Payload::Comment { .. } => {
                self.metrics.total_comments += 1;
                Some(MilestoneMetric::Comments)
            }
            Payload::Share { .. } => {
                self.metrics.total_shares += 1;
                None
            }
            Payload::Follow { .. } => {
                self.metrics.total_follows += 1;
                None
            }
            Payload::Join { .. } => {
                self.metrics.total_joins += 1;
                None
            }
            Payload::Motion { has_motion, .. } => {
                self.track_motion(*has_motion, event.timestamp);
                None
            }
            Payload::EffectUsed { .. } | Payload::VoiceUsed { .. } => None,
        };

        if self.event_log.len() >= self.cfg.event_log_capacity.max(1) {
            self.event_log.pop_front();
        }
        self.event_log.push_back(LoggedEvent::from(event));

        if let Some(metric) = touched {
            let value = self.metrics.milestone_value(metric);
            let now = self.clock.now_ms();
            let hit = self.milestones.evaluate(metric, value, now);
            self.announce(hit);
        }
    }

    fn track_motion(&mut self, has_motion: bool, at: Timestamp) {
        self.motion_streak = match (has_motion, self.motion_streak) {
            (false, _) => None,
            (true, None) => Some((at, at)),
            (true, Some((start, last))) => Some((start, last.max(at))),
        };
    }

    /// Update the viewer gauge; a new peak emits `PeakViewers`.
    pub fn set_viewer_count(&mut self, count: u64) {
        let now = self.clock.now_ms();
        self.metrics.viewer_count = count;
        if count > self.metrics.peak_viewers {
            self.metrics.peak_viewers = count;
            emit(self.sink.as_ref(), Signal::PeakViewers { count, timestamp: now });
        }
        let hit = self.milestones.evaluate(MilestoneMetric::Viewers, count, now);
        self.announce(hit);
    }

    // =========================================================================
    // Periodic work
    // =========================================================================

    /// Append one sample to every series under a single timestamp.
    pub fn collect_sample(&mut self) {
        let ts = self.clock.now_ms();
        let m = &mut self.metrics;
        let interactions = m
            .total_likes
            .saturating_add(m.total_gifts)
            .saturating_add(m.total_comments);
        m.engagement_rate = 100.0 * interactions as f64 / m.viewer_count.max(1) as f64;

        self.viewers.push(ts, m.viewer_count as f64);
        self.likes.push(ts, m.total_likes as f64);
        self.gifts.push(ts, m.total_gifts as f64);
        self.comments.push(ts, m.total_comments as f64);
        self.engagement.push(ts, m.engagement_rate);
    }

    /// Sweep every unachieved milestone against the current counters.
    pub fn check_milestones(&mut self) -> Vec<Milestone> {
        let now = self.clock.now_ms();
        let metrics = &self.metrics;
        let hit = self.milestones.sweep(|m| metrics.milestone_value(m), now);
        self.announce(hit.clone());
        hit
    }

    fn announce(&self, hit: Vec<Milestone>) {
        for m in hit {
            let achieved_at = m.achieved_at.unwrap_or_default();
            log_milestone(m.metric.as_str(), m.threshold, achieved_at);
            emit(
                self.sink.as_ref(),
                Signal::MilestoneAchieved {
                    metric: m.metric,
                    threshold: m.threshold,
                    achieved_at,
                },
            );
        }
    }

    pub fn analyze(&self) -> Result<AnalysisReport> {
        let report = self.build_analysis()?;
        log(
            Level::Info,
            Domain::Metrics,
            "analysis_complete",
            obj(&[
                ("viewer_growth", v_num(report.viewer_growth)),
                ("recommendations", serde_json::json!(report.recommendations.len())),
            ]),
        );
        emit(self.sink.as_ref(), Signal::AnalysisComplete(Box::new(report.clone())));
        Ok(report)
    }

    fn build_analysis(&self) -> Result<AnalysisReport> {
        if self.viewers.is_empty() {
            return Err(EngineError::NotInitialized("no samples collected yet"));
        }
        let now = self.clock.now_ms();
        let session_duration_ms = now.saturating_sub(self.session_start);
        let viewer_growth = analysis::viewer_growth(&self.viewers, self.cfg.growth_window);
        Ok(AnalysisReport {
            timestamp: now,
            session_duration_ms,
            viewer_growth,
            engagement_trend: analysis::engagement_trend(
                &self.engagement,
                self.cfg.trend_window,
                self.cfg.trend_band,
            ),
            peak_hours: analysis::peak_hours(&self.viewers, self.cfg.peak_hours),
            top_performers: analysis::top_performers(self.event_log.iter(), self.cfg.top_actors),
            recommendations: analysis::recommendations(
                self.metrics.engagement_rate,
                viewer_growth,
                session_duration_ms,
                self.metrics.viewer_count,
            ),
        })
    }

    pub fn hourly_report(&self) -> Result<HourlyReport> {
        let analysis = self.build_analysis()?;
        let report = HourlyReport {
            timestamp: analysis.timestamp,
            session_duration_ms: analysis.session_duration_ms,
            metrics: self.metrics.clone(),
            milestones: self.milestones.achieved(),
            analysis,
        };
        emit(self.sink.as_ref(), Signal::HourlyReport(Box::new(report.clone())));
        Ok(report)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn metrics(&self) -> &MetricSnapshot {
        &self.metrics
    }

    pub fn session_start(&self) -> Timestamp {
        self.session_start
    }

    pub fn session_duration_ms(&self) -> u64 {
        self.clock.now_ms().saturating_sub(self.session_start)
    }

    pub fn motion_streak_ms(&self) -> u64 {
        self.motion_streak.map(|(start, last)| last - start).unwrap_or(0)
    }

    /// Read-only view handed to achievement predicates.
    pub fn session_context(&self) -> SessionContext {
        SessionContext {
            viewer_count: self.metrics.viewer_count,
            live_duration_ms: self.session_duration_ms(),
            motion_streak_ms: self.motion_streak_ms(),
        }
    }

    pub fn viewers(&self) -> &TimeSeries {
        &self.viewers
    }

    pub fn engagement(&self) -> &TimeSeries {
        &self.engagement
    }

    pub fn event_log(&self) -> impl Iterator<Item = &LoggedEvent> {
        self.event_log.iter()
    }

    pub fn achieved_milestones(&self) -> Vec<Milestone> {
        self.milestones.achieved()
    }

    pub fn milestones(&self) -> &[Milestone] {
        self.milestones.all()
    }

    pub fn snapshot(&self) -> AnalyticsView {
        AnalyticsView {
            current: self.metrics.clone(),
            session_duration_ms: self.session_duration_ms(),
            peak_viewers: self.metrics.peak_viewers,
            viewer_history: self.viewers.recent(self.cfg.recent_view),
            engagement_history: self.engagement.recent(self.cfg.recent_view),
            milestones: self.milestones.achieved(),
        }
    }

    // =========================================================================
    // Export / restore / reset
    // =========================================================================

    pub fn export(&self) -> SessionExport {
        let now = self.clock.now_ms();
        let points = |s: &TimeSeries| s.iter().copied().collect::<Vec<_>>();
        SessionExport {
            session: SessionBounds {
                start: self.session_start,
                end: now,
                duration_ms: now.saturating_sub(self.session_start),
            },
            metrics: self.metrics.clone(),
            events: self.event_log.iter().cloned().collect(),
            milestones: self.milestones.all().to_vec(),
            history: History {
                viewers: points(&self.viewers),
                likes: points(&self.likes),
                gifts: points(&self.gifts),
                comments: points(&self.comments),
                engagement: points(&self.engagement),
            },
        }
    }

    pub fn export_snapshot(&self, format: ExportFormat) -> Result<Exported> {
        let export = self.export();
        Ok(match format {
            ExportFormat::Record => Exported::Record(Box::new(export)),
            ExportFormat::Json => Exported::Text(export.to_json_pretty()?),
            ExportFormat::Csv => Exported::Text(export.to_csv()),
        })
    }

    /// Replace all state with a previously exported session.
    pub fn restore(&mut self, export: &SessionExport) {
        let cap = self.cfg.history_capacity;
        let h = &export.history;
        self.metrics = export.metrics.clone();
        self.viewers = TimeSeries::from_points(cap, h.viewers.iter().copied());
        self.likes = TimeSeries::from_points(cap, h.likes.iter().copied());
        self.gifts = TimeSeries::from_points(cap, h.gifts.iter().copied());
        self.comments = TimeSeries::from_points(cap, h.comments.iter().copied());
        self.engagement = TimeSeries::from_points(cap, h.engagement.iter().copied());

        let keep = self.cfg.event_log_capacity.max(1);
        let skip = export.events.len().saturating_sub(keep);
        self.event_log = export.events.iter().skip(skip).cloned().collect();
        self.milestones = MilestoneSet::from_milestones(export.milestones.clone());
        self.session_start = export.session.start;
        self.motion_streak = None;

        log(
            Level::Info,
            Domain::Metrics,
            "restored",
            obj(&[
                ("samples", serde_json::json!(self.viewers.len())),
                ("events", serde_json::json!(self.event_log.len())),
            ]),
        );
    }

    /// Zero counters, clear history and the event log, reset milestones.
    pub fn reset_session(&mut self) {
        self.metrics = MetricSnapshot::default();
        for s in [
            &mut self.viewers,
            &mut self.likes,
            &mut self.gifts,
            &mut self.comments,
            &mut self.engagement,
        ] {
            s.clear();
        }
        self.event_log.clear();
        self.milestones.reset();
        self.motion_streak = None;
        self.session_start = self.clock.now_ms();
    }
}
