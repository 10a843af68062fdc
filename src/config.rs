//! Runtime configuration, read from the environment with in-code defaults.

use crate::scoring::ActionKind;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Participant credited when events are not attributed to their actor
    pub streamer_id: String,
    /// Credit comment authors and gift senders instead of the streamer
    pub attribute_to_actor: bool,
    pub points: ActionPoints,
    pub ledger: LedgerConfig,
    pub metrics: MetricsConfig,
    pub schedule: ScheduleConfig,
    pub sqlite_path: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            streamer_id: "streamer".to_string(),
            attribute_to_actor: false,
            points: ActionPoints::default(),
            ledger: LedgerConfig::default(),
            metrics: MetricsConfig::default(),
            schedule: ScheduleConfig::default(),
            sqlite_path: None,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            streamer_id: std::env::var("STREAMER_ID").unwrap_or(d.streamer_id),
            attribute_to_actor: std::env::var("ATTRIBUTE_TO_ACTOR")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(d.attribute_to_actor),
            points: ActionPoints::from_env(),
            ledger: LedgerConfig::from_env(),
            metrics: MetricsConfig::from_env(),
            schedule: ScheduleConfig::from_env(),
            sqlite_path: std::env::var("SQLITE_PATH").ok(),
        }
    }
}

/// Base points per action before the level multiplier. Gifts use their value.
#[derive(Debug, Clone)]
pub struct ActionPoints {
    pub comment: u64,
    pub like: u64,
    pub motion: u64,
    pub effect: u64,
    pub voice: u64,
}

impl Default for ActionPoints {
    fn default() -> Self {
        Self {
            comment: 5,
            like: 1,
            motion: 10,
            effect: 0,
            voice: 0,
        }
    }
}

impl ActionPoints {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            comment: std::env::var("POINTS_COMMENT").ok().and_then(|v| v.parse().ok()).unwrap_or(d.comment),
            like: std::env::var("POINTS_LIKE").ok().and_then(|v| v.parse().ok()).unwrap_or(d.like),
            motion: std::env::var("POINTS_MOTION").ok().and_then(|v| v.parse().ok()).unwrap_or(d.motion),
            effect: std::env::var("POINTS_EFFECT").ok().and_then(|v| v.parse().ok()).unwrap_or(d.effect),
            voice: std::env::var("POINTS_VOICE").ok().and_then(|v| v.parse().ok()).unwrap_or(d.voice),
        }
    }

    /// Flat base points for an action; `None` for gifts, which are valued per event.
    pub fn base_for(&self, action: ActionKind) -> Option<u64> {
        match action {
            ActionKind::Comment => Some(self.comment),
            ActionKind::Like => Some(self.like),
            ActionKind::Motion => Some(self.motion),
            ActionKind::Effect => Some(self.effect),
            ActionKind::Voice => Some(self.voice),
            ActionKind::Gift => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Per-unit decay (0.95 = lose 5% per unit, e.g. per hour)
    pub decay_factor: f64,
    /// Decay ticks per unit (60 = one tick per minute for an hourly factor)
    pub intervals_per_unit: f64,
    pub leaderboard_size: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            decay_factor: 0.95,
            intervals_per_unit: 60.0,
            leaderboard_size: 10,
        }
    }
}

impl LedgerConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            decay_factor: std::env::var("DECAY_FACTOR").ok().and_then(|v| v.parse().ok()).unwrap_or(d.decay_factor),
            intervals_per_unit: std::env::var("DECAY_INTERVALS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.intervals_per_unit),
            leaderboard_size: d.leaderboard_size,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Samples kept per series (3600 = one hour at 1 Hz)
    pub history_capacity: usize,
    pub event_log_capacity: usize,
    /// K in the viewer growth comparison (recent K vs preceding K)
    pub growth_window: usize,
    /// Samples per engagement trend window
    pub trend_window: usize,
    /// Relative band for a "stable" trend
    pub trend_band: f64,
    pub top_actors: usize,
    pub peak_hours: usize,
    /// Samples returned by the presentation snapshot
    pub recent_view: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            history_capacity: 3600,
            event_log_capacity: 1000,
            growth_window: 10,
            trend_window: 5,
            trend_band: 0.10,
            top_actors: 5,
            peak_hours: 3,
            recent_view: 60,
        }
    }
}

impl MetricsConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            history_capacity: std::env::var("HISTORY_CAPACITY").ok().and_then(|v| v.parse().ok()).unwrap_or(d.history_capacity),
            event_log_capacity: std::env::var("EVENT_LOG_CAPACITY").ok().and_then(|v| v.parse().ok()).unwrap_or(d.event_log_capacity),
            ..d
        }
    }
}

/// Intervals for periodic work, in milliseconds.
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    pub sample_ms: u64,
    pub milestone_ms: u64,
    pub decay_ms: u64,
    pub analysis_ms: u64,
    pub report_ms: u64,
    pub persist_ms: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            sample_ms: 1_000,
            milestone_ms: 30_000,
            decay_ms: 60_000,
            analysis_ms: 300_000,
            report_ms: 3_600_000,
            persist_ms: 300_000,
        }
    }
}

impl ScheduleConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            sample_ms: std::env::var("SAMPLE_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.sample_ms),
            milestone_ms: std::env::var("MILESTONE_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.milestone_ms),
            decay_ms: std::env::var("DECAY_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.decay_ms),
            analysis_ms: std::env::var("ANALYSIS_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.analysis_ms),
            report_ms: std::env::var("REPORT_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.report_ms),
            persist_ms: std::env::var("PERSIST_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(|secs| secs * 1000)
                .unwrap_or(d.persist_ms),
        }
    }
}
