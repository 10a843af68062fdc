//! Gamification ledger: points, levels, achievements, rewards, leaderboard.
//!
//! ```text
//!   add_points ──► credit (level-lagged multiplier) ──► promote ──► unlock ──► leaderboard
//!                                                        │            │
//!                                                  LevelUp/Reward  Achievement
//! ```
//!
//! The ledger owns every `Participant`. Achievement predicates read the
//! participant plus a `SessionContext` handed in by the caller; the ledger never
//! reaches into the metrics engine itself.

pub mod catalog;
pub mod ledger;
pub mod participant;

use serde::{Deserialize, Serialize};

pub use catalog::{Achievement, AchievementCategory, Catalog, Requirement, Reward, RewardKind};
pub use ledger::{LeaderboardEntry, PointsOutcome, ScoringLedger, SessionStats};
pub use participant::{level_for, Participant, ParticipantStats};

/// Scored action categories, used as participant stat keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Comment,
    Like,
    Gift,
    Motion,
    Effect,
    Voice,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Comment => "comment",
            ActionKind::Like => "like",
            ActionKind::Gift => "gift",
            ActionKind::Motion => "motion",
            ActionKind::Effect => "effect",
            ActionKind::Voice => "voice",
        }
    }
}

/// Read-only view of session-wide state consulted by achievement predicates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionContext {
    pub viewer_count: u64,
    pub live_duration_ms: u64,
    /// Length of the current uninterrupted motion streak
    pub motion_streak_ms: u64,
}
