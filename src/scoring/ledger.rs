use std::collections::HashMap;

use serde::Serialize;

use super::catalog::{Achievement, Catalog, Reward};
use super::participant::{level_for, GrantedReward, Participant, ParticipantStats};
use super::{ActionKind, SessionContext};
use crate::clock::SharedClock;
use crate::config::LedgerConfig;
use crate::engine::events::Timestamp;
use crate::engine::signals::{emit, SharedSink, Signal};
use crate::error::{EngineError, Result};
use crate::logging::{log_achievement, log_decay, log_level_up};

/// Result of a single `add_points` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PointsOutcome {
    pub awarded_points: u64,
    pub total_points: u64,
    pub level: u32,
    pub leveled_up: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub participant_id: String,
    pub points: u64,
    pub level: u32,
    pub achievements: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub session_duration_ms: u64,
    pub total_points: u64,
    pub active_participants: usize,
    pub top_participant: Option<LeaderboardEntry>,
    pub achievements_unlocked: usize,
}

pub struct ScoringLedger {
    cfg: LedgerConfig,
    catalog: Catalog,
    participants: HashMap<String, Participant>,
    /// Derived from `participants`; refreshed after every mutation
    leaderboard: Vec<LeaderboardEntry>,
    /// Sum of awarded (multiplied) points; achievement bonuses excluded
    total_points: u64,
    session_start: Timestamp,
    clock: SharedClock,
    sink: SharedSink,
}

impl ScoringLedger {
    /// Ledger with an empty catalog.
    pub fn new(mut cfg: LedgerConfig, clock: SharedClock, sink: SharedSink) -> Self {
        if !(cfg.intervals_per_unit > 0.0) {
            cfg.intervals_per_unit = 1.0;
        }
        let session_start = clock.now_ms();
        Self {
            cfg,
            catalog: Catalog::new(),
            participants: HashMap::new(),
            leaderboard: Vec::new(),
            total_points: 0,
            session_start,
            clock,
            sink,
        }
    }

    pub fn with_catalog(cfg: LedgerConfig, catalog: Catalog, clock: SharedClock, sink: SharedSink) -> Self {
        let mut ledger = Self::new(cfg, clock, sink);
        ledger.catalog = catalog;
        ledger
    }

    pub fn with_default_catalog(cfg: LedgerConfig, clock: SharedClock, sink: SharedSink) -> Self {
        Self::with_catalog(cfg, Catalog::standard(), clock, sink)
    }

    // =========================================================================
    // Catalog setup
    // =========================================================================

    pub fn register_achievement(&mut self, achievement: Achievement) -> Result<()> {
        self.catalog.register_achievement(achievement)
    }

    pub fn register_reward(&mut self, level: u32, reward: Reward) -> Result<()> {
        self.catalog.register_reward(level, reward)
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Credit `base_points` for `action` to a participant, creating it on first
    /// sight. The multiplier uses the level held before this award.
    pub fn add_points(
        &mut self,
        participant_id: &str,
        action: ActionKind,
        base_points: u64,
        ctx: &SessionContext,
    ) -> PointsOutcome {
        let now = self.clock.now_ms();
        let catalog = &self.catalog;
        let participant = self
            .participants
            .entry(participant_id.to_string())
            .or_insert_with(|| Participant::new(participant_id, now));

        let old_level = participant.level;
        let awarded = multiplied(base_points, old_level);

        participant.points = participant.points.saturating_add(awarded);
        participant.total_points_ever = participant.total_points_ever.saturating_add(awarded);
        let stat = participant.stats.entry(action).or_insert(0);
        *stat = stat.saturating_add(1);
        participant.last_activity_at = now;
        self.total_points = self.total_points.saturating_add(awarded);

        let mut signals = Vec::new();
        promote(participant, catalog, now, &mut signals);
        if unlock_achievements(participant, catalog, ctx, &mut signals) > 0 {
            promote(participant, catalog, now, &mut signals);
        }

        let outcome = PointsOutcome {
            awarded_points: awarded,
            total_points: participant.points,
            level: participant.level,
            leveled_up: participant.level > old_level,
        };
        signals.push(Signal::PointsAdded {
            participant_id: participant_id.to_string(),
            action,
            points: awarded,
            total_points: outcome.total_points,
            level: outcome.level,
        });

        self.refresh_leaderboard();
        for signal in signals {
            emit(self.sink.as_ref(), signal);
        }
        outcome
    }

    /// Apply one decay interval: `points *= decay_factor^(1/intervals_per_unit)`.
    /// Levels are left where they are.
    pub fn apply_decay(&mut self, decay_factor: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&decay_factor) {
            return Err(EngineError::invalid(
                "decay",
                format!("factor {} outside [0, 1]", decay_factor),
            ));
        }
        let factor = decay_factor.powf(1.0 / self.cfg.intervals_per_unit);
        for participant in self.participants.values_mut() {
            // f64 rounding above 2^53 can land one past the input
            let decayed = (participant.points as f64 * factor).floor() as u64;
            participant.points = decayed.min(participant.points);
        }
        self.total_points = self
            .participants
            .values()
            .fold(0u64, |acc, p| acc.saturating_add(p.points));
        self.refresh_leaderboard();
        log_decay(factor, self.participants.len(), self.total_points);
        Ok(())
    }

    /// Decay with the configured per-unit factor.
    pub fn decay(&mut self) -> Result<()> {
        self.apply_decay(self.cfg.decay_factor)
    }

    /// Zero session progress for everyone; the catalog is kept.
    pub fn reset_session(&mut self) {
        for participant in self.participants.values_mut() {
            participant.reset_session();
        }
        self.total_points = 0;
        self.session_start = self.clock.now_ms();
        self.refresh_leaderboard();
    }

    /// Forget all participants.
    pub fn clear(&mut self) {
        self.participants.clear();
        self.leaderboard.clear();
        self.total_points = 0;
        self.session_start = self.clock.now_ms();
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn leaderboard(&self) -> &[LeaderboardEntry] {
        &self.leaderboard
    }

    /// Never creates the participant.
    pub fn participant(&self, id: &str) -> Option<&Participant> {
        self.participants.get(id)
    }

    pub fn participant_stats(&self, id: &str) -> Option<ParticipantStats> {
        self.participants.get(id).map(ParticipantStats::from)
    }

    pub fn participants(&self) -> impl Iterator<Item = &Participant> {
        self.participants.values()
    }

    pub fn total_points(&self) -> u64 {
        self.total_points
    }

    pub fn session_start(&self) -> Timestamp {
        self.session_start
    }

    pub fn achievements_unlocked(&self) -> usize {
        self.participants.values().map(|p| p.achievements.len()).sum()
    }

    pub fn session_stats(&self) -> SessionStats {
        SessionStats {
            session_duration_ms: self.clock.now_ms().saturating_sub(self.session_start),
            total_points: self.total_points,
            active_participants: self.participants.len(),
            top_participant: self.leaderboard.first().cloned(),
            achievements_unlocked: self.achievements_unlocked(),
        }
    }

    fn refresh_leaderboard(&mut self) {
        let order = |a: &&Participant, b: &&Participant| b.points.cmp(&a.points).then_with(|| a.id.cmp(&b.id));
        let size = self.cfg.leaderboard_size;
        let mut ranked: Vec<&Participant> = self.participants.values().collect();
        if size == 0 {
            ranked.clear();
        } else if ranked.len() > size {
            ranked.select_nth_unstable_by(size - 1, order);
            ranked.truncate(size);
        }
        ranked.sort_by(order);
        self.leaderboard = ranked
            .into_iter()
            .enumerate()
            .map(|(i, p)| LeaderboardEntry {
                rank: i + 1,
                participant_id: p.id.clone(),
                points: p.points,
                level: p.level,
                achievements: p.achievements.iter().cloned().collect(),
            })
            .collect();
    }
}

/// `floor(base * (1 + level * 0.1))` in integers, saturating at `u64::MAX`.
fn multiplied(base: u64, level: u32) -> u64 {
    let scaled = base as u128 * (10 + level as u128) / 10;
    u64::try_from(scaled).unwrap_or(u64::MAX)
}

/// Raise the level to match points. Only the exact new level's reward is
/// granted; levels jumped over in one step get nothing.
fn promote(participant: &mut Participant, catalog: &Catalog, now: Timestamp, signals: &mut Vec<Signal>) {
    let old_level = participant.level;
    let new_level = level_for(participant.points);
    if new_level <= old_level {
        return;
    }
    participant.level = new_level;

    let reward = catalog
        .reward_for(new_level)
        .filter(|_| !participant.has_reward_for(new_level))
        .cloned();
    if let Some(reward) = &reward {
        participant.rewards.push(GrantedReward {
            level: new_level,
            reward: reward.clone(),
            granted_at: now,
        });
        signals.push(Signal::RewardGranted {
            participant_id: participant.id.clone(),
            level: new_level,
            reward: reward.clone(),
        });
    }

    log_level_up(
        &participant.id,
        old_level,
        new_level,
        reward.as_ref().map(|r| r.name.as_str()),
    );
    signals.push(Signal::LevelUp {
        participant_id: participant.id.clone(),
        old_level,
        new_level,
        reward,
    });
}

/// Unlock every newly qualifying achievement in declaration order; returns the bonus paid.
fn unlock_achievements(
    participant: &mut Participant,
    catalog: &Catalog,
    ctx: &SessionContext,
    signals: &mut Vec<Signal>,
) -> u64 {
    let mut bonus = 0;
    for achievement in catalog.achievements() {
        if participant.achievements.contains(&achievement.id) {
            continue;
        }
        if !achievement.qualifies(participant, ctx) {
            continue;
        }
        participant.achievements.insert(achievement.id.clone());
        participant.points = participant.points.saturating_add(achievement.points);
        participant.total_points_ever = participant.total_points_ever.saturating_add(achievement.points);
        bonus += achievement.points;

        log_achievement(&participant.id, &achievement.id, achievement.points);
        signals.push(Signal::AchievementUnlocked {
            participant_id: participant.id.clone(),
            achievement_id: achievement.id.clone(),
            name: achievement.name.clone(),
            points: achievement.points,
        });
    }
    bonus
}
