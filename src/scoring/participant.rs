use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::catalog::Reward;
use super::ActionKind;
use crate::engine::events::Timestamp;

/// `floor(sqrt(points / 100)) + 1`, computed in integers.
pub fn level_for(points: u64) -> u32 {
    isqrt(points / 100) as u32 + 1
}

/// Points at which `level` starts.
pub fn level_floor(level: u32) -> u64 {
    let steps = level.saturating_sub(1) as u64;
    steps.saturating_mul(steps).saturating_mul(100)
}

fn isqrt(n: u64) -> u64 {
    let mut r = (n as f64).sqrt() as u64;
    while r * r > n {
        r -= 1;
    }
    while (r + 1) * (r + 1) <= n {
        r += 1;
    }
    r
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantedReward {
    pub level: u32,
    pub reward: Reward,
    pub granted_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: String,
    /// Spendable session points; decays
    pub points: u64,
    /// Lifetime credit; never decays or resets
    pub total_points_ever: u64,
    pub level: u32,
    pub achievements: BTreeSet<String>,
    pub rewards: Vec<GrantedReward>,
    pub stats: BTreeMap<ActionKind, u64>,
    pub joined_at: Timestamp,
    pub last_activity_at: Timestamp,
}

impl Participant {
    pub fn new(id: &str, now: Timestamp) -> Self {
        Self {
            id: id.to_string(),
            points: 0,
            total_points_ever: 0,
            level: 1,
            achievements: BTreeSet::new(),
            rewards: Vec::new(),
            stats: BTreeMap::new(),
            joined_at: now,
            last_activity_at: now,
        }
    }

    pub fn stat(&self, action: ActionKind) -> u64 {
        self.stats.get(&action).copied().unwrap_or(0)
    }

    pub fn has_reward_for(&self, level: u32) -> bool {
        self.rewards.iter().any(|r| r.level == level)
    }

    pub fn next_level_points(&self) -> u64 {
        level_floor(level_for(self.points) + 1)
    }

    /// Fraction of the way from the current level's floor to the next, in [0, 1].
    pub fn progress_to_next_level(&self) -> f64 {
        let level = level_for(self.points);
        let floor = level_floor(level);
        let next = level_floor(level + 1);
        if next <= floor {
            return 1.0;
        }
        let progress = (self.points - floor) as f64 / (next - floor) as f64;
        progress.clamp(0.0, 1.0)
    }

    /// Wipe session progress; identity and lifetime points stay.
    pub(crate) fn reset_session(&mut self) {
        self.points = 0;
        self.level = 1;
        self.achievements.clear();
        self.rewards.clear();
        self.stats.clear();
    }
}

/// Participant plus derived progress fields, for presentation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantStats {
    #[serde(flatten)]
    pub participant: Participant,
    pub next_level_points: u64,
    pub progress_to_next_level: f64,
}

impl From<&Participant> for ParticipantStats {
    fn from(p: &Participant) -> Self {
        Self {
            participant: p.clone(),
            next_level_points: p.next_level_points(),
            progress_to_next_level: p.progress_to_next_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_formula() {
        assert_eq!(level_for(0), 1);
        assert_eq!(level_for(99), 1);
        assert_eq!(level_for(100), 2);
        assert_eq!(level_for(399), 2);
        assert_eq!(level_for(400), 3);
        assert_eq!(level_for(1_600), 5);
        assert_eq!(level_for(2_499), 5);
        assert_eq!(level_for(2_500), 6);
    }

    #[test]
    fn test_level_floor_inverts_formula() {
        for level in 1..50u32 {
            assert_eq!(level_for(level_floor(level)), level);
            if level > 1 {
                assert_eq!(level_for(level_floor(level) - 1), level - 1);
            }
        }
    }

    #[test]
    fn test_progress() {
        let mut p = Participant::new("p", 0);
        p.points = 250;
        // level 2 spans 100..400
        assert_eq!(p.next_level_points(), 400);
        assert!((p.progress_to_next_level() - 0.5).abs() < 1e-9);
        p.points = 0;
        assert_eq!(p.next_level_points(), 100);
        assert_eq!(p.progress_to_next_level(), 0.0);
    }

    #[test]
    fn test_stats_serialize_as_named_keys() {
        let mut p = Participant::new("p", 0);
        p.stats.insert(ActionKind::Like, 3);
        let v = serde_json::to_value(&p).unwrap();
        assert_eq!(v["stats"]["like"], 3);
        assert_eq!(v["totalPointsEver"], 0);
    }
}
