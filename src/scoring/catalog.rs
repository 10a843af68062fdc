//! Static achievement and reward definitions.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::participant::Participant;
use super::{ActionKind, SessionContext};
use crate::error::{EngineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AchievementCategory {
    Engagement,
    Motion,
    Audience,
    Time,
    Special,
}

pub type Predicate = Arc<dyn Fn(&Participant, &SessionContext) -> bool + Send + Sync>;

/// What a participant must reach to unlock an achievement.
#[derive(Clone)]
pub enum Requirement {
    /// Per-participant action stat at or above a count
    ActionCount { action: ActionKind, at_least: u64 },
    /// Continuous motion for at least `ms`
    MotionDuration { ms: u64 },
    ViewerCount { at_least: u64 },
    LiveDuration { ms: u64 },
    Custom(Predicate),
}

impl Requirement {
    pub fn is_met(&self, participant: &Participant, ctx: &SessionContext) -> bool {
        match self {
            Requirement::ActionCount { action, at_least } => participant.stat(*action) >= *at_least,
            Requirement::MotionDuration { ms } => ctx.motion_streak_ms >= *ms,
            Requirement::ViewerCount { at_least } => ctx.viewer_count >= *at_least,
            Requirement::LiveDuration { ms } => ctx.live_duration_ms >= *ms,
            Requirement::Custom(pred) => pred(participant, ctx),
        }
    }
}

impl fmt::Debug for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requirement::ActionCount { action, at_least } => f
                .debug_struct("ActionCount")
                .field("action", action)
                .field("at_least", at_least)
                .finish(),
            Requirement::MotionDuration { ms } => f.debug_struct("MotionDuration").field("ms", ms).finish(),
            Requirement::ViewerCount { at_least } => {
                f.debug_struct("ViewerCount").field("at_least", at_least).finish()
            }
            Requirement::LiveDuration { ms } => f.debug_struct("LiveDuration").field("ms", ms).finish(),
            Requirement::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Achievement {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Bonus paid once on unlock
    pub points: u64,
    pub category: AchievementCategory,
    /// `None` never qualifies
    pub requirement: Option<Requirement>,
}

impl Achievement {
    pub fn new(id: &str, name: &str, points: u64, category: AchievementCategory) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: String::new(),
            points,
            category,
            requirement: None,
        }
    }

    pub fn describe(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn requires(mut self, requirement: Requirement) -> Self {
        self.requirement = Some(requirement);
        self
    }

    pub fn qualifies(&self, participant: &Participant, ctx: &SessionContext) -> bool {
        self.requirement
            .as_ref()
            .map(|r| r.is_met(participant, ctx))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewardKind {
    Effect,
    Voice,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reward {
    pub name: String,
    pub description: String,
    pub kind: RewardKind,
    /// Effect or voice unlocked
    pub value: String,
}

impl Reward {
    pub fn new(name: &str, description: &str, kind: RewardKind, value: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            kind,
            value: value.to_string(),
        }
    }
}

// =============================================================================
// Catalog
// =============================================================================

/// Achievements in declaration order plus rewards keyed by exact level.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    achievements: Vec<Achievement>,
    ids: HashSet<String>,
    rewards: BTreeMap<u32, Reward>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in achievements and level rewards.
    pub fn standard() -> Self {
        let mut catalog = Self::new();
        for achievement in standard_achievements() {
            let registered = catalog.register_achievement(achievement);
            debug_assert!(registered.is_ok(), "built-in achievement: {:?}", registered);
        }
        for (level, reward) in standard_rewards() {
            let registered = catalog.register_reward(level, reward);
            debug_assert!(registered.is_ok(), "built-in reward: {:?}", registered);
        }
        catalog
    }

    pub fn register_achievement(&mut self, achievement: Achievement) -> Result<()> {
        if !self.ids.insert(achievement.id.clone()) {
            return Err(EngineError::DuplicateRegistration {
                catalog: "achievement",
                id: achievement.id,
            });
        }
        self.achievements.push(achievement);
        Ok(())
    }

    pub fn register_reward(&mut self, level: u32, reward: Reward) -> Result<()> {
        if self.rewards.contains_key(&level) {
            return Err(EngineError::DuplicateRegistration {
                catalog: "reward",
                id: format!("level_{}", level),
            });
        }
        self.rewards.insert(level, reward);
        Ok(())
    }

    pub fn achievements(&self) -> &[Achievement] {
        &self.achievements
    }

    pub fn achievement(&self, id: &str) -> Option<&Achievement> {
        self.achievements.iter().find(|a| a.id == id)
    }

    pub fn reward_for(&self, level: u32) -> Option<&Reward> {
        self.rewards.get(&level)
    }

    pub fn rewards(&self) -> impl Iterator<Item = (u32, &Reward)> {
        self.rewards.iter().map(|(level, reward)| (*level, reward))
    }
}

fn standard_achievements() -> Vec<Achievement> {
    use AchievementCategory::*;
    use Requirement::*;

    vec![
        Achievement::new("first_comment", "First Comment", 50, Engagement)
            .describe("Received the first comment of the stream")
            .requires(ActionCount { action: ActionKind::Comment, at_least: 1 }),
        Achievement::new("first_like", "First Like", 25, Engagement)
            .describe("Received the first like of the stream")
            .requires(ActionCount { action: ActionKind::Like, at_least: 1 }),
        Achievement::new("first_gift", "First Gift", 100, Engagement)
            .describe("Received the first gift of the stream")
            .requires(ActionCount { action: ActionKind::Gift, at_least: 1 }),
        Achievement::new("motion_master", "Motion Master", 200, Motion)
            .describe("Detected 100 movements")
            .requires(ActionCount { action: ActionKind::Motion, at_least: 100 }),
        Achievement::new("dance_king", "Dance King", 300, Motion)
            .describe("Kept moving for five minutes straight")
            .requires(MotionDuration { ms: 300_000 }),
        Achievement::new("crowd_gatherer", "Crowd Gatherer", 500, Audience)
            .describe("Reached 50 concurrent viewers")
            .requires(ViewerCount { at_least: 50 }),
        Achievement::new("viral_sensation", "Viral Sensation", 1000, Engagement)
            .describe("Reached 1000 likes")
            .requires(ActionCount { action: ActionKind::Like, at_least: 1000 }),
        Achievement::new("marathon_runner", "Marathon Runner", 400, Time)
            .describe("Stayed live for one hour")
            .requires(LiveDuration { ms: 3_600_000 }),
        Achievement::new("all_nighter", "All Nighter", 800, Time)
            .describe("Stayed live for four hours")
            .requires(LiveDuration { ms: 14_400_000 }),
        Achievement::new("effect_master", "Effect Master", 600, Special)
            .describe("Used ten visual effects")
            .requires(ActionCount { action: ActionKind::Effect, at_least: 10 }),
        Achievement::new("voice_artist", "Voice Artist", 400, Special)
            .describe("Used five voices")
            .requires(ActionCount { action: ActionKind::Voice, at_least: 5 }),
    ]
}

fn standard_rewards() -> Vec<(u32, Reward)> {
    vec![
        (5, Reward::new("Special Effect Unlocked", "New visual effect available", RewardKind::Effect, "neon")),
        (10, Reward::new("Premium Voice", "New AI voice available", RewardKind::Voice, "alien")),
        (15, Reward::new("Hologram Mode", "Hologram effect unlocked", RewardKind::Effect, "hologram")),
        (20, Reward::new("Monster Voice", "Monster voice available", RewardKind::Voice, "monster")),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_catalog_shape() {
        let catalog = Catalog::standard();
        assert_eq!(catalog.achievements().len(), 11);
        assert_eq!(catalog.achievements()[0].id, "first_comment");
        assert_eq!(catalog.reward_for(5).unwrap().value, "neon");
        assert!(catalog.reward_for(6).is_none());
        assert_eq!(catalog.rewards().count(), 4);
    }

    #[test]
    fn test_builtin_entries_register_cleanly() {
        let mut catalog = Catalog::new();
        for achievement in standard_achievements() {
            catalog.register_achievement(achievement).unwrap();
        }
        for (level, reward) in standard_rewards() {
            catalog.register_reward(level, reward).unwrap();
        }
        assert_eq!(catalog.achievements().len(), Catalog::standard().achievements().len());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let mut catalog = Catalog::standard();
        let err = catalog
            .register_achievement(Achievement::new("first_like", "Again", 1, AchievementCategory::Special))
            .unwrap_err();
        assert!(matches!(err, EngineError::DuplicateRegistration { catalog: "achievement", .. }));

        let err = catalog
            .register_reward(10, Reward::new("x", "y", RewardKind::Voice, "z"))
            .unwrap_err();
        assert!(matches!(err, EngineError::DuplicateRegistration { catalog: "reward", .. }));
        assert_eq!(catalog.achievements().len(), 11);
    }

    #[test]
    fn test_no_requirement_never_qualifies() {
        let a = Achievement::new("secret", "Secret", 10, AchievementCategory::Special);
        let p = Participant::new("p1", 0);
        let ctx = SessionContext {
            viewer_count: 1_000_000,
            live_duration_ms: u64::MAX,
            motion_streak_ms: u64::MAX,
        };
        assert!(!a.qualifies(&p, &ctx));
    }

    #[test]
    fn test_context_requirements() {
        let p = Participant::new("p1", 0);
        let crowd = Requirement::ViewerCount { at_least: 50 };
        assert!(!crowd.is_met(&p, &SessionContext { viewer_count: 49, ..Default::default() }));
        assert!(crowd.is_met(&p, &SessionContext { viewer_count: 50, ..Default::default() }));

        let custom = Requirement::Custom(Arc::new(|p: &Participant, _: &SessionContext| p.points >= 10));
        assert!(!custom.is_met(&p, &SessionContext::default()));
        assert_eq!(format!("{:?}", custom), "Custom(..)");
    }
}
