use serde::{Deserialize, Serialize};

use crate::engine::events::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MilestoneMetric {
    Viewers,
    Likes,
    Gifts,
    Comments,
}

impl MilestoneMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            MilestoneMetric::Viewers => "viewers",
            MilestoneMetric::Likes => "likes",
            MilestoneMetric::Gifts => "gifts",
            MilestoneMetric::Comments => "comments",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Milestone {
    pub metric: MilestoneMetric,
    pub threshold: u64,
    pub achieved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub achieved_at: Option<Timestamp>,
}

impl Milestone {
    pub fn new(metric: MilestoneMetric, threshold: u64) -> Self {
        Self {
            metric,
            threshold,
            achieved: false,
            achieved_at: None,
        }
    }

    /// e.g. "50 viewers"
    pub fn label(&self) -> String {
        format!("{} {}", self.threshold, self.metric.as_str())
    }
}

/// Ordered milestone list. `achieved` only ever goes from false to true,
/// except through `reset`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneSet {
    milestones: Vec<Milestone>,
}

impl Default for MilestoneSet {
    fn default() -> Self {
        Self::standard()
    }
}

impl MilestoneSet {
    pub fn standard() -> Self {
        use MilestoneMetric::*;
        let mut milestones = Vec::new();
        for t in [10, 50, 100, 500, 1000] {
            milestones.push(Milestone::new(Viewers, t));
        }
        for t in [100, 500, 1000, 5000] {
            milestones.push(Milestone::new(Likes, t));
        }
        for t in [10, 50, 100, 500] {
            milestones.push(Milestone::new(Gifts, t));
        }
        Self { milestones }
    }

    pub fn from_milestones(milestones: Vec<Milestone>) -> Self {
        Self { milestones }
    }

    pub fn add(&mut self, metric: MilestoneMetric, threshold: u64) {
        self.milestones.push(Milestone::new(metric, threshold));
    }

    /// Mark every unachieved milestone of `metric` whose threshold `value` has
    /// reached. Returns the newly achieved ones.
    pub fn evaluate(&mut self, metric: MilestoneMetric, value: u64, now: Timestamp) -> Vec<Milestone> {
        let mut hit = Vec::new();
        for m in self.milestones.iter_mut() {
            if m.metric == metric && !m.achieved && value >= m.threshold {
                m.achieved = true;
                m.achieved_at = Some(now);
                hit.push(m.clone());
            }
        }
        hit
    }

    /// Evaluate all metrics at once; `value_of` supplies the current reading.
    pub fn sweep(&mut self, value_of: impl Fn(MilestoneMetric) -> u64, now: Timestamp) -> Vec<Milestone> {
        let mut hit = Vec::new();
        for m in self.milestones.iter_mut() {
            if !m.achieved && value_of(m.metric) >= m.threshold {
                m.achieved = true;
                m.achieved_at = Some(now);
                hit.push(m.clone());
            }
        }
        hit
    }

    pub fn achieved(&self) -> Vec<Milestone> {
        self.milestones.iter().filter(|m| m.achieved).cloned().collect()
    }

    pub fn all(&self) -> &[Milestone] {
        &self.milestones
    }

    pub fn reset(&mut self) {
        for m in self.milestones.iter_mut() {
            m.achieved = false;
            m.achieved_at = None;
        }
    }
}
