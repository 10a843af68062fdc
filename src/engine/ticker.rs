//! Deterministic scheduler for periodic work.
//!
//! The ticker never reads a clock. The host calls `due(now)` and runs whatever
//! comes back, in order. A task that fell behind by several intervals runs once
//! and is rescheduled on its original grid.

use serde::Serialize;

use super::events::Timestamp;
use crate::config::ScheduleConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Task {
    Sample,
    Milestones,
    Decay,
    Analysis,
    HourlyReport,
    Persist,
}

impl Task {
    pub fn as_str(&self) -> &'static str {
        match self {
            Task::Sample => "sample",
            Task::Milestones => "milestones",
            Task::Decay => "decay",
            Task::Analysis => "analysis",
            Task::HourlyReport => "hourly_report",
            Task::Persist => "persist",
        }
    }
}

#[derive(Debug, Clone)]
struct Periodic {
    task: Task,
    every_ms: u64,
    next_due: Timestamp,
}

#[derive(Debug, Clone)]
pub struct Ticker {
    tasks: Vec<Periodic>,
}

impl Ticker {
    /// Schedule every task one interval after `start`. `Persist` is only
    /// scheduled when `with_persist` is set.
    pub fn new(schedule: &ScheduleConfig, start: Timestamp, with_persist: bool) -> Self {
        let mut plan = vec![
            (Task::Sample, schedule.sample_ms),
            (Task::Milestones, schedule.milestone_ms),
            (Task::Decay, schedule.decay_ms),
            (Task::Analysis, schedule.analysis_ms),
            (Task::HourlyReport, schedule.report_ms),
        ];
        if with_persist {
            plan.push((Task::Persist, schedule.persist_ms));
        }
        let tasks = plan
            .into_iter()
            .filter(|(_, every)| *every > 0)
            .map(|(task, every_ms)| Periodic {
                task,
                every_ms,
                next_due: start + every_ms,
            })
            .collect();
        Self { tasks }
    }

    /// Tasks due at `now`, in fixed order. Each is advanced past `now`.
    pub fn due(&mut self, now: Timestamp) -> Vec<Task> {
        let mut out = Vec::new();
        for p in self.tasks.iter_mut() {
            if now < p.next_due {
                continue;
            }
            out.push(p.task);
            let missed = (now - p.next_due) / p.every_ms;
            p.next_due += (missed + 1) * p.every_ms;
        }
        out
    }

    pub fn next_due(&self, task: Task) -> Option<Timestamp> {
        self.tasks.iter().find(|p| p.task == task).map(|p| p.next_due)
    }

    /// Restart every schedule from `start`.
    pub fn reset(&mut self, start: Timestamp) {
        for p in self.tasks.iter_mut() {
            p.next_due = start + p.every_ms;
        }
    }
}
