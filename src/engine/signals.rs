//! Outbound signals and their fan-out.
//!
//! Subsystems receive a `SignalSink` at construction and publish typed
//! `Signal`s through it. `SignalHub` fans a signal out to any number of
//! subscribers; a subscriber that errors or panics is logged and skipped, the
//! remaining subscribers still receive the signal.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, RwLock};

use serde::Serialize;

use crate::logging::{log, log_subscriber_failure, obj, v_str, Domain, Level};
use crate::metrics::analysis::AnalysisReport;
use crate::metrics::milestones::MilestoneMetric;
use crate::metrics::HourlyReport;
use crate::scoring::catalog::Reward;
use crate::scoring::ActionKind;

use super::events::Timestamp;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "signal", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Signal {
    PointsAdded {
        participant_id: String,
        action: ActionKind,
        points: u64,
        total_points: u64,
        level: u32,
    },
    LevelUp {
        participant_id: String,
        old_level: u32,
        new_level: u32,
        reward: Option<Reward>,
    },
    AchievementUnlocked {
        participant_id: String,
        achievement_id: String,
        name: String,
        points: u64,
    },
    RewardGranted {
        participant_id: String,
        level: u32,
        reward: Reward,
    },
    PeakViewers {
        count: u64,
        timestamp: Timestamp,
    },
    MilestoneAchieved {
        metric: MilestoneMetric,
        threshold: u64,
        achieved_at: Timestamp,
    },
    HourlyReport(Box<HourlyReport>),
    AnalysisComplete(Box<AnalysisReport>),
}

impl Signal {
    pub fn name(&self) -> &'static str {
        match self {
            Signal::PointsAdded { .. } => "pointsAdded",
            Signal::LevelUp { .. } => "levelUp",
            Signal::AchievementUnlocked { .. } => "achievementUnlocked",
            Signal::RewardGranted { .. } => "rewardGranted",
            Signal::PeakViewers { .. } => "peakViewers",
            Signal::MilestoneAchieved { .. } => "milestoneAchieved",
            Signal::HourlyReport(_) => "hourlyReport",
            Signal::AnalysisComplete(_) => "analysisComplete",
        }
    }
}

pub trait SignalSink: Send + Sync {
    fn deliver(&self, signal: &Signal) -> anyhow::Result<()>;
}

pub type SharedSink = Arc<dyn SignalSink>;

/// Deliver through a sink, logging instead of propagating failures.
pub fn emit(sink: &dyn SignalSink, signal: Signal) {
    if let Err(err) = sink.deliver(&signal) {
        log_subscriber_failure("sink", signal.name(), &err.to_string());
    }
}

// =============================================================================
// Hub
// =============================================================================

/// Multi-subscriber fan-out.
#[derive(Default)]
pub struct SignalHub {
    subscribers: RwLock<Vec<(String, SharedSink)>>,
}

impl SignalHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn subscribe(&self, name: &str, sink: SharedSink) {
        if let Ok(mut subs) = self.subscribers.write() {
            subs.push((name.to_string(), sink));
        }
    }

    pub fn unsubscribe(&self, name: &str) -> bool {
        match self.subscribers.write() {
            Ok(mut subs) => {
                let before = subs.len();
                subs.retain(|(n, _)| n != name);
                subs.len() != before
            }
            Err(_) => false,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().map(|s| s.len()).unwrap_or(0)
    }
}

impl SignalSink for SignalHub {
    fn deliver(&self, signal: &Signal) -> anyhow::Result<()> {
        // Snapshot so a subscriber may (un)subscribe without deadlocking.
        let subs: Vec<(String, SharedSink)> = match self.subscribers.read() {
            Ok(subs) => subs.clone(),
            Err(_) => return Ok(()),
        };
        for (name, sink) in subs {
            match catch_unwind(AssertUnwindSafe(|| sink.deliver(signal))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => log_subscriber_failure(&name, signal.name(), &err.to_string()),
                Err(_) => log_subscriber_failure(&name, signal.name(), "subscriber panicked"),
            }
        }
        Ok(())
    }
}

// =============================================================================
// Stock sinks
// =============================================================================

#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl SignalSink for NullSink {
    fn deliver(&self, _signal: &Signal) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Keeps every delivered signal; lets a poller (or a test) read them back.
#[derive(Debug, Default)]
pub struct RecordingSink {
    signals: Mutex<Vec<Signal>>,
}

impl RecordingSink {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn signals(&self) -> Vec<Signal> {
        self.signals.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn take(&self) -> Vec<Signal> {
        self.signals
            .lock()
            .map(|mut s| std::mem::take(&mut *s))
            .unwrap_or_default()
    }

    pub fn count(&self, name: &str) -> usize {
        self.signals
            .lock()
            .map(|s| s.iter().filter(|sig| sig.name() == name).count())
            .unwrap_or(0)
    }
}

impl SignalSink for RecordingSink {
    fn deliver(&self, signal: &Signal) -> anyhow::Result<()> {
        self.signals
            .lock()
            .map_err(|_| anyhow::anyhow!("recording sink poisoned"))?
            .push(signal.clone());
        Ok(())
    }
}

/// Writes each signal as a structured log record.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl SignalSink for LogSink {
    fn deliver(&self, signal: &Signal) -> anyhow::Result<()> {
        let body = serde_json::to_value(signal)?;
        log(
            Level::Info,
            Domain::Signal,
            signal.name(),
            obj(&[("msg", v_str(signal.name())), ("signal", body)]),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingSink;

    impl SignalSink for FailingSink {
        fn deliver(&self, _signal: &Signal) -> anyhow::Result<()> {
            anyhow::bail!("socket closed")
        }
    }

    struct PanickingSink;

    impl SignalSink for PanickingSink {
        fn deliver(&self, _signal: &Signal) -> anyhow::Result<()> {
            panic!("subscriber bug")
        }
    }

    fn peak(count: u64) -> Signal {
        Signal::PeakViewers { count, timestamp: 1 }
    }

    #[test]
    fn test_failing_subscriber_does_not_block_others() {
        let hub = SignalHub::new();
        let recorder = RecordingSink::shared();
        hub.subscribe("broken", Arc::new(FailingSink));
        hub.subscribe("panics", Arc::new(PanickingSink));
        hub.subscribe("recorder", recorder.clone());

        assert!(hub.deliver(&peak(12)).is_ok());
        assert!(hub.deliver(&peak(13)).is_ok());
        assert_eq!(recorder.count("peakViewers"), 2);
    }

    #[test]
    fn test_unsubscribe() {
        let hub = SignalHub::new();
        let recorder = RecordingSink::shared();
        hub.subscribe("recorder", recorder.clone());
        assert_eq!(hub.subscriber_count(), 1);
        assert!(hub.unsubscribe("recorder"));
        assert!(!hub.unsubscribe("recorder"));
        hub.deliver(&peak(1)).unwrap();
        assert!(recorder.signals().is_empty());
    }

    #[test]
    fn test_signal_wire_format() {
        let sig = Signal::LevelUp {
            participant_id: "p1".to_string(),
            old_level: 1,
            new_level: 2,
            reward: None,
        };
        let v = serde_json::to_value(&sig).unwrap();
        assert_eq!(v["signal"], "levelUp");
        assert_eq!(v["participantId"], "p1");
        assert_eq!(v["newLevel"], 2);
    }

    #[test]
    fn test_take_drains() {
        let recorder = RecordingSink::default();
        recorder.deliver(&peak(3)).unwrap();
        assert_eq!(recorder.take().len(), 1);
        assert!(recorder.take().is_empty());
    }
}
