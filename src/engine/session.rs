//! The session engine: ingress, bus, ledger and metrics wired together.
//!
//! Raw input goes through `EventIngress` and is published on the bus. Two
//! consumers drain it in lockstep, metrics first, so the `SessionContext` the
//! ledger sees already reflects the event being scored.

use serde_json::Value;

use super::bus::{EventBus, SubscriberId};
use super::events::{Event, EventId, Payload, Timestamp};
use super::ingress::EventIngress;
use super::signals::SharedSink;
use super::ticker::{Task, Ticker};
use crate::clock::SharedClock;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::logging::{
    log, log_rejected_input, log_session_summary, log_task_failure, obj, v_str, Domain, Level,
    ProfileScope,
};
use crate::metrics::export::{ExportFormat, Exported};
use crate::metrics::{AnalyticsView, MetricsEngine};
use crate::scoring::{
    ActionKind, LeaderboardEntry, ParticipantStats, PointsOutcome, ScoringLedger, SessionStats,
};
use crate::storage::StateStore;

pub struct Engine {
    cfg: EngineConfig,
    clock: SharedClock,
    ingress: EventIngress,
    bus: EventBus,
    metrics_sub: SubscriberId,
    ledger_sub: SubscriberId,
    ledger: ScoringLedger,
    metrics: MetricsEngine,
    ticker: Ticker,
    store: Option<StateStore>,
}

impl Engine {
    /// Engine with the built-in achievement catalog and no persistence.
    pub fn new(cfg: EngineConfig, clock: SharedClock, sink: SharedSink) -> Self {
        let ledger = ScoringLedger::with_default_catalog(cfg.ledger.clone(), clock.clone(), sink.clone());
        Self::with_ledger(cfg, clock, sink, ledger)
    }

    /// Engine around a caller-built ledger (custom catalog).
    pub fn with_ledger(cfg: EngineConfig, clock: SharedClock, sink: SharedSink, ledger: ScoringLedger) -> Self {
        let mut bus = EventBus::new();
        let metrics_sub = bus.subscribe("metrics");
        let ledger_sub = bus.subscribe("ledger");
        let metrics = MetricsEngine::new(cfg.metrics.clone(), clock.clone(), sink);
        let ticker = Ticker::new(&cfg.schedule, clock.now_ms(), false);
        Self {
            ingress: EventIngress::new(clock.clone()),
            bus,
            metrics_sub,
            ledger_sub,
            ledger,
            metrics,
            ticker,
            store: None,
            clock,
            cfg,
        }
    }

    /// Attach a store; enables the periodic persist task.
    pub fn with_store(mut self, store: StateStore) -> Self {
        self.store = Some(store);
        self.ticker = Ticker::new(&self.cfg.schedule, self.clock.now_ms(), true);
        self
    }

    /// Load the latest persisted export into the metrics engine, if any.
    pub fn restore_latest(&mut self) -> Result<bool> {
        let Some(store) = &self.store else {
            return Ok(false);
        };
        match store.load_latest_export()? {
            Some(export) => {
                self.metrics.restore(&export);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // =========================================================================
    // Input
    // =========================================================================

    /// Normalize a raw JSON event and queue it. Rejections are logged and returned.
    pub fn submit(&mut self, raw: &Value) -> Result<EventId> {
        match self.ingress.normalize(raw) {
            Ok(event) => {
                let id = event.id.clone();
                self.enqueue(event);
                Ok(id)
            }
            Err(err) => {
                let kind = match &err {
                    EngineError::InvalidInput { kind, .. } => kind.as_str(),
                    _ => "event",
                };
                log_rejected_input(kind, &err.to_string());
                Err(err)
            }
        }
    }

    /// `submit` for one line of JSON text.
    pub fn submit_line(&mut self, line: &str) -> Result<EventId> {
        let raw: Value = serde_json::from_str(line).map_err(|e| {
            log_rejected_input("event", &e.to_string());
            EngineError::from(e)
        })?;
        self.submit(&raw)
    }

    /// Queue an already-normalized event; returns its bus sequence number.
    pub fn enqueue(&mut self, event: Event) -> u64 {
        self.bus.publish(event)
    }

    /// Advance both consumers by one event. `false` when nothing was pending.
    pub fn drain_one(&mut self) -> bool {
        let mut progressed = false;
        if let Some(next) = self.bus.drain_one(self.metrics_sub) {
            self.metrics.track_event(&next.event);
            progressed = true;
        }
        if let Some(next) = self.bus.drain_one(self.ledger_sub) {
            self.score(&next.event);
            progressed = true;
        }
        progressed
    }

    /// Drain until both queues are empty; returns the number of steps taken.
    pub fn pump(&mut self) -> usize {
        let mut steps = 0;
        while self.drain_one() {
            steps += 1;
        }
        steps
    }

    /// Map an event onto a ledger award. Non-scoring kinds return `None`.
    fn score(&mut self, event: &Event) -> Option<PointsOutcome> {
        let action = event.kind().action()?;
        let base = match (&event.payload, action) {
            (Payload::Motion { has_motion: false, .. }, _) => return None,
            (Payload::Gift { value, .. }, _) => value.unwrap_or(1),
            (_, action) => self.cfg.points.base_for(action).unwrap_or(0),
        };
        let participant = self.recipient(event, action);
        let ctx = self.metrics.session_context();
        Some(self.ledger.add_points(&participant, action, base, &ctx))
    }

    fn recipient(&self, event: &Event, action: ActionKind) -> String {
        let attributable = matches!(action, ActionKind::Comment | ActionKind::Gift);
        match (&event.participant_id, self.cfg.attribute_to_actor && attributable) {
            (Some(actor), true) => actor.clone(),
            _ => self.cfg.streamer_id.clone(),
        }
    }

    // =========================================================================
    // Periodic work
    // =========================================================================

    /// Run every task due at `now`. A failing task is logged; the rest still run.
    pub fn tick(&mut self, now: Timestamp) -> Vec<Task> {
        let _scope = ProfileScope::new("engine_tick");
        let due = self.ticker.due(now);
        for task in &due {
            if let Err(err) = self.run_task(*task, now) {
                log_task_failure(task.as_str(), err.code(), &err.to_string());
            }
        }
        due
    }

    fn run_task(&mut self, task: Task, now: Timestamp) -> Result<()> {
        match task {
            Task::Sample => self.metrics.collect_sample(),
            Task::Milestones => {
                self.metrics.check_milestones();
            }
            Task::Decay => self.ledger.decay()?,
            Task::Analysis => {
                self.metrics.analyze()?;
            }
            Task::HourlyReport => {
                self.metrics.hourly_report()?;
            }
            Task::Persist => self.persist(now)?,
        }
        Ok(())
    }

    /// Write the current sample and a full export to the store, if one is attached.
    pub fn persist(&mut self, now: Timestamp) -> Result<()> {
        let Some(store) = self.store.as_mut() else {
            return Ok(());
        };
        store.persist_sample(now, self.metrics.metrics())?;
        store.persist_export(now, &self.metrics.export())?;
        Ok(())
    }

    /// Drop queued events and start a fresh session in both subsystems.
    pub fn reset_session(&mut self) {
        self.log_summary();
        self.bus.clear();
        self.ledger.reset_session();
        self.metrics.reset_session();
        self.ticker.reset(self.clock.now_ms());
        log(
            Level::Info,
            Domain::System,
            "session_reset",
            obj(&[("streamer_id", v_str(&self.cfg.streamer_id))]),
        );
    }

    pub fn log_summary(&self) {
        let stats = self.ledger.session_stats();
        log_session_summary(
            self.metrics.session_duration_ms(),
            stats.total_points,
            stats.active_participants,
            stats.achievements_unlocked,
            self.metrics.metrics().peak_viewers,
        );
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn config(&self) -> &EngineConfig {
        &self.cfg
    }

    pub fn ledger(&self) -> &ScoringLedger {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut ScoringLedger {
        &mut self.ledger
    }

    pub fn metrics(&self) -> &MetricsEngine {
        &self.metrics
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn leaderboard(&self) -> &[LeaderboardEntry] {
        self.ledger.leaderboard()
    }

    pub fn participant_stats(&self, id: &str) -> Option<ParticipantStats> {
        self.ledger.participant_stats(id)
    }

    pub fn session_stats(&self) -> SessionStats {
        self.ledger.session_stats()
    }

    pub fn snapshot(&self) -> AnalyticsView {
        self.metrics.snapshot()
    }

    pub fn export(&self, format: ExportFormat) -> Result<Exported> {
        self.metrics.export_snapshot(format)
    }
}
