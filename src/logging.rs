//! Structured logging for the engagement engine.
//!
//! Every record is one JSON line with:
//! 1. a per-process `run_id` and monotonic `seq` for ordering
//! 2. a level (`LOG_LEVEL`) and a domain (`LOG_DOMAINS`) for filtering
//! 3. promoted correlation keys (`participant_id`, `event_id`, `msg`) at top level
//! 4. everything else under `data`
//!
//! Records go to stderr so stdout stays free for exports. When `LOG_DIR` is set
//! they are also appended to `<LOG_DIR>/<run_id>/events.jsonl`.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::Instant;

// =============================================================================
// Log Levels
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl Level {
    pub fn from_env() -> Self {
        match std::env::var("LOG_LEVEL").as_deref() {
            Ok("trace") => Level::Trace,
            Ok("debug") => Level::Debug,
            Ok("info") => Level::Info,
            Ok("warn") => Level::Warn,
            Ok("error") => Level::Error,
            _ => Level::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
        }
    }
}

// =============================================================================
// Log Domains
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Ingress, // Raw event normalization
    Bus,     // Queueing and delivery
    Ledger,  // Points, levels, achievements
    Metrics, // Counters, samples, milestones
    Signal,  // Outbound signal fan-out
    Ticker,  // Scheduled periodic work
    Storage, // SQLite persistence
    System,  // Startup, shutdown, recovery
    Profile, // Timing
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Ingress => "ingress",
            Domain::Bus => "bus",
            Domain::Ledger => "ledger",
            Domain::Metrics => "metrics",
            Domain::Signal => "signal",
            Domain::Ticker => "ticker",
            Domain::Storage => "storage",
            Domain::System => "system",
            Domain::Profile => "profile",
        }
    }

    pub fn is_enabled(&self) -> bool {
        // LOG_DOMAINS: comma-separated list or "all"
        match std::env::var("LOG_DOMAINS").as_deref() {
            Ok("all") | Err(_) => true,
            Ok(domains) => domains.split(',').any(|d| d.trim() == self.as_str()),
        }
    }
}

// =============================================================================
// Run context
// =============================================================================

static LOG_SEQ: AtomicU64 = AtomicU64::new(0);
static RUN_CONTEXT: OnceLock<RunContext> = OnceLock::new();

fn next_seq() -> u64 {
    LOG_SEQ.fetch_add(1, Ordering::SeqCst)
}

#[derive(Debug)]
struct RunContext {
    run_id: String,
    events: Option<Mutex<BufWriter<File>>>,
}

fn ensure_run_context() -> &'static RunContext {
    RUN_CONTEXT.get_or_init(|| {
        let run_id = std::env::var("RUN_ID")
            .unwrap_or_else(|_| format!("r-{}-{}", ts_epoch_ms(), process::id()));
        let events = std::env::var("LOG_DIR").ok().and_then(|base| {
            let mut run_dir = PathBuf::from(base);
            run_dir.push(&run_id);
            if let Err(err) = create_dir_all(&run_dir) {
                eprintln!("[log] failed to create run dir: {}", err);
                return None;
            }
            match File::create(run_dir.join("events.jsonl")) {
                Ok(file) => Some(Mutex::new(BufWriter::new(file))),
                Err(err) => {
                    eprintln!("[log] failed to create events log: {}", err);
                    None
                }
            }
        });
        RunContext { run_id, events }
    })
}

fn split_fields(mut fields: Map<String, Value>) -> (Map<String, Value>, Map<String, Value>) {
    let mut top = Map::new();
    for key in ["participant_id", "event_id", "msg"] {
        if let Some(value) = fields.remove(key) {
            top.insert(key.to_string(), value);
        }
    }
    (top, fields)
}

fn write_line(writer: &Mutex<BufWriter<File>>, line: &str) {
    if let Ok(mut w) = writer.lock() {
        let _ = writeln!(w, "{}", line);
        let _ = w.flush();
    }
}

// =============================================================================
// Core logging functions
// =============================================================================

/// RFC3339 timestamp with milliseconds
pub fn ts_now() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Epoch milliseconds
pub fn ts_epoch_ms() -> u64 {
    Utc::now().timestamp_millis() as u64
}

/// Emit a structured log entry
pub fn log(level: Level, domain: Domain, event: &str, fields: Map<String, Value>) {
    let min_level = Level::from_env();
    if level < min_level || !domain.is_enabled() {
        return;
    }

    emit_record(level, domain.as_str(), event, fields);
}

fn emit_record(level: Level, component: &str, event: &str, fields: Map<String, Value>) {
    let ctx = ensure_run_context();
    let (mut top, data) = split_fields(fields);

    let msg = top.remove("msg").unwrap_or(Value::String(String::new()));
    let mut entry = Map::new();
    entry.insert("ts".to_string(), json!(ts_now()));
    entry.insert("run_id".to_string(), json!(ctx.run_id.clone()));
    entry.insert("seq".to_string(), json!(next_seq()));
    entry.insert("lvl".to_string(), json!(level.as_str().to_uppercase()));
    entry.insert("component".to_string(), json!(component));
    entry.insert("event".to_string(), json!(event));
    entry.insert("msg".to_string(), msg);
    for (k, v) in top {
        entry.insert(k, v);
    }
    entry.insert("data".to_string(), Value::Object(data));

    let line = Value::Object(entry).to_string();
    if let Some(events) = &ctx.events {
        write_line(events, &line);
    }
    eprintln!("{}", line);
}

// =============================================================================
// Domain-Specific Logging Helpers
// =============================================================================

pub fn log_rejected_input(kind: &str, reason: &str) {
    log(
        Level::Warn,
        Domain::Ingress,
        "rejected",
        obj(&[("kind", v_str(kind)), ("reason", v_str(reason))]),
    );
}

pub fn log_level_up(participant_id: &str, old_level: u32, new_level: u32, reward: Option<&str>) {
    log(
        Level::Info,
        Domain::Ledger,
        "level_up",
        obj(&[
            ("participant_id", v_str(participant_id)),
            ("old_level", json!(old_level)),
            ("new_level", json!(new_level)),
            ("reward", reward.map(v_str).unwrap_or(Value::Null)),
        ]),
    );
}

pub fn log_achievement(participant_id: &str, achievement_id: &str, points: u64) {
    log(
        Level::Info,
        Domain::Ledger,
        "achievement_unlocked",
        obj(&[
            ("participant_id", v_str(participant_id)),
            ("achievement_id", v_str(achievement_id)),
            ("points", json!(points)),
        ]),
    );
}

pub fn log_decay(factor: f64, participants: usize, total_points: u64) {
    log(
        Level::Debug,
        Domain::Ledger,
        "decay_applied",
        obj(&[
            ("factor", v_num(factor)),
            ("participants", json!(participants)),
            ("total_points", json!(total_points)),
        ]),
    );
}

pub fn log_milestone(metric: &str, threshold: u64, achieved_at: u64) {
    log(
        Level::Info,
        Domain::Metrics,
        "milestone_achieved",
        obj(&[
            ("metric", v_str(metric)),
            ("threshold", json!(threshold)),
            ("achieved_at", json!(achieved_at)),
        ]),
    );
}

pub fn log_subscriber_failure(subscriber: &str, signal: &str, error: &str) {
    log(
        Level::Error,
        Domain::Signal,
        "subscriber_failed",
        obj(&[
            ("subscriber", v_str(subscriber)),
            ("signal", v_str(signal)),
            ("error", v_str(error)),
        ]),
    );
}

pub fn log_task_failure(task: &str, code: &str, error: &str) {
    log(
        Level::Error,
        Domain::Ticker,
        "task_failed",
        obj(&[
            ("task", v_str(task)),
            ("code", v_str(code)),
            ("error", v_str(error)),
        ]),
    );
}

/// Session summary on reset or shutdown
pub fn log_session_summary(
    duration_ms: u64,
    total_points: u64,
    participants: usize,
    achievements_unlocked: usize,
    peak_viewers: u64,
) {
    log(
        Level::Info,
        Domain::System,
        "session_summary",
        obj(&[
            ("duration_ms", json!(duration_ms)),
            ("total_points", json!(total_points)),
            ("participants", json!(participants)),
            ("achievements_unlocked", json!(achievements_unlocked)),
            ("peak_viewers", json!(peak_viewers)),
        ]),
    );
}

// =============================================================================
// Field helpers
// =============================================================================

pub fn obj(pairs: &[(&str, Value)]) -> Map<String, Value> {
    let mut map = Map::new();
    for (k, v) in pairs {
        map.insert((*k).to_string(), v.clone());
    }
    map
}

pub fn v_str(s: &str) -> Value {
    Value::String(s.to_string())
}

pub fn v_num(n: f64) -> Value {
    json!(n)
}

// =============================================================================
// Profiling Scope
// =============================================================================

/// Profiling scope that emits structured timing on drop.
pub struct ProfileScope {
    label: &'static str,
    context: Option<Map<String, Value>>,
    started: Instant,
}

impl ProfileScope {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            context: None,
            started: Instant::now(),
        }
    }

    pub fn with_context(label: &'static str, fields: &[(&str, Value)]) -> Self {
        Self {
            label,
            context: Some(obj(fields)),
            started: Instant::now(),
        }
    }
}

impl Drop for ProfileScope {
    fn drop(&mut self) {
        let elapsed_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        let mut fields = self.context.take().unwrap_or_default();
        fields.insert("label".to_string(), v_str(self.label));
        fields.insert("elapsed_ms".to_string(), v_num(elapsed_ms));
        log(Level::Trace, Domain::Profile, "profile", fields);
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(Level::Trace < Level::Debug);
        assert!(Level::Debug < Level::Info);
        assert!(Level::Info < Level::Warn);
        assert!(Level::Warn < Level::Error);
    }

    #[test]
    fn test_obj_helper() {
        let m = obj(&[("key", v_str("value")), ("num", v_num(42.0))]);
        assert_eq!(m.get("key").unwrap(), "value");
        assert_eq!(m.get("num").unwrap(), 42.0);
    }

    #[test]
    fn test_split_fields_promotes_correlation_keys() {
        let fields = obj(&[
            ("participant_id", v_str("p1")),
            ("points", json!(5)),
            ("msg", v_str("hello")),
        ]);
        let (top, data) = split_fields(fields);
        assert_eq!(top.get("participant_id").unwrap(), "p1");
        assert_eq!(top.get("msg").unwrap(), "hello");
        assert!(data.contains_key("points"));
        assert!(!data.contains_key("participant_id"));
    }

    #[test]
    fn test_seq_increments() {
        let s1 = next_seq();
        let s2 = next_seq();
        assert!(s2 > s1);
    }
}
