//! Time source for the engine.
//!
//! Subsystems never read wall-clock time directly; they ask an injected `Clock`.
//! Tests and replays drive a `ManualClock`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::engine::events::Timestamp;

pub trait Clock: Send + Sync {
    /// Epoch milliseconds
    fn now_ms(&self) -> Timestamp;
}

pub type SharedClock = Arc<dyn Clock>;

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> Timestamp {
        chrono::Utc::now().timestamp_millis() as u64
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start_ms: Timestamp) -> Self {
        Self {
            now: AtomicU64::new(start_ms),
        }
    }

    pub fn shared(start_ms: Timestamp) -> Arc<Self> {
        Arc::new(Self::new(start_ms))
    }

    pub fn set(&self, ts: Timestamp) {
        self.now.store(ts, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_ms: u64) -> Timestamp {
        self.now.fetch_add(delta_ms, Ordering::SeqCst) + delta_ms
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }
}
