//! Real-time engagement scoring and session analytics for live streams.

pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod scoring;
pub mod storage;
