//! Event pipeline with deterministic, per-consumer ordering.
//!
//! Architecture:
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │   Producer   │────►│   Ingress    │────►│  Event Bus   │
//! │ (JSON lines) │     │ (normalize)  │     │ (FIFO/sub)   │
//! └──────────────┘     └──────────────┘     └──────┬───────┘
//!                                      ┌───────────┴───────────┐
//!                                      ▼                       ▼
//!                               ┌──────────────┐        ┌──────────────┐
//!                               │   Metrics    │──ctx──►│    Ledger    │
//!                               └──────┬───────┘        └──────┬───────┘
//!                                      └──────────┬────────────┘
//!                                                 ▼
//!                                          ┌──────────────┐
//!                                          │   Signals    │
//!                                          └──────────────┘
//! ```
//!
//! Periodic work (sampling, milestones, decay, analysis, reports, persistence)
//! is driven by `Engine::tick` through a clock-free `Ticker`.

pub mod bus;
pub mod events;
pub mod ingress;
pub mod session;
pub mod signals;
pub mod ticker;

pub use session::Engine;
