//! Fraud Risk Engine
//!
//! Scores bursts of card activity (creation, replacement, activation,
//! blocking) per account against the current calendar day.
//!
//! The scorer is a pure function of a counter snapshot and the `now` passed
//! in; the engine wraps it with an append-only activity log that supplies
//! those counters.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod activity;
pub mod config;
pub mod engine;
pub mod error;
pub mod scoring;
pub mod types;

pub use activity::ActivityLog;
pub use config::{RiskConfig, RiskThresholds};
pub use engine::{ActivityOutcome, DailyStats, FraudRiskEngine};
pub use error::{Error, Result};
pub use scoring::RiskScorer;
pub use types::*;
