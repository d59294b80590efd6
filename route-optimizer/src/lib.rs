//! Route Optimizer
//!
//! Ranks pre-defined multi-hop transfer routes for a requested amount and
//! currency pair. Suggestions are derived per request and never written
//! back into the catalog; usage and performance are recorded only through
//! their dedicated catalog operations.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, missing_debug_implementations)]

pub mod catalog;
pub mod config;
pub mod error;
pub mod minimums;
pub mod optimizer;
pub mod types;

pub use catalog::RouteCatalog;
pub use config::{RoutingConfig, ScoringWeights};
pub use error::{Error, Result};
pub use minimums::{MinimumAmountEntry, MinimumAmountTable, MinimumAmountTableBuilder};
pub use optimizer::RouteOptimizer;
pub use types::*;
