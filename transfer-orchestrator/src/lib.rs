//! Transfer Orchestrator
//!
//! Moves money from a card or external source through an intermediate
//! provider account into a target provider account, as a saga of ledger
//! postings that can be compensated step by step.
//!
//! # Architecture
//!
//! A transfer is created with two steps:
//!
//! 1. **External funding**: credit the intermediate account with the
//!    converted amount once the external provider confirms
//! 2. **Internal transfer**: move the funds from the intermediate account
//!    to the target account
//!
//! Steps are executed explicitly and strictly in order. Rollback cancels
//! the ledger transaction of every completed step in reverse order.
//!
//! The orchestrator also fronts the fraud risk engine (card actions) and
//! the route optimizer (provider suggestions).
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ledger_core::{Currency, InMemoryLedger};
//! use rust_decimal_macros::dec;
//! use transfer_orchestrator::{
//!     Config, ExecuteStepParams, InMemoryAccountDirectory, InMemoryTransferRepository, Ports,
//!     StaticRateOracle, TracingAuditSink, TransferOrchestrator, TransferRequest,
//! };
//!
//! #[tokio::main]
//! async fn main() -> transfer_orchestrator::Result<()> {
//!     let directory = InMemoryAccountDirectory::new();
//!     directory.add_account("wallet-id", Currency::EUR, "hub-eur", true);
//!     directory.add_account("wallet-eu", Currency::EUR, "user-eur", true);
//!
//!     let ports = Ports {
//!         ledger: Arc::new(InMemoryLedger::new()),
//!         rates: Arc::new(StaticRateOracle::new().with_rate(Currency::IDR, Currency::EUR, dec!(0.000058))),
//!         directory: Arc::new(directory),
//!         repository: Arc::new(InMemoryTransferRepository::new()),
//!         audit: Arc::new(TracingAuditSink),
//!     };
//!     let orchestrator = TransferOrchestrator::new(Config::default(), ports)?;
//!
//!     let transfer = orchestrator
//!         .create_transfer(
//!             TransferRequest {
//!                 source_amount: dec!(1000000),
//!                 source_currency: Currency::IDR,
//!                 target_currency: Currency::EUR,
//!                 intermediate_provider: "wallet-id".into(),
//!                 target_provider: "wallet-eu".into(),
//!                 source_card: None,
//!             },
//!             None,
//!         )
//!         .await?;
//!
//!     orchestrator.execute_step(transfer.id, 1, ExecuteStepParams::default()).await?;
//!     orchestrator.execute_step(transfer.id, 2, ExecuteStepParams::default()).await?;
//!
//!     println!("{:?}", orchestrator.status(transfer.id).await?);
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, missing_debug_implementations)]

pub mod audit;
pub mod config;
pub mod engine;
pub mod error;
pub mod memory;
pub mod ports;
pub mod repository;
pub mod types;

// Re-exports
pub use audit::{AuditEvent, AuditEventType, AuditSeverity, MemoryAuditSink, TracingAuditSink};
pub use config::{Config, LoggingConfig, TimeoutConfig};
pub use engine::{Ports, TransferOrchestrator, EXTERNAL_SOURCE};
pub use error::{Error, ErrorKind, Result};
pub use memory::{InMemoryAccountDirectory, OracleMode, StaticRateOracle};
pub use ports::{Account, AccountDirectory, AuditSink, Card, RateOracle, TransferRepository};
pub use repository::InMemoryTransferRepository;
pub use types::*;
