//! Error types for the transfer orchestrator

use crate::TransferId;
use thiserror::Error;

/// Result type for orchestrator operations
pub type Result<T> = std::result::Result<T, Error>;

/// Orchestrator errors
///
/// `Validation`, `NotFound` and `Precondition` are reported before any state
/// changes. `InsufficientFunds` and `UpstreamUnavailable` raised by a step
/// leave that step failed and the transfer pending.
#[derive(Error, Debug)]
pub enum Error {
    /// Bad input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unknown account, card, transfer, step or route
    #[error("Not found: {0}")]
    NotFound(String),

    /// Wrong step order, wrong status, inactive account
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// Ledger rejected the movement
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    /// Rate oracle or ledger store timed out or failed
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Should-never-happen state; halts automated execution of the transfer
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Optimistic concurrency check failed on save
    #[error("Version conflict on transfer {id}: expected {expected}, found {actual}")]
    Conflict {
        /// Transfer
        id: TransferId,
        /// Version the writer read
        expected: u64,
        /// Version in the repository
        actual: u64,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error category, for callers that branch on the taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`Error::Validation`]
    Validation,
    /// See [`Error::NotFound`]
    NotFound,
    /// See [`Error::Precondition`]
    Precondition,
    /// See [`Error::InsufficientFunds`]
    InsufficientFunds,
    /// See [`Error::UpstreamUnavailable`]
    UpstreamUnavailable,
    /// See [`Error::InvariantViolation`]
    InvariantViolation,
    /// See [`Error::Conflict`]
    Conflict,
    /// See [`Error::Config`] and [`Error::Io`]
    Config,
}

impl Error {
    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Precondition(_) => ErrorKind::Precondition,
            Error::InsufficientFunds(_) => ErrorKind::InsufficientFunds,
            Error::UpstreamUnavailable(_) => ErrorKind::UpstreamUnavailable,
            Error::InvariantViolation(_) => ErrorKind::InvariantViolation,
            Error::Conflict { .. } => ErrorKind::Conflict,
            Error::Config(_) | Error::Io(_) => ErrorKind::Config,
        }
    }
}

impl From<ledger_core::Error> for Error {
    fn from(err: ledger_core::Error) -> Self {
        use ledger_core::Error as L;
        match &err {
            L::InsufficientFunds { .. } => Error::InsufficientFunds(err.to_string()),
            L::TransactionNotFound(_) => Error::NotFound(err.to_string()),
            L::InvalidState(_) => Error::Precondition(err.to_string()),
            L::UnknownCurrency(_) | L::InvalidTransaction(_) => Error::Validation(err.to_string()),
            L::InvariantViolation(_) => Error::InvariantViolation(err.to_string()),
            L::Unavailable(_) => Error::UpstreamUnavailable(err.to_string()),
        }
    }
}

impl From<route_optimizer::Error> for Error {
    fn from(err: route_optimizer::Error) -> Self {
        use route_optimizer::Error as R;
        match &err {
            R::InvalidAmount(_)
            | R::UnknownCurrency(_)
            | R::InvalidRoute(_)
            | R::InvalidObservation(_) => Error::Validation(err.to_string()),
            R::RouteNotFound(_) => Error::NotFound(err.to_string()),
            R::InvalidMinimums(_) | R::InvalidConfig(_) => Error::Config(err.to_string()),
        }
    }
}

impl From<risk_engine::Error> for Error {
    fn from(err: risk_engine::Error) -> Self {
        Error::Config(err.to_string())
    }
}
