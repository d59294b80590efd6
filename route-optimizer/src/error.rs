//! Error types for route optimizer

use crate::RouteId;
use thiserror::Error;

/// Route optimizer error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Malformed amount in a suggestion request
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Currency code not recognised
    #[error("Unknown currency: {0}")]
    UnknownCurrency(String),

    /// Route definition rejected at creation
    #[error("Invalid route: {0}")]
    InvalidRoute(String),

    /// Route not in catalog
    #[error("Route not found: {0}")]
    RouteNotFound(RouteId),

    /// Usage or performance observation rejected
    #[error("Invalid observation: {0}")]
    InvalidObservation(String),

    /// Minimum-amount table rejected at load time
    #[error("Invalid minimum amount table: {0}")]
    InvalidMinimums(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type
pub type Result<T> = std::result::Result<T, Error>;
