//! Core types for route optimizer

use chrono::{DateTime, Utc};
use ledger_core::Currency;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Route identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RouteId(Uuid);

impl RouteId {
    /// Generate new route ID
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RouteId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Risk tier of a hop, and the caller's tolerance for it
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    /// Low risk
    Low,
    /// Medium risk
    Medium,
    /// High risk
    High,
}

impl RiskTier {
    /// Whether a hop of tier `hop` is acceptable under this tolerance
    pub fn permits(&self, hop: RiskTier) -> bool {
        hop <= *self
    }

    /// Informational score for the tier
    pub fn score(&self) -> f64 {
        match self {
            RiskTier::Low => 20.0,
            RiskTier::Medium => 50.0,
            RiskTier::High => 80.0,
        }
    }
}

impl Default for RiskTier {
    fn default() -> Self {
        RiskTier::Medium
    }
}

/// One hop of a route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hop {
    /// Provider the funds pass through
    pub provider: String,
    /// Method used at that provider (bank_transfer, e_wallet, card...)
    pub method: String,
    /// Estimated fee at the catalog reference amount
    pub estimated_fee: Decimal,
    /// Estimated time in minutes
    pub estimated_time_minutes: u32,
    /// Risk tier
    pub risk_tier: RiskTier,
}

/// How a route was touched by a caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionKind {
    /// Shown to a user
    Suggested,
    /// Picked by a user
    Selected,
    /// Transfer over it completed
    Completed,
    /// Transfer over it failed
    Failed,
}

/// Usage counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteUsage {
    /// Times suggested
    pub suggested: u64,
    /// Times selected
    pub selected: u64,
    /// Completed transfers
    pub completed: u64,
    /// Failed transfers
    pub failed: u64,
    /// Last time any counter moved
    pub last_used_at: Option<DateTime<Utc>>,
}

impl RouteUsage {
    /// Completed share of finished transfers, if any finished
    pub fn success_rate(&self) -> Option<f64> {
        let finished = self.completed + self.failed;
        (finished > 0).then(|| self.completed as f64 / finished as f64 * 100.0)
    }
}

/// Rolling accuracy of catalog estimates
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutePerformance {
    /// Observations recorded
    pub observations: u64,
    /// Mean of (actual - estimated) / estimated fee, in percent
    pub avg_fee_deviation_pct: f64,
    /// Mean of (actual - estimated) / estimated time, in percent
    pub avg_time_deviation_pct: f64,
    /// Ratings received
    pub satisfaction_count: u64,
    /// Mean rating (1-5)
    pub avg_satisfaction: Option<f64>,
}

/// Catalog entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteDefinition {
    /// Route ID
    pub id: RouteId,
    /// Display name
    pub name: String,
    /// Final provider
    pub target_provider: String,
    /// Currency delivered
    pub target_currency: Currency,
    /// Hops, in order
    pub hops: Vec<Hop>,
    /// Total fee at the reference amount
    pub catalog_fee: Decimal,
    /// Amount the catalog fee was quoted for
    pub catalog_reference_amount: Decimal,
    /// Total time in minutes
    pub catalog_time_minutes: u32,
    /// Reliability score (0-100)
    pub reliability_score: f64,
    /// Smallest amount accepted
    pub minimum_amount: Decimal,
    /// Largest amount accepted
    pub maximum_amount: Decimal,
    /// Inactive routes are never suggested
    pub active: bool,
    /// Usage counters
    pub usage: RouteUsage,
    /// Estimate accuracy
    pub performance: RoutePerformance,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl RouteDefinition {
    /// Most severe hop tier
    pub fn highest_risk_tier(&self) -> RiskTier {
        self.hops
            .iter()
            .map(|hop| hop.risk_tier)
            .max()
            .unwrap_or(RiskTier::Low)
    }

    /// Catalog fee rescaled linearly to `amount`
    ///
    /// `None` when the product does not fit in a `Decimal`.
    pub fn fee_for(&self, amount: Decimal) -> Option<Decimal> {
        self.catalog_fee
            .checked_mul(amount)?
            .checked_div(self.catalog_reference_amount)
    }
}

/// Operator input for a new catalog entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRoute {
    /// Display name
    pub name: String,
    /// Final provider
    pub target_provider: String,
    /// Currency delivered
    pub target_currency: Currency,
    /// Hops, in order
    pub hops: Vec<Hop>,
    /// Total fee at the reference amount
    pub catalog_fee: Decimal,
    /// Amount the catalog fee was quoted for
    pub catalog_reference_amount: Decimal,
    /// Total time in minutes
    pub catalog_time_minutes: u32,
    /// Reliability score (0-100)
    pub reliability_score: f64,
    /// Smallest amount accepted
    pub minimum_amount: Decimal,
    /// Largest amount accepted
    pub maximum_amount: Decimal,
}

/// Caller preferences for ranking
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutePreferences {
    /// Weight cost heavily
    pub prioritize_cost: bool,
    /// Weight speed heavily; ignored when `prioritize_cost` is set
    pub prioritize_speed: bool,
    /// Highest hop tier accepted
    pub risk_tolerance: RiskTier,
    /// Drop routes whose scaled fee exceeds this
    pub max_acceptable_fee: Option<Decimal>,
    /// Drop routes slower than this
    pub max_acceptable_time_minutes: Option<u32>,
}

/// Suggestion request
///
/// Currency codes stay raw strings here; the optimizer rejects unknown ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestRequest {
    /// Amount to send
    pub amount: Decimal,
    /// Currency the sender pays in
    pub source_currency: String,
    /// Currency to deliver
    pub target_currency: String,
    /// Restrict to one final provider
    pub target_provider: Option<String>,
    /// Ranking preferences
    #[serde(default)]
    pub preferences: RoutePreferences,
}

/// Scored, ephemeral view of a route for one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSuggestion {
    /// Route ID
    pub route_id: RouteId,
    /// Display name
    pub name: String,
    /// Final provider
    pub target_provider: String,
    /// Hops, in order
    pub hops: Vec<Hop>,
    /// Catalog fee scaled to the requested amount
    pub actual_fee: Decimal,
    /// Catalog time
    pub actual_time_minutes: u32,
    /// max(0, 100 - fee / 10)
    pub cost_score: f64,
    /// max(0, 100 - minutes / 60)
    pub speed_score: f64,
    /// Catalog reliability
    pub reliability_score: f64,
    /// Highest hop tier as a score; not part of `overall_score`
    pub risk_score: f64,
    /// Weighted sum used for ranking
    pub overall_score: f64,
}
