//! Core types for risk engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Risk score (0-100)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RiskScore(u8);

impl RiskScore {
    /// Create new risk score, clamped to 100
    pub fn new(score: u8) -> Self {
        Self(score.min(100))
    }

    /// Clamp an additive total into a score
    pub fn clamp(total: u32) -> Self {
        Self(total.min(100) as u8)
    }

    /// Get raw score
    pub fn score(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for RiskScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Risk level, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// Low risk
    Low,
    /// Medium risk
    Medium,
    /// High risk
    High,
    /// Critical risk
    Critical,
}

impl RiskLevel {
    /// Lowercase label
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of card/account action being gated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    /// New card issued
    Creation,
    /// Existing card replaced
    Replacement,
    /// Card activated
    Activation,
    /// Card blocked
    Blocking,
}

/// Alert raised by an assessment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    /// Daily activity ceiling crossed
    RateLimitExceeded,
    /// Score in the fraud band
    FraudSuspected,
    /// Score in the suspicious band
    SuspiciousPattern,
    /// Score just past the alert threshold
    RateLimitWarning,
}

impl AlertType {
    /// snake_case label
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::RateLimitExceeded => "rate_limit_exceeded",
            AlertType::FraudSuspected => "fraud_suspected",
            AlertType::SuspiciousPattern => "suspicious_pattern",
            AlertType::RateLimitWarning => "rate_limit_warning",
        }
    }
}

/// Signal that contributed to a score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskFactor {
    /// Too many creations today
    HighDailyCreations,
    /// Too many replacements today
    HighDailyReplacements,
    /// Too many activities of any kind today
    ExcessiveDailyActivity,
    /// Activity outside business hours
    OffHoursActivity,
    /// Account or provider missing; nothing was scored
    InsufficientContext,
}

impl RiskFactor {
    /// snake_case label
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskFactor::HighDailyCreations => "high_daily_creations",
            RiskFactor::HighDailyReplacements => "high_daily_replacements",
            RiskFactor::ExcessiveDailyActivity => "excessive_daily_activity",
            RiskFactor::OffHoursActivity => "off_hours_activity",
            RiskFactor::InsufficientContext => "insufficient_context",
        }
    }
}

impl fmt::Display for RiskFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of one account's activity for the current day
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityCounters {
    /// Creations today
    pub creations: u32,
    /// Replacements today
    pub replacements: u32,
    /// All activities today
    pub total: u32,
}

impl ActivityCounters {
    /// Counters with one more activity of the given type
    pub fn with(mut self, activity_type: ActivityType) -> Self {
        match activity_type {
            ActivityType::Creation => self.creations += 1,
            ActivityType::Replacement => self.replacements += 1,
            ActivityType::Activation | ActivityType::Blocking => {}
        }
        self.total += 1;
        self
    }
}

/// Who the activity belongs to
///
/// Blank identifiers are treated as missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskContext {
    /// Account key
    pub account: Option<String>,
    /// Provider key
    pub provider: Option<String>,
}

impl RiskContext {
    /// Build a context, dropping blank identifiers
    pub fn new(account: Option<&str>, provider: Option<&str>) -> Self {
        let clean = |value: Option<&str>| {
            value
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        Self {
            account: clean(account),
            provider: clean(provider),
        }
    }

    /// Both account and provider are known
    pub fn is_complete(&self) -> bool {
        self.account.is_some() && self.provider.is_some()
    }
}

/// Risk assessment result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Risk score
    pub risk_score: RiskScore,

    /// Risk level
    pub risk_level: RiskLevel,

    /// Risk factors detected
    pub risk_factors: Vec<RiskFactor>,

    /// Alert raised
    pub alert_triggered: bool,

    /// Alert kind, if any band applies
    pub alert_type: Option<AlertType>,

    /// Manual review needed
    pub review_required: bool,

    /// Assessment timestamp (the `now` that was passed in)
    pub assessed_at: DateTime<Utc>,
}

/// Append-only record of a gated action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    /// Record ID
    pub id: Uuid,
    /// Provider key
    pub provider: String,
    /// Account key
    pub account: String,
    /// Activity type
    pub activity_type: ActivityType,
    /// When it happened
    pub timestamp: DateTime<Utc>,
    /// Score at the time
    pub risk_score: RiskScore,
    /// Level at the time
    pub risk_level: RiskLevel,
    /// Alert raised, if any
    pub alert_type: Option<AlertType>,
    /// Factors at the time
    pub risk_factors: Vec<RiskFactor>,
}
