//! Risk engine configuration

use crate::{Error, Result, RiskLevel};
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

/// Score bands used to derive level, alert and review
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskThresholds {
    /// Score at or above which the level is critical
    pub critical: u8,
    /// Score at or above which the level is high
    pub high: u8,
    /// Score at or above which the level is medium
    pub medium: u8,
    /// Score at or above which an alert is raised
    pub alert: u8,
    /// Score at or above which manual review is required
    pub review: u8,
    /// Band for `fraud_suspected`
    pub fraud_suspected: u8,
    /// Band for `suspicious_pattern`
    pub suspicious_pattern: u8,
    /// Band for `rate_limit_warning`
    pub rate_limit_warning: u8,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            critical: 70,
            high: 50,
            medium: 30,
            alert: 40,
            review: 60,
            fraud_suspected: 70,
            suspicious_pattern: 50,
            rate_limit_warning: 40,
        }
    }
}

/// Fraud scoring configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Creations per day that trigger `high_daily_creations`
    pub daily_creation_limit: u32,
    /// Points added for `high_daily_creations`
    pub creation_points: u32,

    /// Replacements per day that trigger `high_daily_replacements`
    pub daily_replacement_limit: u32,
    /// Points added for `high_daily_replacements`
    pub replacement_points: u32,

    /// Activities per day that trigger `excessive_daily_activity`
    pub daily_activity_limit: u32,
    /// Points added for `excessive_daily_activity`
    pub excessive_activity_points: u32,

    /// Hours strictly before this are off-hours
    pub business_day_start_hour: u32,
    /// Hours strictly after this are off-hours
    pub business_day_end_hour: u32,
    /// Points added for `off_hours_activity`
    pub off_hours_points: u32,

    /// Offset of the operator's local time from UTC, in seconds.
    /// Defines both the calendar day and the hour of day.
    pub utc_offset_seconds: i32,

    /// Score bands
    pub thresholds: RiskThresholds,

    /// Level at which gated actions are blocked
    pub block_level: RiskLevel,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            daily_creation_limit: 5,
            creation_points: 30,
            daily_replacement_limit: 3,
            replacement_points: 40,
            daily_activity_limit: 8,
            excessive_activity_points: 50,
            business_day_start_hour: 6,
            business_day_end_hour: 22,
            off_hours_points: 15,
            utc_offset_seconds: 0,
            thresholds: RiskThresholds::default(),
            block_level: RiskLevel::Critical,
        }
    }
}

impl RiskConfig {
    /// Local time offset
    pub fn local_offset(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_seconds).ok_or_else(|| {
            Error::InvalidConfig(format!(
                "utc_offset_seconds {} is out of range",
                self.utc_offset_seconds
            ))
        })
    }

    /// Reject nonsensical settings
    pub fn validate(&self) -> Result<()> {
        self.local_offset()?;

        if self.business_day_start_hour > 23 || self.business_day_end_hour > 23 {
            return Err(Error::InvalidConfig(
                "Business hours must be within 0-23".to_string(),
            ));
        }
        if self.business_day_start_hour > self.business_day_end_hour {
            return Err(Error::InvalidConfig(format!(
                "Business day starts at {} but ends at {}",
                self.business_day_start_hour, self.business_day_end_hour
            )));
        }

        let t = &self.thresholds;
        if !(t.medium <= t.high && t.high <= t.critical && t.critical <= 100) {
            return Err(Error::InvalidConfig(
                "Level thresholds must satisfy medium <= high <= critical <= 100".to_string(),
            ));
        }
        if !(t.rate_limit_warning <= t.suspicious_pattern
            && t.suspicious_pattern <= t.fraud_suspected)
        {
            return Err(Error::InvalidConfig(
                "Alert bands must satisfy warning <= suspicious <= fraud".to_string(),
            ));
        }

        Ok(())
    }
}
