//! Fraud risk engine facade over the scorer and the activity log

use crate::{
    ActivityCounters, ActivityLog, ActivityRecord, ActivityType, AlertType, Result,
    RiskAssessment, RiskConfig, RiskContext, RiskLevel, RiskScorer,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Result of recording a gated action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityOutcome {
    /// Assessment the action was scored with
    pub assessment: RiskAssessment,
    /// Appended record; `None` when account or provider was missing
    pub record: Option<ActivityRecord>,
}

/// Per-day analytics for one account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyStats {
    /// Account key
    pub account: String,
    /// Local calendar day
    pub day: NaiveDate,
    /// Activity counts for the day
    pub counters: ActivityCounters,
    /// Most severe level seen, if any activity
    pub highest_level: Option<RiskLevel>,
    /// Alerts raised, in order
    pub alerts: Vec<AlertType>,
}

/// Fraud risk engine
#[derive(Debug, Clone)]
pub struct FraudRiskEngine {
    scorer: RiskScorer,
    log: ActivityLog,
}

impl FraudRiskEngine {
    /// Create new engine with an empty activity log
    pub fn new(config: RiskConfig) -> Result<Self> {
        Self::with_log(config, ActivityLog::new())
    }

    /// Create new engine over an existing log
    pub fn with_log(config: RiskConfig, log: ActivityLog) -> Result<Self> {
        Ok(Self {
            scorer: RiskScorer::new(config)?,
            log,
        })
    }

    /// Configuration in use
    pub fn config(&self) -> &RiskConfig {
        self.scorer.config()
    }

    /// Underlying activity log
    pub fn log(&self) -> &ActivityLog {
        &self.log
    }

    /// Local calendar day of an instant
    pub fn day_of(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.scorer.offset()).date_naive()
    }

    /// Score an action without recording it
    ///
    /// The counters include the action itself.
    pub fn assess_risk(
        &self,
        account: Option<&str>,
        provider: Option<&str>,
        activity_type: ActivityType,
        now: DateTime<Utc>,
    ) -> RiskAssessment {
        let context = RiskContext::new(account, provider);
        let counters = match &context.account {
            Some(account) => {
                self.log
                    .prospective_counters(account, self.day_of(now), activity_type)
            }
            None => ActivityCounters::default(),
        };

        let assessment = self.scorer.assess(&context, counters, now);
        debug!(
            account = ?context.account,
            activity = ?activity_type,
            score = assessment.risk_score.score(),
            level = %assessment.risk_level,
            "Risk assessed"
        );
        assessment
    }

    /// Score an action and append it to the log
    ///
    /// Must be called for blocked actions too.
    pub fn record_activity(
        &self,
        account: Option<&str>,
        provider: Option<&str>,
        activity_type: ActivityType,
        now: DateTime<Utc>,
    ) -> ActivityOutcome {
        let context = RiskContext::new(account, provider);
        let (Some(account), Some(provider)) = (context.account.clone(), context.provider.clone())
        else {
            warn!(
                activity = ?activity_type,
                "Activity not recorded: account or provider missing"
            );
            return ActivityOutcome {
                assessment: self
                    .scorer
                    .assess(&context, ActivityCounters::default(), now),
                record: None,
            };
        };

        let mut assessment = None;
        let record = self
            .log
            .append_with(&account, self.day_of(now), activity_type, |counters| {
                let scored = self.scorer.assess(&context, counters, now);
                let record = ActivityRecord {
                    id: Uuid::now_v7(),
                    provider: provider.clone(),
                    account: account.clone(),
                    activity_type,
                    timestamp: now,
                    risk_score: scored.risk_score,
                    risk_level: scored.risk_level,
                    alert_type: scored.alert_type,
                    risk_factors: scored.risk_factors.clone(),
                };
                assessment = Some(scored);
                record
            });

        let assessment = match assessment {
            Some(assessment) => assessment,
            None => self.scorer.assess(&context, ActivityCounters::default(), now),
        };

        if let Some(alert) = assessment.alert_type {
            warn!(
                account = %account,
                provider = %provider,
                alert = alert.as_str(),
                score = assessment.risk_score.score(),
                "Risk alert raised"
            );
        } else {
            info!(
                account = %account,
                activity = ?activity_type,
                score = assessment.risk_score.score(),
                "Activity recorded"
            );
        }

        ActivityOutcome {
            assessment,
            record: Some(record),
        }
    }

    /// Analytics for one account and day
    pub fn daily_stats(&self, account: &str, day: NaiveDate) -> DailyStats {
        let records = self.log.records_for(account, day);
        DailyStats {
            account: account.to_string(),
            day,
            counters: self.log.daily_counters(account, day),
            highest_level: records.iter().map(|r| r.risk_level).max(),
            alerts: records.iter().filter_map(|r| r.alert_type).collect(),
        }
    }
}

impl Default for FraudRiskEngine {
    fn default() -> Self {
        Self {
            scorer: RiskScorer::default(),
            log: ActivityLog::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RiskFactor;
    use chrono::TimeZone;

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_sixth_creation_is_flagged() {
        let engine = FraudRiskEngine::default();
        for _ in 0..5 {
            engine.record_activity(Some("ACC001"), Some("bank-a"), ActivityType::Creation, noon());
        }

        let assessment =
            engine.assess_risk(Some("ACC001"), Some("bank-a"), ActivityType::Creation, noon());
        assert!(assessment.risk_score.score() >= 30);
        assert!(assessment.risk_level >= RiskLevel::Medium);
        assert!(assessment
            .risk_factors
            .contains(&RiskFactor::HighDailyCreations));
    }

    #[test]
    fn test_assess_does_not_record() {
        let engine = FraudRiskEngine::default();
        engine.assess_risk(Some("ACC001"), Some("bank-a"), ActivityType::Creation, noon());
        assert!(engine.log().is_empty());
    }

    #[test]
    fn test_eighth_activity_exceeds_rate_limit() {
        let engine = FraudRiskEngine::default();
        let mut last = None;
        for _ in 0..8 {
            last = Some(engine.record_activity(
                Some("ACC001"),
                Some("bank-a"),
                ActivityType::Activation,
                noon(),
            ));
        }

        let outcome = last.unwrap();
        assert_eq!(
            outcome.assessment.alert_type,
            Some(AlertType::RateLimitExceeded)
        );
        assert_eq!(
            outcome.record.unwrap().alert_type,
            Some(AlertType::RateLimitExceeded)
        );
    }

    #[test]
    fn test_missing_provider_is_not_recorded() {
        let engine = FraudRiskEngine::default();
        let outcome = engine.record_activity(Some("ACC001"), None, ActivityType::Creation, noon());

        assert!(outcome.record.is_none());
        assert_eq!(outcome.assessment.risk_level, RiskLevel::Low);
        assert_eq!(
            outcome.assessment.risk_factors,
            vec![RiskFactor::InsufficientContext]
        );
        assert!(engine.log().is_empty());
    }

    #[test]
    fn test_daily_stats() {
        let engine = FraudRiskEngine::default();
        for _ in 0..3 {
            engine.record_activity(Some("ACC001"), Some("bank-a"), ActivityType::Replacement, noon());
        }

        let stats = engine.daily_stats("ACC001", engine.day_of(noon()));
        assert_eq!(stats.counters.replacements, 3);
        assert_eq!(stats.highest_level, Some(RiskLevel::Medium));
        assert!(stats.alerts.contains(&AlertType::RateLimitWarning));

        let other_day = engine.daily_stats("ACC001", NaiveDate::from_ymd_opt(2024, 3, 16).unwrap());
        assert_eq!(other_day.counters.total, 0);
        assert_eq!(other_day.highest_level, None);
    }

    #[test]
    fn test_day_boundary_follows_offset() {
        let config = RiskConfig {
            utc_offset_seconds: 7 * 3600,
            ..Default::default()
        };
        let engine = FraudRiskEngine::new(config).unwrap();
        // 20:00 UTC on the 15th is the 16th at UTC+7
        let late = Utc.with_ymd_and_hms(2024, 3, 15, 20, 0, 0).unwrap();
        assert_eq!(engine.day_of(late), NaiveDate::from_ymd_opt(2024, 3, 16).unwrap());
    }
}
