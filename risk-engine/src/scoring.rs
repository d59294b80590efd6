//! Risk scoring
//!
//! Additive scoring over a day's activity counters. Every signal adds its
//! points independently; only the final total is clamped to 100. The only
//! clock the scorer sees is the `now` argument.

use crate::{
    ActivityCounters, AlertType, Result, RiskAssessment, RiskConfig, RiskContext, RiskFactor,
    RiskLevel, RiskScore,
};
use chrono::{DateTime, FixedOffset, Offset, Timelike, Utc};

/// Risk scorer
#[derive(Debug, Clone)]
pub struct RiskScorer {
    config: RiskConfig,
    offset: FixedOffset,
}

impl RiskScorer {
    /// Create new risk scorer
    pub fn new(config: RiskConfig) -> Result<Self> {
        config.validate()?;
        let offset = config.local_offset()?;
        Ok(Self { config, offset })
    }

    /// Configuration in use
    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Local time offset used for day and hour boundaries
    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Assess a counter snapshot
    ///
    /// Missing account or provider yields a low assessment carrying
    /// `insufficient_context`; the caller decides whether to block.
    pub fn assess(
        &self,
        context: &RiskContext,
        counters: ActivityCounters,
        now: DateTime<Utc>,
    ) -> RiskAssessment {
        if !context.is_complete() {
            return RiskAssessment {
                risk_score: RiskScore::new(0),
                risk_level: RiskLevel::Low,
                risk_factors: vec![RiskFactor::InsufficientContext],
                alert_triggered: false,
                alert_type: None,
                review_required: false,
                assessed_at: now,
            };
        }

        let cfg = &self.config;
        let mut total: u32 = 0;
        let mut risk_factors = Vec::new();
        let mut forced_alert = None;

        if counters.creations >= cfg.daily_creation_limit {
            total += cfg.creation_points;
            risk_factors.push(RiskFactor::HighDailyCreations);
        }

        if counters.replacements >= cfg.daily_replacement_limit {
            total += cfg.replacement_points;
            risk_factors.push(RiskFactor::HighDailyReplacements);
        }

        if counters.total >= cfg.daily_activity_limit {
            total += cfg.excessive_activity_points;
            risk_factors.push(RiskFactor::ExcessiveDailyActivity);
            forced_alert = Some(AlertType::RateLimitExceeded);
        }

        if self.is_off_hours(now) {
            total += cfg.off_hours_points;
            risk_factors.push(RiskFactor::OffHoursActivity);
        }

        let risk_score = RiskScore::clamp(total);
        let score = risk_score.score();
        let t = &cfg.thresholds;

        let alert_type = forced_alert.or_else(|| {
            if score >= t.fraud_suspected {
                Some(AlertType::FraudSuspected)
            } else if score >= t.suspicious_pattern {
                Some(AlertType::SuspiciousPattern)
            } else if score >= t.rate_limit_warning {
                Some(AlertType::RateLimitWarning)
            } else {
                None
            }
        });

        RiskAssessment {
            risk_score,
            risk_level: self.level_for(risk_score),
            risk_factors,
            alert_triggered: score >= t.alert,
            alert_type,
            review_required: score >= t.review,
            assessed_at: now,
        }
    }

    /// Level for a score
    pub fn level_for(&self, score: RiskScore) -> RiskLevel {
        let t = &self.config.thresholds;
        match score.score() {
            s if s >= t.critical => RiskLevel::Critical,
            s if s >= t.high => RiskLevel::High,
            s if s >= t.medium => RiskLevel::Medium,
            _ => RiskLevel::Low,
        }
    }

    fn is_off_hours(&self, now: DateTime<Utc>) -> bool {
        let hour = now.with_timezone(&self.offset).hour();
        hour < self.config.business_day_start_hour || hour > self.config.business_day_end_hour
    }
}

impl Default for RiskScorer {
    fn default() -> Self {
        Self {
            config: RiskConfig::default(),
            offset: Utc.fix(),
        }
    }
}
