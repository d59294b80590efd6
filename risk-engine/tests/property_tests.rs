//! Property-based tests for fraud scoring
//!
//! - The scorer is a pure function of (context, counters, now)
//! - Scores never leave [0, 100] however many signals fire
//! - Level, alert and review flags follow the score bands

use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;
use risk_engine::{
    ActivityCounters, ActivityType, AlertType, FraudRiskEngine, RiskContext, RiskFactor,
    RiskLevel, RiskScorer,
};

fn counters_strategy() -> impl Strategy<Value = ActivityCounters> {
    (0u32..20, 0u32..20, 0u32..20).prop_map(|(creations, replacements, other)| ActivityCounters {
        creations,
        replacements,
        total: creations + replacements + other,
    })
}

fn instant_strategy() -> impl Strategy<Value = DateTime<Utc>> {
    (0u32..24, 0u32..60).prop_map(|(hour, minute)| {
        Utc.with_ymd_and_hms(2024, 3, 15, hour, minute, 0).unwrap()
    })
}

fn activity_strategy() -> impl Strategy<Value = ActivityType> {
    prop_oneof![
        Just(ActivityType::Creation),
        Just(ActivityType::Replacement),
        Just(ActivityType::Activation),
        Just(ActivityType::Blocking),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: identical inputs give identical assessments
    #[test]
    fn prop_scoring_is_deterministic(
        counters in counters_strategy(),
        now in instant_strategy(),
    ) {
        let scorer = RiskScorer::default();
        let context = RiskContext::new(Some("ACC001"), Some("bank-a"));

        let first = scorer.assess(&context, counters, now);
        let second = scorer.assess(&context, counters, now);
        prop_assert_eq!(first, second);
    }

    /// Property: score is clamped and the derived flags follow it
    #[test]
    fn prop_score_bands_are_consistent(
        counters in counters_strategy(),
        now in instant_strategy(),
    ) {
        let scorer = RiskScorer::default();
        let context = RiskContext::new(Some("ACC001"), Some("bank-a"));
        let assessment = scorer.assess(&context, counters, now);
        let score = assessment.risk_score.score();

        prop_assert!(score <= 100);
        prop_assert_eq!(assessment.alert_triggered, score >= 40);
        prop_assert_eq!(assessment.review_required, score >= 60);

        let expected_level = match score {
            s if s >= 70 => RiskLevel::Critical,
            s if s >= 50 => RiskLevel::High,
            s if s >= 30 => RiskLevel::Medium,
            _ => RiskLevel::Low,
        };
        prop_assert_eq!(assessment.risk_level, expected_level);

        if counters.total >= 8 {
            prop_assert_eq!(assessment.alert_type, Some(AlertType::RateLimitExceeded));
        }
        if counters.creations >= 5 {
            prop_assert!(score >= 30);
            prop_assert!(assessment.risk_factors.contains(&RiskFactor::HighDailyCreations));
        }
    }

    /// Property: more activity never lowers the score
    #[test]
    fn prop_score_is_monotonic_in_counters(
        counters in counters_strategy(),
        extra in activity_strategy(),
        now in instant_strategy(),
    ) {
        let scorer = RiskScorer::default();
        let context = RiskContext::new(Some("ACC001"), Some("bank-a"));

        let before = scorer.assess(&context, counters, now);
        let after = scorer.assess(&context, counters.with(extra), now);
        prop_assert!(after.risk_score >= before.risk_score);
    }

    /// Property: engine records every action and counts it
    #[test]
    fn prop_engine_counts_every_recorded_action(
        actions in prop::collection::vec(activity_strategy(), 0..30),
    ) {
        let engine = FraudRiskEngine::default();
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap();

        for action in &actions {
            let outcome = engine.record_activity(Some("ACC001"), Some("bank-a"), *action, now);
            prop_assert!(outcome.record.is_some());
        }

        let stats = engine.daily_stats("ACC001", engine.day_of(now));
        prop_assert_eq!(stats.counters.total as usize, actions.len());
        prop_assert_eq!(engine.log().len(), actions.len());
    }
}
