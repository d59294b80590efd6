//! Route suggestion scoring
//!
//! Filters the catalog for a request, scales each candidate's catalog fee to
//! the requested amount, scores cost, speed and reliability, and ranks the
//! survivors.

use crate::{
    Error, MinimumAmountTable, Result, RouteCatalog, RouteDefinition, RouteSuggestion,
    RoutingConfig, ScoringWeights, SuggestRequest,
};
use ledger_core::Currency;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::str::FromStr;
use tracing::debug;

/// Route optimizer
#[derive(Debug, Clone)]
pub struct RouteOptimizer {
    catalog: RouteCatalog,
    minimums: MinimumAmountTable,
    config: RoutingConfig,
}

impl RouteOptimizer {
    /// Create new optimizer over a catalog
    pub fn new(
        catalog: RouteCatalog,
        minimums: MinimumAmountTable,
        config: RoutingConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            catalog,
            minimums,
            config,
        })
    }

    /// Catalog the optimizer reads
    pub fn catalog(&self) -> &RouteCatalog {
        &self.catalog
    }

    /// Ranked suggestions for a request
    ///
    /// An empty list means nothing matched. Errors are reserved for
    /// malformed input.
    pub fn suggest_routes(&self, request: &SuggestRequest) -> Result<Vec<RouteSuggestion>> {
        if request.amount < Decimal::ZERO {
            return Err(Error::InvalidAmount(format!(
                "amount {} is negative",
                request.amount
            )));
        }
        parse_currency(&request.source_currency)?;
        let target_currency = parse_currency(&request.target_currency)?;

        let prefs = &request.preferences;
        let weights = self.config.weights_for(prefs);

        let mut suggestions: Vec<RouteSuggestion> = self
            .catalog
            .list()
            .iter()
            .filter(|route| self.is_candidate(route, request, target_currency))
            .filter_map(|route| score(route, request.amount, weights))
            .filter(|s| {
                prefs
                    .max_acceptable_fee
                    .map_or(true, |max| s.actual_fee <= max)
            })
            .filter(|s| {
                prefs
                    .max_acceptable_time_minutes
                    .map_or(true, |max| s.actual_time_minutes <= max)
            })
            .collect();

        // Stable: equal score and fee keep catalog order
        suggestions.sort_by(|a, b| {
            b.overall_score
                .partial_cmp(&a.overall_score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.actual_fee.cmp(&b.actual_fee))
        });
        suggestions.truncate(self.config.max_suggestions);

        debug!(
            amount = %request.amount,
            target_currency = %target_currency,
            returned = suggestions.len(),
            "Routes suggested"
        );
        Ok(suggestions)
    }

    fn is_candidate(
        &self,
        route: &RouteDefinition,
        request: &SuggestRequest,
        target_currency: Currency,
    ) -> bool {
        let tolerance = request.preferences.risk_tolerance;
        route.active
            && route.target_currency == target_currency
            && request
                .target_provider
                .as_deref()
                .map_or(true, |p| route.target_provider == p)
            && request.amount >= route.minimum_amount
            && request.amount <= route.maximum_amount
            && route.hops.iter().all(|hop| tolerance.permits(hop.risk_tier))
            && self.minimums.admits(&route.hops, request.amount)
    }
}

fn parse_currency(code: &str) -> Result<Currency> {
    Currency::from_str(code).map_err(|_| Error::UnknownCurrency(code.to_string()))
}

/// `None` when the rescaled fee overflows; such a route cannot carry the amount
fn score(
    route: &RouteDefinition,
    amount: Decimal,
    weights: ScoringWeights,
) -> Option<RouteSuggestion> {
    let Some(actual_fee) = route.fee_for(amount) else {
        debug!(route_id = %route.id, amount = %amount, "Fee overflows, route skipped");
        return None;
    };
    let actual_time_minutes = route.catalog_time_minutes;

    let fee = actual_fee.to_f64().unwrap_or(f64::MAX);
    let cost_score = (100.0 - fee / 10.0).max(0.0);
    let speed_score = (100.0 - f64::from(actual_time_minutes) / 60.0).max(0.0);
    let reliability_score = route.reliability_score;

    let overall_score = cost_score * weights.cost
        + speed_score * weights.speed
        + reliability_score * weights.reliability;

    Some(RouteSuggestion {
        route_id: route.id,
        name: route.name.clone(),
        target_provider: route.target_provider.clone(),
        hops: route.hops.clone(),
        actual_fee,
        actual_time_minutes,
        cost_score,
        speed_score,
        reliability_score,
        risk_score: route.highest_risk_tier().score(),
        overall_score,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Hop, NewRoute, RiskTier, RoutePreferences};
    use rust_decimal_macros::dec;

    fn hop(risk_tier: RiskTier) -> Hop {
        Hop {
            provider: "bank-id".to_string(),
            method: "bank_transfer".to_string(),
            estimated_fee: dec!(0),
            estimated_time_minutes: 0,
            risk_tier,
        }
    }

    fn route(name: &str, fee: Decimal, minutes: u32, reliability: f64) -> NewRoute {
        NewRoute {
            name: name.to_string(),
            target_provider: "wallet-eu".to_string(),
            target_currency: Currency::EUR,
            hops: vec![hop(RiskTier::Low)],
            catalog_fee: fee,
            catalog_reference_amount: dec!(1000),
            catalog_time_minutes: minutes,
            reliability_score: reliability,
            minimum_amount: dec!(10),
            maximum_amount: dec!(100000),
        }
    }

    fn request(amount: Decimal) -> SuggestRequest {
        SuggestRequest {
            amount,
            source_currency: "IDR".to_string(),
            target_currency: "EUR".to_string(),
            target_provider: None,
            preferences: RoutePreferences::default(),
        }
    }

    fn optimizer(catalog: &RouteCatalog) -> RouteOptimizer {
        RouteOptimizer::new(
            catalog.clone(),
            MinimumAmountTable::default(),
            RoutingConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_fee_scales_linearly_and_scores() {
        let catalog = RouteCatalog::new();
        catalog.create_route(route("r", dec!(100), 120, 80.0)).unwrap();

        let suggestions = optimizer(&catalog).suggest_routes(&request(dec!(2000))).unwrap();
        assert_eq!(suggestions.len(), 1);

        let s = &suggestions[0];
        assert_eq!(s.actual_fee, dec!(200));
        assert_eq!(s.actual_time_minutes, 120);
        assert!((s.cost_score - 80.0).abs() < 1e-9);
        assert!((s.speed_score - 98.0).abs() < 1e-9);
        // 80*0.5 + 98*0.3 + 80*0.2
        assert!((s.overall_score - 85.4).abs() < 1e-9);
        assert_eq!(s.risk_score, 20.0);
    }

    #[test]
    fn test_scores_floor_at_zero() {
        let catalog = RouteCatalog::new();
        catalog.create_route(route("r", dec!(5000), 10000, 50.0)).unwrap();

        let suggestions = optimizer(&catalog).suggest_routes(&request(dec!(1000))).unwrap();
        assert_eq!(suggestions[0].cost_score, 0.0);
        assert_eq!(suggestions[0].speed_score, 0.0);
    }

    #[test]
    fn test_fee_overflow_skips_route() {
        let catalog = RouteCatalog::new();
        let mut huge = route("huge", dec!(10000000000), 10, 90.0);
        huge.catalog_reference_amount = Decimal::ONE;
        huge.maximum_amount = Decimal::MAX;
        catalog.create_route(huge).unwrap();

        let mut normal = route("normal", dec!(1), 10, 90.0);
        normal.maximum_amount = Decimal::MAX;
        catalog.create_route(normal).unwrap();

        let amount = Decimal::from_str("100000000000000000000").unwrap();
        let names: Vec<_> = optimizer(&catalog)
            .suggest_routes(&request(amount))
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["normal".to_string()]);
    }

    #[test]
    fn test_filters() {
        let catalog = RouteCatalog::new();
        let inactive = catalog.create_route(route("inactive", dec!(1), 1, 90.0)).unwrap();
        catalog.set_active(inactive, false).unwrap();

        let mut usd = route("usd", dec!(1), 1, 90.0);
        usd.target_currency = Currency::USD;
        catalog.create_route(usd).unwrap();

        let mut risky = route("risky", dec!(1), 1, 90.0);
        risky.hops.push(hop(RiskTier::High));
        catalog.create_route(risky).unwrap();

        let mut other_provider = route("other", dec!(1), 1, 90.0);
        other_provider.target_provider = "wallet-other".to_string();
        catalog.create_route(other_provider).unwrap();

        catalog.create_route(route("ok", dec!(1), 1, 90.0)).unwrap();

        let opt = optimizer(&catalog);
        let mut req = request(dec!(500));
        req.target_provider = Some("wallet-eu".to_string());
        let names: Vec<_> = opt
            .suggest_routes(&req)
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["ok".to_string()]);

        // High tolerance admits the risky route
        req.preferences.risk_tolerance = RiskTier::High;
        assert_eq!(opt.suggest_routes(&req).unwrap().len(), 2);

        // Outside the amount range
        assert!(opt.suggest_routes(&request(dec!(5))).unwrap().is_empty());
        assert!(opt.suggest_routes(&request(dec!(200000))).unwrap().is_empty());
    }

    #[test]
    fn test_minimum_table_filters_route() {
        let catalog = RouteCatalog::new();
        catalog.create_route(route("r", dec!(1), 1, 90.0)).unwrap();
        let minimums = MinimumAmountTable::builder()
            .entry("bank-id", "bank_transfer", dec!(1000))
            .build()
            .unwrap();
        let opt = RouteOptimizer::new(catalog, minimums, RoutingConfig::default()).unwrap();

        assert!(opt.suggest_routes(&request(dec!(999))).unwrap().is_empty());
        assert_eq!(opt.suggest_routes(&request(dec!(1000))).unwrap().len(), 1);
    }

    #[test]
    fn test_max_acceptable_fee_and_time() {
        let catalog = RouteCatalog::new();
        catalog.create_route(route("cheap-slow", dec!(10), 600, 90.0)).unwrap();
        catalog.create_route(route("pricey-fast", dec!(100), 5, 90.0)).unwrap();
        let opt = optimizer(&catalog);

        let mut req = request(dec!(1000));
        req.preferences.max_acceptable_fee = Some(dec!(50));
        let result = opt.suggest_routes(&req).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].name, "cheap-slow");

        let mut req = request(dec!(1000));
        req.preferences.max_acceptable_time_minutes = Some(60);
        let result = opt.suggest_routes(&req).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].name, "pricey-fast");
    }

    #[test]
    fn test_preferences_change_ranking() {
        let catalog = RouteCatalog::new();
        // cost 90, speed 0
        catalog.create_route(route("cheap-slow", dec!(100), 6000, 50.0)).unwrap();
        // cost 0, speed ~99.9
        catalog.create_route(route("pricey-fast", dec!(1000), 5, 50.0)).unwrap();
        let opt = optimizer(&catalog);

        let mut req = request(dec!(1000));
        req.preferences.prioritize_cost = true;
        assert_eq!(opt.suggest_routes(&req).unwrap()[0].name, "cheap-slow");

        let mut req = request(dec!(1000));
        req.preferences.prioritize_speed = true;
        assert_eq!(opt.suggest_routes(&req).unwrap()[0].name, "pricey-fast");
    }

    #[test]
    fn test_tie_break_and_limit() {
        let catalog = RouteCatalog::new();
        for i in 0..7 {
            catalog
                .create_route(route(&format!("same-{}", i), dec!(0), 0, 0.0))
                .unwrap();
        }
        let result = optimizer(&catalog).suggest_routes(&request(dec!(1000))).unwrap();

        assert_eq!(result.len(), 5);
        let names: Vec<_> = result.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["same-0", "same-1", "same-2", "same-3", "same-4"]);
    }

    #[test]
    fn test_malformed_input() {
        let catalog = RouteCatalog::new();
        let opt = optimizer(&catalog);

        assert!(matches!(
            opt.suggest_routes(&request(dec!(-1))),
            Err(Error::InvalidAmount(_))
        ));

        let mut req = request(dec!(10));
        req.target_currency = "XXX".to_string();
        assert_eq!(
            opt.suggest_routes(&req),
            Err(Error::UnknownCurrency("XXX".to_string()))
        );

        // Valid input over an empty catalog is not an error
        assert!(opt.suggest_routes(&request(dec!(10))).unwrap().is_empty());
    }

    #[test]
    fn test_suggest_does_not_mutate_catalog() {
        let catalog = RouteCatalog::new();
        catalog.create_route(route("r", dec!(100), 60, 90.0)).unwrap();
        let before = catalog.list();

        optimizer(&catalog).suggest_routes(&request(dec!(5000))).unwrap();
        assert_eq!(catalog.list(), before);
    }
}
