//! Route catalog
//!
//! Insertion-ordered. Readers see a snapshot; the only in-place mutations are
//! activation, usage counting and performance recording.

use crate::{
    Error, NewRoute, Result, RouteDefinition, RouteId, RoutePerformance, RouteUsage,
    SelectionKind,
};
use chrono::Utc;
use parking_lot::RwLock;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info};

/// Shared route catalog
#[derive(Debug, Clone, Default)]
pub struct RouteCatalog {
    routes: Arc<RwLock<Vec<RouteDefinition>>>,
}

impl RouteCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and add a route; new routes start active
    pub fn create_route(&self, new: NewRoute) -> Result<RouteId> {
        validate_new_route(&new)?;

        let id = RouteId::new();
        let route = RouteDefinition {
            id,
            name: new.name,
            target_provider: new.target_provider,
            target_currency: new.target_currency,
            hops: new.hops,
            catalog_fee: new.catalog_fee,
            catalog_reference_amount: new.catalog_reference_amount,
            catalog_time_minutes: new.catalog_time_minutes,
            reliability_score: new.reliability_score,
            minimum_amount: new.minimum_amount,
            maximum_amount: new.maximum_amount,
            active: true,
            usage: RouteUsage::default(),
            performance: RoutePerformance::default(),
            created_at: Utc::now(),
        };

        info!(
            route_id = %id,
            name = %route.name,
            target = %route.target_provider,
            hops = route.hops.len(),
            "Route created"
        );
        self.routes.write().push(route);
        Ok(id)
    }

    /// Route by ID
    pub fn get(&self, id: RouteId) -> Result<RouteDefinition> {
        self.routes
            .read()
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or(Error::RouteNotFound(id))
    }

    /// All routes in insertion order
    pub fn list(&self) -> Vec<RouteDefinition> {
        self.routes.read().clone()
    }

    /// Number of routes
    pub fn len(&self) -> usize {
        self.routes.read().len()
    }

    /// Whether the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.routes.read().is_empty()
    }

    /// Enable or disable a route
    pub fn set_active(&self, id: RouteId, active: bool) -> Result<()> {
        self.update(id, |route| {
            route.active = active;
            Ok(())
        })?;
        info!(route_id = %id, active, "Route activation changed");
        Ok(())
    }

    /// Count one use of a route
    pub fn record_usage(&self, id: RouteId, kind: SelectionKind) -> Result<RouteUsage> {
        let usage = self.update(id, |route| {
            let usage = &mut route.usage;
            match kind {
                SelectionKind::Suggested => usage.suggested += 1,
                SelectionKind::Selected => usage.selected += 1,
                SelectionKind::Completed => usage.completed += 1,
                SelectionKind::Failed => usage.failed += 1,
            }
            usage.last_used_at = Some(Utc::now());
            Ok(usage.clone())
        })?;
        debug!(route_id = %id, kind = ?kind, "Route usage recorded");
        Ok(usage)
    }

    /// Add one observation of real fee and time for a transfer of `amount`
    ///
    /// Fee deviation is measured against the catalog fee rescaled to
    /// `amount`; time deviation against the catalog time. A zero estimate
    /// contributes a zero deviation.
    pub fn record_performance(
        &self,
        id: RouteId,
        amount: Decimal,
        actual_fee: Decimal,
        actual_time_minutes: u32,
        satisfaction: Option<u8>,
    ) -> Result<RoutePerformance> {
        if amount <= Decimal::ZERO {
            return Err(Error::InvalidObservation(format!(
                "transfer amount {} is not positive",
                amount
            )));
        }
        if actual_fee < Decimal::ZERO {
            return Err(Error::InvalidObservation(format!(
                "negative fee {}",
                actual_fee
            )));
        }
        if let Some(rating) = satisfaction {
            if !(1..=5).contains(&rating) {
                return Err(Error::InvalidObservation(format!(
                    "satisfaction {} outside 1-5",
                    rating
                )));
            }
        }

        let performance = self.update(id, |route| {
            let expected_fee = route.fee_for(amount).ok_or_else(|| {
                Error::InvalidObservation(format!(
                    "amount {} overflows the fee of route {}",
                    amount, route.id
                ))
            })?;
            let fee_deviation = deviation_pct(
                actual_fee.to_f64().unwrap_or(0.0),
                expected_fee.to_f64().unwrap_or(0.0),
            );
            let time_deviation = deviation_pct(
                f64::from(actual_time_minutes),
                f64::from(route.catalog_time_minutes),
            );

            let perf = &mut route.performance;
            perf.observations += 1;
            let n = perf.observations as f64;
            perf.avg_fee_deviation_pct += (fee_deviation - perf.avg_fee_deviation_pct) / n;
            perf.avg_time_deviation_pct += (time_deviation - perf.avg_time_deviation_pct) / n;

            if let Some(rating) = satisfaction {
                perf.satisfaction_count += 1;
                let n = perf.satisfaction_count as f64;
                let mean = perf.avg_satisfaction.unwrap_or(0.0);
                perf.avg_satisfaction = Some(mean + (f64::from(rating) - mean) / n);
            }
            Ok(perf.clone())
        })?;

        debug!(
            route_id = %id,
            observations = performance.observations,
            fee_deviation_pct = performance.avg_fee_deviation_pct,
            time_deviation_pct = performance.avg_time_deviation_pct,
            "Route performance recorded"
        );
        Ok(performance)
    }

    fn update<T>(
        &self,
        id: RouteId,
        f: impl FnOnce(&mut RouteDefinition) -> Result<T>,
    ) -> Result<T> {
        let mut routes = self.routes.write();
        let route = routes
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(Error::RouteNotFound(id))?;
        f(route)
    }
}

fn deviation_pct(actual: f64, estimated: f64) -> f64 {
    if estimated == 0.0 {
        0.0
    } else {
        (actual - estimated) / estimated * 100.0
    }
}

fn validate_new_route(new: &NewRoute) -> Result<()> {
    if new.name.trim().is_empty() {
        return Err(Error::InvalidRoute("name must not be empty".to_string()));
    }
    if new.target_provider.trim().is_empty() {
        return Err(Error::InvalidRoute(
            "target provider must not be empty".to_string(),
        ));
    }
    if new.hops.is_empty() {
        return Err(Error::InvalidRoute("route has no hops".to_string()));
    }
    if new.hops.iter().any(|hop| hop.estimated_fee < Decimal::ZERO) {
        return Err(Error::InvalidRoute("hop fee is negative".to_string()));
    }
    if new.catalog_fee < Decimal::ZERO {
        return Err(Error::InvalidRoute("catalog fee is negative".to_string()));
    }
    if new.catalog_reference_amount <= Decimal::ZERO {
        return Err(Error::InvalidRoute(
            "reference amount must be positive".to_string(),
        ));
    }
    if new.minimum_amount < Decimal::ZERO || new.minimum_amount > new.maximum_amount {
        return Err(Error::InvalidRoute(format!(
            "amount range [{}, {}] is invalid",
            new.minimum_amount, new.maximum_amount
        )));
    }
    if !(0.0..=100.0).contains(&new.reliability_score) {
        return Err(Error::InvalidRoute(format!(
            "reliability score {} outside 0-100",
            new.reliability_score
        )));
    }
    Ok(())
}
