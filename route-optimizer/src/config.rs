//! Route scoring configuration

use crate::{Error, Result, RoutePreferences};
use serde::{Deserialize, Serialize};

/// Weights applied to cost, speed and reliability scores
///
/// Weights are not required to sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    /// Cost weight
    pub cost: f64,
    /// Speed weight
    pub speed: f64,
    /// Reliability weight
    pub reliability: f64,
}

impl ScoringWeights {
    /// Create weights
    pub const fn new(cost: f64, speed: f64, reliability: f64) -> Self {
        Self {
            cost,
            speed,
            reliability,
        }
    }

    fn validate(&self, name: &str) -> Result<()> {
        let all = [self.cost, self.speed, self.reliability];
        if all.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(Error::InvalidConfig(format!(
                "{} weights must be finite and non-negative",
                name
            )));
        }
        Ok(())
    }
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self::new(0.5, 0.3, 0.2)
    }
}

/// Routing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Suggestions returned per request
    pub max_suggestions: usize,
    /// Weights with no preference set
    pub default_weights: ScoringWeights,
    /// Weights when cost is prioritised
    pub cost_weights: ScoringWeights,
    /// Weights when speed is prioritised
    pub speed_weights: ScoringWeights,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            max_suggestions: 5,
            default_weights: ScoringWeights::default(),
            cost_weights: ScoringWeights::new(0.7, 0.2, 0.2),
            speed_weights: ScoringWeights::new(0.2, 0.7, 0.2),
        }
    }
}

impl RoutingConfig {
    /// Weights for a set of preferences; cost wins when both flags are set
    pub fn weights_for(&self, preferences: &RoutePreferences) -> ScoringWeights {
        if preferences.prioritize_cost {
            self.cost_weights
        } else if preferences.prioritize_speed {
            self.speed_weights
        } else {
            self.default_weights
        }
    }

    /// Reject nonsensical settings
    pub fn validate(&self) -> Result<()> {
        if self.max_suggestions == 0 {
            return Err(Error::InvalidConfig(
                "max_suggestions must be at least 1".to_string(),
            ));
        }
        self.default_weights.validate("default")?;
        self.cost_weights.validate("cost")?;
        self.speed_weights.validate("speed")?;
        Ok(())
    }
}
