//! Cross-market fixed-point coupling.
//!
//! Coupled markets (for example an energy market and a hydrogen or storage
//! market competing for the same generation) are cleared iteratively: each
//! round re-estimates every market's regional demand from the other
//! markets' latest outcomes through a [`DemandCoupler`], re-dispatches, and
//! stops once every market's total energy dispatch moved by less than the
//! relative tolerance. A hard iteration cap turns oscillation into a
//! [`MarketError::NotConverged`] instead of an endless loop.

use spot_core::{MarketError, MarketResult, Service};
use tracing::{debug, info};

use crate::dispatch::DispatchEngine;
use crate::results::MarketOutcome;

/// Demand feedback between coupled markets.
///
/// Given every market's latest outcome, yields the demand one region of one
/// market should see in the next iteration. `None` leaves the region's
/// demand unchanged.
pub trait DemandCoupler {
    fn demand(&self, market: usize, region: &str, outcomes: &[MarketOutcome]) -> Option<f64>;
}

/// Convergence controls of the fixed point.
#[derive(Debug, Clone)]
pub struct FixedPointConfig {
    /// Relative change in a market's total energy dispatch below which that
    /// market counts as settled.
    pub tolerance: f64,
    /// Iteration cap; exceeding it is an error.
    pub max_iterations: usize,
}

impl Default for FixedPointConfig {
    fn default() -> Self {
        Self {
            tolerance: 0.05,
            max_iterations: 20,
        }
    }
}

/// Clear coupled markets to a fixed point. On success every engine is left
/// solved at the converged demands.
pub fn solve_coupled(
    engines: &mut [DispatchEngine],
    coupler: &dyn DemandCoupler,
    config: &FixedPointConfig,
) -> MarketResult<()> {
    if engines.is_empty() {
        return Ok(());
    }

    // Initial round: clear every market at its input demand.
    let mut totals = Vec::with_capacity(engines.len());
    for engine in engines.iter_mut() {
        let outcome = engine.dispatch()?;
        totals.push(outcome.total_dispatch(Service::Energy));
    }

    let mut last_worst = f64::INFINITY;
    for iteration in 1..=config.max_iterations {
        let outcomes: Vec<MarketOutcome> = engines
            .iter()
            .map(|e| e.outcome().map(Clone::clone))
            .collect::<MarketResult<_>>()?;

        for (market, engine) in engines.iter_mut().enumerate() {
            for region in engine.demand_regions() {
                if let Some(demand) = coupler.demand(market, &region, &outcomes) {
                    engine.set_demand(&region, demand)?;
                }
            }
        }

        let mut worst_change = 0.0f64;
        for (market, engine) in engines.iter_mut().enumerate() {
            let outcome = engine.dispatch()?;
            let total = outcome.total_dispatch(Service::Energy);
            let change = relative_change(totals[market], total);
            worst_change = worst_change.max(change);
            totals[market] = total;
        }
        debug!(iteration, worst_change, "fixed-point round complete");
        last_worst = worst_change;

        if worst_change < config.tolerance {
            info!(iteration, "coupled markets converged");
            return Ok(());
        }
    }

    Err(MarketError::NotConverged {
        iterations: config.max_iterations,
        worst_change: last_worst,
    })
}

fn relative_change(previous: f64, current: f64) -> f64 {
    let scale = previous.abs().max(1e-9);
    (current - previous).abs() / scale
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use spot_core::{BidBand, BidRecord, DemandRecord, MarketInputs, UnitLimitRecord, UnitRecord};

    fn market(demand: f64) -> DispatchEngine {
        let mut inputs = MarketInputs::new();
        inputs.units.push(UnitRecord {
            unit: "U1".into(),
            region: "A".into(),
        });
        inputs.bids.push(BidRecord {
            unit: "U1".into(),
            service: Service::Energy,
            bands: vec![BidBand {
                volume: 200.0,
                price: 25.0,
            }],
        });
        inputs.unit_limits.push(UnitLimitRecord {
            unit: "U1".into(),
            capacity: 200.0,
            initial_output: None,
            ramp_up_rate: None,
            ramp_down_rate: None,
        });
        inputs.demand.push(DemandRecord {
            region: "A".into(),
            demand,
        });
        DispatchEngine::new(inputs, EngineConfig::default()).unwrap()
    }

    /// Market 1's demand contracts toward half of market 0's dispatch.
    struct Halving;

    impl DemandCoupler for Halving {
        fn demand(&self, market: usize, _region: &str, outcomes: &[MarketOutcome]) -> Option<f64> {
            if market == 1 {
                Some(outcomes[0].total_dispatch(Service::Energy) * 0.5)
            } else {
                None
            }
        }
    }

    #[test]
    fn test_converges_on_stable_coupling() {
        let mut engines = vec![market(100.0), market(80.0)];
        let result = solve_coupled(&mut engines, &Halving, &FixedPointConfig::default());
        assert!(result.is_ok());
        // market 1 settles at half of market 0's 100 MW
        let total = engines[1].outcome().unwrap().total_dispatch(Service::Energy);
        assert!((total - 50.0).abs() < 1e-3);
    }

    /// Demand that flips between two far-apart levels and never settles.
    struct Oscillating;

    impl DemandCoupler for Oscillating {
        fn demand(&self, market: usize, _region: &str, outcomes: &[MarketOutcome]) -> Option<f64> {
            if market == 0 {
                return None;
            }
            let other = outcomes[0].total_dispatch(Service::Energy);
            let own = outcomes[1].total_dispatch(Service::Energy);
            // jump to the far side of the other market's dispatch each round
            Some(if own > other { other * 0.25 } else { other * 1.75 })
        }
    }

    #[test]
    fn test_iteration_cap_raises_not_converged() {
        let mut engines = vec![market(100.0), market(10.0)];
        let config = FixedPointConfig {
            tolerance: 0.05,
            max_iterations: 5,
        };
        let err = solve_coupled(&mut engines, &Oscillating, &config).unwrap_err();
        assert!(matches!(err, MarketError::NotConverged { iterations: 5, .. }));
    }
}
