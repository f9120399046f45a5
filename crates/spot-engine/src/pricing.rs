//! Clearing-price extraction by perturbation.
//!
//! Binaries and SOS2 lowerings make LP duals unreliable, so prices are
//! never read from the solver's dual solution. Instead each market
//! constraint's rhs is bumped by +1 MW, the problem is re-solved, and the
//! objective difference is that market's marginal price. The rhs is
//! restored afterwards and one final restoring solve leaves the session in
//! its pre-pricing state.
//!
//! Cost: exactly `market_constraints + 1` re-solves.

use std::collections::HashMap;

use spot_core::{MarketKey, MarketResult};
use tracing::{debug, info};

use crate::assembler::AssembledProblem;
use crate::solver::SolverSession;

/// Interval whose market constraints define the published prices. Later
/// intervals only exist to make commitment decisions forward-looking.
const PRICED_INTERVAL: usize = 0;

/// Extract the clearing price of every priced market constraint.
///
/// Requires an already-optimal session. A pooled FCAS requirement set's
/// price is attributed to each of its member (region, service) pairs.
pub fn extract_prices<S: SolverSession>(
    session: &mut S,
    problem: &AssembledProblem,
) -> MarketResult<HashMap<MarketKey, f64>> {
    let base = session.get_objective()?;
    let mut prices = HashMap::new();

    let targets: Vec<_> = problem
        .market_constraints()
        .filter(|c| c.markets.iter().any(|k| k.interval == PRICED_INTERVAL))
        .collect();

    for constraint in &targets {
        let original = session.rhs(constraint.id)?;
        session.set_rhs(constraint.id, original + 1.0)?;
        session.optimize().require_optimal()?;
        let price = session.get_objective()? - base;
        session.set_rhs(constraint.id, original)?;

        debug!(constraint = %constraint.id, price, "marginal price extracted");
        for key in &constraint.markets {
            if key.interval == PRICED_INTERVAL {
                prices.insert(key.clone(), price);
            }
        }
    }

    // Leave the session solved at the unperturbed problem.
    session.optimize().require_optimal()?;
    info!(
        markets = targets.len(),
        resolves = targets.len() + 1,
        "pricing complete"
    );
    Ok(prices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use spot_core::{
        Bounds, BuilderOutput, Constraint, ConstraintId, DecisionVariable, Sense, Service, VarTag,
        VariableId,
    };

    use crate::assembler::assemble;
    use crate::solver::{session_for, SolveStatus};

    /// One region, two bands (100 MW at $20, 100 MW at $50), demand 120.
    fn marginal_band_problem() -> AssembledProblem {
        let mut out = BuilderOutput::new();
        for (id, price) in [(0u64, 20.0), (1, 50.0)] {
            out.push_variable(
                DecisionVariable::continuous(
                    VariableId::new(id),
                    Bounds::non_negative(100.0),
                    VarTag::BidBand {
                        unit: format!("U{id}"),
                        service: Service::Energy,
                        band: 0,
                        interval: 0,
                    },
                )
                .with_objective(price),
            );
        }
        out.push_constraint(Constraint::market(
            ConstraintId::new(2),
            Sense::Equal,
            120.0,
            MarketKey {
                region: "A".into(),
                service: Service::Energy,
                interval: 0,
            },
        ));
        out.push_coefficient(VariableId::new(0), ConstraintId::new(2), 1.0);
        out.push_coefficient(VariableId::new(1), ConstraintId::new(2), 1.0);
        assemble(out).unwrap()
    }

    #[test]
    fn test_price_is_marginal_band() {
        let problem = marginal_band_problem();
        let mut session = session_for(&problem);
        assert_eq!(session.optimize(), SolveStatus::Optimal);

        let prices = extract_prices(&mut session, &problem).unwrap();
        let key = MarketKey {
            region: "A".into(),
            service: Service::Energy,
            interval: 0,
        };
        assert!((prices[&key] - 50.0).abs() < 1e-2);
    }

    #[test]
    fn test_resolve_budget_is_markets_plus_one() {
        let problem = marginal_band_problem();
        let mut session = session_for(&problem);
        session.optimize().require_optimal().unwrap();
        let before = session.invocations();

        extract_prices(&mut session, &problem).unwrap();
        // one market constraint: one perturbed solve plus the restoring one
        assert_eq!(session.invocations() - before, 2);
    }

    #[test]
    fn test_session_restored_after_pricing() {
        let problem = marginal_band_problem();
        let mut session = session_for(&problem);
        session.optimize().require_optimal().unwrap();
        let base = session.get_objective().unwrap();

        extract_prices(&mut session, &problem).unwrap();
        assert!((session.get_objective().unwrap() - base).abs() < 1e-4);
        assert!((session.rhs(ConstraintId::new(2)).unwrap() - 120.0).abs() < 1e-12);
    }
}
