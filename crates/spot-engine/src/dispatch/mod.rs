//! Dispatch orchestration.
//!
//! [`DispatchEngine`] owns one market's inputs and drives the phases of a
//! clearing run: validate, build constraint rows, assemble, solve, and
//! (lazily) price. Result accessors enforce the phase order; asking for an
//! outcome before `dispatch()` or prices before a solve is a
//! [`MarketError::Sequencing`] rather than a panic or a stale answer.

pub mod fixed_point;

use std::time::Instant;

use spot_core::{
    validate, BuilderOutput, IdRegistry, MarketError, MarketInputs, MarketResult, VarTag,
};
use tracing::{debug, info};

use crate::assembler::{assemble, AssembledProblem};
use crate::builders;
use crate::config::EngineConfig;
use crate::linearizer;
use crate::pricing::extract_prices;
use crate::results::{
    CommitmentDecision, DispatchRecord, FlowRecord, MarketOutcome, PriceSchedule,
};
use crate::solver::{session_for, GoodLpSession, SolverSession};

/// Phase of a dispatch run. Transitions are monotone; `Assembled` is passed
/// through inside `dispatch()` and only observed if the solve fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Phase {
    Building,
    Assembled,
    Solved,
    Priced,
}

/// One market's clearing engine.
#[derive(Debug)]
pub struct DispatchEngine {
    inputs: MarketInputs,
    config: EngineConfig,
    phase: Phase,
    problem: Option<AssembledProblem>,
    session: Option<GoodLpSession>,
    outcome: Option<MarketOutcome>,
    prices: Option<PriceSchedule>,
}

impl DispatchEngine {
    /// Validate the input tables and prepare an engine. Structural input
    /// errors surface here, before any variable is created.
    pub fn new(inputs: MarketInputs, config: EngineConfig) -> MarketResult<Self> {
        validate(&inputs)?;
        Ok(Self {
            inputs,
            config,
            phase: Phase::Building,
            problem: None,
            session: None,
            outcome: None,
            prices: None,
        })
    }

    /// Build, assemble and solve the market. Idempotent once solved.
    pub fn dispatch(&mut self) -> MarketResult<&MarketOutcome> {
        if self.phase >= Phase::Solved {
            return self.outcome();
        }

        let started = Instant::now();
        let problem = self.build_problem()?;
        self.phase = Phase::Assembled;
        let mut session = session_for(&problem);
        session.optimize().require_optimal()?;
        let solve_time_ms = started.elapsed().as_millis();

        let outcome = self.collect_outcome(&problem, &session, solve_time_ms)?;
        info!(
            objective = outcome.objective_value,
            solve_time_ms = outcome.solve_time_ms,
            "market cleared"
        );
        self.problem = Some(problem);
        self.session = Some(session);
        self.outcome = Some(outcome);
        self.phase = Phase::Solved;
        self.outcome()
    }

    /// The solved outcome. Requires a prior `dispatch()`.
    pub fn outcome(&self) -> MarketResult<&MarketOutcome> {
        self.outcome
            .as_ref()
            .ok_or_else(|| MarketError::Sequencing("outcome requested before dispatch".into()))
    }

    /// Published clearing prices. Computed on first call by perturbation
    /// re-solves; cached afterwards.
    pub fn prices(&mut self) -> MarketResult<&PriceSchedule> {
        if self.phase < Phase::Solved {
            return Err(MarketError::Sequencing(
                "prices requested before dispatch".into(),
            ));
        }
        if self.phase < Phase::Priced {
            // phase >= Solved guarantees both are present
            let problem = self
                .problem
                .as_ref()
                .ok_or_else(|| MarketError::Sequencing("no assembled problem".into()))?;
            let session = self
                .session
                .as_mut()
                .ok_or_else(|| MarketError::Sequencing("no solver session".into()))?;
            let map = extract_prices(session, problem)?;
            self.prices = Some(PriceSchedule::from_map(map));
            self.phase = Phase::Priced;
        }
        self.prices
            .as_ref()
            .ok_or_else(|| MarketError::Sequencing("prices requested before dispatch".into()))
    }

    /// Replace one region's demand and reset the engine to the building
    /// phase. Used by the cross-market fixed point between iterations.
    pub fn set_demand(&mut self, region: &str, demand: f64) -> MarketResult<()> {
        if demand < 0.0 {
            return Err(MarketError::invariant(
                "regional_demand",
                format!("region '{region}' demand update is negative"),
            ));
        }
        let record = self
            .inputs
            .demand
            .iter_mut()
            .find(|d| d.region == region)
            .ok_or_else(|| {
                MarketError::invariant(
                    "regional_demand",
                    format!("region '{region}' has no demand row"),
                )
            })?;
        record.demand = demand;

        self.phase = Phase::Building;
        self.problem = None;
        self.session = None;
        self.outcome = None;
        self.prices = None;
        Ok(())
    }

    /// Regions with a demand row, in table order.
    pub fn demand_regions(&self) -> Vec<String> {
        self.inputs.demand.iter().map(|d| d.region.clone()).collect()
    }

    fn build_problem(&mut self) -> MarketResult<AssembledProblem> {
        let mut registry = IdRegistry::new();
        let mut merged = BuilderOutput::new();

        // Variable-creating builders first; row builders resolve their
        // variables through the registry's bound keys.
        merged.merge(builders::bids::build(&self.inputs, &self.config, &mut registry)?);
        merged.merge(linearizer::build(&self.inputs, &self.config, &mut registry)?);
        merged.merge(builders::capacity::build(&self.inputs, &self.config, &mut registry)?);
        merged.merge(builders::ramp::build(&self.inputs, &self.config, &mut registry)?);
        merged.merge(builders::fcas::build(&self.inputs, &self.config, &mut registry)?);
        merged.merge(builders::commitment::build(&self.inputs, &self.config, &mut registry)?);
        merged.merge(builders::balance::build(&self.inputs, &self.config, &mut registry)?);
        builders::elastic::relax(&mut merged, &self.config, &mut registry);

        debug!(
            variables = merged.variables.len(),
            constraints = merged.constraints.len(),
            "constraint build complete"
        );
        assemble(merged)
    }

    /// Aggregate solved variable values into the tabular outcome. Dispatch
    /// and flows report the cleared interval (interval 0); commitment
    /// decisions cover the whole horizon.
    fn collect_outcome(
        &self,
        problem: &AssembledProblem,
        session: &GoodLpSession,
        solve_time_ms: u128,
    ) -> MarketResult<MarketOutcome> {
        let mut dispatch: Vec<DispatchRecord> = Vec::new();
        let mut flows: Vec<FlowRecord> = Vec::new();
        let mut commitment: Vec<CommitmentDecision> = Vec::new();

        for var in &problem.variables {
            match &var.tag {
                VarTag::BidBand {
                    unit,
                    service,
                    interval: 0,
                    ..
                } => {
                    let value = session.get_value(var.id)?;
                    match dispatch
                        .iter_mut()
                        .find(|d| d.unit == *unit && d.service == *service)
                    {
                        Some(record) => record.volume += value,
                        None => dispatch.push(DispatchRecord {
                            unit: unit.clone(),
                            service: *service,
                            volume: value,
                        }),
                    }
                }
                VarTag::InterconnectorFlow {
                    interconnector,
                    interval: 0,
                } => {
                    let value = session.get_value(var.id)?;
                    match flows
                        .iter_mut()
                        .find(|f| f.interconnector == *interconnector)
                    {
                        Some(record) => record.flow = value,
                        None => flows.push(FlowRecord {
                            interconnector: interconnector.clone(),
                            flow: value,
                            losses: 0.0,
                        }),
                    }
                }
                VarTag::InterconnectorLoss {
                    interconnector,
                    interval: 0,
                } => {
                    let value = session.get_value(var.id)?;
                    match flows
                        .iter_mut()
                        .find(|f| f.interconnector == *interconnector)
                    {
                        Some(record) => record.losses = value,
                        None => flows.push(FlowRecord {
                            interconnector: interconnector.clone(),
                            flow: 0.0,
                            losses: value,
                        }),
                    }
                }
                VarTag::CommitmentState { unit, interval } => {
                    commitment.push(CommitmentDecision {
                        unit: unit.clone(),
                        interval: *interval,
                        committed: session.get_value(var.id)? > 0.5,
                        started_up: false,
                        shut_down: false,
                    });
                }
                VarTag::CommitmentStartup { unit, interval } => {
                    let on = session.get_value(var.id)? > 0.5;
                    if let Some(decision) = commitment
                        .iter_mut()
                        .find(|c| c.unit == *unit && c.interval == *interval)
                    {
                        decision.started_up = on;
                    }
                }
                VarTag::CommitmentShutdown { unit, interval } => {
                    let off = session.get_value(var.id)? > 0.5;
                    if let Some(decision) = commitment
                        .iter_mut()
                        .find(|c| c.unit == *unit && c.interval == *interval)
                    {
                        decision.shut_down = off;
                    }
                }
                _ => {}
            }
        }

        Ok(MarketOutcome {
            objective_value: session.get_objective()?,
            solve_time_ms,
            solver_invocations: session.invocations(),
            dispatch,
            flows,
            commitment,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spot_core::{BidBand, BidRecord, DemandRecord, Service, UnitLimitRecord, UnitRecord};

    fn one_region_inputs() -> MarketInputs {
        let mut inputs = MarketInputs::new();
        inputs.units.push(UnitRecord {
            unit: "U1".into(),
            region: "A".into(),
        });
        inputs.bids.push(BidRecord {
            unit: "U1".into(),
            service: Service::Energy,
            bands: vec![BidBand {
                volume: 100.0,
                price: 30.0,
            }],
        });
        inputs.unit_limits.push(UnitLimitRecord {
            unit: "U1".into(),
            capacity: 100.0,
            initial_output: None,
            ramp_up_rate: None,
            ramp_down_rate: None,
        });
        inputs.demand.push(DemandRecord {
            region: "A".into(),
            demand: 60.0,
        });
        inputs
    }

    #[test]
    fn test_outcome_before_dispatch_is_sequencing_error() {
        let engine = DispatchEngine::new(one_region_inputs(), EngineConfig::default()).unwrap();
        assert!(matches!(
            engine.outcome(),
            Err(MarketError::Sequencing(_))
        ));
    }

    #[test]
    fn test_prices_before_dispatch_is_sequencing_error() {
        let mut engine = DispatchEngine::new(one_region_inputs(), EngineConfig::default()).unwrap();
        assert!(matches!(engine.prices(), Err(MarketError::Sequencing(_))));
    }

    #[test]
    fn test_single_market_clears_and_prices() {
        let mut engine = DispatchEngine::new(one_region_inputs(), EngineConfig::default()).unwrap();
        let outcome = engine.dispatch().unwrap();
        assert!((outcome.dispatch_of("U1", Service::Energy) - 60.0).abs() < 1e-4);
        assert!((outcome.objective_value - 1800.0).abs() < 1e-2);

        let prices = engine.prices().unwrap();
        assert!((prices.price_of("A", Service::Energy).unwrap() - 30.0).abs() < 1e-2);
    }

    #[test]
    fn test_prices_cached_across_calls() {
        let mut engine = DispatchEngine::new(one_region_inputs(), EngineConfig::default()).unwrap();
        engine.dispatch().unwrap();
        let first = engine.prices().unwrap().prices.clone();
        let second = engine.prices().unwrap().prices.clone();
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.price, b.price);
        }
    }

    #[test]
    fn test_duplicate_bid_rows_rejected_at_construction() {
        let mut inputs = one_region_inputs();
        inputs.bids.push(BidRecord {
            unit: "U1".into(),
            service: Service::Energy,
            bands: vec![BidBand {
                volume: 20.0,
                price: 45.0,
            }],
        });
        let err = DispatchEngine::new(inputs, EngineConfig::default()).unwrap_err();
        assert!(matches!(err, MarketError::Invariant { .. }), "{err}");
        assert!(err.to_string().contains("more than one energy bid row"), "{err}");
    }

    #[test]
    fn test_set_demand_resets_to_building() {
        let mut engine = DispatchEngine::new(one_region_inputs(), EngineConfig::default()).unwrap();
        engine.dispatch().unwrap();
        engine.set_demand("A", 80.0).unwrap();
        assert!(engine.outcome().is_err());
        let outcome = engine.dispatch().unwrap();
        assert!((outcome.dispatch_of("U1", Service::Energy) - 80.0).abs() < 1e-4);
    }
}
