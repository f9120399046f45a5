//! # spot-engine: Multi-region electricity market clearing
//!
//! This crate clears a co-optimized energy/FCAS spot market: volume/price
//! bids, ramp and capacity limits, FCAS trapezia, lossy interconnectors and
//! unit-commitment decisions are compiled into one linear (or mixed-integer)
//! program, solved, and read back as tabular dispatch, flow and price
//! results.
//!
//! ## Pipeline
//!
//! | Stage | Module | What it does |
//! |-------|--------|--------------|
//! | build | [`builders`], [`linearizer`] | tables to variables/rows |
//! | assemble | [`assembler`] | merge, resolve dynamic rhs, validate ids |
//! | solve | [`solver`] | backend selection, good_lp session |
//! | price | [`pricing`] | perturbation-based shadow prices |
//! | orchestrate | [`dispatch`] | phase machine, tabular outcomes |
//!
//! ## Example
//!
//! ```no_run
//! use spot_core::{BidBand, BidRecord, DemandRecord, MarketInputs, Service,
//!     UnitLimitRecord, UnitRecord};
//! use spot_engine::{DispatchEngine, EngineConfig};
//!
//! # fn main() -> spot_core::MarketResult<()> {
//! let mut inputs = MarketInputs::new();
//! inputs.units.push(UnitRecord { unit: "A".into(), region: "NSW".into() });
//! inputs.bids.push(BidRecord {
//!     unit: "A".into(),
//!     service: Service::Energy,
//!     bands: vec![BidBand { volume: 120.0, price: 55.0 }],
//! });
//! inputs.unit_limits.push(UnitLimitRecord {
//!     unit: "A".into(),
//!     capacity: 120.0,
//!     initial_output: None,
//!     ramp_up_rate: None,
//!     ramp_down_rate: None,
//! });
//! inputs.demand.push(DemandRecord { region: "NSW".into(), demand: 100.0 });
//!
//! let mut engine = DispatchEngine::new(inputs, EngineConfig::default())?;
//! let outcome = engine.dispatch()?;
//! println!("cleared {} MW", outcome.total_dispatch(Service::Energy));
//! let prices = engine.prices()?;
//! println!("NSW energy: {:?} $/MWh", prices.price_of("NSW", Service::Energy));
//! # Ok(())
//! # }
//! ```
//!
//! ## Prices without duals
//!
//! Clearing prices come from perturb-and-resolve (bump a market constraint's
//! rhs by 1 MW, diff the objectives), not from LP duals: unit-commitment
//! binaries and the SOS2 loss lowering make duals meaningless exactly when
//! the market is most interesting.

pub mod assembler;
pub mod builders;
pub mod config;
pub mod dispatch;
pub mod linearizer;
pub mod pricing;
pub mod results;
pub mod solver;

pub use config::EngineConfig;
pub use dispatch::fixed_point::{solve_coupled, DemandCoupler, FixedPointConfig};
pub use dispatch::DispatchEngine;
pub use results::{
    CommitmentDecision, DispatchRecord, FlowRecord, MarketOutcome, PriceRecord, PriceSchedule,
};
pub use solver::{ProblemClass, SolveStatus, SolverBackend, SolverSession};
