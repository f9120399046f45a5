//! # spot-core: Shared types for the spot market-clearing engine
//!
//! This crate holds the leaf types shared across the engine workspace:
//!
//! - [`MarketError`] / [`MarketResult`]: the unified error type covering the
//!   engine's failure taxonomy (schema, invariant, sequencing, solver).
//! - [`IdRegistry`]: the single increasing id counter that variables and
//!   constraints draw from during a build.
//! - LP/MIP building blocks ([`DecisionVariable`], [`Constraint`],
//!   [`CoefficientRow`], [`Sos2Group`], [`BuilderOutput`]).
//! - The typed market input tables ([`MarketInputs`]) and their validation
//!   pipeline ([`validation::validate`]).
//!
//! The optimization logic itself lives in `spot-engine`; nothing in this
//! crate talks to a solver.

pub mod error;
pub mod ids;
pub mod model;
pub mod tables;
pub mod validation;

pub use error::{MarketError, MarketResult};
pub use ids::{ConstraintId, IdBlock, IdRegistry, VariableId};
pub use model::{
    Bounds, BuilderOutput, CoefficientRow, Constraint, DecisionVariable, MarketKey, Rhs, Sense,
    Sos2Group, VarKind, VarTag,
};
pub use validation::validate;

pub use tables::{
    BidBand, BidRecord, CommitmentRecord, DemandRecord, FcasRequirementRecord,
    InterconnectorRecord, LossFunction, LossModelRecord, MarketInputs, Service, TrapeziumRecord,
    UnitLimitRecord, UnitRecord,
};
