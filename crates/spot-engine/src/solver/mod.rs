//! Solver interface and backend selection.
//!
//! The engine talks to optimization backends through the [`SolverSession`]
//! trait only; swapping in another solver means implementing the trait, not
//! touching the builders or the pricer.
//!
//! # Problem Class Mapping
//!
//! | Market features | Problem Class | Backend |
//! |-----------------|---------------|---------|
//! | bids, ramping, FCAS | LinearProgram | Clarabel |
//! | interconnector losses (SOS2) | MixedInteger | microlp |
//! | unit commitment (binaries) | MixedInteger | microlp |
//!
//! Clarabel is an interior-point conic solver and handles the pure-LP market
//! quickly but cannot branch on integers; microlp is a pure-Rust MILP solver
//! that takes over as soon as the assembled problem carries binaries or SOS2
//! groups. Both run in-process with no native dependencies.

mod session;

pub use session::GoodLpSession;

use spot_core::{ConstraintId, MarketError, MarketResult, VariableId};

use crate::assembler::AssembledProblem;

/// Terminal status of one optimization run. Non-optimal outcomes are
/// reported verbatim, never coerced into a default solution.
#[derive(Debug, Clone, PartialEq)]
pub enum SolveStatus {
    Optimal,
    Infeasible,
    Unbounded,
    Error(String),
}

impl SolveStatus {
    /// Convert a non-optimal status into the matching error.
    pub fn require_optimal(self) -> MarketResult<()> {
        match self {
            SolveStatus::Optimal => Ok(()),
            SolveStatus::Infeasible => Err(MarketError::Infeasible(
                "no feasible dispatch satisfies all constraints".into(),
            )),
            SolveStatus::Unbounded => Err(MarketError::Unbounded(
                "objective is unbounded below".into(),
            )),
            SolveStatus::Error(detail) => Err(MarketError::Solver(detail)),
        }
    }
}

/// Class of the assembled optimization problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProblemClass {
    LinearProgram,
    MixedInteger,
}

/// Available in-process backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverBackend {
    /// Interior-point conic solver; pure-LP problems.
    Clarabel,
    /// Pure-Rust MILP solver; problems with binaries or SOS2 groups.
    Microlp,
}

/// Classify an assembled problem.
pub fn classify(problem: &AssembledProblem) -> ProblemClass {
    if problem.needs_integer_support() {
        ProblemClass::MixedInteger
    } else {
        ProblemClass::LinearProgram
    }
}

/// The backend handling a problem class.
pub fn backend_for(class: ProblemClass) -> SolverBackend {
    match class {
        ProblemClass::LinearProgram => SolverBackend::Clarabel,
        ProblemClass::MixedInteger => SolverBackend::Microlp,
    }
}

/// Abstract solver session: load a problem, optimize, query the solution,
/// nudge a rhs and re-optimize. The session owns the loaded problem and
/// stays consistent across repeated `set_rhs`/`optimize` rounds, which is
/// what perturbation pricing relies on.
pub trait SolverSession {
    fn add_variables(&mut self, variables: &[spot_core::DecisionVariable]);

    fn add_constraints(
        &mut self,
        constraints: &[crate::assembler::ResolvedConstraint],
        coefficients: &[spot_core::CoefficientRow],
    );

    fn add_sos2_group(&mut self, group: &spot_core::Sos2Group);

    /// Replace the minimized objective with the given linear terms.
    fn set_objective(&mut self, terms: &[(VariableId, f64)]);

    /// Overwrite one constraint's rhs. Takes effect at the next `optimize`.
    fn set_rhs(&mut self, constraint: ConstraintId, rhs: f64) -> MarketResult<()>;

    /// Current rhs of one constraint.
    fn rhs(&self, constraint: ConstraintId) -> MarketResult<f64>;

    fn optimize(&mut self) -> SolveStatus;

    /// Solved value of one variable. Errors before the first optimal solve.
    fn get_value(&self, variable: VariableId) -> MarketResult<f64>;

    /// Objective value of the latest optimal solve.
    fn get_objective(&self) -> MarketResult<f64>;

    /// Number of `optimize` calls made so far.
    fn invocations(&self) -> usize;
}

/// Load an assembled problem into a session on the backend its class calls
/// for.
pub fn session_for(problem: &AssembledProblem) -> GoodLpSession {
    let backend = backend_for(classify(problem));
    let mut session = GoodLpSession::new(backend);
    session.add_variables(&problem.variables);
    session.add_constraints(&problem.constraints, &problem.coefficients);
    for group in &problem.sos2_groups {
        session.add_sos2_group(group);
    }
    let terms: Vec<(VariableId, f64)> = problem
        .variables
        .iter()
        .filter_map(|v| v.objective.map(|c| (v.id, c)))
        .collect();
    session.set_objective(&terms);
    session
}

#[cfg(test)]
mod tests {
    use super::*;
    use spot_core::{Bounds, BuilderOutput, DecisionVariable, Service, VarTag};

    #[test]
    fn test_backend_routing() {
        assert_eq!(
            backend_for(ProblemClass::LinearProgram),
            SolverBackend::Clarabel
        );
        assert_eq!(
            backend_for(ProblemClass::MixedInteger),
            SolverBackend::Microlp
        );
    }

    #[test]
    fn test_classification_follows_integer_support() {
        let mut out = BuilderOutput::new();
        out.push_variable(DecisionVariable::continuous(
            VariableId::new(0),
            Bounds::non_negative(1.0),
            VarTag::BidBand {
                unit: "U1".into(),
                service: Service::Energy,
                band: 0,
                interval: 0,
            },
        ));
        let lp = crate::assembler::assemble(out.clone()).unwrap();
        assert_eq!(classify(&lp), ProblemClass::LinearProgram);

        out.push_variable(DecisionVariable::binary(
            VariableId::new(1),
            VarTag::CommitmentState {
                unit: "U1".into(),
                interval: 0,
            },
        ));
        let mip = crate::assembler::assemble(out).unwrap();
        assert_eq!(classify(&mip), ProblemClass::MixedInteger);
    }

    #[test]
    fn test_require_optimal_mapping() {
        assert!(SolveStatus::Optimal.require_optimal().is_ok());
        assert!(matches!(
            SolveStatus::Infeasible.require_optimal(),
            Err(MarketError::Infeasible(_))
        ));
        assert!(matches!(
            SolveStatus::Unbounded.require_optimal(),
            Err(MarketError::Unbounded(_))
        ));
    }
}
