//! good_lp-backed solver session.
//!
//! The session stores the loaded problem in its own sparse form and rebuilds
//! the good_lp model on every `optimize` call. good_lp models are consumed
//! by `solve()`, so keeping our own copy is what makes the
//! `set_rhs`/re-optimize cycle of perturbation pricing possible.
//!
//! SOS2 groups are lowered at model-build time into segment-activation
//! binaries: one binary per adjacent breakpoint pair, exactly one active,
//! and each weight ceilinged by the binaries of the segments it borders.
//! That allows at most two non-zero weights and forces them adjacent.

use std::collections::HashMap;

use good_lp::solvers::clarabel::clarabel;
use good_lp::solvers::microlp::microlp;
use good_lp::{
    constraint, variable, variables, Expression, ResolutionError, Solution, SolverModel, Variable,
};
use spot_core::{
    CoefficientRow, ConstraintId, DecisionVariable, MarketError, MarketResult, Sos2Group, Sense,
    VarKind, VariableId,
};
use tracing::{debug, trace};

use crate::assembler::ResolvedConstraint;
use crate::solver::{SolveStatus, SolverBackend, SolverSession};

#[derive(Debug)]
struct SessionRow {
    sense: Sense,
    rhs: f64,
    terms: Vec<(VariableId, f64)>,
}

/// A solver session holding one loaded problem.
#[derive(Debug)]
pub struct GoodLpSession {
    backend: SolverBackend,
    variables: Vec<DecisionVariable>,
    rows: Vec<SessionRow>,
    row_index: HashMap<ConstraintId, usize>,
    sos2: Vec<Sos2Group>,
    objective: Vec<(VariableId, f64)>,
    values: Option<HashMap<VariableId, f64>>,
    objective_value: Option<f64>,
    invocations: usize,
}

impl GoodLpSession {
    pub fn new(backend: SolverBackend) -> Self {
        Self {
            backend,
            variables: Vec::new(),
            rows: Vec::new(),
            row_index: HashMap::new(),
            sos2: Vec::new(),
            objective: Vec::new(),
            values: None,
            objective_value: None,
            invocations: 0,
        }
    }

    pub fn backend(&self) -> SolverBackend {
        self.backend
    }

    /// Register variables into a fresh good_lp model.
    fn add_model_variables(
        &self,
        vars: &mut good_lp::ProblemVariables,
    ) -> HashMap<VariableId, Variable> {
        let mut handles = HashMap::with_capacity(self.variables.len());
        for v in &self.variables {
            let handle = match v.kind {
                VarKind::Binary if v.bounds.lower == 0.0 && v.bounds.upper == 1.0 => {
                    vars.add(variable().binary())
                }
                // A binary with tightened bounds (a forced commitment state)
                // is an integer pinned to its bound.
                VarKind::Binary => vars.add(
                    variable()
                        .integer()
                        .min(v.bounds.lower)
                        .max(v.bounds.upper),
                ),
                VarKind::Continuous => {
                    let mut def = variable().min(v.bounds.lower);
                    if v.bounds.upper.is_finite() {
                        def = def.max(v.bounds.upper);
                    }
                    vars.add(def)
                }
            };
            handles.insert(v.id, handle);
        }
        handles
    }

    /// All constraint rows of the model: the loaded problem plus the SOS2
    /// lowering.
    fn build_rows(
        &self,
        vars: &mut good_lp::ProblemVariables,
        handles: &HashMap<VariableId, Variable>,
    ) -> Vec<good_lp::Constraint> {
        let mut out = Vec::with_capacity(self.rows.len() + 3 * self.sos2.len());

        for row in &self.rows {
            let mut expr = Expression::from(0.0);
            for (var, coeff) in &row.terms {
                expr += *coeff * handles[var];
            }
            out.push(match row.sense {
                Sense::LessEqual => constraint!(expr <= row.rhs),
                Sense::GreaterEqual => constraint!(expr >= row.rhs),
                Sense::Equal => constraint!(expr == row.rhs),
            });
        }

        for group in &self.sos2 {
            let segments = group.members.len() - 1;
            let binaries: Vec<Variable> =
                (0..segments).map(|_| vars.add(variable().binary())).collect();

            let mut one_active = Expression::from(0.0);
            for y in &binaries {
                one_active += *y;
            }
            out.push(constraint!(one_active == 1.0));

            for (i, member) in group.members.iter().enumerate() {
                let mut ceiling = Expression::from(0.0);
                if i > 0 {
                    ceiling += binaries[i - 1];
                }
                if i < segments {
                    ceiling += binaries[i];
                }
                let w = handles[member];
                out.push(constraint!(w - ceiling <= 0.0));
            }
        }

        out
    }

    fn conclude<S: Solution>(
        &mut self,
        outcome: Result<S, ResolutionError>,
        handles: &HashMap<VariableId, Variable>,
    ) -> SolveStatus {
        match outcome {
            Ok(solution) => {
                let values: HashMap<VariableId, f64> = handles
                    .iter()
                    .map(|(id, handle)| (*id, solution.value(*handle)))
                    .collect();
                let objective: f64 = self
                    .objective
                    .iter()
                    .map(|(id, coeff)| coeff * values.get(id).copied().unwrap_or(0.0))
                    .sum();
                self.values = Some(values);
                self.objective_value = Some(objective);
                SolveStatus::Optimal
            }
            Err(ResolutionError::Infeasible) => SolveStatus::Infeasible,
            Err(ResolutionError::Unbounded) => SolveStatus::Unbounded,
            Err(other) => SolveStatus::Error(format!("{other:?}")),
        }
    }
}

impl SolverSession for GoodLpSession {
    fn add_variables(&mut self, variables: &[DecisionVariable]) {
        self.variables.extend_from_slice(variables);
    }

    fn add_constraints(
        &mut self,
        constraints: &[ResolvedConstraint],
        coefficients: &[CoefficientRow],
    ) {
        let mut terms: HashMap<ConstraintId, Vec<(VariableId, f64)>> = HashMap::new();
        for row in coefficients {
            terms
                .entry(row.constraint)
                .or_default()
                .push((row.variable, row.coefficient));
        }
        for constraint in constraints {
            self.row_index.insert(constraint.id, self.rows.len());
            self.rows.push(SessionRow {
                sense: constraint.sense,
                rhs: constraint.rhs,
                terms: terms.remove(&constraint.id).unwrap_or_default(),
            });
        }
    }

    fn add_sos2_group(&mut self, group: &Sos2Group) {
        self.sos2.push(group.clone());
    }

    fn set_objective(&mut self, terms: &[(VariableId, f64)]) {
        self.objective = terms.to_vec();
    }

    fn set_rhs(&mut self, constraint: ConstraintId, rhs: f64) -> MarketResult<()> {
        let index = self
            .row_index
            .get(&constraint)
            .copied()
            .ok_or_else(|| MarketError::UnresolvedId(constraint.to_string()))?;
        trace!(%constraint, rhs, "rhs overwritten");
        self.rows[index].rhs = rhs;
        Ok(())
    }

    fn rhs(&self, constraint: ConstraintId) -> MarketResult<f64> {
        let index = self
            .row_index
            .get(&constraint)
            .copied()
            .ok_or_else(|| MarketError::UnresolvedId(constraint.to_string()))?;
        Ok(self.rows[index].rhs)
    }

    fn optimize(&mut self) -> SolveStatus {
        self.invocations += 1;

        let mut vars = variables!();
        let handles = self.add_model_variables(&mut vars);
        let rows = self.build_rows(&mut vars, &handles);

        let mut objective = Expression::from(0.0);
        for (id, coeff) in &self.objective {
            objective += *coeff * handles[id];
        }

        debug!(
            backend = ?self.backend,
            variables = handles.len(),
            constraints = rows.len(),
            invocation = self.invocations,
            "optimizing"
        );
        match self.backend {
            SolverBackend::Clarabel => {
                let mut model = vars.minimise(objective).using(clarabel);
                for row in rows {
                    model = model.with(row);
                }
                let outcome = model.solve();
                self.conclude(outcome, &handles)
            }
            SolverBackend::Microlp => {
                let mut model = vars.minimise(objective).using(microlp);
                for row in rows {
                    model = model.with(row);
                }
                let outcome = model.solve();
                self.conclude(outcome, &handles)
            }
        }
    }

    fn get_value(&self, variable: VariableId) -> MarketResult<f64> {
        self.values
            .as_ref()
            .ok_or_else(|| MarketError::Sequencing("value requested before an optimal solve".into()))?
            .get(&variable)
            .copied()
            .ok_or_else(|| MarketError::UnresolvedId(variable.to_string()))
    }

    fn get_objective(&self) -> MarketResult<f64> {
        self.objective_value.ok_or_else(|| {
            MarketError::Sequencing("objective requested before an optimal solve".into())
        })
    }

    fn invocations(&self) -> usize {
        self.invocations
    }
}
