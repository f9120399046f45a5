//! Assembly of builder outputs into one solver-ready problem.
//!
//! The assembler is the single point where dynamic right-hand sides are
//! resolved to standard form: a constraint `expr = var` becomes
//! `expr - var = 0` by moving the referenced variable to the LHS with
//! coefficient -1. It also validates the merged outputs' referential
//! integrity so a builder bug surfaces here, as a structured error, rather
//! than as a solver-side panic.

use std::collections::{HashMap, HashSet};

use spot_core::{
    BuilderOutput, CoefficientRow, ConstraintId, DecisionVariable, MarketError, MarketKey,
    MarketResult, Rhs, Sense, Sos2Group, VarKind, VariableId,
};
use tracing::debug;

/// A constraint in standard form: every rhs is a literal.
#[derive(Debug, Clone)]
pub struct ResolvedConstraint {
    pub id: ConstraintId,
    pub sense: Sense,
    pub rhs: f64,
    pub markets: Vec<MarketKey>,
}

impl ResolvedConstraint {
    pub fn is_market(&self) -> bool {
        !self.markets.is_empty()
    }
}

/// The complete solver-ready problem: bounded variables, standard-form
/// constraints, sparse coefficients, SOS2 groups.
#[derive(Debug, Clone)]
pub struct AssembledProblem {
    pub variables: Vec<DecisionVariable>,
    pub constraints: Vec<ResolvedConstraint>,
    pub coefficients: Vec<CoefficientRow>,
    pub sos2_groups: Vec<Sos2Group>,
}

impl AssembledProblem {
    /// Whether the problem needs a MIP-capable backend.
    pub fn needs_integer_support(&self) -> bool {
        !self.sos2_groups.is_empty()
            || self.variables.iter().any(|v| v.kind == VarKind::Binary)
    }

    /// The market constraints whose shadow prices are published.
    pub fn market_constraints(&self) -> impl Iterator<Item = &ResolvedConstraint> {
        self.constraints.iter().filter(|c| c.is_market())
    }
}

/// Resolve and validate one merged builder output.
pub fn assemble(output: BuilderOutput) -> MarketResult<AssembledProblem> {
    let BuilderOutput {
        variables,
        constraints,
        mut coefficients,
        sos2_groups,
    } = output;

    let mut variable_ids: HashSet<VariableId> = HashSet::with_capacity(variables.len());
    for var in &variables {
        if !variable_ids.insert(var.id) {
            return Err(MarketError::Other(format!(
                "duplicate variable id {}",
                var.id
            )));
        }
    }

    let mut constraint_ids: HashSet<ConstraintId> = HashSet::with_capacity(constraints.len());
    let mut resolved = Vec::with_capacity(constraints.len());
    for constraint in constraints {
        if !constraint_ids.insert(constraint.id) {
            return Err(MarketError::Other(format!(
                "duplicate constraint id {}",
                constraint.id
            )));
        }
        let rhs = match constraint.rhs {
            Rhs::Literal(value) => value,
            Rhs::VariableRef(var) => {
                if !variable_ids.contains(&var) {
                    return Err(MarketError::UnresolvedId(format!(
                        "dynamic rhs of {} references undeclared {}",
                        constraint.id, var
                    )));
                }
                coefficients.push(CoefficientRow::new(var, constraint.id, -1.0));
                0.0
            }
        };
        resolved.push(ResolvedConstraint {
            id: constraint.id,
            sense: constraint.sense,
            rhs,
            markets: constraint.markets,
        });
    }

    for row in &coefficients {
        if !variable_ids.contains(&row.variable) {
            return Err(MarketError::UnresolvedId(format!(
                "coefficient references undeclared {}",
                row.variable
            )));
        }
        if !constraint_ids.contains(&row.constraint) {
            return Err(MarketError::UnresolvedId(format!(
                "coefficient references undeclared {}",
                row.constraint
            )));
        }
    }

    for group in &sos2_groups {
        for member in &group.members {
            if !variable_ids.contains(member) {
                return Err(MarketError::UnresolvedId(format!(
                    "SOS2 group '{}' references undeclared {}",
                    group.key, member
                )));
            }
        }
    }

    debug!(
        variables = variables.len(),
        constraints = resolved.len(),
        coefficients = coefficients.len(),
        sos2 = sos2_groups.len(),
        "assembled problem"
    );
    Ok(AssembledProblem {
        variables,
        constraints: resolved,
        coefficients,
        sos2_groups,
    })
}

/// Coefficients of one constraint, keyed by variable.
pub fn row_coefficients(
    problem: &AssembledProblem,
    constraint: ConstraintId,
) -> HashMap<VariableId, f64> {
    let mut map = HashMap::new();
    for row in &problem.coefficients {
        if row.constraint == constraint {
            *map.entry(row.variable).or_insert(0.0) += row.coefficient;
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use spot_core::{Bounds, Constraint, Service, VarTag};

    fn variable(id: u64) -> DecisionVariable {
        DecisionVariable::continuous(
            VariableId::new(id),
            Bounds::non_negative(10.0),
            VarTag::BidBand {
                unit: "U1".into(),
                service: Service::Energy,
                band: id as usize,
                interval: 0,
            },
        )
    }

    #[test]
    fn test_dynamic_rhs_moved_to_lhs() {
        let mut out = BuilderOutput::new();
        out.push_variable(variable(0));
        out.push_variable(variable(1));
        out.push_constraint(Constraint::dynamic(
            ConstraintId::new(2),
            Sense::Equal,
            VariableId::new(1),
        ));
        out.push_coefficient(VariableId::new(0), ConstraintId::new(2), 3.0);

        let problem = assemble(out).unwrap();
        assert_eq!(problem.constraints[0].rhs, 0.0);
        let coeffs = row_coefficients(&problem, ConstraintId::new(2));
        assert_eq!(coeffs[&VariableId::new(0)], 3.0);
        assert_eq!(coeffs[&VariableId::new(1)], -1.0);
    }

    #[test]
    fn test_duplicate_constraint_id_rejected() {
        let mut out = BuilderOutput::new();
        out.push_constraint(Constraint::structural(
            ConstraintId::new(0),
            Sense::LessEqual,
            1.0,
        ));
        out.push_constraint(Constraint::structural(
            ConstraintId::new(0),
            Sense::Equal,
            2.0,
        ));
        assert!(assemble(out).is_err());
    }

    #[test]
    fn test_orphan_coefficient_rejected() {
        let mut out = BuilderOutput::new();
        out.push_variable(variable(0));
        out.push_constraint(Constraint::structural(
            ConstraintId::new(1),
            Sense::LessEqual,
            1.0,
        ));
        out.push_coefficient(VariableId::new(9), ConstraintId::new(1), 1.0);
        let err = assemble(out).unwrap_err();
        assert!(matches!(err, MarketError::UnresolvedId(_)));
    }

    #[test]
    fn test_integer_support_detection() {
        let mut out = BuilderOutput::new();
        out.push_variable(variable(0));
        let pure_lp = assemble(out.clone()).unwrap();
        assert!(!pure_lp.needs_integer_support());

        out.push_variable(DecisionVariable::binary(
            VariableId::new(1),
            VarTag::CommitmentState {
                unit: "U1".into(),
                interval: 0,
            },
        ));
        let mip = assemble(out).unwrap();
        assert!(mip.needs_integer_support());
    }
}
