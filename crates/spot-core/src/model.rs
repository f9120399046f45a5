//! LP/MIP building blocks shared by the constraint builders and the
//! assembler.
//!
//! A build produces bags of [`DecisionVariable`]s, [`Constraint`]s,
//! [`CoefficientRow`]s and [`Sos2Group`]s, collected in a [`BuilderOutput`].
//! Constraints are append-only; a constraint whose rhs references another
//! variable's solved value carries [`Rhs::VariableRef`] and is resolved to
//! standard form once, at assembly.

use serde::Serialize;

use crate::ids::{ConstraintId, VariableId};
use crate::tables::Service;

/// Lower/upper bounds of a decision variable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub lower: f64,
    pub upper: f64,
}

impl Bounds {
    pub fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    /// Non-negative bounds [0, upper].
    pub fn non_negative(upper: f64) -> Self {
        Self::new(0.0, upper)
    }

    /// Binary bounds [0, 1].
    pub fn binary() -> Self {
        Self::new(0.0, 1.0)
    }
}

/// Numeric type of a decision variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VarKind {
    Continuous,
    Binary,
}

/// Business meaning of a decision variable, used only for result
/// attribution after the solve. The solver never inspects tags.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum VarTag {
    /// Dispatch of one bid band of a unit/service at interval `t`.
    BidBand {
        unit: String,
        service: Service,
        band: usize,
        interval: usize,
    },
    /// Directed flow on an interconnector at interval `t`.
    InterconnectorFlow { interconnector: String, interval: usize },
    /// One convex-combination weight of an interconnector's loss model.
    LossWeight {
        interconnector: String,
        breakpoint: usize,
        interval: usize,
    },
    /// Total losses on an interconnector at interval `t`.
    InterconnectorLoss { interconnector: String, interval: usize },
    /// Unit-commitment on/off state bit.
    CommitmentState { unit: String, interval: usize },
    /// Unit-commitment start-up indicator.
    CommitmentStartup { unit: String, interval: usize },
    /// Unit-commitment shutdown indicator.
    CommitmentShutdown { unit: String, interval: usize },
    /// Penalized violation of a market constraint (elastic mode).
    Deficit { constraint: String },
}

/// A bounded continuous or binary quantity created once at build time.
///
/// Bounds are immutable after creation, with one exception: unit commitment
/// may tighten a state bit's bounds once minimum-loading behavior and the
/// unit's initial state are known.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionVariable {
    pub id: VariableId,
    pub bounds: Bounds,
    pub kind: VarKind,
    /// Coefficient in the minimized objective; `None` means not costed.
    pub objective: Option<f64>,
    pub tag: VarTag,
}

impl DecisionVariable {
    pub fn continuous(id: VariableId, bounds: Bounds, tag: VarTag) -> Self {
        Self {
            id,
            bounds,
            kind: VarKind::Continuous,
            objective: None,
            tag,
        }
    }

    pub fn binary(id: VariableId, tag: VarTag) -> Self {
        Self {
            id,
            bounds: Bounds::binary(),
            kind: VarKind::Binary,
            objective: None,
            tag,
        }
    }

    pub fn with_objective(mut self, cost: f64) -> Self {
        self.objective = Some(cost);
        self
    }
}

/// Relational type of a constraint row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Sense {
    LessEqual,
    GreaterEqual,
    Equal,
}

impl std::fmt::Display for Sense {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sense::LessEqual => write!(f, "<="),
            Sense::GreaterEqual => write!(f, ">="),
            Sense::Equal => write!(f, "="),
        }
    }
}

/// Right-hand side of a constraint: a literal, or a reference to another
/// variable's solved value (dynamic rhs). A `VariableRef` is a placeholder
/// that the assembler substitutes into standard form exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Rhs {
    Literal(f64),
    VariableRef(VariableId),
}

/// A constraint row: id, sense, rhs.
#[derive(Debug, Clone, Serialize)]
pub struct Constraint {
    pub id: ConstraintId,
    pub sense: Sense,
    pub rhs: Rhs,
    /// Market constraints carry the (region, service, interval) keys whose
    /// clearing price they define. Usually one key; a pooled FCAS
    /// requirement set attributes its price to every member region.
    /// Structural constraints carry none.
    pub markets: Vec<MarketKey>,
}

impl Constraint {
    pub fn structural(id: ConstraintId, sense: Sense, rhs: f64) -> Self {
        Self {
            id,
            sense,
            rhs: Rhs::Literal(rhs),
            markets: Vec::new(),
        }
    }

    pub fn dynamic(id: ConstraintId, sense: Sense, variable: VariableId) -> Self {
        Self {
            id,
            sense,
            rhs: Rhs::VariableRef(variable),
            markets: Vec::new(),
        }
    }

    pub fn market(id: ConstraintId, sense: Sense, rhs: f64, key: MarketKey) -> Self {
        Self {
            id,
            sense,
            rhs: Rhs::Literal(rhs),
            markets: vec![key],
        }
    }

    /// A market constraint whose price belongs to several (region, service)
    /// pairs at once.
    pub fn pooled_market(id: ConstraintId, sense: Sense, rhs: f64, keys: Vec<MarketKey>) -> Self {
        Self {
            id,
            sense,
            rhs: Rhs::Literal(rhs),
            markets: keys,
        }
    }

    pub fn is_market(&self) -> bool {
        !self.markets.is_empty()
    }
}

/// (region, service, interval) triple identifying a market constraint.
/// Prices are published from interval 0; later intervals keep their keys so
/// elastic relaxation can find every market row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct MarketKey {
    pub region: String,
    pub service: Service,
    pub interval: usize,
}

/// One sparse coefficient matrix entry.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CoefficientRow {
    pub variable: VariableId,
    pub constraint: ConstraintId,
    pub coefficient: f64,
}

impl CoefficientRow {
    pub fn new(variable: VariableId, constraint: ConstraintId, coefficient: f64) -> Self {
        Self {
            variable,
            constraint,
            coefficient,
        }
    }
}

/// Special-ordered set of type 2: at most two adjacent member variables may
/// be non-zero. One group per interconnector loss model.
#[derive(Debug, Clone, Serialize)]
pub struct Sos2Group {
    /// Business key of the owning interconnector.
    pub key: String,
    /// Member weight variables in breakpoint order.
    pub members: Vec<VariableId>,
}

/// The output of one constraint builder: variables, constraint rows, sparse
/// coefficients and SOS2 groups. Builders are pure and independent; their
/// outputs are merged by the assembler.
#[derive(Debug, Clone, Default)]
pub struct BuilderOutput {
    pub variables: Vec<DecisionVariable>,
    pub constraints: Vec<Constraint>,
    pub coefficients: Vec<CoefficientRow>,
    pub sos2_groups: Vec<Sos2Group>,
}

impl BuilderOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append another builder's output.
    pub fn merge(&mut self, other: BuilderOutput) {
        self.variables.extend(other.variables);
        self.constraints.extend(other.constraints);
        self.coefficients.extend(other.coefficients);
        self.sos2_groups.extend(other.sos2_groups);
    }

    pub fn push_variable(&mut self, var: DecisionVariable) {
        self.variables.push(var);
    }

    pub fn push_constraint(&mut self, constraint: Constraint) {
        self.constraints.push(constraint);
    }

    pub fn push_coefficient(&mut self, variable: VariableId, constraint: ConstraintId, value: f64) {
        self.coefficients
            .push(CoefficientRow::new(variable, constraint, value));
    }

    pub fn push_sos2(&mut self, group: Sos2Group) {
        self.sos2_groups.push(group);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_concatenates() {
        let mut a = BuilderOutput::new();
        a.push_variable(DecisionVariable::continuous(
            VariableId::new(0),
            Bounds::non_negative(10.0),
            VarTag::BidBand {
                unit: "A".into(),
                service: Service::Energy,
                band: 0,
                interval: 0,
            },
        ));
        let mut b = BuilderOutput::new();
        b.push_constraint(Constraint::structural(
            ConstraintId::new(1),
            Sense::LessEqual,
            10.0,
        ));
        b.push_coefficient(VariableId::new(0), ConstraintId::new(1), 1.0);

        a.merge(b);
        assert_eq!(a.variables.len(), 1);
        assert_eq!(a.constraints.len(), 1);
        assert_eq!(a.coefficients.len(), 1);
    }

    #[test]
    fn test_dynamic_rhs_variant() {
        let c = Constraint::dynamic(ConstraintId::new(7), Sense::Equal, VariableId::new(3));
        assert_eq!(c.rhs, Rhs::VariableRef(VariableId::new(3)));
        assert!(!c.is_market());
    }

    #[test]
    fn test_binary_variable_bounds() {
        let v = DecisionVariable::binary(
            VariableId::new(5),
            VarTag::CommitmentState {
                unit: "U1".into(),
                interval: 0,
            },
        );
        assert_eq!(v.kind, VarKind::Binary);
        assert_eq!(v.bounds, Bounds::new(0.0, 1.0));
        assert!(v.objective.is_none());
    }
}
