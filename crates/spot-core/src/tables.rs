//! Typed market input tables.
//!
//! The engine's boundary is an in-process tabular contract: the surrounding
//! layers (case-file parsing, historical ingestion, forecasting) hand over
//! already-parsed rows as the record types below. Records derive
//! `Deserialize` with `deny_unknown_fields` so an unexpected column in a
//! serialized table is rejected as a schema error rather than silently
//! dropped.

use serde::{Deserialize, Serialize};

/// A market service co-optimized by the engine.
///
/// Regulation services continuously follow frequency deviations and are
/// coupled to energy through joint-ramping constraints; contingency services
/// are enablement-limited through the FCAS trapezium.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Service {
    Energy,
    RaiseReg,
    LowerReg,
    RaiseContingency,
    LowerContingency,
}

impl Service {
    pub fn is_energy(self) -> bool {
        matches!(self, Service::Energy)
    }

    pub fn is_regulation(self) -> bool {
        matches!(self, Service::RaiseReg | Service::LowerReg)
    }

    pub fn is_contingency(self) -> bool {
        matches!(self, Service::RaiseContingency | Service::LowerContingency)
    }

    /// Raise services add headroom above energy; lower services below.
    pub fn is_raise(self) -> bool {
        matches!(self, Service::RaiseReg | Service::RaiseContingency)
    }
}

impl std::fmt::Display for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Service::Energy => write!(f, "energy"),
            Service::RaiseReg => write!(f, "raise_reg"),
            Service::LowerReg => write!(f, "lower_reg"),
            Service::RaiseContingency => write!(f, "raise_contingency"),
            Service::LowerContingency => write!(f, "lower_contingency"),
        }
    }
}

/// Unit reference: which region a dispatchable unit lives in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UnitRecord {
    pub unit: String,
    pub region: String,
}

/// One priced tranche of offered volume.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BidBand {
    /// Offered volume (MW), >= 0.
    pub volume: f64,
    /// Offer price ($/MWh); non-decreasing across a unit/service's bands.
    pub price: f64,
}

/// Volume/price bid of one unit for one service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BidRecord {
    pub unit: String,
    pub service: Service,
    pub bands: Vec<BidBand>,
}

/// Physical limits of a unit: capacity, plus optional ramp behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UnitLimitRecord {
    pub unit: String,
    /// Nameplate capacity (MW).
    pub capacity: f64,
    /// Output at the start of the dispatch interval (MW). Required when ramp
    /// rates are given.
    #[serde(default)]
    pub initial_output: Option<f64>,
    /// Ramp-up rate (MW/h).
    #[serde(default)]
    pub ramp_up_rate: Option<f64>,
    /// Ramp-down rate (MW/h).
    #[serde(default)]
    pub ramp_down_rate: Option<f64>,
}

/// Minimum-operating-level behavior of a unit. Declaring a record here puts
/// the unit under unit-commitment modelling for the whole planning horizon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommitmentRecord {
    pub unit: String,
    /// Minimum stable loading while committed (MW).
    pub min_loading: f64,
    /// Ramp rate available while starting up (MW/h).
    pub startup_ramp_rate: f64,
    /// Ramp rate available while shutting down (MW/h).
    pub shutdown_ramp_rate: f64,
    /// Minimum time committed once started (minutes).
    pub min_up_time: f64,
    /// Minimum time offline once stopped (minutes).
    pub min_down_time: f64,
    /// Whether the unit is committed at the start of the horizon.
    pub initial_state: bool,
    /// Minutes the unit has already been up (when initially committed).
    #[serde(default)]
    pub initial_up_time: f64,
    /// Minutes the unit has already been down (when initially offline).
    #[serde(default)]
    pub initial_down_time: f64,
}

/// Regional energy demand.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DemandRecord {
    pub region: String,
    /// Demand (MW), >= 0.
    pub demand: f64,
}

/// Membership row of an FCAS requirement set. Rows sharing a `set_id` pool
/// their regions into a single market constraint for the named service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FcasRequirementRecord {
    pub set_id: String,
    pub region: String,
    pub service: Service,
    /// Required volume (MW) of the whole set.
    pub volume: f64,
}

/// Feasible (energy, FCAS) region of one unit/service, defined by four
/// ordered breakpoints and a max availability.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrapeziumRecord {
    pub unit: String,
    pub service: Service,
    /// Peak FCAS availability (MW), > 0.
    pub max_availability: f64,
    /// Energy level at which FCAS provision may begin.
    pub enablement_min: f64,
    /// Energy level at which full availability is first reached.
    pub low_breakpoint: f64,
    /// Energy level at which full availability is last held.
    pub high_breakpoint: f64,
    /// Energy level at which FCAS provision must cease.
    pub enablement_max: f64,
}

/// Directed lossy link between two regions. Positive flow runs from
/// `from_region` to `to_region`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InterconnectorRecord {
    pub interconnector: String,
    pub from_region: String,
    pub to_region: String,
    /// Most negative allowed flow (MW), i.e. reverse direction limit.
    pub min_flow: f64,
    /// Most positive allowed flow (MW).
    pub max_flow: f64,
}

/// Loss function of an interconnector, represented as data so the model is
/// deterministic and serializable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossFunction {
    /// loss = rate * |flow|
    Proportional(f64),
    /// loss = sum(c[i] * flow^i); evaluated on signed flow.
    Polynomial(Vec<f64>),
}

impl LossFunction {
    /// Evaluate losses at a signed flow level. Pure; no interior state.
    pub fn evaluate(&self, flow: f64) -> f64 {
        match self {
            LossFunction::Proportional(rate) => rate * flow.abs(),
            LossFunction::Polynomial(coeffs) => coeffs
                .iter()
                .enumerate()
                .map(|(i, c)| c * flow.powi(i as i32))
                .sum(),
        }
    }
}

/// Piecewise linearization inputs for one interconnector's losses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LossModelRecord {
    pub interconnector: String,
    pub loss_function: LossFunction,
    /// Share of losses attributed to the sending (from) region, in [0, 1].
    pub from_region_loss_share: f64,
    /// Strictly increasing flow breakpoints spanning [min_flow, max_flow].
    pub breakpoints: Vec<f64>,
}

/// The full set of validated tabular inputs for one market.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MarketInputs {
    pub units: Vec<UnitRecord>,
    pub bids: Vec<BidRecord>,
    pub unit_limits: Vec<UnitLimitRecord>,
    #[serde(default)]
    pub commitments: Vec<CommitmentRecord>,
    pub demand: Vec<DemandRecord>,
    #[serde(default)]
    pub fcas_requirements: Vec<FcasRequirementRecord>,
    #[serde(default)]
    pub trapeziums: Vec<TrapeziumRecord>,
    #[serde(default)]
    pub interconnectors: Vec<InterconnectorRecord>,
    #[serde(default)]
    pub loss_models: Vec<LossModelRecord>,
}

impl MarketInputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Region of a unit, if the unit is declared.
    pub fn region_of(&self, unit: &str) -> Option<&str> {
        self.units
            .iter()
            .find(|u| u.unit == unit)
            .map(|u| u.region.as_str())
    }

    /// All distinct regions appearing in the unit and demand tables.
    pub fn regions(&self) -> Vec<String> {
        let mut regions: Vec<String> = self
            .units
            .iter()
            .map(|u| u.region.clone())
            .chain(self.demand.iter().map(|d| d.region.clone()))
            .collect();
        regions.sort();
        regions.dedup();
        regions
    }

    /// Capacity of a unit, if limits are declared.
    pub fn capacity_of(&self, unit: &str) -> Option<f64> {
        self.unit_limits
            .iter()
            .find(|l| l.unit == unit)
            .map(|l| l.capacity)
    }
}
