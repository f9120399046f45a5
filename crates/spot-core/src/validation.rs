//! Input validation pipeline.
//!
//! An ordered list of (name, check) pairs run once over the full input set,
//! independent of the order tables were populated. Every check is a pure
//! predicate over [`MarketInputs`]; the first failing check aborts the
//! pipeline with an error naming the offending table and detail. Builders
//! may assume validated inputs and treat any remaining inconsistency as a
//! structural bug.

use tracing::trace;

use crate::error::{MarketError, MarketResult};
use crate::tables::{LossFunction, MarketInputs};

type Check = fn(&MarketInputs) -> MarketResult<()>;

/// The validation pipeline, in declaration order.
const CHECKS: &[(&str, Check)] = &[
    ("unit_reference", check_units),
    ("price_bids", check_bids),
    ("unit_limits", check_unit_limits),
    ("unit_commitment", check_commitments),
    ("regional_demand", check_demand),
    ("regional_coverage", check_region_coverage),
    ("fcas_requirements", check_fcas_requirements),
    ("fcas_trapeziums", check_trapeziums),
    ("interconnectors", check_interconnectors),
    ("interconnector_losses", check_loss_models),
];

/// Run every check over the inputs. Fatal on the first failure.
pub fn validate(inputs: &MarketInputs) -> MarketResult<()> {
    for (name, check) in CHECKS {
        trace!(check = name, "validating");
        check(inputs).map_err(|e| match e {
            // Checks construct fully-named errors; anything else gets the
            // pipeline stage name attached.
            MarketError::Invariant { .. } | MarketError::Schema { .. } => e,
            other => MarketError::invariant(name, other.to_string()),
        })?;
    }
    Ok(())
}

fn check_units(inputs: &MarketInputs) -> MarketResult<()> {
    let mut seen = std::collections::HashSet::new();
    for u in &inputs.units {
        if u.unit.is_empty() || u.region.is_empty() {
            return Err(MarketError::schema(
                "unit_reference",
                "columns 'unit' and 'region' must be non-empty",
            ));
        }
        if !seen.insert(u.unit.as_str()) {
            return Err(MarketError::invariant(
                "unit_reference",
                format!("unit '{}' declared more than once", u.unit),
            ));
        }
    }
    Ok(())
}

fn check_bids(inputs: &MarketInputs) -> MarketResult<()> {
    let mut seen = std::collections::HashSet::new();
    for bid in &inputs.bids {
        if !seen.insert((bid.unit.as_str(), bid.service)) {
            return Err(MarketError::invariant(
                "price_bids",
                format!(
                    "unit '{}' has more than one {} bid row",
                    bid.unit, bid.service
                ),
            ));
        }
        if inputs.region_of(&bid.unit).is_none() {
            return Err(MarketError::invariant(
                "price_bids",
                format!("bid references undeclared unit '{}'", bid.unit),
            ));
        }
        if bid.bands.is_empty() {
            return Err(MarketError::schema(
                "price_bids",
                format!("unit '{}' has no bid bands", bid.unit),
            ));
        }
        let mut last_price = f64::NEG_INFINITY;
        for (i, band) in bid.bands.iter().enumerate() {
            if band.volume < 0.0 {
                return Err(MarketError::invariant(
                    "price_bids",
                    format!("unit '{}' band {} has negative volume", bid.unit, i + 1),
                ));
            }
            if band.price < last_price {
                return Err(MarketError::invariant(
                    "price_bids",
                    format!(
                        "unit '{}' {} prices must be non-decreasing (band {}: {} < {})",
                        bid.unit,
                        bid.service,
                        i + 1,
                        band.price,
                        last_price
                    ),
                ));
            }
            last_price = band.price;
        }
    }
    Ok(())
}

fn check_unit_limits(inputs: &MarketInputs) -> MarketResult<()> {
    let mut seen = std::collections::HashSet::new();
    for limit in &inputs.unit_limits {
        if inputs.region_of(&limit.unit).is_none() {
            return Err(MarketError::invariant(
                "unit_limits",
                format!("limits reference undeclared unit '{}'", limit.unit),
            ));
        }
        if !seen.insert(limit.unit.as_str()) {
            return Err(MarketError::invariant(
                "unit_limits",
                format!("unit '{}' has more than one limit row", limit.unit),
            ));
        }
        if limit.capacity < 0.0 {
            return Err(MarketError::invariant(
                "unit_limits",
                format!("unit '{}' column 'capacity' is negative", limit.unit),
            ));
        }
        let has_ramp = limit.ramp_up_rate.is_some() || limit.ramp_down_rate.is_some();
        if has_ramp && limit.initial_output.is_none() {
            return Err(MarketError::schema(
                "unit_limits",
                format!(
                    "unit '{}' declares ramp rates but is missing column 'initial_output'",
                    limit.unit
                ),
            ));
        }
        for (column, rate) in [
            ("ramp_up_rate", limit.ramp_up_rate),
            ("ramp_down_rate", limit.ramp_down_rate),
        ] {
            if let Some(rate) = rate {
                if rate < 0.0 {
                    return Err(MarketError::invariant(
                        "unit_limits",
                        format!("unit '{}' column '{}' is negative", limit.unit, column),
                    ));
                }
            }
        }
    }
    Ok(())
}

fn check_commitments(inputs: &MarketInputs) -> MarketResult<()> {
    for c in &inputs.commitments {
        let capacity = inputs.capacity_of(&c.unit).ok_or_else(|| {
            MarketError::invariant(
                "unit_commitment",
                format!("unit '{}' has no row in unit_limits", c.unit),
            )
        })?;
        if c.min_loading < 0.0 || c.min_loading > capacity {
            return Err(MarketError::invariant(
                "unit_commitment",
                format!(
                    "unit '{}' min_loading {} outside [0, capacity {}]",
                    c.unit, c.min_loading, capacity
                ),
            ));
        }
        for (column, value) in [
            ("startup_ramp_rate", c.startup_ramp_rate),
            ("shutdown_ramp_rate", c.shutdown_ramp_rate),
            ("min_up_time", c.min_up_time),
            ("min_down_time", c.min_down_time),
            ("initial_up_time", c.initial_up_time),
            ("initial_down_time", c.initial_down_time),
        ] {
            if value < 0.0 {
                return Err(MarketError::invariant(
                    "unit_commitment",
                    format!("unit '{}' column '{}' is negative", c.unit, column),
                ));
            }
        }
    }
    Ok(())
}

fn check_demand(inputs: &MarketInputs) -> MarketResult<()> {
    let mut seen = std::collections::HashSet::new();
    for d in &inputs.demand {
        if d.demand < 0.0 {
            return Err(MarketError::invariant(
                "regional_demand",
                format!("region '{}' column 'demand' is negative", d.region),
            ));
        }
        if !seen.insert(d.region.as_str()) {
            return Err(MarketError::invariant(
                "regional_demand",
                format!("region '{}' has more than one demand row", d.region),
            ));
        }
    }
    Ok(())
}

/// Every region the balance builder will route energy through needs a demand
/// row, otherwise that region gets no balance constraint and an
/// interconnector out of it could deliver unmatched energy.
fn check_region_coverage(inputs: &MarketInputs) -> MarketResult<()> {
    let regions: std::collections::HashSet<&str> =
        inputs.demand.iter().map(|d| d.region.as_str()).collect();
    for u in &inputs.units {
        if !regions.contains(u.region.as_str()) {
            return Err(MarketError::invariant(
                "regional_demand",
                format!(
                    "unit '{}' region '{}' has no demand row",
                    u.unit, u.region
                ),
            ));
        }
    }
    for ic in &inputs.interconnectors {
        for (column, region) in [("from_region", &ic.from_region), ("to_region", &ic.to_region)] {
            if !regions.contains(region.as_str()) {
                return Err(MarketError::invariant(
                    "regional_demand",
                    format!(
                        "interconnector '{}' column '{}' names region '{}' which has no demand row",
                        ic.interconnector, column, region
                    ),
                ));
            }
        }
    }
    Ok(())
}

fn check_fcas_requirements(inputs: &MarketInputs) -> MarketResult<()> {
    for r in &inputs.fcas_requirements {
        if r.service.is_energy() {
            return Err(MarketError::invariant(
                "fcas_requirements",
                format!("set '{}' names the energy service", r.set_id),
            ));
        }
        if r.volume < 0.0 {
            return Err(MarketError::invariant(
                "fcas_requirements",
                format!("set '{}' column 'volume' is negative", r.set_id),
            ));
        }
    }
    // Rows of one set must agree on service and volume.
    let mut sets: std::collections::HashMap<&str, &crate::tables::FcasRequirementRecord> =
        std::collections::HashMap::new();
    for r in &inputs.fcas_requirements {
        if let Some(first) = sets.get(r.set_id.as_str()) {
            if first.service != r.service || (first.volume - r.volume).abs() > 1e-9 {
                return Err(MarketError::invariant(
                    "fcas_requirements",
                    format!("set '{}' rows disagree on service or volume", r.set_id),
                ));
            }
        } else {
            sets.insert(r.set_id.as_str(), r);
        }
    }
    Ok(())
}

fn check_trapeziums(inputs: &MarketInputs) -> MarketResult<()> {
    for t in &inputs.trapeziums {
        if inputs.region_of(&t.unit).is_none() {
            return Err(MarketError::invariant(
                "fcas_trapeziums",
                format!("trapezium references undeclared unit '{}'", t.unit),
            ));
        }
        if t.service.is_energy() {
            return Err(MarketError::invariant(
                "fcas_trapeziums",
                format!("unit '{}' declares a trapezium for the energy service", t.unit),
            ));
        }
        if t.max_availability <= 0.0 {
            return Err(MarketError::invariant(
                "fcas_trapeziums",
                format!(
                    "unit '{}' {} column 'max_availability' must be > 0",
                    t.unit, t.service
                ),
            ));
        }
        let ordered = t.enablement_min <= t.low_breakpoint
            && t.low_breakpoint <= t.high_breakpoint
            && t.high_breakpoint <= t.enablement_max;
        if !ordered {
            return Err(MarketError::invariant(
                "fcas_trapeziums",
                format!(
                    "unit '{}' {} breakpoints mis-ordered: require enablement_min <= low <= high <= enablement_max, got {} / {} / {} / {}",
                    t.unit,
                    t.service,
                    t.enablement_min,
                    t.low_breakpoint,
                    t.high_breakpoint,
                    t.enablement_max
                ),
            ));
        }
    }
    Ok(())
}

fn check_interconnectors(inputs: &MarketInputs) -> MarketResult<()> {
    let mut seen = std::collections::HashSet::new();
    for ic in &inputs.interconnectors {
        if !seen.insert(ic.interconnector.as_str()) {
            return Err(MarketError::invariant(
                "interconnectors",
                format!("interconnector '{}' declared more than once", ic.interconnector),
            ));
        }
        if ic.from_region == ic.to_region {
            return Err(MarketError::invariant(
                "interconnectors",
                format!("interconnector '{}' links a region to itself", ic.interconnector),
            ));
        }
        if ic.min_flow > ic.max_flow {
            return Err(MarketError::invariant(
                "interconnectors",
                format!(
                    "interconnector '{}' has min_flow {} > max_flow {}",
                    ic.interconnector, ic.min_flow, ic.max_flow
                ),
            ));
        }
    }
    Ok(())
}

fn check_loss_models(inputs: &MarketInputs) -> MarketResult<()> {
    for lm in &inputs.loss_models {
        let ic = inputs
            .interconnectors
            .iter()
            .find(|ic| ic.interconnector == lm.interconnector)
            .ok_or_else(|| {
                MarketError::invariant(
                    "interconnector_losses",
                    format!(
                        "loss model references undeclared interconnector '{}'",
                        lm.interconnector
                    ),
                )
            })?;
        if !(0.0..=1.0).contains(&lm.from_region_loss_share) {
            return Err(MarketError::invariant(
                "interconnector_losses",
                format!(
                    "interconnector '{}' column 'from_region_loss_share' must be in [0, 1]",
                    lm.interconnector
                ),
            ));
        }
        if let LossFunction::Proportional(rate) = lm.loss_function {
            if rate < 0.0 {
                return Err(MarketError::invariant(
                    "interconnector_losses",
                    format!("interconnector '{}' has a negative loss rate", lm.interconnector),
                ));
            }
        }
        if lm.breakpoints.len() < 2 {
            return Err(MarketError::invariant(
                "interconnector_losses",
                format!(
                    "interconnector '{}' needs at least two breakpoints",
                    lm.interconnector
                ),
            ));
        }
        if lm.breakpoints.windows(2).any(|w| w[0] >= w[1]) {
            return Err(MarketError::invariant(
                "interconnector_losses",
                format!(
                    "interconnector '{}' breakpoints must be strictly increasing",
                    lm.interconnector
                ),
            ));
        }
        let (first, last) = (lm.breakpoints[0], lm.breakpoints[lm.breakpoints.len() - 1]);
        if first > ic.min_flow || last < ic.max_flow {
            return Err(MarketError::invariant(
                "interconnector_losses",
                format!(
                    "interconnector '{}' breakpoints [{}, {}] do not cover the flow range [{}, {}]",
                    lm.interconnector, first, last, ic.min_flow, ic.max_flow
                ),
            ));
        }
    }
    Ok(())
}
