//! Constraint builders.
//!
//! Each submodule translates one business rule into constraint-matrix rows:
//!
//! | Builder | Rule |
//! |---------|------|
//! | [`bids`] | bid-band dispatch variables and the cost objective |
//! | [`capacity`] | unit capacity ceilings |
//! | [`ramp`] | ramp-rate envelopes around initial output |
//! | [`fcas`] | FCAS availability, joint ramping, trapezium capacity |
//! | [`commitment`] | unit-commitment state machine and output gating |
//! | [`balance`] | regional energy balances and FCAS requirement sets |
//! | [`elastic`] | opt-in penalized deficit/surplus variables |
//!
//! Builders are pure functions `(tables, config, registry) -> BuilderOutput`
//! with no cross-builder communication except ids shared through the
//! [`IdRegistry`]'s bound business keys. The orchestrator invokes them
//! sequentially; a builder that cannot find a key it depends on raises an
//! `UnresolvedId` error rather than silently dropping rows.

pub mod balance;
pub mod bids;
pub mod capacity;
pub mod commitment;
pub mod elastic;
pub mod fcas;
pub mod ramp;

use spot_core::{IdRegistry, MarketError, MarketResult, MarketInputs, Service, VariableId};

/// Business key of one bid-band dispatch variable.
pub(crate) fn bid_key(unit: &str, service: Service, band: usize, interval: usize) -> String {
    format!("bid/{unit}/{service}/{band}/{interval}")
}

/// Business key of an interconnector flow variable.
pub(crate) fn flow_key(interconnector: &str, interval: usize) -> String {
    format!("flow/{interconnector}/{interval}")
}

/// Business key of an interconnector loss variable.
pub(crate) fn loss_key(interconnector: &str, interval: usize) -> String {
    format!("loss/{interconnector}/{interval}")
}

/// Business key of a commitment state bit.
pub(crate) fn state_key(unit: &str, interval: usize) -> String {
    format!("state/{unit}/{interval}")
}

pub(crate) fn startup_key(unit: &str, interval: usize) -> String {
    format!("startup/{unit}/{interval}")
}

pub(crate) fn shutdown_key(unit: &str, interval: usize) -> String {
    format!("shutdown/{unit}/{interval}")
}

/// Resolve the dispatch variables of every bid band of `unit`/`service` at
/// `interval`. Empty when the unit has no bid for the service; an error when
/// the bid exists but its variables were never registered (builder ordering
/// bug).
pub(crate) fn band_variables(
    inputs: &MarketInputs,
    registry: &IdRegistry,
    unit: &str,
    service: Service,
    interval: usize,
) -> MarketResult<Vec<VariableId>> {
    let Some(bid) = inputs
        .bids
        .iter()
        .find(|b| b.unit == unit && b.service == service)
    else {
        return Ok(Vec::new());
    };
    let mut vars = Vec::with_capacity(bid.bands.len());
    for band in 0..bid.bands.len() {
        let key = bid_key(unit, service, band, interval);
        let id = registry
            .lookup(&key)
            .ok_or_else(|| MarketError::UnresolvedId(key.clone()))?;
        vars.push(VariableId::new(id));
    }
    Ok(vars)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_distinct_per_interval() {
        assert_ne!(
            bid_key("U1", Service::Energy, 0, 0),
            bid_key("U1", Service::Energy, 0, 1)
        );
        assert_ne!(flow_key("A-B", 0), loss_key("A-B", 0));
    }
}
