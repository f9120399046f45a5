//! FCAS availability and energy/FCAS co-optimization constraints.
//!
//! Three families per trapezium:
//!
//! - *max availability*: a `<=` ceiling on the summed FCAS bid bands.
//! - *joint ramping* (regulation services): energy and regulation dispatch
//!   must jointly fit the unit's ramp envelope.
//! - *trapezium capacity*: upper-slope and lower-slope rows keeping the
//!   (energy, fcas) operating point inside the trapezium. For contingency
//!   services a coexisting regulation variable on the same unit is folded
//!   into the same row with coefficient ±1 so joint contingency+regulation
//!   provision cannot escape the trapezium.

use spot_core::{
    BuilderOutput, Constraint, ConstraintId, IdRegistry, MarketResult, MarketInputs, Sense,
    Service, TrapeziumRecord, VariableId,
};

use crate::config::EngineConfig;

pub fn build(
    inputs: &MarketInputs,
    config: &EngineConfig,
    registry: &mut IdRegistry,
) -> MarketResult<BuilderOutput> {
    let mut out = BuilderOutput::new();

    for trapezium in &inputs.trapeziums {
        for interval in 0..config.num_intervals {
            let fcas = super::band_variables(
                inputs,
                registry,
                &trapezium.unit,
                trapezium.service,
                interval,
            )?;
            if fcas.is_empty() {
                // Trapezium without a matching bid offers nothing.
                continue;
            }
            let energy =
                super::band_variables(inputs, registry, &trapezium.unit, Service::Energy, interval)?;

            max_availability(&mut out, registry, trapezium, &fcas);
            if trapezium.service.is_regulation() {
                joint_ramping(&mut out, inputs, registry, config, trapezium, interval, &energy, &fcas)?;
                trapezium_capacity(&mut out, registry, trapezium, &energy, &fcas, &[], &[]);
            } else {
                let raise_reg = super::band_variables(
                    inputs,
                    registry,
                    &trapezium.unit,
                    Service::RaiseReg,
                    interval,
                )?;
                let lower_reg = super::band_variables(
                    inputs,
                    registry,
                    &trapezium.unit,
                    Service::LowerReg,
                    interval,
                )?;
                trapezium_capacity(&mut out, registry, trapezium, &energy, &fcas, &raise_reg, &lower_reg);
            }
        }
    }

    Ok(out)
}

/// `sum(fcas) <= max_availability`
fn max_availability(
    out: &mut BuilderOutput,
    registry: &mut IdRegistry,
    trapezium: &TrapeziumRecord,
    fcas: &[VariableId],
) {
    let cid = ConstraintId::new(registry.next_id());
    out.push_constraint(Constraint::structural(
        cid,
        Sense::LessEqual,
        trapezium.max_availability,
    ));
    for var in fcas {
        out.push_coefficient(*var, cid, 1.0);
    }
}

/// Raise: `energy + raise_reg <= initial + ramp_up * dt`
/// Lower: `energy - lower_reg >= initial - ramp_down * dt`
#[allow(clippy::too_many_arguments)]
fn joint_ramping(
    out: &mut BuilderOutput,
    inputs: &MarketInputs,
    registry: &mut IdRegistry,
    config: &EngineConfig,
    trapezium: &TrapeziumRecord,
    interval: usize,
    energy: &[VariableId],
    fcas: &[VariableId],
) -> MarketResult<()> {
    let Some(limit) = inputs.unit_limits.iter().find(|l| l.unit == trapezium.unit) else {
        return Ok(());
    };
    let Some(initial) = limit.initial_output else {
        return Ok(());
    };
    let hours = config.interval_hours();
    // Joint ramping anchors to the telemetered initial output; it binds the
    // cleared dispatch interval only.
    if interval != 0 {
        return Ok(());
    }

    match trapezium.service {
        Service::RaiseReg => {
            if let Some(rate) = limit.ramp_up_rate {
                let cid = ConstraintId::new(registry.next_id());
                out.push_constraint(Constraint::structural(
                    cid,
                    Sense::LessEqual,
                    initial + rate * hours,
                ));
                for var in energy.iter().chain(fcas) {
                    out.push_coefficient(*var, cid, 1.0);
                }
            }
        }
        Service::LowerReg => {
            if let Some(rate) = limit.ramp_down_rate {
                let cid = ConstraintId::new(registry.next_id());
                out.push_constraint(Constraint::structural(
                    cid,
                    Sense::GreaterEqual,
                    initial - rate * hours,
                ));
                for var in energy {
                    out.push_coefficient(*var, cid, 1.0);
                }
                for var in fcas {
                    out.push_coefficient(*var, cid, -1.0);
                }
            }
        }
        _ => {}
    }
    Ok(())
}

/// Upper slope: `energy + u * fcas + raise_reg <= enablement_max` with
/// `u = (enablement_max - high_breakpoint) / max_availability`.
/// Lower slope: `energy - l * fcas - lower_reg >= enablement_min` with
/// `l = (low_breakpoint - enablement_min) / max_availability`.
///
/// Two rows per trapezium. Regulation trapezia get the same rows without
/// folded variables (`raise_reg`/`lower_reg` passed empty).
fn trapezium_capacity(
    out: &mut BuilderOutput,
    registry: &mut IdRegistry,
    trapezium: &TrapeziumRecord,
    energy: &[VariableId],
    fcas: &[VariableId],
    raise_reg: &[VariableId],
    lower_reg: &[VariableId],
) {
    let upper_slope =
        (trapezium.enablement_max - trapezium.high_breakpoint) / trapezium.max_availability;
    let lower_slope =
        (trapezium.low_breakpoint - trapezium.enablement_min) / trapezium.max_availability;

    let upper = ConstraintId::new(registry.next_id());
    out.push_constraint(Constraint::structural(
        upper,
        Sense::LessEqual,
        trapezium.enablement_max,
    ));
    for var in energy {
        out.push_coefficient(*var, upper, 1.0);
    }
    for var in fcas {
        out.push_coefficient(*var, upper, upper_slope);
    }
    for var in raise_reg {
        out.push_coefficient(*var, upper, 1.0);
    }

    let lower = ConstraintId::new(registry.next_id());
    out.push_constraint(Constraint::structural(
        lower,
        Sense::GreaterEqual,
        trapezium.enablement_min,
    ));
    for var in energy {
        out.push_coefficient(*var, lower, 1.0);
    }
    for var in fcas {
        out.push_coefficient(*var, lower, -lower_slope);
    }
    for var in lower_reg {
        out.push_coefficient(*var, lower, -1.0);
    }
}
