//! Unit-commitment state machine.
//!
//! A unit that declares minimum-operating-level behavior gets a binary
//! (state, startup, shutdown) triple per interval, linked by
//! `state[t] - state[t-1] - startup[t] + shutdown[t] = 0` with the initial
//! state supplied externally. Minimum up/down times are window sums of the
//! startup/shutdown indicators; start-up/shutdown ramp capability rows cap
//! output around transitions; generation-limit rows gate output by the
//! state bit. Initial remaining up/down time is applied by tightening the
//! state bounds, the one permitted bound mutation after variable creation.

use spot_core::{
    Bounds, BuilderOutput, CommitmentRecord, Constraint, ConstraintId, DecisionVariable,
    IdRegistry, MarketError, MarketResult, MarketInputs, Sense, Service, VarTag, VariableId,
};
use tracing::debug;

use crate::config::EngineConfig;

struct UnitBinaries {
    state: Vec<VariableId>,
    startup: Vec<VariableId>,
    shutdown: Vec<VariableId>,
}

pub fn build(
    inputs: &MarketInputs,
    config: &EngineConfig,
    registry: &mut IdRegistry,
) -> MarketResult<BuilderOutput> {
    let mut out = BuilderOutput::new();

    for record in &inputs.commitments {
        let capacity = inputs.capacity_of(&record.unit).ok_or_else(|| {
            MarketError::invariant(
                "unit_commitment",
                format!("unit '{}' has no row in unit_limits", record.unit),
            )
        })?;

        let binaries = create_binaries(&mut out, registry, config, record);
        state_identity(&mut out, registry, config, record, &binaries);
        minimum_times(&mut out, registry, config, record, &binaries);
        output_gating(&mut out, inputs, registry, config, record, capacity, &binaries)?;
        debug!(unit = %record.unit, intervals = config.num_intervals, "built commitment state machine");
    }

    Ok(out)
}

/// Create the binary triple per interval, tightening state bounds for any
/// initial remaining up/down time (clipped to the horizon).
fn create_binaries(
    out: &mut BuilderOutput,
    registry: &mut IdRegistry,
    config: &EngineConfig,
    record: &CommitmentRecord,
) -> UnitBinaries {
    let horizon = config.num_intervals;
    let forced = forced_intervals(config, record).min(horizon);

    let mut binaries = UnitBinaries {
        state: Vec::with_capacity(horizon),
        startup: Vec::with_capacity(horizon),
        shutdown: Vec::with_capacity(horizon),
    };

    for interval in 0..horizon {
        let state = VariableId::new(registry.next_id());
        registry.bind(super::state_key(&record.unit, interval), state.raw());
        let mut var = DecisionVariable::binary(
            state,
            VarTag::CommitmentState {
                unit: record.unit.clone(),
                interval,
            },
        );
        if interval < forced {
            var.bounds = if record.initial_state {
                Bounds::new(1.0, 1.0)
            } else {
                Bounds::new(0.0, 0.0)
            };
        }
        out.push_variable(var);
        binaries.state.push(state);

        let startup = VariableId::new(registry.next_id());
        registry.bind(super::startup_key(&record.unit, interval), startup.raw());
        out.push_variable(DecisionVariable::binary(
            startup,
            VarTag::CommitmentStartup {
                unit: record.unit.clone(),
                interval,
            },
        ));
        binaries.startup.push(startup);

        let shutdown = VariableId::new(registry.next_id());
        registry.bind(super::shutdown_key(&record.unit, interval), shutdown.raw());
        out.push_variable(DecisionVariable::binary(
            shutdown,
            VarTag::CommitmentShutdown {
                unit: record.unit.clone(),
                interval,
            },
        ));
        binaries.shutdown.push(shutdown);
    }

    binaries
}

/// Intervals the unit must hold its initial state to honour time already
/// served before the horizon began.
fn forced_intervals(config: &EngineConfig, record: &CommitmentRecord) -> usize {
    let remaining_minutes = if record.initial_state {
        (record.min_up_time - record.initial_up_time).max(0.0)
    } else {
        (record.min_down_time - record.initial_down_time).max(0.0)
    };
    config.intervals_for_minutes(remaining_minutes)
}

/// `state[t] - state[t-1] - startup[t] + shutdown[t] = 0`, with the
/// externally supplied initial state standing in for `state[-1]`.
fn state_identity(
    out: &mut BuilderOutput,
    registry: &mut IdRegistry,
    config: &EngineConfig,
    record: &CommitmentRecord,
    binaries: &UnitBinaries,
) {
    for interval in 0..config.num_intervals {
        let cid = ConstraintId::new(registry.next_id());
        let rhs = if interval == 0 {
            if record.initial_state {
                1.0
            } else {
                0.0
            }
        } else {
            0.0
        };
        out.push_constraint(Constraint::structural(cid, Sense::Equal, rhs));
        out.push_coefficient(binaries.state[interval], cid, 1.0);
        out.push_coefficient(binaries.startup[interval], cid, -1.0);
        out.push_coefficient(binaries.shutdown[interval], cid, 1.0);
        if interval > 0 {
            out.push_coefficient(binaries.state[interval - 1], cid, -1.0);
        }
    }
}

/// Window sums of startup/shutdown indicators over the preceding min-up /
/// min-down intervals (minutes ceiling-divided by the interval length).
fn minimum_times(
    out: &mut BuilderOutput,
    registry: &mut IdRegistry,
    config: &EngineConfig,
    record: &CommitmentRecord,
    binaries: &UnitBinaries,
) {
    let up_intervals = config.intervals_for_minutes(record.min_up_time);
    let down_intervals = config.intervals_for_minutes(record.min_down_time);

    for interval in 0..config.num_intervals {
        if up_intervals > 1 {
            // sum(startup over window) - state[t] <= 0
            let cid = ConstraintId::new(registry.next_id());
            out.push_constraint(Constraint::structural(cid, Sense::LessEqual, 0.0));
            let window_start = (interval + 1).saturating_sub(up_intervals);
            for tau in window_start..=interval {
                out.push_coefficient(binaries.startup[tau], cid, 1.0);
            }
            out.push_coefficient(binaries.state[interval], cid, -1.0);
        }

        if down_intervals > 1 {
            // sum(shutdown over window) + state[t] <= 1
            let cid = ConstraintId::new(registry.next_id());
            out.push_constraint(Constraint::structural(cid, Sense::LessEqual, 1.0));
            let window_start = (interval + 1).saturating_sub(down_intervals);
            for tau in window_start..=interval {
                out.push_coefficient(binaries.shutdown[tau], cid, 1.0);
            }
            out.push_coefficient(binaries.state[interval], cid, 1.0);
        }
    }
}

/// Output gating rows:
/// - minimum loading: `output - min_loading * state >= 0`
/// - generation limit: `output - capacity * state <= 0`
/// - start-up capability: `output - capacity * state
///   + (capacity - startup_ramp * dt) * startup <= 0`
/// - shutdown capability: `output - capacity * state
///   + (capacity - shutdown_ramp * dt) * shutdown[t+1] <= 0`
#[allow(clippy::too_many_arguments)]
fn output_gating(
    out: &mut BuilderOutput,
    inputs: &MarketInputs,
    registry: &mut IdRegistry,
    config: &EngineConfig,
    record: &CommitmentRecord,
    capacity: f64,
    binaries: &UnitBinaries,
) -> MarketResult<()> {
    let hours = config.interval_hours();
    for interval in 0..config.num_intervals {
        let energy =
            super::band_variables(inputs, registry, &record.unit, Service::Energy, interval)?;
        if energy.is_empty() {
            continue;
        }

        let min_row = ConstraintId::new(registry.next_id());
        out.push_constraint(Constraint::structural(min_row, Sense::GreaterEqual, 0.0));
        for var in &energy {
            out.push_coefficient(*var, min_row, 1.0);
        }
        out.push_coefficient(binaries.state[interval], min_row, -record.min_loading);

        let max_row = ConstraintId::new(registry.next_id());
        out.push_constraint(Constraint::structural(max_row, Sense::LessEqual, 0.0));
        for var in &energy {
            out.push_coefficient(*var, max_row, 1.0);
        }
        out.push_coefficient(binaries.state[interval], max_row, -capacity);

        let startup_headroom = capacity - record.startup_ramp_rate * hours;
        if startup_headroom > 0.0 {
            let cid = ConstraintId::new(registry.next_id());
            out.push_constraint(Constraint::structural(cid, Sense::LessEqual, 0.0));
            for var in &energy {
                out.push_coefficient(*var, cid, 1.0);
            }
            out.push_coefficient(binaries.state[interval], cid, -capacity);
            out.push_coefficient(binaries.startup[interval], cid, startup_headroom);
        }

        let shutdown_headroom = capacity - record.shutdown_ramp_rate * hours;
        if shutdown_headroom > 0.0 && interval + 1 < config.num_intervals {
            let cid = ConstraintId::new(registry.next_id());
            out.push_constraint(Constraint::structural(cid, Sense::LessEqual, 0.0));
            for var in &energy {
                out.push_coefficient(*var, cid, 1.0);
            }
            out.push_coefficient(binaries.state[interval], cid, -capacity);
            out.push_coefficient(binaries.shutdown[interval + 1], cid, shutdown_headroom);
        }
    }
    Ok(())
}
