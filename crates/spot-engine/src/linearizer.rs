//! Piecewise linearization of interconnector losses.
//!
//! Losses are a nonlinear function of flow, represented over an ordered
//! breakpoint grid as a convex combination: one weight variable per
//! breakpoint, weights summing to one, with an SOS2 group restricting the
//! non-zero weights to two adjacent breakpoints. Two dynamic-rhs equalities
//! tie the combination back to the flow and loss variables:
//!
//! ```text
//! sum(w_i * bp_i)       = flow
//! sum(w_i * loss(bp_i)) = loss
//! ```
//!
//! The balance builder later debits `loss` from both end regions according
//! to the loss model's from-region share. A flow landing exactly on a
//! breakpoint is left to the solver's SOS2 handling.

use spot_core::{
    Bounds, BuilderOutput, Constraint, ConstraintId, DecisionVariable, IdRegistry, MarketError,
    MarketResult, MarketInputs, Sense, Sos2Group, VarTag, VariableId,
};
use tracing::debug;

use crate::builders::{flow_key, loss_key};
use crate::config::EngineConfig;

pub fn build(
    inputs: &MarketInputs,
    config: &EngineConfig,
    registry: &mut IdRegistry,
) -> MarketResult<BuilderOutput> {
    let mut out = BuilderOutput::new();

    for ic in &inputs.interconnectors {
        let model = inputs
            .loss_models
            .iter()
            .find(|m| m.interconnector == ic.interconnector);

        for interval in 0..config.num_intervals {
            let flow = VariableId::new(registry.next_id());
            registry.bind(flow_key(&ic.interconnector, interval), flow.raw());
            out.push_variable(DecisionVariable::continuous(
                flow,
                Bounds::new(ic.min_flow, ic.max_flow),
                VarTag::InterconnectorFlow {
                    interconnector: ic.interconnector.clone(),
                    interval,
                },
            ));

            let Some(model) = model else {
                // Lossless link: a bounded flow variable is all it needs.
                continue;
            };
            if model.breakpoints.len() < 2 {
                return Err(MarketError::invariant(
                    "interconnector_losses",
                    format!(
                        "interconnector '{}' needs at least two breakpoints",
                        ic.interconnector
                    ),
                ));
            }

            let losses: Vec<f64> = model
                .breakpoints
                .iter()
                .map(|bp| model.loss_function.evaluate(*bp))
                .collect();
            let loss_lower = losses.iter().cloned().fold(f64::INFINITY, f64::min);
            let loss_upper = losses.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

            let loss = VariableId::new(registry.next_id());
            registry.bind(loss_key(&ic.interconnector, interval), loss.raw());
            out.push_variable(DecisionVariable::continuous(
                loss,
                Bounds::new(loss_lower, loss_upper),
                VarTag::InterconnectorLoss {
                    interconnector: ic.interconnector.clone(),
                    interval,
                },
            ));

            let weight_block = registry.reserve(model.breakpoints.len());
            let weights: Vec<VariableId> = (0..model.breakpoints.len())
                .map(|i| VariableId::new(weight_block.nth(i)))
                .collect();
            for (i, w) in weights.iter().enumerate() {
                out.push_variable(DecisionVariable::continuous(
                    *w,
                    Bounds::new(0.0, 1.0),
                    VarTag::LossWeight {
                        interconnector: ic.interconnector.clone(),
                        breakpoint: i,
                        interval,
                    },
                ));
            }

            // sum(w) = 1
            let sum_row = ConstraintId::new(registry.next_id());
            out.push_constraint(Constraint::structural(sum_row, Sense::Equal, 1.0));
            for w in &weights {
                out.push_coefficient(*w, sum_row, 1.0);
            }

            // sum(w_i * bp_i) = flow
            let flow_row = ConstraintId::new(registry.next_id());
            out.push_constraint(Constraint::dynamic(flow_row, Sense::Equal, flow));
            for (w, bp) in weights.iter().zip(&model.breakpoints) {
                out.push_coefficient(*w, flow_row, *bp);
            }

            // sum(w_i * loss(bp_i)) = loss
            let loss_row = ConstraintId::new(registry.next_id());
            out.push_constraint(Constraint::dynamic(loss_row, Sense::Equal, loss));
            for (w, lv) in weights.iter().zip(&losses) {
                out.push_coefficient(*w, loss_row, *lv);
            }

            out.push_sos2(Sos2Group {
                key: format!("{}/{}", ic.interconnector, interval),
                members: weights,
            });
            debug!(
                interconnector = %ic.interconnector,
                interval,
                breakpoints = model.breakpoints.len(),
                "linearized interconnector losses"
            );
        }
    }

    Ok(out)
}
