//! Market constraints: regional energy balance and FCAS requirement sets.
//!
//! These are the rows whose shadow prices become the published clearing
//! prices. Energy balance is one equality per region/interval with rhs =
//! regional demand; interconnector flow enters with -1 at the from-region
//! and +1 at the to-region, and losses are debited from both ends per the
//! loss model's from-region share. FCAS requirements are one equality per
//! requirement set/interval; rows sharing a set id pool their regions and
//! the set's price is attributed to every member (region, service).

use std::collections::BTreeMap;

use spot_core::{
    BuilderOutput, Constraint, ConstraintId, IdRegistry, MarketKey, MarketResult, MarketInputs,
    Sense, Service, VariableId,
};
use tracing::debug;

use crate::config::EngineConfig;

pub fn build(
    inputs: &MarketInputs,
    config: &EngineConfig,
    registry: &mut IdRegistry,
) -> MarketResult<BuilderOutput> {
    let mut out = BuilderOutput::new();
    energy_balance(&mut out, inputs, config, registry)?;
    fcas_requirements(&mut out, inputs, config, registry)?;
    debug!(
        market_constraints = out.constraints.len(),
        "built market constraints"
    );
    Ok(out)
}

fn energy_balance(
    out: &mut BuilderOutput,
    inputs: &MarketInputs,
    config: &EngineConfig,
    registry: &mut IdRegistry,
) -> MarketResult<()> {
    for demand in &inputs.demand {
        for interval in 0..config.num_intervals {
            let cid = ConstraintId::new(registry.next_id());
            out.push_constraint(Constraint::market(
                cid,
                Sense::Equal,
                demand.demand,
                MarketKey {
                    region: demand.region.clone(),
                    service: Service::Energy,
                    interval,
                },
            ));

            for unit in &inputs.units {
                if unit.region != demand.region {
                    continue;
                }
                let bands =
                    super::band_variables(inputs, registry, &unit.unit, Service::Energy, interval)?;
                for var in bands {
                    out.push_coefficient(var, cid, 1.0);
                }
            }

            for ic in &inputs.interconnectors {
                let exporting = ic.from_region == demand.region;
                let importing = ic.to_region == demand.region;
                if !exporting && !importing {
                    continue;
                }
                let flow = resolve(registry, &super::flow_key(&ic.interconnector, interval))?;
                out.push_coefficient(flow, cid, if exporting { -1.0 } else { 1.0 });

                if let Some(model) = inputs
                    .loss_models
                    .iter()
                    .find(|m| m.interconnector == ic.interconnector)
                {
                    let loss =
                        resolve(registry, &super::loss_key(&ic.interconnector, interval))?;
                    let share = if exporting {
                        model.from_region_loss_share
                    } else {
                        1.0 - model.from_region_loss_share
                    };
                    out.push_coefficient(loss, cid, -share);
                }
            }
        }
    }
    Ok(())
}

fn fcas_requirements(
    out: &mut BuilderOutput,
    inputs: &MarketInputs,
    config: &EngineConfig,
    registry: &mut IdRegistry,
) -> MarketResult<()> {
    // BTreeMap keeps constraint emission order deterministic across runs.
    let mut sets: BTreeMap<&str, Vec<&spot_core::FcasRequirementRecord>> = BTreeMap::new();
    for record in &inputs.fcas_requirements {
        sets.entry(record.set_id.as_str()).or_default().push(record);
    }

    for (set_id, members) in sets {
        // Validation guarantees rows of a set agree on service and volume.
        let service = members[0].service;
        let volume = members[0].volume;

        for interval in 0..config.num_intervals {
            let cid = ConstraintId::new(registry.next_id());
            let keys = members
                .iter()
                .map(|m| MarketKey {
                    region: m.region.clone(),
                    service,
                    interval,
                })
                .collect();
            out.push_constraint(Constraint::pooled_market(cid, Sense::Equal, volume, keys));

            for unit in &inputs.units {
                if !members.iter().any(|m| m.region == unit.region) {
                    continue;
                }
                let bands =
                    super::band_variables(inputs, registry, &unit.unit, service, interval)?;
                for var in bands {
                    out.push_coefficient(var, cid, 1.0);
                }
            }
        }
        debug!(set_id, %service, "built FCAS requirement set");
    }
    Ok(())
}

fn resolve(registry: &IdRegistry, key: &str) -> MarketResult<VariableId> {
    registry
        .lookup(key)
        .map(VariableId::new)
        .ok_or_else(|| spot_core::MarketError::UnresolvedId(key.to_string()))
}
