//! Bid-band dispatch variables and the cost objective.
//!
//! One bounded continuous variable per unit/service/band/interval, with the
//! band's offer price as its objective coefficient. Every other builder
//! reaches these variables through the registry's bound business keys.

use spot_core::{
    Bounds, BuilderOutput, DecisionVariable, IdRegistry, MarketResult, MarketInputs, VarTag,
    VariableId,
};
use tracing::debug;

use crate::config::EngineConfig;

pub fn build(
    inputs: &MarketInputs,
    config: &EngineConfig,
    registry: &mut IdRegistry,
) -> MarketResult<BuilderOutput> {
    let mut out = BuilderOutput::new();

    for bid in &inputs.bids {
        for interval in 0..config.num_intervals {
            let block = registry.reserve(bid.bands.len());
            for (band, tranche) in bid.bands.iter().enumerate() {
                let id = VariableId::new(block.nth(band));
                registry.bind(super::bid_key(&bid.unit, bid.service, band, interval), id.raw());
                out.push_variable(
                    DecisionVariable::continuous(
                        id,
                        Bounds::non_negative(tranche.volume),
                        VarTag::BidBand {
                            unit: bid.unit.clone(),
                            service: bid.service,
                            band,
                            interval,
                        },
                    )
                    .with_objective(tranche.price),
                );
            }
        }
    }

    debug!(
        variables = out.variables.len(),
        "registered bid-band dispatch variables"
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use spot_core::{BidBand, BidRecord, Service, UnitRecord};

    fn inputs() -> MarketInputs {
        let mut inputs = MarketInputs::new();
        inputs.units.push(UnitRecord {
            unit: "U1".into(),
            region: "A".into(),
        });
        inputs.bids.push(BidRecord {
            unit: "U1".into(),
            service: Service::Energy,
            bands: vec![
                BidBand {
                    volume: 40.0,
                    price: 25.0,
                },
                BidBand {
                    volume: 60.0,
                    price: 55.0,
                },
            ],
        });
        inputs
    }

    #[test]
    fn test_one_variable_per_band() {
        let mut registry = IdRegistry::new();
        let out = build(&inputs(), &EngineConfig::default(), &mut registry).unwrap();
        assert_eq!(out.variables.len(), 2);
        assert_eq!(out.variables[0].bounds, Bounds::new(0.0, 40.0));
        assert_eq!(out.variables[0].objective, Some(25.0));
        assert_eq!(out.variables[1].objective, Some(55.0));
    }

    #[test]
    fn test_keys_resolve_per_interval() {
        let mut registry = IdRegistry::new();
        let config = EngineConfig::default().with_num_intervals(3);
        let out = build(&inputs(), &config, &mut registry).unwrap();
        assert_eq!(out.variables.len(), 6);
        for interval in 0..3 {
            let vars =
                super::super::band_variables(&inputs(), &registry, "U1", Service::Energy, interval)
                    .unwrap();
            assert_eq!(vars.len(), 2);
        }
    }
}
