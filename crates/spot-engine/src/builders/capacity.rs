//! Unit capacity ceilings.
//!
//! One `<=` row per unit/interval: coefficient 1 on every energy bid band,
//! rhs = nameplate capacity.

use spot_core::{
    BuilderOutput, Constraint, ConstraintId, IdRegistry, MarketResult, MarketInputs, Sense, Service,
};

use crate::config::EngineConfig;

pub fn build(
    inputs: &MarketInputs,
    config: &EngineConfig,
    registry: &mut IdRegistry,
) -> MarketResult<BuilderOutput> {
    let mut out = BuilderOutput::new();

    for limit in &inputs.unit_limits {
        for interval in 0..config.num_intervals {
            let bands =
                super::band_variables(inputs, registry, &limit.unit, Service::Energy, interval)?;
            if bands.is_empty() {
                continue;
            }
            let cid = ConstraintId::new(registry.next_id());
            out.push_constraint(Constraint::structural(cid, Sense::LessEqual, limit.capacity));
            for var in bands {
                out.push_coefficient(var, cid, 1.0);
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::bids;
    use spot_core::{BidBand, BidRecord, Rhs, UnitLimitRecord, UnitRecord};

    #[test]
    fn test_capacity_row_covers_all_energy_bands() {
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
                    volume: 60.0,
                    price: 10.0,
                },
                BidBand {
                    volume: 60.0,
                    price: 20.0,
                },
            ],
        });
        inputs.unit_limits.push(UnitLimitRecord {
            unit: "U1".into(),
            capacity: 100.0,
            initial_output: None,
            ramp_up_rate: None,
            ramp_down_rate: None,
        });

        let config = EngineConfig::default();
        let mut registry = IdRegistry::new();
        let mut merged = bids::build(&inputs, &config, &mut registry).unwrap();
        let out = build(&inputs, &config, &mut registry).unwrap();
        merged.merge(out);

        assert_eq!(merged.constraints.len(), 1);
        let row = &merged.constraints[0];
        assert_eq!(row.sense, Sense::LessEqual);
        assert_eq!(row.rhs, Rhs::Literal(100.0));
        let coeffs: Vec<_> = merged
            .coefficients
            .iter()
            .filter(|c| c.constraint == row.id)
            .collect();
        assert_eq!(coeffs.len(), 2);
        assert!(coeffs.iter().all(|c| c.coefficient == 1.0));
    }

    #[test]
    fn test_unit_without_energy_bid_is_skipped() {
        let mut inputs = MarketInputs::new();
        inputs.units.push(UnitRecord {
            unit: "U1".into(),
            region: "A".into(),
        });
        inputs.unit_limits.push(UnitLimitRecord {
            unit: "U1".into(),
            capacity: 100.0,
            initial_output: None,
            ramp_up_rate: None,
            ramp_down_rate: None,
        });
        let mut registry = IdRegistry::new();
        let out = build(&inputs, &EngineConfig::default(), &mut registry).unwrap();
        assert!(out.constraints.is_empty());
    }
}
