//! Ramp-rate envelopes.
//!
//! Interval 0 is constrained against the unit's telemetered initial output:
//! rhs = initial_output ± rate * (interval_minutes / 60). Later intervals
//! couple consecutive outputs with ±1 coefficient pairs.

use spot_core::{
    BuilderOutput, Constraint, ConstraintId, IdRegistry, MarketError, MarketResult, MarketInputs,
    Sense, Service,
};

use crate::config::EngineConfig;

pub fn build(
    inputs: &MarketInputs,
    config: &EngineConfig,
    registry: &mut IdRegistry,
) -> MarketResult<BuilderOutput> {
    let mut out = BuilderOutput::new();
    let hours = config.interval_hours();

    for limit in &inputs.unit_limits {
        if limit.ramp_up_rate.is_none() && limit.ramp_down_rate.is_none() {
            continue;
        }
        let initial = limit.initial_output.ok_or_else(|| {
            MarketError::schema(
                "unit_limits",
                format!("unit '{}' is missing column 'initial_output'", limit.unit),
            )
        })?;

        for interval in 0..config.num_intervals {
            let bands =
                super::band_variables(inputs, registry, &limit.unit, Service::Energy, interval)?;
            if bands.is_empty() {
                continue;
            }
            let previous = if interval > 0 {
                super::band_variables(inputs, registry, &limit.unit, Service::Energy, interval - 1)?
            } else {
                Vec::new()
            };

            if let Some(rate) = limit.ramp_up_rate {
                let cid = ConstraintId::new(registry.next_id());
                let rhs = if interval == 0 {
                    initial + rate * hours
                } else {
                    rate * hours
                };
                out.push_constraint(Constraint::structural(cid, Sense::LessEqual, rhs));
                for var in &bands {
                    out.push_coefficient(*var, cid, 1.0);
                }
                for var in &previous {
                    out.push_coefficient(*var, cid, -1.0);
                }
            }

            if let Some(rate) = limit.ramp_down_rate {
                let cid = ConstraintId::new(registry.next_id());
                let rhs = if interval == 0 {
                    initial - rate * hours
                } else {
                    -rate * hours
                };
                out.push_constraint(Constraint::structural(cid, Sense::GreaterEqual, rhs));
                for var in &bands {
                    out.push_coefficient(*var, cid, 1.0);
                }
                for var in &previous {
                    out.push_coefficient(*var, cid, -1.0);
                }
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

    fn inputs() -> MarketInputs {
        let mut inputs = MarketInputs::new();
        inputs.units.push(UnitRecord {
            unit: "U1".into(),
            region: "A".into(),
        });
        inputs.bids.push(BidRecord {
            unit: "U1".into(),
            service: Service::Energy,
            bands: vec![BidBand {
                volume: 100.0,
                price: 30.0,
            }],
        });
        inputs.unit_limits.push(UnitLimitRecord {
            unit: "U1".into(),
            capacity: 100.0,
            initial_output: Some(50.0),
            ramp_up_rate: Some(120.0),
            ramp_down_rate: Some(240.0),
        });
        inputs
    }

    #[test]
    fn test_interval_zero_rhs_uses_initial_output() {
        let config = EngineConfig::default(); // 5 minute intervals
        let mut registry = IdRegistry::new();
        bids::build(&inputs(), &config, &mut registry).unwrap();
        let out = build(&inputs(), &config, &mut registry).unwrap();

        assert_eq!(out.constraints.len(), 2);
        // up: 50 + 120 * (5/60) = 60; down: 50 - 240 * (5/60) = 30
        assert_eq!(out.constraints[0].sense, Sense::LessEqual);
        assert_eq!(out.constraints[0].rhs, Rhs::Literal(60.0));
        assert_eq!(out.constraints[1].sense, Sense::GreaterEqual);
        assert_eq!(out.constraints[1].rhs, Rhs::Literal(30.0));
    }

    #[test]
    fn test_later_intervals_couple_consecutive_outputs() {
        let config = EngineConfig::default().with_num_intervals(2);
        let mut registry = IdRegistry::new();
        bids::build(&inputs(), &config, &mut registry).unwrap();
        let out = build(&inputs(), &config, &mut registry).unwrap();

        assert_eq!(out.constraints.len(), 4);
        let up_t1 = &out.constraints[2];
        assert_eq!(up_t1.rhs, Rhs::Literal(10.0)); // 120 MW/h * 5 min
        let coeffs: Vec<_> = out
            .coefficients
            .iter()
            .filter(|c| c.constraint == up_t1.id)
            .collect();
        assert_eq!(coeffs.len(), 2);
        assert!(coeffs.iter().any(|c| c.coefficient == 1.0));
        assert!(coeffs.iter().any(|c| c.coefficient == -1.0));
    }
}
