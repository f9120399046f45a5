//! Energy/FCAS co-optimization, ramping and unit-commitment behavior.

use spot_core::{
    BidBand, BidRecord, CommitmentRecord, DemandRecord, FcasRequirementRecord, MarketInputs,
    Service, TrapeziumRecord, UnitLimitRecord, UnitRecord,
};
use spot_engine::{DispatchEngine, EngineConfig};

#[test]
fn energy_and_raise_regulation_co_optimized() {
    let mut inputs = MarketInputs::new();
    inputs.units.push(UnitRecord {
        unit: "G1".into(),
        region: "A".into(),
    });
    inputs.bids.push(BidRecord {
        unit: "G1".into(),
        service: Service::Energy,
        bands: vec![BidBand {
            volume: 100.0,
            price: 30.0,
        }],
    });
    inputs.bids.push(BidRecord {
        unit: "G1".into(),
        service: Service::RaiseReg,
        bands: vec![BidBand {
            volume: 20.0,
            price: 5.0,
        }],
    });
    inputs.unit_limits.push(UnitLimitRecord {
        unit: "G1".into(),
        capacity: 100.0,
        initial_output: Some(50.0),
        ramp_up_rate: Some(600.0),
        ramp_down_rate: Some(600.0),
    });
    inputs.trapeziums.push(TrapeziumRecord {
        unit: "G1".into(),
        service: Service::RaiseReg,
        max_availability: 20.0,
        enablement_min: 0.0,
        low_breakpoint: 0.0,
        high_breakpoint: 80.0,
        enablement_max: 100.0,
    });
    inputs.fcas_requirements.push(FcasRequirementRecord {
        set_id: "raise_reg_main".into(),
        region: "A".into(),
        service: Service::RaiseReg,
        volume: 10.0,
    });
    inputs.demand.push(DemandRecord {
        region: "A".into(),
        demand: 60.0,
    });

    let mut engine = DispatchEngine::new(inputs, EngineConfig::default()).unwrap();
    let outcome = engine.dispatch().unwrap();
    assert!((outcome.dispatch_of("G1", Service::Energy) - 60.0).abs() < 1e-3);
    assert!((outcome.dispatch_of("G1", Service::RaiseReg) - 10.0).abs() < 1e-3);
    assert!((outcome.objective_value - (60.0 * 30.0 + 10.0 * 5.0)).abs() < 1e-1);

    let prices = engine.prices().unwrap();
    assert!((prices.price_of("A", Service::Energy).unwrap() - 30.0).abs() < 1e-2);
    assert!((prices.price_of("A", Service::RaiseReg).unwrap() - 5.0).abs() < 1e-2);
}

#[test]
fn ramp_limit_caps_the_cheap_unit() {
    // G1 is cheapest but can only move 10 MW off its zero initial output in
    // one 5-minute interval; G2 covers the rest.
    let mut inputs = MarketInputs::new();
    for (name, capacity, price) in [("G1", 100.0, 20.0), ("G2", 100.0, 80.0)] {
        inputs.units.push(UnitRecord {
            unit: name.into(),
            region: "A".into(),
        });
        inputs.bids.push(BidRecord {
            unit: name.into(),
            service: Service::Energy,
            bands: vec![BidBand {
                volume: capacity,
                price,
            }],
        });
    }
    inputs.unit_limits.push(UnitLimitRecord {
        unit: "G1".into(),
        capacity: 100.0,
        initial_output: Some(0.0),
        ramp_up_rate: Some(120.0),
        ramp_down_rate: Some(120.0),
    });
    inputs.unit_limits.push(UnitLimitRecord {
        unit: "G2".into(),
        capacity: 100.0,
        initial_output: None,
        ramp_up_rate: None,
        ramp_down_rate: None,
    });
    inputs.demand.push(DemandRecord {
        region: "A".into(),
        demand: 50.0,
    });

    let mut engine = DispatchEngine::new(inputs, EngineConfig::default()).unwrap();
    let outcome = engine.dispatch().unwrap();
    assert!((outcome.dispatch_of("G1", Service::Energy) - 10.0).abs() < 1e-3);
    assert!((outcome.dispatch_of("G2", Service::Energy) - 40.0).abs() < 1e-3);

    // the marginal MW comes from G2
    let prices = engine.prices().unwrap();
    assert!((prices.price_of("A", Service::Energy).unwrap() - 80.0).abs() < 1e-2);
}

#[test]
fn min_down_time_keeps_unit_off_regardless_of_price() {
    // G1 is far cheaper but just tripped and its minimum down time outlasts
    // the whole horizon; G2 must carry the load.
    let mut inputs = MarketInputs::new();
    for (name, capacity, price) in [("G1", 100.0, 20.0), ("G2", 200.0, 300.0)] {
        inputs.units.push(UnitRecord {
            unit: name.into(),
            region: "A".into(),
        });
        inputs.bids.push(BidRecord {
            unit: name.into(),
            service: Service::Energy,
            bands: vec![BidBand {
                volume: capacity,
                price,
            }],
        });
        inputs.unit_limits.push(UnitLimitRecord {
            unit: name.into(),
            capacity,
            initial_output: None,
            ramp_up_rate: None,
            ramp_down_rate: None,
        });
    }
    inputs.commitments.push(CommitmentRecord {
        unit: "G1".into(),
        min_loading: 30.0,
        startup_ramp_rate: 600.0,
        shutdown_ramp_rate: 600.0,
        min_up_time: 10.0,
        min_down_time: 60.0,
        initial_state: false,
        initial_up_time: 0.0,
        initial_down_time: 0.0,
    });
    inputs.demand.push(DemandRecord {
        region: "A".into(),
        demand: 80.0,
    });

    let config = EngineConfig::default().with_num_intervals(2);
    let mut engine = DispatchEngine::new(inputs, config).unwrap();
    let outcome = engine.dispatch().unwrap();

    let states: Vec<_> = outcome
        .commitment
        .iter()
        .filter(|c| c.unit == "G1")
        .collect();
    assert_eq!(states.len(), 2);
    assert!(states.iter().all(|c| !c.committed));
    assert!(outcome.dispatch_of("G1", Service::Energy).abs() < 1e-6);
    assert!((outcome.dispatch_of("G2", Service::Energy) - 80.0).abs() < 1e-3);
}

#[test]
fn repeated_pricing_returns_identical_prices() {
    let mut inputs = MarketInputs::new();
    inputs.units.push(UnitRecord {
        unit: "G1".into(),
        region: "A".into(),
    });
    inputs.bids.push(BidRecord {
        unit: "G1".into(),
        service: Service::Energy,
        bands: vec![BidBand {
            volume: 100.0,
            price: 42.0,
        }],
    });
    inputs.unit_limits.push(UnitLimitRecord {
        unit: "G1".into(),
        capacity: 100.0,
        initial_output: None,
        ramp_up_rate: None,
        ramp_down_rate: None,
    });
    inputs.demand.push(DemandRecord {
        region: "A".into(),
        demand: 70.0,
    });

    let mut engine = DispatchEngine::new(inputs, EngineConfig::default()).unwrap();
    engine.dispatch().unwrap();

    let first: Vec<f64> = engine.prices().unwrap().prices.iter().map(|p| p.price).collect();
    let second: Vec<f64> = engine.prices().unwrap().prices.iter().map(|p| p.price).collect();
    assert_eq!(first, second);
}
