//! Tabular engine outputs.
//!
//! The engine returns three output tables (dispatch, interconnector flows,
//! prices) plus solve metadata, mirroring the tabular input contract. All
//! records serialize so the surrounding layers can persist or plot them.

use std::collections::HashMap;

use serde::Serialize;
use spot_core::{MarketKey, Service};

/// Cleared volume of one unit/service for the dispatch interval.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchRecord {
    pub unit: String,
    pub service: Service,
    /// Cleared volume (MW), summed over bid bands.
    pub volume: f64,
}

/// Solved flow and losses of one interconnector.
#[derive(Debug, Clone, Serialize)]
pub struct FlowRecord {
    pub interconnector: String,
    /// Signed flow (MW); positive runs from-region to to-region.
    pub flow: f64,
    /// Total losses (MW).
    pub losses: f64,
}

/// Published clearing price of one region/service.
#[derive(Debug, Clone, Serialize)]
pub struct PriceRecord {
    pub region: String,
    pub service: Service,
    /// Shadow price ($/MWh) of the market constraint.
    pub price: f64,
}

/// Commitment decision of one unit at one interval.
#[derive(Debug, Clone, Serialize)]
pub struct CommitmentDecision {
    pub unit: String,
    pub interval: usize,
    pub committed: bool,
    pub started_up: bool,
    pub shut_down: bool,
}

/// Full outcome of one cleared market.
#[derive(Debug, Clone, Serialize)]
pub struct MarketOutcome {
    /// Total objective (dispatch cost, $).
    pub objective_value: f64,
    /// Wall-clock solve time of the initial optimization.
    pub solve_time_ms: u128,
    /// Number of solver invocations performed so far (initial solve plus
    /// any pricing re-solves).
    pub solver_invocations: usize,
    pub dispatch: Vec<DispatchRecord>,
    pub flows: Vec<FlowRecord>,
    pub commitment: Vec<CommitmentDecision>,
}

impl MarketOutcome {
    /// Cleared volume of one unit/service, zero when absent.
    pub fn dispatch_of(&self, unit: &str, service: Service) -> f64 {
        self.dispatch
            .iter()
            .find(|d| d.unit == unit && d.service == service)
            .map(|d| d.volume)
            .unwrap_or(0.0)
    }

    /// Solved flow of one interconnector, if present.
    pub fn flow_of(&self, interconnector: &str) -> Option<&FlowRecord> {
        self.flows
            .iter()
            .find(|f| f.interconnector == interconnector)
    }

    /// Total cleared volume across all units for one service.
    pub fn total_dispatch(&self, service: Service) -> f64 {
        self.dispatch
            .iter()
            .filter(|d| d.service == service)
            .map(|d| d.volume)
            .sum()
    }

    /// Serialize the outcome as pretty JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Published price table keyed by (region, service).
#[derive(Debug, Clone, Default, Serialize)]
pub struct PriceSchedule {
    pub prices: Vec<PriceRecord>,
}

impl PriceSchedule {
    pub fn from_map(map: HashMap<MarketKey, f64>) -> Self {
        let mut prices: Vec<PriceRecord> = map
            .into_iter()
            .map(|(key, price)| PriceRecord {
                region: key.region,
                service: key.service,
                price,
            })
            .collect();
        prices.sort_by(|a, b| {
            (a.region.as_str(), format!("{}", a.service))
                .cmp(&(b.region.as_str(), format!("{}", b.service)))
        });
        Self { prices }
    }

    /// Price of one region/service, if published.
    pub fn price_of(&self, region: &str, service: Service) -> Option<f64> {
        self.prices
            .iter()
            .find(|p| p.region == region && p.service == service)
            .map(|p| p.price)
    }
}
