//! Engine configuration.

/// Configuration for one dispatch run.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Length of one dispatch interval in minutes.
    pub interval_minutes: f64,
    /// Number of intervals in the planning horizon. Interval 0 is the
    /// cleared dispatch interval; later intervals exist so unit-commitment
    /// decisions are forward-looking.
    pub num_intervals: usize,
    /// Convert market balance constraints to penalized soft constraints by
    /// adding deficit variables. Off by default: an infeasible market is
    /// surfaced verbatim rather than silently relaxed.
    pub allow_deficit: bool,
    /// Objective penalty per MW of market-constraint violation.
    pub deficit_penalty: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            interval_minutes: 5.0,
            num_intervals: 1,
            allow_deficit: false,
            deficit_penalty: 14_500.0,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the dispatch interval length in minutes.
    pub fn with_interval_minutes(mut self, minutes: f64) -> Self {
        self.interval_minutes = minutes;
        self
    }

    /// Set the planning horizon length in intervals.
    pub fn with_num_intervals(mut self, intervals: usize) -> Self {
        self.num_intervals = intervals.max(1);
        self
    }

    /// Enable deficit variables with the given penalty.
    pub fn with_deficit_penalty(mut self, penalty: f64) -> Self {
        self.allow_deficit = true;
        self.deficit_penalty = penalty;
        self
    }

    /// Interval length as a fraction of an hour, for MW/h rate conversions.
    pub fn interval_hours(&self) -> f64 {
        self.interval_minutes / 60.0
    }

    /// Ceiling-divide a duration in minutes into whole intervals.
    pub fn intervals_for_minutes(&self, minutes: f64) -> usize {
        (minutes / self.interval_minutes).ceil() as usize
    }
}
