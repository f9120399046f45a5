//! Unified error types for the spot market-clearing engine
//!
//! This module provides a common error type [`MarketError`] that can represent
//! errors from any part of the engine. Builder- and solver-level failures are
//! converted to `MarketError` for uniform handling at API boundaries.
//!
//! # Example
//!
//! ```ignore
//! use spot_core::{MarketError, MarketResult};
//!
//! fn clear_market(inputs: &MarketInputs) -> MarketResult<()> {
//!     inputs.validate()?;
//!     dispatch(inputs)?;
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Unified error type for all engine operations.
///
/// The variants follow the engine's failure taxonomy: schema errors on input
/// tables, domain-invariant violations, sequencing violations (calling an
/// operation whose prerequisite state is absent), and solver outcomes. All
/// are fatal; none are retried.
#[derive(Error, Debug, Clone)]
pub enum MarketError {
    /// Input table has a missing, unexpected, or ill-typed column
    #[error("Schema error in table '{table}': {detail}")]
    Schema { table: String, detail: String },

    /// A domain invariant on input data does not hold
    #[error("Invariant violation in table '{table}': {detail}")]
    Invariant { table: String, detail: String },

    /// An operation was invoked before its prerequisite phase
    #[error("Sequencing error: {0}")]
    Sequencing(String),

    /// A builder referenced an id that was never registered
    #[error("Unresolved id: {0}")]
    UnresolvedId(String),

    /// The assembled problem is infeasible
    #[error("Problem infeasible: {0}")]
    Infeasible(String),

    /// The assembled problem is unbounded
    #[error("Problem unbounded: {0}")]
    Unbounded(String),

    /// The external solver failed for a reason other than infeasibility
    #[error("Solver error: {0}")]
    Solver(String),

    /// The cross-market fixed point did not converge within the iteration cap
    #[error("Coupled markets did not converge after {iterations} iterations (worst relative change {worst_change:.4})")]
    NotConverged { iterations: usize, worst_change: f64 },

    /// Generic errors (for wrapping external errors)
    #[error("{0}")]
    Other(String),
}

impl MarketError {
    /// Schema error named by the offending table and column or detail.
    pub fn schema(table: &str, detail: impl Into<String>) -> Self {
        MarketError::Schema {
            table: table.to_string(),
            detail: detail.into(),
        }
    }

    /// Domain-invariant error named by the offending table.
    pub fn invariant(table: &str, detail: impl Into<String>) -> Self {
        MarketError::Invariant {
            table: table.to_string(),
            detail: detail.into(),
        }
    }
}

/// Convenience type alias for Results using MarketError.
pub type MarketResult<T> = Result<T, MarketError>;

// Conversion from anyhow::Error
impl From<anyhow::Error> for MarketError {
    fn from(err: anyhow::Error) -> Self {
        MarketError::Other(err.to_string())
    }
}

impl From<String> for MarketError {
    fn from(s: String) -> Self {
        MarketError::Other(s)
    }
}

impl From<&str> for MarketError {
    fn from(s: &str) -> Self {
        MarketError::Other(s.to_string())
    }
}

// JSON parsing errors from table ingestion
impl From<serde_json::Error> for MarketError {
    fn from(err: serde_json::Error) -> Self {
        MarketError::Schema {
            table: "<json>".to_string(),
            detail: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MarketError::invariant("price_bids", "prices must be non-decreasing");
        assert!(err.to_string().contains("price_bids"));
        assert!(err.to_string().contains("non-decreasing"));
    }

    #[test]
    fn test_sequencing_display() {
        let err = MarketError::Sequencing("prices requested before dispatch".into());
        assert!(err.to_string().starts_with("Sequencing error"));
    }

    #[test]
    fn test_question_mark_operator() {
        fn inner() -> MarketResult<()> {
            Err(MarketError::UnresolvedId("variable 42".into()))
        }

        fn outer() -> MarketResult<()> {
            inner()?;
            Ok(())
        }

        assert!(outer().is_err());
    }
}
