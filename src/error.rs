//! Error handling for gainbook
//!
//! The calculation core reports failures through the typed [`TaxError`] so
//! callers can tell an aborted computation apart from one that succeeded with
//! caveats. Application code (config, importers, CLI) uses the anyhow-based
//! [`Result`] alias for context chaining.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::tax::validation::ValidationIssue;

/// Core error types for tax computations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TaxError {
    #[error("invalid input: {}", format_issues(.issues))]
    InvalidInput { issues: Vec<ValidationIssue> },

    #[error(
        "insufficient inventory for {ticker} on {date}: selling {requested} units but only {available} available (short by {shortfall})"
    )]
    InsufficientInventory {
        ticker: String,
        date: NaiveDate,
        requested: Decimal,
        available: Decimal,
        shortfall: Decimal,
    },

    #[error("invalid bracket table: {0}")]
    InvalidBrackets(String),

    #[error("invalid price index value {value} for {month}")]
    InvalidIndexValue { month: String, value: Decimal },

    #[error("invalid month key '{0}', expected YYYY-MM")]
    InvalidMonthKey(String),
}

fn format_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|issue| issue.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type alias for application-level operations
pub type Result<T> = anyhow::Result<T>;
