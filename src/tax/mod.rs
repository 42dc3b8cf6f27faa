// Tax module - lot matching, inflation indexation, brackets and annual summary

pub mod brackets;
pub mod cost_basis;
pub mod indexation;
pub mod scenario;
pub mod summary;
pub mod validation;

pub use brackets::{evaluate, headroom, marginal_tax, BracketSchedule, TaxBracket};
pub use cost_basis::{match_transactions, FifoMatcher, MatchOutcome};
pub use indexation::{indexed_cost, PriceIndexTable, INDEXATION_THRESHOLD};
pub use summary::{compute_tax_report, summarize, ticker_breakdown, TaxInput, TaxReport, TickerBreakdown};
pub use validation::{validate_batch, ValidationIssue};
