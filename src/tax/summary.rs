use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

use super::brackets::{evaluate, BracketSchedule};
use super::cost_basis::match_transactions;
use super::validation::validate_batch;
use crate::config::TaxParameters;
use crate::error::TaxError;
use crate::models::{CapitalGainEvent, Dividend, OpenLot, TaxSummary, Transaction};

/// Combine matched events and dividends into the final tax figures.
///
/// Capital gains and losses net against each other; a net loss contributes
/// nothing and never offsets dividends. Dividends are all-or-nothing: at or
/// below the exemption limit none of them is taxable, above it all of them are.
pub fn summarize(
    events: &[CapitalGainEvent],
    dividends: &[Dividend],
    exemption_limit: Decimal,
    brackets: &BracketSchedule,
) -> TaxSummary {
    let total_capital_gain: Decimal = events.iter().map(|e| e.realized_profit_local).sum();
    let taxable_capital_gain = total_capital_gain.max(Decimal::ZERO);

    let total_dividend_income: Decimal = dividends.iter().map(Dividend::gross_local).sum();
    let total_withholding: Decimal = dividends.iter().map(Dividend::withholding_local).sum();

    let dividends_exempt = total_dividend_income <= exemption_limit;
    let taxable_dividend_income = if dividends_exempt {
        Decimal::ZERO
    } else {
        total_dividend_income
    };

    let total_taxable_income = taxable_capital_gain + taxable_dividend_income;
    let bracket_tax = evaluate(total_taxable_income, brackets);
    let computed_tax = bracket_tax.tax;

    let foreign_tax_credit = if dividends_exempt {
        Decimal::ZERO
    } else {
        total_withholding.min(computed_tax)
    };

    let final_payable = (computed_tax - foreign_tax_credit).max(Decimal::ZERO);

    TaxSummary {
        total_capital_gain,
        total_dividend_income,
        taxable_dividend_income,
        dividends_exempt,
        total_taxable_income,
        marginal_rate_percent: bracket_tax.marginal_rate * Decimal::ONE_HUNDRED,
        computed_tax,
        foreign_tax_credit,
        final_payable,
    }
}

/// Realized result of one ticker and its share of the computed tax
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickerBreakdown {
    pub ticker: String,
    pub event_count: usize,
    pub total_profit_local: Decimal,
    /// `computed_tax * total_profit_local / total_taxable_income`, zero when
    /// there is no taxable income. A losing ticker gets a negative share.
    pub estimated_tax_share: Decimal,
}

/// Group events by ticker, in ticker order
pub fn ticker_breakdown(events: &[CapitalGainEvent], summary: &TaxSummary) -> Vec<TickerBreakdown> {
    let mut totals: BTreeMap<&str, (usize, Decimal)> = BTreeMap::new();
    for event in events {
        let entry = totals.entry(event.ticker.as_str()).or_insert((0, Decimal::ZERO));
        entry.0 += 1;
        entry.1 += event.realized_profit_local;
    }

    totals
        .into_iter()
        .map(|(ticker, (event_count, total_profit_local))| {
            let estimated_tax_share = if summary.total_taxable_income > Decimal::ZERO {
                summary.computed_tax * total_profit_local / summary.total_taxable_income
            } else {
                Decimal::ZERO
            };
            TickerBreakdown {
                ticker: ticker.to_string(),
                event_count,
                total_profit_local,
                estimated_tax_share,
            }
        })
        .collect()
}

/// Everything the core needs from its collaborators, already resolved
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaxInput {
    pub transactions: Vec<Transaction>,
    pub dividends: Vec<Dividend>,
}

/// Full result of one computation run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaxReport {
    pub events: Vec<CapitalGainEvent>,
    pub open_lots: Vec<OpenLot>,
    pub summary: TaxSummary,
    pub by_ticker: Vec<TickerBreakdown>,
    pub warnings_count: usize,
}

impl TaxReport {
    /// True when no event relied on missing index data
    pub fn is_verified(&self) -> bool {
        self.warnings_count == 0
    }

    pub fn unverified_events(&self) -> impl Iterator<Item = &CapitalGainEvent> {
        self.events.iter().filter(|e| !e.is_verified())
    }
}

/// Validate, match, index and summarize a batch.
///
/// Any invalid record or oversold position aborts the whole batch; missing
/// index data only marks the affected events.
pub fn compute_tax_report(input: &TaxInput, params: &TaxParameters) -> Result<TaxReport, TaxError> {
    validate_batch(&input.transactions, &input.dividends)?;

    let outcome = match_transactions(&input.transactions, &params.price_index)?;
    let summary = summarize(
        &outcome.events,
        &input.dividends,
        params.dividend_exemption_limit,
        &params.brackets,
    );
    let warnings_count = outcome
        .events
        .iter()
        .filter(|e| e.index_warning.is_some())
        .count();

    info!(
        "Computed {} gain events, {} open lots, final payable {}",
        outcome.events.len(),
        outcome.open_lots.len(),
        summary.final_payable
    );

    let by_ticker = ticker_breakdown(&outcome.events, &summary);

    Ok(TaxReport {
        events: outcome.events,
        open_lots: outcome.open_lots,
        summary,
        by_ticker,
        warnings_count,
    })
}
