//! Output formatting module for CLI display
//!
//! This module handles all terminal output formatting, separating
//! the concerns of data calculation from presentation. Values are rounded to
//! two places here and nowhere else.

use colored::Colorize;
use itertools::Itertools;
use rust_decimal::Decimal;
use serde::Serialize;
use tabled::{
    settings::{object::Columns, Alignment, Style},
    Table, Tabled,
};

use crate::models::{CapitalGainEvent, OpenLot, TaxSummary};
use crate::tax::brackets::BracketHeadroom;
use crate::tax::scenario::{IndexationOpportunity, LiquidationEstimate};
use crate::tax::summary::{TaxReport, TickerBreakdown};

/// Pretty JSON for any serializable result
pub fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!(r#"{{"error": "JSON serialization failed: {}"}}"#, e))
}

/// Share of a bracket above which the headroom view warns
const NEAR_LIMIT_PERCENT: Decimal = Decimal::from_parts(90, 0, 0, false, 0);

fn money(value: Decimal) -> String {
    format!("{:.2}", value.round_dp(2))
}

fn percent(rate: Decimal) -> String {
    format!("{:.2}%", (rate * Decimal::ONE_HUNDRED).round_dp(2))
}

fn signed_money(value: Decimal) -> String {
    if value >= Decimal::ZERO {
        money(value).green().to_string()
    } else {
        money(value).red().to_string()
    }
}

/// Format realized gain events as a table
pub fn format_events_table(events: &[CapitalGainEvent]) -> String {
    if events.is_empty() {
        return format!("{} No sales in this ledger\n", "ℹ".blue().bold());
    }

    #[derive(Tabled)]
    struct EventRow {
        #[tabled(rename = "Ticker")]
        ticker: String,
        #[tabled(rename = "Bought")]
        buy_date: String,
        #[tabled(rename = "Sold")]
        sell_date: String,
        #[tabled(rename = "Quantity")]
        quantity: String,
        #[tabled(rename = "Cost")]
        cost: String,
        #[tabled(rename = "Inflation")]
        inflation: String,
        #[tabled(rename = "Adj. Cost")]
        adjusted_cost: String,
        #[tabled(rename = "Proceeds")]
        proceeds: String,
        #[tabled(rename = "Profit")]
        profit: String,
    }

    let rows: Vec<EventRow> = events
        .iter()
        .map(|e| {
            let inflation = if e.index_warning.is_some() {
                "n/a".yellow().to_string()
            } else if e.is_indexed {
                format!("{} ✓", percent(e.inflation_rate))
            } else {
                percent(e.inflation_rate)
            };

            EventRow {
                ticker: e.ticker.clone(),
                buy_date: e.buy_date.to_string(),
                sell_date: e.sell_date.to_string(),
                quantity: e.quantity.normalize().to_string(),
                cost: money(e.raw_cost_local),
                inflation,
                adjusted_cost: money(e.adjusted_cost_local),
                proceeds: money(e.proceeds_local),
                profit: signed_money(e.realized_profit_local),
            }
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::modern());
    table.modify(Columns::new(3..), Alignment::right());
    format!("{}\n", table)
}

/// Format open lots as a table
pub fn format_positions_table(lots: &[OpenLot]) -> String {
    if lots.is_empty() {
        return format!("{} No open positions\n", "ℹ".blue().bold());
    }

    #[derive(Tabled)]
    struct LotRow {
        #[tabled(rename = "Ticker")]
        ticker: String,
        #[tabled(rename = "Acquired")]
        acquired: String,
        #[tabled(rename = "Quantity")]
        quantity: String,
        #[tabled(rename = "Unit Price")]
        unit_price: String,
        #[tabled(rename = "Rate")]
        rate: String,
        #[tabled(rename = "Cost")]
        cost: String,
    }

    let rows: Vec<LotRow> = lots
        .iter()
        .map(|lot| LotRow {
            ticker: lot.ticker.clone(),
            acquired: lot.acquisition_date.to_string(),
            quantity: lot.remaining_quantity.normalize().to_string(),
            unit_price: lot.unit_price_foreign.normalize().to_string(),
            rate: lot.conversion_rate.normalize().to_string(),
            cost: money(lot.cost_local()),
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::modern());
    table.modify(Columns::new(2..), Alignment::right());
    format!("{}\n", table)
}

/// Format the annual summary block
pub fn format_summary(summary: &TaxSummary) -> String {
    let mut output = format!("\n{} Tax Summary\n", "━".repeat(60).bright_black());

    let line = |label: &str, value: String| format!("{:<26} {}\n", label.bold(), value);

    output.push_str(&line("Capital gain (net):", signed_money(summary.total_capital_gain)));
    output.push_str(&line("Dividend income:", money(summary.total_dividend_income)));
    let dividend_status = if summary.dividends_exempt {
        "exempt".green().to_string()
    } else {
        "taxable".yellow().to_string()
    };
    output.push_str(&line("Dividends:", dividend_status));
    output.push_str(&line("Taxable income:", money(summary.total_taxable_income)));
    output.push_str(&line(
        "Marginal rate:",
        format!("{:.2}%", summary.marginal_rate_percent.round_dp(2)),
    ));
    output.push_str(&line("Computed tax:", money(summary.computed_tax)));
    output.push_str(&line("Foreign tax credit:", money(summary.foreign_tax_credit)));
    output.push_str(&line(
        "Final payable:",
        money(summary.final_payable).bold().to_string(),
    ));
    output
}

/// Warnings for events computed without index data, if any
pub fn format_index_warnings(report: &TaxReport) -> Option<String> {
    if report.is_verified() {
        return None;
    }

    let mut output = format!(
        "{} {} event(s) computed without inflation indexation:\n",
        "⚠".yellow().bold(),
        report.warnings_count
    );
    for event in report.unverified_events() {
        if let Some(warning) = &event.index_warning {
            output.push_str(&format!(
                "  {} sold {}: {}\n",
                event.ticker,
                event.sell_date,
                warning.months.iter().join(", ")
            ));
        }
    }
    Some(output)
}

/// Per-ticker realized profit and tax share
pub fn format_ticker_breakdown(rows: &[TickerBreakdown]) -> String {
    #[derive(Tabled)]
    struct TickerRow {
        #[tabled(rename = "Ticker")]
        ticker: String,
        #[tabled(rename = "Sales")]
        event_count: usize,
        #[tabled(rename = "Profit")]
        profit: String,
        #[tabled(rename = "Est. Tax Share")]
        tax_share: String,
    }

    let rows: Vec<TickerRow> = rows
        .iter()
        .map(|r| TickerRow {
            ticker: r.ticker.clone(),
            event_count: r.event_count,
            profit: signed_money(r.total_profit_local),
            tax_share: money(r.estimated_tax_share),
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::modern());
    table.modify(Columns::new(1..), Alignment::right());
    format!("{}\n", table)
}

/// Full report: events, per-ticker totals, positions and summary
pub fn format_report(report: &TaxReport) -> String {
    let mut output = format!("\n{} Capital Gains\n\n", "📊".cyan().bold());
    output.push_str(&format_events_table(&report.events));
    if !report.by_ticker.is_empty() {
        output.push_str(&format!("\n{} By Ticker\n\n", "📈".cyan().bold()));
        output.push_str(&format_ticker_breakdown(&report.by_ticker));
    }
    output.push_str(&format!("\n{} Open Positions\n\n", "📦".cyan().bold()));
    output.push_str(&format_positions_table(&report.open_lots));
    output.push_str(&format_summary(&report.summary));
    output
}

/// Format a liquidation estimate
pub fn format_liquidation(estimate: &LiquidationEstimate) -> String {
    #[derive(Tabled)]
    struct DisposalRow {
        #[tabled(rename = "Ticker")]
        ticker: String,
        #[tabled(rename = "Lot")]
        lot: String,
        #[tabled(rename = "Quantity")]
        quantity: String,
        #[tabled(rename = "Market Value")]
        market_value: String,
        #[tabled(rename = "Adj. Cost")]
        adjusted_cost: String,
        #[tabled(rename = "Profit")]
        profit: String,
        #[tabled(rename = "Extra Tax")]
        tax: String,
    }

    let mut output = format!("\n{} Liquidation Scenario\n\n", "🔮".cyan().bold());

    if estimate.disposals.is_empty() {
        output.push_str(&format!("{} No priced open lots\n", "ℹ".blue().bold()));
    } else {
        let rows: Vec<DisposalRow> = estimate
            .disposals
            .iter()
            .map(|d| DisposalRow {
                ticker: d.ticker.clone(),
                lot: d.source_id.clone(),
                quantity: d.quantity.normalize().to_string(),
                market_value: money(d.market_value_local),
                adjusted_cost: money(d.indexation.adjusted_cost),
                profit: signed_money(d.potential_profit),
                tax: money(d.estimated_tax),
            })
            .collect();

        let mut table = Table::new(&rows);
        table.with(Style::modern());
        table.modify(Columns::new(2..), Alignment::right());
        output.push_str(&format!("{}\n", table));
    }

    output.push_str(&format!(
        "\n{:<26} {}\n",
        "Market value:".bold(),
        money(estimate.total_market_value)
    ));
    output.push_str(&format!(
        "{:<26} {}\n",
        "Unrealized profit:".bold(),
        signed_money(estimate.total_unrealized_profit)
    ));
    output.push_str(&format!(
        "{:<26} {}\n",
        "Extra tax if sold:".bold(),
        money(estimate.estimated_tax).bold()
    ));

    if !estimate.unpriced_tickers.is_empty() {
        output.push_str(&format!(
            "{} No price given for: {}\n",
            "⚠".yellow().bold(),
            estimate.unpriced_tickers.iter().join(", ")
        ));
    }
    output
}

/// Format near-indexation lots and bracket headroom
pub fn format_opportunities(
    opportunities: &[IndexationOpportunity],
    headroom: &BracketHeadroom,
) -> String {
    #[derive(Tabled)]
    struct OpportunityRow {
        #[tabled(rename = "Ticker")]
        ticker: String,
        #[tabled(rename = "Acquired")]
        acquired: String,
        #[tabled(rename = "Inflation")]
        inflation: String,
        #[tabled(rename = "Cost")]
        cost: String,
        #[tabled(rename = "Potential Saving")]
        saving: String,
    }

    let mut output = format!("\n{} Near Indexation\n\n", "⏳".cyan().bold());

    if opportunities.is_empty() {
        output.push_str(&format!(
            "{} No open lot is close to the indexation threshold\n",
            "ℹ".blue().bold()
        ));
    } else {
        let rows: Vec<OpportunityRow> = opportunities
            .iter()
            .map(|o| OpportunityRow {
                ticker: o.ticker.clone(),
                acquired: o.acquisition_date.to_string(),
                inflation: percent(o.inflation_rate),
                cost: money(o.cost_local),
                saving: money(o.potential_tax_saving).green().to_string(),
            })
            .collect();

        let mut table = Table::new(&rows);
        table.with(Style::modern());
        table.modify(Columns::new(2..), Alignment::right());
        output.push_str(&format!("{}\n", table));
    }

    output.push_str(&format!("\n{} Bracket Headroom\n", "━".repeat(60).bright_black()));
    output.push_str(&format!(
        "{:<26} {}\n",
        "Current rate:".bold(),
        percent(headroom.current_rate)
    ));
    match (headroom.next_rate, headroom.distance_to_next) {
        (Some(next_rate), Some(distance)) => {
            output.push_str(&format!(
                "{:<26} {} ({} more at the current rate)\n",
                "Next rate:".bold(),
                percent(next_rate),
                money(distance)
            ));
        }
        _ => output.push_str(&format!("{:<26} top bracket\n", "Next rate:".bold())),
    }
    output.push_str(&format!(
        "{:<26} {:.1}%\n",
        "Bracket used:".bold(),
        headroom.percent_used.round_dp(1)
    ));
    match headroom.next_rate {
        Some(next_rate) if headroom.percent_used > NEAR_LIMIT_PERCENT => {
            output.push_str(&format!(
                "{} Near the bracket limit: further gains will be taxed at {}\n",
                "⚠".yellow().bold(),
                percent(next_rate)
            ));
        }
        _ => {}
    }
    output
}
