//! Command dispatcher that routes parsed clap commands to their handlers.
//!
//! Every command loads a ledger, runs the tax pipeline with the resolved
//! parameters and renders the part of the result it was asked for.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use colored::Colorize;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

use crate::cli::formatters;
use crate::cli::Commands;
use crate::config::TaxParameters;
use crate::importers::{self, parse_date};
use crate::tax::brackets::{headroom, BracketHeadroom};
use crate::tax::scenario::{estimate_liquidation, near_indexation, IndexationOpportunity};
use crate::tax::summary::{compute_tax_report, TaxReport};

/// Route a parsed command to its handler
pub fn dispatch_command(command: Commands, params: &TaxParameters, json_output: bool) -> Result<()> {
    match command {
        Commands::Report { ledger } => dispatch_report(&ledger, params, json_output),
        Commands::Gains { ledger } => dispatch_gains(&ledger, params, json_output),
        Commands::Positions { ledger } => dispatch_positions(&ledger, params, json_output),
        Commands::Scenario {
            ledger,
            prices,
            rate,
            date,
        } => {
            let date = match date {
                Some(text) => parse_date(&text).context("Invalid --date")?,
                None => Local::now().date_naive(),
            };
            dispatch_scenario(&ledger, params, prices, rate, date, json_output)
        }
        Commands::Opportunities { ledger } => dispatch_opportunities(&ledger, params, json_output),
    }
}

/// Import a ledger and run the full computation
pub fn load_report(ledger: &Path, params: &TaxParameters) -> Result<TaxReport> {
    let input = importers::import_file(ledger)?;
    let report = compute_tax_report(&input, params)
        .with_context(|| format!("Tax computation failed for {:?}", ledger))?;
    Ok(report)
}

/// Missing index data never fails a command; it is reported on stderr
fn print_warnings(report: &TaxReport) {
    if let Some(warnings) = formatters::format_index_warnings(report) {
        eprint!("{}", warnings);
    }
}

fn dispatch_report(ledger: &Path, params: &TaxParameters, json_output: bool) -> Result<()> {
    info!("Generating tax report for {:?}", ledger);
    let report = load_report(ledger, params)?;
    print_warnings(&report);

    if json_output {
        println!("{}", formatters::to_json(&report));
    } else {
        print!("{}", formatters::format_report(&report));
    }
    Ok(())
}

fn dispatch_gains(ledger: &Path, params: &TaxParameters, json_output: bool) -> Result<()> {
    let report = load_report(ledger, params)?;
    print_warnings(&report);

    if json_output {
        println!("{}", formatters::to_json(&report.events));
    } else {
        print!("{}", formatters::format_events_table(&report.events));
    }
    Ok(())
}

fn dispatch_positions(ledger: &Path, params: &TaxParameters, json_output: bool) -> Result<()> {
    let report = load_report(ledger, params)?;

    if json_output {
        println!("{}", formatters::to_json(&report.open_lots));
    } else {
        print!("{}", formatters::format_positions_table(&report.open_lots));
    }
    Ok(())
}

fn dispatch_scenario(
    ledger: &Path,
    params: &TaxParameters,
    prices: Vec<(String, Decimal)>,
    rate: Decimal,
    date: NaiveDate,
    json_output: bool,
) -> Result<()> {
    info!("Estimating liquidation on {} at rate {}", date, rate);
    let report = load_report(ledger, params)?;
    print_warnings(&report);

    let prices: BTreeMap<String, Decimal> = prices.into_iter().collect();
    let estimate = estimate_liquidation(
        &report.open_lots,
        &prices,
        rate,
        date,
        &params.price_index,
        &report.summary,
        &params.brackets,
    );

    if json_output {
        println!("{}", formatters::to_json(&estimate));
    } else {
        print!("{}", formatters::format_liquidation(&estimate));
    }
    Ok(())
}

fn dispatch_opportunities(ledger: &Path, params: &TaxParameters, json_output: bool) -> Result<()> {
    let report = load_report(ledger, params)?;
    print_warnings(&report);

    let marginal_rate = report.summary.marginal_rate_percent / Decimal::ONE_HUNDRED;
    let opportunities = near_indexation(
        &report.open_lots,
        &params.price_index,
        params.near_indexation_floor,
        marginal_rate,
    );
    let headroom = headroom(report.summary.total_taxable_income, &params.brackets);

    if json_output {
        #[derive(serde::Serialize)]
        struct JsonOpportunities<'a> {
            near_indexation: &'a [IndexationOpportunity],
            headroom: &'a BracketHeadroom,
        }
        println!(
            "{}",
            formatters::to_json(&JsonOpportunities {
                near_indexation: &opportunities,
                headroom: &headroom,
            })
        );
    } else {
        print!("{}", formatters::format_opportunities(&opportunities, &headroom));
        if opportunities.is_empty() && params.price_index.is_empty() {
            println!(
                "{} The parameters carry no price index; indexation cannot be assessed",
                "ℹ".blue().bold()
            );
        }
    }
    Ok(())
}
