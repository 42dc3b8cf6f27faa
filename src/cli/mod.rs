use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::path::PathBuf;

use crate::utils::{normalize_decimal, parse_positive_price};

pub mod formatters;

#[derive(Parser)]
#[command(name = "gainbook")]
#[command(
    version,
    about = "Capital gains tax calculator for foreign stock trades with inflation indexation"
)]
#[command(
    long_about = "Match sales to purchases first-in first-out, index purchase costs by the producer price index, and compute the annual tax on gains and dividends under progressive brackets."
)]
pub struct Cli {
    /// Tax parameters file (brackets, exemption limit, price index)
    #[arg(long, global = true, value_name = "FILE")]
    pub params: Option<PathBuf>,

    /// Disable colorized/ANSI output
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,

    /// Output results in JSON format
    #[arg(long = "json", global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Full tax report: gain events, open lots and the annual summary
    Report {
        /// Ledger file (.toml or .json)
        ledger: PathBuf,
    },

    /// Realized capital-gain events
    Gains {
        /// Ledger file (.toml or .json)
        ledger: PathBuf,
    },

    /// Open lots left after matching
    Positions {
        /// Ledger file (.toml or .json)
        ledger: PathBuf,
    },

    /// Estimate the tax impact of selling the open lots
    Scenario {
        /// Ledger file (.toml or .json)
        ledger: PathBuf,

        /// Unit price in foreign currency, repeatable (e.g. AAPL=180.50)
        #[arg(long = "price", value_name = "TICKER=PRICE", value_parser = parse_price_arg, required = true)]
        prices: Vec<(String, Decimal)>,

        /// Conversion rate for the hypothetical sale
        #[arg(long, value_parser = parse_rate_arg)]
        rate: Decimal,

        /// Sale date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<String>,
    },

    /// Lots close to the indexation threshold and bracket headroom
    Opportunities {
        /// Ledger file (.toml or .json)
        ledger: PathBuf,
    },
}

/// Parse `TICKER=PRICE`
pub fn parse_price_arg(arg: &str) -> Result<(String, Decimal), String> {
    let (ticker, price) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected TICKER=PRICE, got '{}'", arg))?;

    let ticker = ticker.trim().to_uppercase();
    if ticker.is_empty() {
        return Err(format!("missing ticker in '{}'", arg));
    }

    let price = parse_positive_price(price)
        .ok_or_else(|| format!("price for {} must be a positive number, got '{}'", ticker, price))?;

    Ok((ticker, price))
}

fn parse_rate_arg(arg: &str) -> Result<Decimal, String> {
    match normalize_decimal(arg) {
        Ok(rate) if rate > Decimal::ZERO => Ok(rate),
        Ok(rate) => Err(format!("conversion rate must be positive, got {}", rate)),
        Err(err) => Err(err.to_string()),
    }
}
