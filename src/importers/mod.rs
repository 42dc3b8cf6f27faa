// Import module - ledger files (TOML/JSON) into core records

mod file_detector;
pub mod ledger;

use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

use crate::tax::summary::TaxInput;

pub use file_detector::{detect_file_type, FileType};
pub use ledger::{parse_date, LedgerFile, RawDividend, RawNumber, RawTransaction};

/// Parse ledger text of a known format
pub fn parse_ledger(content: &str, file_type: FileType) -> Result<TaxInput> {
    let ledger: LedgerFile = match file_type {
        FileType::Toml => toml::from_str(content).context("Failed to parse TOML ledger")?,
        FileType::Json => serde_json::from_str(content).context("Failed to parse JSON ledger")?,
    };

    let transactions = ledger
        .transactions
        .iter()
        .enumerate()
        .map(|(i, raw)| raw.to_transaction(i))
        .collect::<Result<Vec<_>>>()?;
    let dividends = ledger
        .dividends
        .iter()
        .enumerate()
        .map(|(i, raw)| raw.to_dividend(i))
        .collect::<Result<Vec<_>>>()?;

    Ok(TaxInput {
        transactions,
        dividends,
    })
}

/// Import a ledger file, detecting its format
pub fn import_file<P: AsRef<Path>>(file_path: P) -> Result<TaxInput> {
    let path = file_path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read ledger {:?}", path))?;
    let file_type = detect_file_type(path, &content)?;

    let input = parse_ledger(&content, file_type)
        .with_context(|| format!("Invalid ledger {:?}", path))?;

    info!(
        "Imported {} transactions and {} dividends from {:?} ({:?})",
        input.transactions.len(),
        input.dividends.len(),
        path,
        file_type
    );
    Ok(input)
}
