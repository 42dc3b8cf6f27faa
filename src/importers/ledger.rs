use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::models::{Dividend, Transaction, TransactionType};
use crate::utils::normalize_decimal;

/// A numeric field as written in a ledger file.
///
/// Text goes through the normalizer so both `"1.234,56"` and `"1,234.56"`
/// work; bare numbers are accepted for convenience.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawNumber {
    Text(String),
    Int(i64),
    Float(f64),
}

impl RawNumber {
    pub fn to_decimal(&self) -> Result<Decimal> {
        match self {
            RawNumber::Text(text) => Ok(normalize_decimal(text)?),
            RawNumber::Int(value) => Ok(Decimal::from(*value)),
            // shortest round-trip text, not the binary expansion
            RawNumber::Float(value) => Ok(normalize_decimal(&value.to_string())?),
        }
    }
}

impl From<&str> for RawNumber {
    fn from(text: &str) -> Self {
        RawNumber::Text(text.to_string())
    }
}

/// Transaction row before normalization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTransaction {
    #[serde(default)]
    pub id: Option<String>,
    pub ticker: String,
    #[serde(alias = "type")]
    pub kind: String,
    pub date: String,
    pub quantity: RawNumber,
    #[serde(alias = "price")]
    pub unit_price: RawNumber,
    #[serde(alias = "rate")]
    pub conversion_rate: RawNumber,
}

impl RawTransaction {
    /// Convert to a core record; `position` names records without an id
    pub fn to_transaction(&self, position: usize) -> Result<Transaction> {
        let id = self
            .id
            .clone()
            .unwrap_or_else(|| format!("tx-{}", position + 1));

        let kind = TransactionType::from_str(&self.kind)
            .map_err(|_| anyhow!("Invalid transaction type: {}", self.kind))
            .with_context(|| format!("transaction {}: field kind", id))?;
        let date = parse_date(&self.date).with_context(|| format!("transaction {}: field date", id))?;
        let quantity = self
            .quantity
            .to_decimal()
            .with_context(|| format!("transaction {}: field quantity", id))?;
        let unit_price_foreign = self
            .unit_price
            .to_decimal()
            .with_context(|| format!("transaction {}: field unit_price", id))?;
        let conversion_rate = self
            .conversion_rate
            .to_decimal()
            .with_context(|| format!("transaction {}: field conversion_rate", id))?;

        Ok(Transaction {
            id,
            ticker: self.ticker.trim().to_uppercase(),
            kind,
            date,
            quantity,
            unit_price_foreign,
            conversion_rate,
        })
    }
}

fn zero() -> RawNumber {
    RawNumber::Int(0)
}

/// Dividend row before normalization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDividend {
    #[serde(default)]
    pub id: Option<String>,
    pub ticker: String,
    pub date: String,
    #[serde(alias = "gross")]
    pub gross_amount: RawNumber,
    #[serde(default = "zero")]
    pub withholding: RawNumber,
    #[serde(alias = "rate")]
    pub conversion_rate: RawNumber,
}

impl RawDividend {
    pub fn to_dividend(&self, position: usize) -> Result<Dividend> {
        let id = self
            .id
            .clone()
            .unwrap_or_else(|| format!("div-{}", position + 1));

        let date = parse_date(&self.date).with_context(|| format!("dividend {}: field date", id))?;
        let gross_amount_foreign = self
            .gross_amount
            .to_decimal()
            .with_context(|| format!("dividend {}: field gross_amount", id))?;
        let withholding_foreign = self
            .withholding
            .to_decimal()
            .with_context(|| format!("dividend {}: field withholding", id))?;
        let conversion_rate = self
            .conversion_rate
            .to_decimal()
            .with_context(|| format!("dividend {}: field conversion_rate", id))?;

        Ok(Dividend {
            id,
            ticker: self.ticker.trim().to_uppercase(),
            date,
            gross_amount_foreign,
            withholding_foreign,
            conversion_rate,
        })
    }
}

/// Top-level shape of a ledger file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerFile {
    #[serde(default)]
    pub transactions: Vec<RawTransaction>,
    #[serde(default)]
    pub dividends: Vec<RawDividend>,
}

/// Parse a date in `YYYY-MM-DD`, `DD/MM/YYYY` or `DD.MM.YYYY`
pub fn parse_date(text: &str) -> Result<NaiveDate> {
    let text = text.trim();
    for format in ["%Y-%m-%d", "%d/%m/%Y", "%d.%m.%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Ok(date);
        }
    }
    Err(anyhow!("Unrecognized date: '{}'", text))
}
