use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TaxError;

/// Transaction type (buy or sell)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    Buy,
    Sell,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Buy => "BUY",
            TransactionType::Sell => "SELL",
        }
    }
}

impl FromStr for TransactionType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" | "B" => Ok(TransactionType::Buy),
            "SELL" | "S" => Ok(TransactionType::Sell),
            _ => Err(()),
        }
    }
}

/// A recorded stock trade, priced in foreign currency.
///
/// The engine never mutates these; matching works on private lot copies.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub id: String,
    pub ticker: String,
    pub kind: TransactionType,
    pub date: NaiveDate,
    pub quantity: Decimal,
    pub unit_price_foreign: Decimal,
    /// Foreign -> local conversion rate on the trade date
    pub conversion_rate: Decimal,
}

impl Transaction {
    /// Local-currency value of `quantity` units at this transaction's price and rate
    pub fn local_value_of(&self, quantity: Decimal) -> Decimal {
        quantity * self.unit_price_foreign * self.conversion_rate
    }
}

/// A dividend receipt with the tax withheld abroad
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Dividend {
    pub id: String,
    pub ticker: String,
    pub date: NaiveDate,
    pub gross_amount_foreign: Decimal,
    pub withholding_foreign: Decimal,
    pub conversion_rate: Decimal,
}

impl Dividend {
    pub fn gross_local(&self) -> Decimal {
        self.gross_amount_foreign * self.conversion_rate
    }

    pub fn withholding_local(&self) -> Decimal {
        self.withholding_foreign * self.conversion_rate
    }
}

/// Calendar month used as a price-index key ("YYYY-MM")
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Result<Self, TaxError> {
        if !(1..=12).contains(&month) {
            return Err(TaxError::InvalidMonthKey(format!("{:04}-{:02}", year, month)));
        }
        Ok(Self { year, month })
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// The calendar month immediately before this one
    pub fn previous(&self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    /// The calendar month immediately after this one
    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// First day of the month
    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthKey {
    type Err = TaxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let invalid = || TaxError::InvalidMonthKey(trimmed.to_string());
        let (year, month) = trimmed.split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(invalid());
        }
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        MonthKey::new(year, month).map_err(|_| invalid())
    }
}

impl Serialize for MonthKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MonthKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A still-held remainder of a purchase
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OpenLot {
    pub ticker: String,
    pub acquisition_date: NaiveDate,
    pub remaining_quantity: Decimal,
    pub unit_price_foreign: Decimal,
    pub conversion_rate: Decimal,
    /// Id of the BUY transaction this lot was copied from
    pub source_id: String,
}

impl OpenLot {
    /// Historical local-currency cost of the remaining quantity
    pub fn cost_local(&self) -> Decimal {
        self.cost_of(self.remaining_quantity)
    }

    pub fn cost_of(&self, quantity: Decimal) -> Decimal {
        quantity * self.unit_price_foreign * self.conversion_rate
    }
}

/// Warning raised when a reference month has no price-index value.
///
/// The affected event falls back to its unindexed cost and should be
/// presented as unverified.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MissingIndexData {
    pub months: Vec<MonthKey>,
}

impl fmt::Display for MissingIndexData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let months: Vec<String> = self.months.iter().map(|m| m.to_string()).collect();
        write!(f, "missing price index for {}", months.join(", "))
    }
}

/// One matched (sell chunk, buy lot) pair with its indexed result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CapitalGainEvent {
    pub ticker: String,
    pub buy_date: NaiveDate,
    pub sell_date: NaiveDate,
    pub quantity: Decimal,
    pub raw_cost_local: Decimal,
    pub proceeds_local: Decimal,
    pub buy_reference_index: Option<Decimal>,
    pub sell_reference_index: Option<Decimal>,
    pub inflation_rate: Decimal,
    pub is_indexed: bool,
    pub adjusted_cost_local: Decimal,
    pub realized_profit_local: Decimal,
    pub buy_id: String,
    pub sell_id: String,
    pub index_warning: Option<MissingIndexData>,
}

impl CapitalGainEvent {
    pub fn is_verified(&self) -> bool {
        self.index_warning.is_none()
    }
}

/// Final figures for one computation run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaxSummary {
    pub total_capital_gain: Decimal,
    pub total_dividend_income: Decimal,
    pub taxable_dividend_income: Decimal,
    pub dividends_exempt: bool,
    pub total_taxable_income: Decimal,
    pub marginal_rate_percent: Decimal,
    pub computed_tax: Decimal,
    pub foreign_tax_credit: Decimal,
    pub final_payable: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_transaction_type_parsing() {
        assert_eq!("buy".parse::<TransactionType>(), Ok(TransactionType::Buy));
        assert_eq!(" SELL ".parse::<TransactionType>(), Ok(TransactionType::Sell));
        assert!("hold".parse::<TransactionType>().is_err());
        assert_eq!(TransactionType::Sell.as_str(), "SELL");
    }

    #[test]
    fn test_month_key_previous_wraps_year() {
        let jan = MonthKey::new(2024, 1).unwrap();
        assert_eq!(jan.previous().to_string(), "2023-12");
        assert_eq!(jan.previous().next(), jan);
    }

    #[test]
    fn test_month_key_parse() {
        let key: MonthKey = "2024-02".parse().unwrap();
        assert_eq!(key.year(), 2024);
        assert_eq!(key.month(), 2);
        assert!("2024-13".parse::<MonthKey>().is_err());
        assert!("2024-2".parse::<MonthKey>().is_err());
        assert!("202402".parse::<MonthKey>().is_err());
    }

    #[test]
    fn test_month_key_serializes_as_string() {
        let key = MonthKey::new(2025, 3).unwrap();
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"2025-03\"");
        let back: MonthKey = serde_json::from_str("\"2025-03\"").unwrap();
        assert_eq!(back, key);
    }

    #[test]
    fn test_dividend_local_amounts() {
        let div = Dividend {
            id: "d1".to_string(),
            ticker: "KO".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            gross_amount_foreign: dec!(600),
            withholding_foreign: dec!(90),
            conversion_rate: dec!(32.00),
        };
        assert_eq!(div.gross_local(), dec!(19200));
        assert_eq!(div.withholding_local(), dec!(2880));
    }
}
