//! Input validation for transactions and dividends
//!
//! Collects every issue in a batch instead of failing on the first one, so a
//! caller can report all bad records at once. Any issue aborts the whole
//! computation with [`TaxError::InvalidInput`].

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::TaxError;
use crate::models::{Dividend, Transaction};

/// Largest local-currency value one record may carry (10^20).
///
/// Keeps every product, sum and indexed cost derived from a valid batch far
/// inside the range of [`Decimal`].
pub const MAX_LOCAL_VALUE: Decimal = Decimal::from_parts(0x6310_0000, 0x6bc7_5e2d, 0x5, false, 0);

/// A validation issue found on one record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Id of the offending transaction or dividend
    pub record: String,
    /// Field name that has the issue (e.g., "quantity", "conversion_rate")
    pub field: String,
    /// The problematic value
    pub value: String,
    /// Description of why this is an issue
    pub reason: String,
}

impl ValidationIssue {
    pub fn new(
        record: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            record: record.into(),
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} = '{}' {}",
            self.record, self.field, self.value, self.reason
        )
    }
}

fn check_positive(issues: &mut Vec<ValidationIssue>, record: &str, field: &str, value: Decimal) {
    if value <= Decimal::ZERO {
        issues.push(ValidationIssue::new(
            record,
            field,
            value.to_string(),
            "must be positive",
        ));
    }
}

/// Flag `a * b * c` when it overflows or exceeds [`MAX_LOCAL_VALUE`]
fn check_local_value(
    issues: &mut Vec<ValidationIssue>,
    record: &str,
    field: &str,
    factors: [Decimal; 3],
) {
    let [a, b, c] = factors;
    let product = a.checked_mul(b).and_then(|v| v.checked_mul(c));
    match product {
        Some(value) if value.abs() <= MAX_LOCAL_VALUE => {}
        _ => issues.push(ValidationIssue::new(
            record,
            field,
            format!("{} x {} x {}", a, b, c),
            "local value out of range",
        )),
    }
}

fn check_ticker(issues: &mut Vec<ValidationIssue>, record: &str, ticker: &str) {
    if ticker.trim().is_empty() {
        issues.push(ValidationIssue::new(record, "ticker", ticker, "must not be empty"));
    }
}

/// Collect issues for a single transaction
pub fn transaction_issues(tx: &Transaction) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    check_ticker(&mut issues, &tx.id, &tx.ticker);
    check_positive(&mut issues, &tx.id, "quantity", tx.quantity);
    check_positive(&mut issues, &tx.id, "unit_price_foreign", tx.unit_price_foreign);
    check_positive(&mut issues, &tx.id, "conversion_rate", tx.conversion_rate);
    check_local_value(
        &mut issues,
        &tx.id,
        "quantity",
        [tx.quantity, tx.unit_price_foreign, tx.conversion_rate],
    );
    issues
}

/// Collect issues for a single dividend
pub fn dividend_issues(div: &Dividend) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    check_ticker(&mut issues, &div.id, &div.ticker);
    check_positive(&mut issues, &div.id, "gross_amount_foreign", div.gross_amount_foreign);
    check_positive(&mut issues, &div.id, "conversion_rate", div.conversion_rate);
    check_local_value(
        &mut issues,
        &div.id,
        "gross_amount_foreign",
        [div.gross_amount_foreign, div.conversion_rate, Decimal::ONE],
    );

    if div.withholding_foreign < Decimal::ZERO {
        issues.push(ValidationIssue::new(
            &div.id,
            "withholding_foreign",
            div.withholding_foreign.to_string(),
            "must not be negative",
        ));
    } else if div.withholding_foreign > div.gross_amount_foreign {
        issues.push(ValidationIssue::new(
            &div.id,
            "withholding_foreign",
            div.withholding_foreign.to_string(),
            "exceeds the gross amount",
        ));
    }

    issues
}

/// Validate a whole batch, returning every issue found
pub fn validate_batch(transactions: &[Transaction], dividends: &[Dividend]) -> Result<(), TaxError> {
    let issues: Vec<ValidationIssue> = transactions
        .iter()
        .flat_map(transaction_issues)
        .chain(dividends.iter().flat_map(dividend_issues))
        .collect();

    if issues.is_empty() {
        Ok(())
    } else {
        Err(TaxError::InvalidInput { issues })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TransactionType;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn tx(id: &str, quantity: Decimal, price: Decimal, rate: Decimal) -> Transaction {
        Transaction {
            id: id.to_string(),
            ticker: "MSFT".to_string(),
            kind: TransactionType::Buy,
            date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            quantity,
            unit_price_foreign: price,
            conversion_rate: rate,
        }
    }

    fn div(id: &str, gross: Decimal, withholding: Decimal) -> Dividend {
        Dividend {
            id: id.to_string(),
            ticker: "MSFT".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
            gross_amount_foreign: gross,
            withholding_foreign: withholding,
            conversion_rate: dec!(32),
        }
    }

    #[test]
    fn test_valid_batch_passes() {
        let txs = vec![tx("t1", dec!(10), dec!(100), dec!(30))];
        let divs = vec![div("d1", dec!(50), dec!(7.5))];
        assert!(validate_batch(&txs, &divs).is_ok());
    }

    #[test]
    fn test_collects_all_issues() {
        let txs = vec![
            tx("t1", dec!(0), dec!(100), dec!(30)),
            tx("t2", dec!(5), dec!(-1), dec!(0)),
        ];
        let divs = vec![div("d1", dec!(10), dec!(20))];

        match validate_batch(&txs, &divs) {
            Err(TaxError::InvalidInput { issues }) => {
                assert_eq!(issues.len(), 4);
                assert_eq!(issues[0].record, "t1");
                assert_eq!(issues[0].field, "quantity");
                assert!(issues.iter().any(|i| i.record == "t2" && i.field == "conversion_rate"));
                assert!(issues.iter().any(|i| i.record == "d1" && i.reason.contains("exceeds")));
            }
            other => panic!("expected InvalidInput, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_withholding_is_allowed() {
        assert!(dividend_issues(&div("d1", dec!(10), dec!(0))).is_empty());
    }

    #[test]
    fn test_overflowing_local_value_rejected() {
        let huge = tx("t1", dec!(1000000000000000), dec!(100000000), dec!(1000000));
        let issues = transaction_issues(&huge);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].field, "quantity");
        assert_eq!(issues[0].reason, "local value out of range");

        let mut big_div = div("d1", Decimal::MAX, dec!(0));
        big_div.conversion_rate = dec!(2);
        let issues = dividend_issues(&big_div);
        assert!(issues.iter().any(|i| i.reason == "local value out of range"));
    }

    #[test]
    fn test_local_value_limit_is_inclusive() {
        let at_limit = tx("t1", MAX_LOCAL_VALUE, dec!(1), dec!(1));
        assert_eq!(MAX_LOCAL_VALUE, "100000000000000000000".parse::<Decimal>().unwrap());
        assert!(transaction_issues(&at_limit).is_empty());

        let above = tx("t2", MAX_LOCAL_VALUE + dec!(1), dec!(1), dec!(1));
        assert_eq!(transaction_issues(&above).len(), 1);
    }

    #[test]
    fn test_blank_ticker_rejected() {
        let mut t = tx("t1", dec!(1), dec!(1), dec!(1));
        t.ticker = "  ".to_string();
        let issues = transaction_issues(&t);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].field, "ticker");
    }
}
