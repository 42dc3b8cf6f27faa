//! Inflation indexation of cost basis
//!
//! Cost is inflated by the ratio of the price index in the month before the
//! sale to the one in the month before the purchase, but only once inflation
//! between those reference months reaches the threshold.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::error::TaxError;
use crate::models::{MissingIndexData, MonthKey};

/// Minimum inflation rate (inclusive) for the cost basis to be indexed: 10%
pub const INDEXATION_THRESHOLD: Decimal = Decimal::from_parts(10, 0, 0, false, 2);

/// Sparse month-keyed price index, values always positive
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, Decimal>",
    into = "BTreeMap<String, Decimal>"
)]
pub struct PriceIndexTable {
    values: BTreeMap<MonthKey, Decimal>,
}

impl PriceIndexTable {
    pub fn new<I>(entries: I) -> Result<Self, TaxError>
    where
        I: IntoIterator<Item = (MonthKey, Decimal)>,
    {
        let mut values = BTreeMap::new();
        for (month, value) in entries {
            if value <= Decimal::ZERO {
                return Err(TaxError::InvalidIndexValue {
                    month: month.to_string(),
                    value,
                });
            }
            values.insert(month, value);
        }
        Ok(Self { values })
    }

    pub fn get(&self, month: MonthKey) -> Option<Decimal> {
        self.values
            .get(&month)
            .copied()
            .filter(|value| *value > Decimal::ZERO)
    }

    /// Most recent month with a published value
    pub fn latest(&self) -> Option<(MonthKey, Decimal)> {
        self.values.iter().next_back().map(|(k, v)| (*k, *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl TryFrom<BTreeMap<String, Decimal>> for PriceIndexTable {
    type Error = TaxError;

    fn try_from(raw: BTreeMap<String, Decimal>) -> Result<Self, Self::Error> {
        let entries = raw
            .into_iter()
            .map(|(key, value)| Ok((key.parse::<MonthKey>()?, value)))
            .collect::<Result<Vec<_>, TaxError>>()?;
        Self::new(entries)
    }
}

impl From<PriceIndexTable> for BTreeMap<String, Decimal> {
    fn from(table: PriceIndexTable) -> Self {
        table
            .values
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }
}

/// Reference month of a transaction date: the calendar month before it.
/// Day-of-month never matters, so March 31 maps to February.
pub fn reference_month(date: NaiveDate) -> MonthKey {
    MonthKey::of(date).previous()
}

/// Inclusive threshold check shared by every indexation decision
pub fn is_indexation_due(inflation_rate: Decimal) -> bool {
    inflation_rate >= INDEXATION_THRESHOLD
}

/// Outcome of indexing one cost basis
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexedCost {
    pub buy_reference_month: MonthKey,
    pub sell_reference_month: MonthKey,
    pub buy_ref_index: Option<Decimal>,
    pub sell_ref_index: Option<Decimal>,
    pub inflation_rate: Decimal,
    pub is_indexed: bool,
    pub adjusted_cost: Decimal,
    pub warning: Option<MissingIndexData>,
}

/// Index `raw_cost_local` between the reference months of `buy_date` and `sell_date`
pub fn indexed_cost(
    buy_date: NaiveDate,
    sell_date: NaiveDate,
    raw_cost_local: Decimal,
    index_table: &PriceIndexTable,
) -> IndexedCost {
    let buy_month = reference_month(buy_date);
    let sell_month = reference_month(sell_date);
    apply_indexation(
        buy_month,
        sell_month,
        index_table.get(buy_month),
        index_table.get(sell_month),
        raw_cost_local,
    )
}

/// Index a cost from already looked-up reference values.
///
/// A missing (or non-positive) value on either side leaves the cost unindexed
/// and attaches a [`MissingIndexData`] warning.
pub fn apply_indexation(
    buy_month: MonthKey,
    sell_month: MonthKey,
    buy_index: Option<Decimal>,
    sell_index: Option<Decimal>,
    raw_cost_local: Decimal,
) -> IndexedCost {
    let buy_index = buy_index.filter(|v| *v > Decimal::ZERO);
    let sell_index = sell_index.filter(|v| *v > Decimal::ZERO);

    let (inflation_rate, is_indexed, adjusted_cost, warning) = match (buy_index, sell_index) {
        (Some(buy), Some(sell)) => {
            let rate = (sell - buy) / buy;
            if is_indexation_due(rate) {
                (rate, true, raw_cost_local * (sell / buy), None)
            } else {
                (rate, false, raw_cost_local, None)
            }
        }
        _ => {
            let mut months = Vec::new();
            if buy_index.is_none() {
                months.push(buy_month);
            }
            if sell_index.is_none() && sell_month != buy_month {
                months.push(sell_month);
            }
            let warning = MissingIndexData { months };
            debug!("{}, cost left unindexed", warning);
            (Decimal::ZERO, false, raw_cost_local, Some(warning))
        }
    };

    IndexedCost {
        buy_reference_month: buy_month,
        sell_reference_month: sell_month,
        buy_ref_index: buy_index,
        sell_ref_index: sell_index,
        inflation_rate,
        is_indexed,
        adjusted_cost,
        warning,
    }
}
