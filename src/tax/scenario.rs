//! What-if evaluation of hypothetical disposals
//!
//! Estimates are built from the same indexation and bracket functions as the
//! realized figures, applied to open lots at a hypothetical price and date.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

use super::brackets::{marginal_tax, BracketSchedule};
use super::indexation::{apply_indexation, reference_month, IndexedCost, PriceIndexTable};
use crate::models::{OpenLot, TaxSummary};

/// A sale that has not happened
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HypotheticalSale {
    pub date: NaiveDate,
    pub unit_price_foreign: Decimal,
    pub conversion_rate: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisposalEstimate {
    pub ticker: String,
    pub source_id: String,
    pub quantity: Decimal,
    pub market_value_local: Decimal,
    pub raw_cost_local: Decimal,
    pub indexation: IndexedCost,
    pub potential_profit: Decimal,
    /// Extra tax the sale would add on top of the baseline
    pub estimated_tax: Decimal,
}

/// Index the lot cost up to the sale's reference month.
///
/// Index values for future months are not published yet, so the sale side
/// falls back to the latest known value. The purchase side never falls back.
fn index_lot(lot: &OpenLot, sale_date: NaiveDate, index_table: &PriceIndexTable) -> IndexedCost {
    let buy_month = reference_month(lot.acquisition_date);
    let wanted_month = reference_month(sale_date);

    let (sell_month, sell_index) = match index_table.get(wanted_month) {
        Some(value) => (wanted_month, Some(value)),
        None => match index_table.latest() {
            Some((month, value)) => (month, Some(value)),
            None => (wanted_month, None),
        },
    };

    apply_indexation(
        buy_month,
        sell_month,
        index_table.get(buy_month),
        sell_index,
        lot.cost_local(),
    )
}

/// Estimate selling a whole open lot
pub fn estimate_disposal(
    lot: &OpenLot,
    sale: &HypotheticalSale,
    index_table: &PriceIndexTable,
    baseline: &TaxSummary,
    brackets: &BracketSchedule,
) -> DisposalEstimate {
    let market_value_local = lot.remaining_quantity * sale.unit_price_foreign * sale.conversion_rate;
    let indexation = index_lot(lot, sale.date, index_table);
    let potential_profit = market_value_local - indexation.adjusted_cost;
    let estimated_tax = marginal_tax(
        potential_profit.max(Decimal::ZERO),
        baseline.total_taxable_income,
        brackets,
    );

    DisposalEstimate {
        ticker: lot.ticker.clone(),
        source_id: lot.source_id.clone(),
        quantity: lot.remaining_quantity,
        market_value_local,
        raw_cost_local: lot.cost_local(),
        indexation,
        potential_profit,
        estimated_tax,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiquidationEstimate {
    pub disposals: Vec<DisposalEstimate>,
    /// Tickers held but missing from the price list
    pub unpriced_tickers: Vec<String>,
    pub total_market_value: Decimal,
    pub total_unrealized_profit: Decimal,
    /// Extra tax if every priced lot were sold together
    pub estimated_tax: Decimal,
}

/// Estimate selling every priced open lot on `date` at `conversion_rate`
pub fn estimate_liquidation(
    open_lots: &[OpenLot],
    prices: &BTreeMap<String, Decimal>,
    conversion_rate: Decimal,
    date: NaiveDate,
    index_table: &PriceIndexTable,
    baseline: &TaxSummary,
    brackets: &BracketSchedule,
) -> LiquidationEstimate {
    let mut disposals = Vec::new();
    let mut unpriced_tickers: Vec<String> = Vec::new();

    for lot in open_lots {
        match prices.get(&lot.ticker) {
            Some(price) if *price > Decimal::ZERO => {
                let sale = HypotheticalSale {
                    date,
                    unit_price_foreign: *price,
                    conversion_rate,
                };
                disposals.push(estimate_disposal(lot, &sale, index_table, baseline, brackets));
            }
            _ => {
                if !unpriced_tickers.contains(&lot.ticker) {
                    unpriced_tickers.push(lot.ticker.clone());
                }
            }
        }
    }

    let total_market_value = disposals.iter().map(|d| d.market_value_local).sum();
    let total_unrealized_profit: Decimal = disposals.iter().map(|d| d.potential_profit).sum();
    let estimated_tax = marginal_tax(
        total_unrealized_profit.max(Decimal::ZERO),
        baseline.total_taxable_income,
        brackets,
    );

    LiquidationEstimate {
        disposals,
        unpriced_tickers,
        total_market_value,
        total_unrealized_profit,
        estimated_tax,
    }
}

/// An open lot close to crossing the indexation threshold
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexationOpportunity {
    pub ticker: String,
    pub source_id: String,
    pub acquisition_date: NaiveDate,
    pub inflation_rate: Decimal,
    pub cost_local: Decimal,
    /// Tax avoided at `marginal_rate` once the cost becomes indexed
    pub potential_tax_saving: Decimal,
}

/// Open lots whose inflation to the latest index lies in `[floor, threshold)`
pub fn near_indexation(
    open_lots: &[OpenLot],
    index_table: &PriceIndexTable,
    floor: Decimal,
    marginal_rate: Decimal,
) -> Vec<IndexationOpportunity> {
    let Some((latest_month, latest_value)) = index_table.latest() else {
        return Vec::new();
    };

    open_lots
        .iter()
        .filter_map(|lot| {
            let buy_month = reference_month(lot.acquisition_date);
            let indexation = apply_indexation(
                buy_month,
                latest_month,
                index_table.get(buy_month),
                Some(latest_value),
                lot.cost_local(),
            );

            if indexation.warning.is_some()
                || indexation.is_indexed
                || indexation.inflation_rate < floor
            {
                return None;
            }

            let cost_local = lot.cost_local();
            Some(IndexationOpportunity {
                ticker: lot.ticker.clone(),
                source_id: lot.source_id.clone(),
                acquisition_date: lot.acquisition_date,
                inflation_rate: indexation.inflation_rate,
                cost_local,
                potential_tax_saving: cost_local * indexation.inflation_rate * marginal_rate,
            })
        })
        .collect()
}
