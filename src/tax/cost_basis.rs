use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

use super::indexation::{indexed_cost, PriceIndexTable};
use crate::error::TaxError;
use crate::models::{CapitalGainEvent, OpenLot, Transaction, TransactionType};

/// Lots whose remaining quantity falls below this are dropped from the queue
pub const DUST_THRESHOLD: Decimal = Decimal::from_parts(1, 0, 0, false, 6);

/// A chunk of a sale matched against a single buy lot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchedChunk {
    pub ticker: String,
    pub buy_id: String,
    pub sell_id: String,
    pub buy_date: NaiveDate,
    pub sell_date: NaiveDate,
    pub quantity: Decimal,
    pub raw_cost_local: Decimal,
    pub proceeds_local: Decimal,
}

impl MatchedChunk {
    /// Price-index this chunk and produce its capital gain event
    pub fn into_event(self, index_table: &PriceIndexTable) -> CapitalGainEvent {
        let indexation = indexed_cost(self.buy_date, self.sell_date, self.raw_cost_local, index_table);
        let realized_profit_local = self.proceeds_local - indexation.adjusted_cost;

        CapitalGainEvent {
            ticker: self.ticker,
            buy_date: self.buy_date,
            sell_date: self.sell_date,
            quantity: self.quantity,
            raw_cost_local: self.raw_cost_local,
            proceeds_local: self.proceeds_local,
            buy_reference_index: indexation.buy_ref_index,
            sell_reference_index: indexation.sell_ref_index,
            inflation_rate: indexation.inflation_rate,
            is_indexed: indexation.is_indexed,
            adjusted_cost_local: indexation.adjusted_cost,
            realized_profit_local,
            buy_id: self.buy_id,
            sell_id: self.sell_id,
            index_warning: indexation.warning,
        }
    }
}

/// Open lots of one ticker in acquisition order, consumed from `head`
#[derive(Debug, Default, Clone)]
struct LotQueue {
    lots: Vec<OpenLot>,
    head: usize,
}

impl LotQueue {
    fn push(&mut self, lot: OpenLot) {
        self.lots.push(lot);
    }

    fn front_mut(&mut self) -> Option<&mut OpenLot> {
        self.lots.get_mut(self.head)
    }

    fn advance(&mut self) {
        self.head += 1;
    }

    fn open(&self) -> &[OpenLot] {
        &self.lots[self.head..]
    }

    fn available(&self) -> Decimal {
        self.open().iter().map(|lot| lot.remaining_quantity).sum()
    }
}

/// FIFO matcher keeping one queue of open lots per ticker
#[derive(Debug, Default)]
pub struct FifoMatcher {
    queues: BTreeMap<String, LotQueue>,
}

impl FifoMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a private copy of a purchase as a new lot
    pub fn add_purchase(&mut self, tx: &Transaction) {
        if tx.kind != TransactionType::Buy {
            return;
        }

        self.queues.entry(tx.ticker.clone()).or_default().push(OpenLot {
            ticker: tx.ticker.clone(),
            acquisition_date: tx.date,
            remaining_quantity: tx.quantity,
            unit_price_foreign: tx.unit_price_foreign,
            conversion_rate: tx.conversion_rate,
            source_id: tx.id.clone(),
        });
    }

    /// Match a sale against the oldest lots first, one chunk per lot touched.
    ///
    /// Fails without consuming anything when the queued quantity for the
    /// ticker cannot cover the whole sale.
    pub fn match_sale(&mut self, tx: &Transaction) -> Result<Vec<MatchedChunk>, TaxError> {
        if tx.kind != TransactionType::Sell {
            return Ok(Vec::new());
        }

        let queue = self.queues.entry(tx.ticker.clone()).or_default();
        let available = queue.available();
        if tx.quantity > available {
            let shortfall = tx.quantity - available;
            debug!(
                "Sale {} of {} {} on {} exceeds holdings by {}",
                tx.id, tx.quantity, tx.ticker, tx.date, shortfall
            );
            return Err(TaxError::InsufficientInventory {
                ticker: tx.ticker.clone(),
                date: tx.date,
                requested: tx.quantity,
                available,
                shortfall,
            });
        }

        let mut chunks = Vec::new();
        let mut remaining = tx.quantity;

        while remaining > Decimal::ZERO {
            let Some(lot) = queue.front_mut() else {
                break;
            };

            let quantity = remaining.min(lot.remaining_quantity);
            let chunk = MatchedChunk {
                ticker: tx.ticker.clone(),
                buy_id: lot.source_id.clone(),
                sell_id: tx.id.clone(),
                buy_date: lot.acquisition_date,
                sell_date: tx.date,
                quantity,
                raw_cost_local: lot.cost_of(quantity),
                proceeds_local: tx.local_value_of(quantity),
            };
            debug!(
                "Matched {} {} sold {} against lot {} bought {}",
                quantity, tx.ticker, tx.date, chunk.buy_id, chunk.buy_date
            );

            lot.remaining_quantity -= quantity;
            remaining -= quantity;
            if lot.remaining_quantity < DUST_THRESHOLD {
                queue.advance();
            }

            chunks.push(chunk);
        }

        Ok(chunks)
    }

    /// Feed one transaction through the matcher
    pub fn process(&mut self, tx: &Transaction) -> Result<Vec<MatchedChunk>, TaxError> {
        match tx.kind {
            TransactionType::Buy => {
                self.add_purchase(tx);
                Ok(Vec::new())
            }
            TransactionType::Sell => self.match_sale(tx),
        }
    }

    /// Quantity still held for a ticker
    pub fn remaining_quantity(&self, ticker: &str) -> Decimal {
        self.queues
            .get(ticker)
            .map(LotQueue::available)
            .unwrap_or(Decimal::ZERO)
    }

    /// Residual open lots, grouped by ticker in acquisition order
    pub fn open_lots(&self) -> Vec<OpenLot> {
        self.queues
            .values()
            .flat_map(|queue| queue.open().iter())
            .filter(|lot| lot.remaining_quantity >= DUST_THRESHOLD)
            .cloned()
            .collect()
    }
}

/// Sort transactions by date, ties kept in input order
pub fn chronological(transactions: &[Transaction]) -> Vec<&Transaction> {
    let mut sorted: Vec<&Transaction> = transactions.iter().collect();
    sorted.sort_by_key(|tx| tx.date);
    sorted
}

/// Run FIFO matching over a transaction list without indexing
pub fn match_lots(
    transactions: &[Transaction],
) -> Result<(Vec<MatchedChunk>, Vec<OpenLot>), TaxError> {
    let mut matcher = FifoMatcher::new();
    let mut chunks = Vec::new();

    for tx in chronological(transactions) {
        chunks.extend(matcher.process(tx)?);
    }

    Ok((chunks, matcher.open_lots()))
}

/// Matched events plus the lots still held afterwards
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchOutcome {
    pub events: Vec<CapitalGainEvent>,
    pub open_lots: Vec<OpenLot>,
}

/// Match sells against buys FIFO and index every matched chunk
pub fn match_transactions(
    transactions: &[Transaction],
    index_table: &PriceIndexTable,
) -> Result<MatchOutcome, TaxError> {
    let (chunks, open_lots) = match_lots(transactions)?;
    let events = chunks
        .into_iter()
        .map(|chunk| chunk.into_event(index_table))
        .collect();

    Ok(MatchOutcome { events, open_lots })
}
