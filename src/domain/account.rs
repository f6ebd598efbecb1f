//! Cash and position ledger with per-bar mark-to-market reporting.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::BTreeMap;

use super::calendar::TimeRange;
use super::error::NestradeError;
use super::exchange::Exchange;
use super::order::{Direction, MatchResult};
use super::position::Position;

// Holdings and cash shortfalls below this are rounding noise.
const AMOUNT_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub account_value: f64,
    pub cash: f64,
    pub position_value: f64,
    #[serde(rename = "return")]
    pub bar_return: f64,
    pub bench_return: f64,
    pub turnover: f64,
    pub cost: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PositionSnapshot {
    pub cash: f64,
    pub holdings: BTreeMap<String, f64>,
}

/// Positions live in a `BTreeMap` so valuation always sums in the same order.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    init_cash: f64,
    cash: f64,
    positions: BTreeMap<String, Position>,
    benchmark: Option<String>,
    freq: String,
    bar_count: usize,
    report: Vec<ReportRow>,
    last_closed: Option<NaiveDateTime>,
    last_value: f64,
    bar_turnover: f64,
    bar_cost: f64,
}

impl Account {
    pub fn new(init_cash: f64, benchmark: Option<String>) -> Self {
        Account {
            init_cash,
            cash: init_cash,
            positions: BTreeMap::new(),
            benchmark,
            freq: String::new(),
            bar_count: 0,
            report: Vec::new(),
            last_closed: None,
            last_value: init_cash,
            bar_turnover: 0.0,
            bar_cost: 0.0,
        }
    }

    pub fn init_cash(&self) -> f64 {
        self.init_cash
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    /// Label of the frequency this account reports at, empty until first reset.
    pub fn freq(&self) -> &str {
        &self.freq
    }

    pub fn position_amount(&self, instrument: &str) -> f64 {
        self.positions.get(instrument).map_or(0.0, |p| p.amount)
    }

    pub fn positions(&self) -> &BTreeMap<String, Position> {
        &self.positions
    }

    pub fn bar_count(&self) -> usize {
        self.bar_count
    }

    pub fn report_rows(&self) -> &[ReportRow] {
        &self.report
    }

    /// Cash plus holdings at their last known prices.
    pub fn value(&self) -> f64 {
        self.cash + self.positions.values().map(Position::market_value).sum::<f64>()
    }

    pub fn snapshot(&self) -> PositionSnapshot {
        PositionSnapshot {
            cash: self.cash,
            holdings: self
                .positions
                .iter()
                .map(|(code, pos)| (code.clone(), pos.amount))
                .collect(),
        }
    }

    /// Clears the report and bar count; returns are re-based on the current value.
    pub fn reset_report(&mut self, freq: &str) {
        self.freq = freq.to_string();
        self.bar_count = 0;
        self.report.clear();
        self.last_closed = None;
        self.last_value = self.value();
        self.bar_turnover = 0.0;
        self.bar_cost = 0.0;
    }

    /// Books a fill. Fails without touching the ledger when a buy would take
    /// cash below zero or a sell exceeds the holding.
    pub fn apply(&mut self, deal: &MatchResult) -> Result<(), NestradeError> {
        let instrument = deal.order.instrument();
        match deal.order.direction() {
            Direction::Buy => {
                let required = deal.traded_value + deal.traded_cost;
                if required > self.cash + AMOUNT_EPSILON {
                    return Err(NestradeError::InsufficientCash {
                        instrument: instrument.to_string(),
                        required,
                        available: self.cash,
                    });
                }
                let pos = self
                    .positions
                    .entry(instrument.to_string())
                    .or_insert_with(|| Position::new(0.0, deal.traded_price));
                pos.amount += deal.traded_amount;
                pos.last_price = deal.traded_price;
            }
            Direction::Sell => {
                let held = self.position_amount(instrument);
                if deal.traded_amount > held + AMOUNT_EPSILON {
                    return Err(NestradeError::InsufficientPosition {
                        instrument: instrument.to_string(),
                        requested: deal.traded_amount,
                        held,
                    });
                }
                let remaining = held - deal.traded_amount;
                if remaining <= AMOUNT_EPSILON {
                    self.positions.remove(instrument);
                } else if let Some(pos) = self.positions.get_mut(instrument) {
                    pos.amount = remaining;
                    pos.last_price = deal.traded_price;
                }
            }
        }

        self.cash -= deal.traded_value + deal.traded_cost;
        self.bar_turnover += deal.traded_value.abs();
        self.bar_cost += deal.traded_cost;
        Ok(())
    }

    /// Marks holdings to market at the end of `range` and appends one report row.
    pub fn mark_bar_end(
        &mut self,
        range: TimeRange,
        exchange: &Exchange,
    ) -> Result<&ReportRow, NestradeError> {
        if let Some(last) = self.last_closed {
            if range.start <= last {
                return Err(NestradeError::DuplicateBarClose {
                    start: range.start.to_string(),
                    last: last.to_string(),
                });
            }
        }

        for (code, pos) in self.positions.iter_mut() {
            match exchange.deal_price(code, &range) {
                Some(price) => pos.last_price = price,
                None => tracing::debug!(
                    instrument = code.as_str(),
                    %range,
                    price = pos.last_price,
                    "no tradable quote, keeping last price"
                ),
            }
        }

        let position_value: f64 = self.positions.values().map(Position::market_value).sum();
        let account_value = self.cash + position_value;
        let bar_return = if self.last_value > 0.0 {
            (account_value - self.last_value) / self.last_value
        } else {
            0.0
        };
        let bench_return = self
            .benchmark
            .as_deref()
            .and_then(|code| exchange.quote(code, &range))
            .and_then(|q| match q.prev_close {
                Some(prev) if prev > 0.0 => Some(q.close / prev - 1.0),
                _ => None,
            })
            .unwrap_or(0.0);

        self.report.push(ReportRow {
            start: range.start,
            end: range.end,
            account_value,
            cash: self.cash,
            position_value,
            bar_return,
            bench_return,
            turnover: self.bar_turnover,
            cost: self.bar_cost,
        });

        self.last_closed = Some(range.start);
        self.last_value = account_value;
        self.bar_turnover = 0.0;
        self.bar_cost = 0.0;
        self.bar_count += 1;

        Ok(&self.report[self.report.len() - 1])
    }
}
