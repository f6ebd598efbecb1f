//! Order validation and fill simulation.
//!
//! The exchange turns an order into either a fill (price, amount, cost) or a
//! rejection. It never mutates an account; the caller applies the fill.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::str::FromStr;

use super::account::Account;
use super::calendar::TimeRange;
use super::error::NestradeError;
use super::market::Quote;
use super::order::{Direction, ExecutionRecord, MatchResult, Order, RejectReason, Rejection};
use crate::ports::market_port::MarketDataPort;

/// Which bar price a fill is struck at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DealPrice {
    Close,
    Open,
    Vwap,
}

impl DealPrice {
    pub fn pick(self, quote: &Quote) -> f64 {
        match self {
            DealPrice::Close => quote.close,
            DealPrice::Open => quote.open,
            DealPrice::Vwap => quote.vwap,
        }
    }
}

impl FromStr for DealPrice {
    type Err = NestradeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().trim_start_matches('$').to_lowercase();
        match name.as_str() {
            "close" => Ok(DealPrice::Close),
            "open" => Ok(DealPrice::Open),
            "vwap" => Ok(DealPrice::Vwap),
            _ => Err(NestradeError::invalid_config(format!(
                "unknown deal price '{s}' (expected close, open or vwap)"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeConfig {
    pub deal_price: DealPrice,
    pub open_cost: f64,
    pub close_cost: f64,
    pub min_cost: f64,
    /// Lot size in real shares; `None` trades fractional amounts.
    pub trade_unit: Option<f64>,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        ExchangeConfig {
            deal_price: DealPrice::Close,
            open_cost: 0.0015,
            close_cost: 0.0025,
            min_cost: 5.0,
            trade_unit: Some(100.0),
        }
    }
}

/// Fee for a trade of `value`: max(min_cost, value * rate).
pub fn calculate_cost(value: f64, direction: Direction, config: &ExchangeConfig) -> f64 {
    let rate = match direction {
        Direction::Buy => config.open_cost,
        Direction::Sell => config.close_cost,
    };
    config.min_cost.max(value * rate)
}

pub struct Exchange {
    market: Rc<dyn MarketDataPort>,
    config: ExchangeConfig,
    quotes: RefCell<HashMap<(String, TimeRange), Option<Quote>>>,
}

impl std::fmt::Debug for Exchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Exchange")
            .field("config", &self.config)
            .field("cached_quotes", &self.quotes.borrow().len())
            .finish()
    }
}

impl Exchange {
    pub fn new(market: Rc<dyn MarketDataPort>, config: ExchangeConfig) -> Self {
        Exchange {
            market,
            config,
            quotes: RefCell::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &ExchangeConfig {
        &self.config
    }

    /// Market lookup, memoized per (instrument, range).
    pub fn quote(&self, instrument: &str, range: &TimeRange) -> Option<Quote> {
        let key = (instrument.to_string(), *range);
        if let Some(hit) = self.quotes.borrow().get(&key) {
            return hit.clone();
        }
        let quote = self.market.quote(instrument, range);
        self.quotes.borrow_mut().insert(key, quote.clone());
        quote
    }

    pub fn deal_price(&self, instrument: &str, range: &TimeRange) -> Option<f64> {
        self.quote(instrument, range)
            .filter(|q| q.tradable)
            .map(|q| self.config.deal_price.pick(&q))
    }

    /// Rounds down to whole trade units, measured in real shares (amount * factor).
    pub fn round_amount(&self, amount: f64, factor: f64) -> f64 {
        match self.config.trade_unit {
            Some(unit) if unit > 0.0 => {
                let lots = (amount * factor / unit + 1e-9).floor();
                lots * unit / factor
            }
            _ => amount,
        }
    }

    /// Runs the tradability, price-limit and lot-size checks in that order.
    pub fn check_order(&self, order: &Order, range: &TimeRange) -> Result<Quote, RejectReason> {
        let quote = match self.quote(order.instrument(), range) {
            Some(q) if q.tradable => q,
            _ => return Err(RejectReason::Suspended),
        };

        if let Some((low, high)) = quote.limit_band {
            let price = self.config.deal_price.pick(&quote);
            let blocked = match order.direction() {
                Direction::Buy => price >= high,
                Direction::Sell => price <= low,
            };
            if blocked {
                return Err(RejectReason::PriceLimit);
            }
        }

        if self.round_amount(order.amount(), order.factor()) <= 0.0 {
            return Err(RejectReason::ZeroAmount);
        }

        Ok(quote)
    }

    pub fn validate(&self, order: &Order, range: &TimeRange) -> bool {
        self.check_order(order, range).is_ok()
    }

    /// Validates and fills `order` against `account`'s cash or holdings.
    pub fn match_order(&self, order: &Order, range: &TimeRange, account: &Account) -> ExecutionRecord {
        let reject = |reason| {
            ExecutionRecord::Rejected(Rejection {
                order: order.clone(),
                time_range: *range,
                reason,
            })
        };

        let quote = match self.check_order(order, range) {
            Ok(q) => q,
            Err(reason) => return reject(reason),
        };
        let price = self.config.deal_price.pick(&quote);
        let requested = self.round_amount(order.amount(), order.factor());

        let amount = match order.direction() {
            Direction::Buy => {
                let value = requested * price;
                if value + calculate_cost(value, Direction::Buy, &self.config) <= account.cash() {
                    requested
                } else {
                    self.affordable_amount(account.cash(), price, order.factor())
                }
            }
            Direction::Sell => {
                let held = account.position_amount(order.instrument());
                if held <= 0.0 {
                    return reject(RejectReason::NoPosition);
                }
                if order.amount() >= held {
                    held
                } else {
                    requested
                }
            }
        };

        if amount <= 0.0 {
            return reject(RejectReason::InsufficientCash);
        }

        let value = amount * price;
        let cost = calculate_cost(value, order.direction(), &self.config);
        let traded_value = match order.direction() {
            Direction::Buy => value,
            Direction::Sell => -value,
        };

        tracing::debug!(
            instrument = order.instrument(),
            direction = %order.direction(),
            requested = order.amount(),
            amount,
            price,
            cost,
            "order dealt"
        );

        ExecutionRecord::Dealt(MatchResult {
            order: order.clone(),
            time_range: *range,
            traded_amount: amount,
            traded_value,
            traded_cost: cost,
            traded_price: price,
        })
    }

    fn affordable_amount(&self, cash: f64, price: f64, factor: f64) -> f64 {
        if cash <= 0.0 || price <= 0.0 {
            return 0.0;
        }
        let proportional = self.round_amount(cash / (price * (1.0 + self.config.open_cost)), factor);
        let value = proportional * price;
        if value + calculate_cost(value, Direction::Buy, &self.config) <= cash {
            return proportional;
        }
        // the flat minimum fee dominates
        let after_fee = (cash - self.config.min_cost).max(0.0);
        self.round_amount(after_fee / price, factor)
    }
}
