//! Trade instructions and their execution outcomes.

use chrono::NaiveDateTime;
use std::fmt;
use std::str::FromStr;

use super::calendar::TimeRange;
use super::error::NestradeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    Buy,
    Sell,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Buy => f.write_str("buy"),
            Direction::Sell => f.write_str("sell"),
        }
    }
}

impl FromStr for Direction {
    type Err = NestradeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "buy" | "b" => Ok(Direction::Buy),
            "sell" | "s" => Ok(Direction::Sell),
            other => Err(NestradeError::invalid_config(format!(
                "unknown order direction '{other}'"
            ))),
        }
    }
}

/// A trade instruction. Fields are private so an order cannot change after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    instrument: String,
    direction: Direction,
    amount: f64,
    factor: f64,
    at: Option<NaiveDateTime>,
}

impl Order {
    pub fn new(
        instrument: impl Into<String>,
        direction: Direction,
        amount: f64,
    ) -> Result<Self, NestradeError> {
        Order::with_factor(instrument, direction, amount, 1.0)
    }

    pub fn with_factor(
        instrument: impl Into<String>,
        direction: Direction,
        amount: f64,
        factor: f64,
    ) -> Result<Self, NestradeError> {
        let instrument = instrument.into();
        if !(amount.is_finite() && amount > 0.0) {
            return Err(NestradeError::invalid_config(format!(
                "order amount for {instrument} must be positive, got {amount}"
            )));
        }
        if !(factor.is_finite() && factor > 0.0) {
            return Err(NestradeError::invalid_config(format!(
                "order factor for {instrument} must be positive, got {factor}"
            )));
        }
        Ok(Order {
            instrument,
            direction,
            amount,
            factor,
            at: None,
        })
    }

    /// Pins the order to a timestamp; scheduled strategies use it to pick the bar.
    pub fn at(mut self, time: NaiveDateTime) -> Self {
        self.at = Some(time);
        self
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn amount(&self) -> f64 {
        self.amount
    }

    pub fn factor(&self) -> f64 {
        self.factor
    }

    pub fn scheduled_at(&self) -> Option<NaiveDateTime> {
        self.at
    }

    /// Same order with a different requested amount.
    pub fn resized(&self, amount: f64) -> Result<Self, NestradeError> {
        let mut order = Order::with_factor(&*self.instrument, self.direction, amount, self.factor)?;
        order.at = self.at;
        Ok(order)
    }
}

pub type Decision = Vec<Order>;

#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub order: Order,
    pub time_range: TimeRange,
    pub traded_amount: f64,
    /// Positive for buys (cash out), negative for sells (cash in).
    pub traded_value: f64,
    pub traded_cost: f64,
    pub traded_price: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Suspended,
    PriceLimit,
    ZeroAmount,
    InsufficientCash,
    NoPosition,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RejectReason::Suspended => "not tradable in this bar",
            RejectReason::PriceLimit => "deal price outside the limit band",
            RejectReason::ZeroAmount => "amount rounds to zero",
            RejectReason::InsufficientCash => "not enough cash for one trade unit",
            RejectReason::NoPosition => "nothing held to sell",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub order: Order,
    pub time_range: TimeRange,
    pub reason: RejectReason,
}

/// One entry per order handed to a leaf executor, in decision order.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionRecord {
    Dealt(MatchResult),
    Rejected(Rejection),
}

impl ExecutionRecord {
    pub fn dealt(&self) -> Option<&MatchResult> {
        match self {
            ExecutionRecord::Dealt(m) => Some(m),
            ExecutionRecord::Rejected(_) => None,
        }
    }

    pub fn is_dealt(&self) -> bool {
        matches!(self, ExecutionRecord::Dealt(_))
    }
}
