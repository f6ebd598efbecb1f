//! Reference strategies: replaying a fixed order schedule, and splitting an
//! outer decision evenly over the inner bars.

use std::collections::BTreeMap;
use std::rc::Rc;

use super::calendar::{TimeRange, TradeCalendar};
use super::error::NestradeError;
use super::exchange::Exchange;
use super::executor::{Infra, LevelInfra};
use super::order::{Decision, Direction, ExecutionRecord, Order};
use crate::ports::strategy_port::TradeStrategy;

// Remaining amounts below this count as fully traded.
const AMOUNT_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub enum StrategyConfig {
    Twap,
    Schedule(Vec<Order>),
}

impl StrategyConfig {
    pub fn build(&self) -> Box<dyn TradeStrategy> {
        match self {
            StrategyConfig::Twap => Box::new(TwapStrategy::new()),
            StrategyConfig::Schedule(orders) => Box::new(ScheduledStrategy::new(orders.clone())),
        }
    }
}

/// Takes one bar of `calendar` and returns its bounds.
fn next_bar(calendar: &mut Option<TradeCalendar>) -> Result<TimeRange, NestradeError> {
    let calendar = calendar
        .as_mut()
        .ok_or_else(|| NestradeError::invalid_config("strategy used before reset"))?;
    calendar.step()?;
    Ok(calendar.current_bar_bounds())
}

/// Replays timestamped orders in the bar their time falls into.
///
/// Orders without a time go out once, with the first bar this strategy
/// trades. Later resets (one per outer bar when nested) do not resend them.
#[derive(Debug, Clone)]
pub struct ScheduledStrategy {
    schedule: Vec<Order>,
    calendar: Option<TradeCalendar>,
    untimed_sent: bool,
}

impl ScheduledStrategy {
    pub fn new(mut schedule: Vec<Order>) -> Self {
        // stable, so same-time orders keep their given order
        schedule.sort_by_key(Order::scheduled_at);
        ScheduledStrategy {
            schedule,
            calendar: None,
            untimed_sent: false,
        }
    }
}

impl TradeStrategy for ScheduledStrategy {
    fn reset(&mut self, level: LevelInfra, _outer_decision: Option<&Decision>) {
        self.calendar = Some(level.calendar);
    }

    fn generate_trade_decision(
        &mut self,
        _previous: Option<&[ExecutionRecord]>,
    ) -> Result<Decision, NestradeError> {
        let bar = next_bar(&mut self.calendar)?;
        let send_untimed = !self.untimed_sent;
        self.untimed_sent = true;
        Ok(self
            .schedule
            .iter()
            .filter(|o| match o.scheduled_at() {
                Some(t) => bar.contains(t),
                None => send_untimed,
            })
            .cloned()
            .collect())
    }
}

#[derive(Debug, Clone)]
struct Target {
    order: Order,
    remaining: f64,
}

/// Spreads each order of the outer decision evenly over the remaining
/// tradable inner bars. The last tradable bar gets whatever is left.
#[derive(Debug, Default)]
pub struct TwapStrategy {
    targets: BTreeMap<(String, Direction), Target>,
    calendar: Option<TradeCalendar>,
    exchange: Option<Rc<Exchange>>,
}

impl TwapStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    fn deduct(&mut self, previous: &[ExecutionRecord]) {
        for deal in previous.iter().filter_map(ExecutionRecord::dealt) {
            let key = (deal.order.instrument().to_string(), deal.order.direction());
            if let Some(target) = self.targets.get_mut(&key) {
                target.remaining = (target.remaining - deal.traded_amount).max(0.0);
            }
        }
    }

    fn tradable(&self, instrument: &str, bar: &TimeRange) -> bool {
        self.exchange
            .as_ref()
            .is_none_or(|ex| ex.deal_price(instrument, bar).is_some())
    }

    /// Bars from `from` to the end of the run in which `instrument` can trade.
    fn tradable_bars_left(&self, calendar: &TradeCalendar, from: usize, instrument: &str) -> usize {
        (from..calendar.bar_count())
            .filter_map(|i| calendar.bar_bounds(i))
            .filter(|bar| self.tradable(instrument, bar))
            .count()
    }
}

impl TradeStrategy for TwapStrategy {
    fn reset_infra(&mut self, infra: &Infra) {
        if let Some(exchange) = &infra.exchange {
            self.exchange = Some(Rc::clone(exchange));
        }
    }

    fn reset(&mut self, level: LevelInfra, outer_decision: Option<&Decision>) {
        self.calendar = Some(level.calendar);
        self.targets.clear();
        for order in outer_decision.into_iter().flatten() {
            let key = (order.instrument().to_string(), order.direction());
            self.targets
                .entry(key)
                .and_modify(|t| t.remaining += order.amount())
                .or_insert_with(|| Target {
                    order: order.clone(),
                    remaining: order.amount(),
                });
        }
    }

    fn generate_trade_decision(
        &mut self,
        previous: Option<&[ExecutionRecord]>,
    ) -> Result<Decision, NestradeError> {
        if let Some(previous) = previous {
            self.deduct(previous);
        }

        let calendar = self
            .calendar
            .clone()
            .ok_or_else(|| NestradeError::invalid_config("strategy used before reset"))?;
        let index = calendar.current_index();
        let bar = next_bar(&mut self.calendar)?;

        let mut decision = Vec::new();
        for target in self.targets.values() {
            if target.remaining <= AMOUNT_EPSILON {
                continue;
            }
            let instrument = target.order.instrument();
            if !self.tradable(instrument, &bar) {
                continue;
            }
            let bars_left = self.tradable_bars_left(&calendar, index, instrument).max(1);
            let amount = if bars_left == 1 {
                target.remaining
            } else {
                let share = target.remaining / bars_left as f64;
                match &self.exchange {
                    Some(ex) => ex.round_amount(share, target.order.factor()),
                    None => share,
                }
            };
            if amount > AMOUNT_EPSILON {
                decision.push(target.order.resized(amount)?);
            }
        }
        Ok(decision)
    }
}
