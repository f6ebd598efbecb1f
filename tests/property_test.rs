//! Property tests for calendar and matching invariants.
//!
//! Uses proptest to verify:
//! 1. Calendar tiling: bars cover the range exactly, stepping ends on the last bar
//! 2. Cash conservation: a full buy moves cash by value plus cost
//! 3. Lot rejection: amounts below one trade unit never deal, however often retried
//! 4. Nested runs close every level with contiguous rows

mod common;

use common::*;
use nestrade::domain::account::Account;
use nestrade::domain::backtest::{BacktestConfig, backtest};
use nestrade::domain::calendar::{TimeRange, TradeCalendar};
use nestrade::domain::error::ErrorKind;
use nestrade::domain::exchange::{Exchange, ExchangeConfig, calculate_cost};
use nestrade::domain::executor::ExecutorConfig;
use nestrade::domain::freq::Freq;
use nestrade::domain::order::{Direction, ExecutionRecord, Order, RejectReason};
use nestrade::domain::strategy::{ScheduledStrategy, StrategyConfig};
use nestrade::ports::market_port::MarketDataPort;
use proptest::prelude::*;
use std::rc::Rc;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_price() -> impl Strategy<Value = f64> {
    (1.0..500.0_f64).prop_map(|p| (p * 100.0).round() / 100.0)
}

fn arb_minutes() -> impl Strategy<Value = u32> {
    prop_oneof![Just(1u32), Just(5), Just(15), Just(30), Just(60), Just(240)]
}

fn bar() -> TimeRange {
    range(dt(2020, 1, 1), dt(2020, 1, 2))
}

// ── 1. Calendar tiling ───────────────────────────────────────────────

proptest! {
    #[test]
    fn calendar_tiles_range(minutes in arb_minutes(), bars in 1usize..200) {
        let freq = Freq::minutes(minutes);
        let start = dt(2020, 1, 1);
        let end = start + chrono::Duration::minutes(i64::from(minutes) * bars as i64);
        let mut cal = TradeCalendar::new(freq, range(start, end)).unwrap();
        prop_assert_eq!(cal.bar_count(), bars);

        let mut expected_start = start;
        while !cal.finished() {
            cal.step().unwrap();
            let b = cal.current_bar_bounds();
            prop_assert_eq!(b.start, expected_start);
            prop_assert_eq!(b.end - b.start, freq.duration());
            expected_start = b.end;
        }
        prop_assert_eq!(expected_start, end);
        prop_assert_eq!(cal.step().unwrap_err().kind(), ErrorKind::CalendarExhausted);
    }

    #[test]
    fn partial_bar_is_misaligned(minutes in 2u32..240, bars in 1i64..50, extra in 1i64..60) {
        let extra = extra % i64::from(minutes);
        prop_assume!(extra > 0);
        let start = dt(2020, 1, 1);
        let end = start + chrono::Duration::minutes(i64::from(minutes) * bars + extra);
        let err = TradeCalendar::new(Freq::minutes(minutes), range(start, end)).unwrap_err();
        prop_assert_eq!(err.kind(), ErrorKind::MisalignedRange);
    }
}

// ── 2. Cash conservation ─────────────────────────────────────────────

proptest! {
    #[test]
    fn full_buy_conserves_cash(price in arb_price(), lots in 1u32..50) {
        let market: Rc<dyn MarketDataPort> = Rc::new(MockMarket::new().with_price("X", price));
        let exchange = Exchange::new(market, ExchangeConfig::default());
        let mut account = Account::new(1_000_000.0, None);
        let order = Order::new("X", Direction::Buy, f64::from(lots) * 100.0).unwrap();

        let record = exchange.match_order(&order, &bar(), &account);
        let deal = record.dealt().unwrap().clone();
        account.apply(&deal).unwrap();

        let value = deal.traded_amount * price;
        prop_assert!((deal.traded_value - value).abs() < 1e-9);
        prop_assert!(deal.traded_cost >= 5.0);
        prop_assert!((deal.traded_cost - calculate_cost(value, Direction::Buy, exchange.config())).abs() < 1e-12);
        prop_assert!((account.cash() - (1_000_000.0 - value - deal.traded_cost)).abs() < 1e-6);
    }

    #[test]
    fn buys_never_overdraw(price in arb_price(), cash in 100.0..50_000.0_f64, lots in 1u32..1000) {
        let market: Rc<dyn MarketDataPort> = Rc::new(MockMarket::new().with_price("X", price));
        let exchange = Exchange::new(market, ExchangeConfig::default());
        let mut account = Account::new(cash, None);
        let order = Order::new("X", Direction::Buy, f64::from(lots) * 100.0).unwrap();

        if let ExecutionRecord::Dealt(deal) = exchange.match_order(&order, &bar(), &account) {
            account.apply(&deal).unwrap();
            prop_assert!(account.cash() >= -1e-9);
            prop_assert!(deal.traded_amount <= order.amount());
        }
    }
}

// ── 3. Lot rejection ─────────────────────────────────────────────────

proptest! {
    #[test]
    fn sub_lot_orders_always_rejected(amount in 0.01..99.99_f64, price in arb_price(), tries in 1usize..5) {
        let market: Rc<dyn MarketDataPort> = Rc::new(MockMarket::new().with_price("X", price));
        let exchange = Exchange::new(market, ExchangeConfig::default());
        let account = Account::new(1_000_000.0, None);
        let order = Order::new("X", Direction::Buy, amount).unwrap();

        for _ in 0..tries {
            match exchange.match_order(&order, &bar(), &account) {
                ExecutionRecord::Rejected(r) => prop_assert_eq!(r.reason, RejectReason::ZeroAmount),
                ExecutionRecord::Dealt(_) => prop_assert!(false, "sub-lot order dealt"),
            }
        }
        prop_assert!(!exchange.validate(&order, &bar()));
    }
}

// ── 4. Nested reports ────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn nested_levels_close_every_bar(days in 1u32..5, inner in prop_oneof![Just("360min"), Just("60min"), Just("240min")]) {
        let market: Rc<dyn MarketDataPort> = Rc::new(MockMarket::new().with_price("X", 10.0));
        let mut strategy = ScheduledStrategy::new(vec![
            Order::new("X", Direction::Buy, 1_000.0).unwrap(),
        ]);
        let executor = ExecutorConfig::nested(&["day", inner], &StrategyConfig::Twap, true, false).unwrap();
        let start = dt(2020, 1, 1);
        let cfg = BacktestConfig {
            start_time: start,
            end_time: start + chrono::Duration::days(i64::from(days)),
            initial_cash: 1_000_000.0,
            benchmark: None,
            exchange: ExchangeConfig::default(),
        };
        let report = backtest(&cfg, &mut strategy, &executor, market).unwrap();

        let inner_freq: Freq = inner.parse().unwrap();
        let per_day = (24 * 60 / inner_freq.duration().num_minutes()) as usize;
        let outer_rows = &report.reports["1day"].rows;
        let inner_rows = &report.reports[&inner_freq.label()].rows;
        prop_assert_eq!(outer_rows.len(), days as usize);
        prop_assert_eq!(inner_rows.len(), days as usize * per_day);
        for pair in inner_rows.windows(2) {
            prop_assert_eq!(pair[0].end, pair[1].start);
        }
        prop_assert_eq!(inner_rows.last().unwrap().end, cfg.end_time);
        let outer = &report.reports["1day"].positions;
        let leaf = &report.reports[&inner_freq.label()].positions;
        prop_assert_eq!(&outer.holdings, &leaf.holdings);
        prop_assert!((outer.cash - leaf.cash).abs() < 1e-9);
    }
}
