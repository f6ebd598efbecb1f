//! Top-level driver: steps the root executor bar by bar until its calendar
//! runs out.

use chrono::NaiveDateTime;
use std::rc::Rc;

use super::account::Account;
use super::calendar::TimeRange;
use super::error::NestradeError;
use super::exchange::{Exchange, ExchangeConfig};
use super::executor::{Executor, ExecutorConfig, Infra, ReportMap};
use super::order::{Decision, ExecutionRecord, MatchResult};
use crate::ports::market_port::MarketDataPort;
use crate::ports::strategy_port::TradeStrategy;

#[derive(Debug, Clone)]
pub struct BacktestConfig {
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub initial_cash: f64,
    pub benchmark: Option<String>,
    pub exchange: ExchangeConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestReport {
    pub reports: ReportMap,
    /// Every record returned to the root strategy, in execution order.
    pub records: Vec<ExecutionRecord>,
}

impl BacktestReport {
    pub fn trades(&self) -> impl Iterator<Item = &MatchResult> {
        self.records.iter().filter_map(ExecutionRecord::dealt)
    }

    pub fn rejected_count(&self) -> usize {
        self.records.iter().filter(|r| !r.is_dealt()).count()
    }
}

/// Runs `strategy` through `executor` over `range`. Infra must already be injected.
pub fn run_backtest(
    range: TimeRange,
    strategy: &mut dyn TradeStrategy,
    executor: &mut dyn Executor,
) -> Result<BacktestReport, NestradeError> {
    drive(range, strategy, executor, &mut |_: &Decision| {}, false)
}

/// Like [`run_backtest`], pushing every decision generated at any level into `sink`.
pub fn collect_backtest_data(
    range: TimeRange,
    strategy: &mut dyn TradeStrategy,
    executor: &mut dyn Executor,
    sink: &mut dyn FnMut(&Decision),
) -> Result<BacktestReport, NestradeError> {
    drive(range, strategy, executor, sink, true)
}

fn drive(
    range: TimeRange,
    strategy: &mut dyn TradeStrategy,
    executor: &mut dyn Executor,
    sink: &mut dyn FnMut(&Decision),
    collecting: bool,
) -> Result<BacktestReport, NestradeError> {
    executor.reset(Some(range), None)?;
    strategy.reset(executor.level_infra()?, None);

    let mut records = Vec::new();
    let mut previous: Option<Vec<ExecutionRecord>> = None;
    while !executor.finished() {
        let decision = strategy
            .generate_trade_decision(previous.as_deref())
            .map_err(|err| {
                let bar = executor.core().calendar().map_or(0, |c| c.current_index());
                executor.core().at_bar(bar, err)
            })?;
        let step = if collecting {
            executor.collect_data(&decision, sink)?
        } else {
            executor.execute(&decision)?
        };
        records.extend(step.iter().cloned());
        previous = Some(step);
    }

    Ok(BacktestReport {
        reports: executor.report(),
        records,
    })
}

/// Builds the ledger, exchange and executor tree from config, then runs.
///
/// Every config problem is reported before the first bar is processed.
pub fn backtest(
    config: &BacktestConfig,
    strategy: &mut dyn TradeStrategy,
    executor_config: &ExecutorConfig,
    market: Rc<dyn MarketDataPort>,
) -> Result<BacktestReport, NestradeError> {
    let range = TimeRange::new(config.start_time, config.end_time)?;
    if !(config.initial_cash.is_finite() && config.initial_cash > 0.0) {
        return Err(NestradeError::invalid_config(format!(
            "initial cash must be positive, got {}",
            config.initial_cash
        )));
    }
    let mut executor = executor_config.build(0)?;

    let account = Account::new(config.initial_cash, config.benchmark.clone());
    let exchange = Rc::new(Exchange::new(market, config.exchange.clone()));
    let infra = Infra::new(account, exchange);
    executor.reset(Some(range), Some(&infra))?;
    strategy.reset_infra(&infra);

    tracing::info!(
        %range,
        levels = executor_config.depth(),
        initial_cash = config.initial_cash,
        "backtest starting"
    );
    let report = run_backtest(range, strategy, executor.as_mut())?;
    tracing::info!(
        trades = report.trades().count(),
        rejected = report.rejected_count(),
        "backtest finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::ErrorKind;
    use crate::domain::market::{MarketBar, MarketData};
    use crate::domain::order::{Direction, Order};
    use crate::domain::strategy::{ScheduledStrategy, StrategyConfig};
    use chrono::NaiveDate;

    fn dt(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, 1, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn market() -> Rc<dyn MarketDataPort> {
        let bars = (1..=3)
            .map(|d| MarketBar {
                code: "X".into(),
                time: dt(d),
                open: 10.0,
                high: 10.0,
                low: 10.0,
                close: 10.0,
                volume: 1000.0,
                suspended: false,
            })
            .collect();
        Rc::new(MarketData::new(bars))
    }

    fn config(start: u32, end: u32) -> BacktestConfig {
        BacktestConfig {
            start_time: dt(start),
            end_time: dt(end),
            initial_cash: 1_000_000.0,
            benchmark: None,
            exchange: ExchangeConfig::default(),
        }
    }

    fn daily() -> ExecutorConfig {
        ExecutorConfig::nested(&["day"], &StrategyConfig::Twap, true, false).unwrap()
    }

    #[test]
    fn start_after_end_fails_before_running() {
        let mut strategy = ScheduledStrategy::new(Vec::new());
        let err = backtest(&config(3, 1), &mut strategy, &daily(), market()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
    }

    #[test]
    fn non_positive_cash_fails() {
        let mut strategy = ScheduledStrategy::new(Vec::new());
        let cfg = BacktestConfig {
            initial_cash: 0.0,
            ..config(1, 3)
        };
        let err = backtest(&cfg, &mut strategy, &daily(), market()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
    }

    #[test]
    fn records_come_back_in_order() {
        let mut strategy = ScheduledStrategy::new(vec![
            Order::new("X", Direction::Buy, 100.0).unwrap().at(dt(1)),
            Order::new("X", Direction::Sell, 100.0).unwrap().at(dt(2)),
        ]);
        let report = backtest(&config(1, 3), &mut strategy, &daily(), market()).unwrap();
        assert_eq!(report.records.len(), 2);
        assert_eq!(report.trades().count(), 2);
        assert_eq!(report.rejected_count(), 0);
        assert_eq!(report.reports["1day"].rows.len(), 2);
        assert!(report.reports["1day"].positions.holdings.is_empty());
    }

    #[test]
    fn misaligned_range_is_config_time_error() {
        let mut strategy = ScheduledStrategy::new(Vec::new());
        let cfg = BacktestConfig {
            end_time: dt(3) + chrono::Duration::hours(5),
            ..config(1, 3)
        };
        let err = backtest(&cfg, &mut strategy, &daily(), market()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MisalignedRange);
    }
}
