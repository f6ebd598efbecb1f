//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::rc::Rc;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::{self as backtest_engine, BacktestConfig, BacktestReport};
use crate::domain::config_validation::{
    InnerStrategy, parse_inner_strategy, parse_time, validate_backtest_config,
};
use crate::domain::error::NestradeError;
use crate::domain::exchange::{DealPrice, ExchangeConfig};
use crate::domain::executor::ExecutorConfig;
use crate::domain::freq::Freq;
use crate::domain::market::MarketData;
use crate::domain::metrics::Metrics;
use crate::domain::order::Order;
use crate::domain::strategy::{ScheduledStrategy, StrategyConfig};
use crate::ports::config_port::ConfigPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "nestrade", about = "Nested-frequency backtest execution engine")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Directory for the CSV reports
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a backtest configuration
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest { config, output } => run_backtest(&config, output.as_ref()),
        Command::Validate { config } => run_validate(&config),
    }
}

fn fail(err: &NestradeError) -> ExitCode {
    eprintln!("error: {err}");
    err.into()
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| fail(&e))
}

pub fn build_exchange_config(adapter: &dyn ConfigPort) -> Result<ExchangeConfig, NestradeError> {
    let defaults = ExchangeConfig::default();
    let deal_price = match adapter.get_string("exchange", "deal_price") {
        Some(s) => s.parse::<DealPrice>()?,
        None => defaults.deal_price,
    };
    let unit = adapter.get_double("exchange", "trade_unit", defaults.trade_unit.unwrap_or(0.0));
    Ok(ExchangeConfig {
        deal_price,
        open_cost: adapter.get_double("exchange", "open_cost", defaults.open_cost),
        close_cost: adapter.get_double("exchange", "close_cost", defaults.close_cost),
        min_cost: adapter.get_double("exchange", "min_cost", defaults.min_cost),
        trade_unit: if unit > 0.0 { Some(unit) } else { None },
    })
}

pub fn build_backtest_config(adapter: &dyn ConfigPort) -> Result<BacktestConfig, NestradeError> {
    Ok(BacktestConfig {
        start_time: parse_time(adapter, "start_time")?,
        end_time: parse_time(adapter, "end_time")?,
        initial_cash: adapter.get_double("backtest", "initial_cash", 1_000_000.0),
        benchmark: adapter.get_string("backtest", "benchmark"),
        exchange: build_exchange_config(adapter)?,
    })
}

/// `orders` feeds a `schedule` inner strategy; TWAP ignores it.
pub fn build_executor_config(
    adapter: &dyn ConfigPort,
    orders: &[Order],
) -> Result<ExecutorConfig, NestradeError> {
    let freqs = adapter.get_list("executor", "freqs");
    let names: Vec<&str> = freqs.iter().map(String::as_str).collect();
    let inner = match parse_inner_strategy(adapter)? {
        InnerStrategy::Twap => StrategyConfig::Twap,
        InnerStrategy::Schedule => StrategyConfig::Schedule(orders.to_vec()),
    };
    ExecutorConfig::nested(
        &names,
        &inner,
        adapter.get_bool("executor", "generate_report", true),
        adapter.get_bool("executor", "verbose", false),
    )
}

pub fn limit_threshold(adapter: &dyn ConfigPort) -> Option<f64> {
    adapter
        .get_string("exchange", "limit_threshold")
        .map(|_| adapter.get_double("exchange", "limit_threshold", 0.0))
        .filter(|t| *t > 0.0)
}

fn base_dir(config_path: &Path) -> PathBuf {
    config_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default()
}

fn run_backtest(config_path: &Path, output_path: Option<&PathBuf>) -> ExitCode {
    // Stage 1: Load and validate config
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    if let Err(e) = validate_backtest_config(&adapter) {
        return fail(&e);
    }

    // Stage 2: Load market data and the order schedule
    let csv = CsvAdapter::new(base_dir(config_path));
    let market_path = adapter
        .get_string("backtest", "market_data")
        .unwrap_or_default();
    let orders_path = adapter.get_string("backtest", "orders").unwrap_or_default();
    let bars = match csv.load_market(&market_path) {
        Ok(b) => b,
        Err(e) => return fail(&e),
    };
    let orders = match csv.load_orders(&orders_path) {
        Ok(o) => o,
        Err(e) => return fail(&e),
    };
    let market = MarketData::new(bars).with_limit_threshold(limit_threshold(&adapter));
    eprintln!(
        "Loaded {} instruments and {} orders",
        market.instruments().count(),
        orders.len()
    );

    // Stage 3: Build and run
    let bt_config = match build_backtest_config(&adapter) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };
    let executor_config = match build_executor_config(&adapter, &orders) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };
    eprintln!(
        "Running backtest: {} to {}, {} level(s)",
        bt_config.start_time,
        bt_config.end_time,
        executor_config.depth()
    );
    let mut strategy = ScheduledStrategy::new(orders);
    let report = match backtest_engine::backtest(
        &bt_config,
        &mut strategy,
        &executor_config,
        Rc::new(market),
    ) {
        Ok(r) => r,
        Err(e) => return fail(&e),
    };

    // Stage 4: Summary and reports
    print_summary(&report);
    let output = output_path
        .cloned()
        .unwrap_or_else(|| PathBuf::from("reports"));
    match CsvReportAdapter.write(&report.reports, &output.to_string_lossy()) {
        Ok(()) => {
            eprintln!("\nReports written to: {}", output.display());
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

pub fn print_summary(report: &BacktestReport) {
    eprintln!(
        "\nTrades: {} dealt, {} not dealt",
        report.trades().count(),
        report.rejected_count()
    );
    for (label, level) in &report.reports {
        let bars_per_year = label
            .parse::<Freq>()
            .map(|f| f.bars_per_year())
            .unwrap_or(252.0);
        let metrics = Metrics::compute(&level.rows, bars_per_year);
        eprintln!("\n=== {} ({} bars) ===", label, level.rows.len());
        eprintln!("Total Return:     {:.2}%", metrics.total_return * 100.0);
        eprintln!("Annualized:       {:.2}%", metrics.annualized_return * 100.0);
        eprintln!("Volatility:       {:.2}%", metrics.volatility * 100.0);
        eprintln!("Info Ratio:       {:.2}", metrics.information_ratio);
        eprintln!(
            "Max Drawdown:     -{:.1}% over {} bars",
            metrics.max_drawdown * 100.0,
            metrics.max_drawdown_duration
        );
        eprintln!("Turnover:         {:.2}", metrics.total_turnover);
        eprintln!("Cost:             {:.2}", metrics.total_cost);
        eprintln!("Final Cash:       {:.2}", level.positions.cash);
    }
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    if let Err(e) = validate_backtest_config(&adapter) {
        return fail(&e);
    }
    let bt_config = match build_backtest_config(&adapter) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };
    let executor_config = match build_executor_config(&adapter, &[]) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };

    eprintln!("\nRange: {} to {}", bt_config.start_time, bt_config.end_time);
    eprintln!("Initial cash: {:.2}", bt_config.initial_cash);
    eprintln!("Executor levels:");
    let mut level = Some(&executor_config);
    let mut depth = 0;
    while let Some(config) = level {
        let freq = config.freq().map(|f| f.label()).unwrap_or_default();
        match config {
            ExecutorConfig::Split { inner, .. } => {
                eprintln!("  {depth}: {freq} (split)");
                level = Some(inner.as_ref());
            }
            ExecutorConfig::Simulator { .. } => {
                eprintln!("  {depth}: {freq} (simulator)");
                level = None;
            }
        }
        depth += 1;
    }

    eprintln!("\nConfiguration is valid");
    ExitCode::SUCCESS
}
