//! Configuration validation.
//!
//! Validates all config fields before a backtest runs.

use crate::domain::calendar::{TimeRange, TradeCalendar, parse_timestamp};
use crate::domain::error::NestradeError;
use crate::domain::exchange::DealPrice;
use crate::domain::executor::ExecutorConfig;
use crate::domain::freq::Freq;
use crate::domain::strategy::StrategyConfig;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDateTime;

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), NestradeError> {
    validate_initial_cash(config)?;
    let range = validate_times(config)?;
    validate_required(config, "backtest", "market_data")?;
    validate_required(config, "backtest", "orders")?;
    validate_exchange(config)?;
    validate_executor(config, range)?;
    Ok(())
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> NestradeError {
    NestradeError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn validate_initial_cash(config: &dyn ConfigPort) -> Result<(), NestradeError> {
    let value = config.get_double("backtest", "initial_cash", 0.0);
    if !(value.is_finite() && value > 0.0) {
        return Err(invalid("backtest", "initial_cash", "initial_cash must be positive"));
    }
    Ok(())
}

fn validate_times(config: &dyn ConfigPort) -> Result<TimeRange, NestradeError> {
    let start = parse_time(config, "start_time")?;
    let end = parse_time(config, "end_time")?;
    if start >= end {
        return Err(invalid(
            "backtest",
            "start_time",
            "start_time must be before end_time",
        ));
    }
    TimeRange::new(start, end)
}

pub fn parse_time(config: &dyn ConfigPort, key: &str) -> Result<NaiveDateTime, NestradeError> {
    let value = config
        .get_string("backtest", key)
        .ok_or_else(|| NestradeError::ConfigMissing {
            section: "backtest".to_string(),
            key: key.to_string(),
        })?;
    parse_timestamp(&value).ok_or_else(|| {
        invalid(
            "backtest",
            key,
            format!("invalid {key} '{value}', expected YYYY-MM-DD or YYYY-MM-DD HH:MM:SS"),
        )
    })
}

fn validate_required(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), NestradeError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => Ok(()),
        _ => Err(NestradeError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }),
    }
}

fn validate_exchange(config: &dyn ConfigPort) -> Result<(), NestradeError> {
    if let Some(price) = config.get_string("exchange", "deal_price") {
        price
            .parse::<DealPrice>()
            .map_err(|e| invalid("exchange", "deal_price", e.to_string()))?;
    }
    for key in ["open_cost", "close_cost", "min_cost", "trade_unit"] {
        let value = config.get_double("exchange", key, 0.0);
        if !(value.is_finite() && value >= 0.0) {
            return Err(invalid("exchange", key, format!("{key} must be non-negative")));
        }
    }
    if config.get_string("exchange", "limit_threshold").is_some() {
        let value = config.get_double("exchange", "limit_threshold", f64::NAN);
        if !(value > 0.0 && value < 1.0) {
            return Err(invalid(
                "exchange",
                "limit_threshold",
                "limit_threshold must be between 0 and 1",
            ));
        }
    }
    Ok(())
}

pub fn parse_inner_strategy(config: &dyn ConfigPort) -> Result<InnerStrategy, NestradeError> {
    let name = config
        .get_string("executor", "inner_strategy")
        .unwrap_or_else(|| "twap".to_string());
    match name.trim().to_lowercase().as_str() {
        "twap" => Ok(InnerStrategy::Twap),
        "schedule" => Ok(InnerStrategy::Schedule),
        other => Err(invalid(
            "executor",
            "inner_strategy",
            format!("unknown inner strategy '{other}' (expected twap or schedule)"),
        )),
    }
}

/// Inner strategy named in config; `Schedule` replays the order file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InnerStrategy {
    Twap,
    Schedule,
}

fn validate_executor(config: &dyn ConfigPort, range: TimeRange) -> Result<(), NestradeError> {
    let freqs = config.get_list("executor", "freqs");
    if freqs.is_empty() {
        return Err(NestradeError::ConfigMissing {
            section: "executor".to_string(),
            key: "freqs".to_string(),
        });
    }
    for freq in &freqs {
        freq.parse::<Freq>()
            .map_err(|e| invalid("executor", "freqs", e.to_string()))?;
    }
    parse_inner_strategy(config)?;

    let names: Vec<&str> = freqs.iter().map(String::as_str).collect();
    let tree = ExecutorConfig::nested(&names, &StrategyConfig::Twap, false, false)?;
    tree.validate()
        .map_err(|e| invalid("executor", "freqs", e.to_string()))?;

    // the whole run must tile the outermost frequency
    TradeCalendar::new(tree.freq()?, range)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;
    use crate::domain::error::ErrorKind;

    const VALID: &str = "[backtest]\nstart_time = 2020-01-01\nend_time = 2020-01-03\ninitial_cash = 1000000\nmarket_data = bars.csv\norders = orders.csv\n[exchange]\ndeal_price = close\n[executor]\nfreqs = day, 30min\n";

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    fn with(line_from: &str, line_to: &str) -> FileConfigAdapter {
        make_config(&VALID.replace(line_from, line_to))
    }

    #[test]
    fn valid_backtest_config_passes() {
        assert!(validate_backtest_config(&make_config(VALID)).is_ok());
    }

    #[test]
    fn initial_cash_must_be_positive() {
        let err = validate_backtest_config(&with("initial_cash = 1000000", "initial_cash = -5"))
            .unwrap_err();
        assert!(matches!(err, NestradeError::ConfigInvalid { key, .. } if key == "initial_cash"));
    }

    #[test]
    fn missing_end_time_fails() {
        let err =
            validate_backtest_config(&with("end_time = 2020-01-03\n", "")).unwrap_err();
        assert!(matches!(err, NestradeError::ConfigMissing { key, .. } if key == "end_time"));
    }

    #[test]
    fn start_after_end_fails() {
        let err = validate_backtest_config(&with("end_time = 2020-01-03", "end_time = 2019-12-01"))
            .unwrap_err();
        assert!(matches!(err, NestradeError::ConfigInvalid { key, .. } if key == "start_time"));
    }

    #[test]
    fn bad_time_format_fails() {
        let err = validate_backtest_config(&with("start_time = 2020-01-01", "start_time = 01/01/2020"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
    }

    #[test]
    fn datetime_bounds_accepted() {
        let cfg = with("end_time = 2020-01-03", "end_time = 2020-01-03 00:00:00");
        assert!(validate_backtest_config(&cfg).is_ok());
    }

    #[test]
    fn missing_market_data_fails() {
        let err = validate_backtest_config(&with("market_data = bars.csv\n", "")).unwrap_err();
        assert!(matches!(err, NestradeError::ConfigMissing { key, .. } if key == "market_data"));
    }

    #[test]
    fn unknown_deal_price_fails() {
        let err = validate_backtest_config(&with("deal_price = close", "deal_price = mid"))
            .unwrap_err();
        assert!(matches!(err, NestradeError::ConfigInvalid { key, .. } if key == "deal_price"));
    }

    #[test]
    fn negative_cost_fails() {
        let cfg = with("deal_price = close", "deal_price = close\nopen_cost = -0.1");
        let err = validate_backtest_config(&cfg).unwrap_err();
        assert!(matches!(err, NestradeError::ConfigInvalid { key, .. } if key == "open_cost"));
    }

    #[test]
    fn limit_threshold_out_of_range_fails() {
        let cfg = with("deal_price = close", "deal_price = close\nlimit_threshold = 1.5");
        let err = validate_backtest_config(&cfg).unwrap_err();
        assert!(matches!(err, NestradeError::ConfigInvalid { key, .. } if key == "limit_threshold"));
    }

    #[test]
    fn month_frequency_fails() {
        let err = validate_backtest_config(&with("freqs = day, 30min", "freqs = month"))
            .unwrap_err();
        assert!(matches!(err, NestradeError::ConfigInvalid { key, .. } if key == "freqs"));
    }

    #[test]
    fn coarser_inner_frequency_fails() {
        let err = validate_backtest_config(&with("freqs = day, 30min", "freqs = 30min, day"))
            .unwrap_err();
        assert!(matches!(err, NestradeError::ConfigInvalid { key, .. } if key == "freqs"));
    }

    #[test]
    fn missing_freqs_fails() {
        let err = validate_backtest_config(&with("freqs = day, 30min\n", "")).unwrap_err();
        assert!(matches!(err, NestradeError::ConfigMissing { key, .. } if key == "freqs"));
    }

    #[test]
    fn unknown_inner_strategy_fails() {
        let cfg = with("freqs = day, 30min", "freqs = day, 30min\ninner_strategy = vwap");
        let err = validate_backtest_config(&cfg).unwrap_err();
        assert!(matches!(err, NestradeError::ConfigInvalid { key, .. } if key == "inner_strategy"));
    }

    #[test]
    fn range_must_tile_outer_frequency() {
        let err = validate_backtest_config(&with("freqs = day, 30min", "freqs = week, day"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MisalignedRange);
    }
}
