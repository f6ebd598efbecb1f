//! Market bars and the in-memory market data source.

use chrono::NaiveDateTime;
use std::collections::BTreeMap;

use super::calendar::TimeRange;
use crate::ports::market_port::MarketDataPort;

#[derive(Debug, Clone)]
pub struct MarketBar {
    pub code: String,
    pub time: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub suspended: bool,
}

impl MarketBar {
    /// (high + low + close) / 3
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }
}

/// Aggregated market state of one instrument over one time range.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub vwap: f64,
    pub volume: f64,
    pub prev_close: Option<f64>,
    pub limit_band: Option<(f64, f64)>,
    pub tradable: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MarketData {
    bars: BTreeMap<String, Vec<MarketBar>>,
    limit_threshold: Option<f64>,
}

impl MarketData {
    pub fn new(bars: Vec<MarketBar>) -> Self {
        let mut by_code: BTreeMap<String, Vec<MarketBar>> = BTreeMap::new();
        for bar in bars {
            by_code.entry(bar.code.clone()).or_default().push(bar);
        }
        for series in by_code.values_mut() {
            series.sort_by_key(|b| b.time);
        }
        MarketData {
            bars: by_code,
            limit_threshold: None,
        }
    }

    /// Daily limit move as a fraction of the previous close, e.g. 0.1.
    pub fn with_limit_threshold(mut self, threshold: Option<f64>) -> Self {
        self.limit_threshold = threshold;
        self
    }

    pub fn instruments(&self) -> impl Iterator<Item = &str> {
        self.bars.keys().map(String::as_str)
    }

    pub fn bar_count(&self, code: &str) -> usize {
        self.bars.get(code).map_or(0, Vec::len)
    }
}

impl MarketDataPort for MarketData {
    fn quote(&self, instrument: &str, range: &TimeRange) -> Option<Quote> {
        let series = self.bars.get(instrument)?;
        let first = series.partition_point(|b| b.time < range.start);
        let last = series.partition_point(|b| b.time < range.end);
        let window = &series[first..last];
        let opening = window.first()?;
        let closing = window.last()?;

        let prev_close = first.checked_sub(1).map(|i| series[i].close);
        let limit_band = match (prev_close, self.limit_threshold) {
            (Some(prev), Some(t)) => Some((prev * (1.0 - t), prev * (1.0 + t))),
            _ => None,
        };

        let volume: f64 = window.iter().map(|b| b.volume).sum();
        let vwap = if volume > 0.0 {
            window.iter().map(|b| b.typical_price() * b.volume).sum::<f64>() / volume
        } else {
            closing.close
        };

        Some(Quote {
            open: opening.open,
            high: window.iter().map(|b| b.high).fold(f64::MIN, f64::max),
            low: window.iter().map(|b| b.low).fold(f64::MAX, f64::min),
            close: closing.close,
            vwap,
            volume,
            prev_close,
            limit_band,
            tradable: window.iter().any(|b| !b.suspended),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn bar(time: NaiveDateTime, open: f64, close: f64, volume: f64) -> MarketBar {
        MarketBar {
            code: "BHP".into(),
            time,
            open,
            high: open.max(close) + 1.0,
            low: open.min(close) - 1.0,
            close,
            volume,
            suspended: false,
        }
    }

    fn day(d: u32) -> TimeRange {
        TimeRange::new(dt(d, 0), dt(d + 1, 0)).unwrap()
    }

    #[test]
    fn typical_price() {
        let b = bar(dt(15, 0), 100.0, 105.0, 10.0);
        let expected = (106.0 + 99.0 + 105.0) / 3.0;
        assert!((b.typical_price() - expected).abs() < f64::EPSILON);
    }

    #[test]
    fn quote_aggregates_intraday_bars() {
        let market = MarketData::new(vec![
            bar(dt(2, 10), 10.0, 11.0, 100.0),
            bar(dt(2, 11), 11.0, 12.0, 300.0),
        ]);
        let q = market.quote("BHP", &day(2)).unwrap();
        assert!((q.open - 10.0).abs() < f64::EPSILON);
        assert!((q.close - 12.0).abs() < f64::EPSILON);
        assert!((q.high - 13.0).abs() < f64::EPSILON);
        assert!((q.low - 9.0).abs() < f64::EPSILON);
        assert!((q.volume - 400.0).abs() < f64::EPSILON);
        assert!(q.tradable);
        assert!(q.prev_close.is_none());
    }

    #[test]
    fn vwap_is_volume_weighted_typical_price() {
        let a = bar(dt(2, 10), 10.0, 11.0, 100.0);
        let b = bar(dt(2, 11), 11.0, 12.0, 300.0);
        let expected = (a.typical_price() * 100.0 + b.typical_price() * 300.0) / 400.0;
        let market = MarketData::new(vec![a, b]);
        let q = market.quote("BHP", &day(2)).unwrap();
        assert!((q.vwap - expected).abs() < 1e-12);
    }

    #[test]
    fn vwap_falls_back_to_close_without_volume() {
        let market = MarketData::new(vec![bar(dt(2, 10), 10.0, 11.0, 0.0)]);
        let q = market.quote("BHP", &day(2)).unwrap();
        assert!((q.vwap - 11.0).abs() < f64::EPSILON);
    }

    #[test]
    fn limit_band_from_previous_close() {
        let market = MarketData::new(vec![
            bar(dt(1, 0), 10.0, 10.0, 1.0),
            bar(dt(2, 0), 10.0, 11.0, 1.0),
        ])
        .with_limit_threshold(Some(0.1));
        let q = market.quote("BHP", &day(2)).unwrap();
        assert_eq!(q.prev_close, Some(10.0));
        let (low, high) = q.limit_band.unwrap();
        assert!((low - 9.0).abs() < 1e-12);
        assert!((high - 11.0).abs() < 1e-12);
    }

    #[test]
    fn suspended_bars_are_not_tradable() {
        let mut b = bar(dt(2, 0), 10.0, 10.0, 0.0);
        b.suspended = true;
        let market = MarketData::new(vec![b]);
        assert!(!market.quote("BHP", &day(2)).unwrap().tradable);
    }

    #[test]
    fn no_bars_no_quote() {
        let market = MarketData::new(vec![bar(dt(2, 0), 10.0, 10.0, 1.0)]);
        assert!(market.quote("BHP", &day(3)).is_none());
        assert!(market.quote("CBA", &day(2)).is_none());
    }

    #[test]
    fn bars_are_sorted_per_instrument() {
        let market = MarketData::new(vec![
            bar(dt(3, 0), 12.0, 12.0, 1.0),
            bar(dt(2, 0), 10.0, 10.0, 1.0),
        ]);
        assert_eq!(market.bar_count("BHP"), 2);
        let q = market.quote("BHP", &day(3)).unwrap();
        assert_eq!(q.prev_close, Some(10.0));
        assert_eq!(market.instruments().collect::<Vec<_>>(), vec!["BHP"]);
    }
}
