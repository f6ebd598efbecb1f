#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use nestrade::domain::calendar::TimeRange;
use nestrade::domain::market::{MarketBar, Quote};
use nestrade::ports::market_port::MarketDataPort;
use std::cell::Cell;
use std::collections::HashMap;

/// Fixed-price market: every instrument trades at its price in every range.
pub struct MockMarket {
    pub prices: HashMap<String, f64>,
    pub suspended: Vec<String>,
    pub lookups: Cell<usize>,
}

impl MockMarket {
    pub fn new() -> Self {
        Self {
            prices: HashMap::new(),
            suspended: Vec::new(),
            lookups: Cell::new(0),
        }
    }

    pub fn with_price(mut self, code: &str, price: f64) -> Self {
        self.prices.insert(code.to_string(), price);
        self
    }

    pub fn with_suspended(mut self, code: &str) -> Self {
        self.suspended.push(code.to_string());
        self
    }
}

impl MarketDataPort for MockMarket {
    fn quote(&self, instrument: &str, _range: &TimeRange) -> Option<Quote> {
        self.lookups.set(self.lookups.get() + 1);
        let price = *self.prices.get(instrument)?;
        Some(Quote {
            open: price,
            high: price,
            low: price,
            close: price,
            vwap: price,
            volume: 1_000_000.0,
            prev_close: Some(price),
            limit_band: None,
            tradable: !self.suspended.iter().any(|s| s == instrument),
        })
    }
}

pub fn dt(y: i32, m: u32, d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

pub fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, min, 0)
        .unwrap()
}

pub fn range(start: NaiveDateTime, end: NaiveDateTime) -> TimeRange {
    TimeRange::new(start, end).unwrap()
}

/// `count` bars of `step_minutes` each, close rising by `drift` per bar.
pub fn generate_bars(
    code: &str,
    start: NaiveDateTime,
    step_minutes: i64,
    count: usize,
    start_price: f64,
    drift: f64,
) -> Vec<MarketBar> {
    (0..count)
        .map(|i| {
            let close = start_price + drift * i as f64;
            MarketBar {
                code: code.to_string(),
                time: start + chrono::Duration::minutes(step_minutes * i as i64),
                open: close - drift / 2.0,
                high: close + 0.5,
                low: close - 0.5,
                close,
                volume: 1000.0,
                suspended: false,
            }
        })
        .collect()
}
