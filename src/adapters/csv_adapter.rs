//! CSV market data and order schedule adapter.

use crate::domain::calendar::parse_timestamp;
use crate::domain::error::NestradeError;
use crate::domain::market::MarketBar;
use crate::domain::order::{Direction, Order};
use chrono::NaiveDateTime;
use std::fs;
use std::path::{Path, PathBuf};

/// Reads CSV files relative to `base_path` (usually the config file's directory).
pub struct CsvAdapter {
    base_path: PathBuf,
}

/// Column positions resolved from a header row.
struct Columns {
    names: Vec<String>,
}

impl Columns {
    fn new(headers: &csv::StringRecord) -> Self {
        Columns {
            names: headers.iter().map(|h| h.trim().to_lowercase()).collect(),
        }
    }

    fn index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    fn require(&self, name: &str, file: &Path) -> Result<usize, NestradeError> {
        self.index(name).ok_or_else(|| NestradeError::DataSource {
            reason: format!("{}: missing '{}' column", file.display(), name),
        })
    }
}

fn field<'r>(
    record: &'r csv::StringRecord,
    idx: usize,
    name: &str,
    line: usize,
) -> Result<&'r str, NestradeError> {
    record
        .get(idx)
        .map(str::trim)
        .ok_or_else(|| NestradeError::DataSource {
            reason: format!("line {line}: missing {name} value"),
        })
}

fn number(record: &csv::StringRecord, idx: usize, name: &str, line: usize) -> Result<f64, NestradeError> {
    let raw = field(record, idx, name, line)?;
    raw.parse().map_err(|e| NestradeError::DataSource {
        reason: format!("line {line}: invalid {name} value '{raw}': {e}"),
    })
}

fn timestamp(record: &csv::StringRecord, idx: usize, line: usize) -> Result<NaiveDateTime, NestradeError> {
    let raw = field(record, idx, "datetime", line)?;
    parse_timestamp(raw).ok_or_else(|| NestradeError::DataSource {
        reason: format!("line {line}: invalid datetime '{raw}'"),
    })
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_path.join(path)
        }
    }

    fn reader(&self, path: &Path) -> Result<csv::Reader<std::io::Cursor<String>>, NestradeError> {
        let content = fs::read_to_string(path).map_err(|e| NestradeError::DataSource {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;
        Ok(csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(std::io::Cursor::new(content)))
    }

    /// Columns `code,datetime,open,high,low,close,volume[,suspended]`.
    pub fn load_market(&self, path: &str) -> Result<Vec<MarketBar>, NestradeError> {
        let path = self.resolve(path);
        let mut rdr = self.reader(&path)?;
        let headers = rdr.headers().map_err(|e| NestradeError::DataSource {
            reason: format!("{}: CSV header error: {}", path.display(), e),
        })?;
        let cols = Columns::new(headers);
        let code = cols.require("code", &path)?;
        let time = cols.require("datetime", &path)?;
        let open = cols.require("open", &path)?;
        let high = cols.require("high", &path)?;
        let low = cols.require("low", &path)?;
        let close = cols.require("close", &path)?;
        let volume = cols.require("volume", &path)?;
        let suspended = cols.index("suspended");

        let mut bars = Vec::new();
        for (i, result) in rdr.records().enumerate() {
            let line = i + 2;
            let record = result.map_err(|e| NestradeError::DataSource {
                reason: format!("CSV parse error: {}", e),
            })?;
            let suspended = match suspended.and_then(|idx| record.get(idx)) {
                Some(v) => matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"),
                None => false,
            };
            bars.push(MarketBar {
                code: field(&record, code, "code", line)?.to_string(),
                time: timestamp(&record, time, line)?,
                open: number(&record, open, "open", line)?,
                high: number(&record, high, "high", line)?,
                low: number(&record, low, "low", line)?,
                close: number(&record, close, "close", line)?,
                volume: number(&record, volume, "volume", line)?,
                suspended,
            });
        }
        Ok(bars)
    }

    /// Columns `datetime,code,direction,amount[,factor]`.
    pub fn load_orders(&self, path: &str) -> Result<Vec<Order>, NestradeError> {
        let path = self.resolve(path);
        let mut rdr = self.reader(&path)?;
        let headers = rdr.headers().map_err(|e| NestradeError::DataSource {
            reason: format!("{}: CSV header error: {}", path.display(), e),
        })?;
        let cols = Columns::new(headers);
        let time = cols.require("datetime", &path)?;
        let code = cols.require("code", &path)?;
        let direction = cols.require("direction", &path)?;
        let amount = cols.require("amount", &path)?;
        let factor = cols.index("factor");

        let mut orders = Vec::new();
        for (i, result) in rdr.records().enumerate() {
            let line = i + 2;
            let record = result.map_err(|e| NestradeError::DataSource {
                reason: format!("CSV parse error: {}", e),
            })?;
            let dir = field(&record, direction, "direction", line)?
                .parse::<Direction>()
                .map_err(|e| NestradeError::DataSource {
                    reason: format!("line {line}: {e}"),
                })?;
            let factor = match factor {
                Some(idx) if record.get(idx).is_some_and(|v| !v.trim().is_empty()) => {
                    number(&record, idx, "factor", line)?
                }
                _ => 1.0,
            };
            let order = Order::with_factor(
                field(&record, code, "code", line)?,
                dir,
                number(&record, amount, "amount", line)?,
                factor,
            )
            .map_err(|e| NestradeError::DataSource {
                reason: format!("line {line}: {e}"),
            })?
            .at(timestamp(&record, time, line)?);
            orders.push(order);
        }
        Ok(orders)
    }
}
