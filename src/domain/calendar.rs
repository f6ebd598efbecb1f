//! Trade calendar: fixed-length bars tiling a half-open time range.

use chrono::NaiveDateTime;
use std::fmt;

use super::error::NestradeError;
use super::freq::Freq;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeRange {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self, NestradeError> {
        if start >= end {
            return Err(NestradeError::invalid_config(format!(
                "start {start} must be before end {end}"
            )));
        }
        Ok(TimeRange { start, end })
    }

    pub fn contains(&self, t: NaiveDateTime) -> bool {
        self.start <= t && t < self.end
    }

    pub fn duration(&self) -> chrono::Duration {
        self.end - self.start
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Parses `2020-01-02 09:30:00`, `2020-01-02T09:30:00`, `2020-01-02 09:30` or
/// a bare date, which means midnight.
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            chrono::NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeCalendar {
    freq: Freq,
    range: TimeRange,
    bar_count: usize,
    current_index: usize,
}

impl TradeCalendar {
    pub fn new(freq: Freq, range: TimeRange) -> Result<Self, NestradeError> {
        let bar_len = freq.duration().num_seconds();
        let total = range.duration().num_seconds();
        if bar_len <= 0 || total % bar_len != 0 {
            return Err(NestradeError::MisalignedRange {
                start: range.start.to_string(),
                end: range.end.to_string(),
                freq: freq.label(),
            });
        }
        Ok(TradeCalendar {
            freq,
            range,
            bar_count: (total / bar_len) as usize,
            current_index: 0,
        })
    }

    /// Rebuilds the bar sequence for a new frequency and range.
    pub fn reset(&mut self, freq: Freq, range: TimeRange) -> Result<(), NestradeError> {
        *self = TradeCalendar::new(freq, range)?;
        Ok(())
    }

    pub fn step(&mut self) -> Result<(), NestradeError> {
        if self.finished() {
            return Err(NestradeError::CalendarExhausted {
                freq: self.freq.label(),
                bar_count: self.bar_count,
            });
        }
        self.current_index += 1;
        Ok(())
    }

    pub fn finished(&self) -> bool {
        self.current_index == self.bar_count
    }

    pub fn freq(&self) -> Freq {
        self.freq
    }

    pub fn range(&self) -> TimeRange {
        self.range
    }

    pub fn bar_count(&self) -> usize {
        self.bar_count
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn remaining(&self) -> usize {
        self.bar_count - self.current_index
    }

    /// Index of the bar just stepped into, or 0 before the first step.
    pub fn trade_index(&self) -> usize {
        self.current_index.saturating_sub(1)
    }

    pub fn bar_bounds(&self, index: usize) -> Option<TimeRange> {
        if index >= self.bar_count {
            return None;
        }
        let len = self.freq.duration();
        let start = self.range.start + chrono::Duration::seconds(len.num_seconds() * index as i64);
        Some(TimeRange {
            start,
            end: start + len,
        })
    }

    pub fn current_bar_bounds(&self) -> TimeRange {
        // bar_count >= 1 because the range is non-empty and tiles exactly
        self.bar_bounds(self.trade_index()).unwrap_or(self.range)
    }
}
