//! Bar frequency parsing and labelling.

use chrono::Duration;
use std::fmt;
use std::str::FromStr;

use super::error::NestradeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FreqUnit {
    Minute,
    Day,
    Week,
}

impl FreqUnit {
    fn name(self) -> &'static str {
        match self {
            FreqUnit::Minute => "minute",
            FreqUnit::Day => "day",
            FreqUnit::Week => "week",
        }
    }

    fn minutes(self) -> i64 {
        match self {
            FreqUnit::Minute => 1,
            FreqUnit::Day => 24 * 60,
            FreqUnit::Week => 7 * 24 * 60,
        }
    }
}

/// A fixed-length bar size such as `1day` or `5minute`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Freq {
    pub count: u32,
    pub unit: FreqUnit,
}

impl Freq {
    pub fn new(count: u32, unit: FreqUnit) -> Result<Self, NestradeError> {
        if count == 0 {
            return Err(NestradeError::invalid_config("frequency count must be at least 1"));
        }
        Ok(Freq { count, unit })
    }

    pub fn day() -> Self {
        Freq {
            count: 1,
            unit: FreqUnit::Day,
        }
    }

    pub fn minutes(count: u32) -> Self {
        Freq {
            count: count.max(1),
            unit: FreqUnit::Minute,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::minutes(self.unit.minutes() * i64::from(self.count))
    }

    /// Report key, e.g. `1day`.
    pub fn label(&self) -> String {
        format!("{}{}", self.count, self.unit.name())
    }

    /// Rough number of bars in a trading year, used to annualise metrics.
    pub fn bars_per_year(&self) -> f64 {
        let per_unit = match self.unit {
            FreqUnit::Minute => 252.0 * 240.0,
            FreqUnit::Day => 252.0,
            FreqUnit::Week => 52.0,
        };
        per_unit / f64::from(self.count)
    }
}

impl fmt::Display for Freq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl FromStr for Freq {
    type Err = NestradeError;

    /// Accepts `day`, `1d`, `5min`, `30minute`, `w`, `2week` and similar.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim().to_lowercase();
        let split = text
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(text.len());
        let (digits, unit) = text.split_at(split);

        let count = if digits.is_empty() {
            1
        } else {
            digits
                .parse::<u32>()
                .map_err(|_| NestradeError::invalid_config(format!("bad frequency count in '{s}'")))?
        };

        let unit = match unit {
            "minute" | "min" | "minutes" => FreqUnit::Minute,
            "day" | "d" | "days" => FreqUnit::Day,
            "week" | "w" | "weeks" => FreqUnit::Week,
            "month" | "mon" | "m" => {
                return Err(NestradeError::invalid_config(format!(
                    "frequency '{s}' has no fixed length"
                )));
            }
            _ => {
                return Err(NestradeError::invalid_config(format!(
                    "unsupported frequency '{s}'"
                )));
            }
        };

        Freq::new(count, unit)
    }
}
