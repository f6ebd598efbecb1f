//! Performance metrics computed from a level's report rows.

use super::account::ReportRow;

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub total_return: f64,
    pub annualized_return: f64,
    pub volatility: f64,
    pub information_ratio: f64,
    pub max_drawdown: f64,
    /// In bars.
    pub max_drawdown_duration: usize,
    pub total_turnover: f64,
    pub total_cost: f64,
}

impl Metrics {
    pub fn compute(rows: &[ReportRow], bars_per_year: f64) -> Self {
        let total_return = rows
            .iter()
            .fold(1.0, |acc, r| acc * (1.0 + r.bar_return))
            - 1.0;

        let years = rows.len() as f64 / bars_per_year;
        let annualized_return = if years > 0.0 && total_return > -1.0 {
            (1.0 + total_return).powf(1.0 / years) - 1.0
        } else {
            0.0
        };

        let returns: Vec<f64> = rows.iter().map(|r| r.bar_return).collect();
        let volatility = stddev(&returns) * bars_per_year.sqrt();

        let excess: Vec<f64> = rows.iter().map(|r| r.bar_return - r.bench_return).collect();
        let excess_sd = stddev(&excess);
        let information_ratio = if excess_sd > 0.0 {
            mean(&excess) / excess_sd * bars_per_year.sqrt()
        } else {
            0.0
        };

        let (max_drawdown, max_drawdown_duration) = compute_drawdown(rows);

        Metrics {
            total_return,
            annualized_return,
            volatility,
            information_ratio,
            max_drawdown,
            max_drawdown_duration,
            total_turnover: rows.iter().map(|r| r.turnover).sum(),
            total_cost: rows.iter().map(|r| r.cost).sum(),
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
fn stddev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

fn compute_drawdown(rows: &[ReportRow]) -> (f64, usize) {
    let Some(first) = rows.first() else {
        return (0.0, 0);
    };

    let mut peak = first.account_value;
    let mut max_dd = 0.0_f64;
    let mut max_dd_duration = 0usize;
    let mut current_dd_duration = 0usize;

    for row in rows {
        if row.account_value > peak {
            peak = row.account_value;
            current_dd_duration = 0;
        } else if peak > 0.0 && row.account_value < peak {
            let dd = (peak - row.account_value) / peak;
            if dd > max_dd {
                max_dd = dd;
            }
            current_dd_duration += 1;
            if current_dd_duration > max_dd_duration {
                max_dd_duration = current_dd_duration;
            }
        }
    }

    (max_dd, max_dd_duration)
}
