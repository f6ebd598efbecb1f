//! CSV report writer: one report file and one positions file per level.

use crate::domain::error::NestradeError;
use crate::domain::executor::ReportMap;
use crate::ports::report_port::ReportPort;
use serde::Serialize;
use std::fs;
use std::path::Path;

pub struct CsvReportAdapter;

#[derive(Serialize)]
struct PositionRow<'a> {
    instrument: &'a str,
    amount: f64,
}

fn csv_error(path: &Path, e: csv::Error) -> NestradeError {
    NestradeError::DataSource {
        reason: format!("failed to write {}: {}", path.display(), e),
    }
}

impl ReportPort for CsvReportAdapter {
    /// Writes `report_<label>.csv` and `positions_<label>.csv`. The positions
    /// file lists cash first under the instrument name `cash`.
    fn write(&self, reports: &ReportMap, output_dir: &str) -> Result<(), NestradeError> {
        let dir = Path::new(output_dir);
        fs::create_dir_all(dir)?;

        for (label, level) in reports {
            let path = dir.join(format!("report_{label}.csv"));
            let mut wtr = csv::Writer::from_path(&path).map_err(|e| csv_error(&path, e))?;
            for row in &level.rows {
                wtr.serialize(row).map_err(|e| csv_error(&path, e))?;
            }
            if level.rows.is_empty() {
                wtr.write_record([
                    "start",
                    "end",
                    "account_value",
                    "cash",
                    "position_value",
                    "return",
                    "bench_return",
                    "turnover",
                    "cost",
                ])
                .map_err(|e| csv_error(&path, e))?;
            }
            wtr.flush()?;

            let path = dir.join(format!("positions_{label}.csv"));
            let mut wtr = csv::Writer::from_path(&path).map_err(|e| csv_error(&path, e))?;
            wtr.serialize(PositionRow {
                instrument: "cash",
                amount: level.positions.cash,
            })
            .map_err(|e| csv_error(&path, e))?;
            for (instrument, amount) in &level.positions.holdings {
                wtr.serialize(PositionRow {
                    instrument,
                    amount: *amount,
                })
                .map_err(|e| csv_error(&path, e))?;
            }
            wtr.flush()?;
        }
        Ok(())
    }
}
