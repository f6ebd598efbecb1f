//! Report output port trait.

use crate::domain::error::NestradeError;
use crate::domain::executor::ReportMap;

/// Port for persisting the per-level reports of a finished run.
pub trait ReportPort {
    fn write(&self, reports: &ReportMap, output_dir: &str) -> Result<(), NestradeError>;
}
