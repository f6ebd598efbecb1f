//! Strategy capability consumed by the executors.

use crate::domain::error::NestradeError;
use crate::domain::executor::{Infra, LevelInfra};
use crate::domain::order::{Decision, ExecutionRecord};

/// Decides what to trade, one call per bar at the level it is attached to.
pub trait TradeStrategy {
    /// Picks up shared infrastructure. Most strategies need none of it.
    fn reset_infra(&mut self, _infra: &Infra) {}

    /// Starts a new run over `level`'s calendar. Inner strategies also receive
    /// the decision of the level above as context.
    fn reset(&mut self, level: LevelInfra, outer_decision: Option<&Decision>);

    /// `previous` is `None` on the first call of a run.
    fn generate_trade_decision(
        &mut self,
        previous: Option<&[ExecutionRecord]>,
    ) -> Result<Decision, NestradeError>;
}
