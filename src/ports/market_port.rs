//! Market data access port trait.

use crate::domain::calendar::TimeRange;
use crate::domain::market::Quote;

/// Pure lookup of an instrument's aggregated market state over a time range.
///
/// Implementations must answer identical queries identically; the exchange
/// relies on that for deterministic replays.
pub trait MarketDataPort {
    fn quote(&self, instrument: &str, range: &TimeRange) -> Option<Quote>;
}
