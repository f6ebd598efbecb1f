//! Leaf executor: matches orders directly against the exchange.

use super::{Executor, ExecutorCore};
use crate::domain::calendar::TimeRange;
use crate::domain::error::NestradeError;
use crate::domain::freq::Freq;
use crate::domain::order::{Decision, ExecutionRecord};

#[derive(Debug, Clone)]
pub struct SimulatorExecutor {
    core: ExecutorCore,
}

impl SimulatorExecutor {
    pub fn new(freq: Freq, level: usize) -> Self {
        SimulatorExecutor {
            core: ExecutorCore::new(freq, level),
        }
    }

    pub fn with_report(mut self, on: bool) -> Self {
        self.core.set_generate_report(on);
        self
    }

    pub fn with_verbose(mut self, on: bool) -> Self {
        self.core.set_verbose(on);
        self
    }

    pub fn with_track_data(mut self, on: bool) -> Self {
        self.core.set_track_data(on);
        self
    }

    fn execute_bar(
        &mut self,
        decision: &Decision,
        bar: usize,
        range: TimeRange,
    ) -> Result<Vec<ExecutionRecord>, NestradeError> {
        let exchange = self.core.require_exchange()?;
        let level = self.core.level();
        let verbose = self.core.verbose();
        let account = self.core.account_mut().ok_or_else(|| {
            NestradeError::invalid_config(format!("no account injected at level {level}"))
        })?;

        let mut records = Vec::with_capacity(decision.len());
        for order in decision {
            let record = exchange.match_order(order, &range, account);
            match &record {
                ExecutionRecord::Dealt(m) => {
                    account.apply(m)?;
                    if verbose {
                        tracing::info!(
                            level,
                            bar,
                            instrument = order.instrument(),
                            direction = %order.direction(),
                            amount = m.traded_amount,
                            price = m.traded_price,
                            cost = m.traded_cost,
                            "trade"
                        );
                    }
                }
                ExecutionRecord::Rejected(r) => {
                    tracing::debug!(
                        level,
                        bar,
                        instrument = order.instrument(),
                        direction = %order.direction(),
                        reason = %r.reason,
                        "order not dealt"
                    );
                }
            }
            records.push(record);
        }

        let row = account.mark_bar_end(range, &exchange)?;
        if verbose {
            tracing::info!(
                level,
                bar,
                start = %row.start,
                value = row.account_value,
                cash = row.cash,
                "bar closed"
            );
        }
        Ok(records)
    }
}

impl Executor for SimulatorExecutor {
    fn core(&self) -> &ExecutorCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ExecutorCore {
        &mut self.core
    }

    fn execute(&mut self, decision: &Decision) -> Result<Vec<ExecutionRecord>, NestradeError> {
        let (bar, range) = self.core.step()?;
        self.execute_bar(decision, bar, range)
            .map_err(|err| self.core.at_bar(bar, err))
    }
}
