//! Composite executor: spends each of its bars running an inner
//! executor/strategy pair over the same window at a finer frequency.

use super::{Executor, ExecutorCore, Infra, ReportMap};
use crate::domain::account::Account;
use crate::domain::calendar::TimeRange;
use crate::domain::error::NestradeError;
use crate::domain::freq::Freq;
use crate::domain::order::{Decision, ExecutionRecord};
use crate::ports::strategy_port::TradeStrategy;

pub struct SplitExecutor {
    core: ExecutorCore,
    inner: Box<dyn Executor>,
    inner_strategy: Box<dyn TradeStrategy>,
}

impl std::fmt::Debug for SplitExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SplitExecutor")
            .field("core", &self.core)
            .field("inner_freq", &self.inner.core().freq())
            .finish()
    }
}

impl SplitExecutor {
    pub fn new(
        freq: Freq,
        level: usize,
        inner: Box<dyn Executor>,
        inner_strategy: Box<dyn TradeStrategy>,
    ) -> Self {
        SplitExecutor {
            core: ExecutorCore::new(freq, level),
            inner,
            inner_strategy,
        }
    }

    pub fn with_report(mut self, on: bool) -> Self {
        self.core.set_generate_report(on);
        self
    }

    pub fn with_track_data(mut self, on: bool) -> Self {
        self.core.set_track_data(on);
        self
    }

    pub fn with_verbose(mut self, on: bool) -> Self {
        self.core.set_verbose(on);
        self
    }

    pub fn inner(&self) -> &dyn Executor {
        self.inner.as_ref()
    }

    fn run_bar(
        &mut self,
        decision: &Decision,
        sink: &mut dyn FnMut(&Decision),
        collecting: bool,
    ) -> Result<Vec<ExecutionRecord>, NestradeError> {
        let (bar, range) = self.core.step()?;
        self.drive_inner(decision, range, sink, collecting)
            .map_err(|err| self.core.at_bar(bar, err))
    }

    fn drive_inner(
        &mut self,
        decision: &Decision,
        range: TimeRange,
        sink: &mut dyn FnMut(&Decision),
        collecting: bool,
    ) -> Result<Vec<ExecutionRecord>, NestradeError> {
        self.inner.reset(Some(range), None)?;
        self.inner_strategy
            .reset(self.inner.level_infra()?, Some(decision));

        let mut all = Vec::new();
        let mut previous: Option<Vec<ExecutionRecord>> = None;
        while !self.inner.finished() {
            let sub = self
                .inner_strategy
                .generate_trade_decision(previous.as_deref())?;
            let records = if collecting {
                self.inner.collect_data(&sub, sink)?
            } else {
                self.inner.execute(&sub)?
            };
            all.extend(records.iter().cloned());
            previous = Some(records);
        }

        let level = self.core.level();
        let verbose = self.core.verbose();
        let exchange = if self.core.generate_report() && self.core.account().is_some() {
            Some(self.core.require_exchange()?)
        } else {
            None
        };
        if let Some(account) = self.core.account_mut() {
            for deal in all.iter().filter_map(ExecutionRecord::dealt) {
                account.apply(deal)?;
            }
            if let Some(exchange) = exchange {
                let row = account.mark_bar_end(range, &exchange)?;
                if verbose {
                    tracing::info!(
                        level,
                        start = %row.start,
                        value = row.account_value,
                        cash = row.cash,
                        "bar closed"
                    );
                }
            }
        }
        Ok(all)
    }
}

impl Executor for SplitExecutor {
    fn core(&self) -> &ExecutorCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ExecutorCore {
        &mut self.core
    }

    fn reset_infra(&mut self, infra: &Infra) {
        self.core.reset_infra(infra);
        self.inner.reset_infra(infra);
        self.inner_strategy.reset_infra(infra);
    }

    fn execute(&mut self, decision: &Decision) -> Result<Vec<ExecutionRecord>, NestradeError> {
        self.run_bar(decision, &mut |_: &Decision| {}, false)
    }

    fn collect_data(
        &mut self,
        decision: &Decision,
        sink: &mut dyn FnMut(&Decision),
    ) -> Result<Vec<ExecutionRecord>, NestradeError> {
        if self.core.track_data() {
            sink(decision);
        }
        self.run_bar(decision, sink, true)
    }

    /// Inner reports plus this level's own entry.
    fn report(&self) -> ReportMap {
        let mut map = self.inner.report();
        map.extend(self.core.own_report());
        map
    }

    fn account(&self) -> Option<&Account> {
        self.core.account().or_else(|| self.inner.account())
    }
}
