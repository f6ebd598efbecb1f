//! Executor hierarchy: a stepping contract shared by the leaf simulator and
//! the composite splitter.
//!
//! Every executor owns a [`TradeCalendar`] for its level. Each call to
//! [`Executor::execute`] consumes exactly one bar of that calendar. A
//! composite executor spends its bar by running an inner executor over the
//! same time window at a finer frequency.

mod config;
mod simulator;
mod split;

pub use config::ExecutorConfig;
pub use simulator::SimulatorExecutor;
pub use split::SplitExecutor;

use std::collections::BTreeMap;
use std::rc::Rc;

use super::account::{Account, PositionSnapshot, ReportRow};
use super::calendar::{TimeRange, TradeCalendar};
use super::error::NestradeError;
use super::exchange::Exchange;
use super::freq::Freq;
use super::order::{Decision, ExecutionRecord};

/// Shared infrastructure handed down the executor tree.
///
/// The account is copied by every level that receives it; the exchange is shared.
#[derive(Debug, Clone, Default)]
pub struct Infra {
    pub account: Option<Account>,
    pub exchange: Option<Rc<Exchange>>,
}

impl Infra {
    pub fn new(account: Account, exchange: Rc<Exchange>) -> Self {
        Infra {
            account: Some(account),
            exchange: Some(exchange),
        }
    }
}

/// What a strategy attached to one level gets to see of that level.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelInfra {
    pub calendar: TradeCalendar,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LevelReport {
    pub rows: Vec<ReportRow>,
    pub positions: PositionSnapshot,
}

/// Reports keyed by frequency label, e.g. `1day`.
pub type ReportMap = BTreeMap<String, LevelReport>;

/// State every executor carries regardless of variant.
#[derive(Debug, Clone)]
pub struct ExecutorCore {
    freq: Freq,
    level: usize,
    generate_report: bool,
    track_data: bool,
    verbose: bool,
    calendar: Option<TradeCalendar>,
    account: Option<Account>,
    exchange: Option<Rc<Exchange>>,
}

impl ExecutorCore {
    pub fn new(freq: Freq, level: usize) -> Self {
        ExecutorCore {
            freq,
            level,
            generate_report: false,
            track_data: false,
            verbose: false,
            calendar: None,
            account: None,
            exchange: None,
        }
    }

    pub fn freq(&self) -> Freq {
        self.freq
    }

    pub fn level(&self) -> usize {
        self.level
    }

    pub fn generate_report(&self) -> bool {
        self.generate_report
    }

    pub fn track_data(&self) -> bool {
        self.track_data
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub fn set_generate_report(&mut self, on: bool) {
        self.generate_report = on;
    }

    pub fn set_track_data(&mut self, on: bool) {
        self.track_data = on;
    }

    pub fn set_verbose(&mut self, on: bool) {
        self.verbose = on;
    }

    pub fn calendar(&self) -> Option<&TradeCalendar> {
        self.calendar.as_ref()
    }

    pub fn account(&self) -> Option<&Account> {
        self.account.as_ref()
    }

    pub fn account_mut(&mut self) -> Option<&mut Account> {
        self.account.as_mut()
    }

    pub fn exchange(&self) -> Option<&Rc<Exchange>> {
        self.exchange.as_ref()
    }

    /// Takes a private copy of the injected account and a handle to the exchange.
    pub fn reset_infra(&mut self, infra: &Infra) {
        if let Some(account) = &infra.account {
            let mut own = account.clone();
            own.reset_report(&self.freq.label());
            self.account = Some(own);
        }
        if let Some(exchange) = &infra.exchange {
            self.exchange = Some(Rc::clone(exchange));
        }
    }

    pub fn reset_calendar(&mut self, range: TimeRange) -> Result<(), NestradeError> {
        match self.calendar.as_mut() {
            Some(calendar) => calendar.reset(self.freq, range),
            None => {
                self.calendar = Some(TradeCalendar::new(self.freq, range)?);
                Ok(())
            }
        }
    }

    pub fn finished(&self) -> bool {
        self.calendar.as_ref().is_none_or(TradeCalendar::finished)
    }

    pub fn level_infra(&self) -> Result<LevelInfra, NestradeError> {
        let calendar = self.calendar.clone().ok_or_else(|| {
            NestradeError::invalid_config(format!(
                "executor at level {} has no time range; reset it first",
                self.level
            ))
        })?;
        Ok(LevelInfra { calendar })
    }

    /// Advances the calendar and returns the index and bounds of the new bar.
    pub fn step(&mut self) -> Result<(usize, TimeRange), NestradeError> {
        let level = self.level;
        let calendar = self.calendar.as_mut().ok_or_else(|| {
            NestradeError::invalid_config(format!(
                "executor at level {level} has no time range; reset it first"
            ))
        })?;
        if let Err(err) = calendar.step() {
            let bar = calendar.current_index();
            return Err(self.at_bar(bar, err));
        }
        Ok((calendar.trade_index(), calendar.current_bar_bounds()))
    }

    /// Adds this level's bar context to an error raised while processing `bar`.
    pub fn at_bar(&self, bar: usize, err: NestradeError) -> NestradeError {
        NestradeError::AtBar {
            level: self.level,
            freq: self.freq.label(),
            bar,
            source: Box::new(err),
        }
    }

    pub fn require_exchange(&self) -> Result<Rc<Exchange>, NestradeError> {
        self.exchange.clone().ok_or_else(|| {
            NestradeError::invalid_config(format!(
                "no exchange injected at level {}",
                self.level
            ))
        })
    }

    /// This level's own report entry, present only when reporting is on.
    pub fn own_report(&self) -> ReportMap {
        let mut map = ReportMap::new();
        if let (true, Some(account)) = (self.generate_report, &self.account) {
            map.insert(
                self.freq.label(),
                LevelReport {
                    rows: account.report_rows().to_vec(),
                    positions: account.snapshot(),
                },
            );
        }
        map
    }
}

pub trait Executor {
    fn core(&self) -> &ExecutorCore;

    fn core_mut(&mut self) -> &mut ExecutorCore;

    fn reset_infra(&mut self, infra: &Infra) {
        self.core_mut().reset_infra(infra);
    }

    /// Rebuilds the calendar when `range` is given and takes up `infra` when given.
    fn reset(
        &mut self,
        range: Option<TimeRange>,
        infra: Option<&Infra>,
    ) -> Result<(), NestradeError> {
        if let Some(infra) = infra {
            self.reset_infra(infra);
        }
        if let Some(range) = range {
            self.core_mut().reset_calendar(range)?;
        }
        Ok(())
    }

    fn finished(&self) -> bool {
        self.core().finished()
    }

    fn level_infra(&self) -> Result<LevelInfra, NestradeError> {
        self.core().level_infra()
    }

    /// Runs one bar of this level. Returns one record per order that reached a leaf.
    fn execute(&mut self, _decision: &Decision) -> Result<Vec<ExecutionRecord>, NestradeError> {
        Err(NestradeError::NotSupported {
            operation: "execute".into(),
        })
    }

    /// Same as [`Executor::execute`], pushing every decision met on the way into `sink`.
    fn collect_data(
        &mut self,
        decision: &Decision,
        sink: &mut dyn FnMut(&Decision),
    ) -> Result<Vec<ExecutionRecord>, NestradeError> {
        if self.core().track_data() {
            sink(decision);
        }
        self.execute(decision)
    }

    fn report(&self) -> ReportMap {
        self.core().own_report()
    }

    /// The ledger closest to this level.
    fn account(&self) -> Option<&Account> {
        self.core().account()
    }
}

/// Runs one bar through `collect_data` and returns the pushed decisions with the records.
pub fn collect_decisions(
    executor: &mut dyn Executor,
    decision: &Decision,
) -> Result<(Vec<Decision>, Vec<ExecutionRecord>), NestradeError> {
    let mut seen = Vec::new();
    let records = executor.collect_data(decision, &mut |d: &Decision| seen.push(d.clone()))?;
    Ok((seen, records))
}
