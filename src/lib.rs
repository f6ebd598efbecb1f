//! nestrade: nested-frequency backtest execution engine.
//!
//! Hexagonal architecture: engine logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`].

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod ports;
