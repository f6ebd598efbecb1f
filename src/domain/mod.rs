//! Core engine types and logic.

pub mod account;
pub mod backtest;
pub mod calendar;
pub mod config_validation;
pub mod error;
pub mod exchange;
pub mod executor;
pub mod freq;
pub mod market;
pub mod metrics;
pub mod order;
pub mod position;
pub mod strategy;
