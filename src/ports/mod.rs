//! Port traits for the engine's external capabilities.

pub mod config_port;
pub mod market_port;
pub mod report_port;
pub mod strategy_port;
