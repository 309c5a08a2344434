//! Core domain types and logic.

pub mod ohlcv;
pub mod indicator;
pub mod indicator_helpers;
pub mod bias;
pub mod signal;
pub mod strategy;
pub mod cost;
pub mod position;
pub mod execution;
pub mod backtest;
pub mod metrics;
pub mod regime;
pub mod walk_forward;
pub mod sweep;
pub mod config_validation;
pub mod error;
