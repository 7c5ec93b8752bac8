//! Core domain types and simulation logic.

pub mod candle;
pub mod capital;
pub mod config_validation;
pub mod engine;
pub mod error;
pub mod indicator;
pub mod metrics;
pub mod position;
pub mod position_manager;
pub mod risk;
pub mod runner;
pub mod signal;
pub mod strategy;
