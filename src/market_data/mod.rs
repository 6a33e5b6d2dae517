// src/market_data/mod.rs
pub mod indicators;
pub mod processor;

pub use indicators::{AverageKind, Indicator, MovingAverage};
pub use processor::MarketDataProcessor;
