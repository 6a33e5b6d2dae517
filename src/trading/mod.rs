// src/trading/mod.rs
pub mod estimator;
pub mod execution;
pub mod pipeline;
pub mod validation;

pub use estimator::Estimate;
pub use execution::TradeExecutor;
pub use pipeline::{OrderPipeline, OrderResponse};
pub use validation::{ValidationFailure, Validator};
