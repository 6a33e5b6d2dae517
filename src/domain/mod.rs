// src/domain/mod.rs
pub mod account;
pub mod errors;
pub mod instrument;
pub mod models;
pub mod order;
pub mod point;
pub mod position;

// Re-export common types for convenience
pub use account::{Account, AccountSnapshot};
pub use errors::{
    AppError, AppResult, ExchangeError, ExchangeResult, MarketDataError, MarketDataResult,
    TradingError, TradingResult,
};
pub use instrument::{Appended, FutureContract, Instrument, OptionContract};
pub use models::{
    Action, Environment, Operation, OptionSide, OrderSide, OrderStatus, OrderType, StateChange,
    TimeInForce,
};
pub use order::{Order, Transaction};
pub use point::{Bar, Point};
pub use position::{GainLoss, Position};
