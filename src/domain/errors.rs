// src/domain/errors.rs
use thiserror::Error;

use crate::domain::models::OrderStatus;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Exchange error: {0}")]
    Exchange(#[from] ExchangeError),

    #[error("Market data error: {0}")]
    MarketData(#[from] MarketDataError),

    #[error("Trading error: {0}")]
    Trading(#[from] TradingError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<String> for AppError {
    fn from(s: String) -> Self {
        AppError::Config(s)
    }
}

/// Faults raised by the connector boundary. These are the only errors that
/// cross the boundary; validation problems travel as failure lists instead.
#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Connector is not connected: {0}")]
    NotConnected(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Order error: {0}")]
    Order(String),

    #[error("Market data error: {0}")]
    MarketData(#[from] MarketDataError),

    #[error("Trading error: {0}")]
    Trading(#[from] TradingError),
}

#[derive(Error, Debug)]
pub enum MarketDataError {
    #[error("Unknown instrument: {0}")]
    UnknownInstrument(String),

    #[error("Point for {instrument} at {time} is older than the last point at {last}")]
    OutOfOrder {
        instrument: String,
        time: String,
        last: String,
    },

    #[error("Stream is not subscribed: {0}")]
    NotSubscribed(String),

    #[error("Invalid indicator: {0}")]
    InvalidIndicator(String),
}

#[derive(Error, Debug)]
pub enum TradingError {
    #[error("Unknown instrument: {0}")]
    UnknownInstrument(String),

    #[error("Unknown order: {0}")]
    UnknownOrder(String),

    #[error("Order {id} cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        id: String,
        from: Option<OrderStatus>,
        to: OrderStatus,
    },

    #[error("Missing field {field} on order {id}")]
    MissingField { id: String, field: &'static str },

    #[error("Arithmetic overflow in {field} on order {id}")]
    Overflow { id: String, field: &'static str },
}

// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;
pub type ExchangeResult<T> = Result<T, ExchangeError>;
pub type MarketDataResult<T> = Result<T, MarketDataError>;
pub type TradingResult<T> = Result<T, TradingError>;
