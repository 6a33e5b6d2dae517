// src/domain/models.rs
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }

    pub fn opposite(&self) -> OrderSide {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }

    /// Sign applied to price differences: Buy is +1, Sell is -1 and an
    /// unknown side contributes nothing.
    pub fn direction(side: Option<OrderSide>) -> Decimal {
        match side {
            Some(OrderSide::Buy) => Decimal::ONE,
            Some(OrderSide::Sell) => Decimal::NEGATIVE_ONE,
            None => Decimal::ZERO,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit,
    Stop,
    StopLimit,
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OrderType::Market => write!(f, "MARKET"),
            OrderType::Limit => write!(f, "LIMIT"),
            OrderType::Stop => write!(f, "STOP"),
            OrderType::StopLimit => write!(f, "STOP_LIMIT"),
        }
    }
}

/// How long an order stays working at the broker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    Day,
    Gtc,
    Ioc,
    Fok,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    None,
    Placed,
    Filled,
    Closed,
    Expired,
    Declined,
    Canceled,
    Completed,
    PartiallyFilled,
}

impl OrderStatus {
    /// Statuses an order can never leave
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Closed
                | OrderStatus::Expired
                | OrderStatus::Declined
                | OrderStatus::Canceled
                | OrderStatus::Completed
        )
    }

    /// Statuses of an order still waiting at the broker
    pub fn is_working(&self) -> bool {
        matches!(
            self,
            OrderStatus::None | OrderStatus::Placed | OrderStatus::PartiallyFilled
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OrderStatus::None => write!(f, "NONE"),
            OrderStatus::Placed => write!(f, "PLACED"),
            OrderStatus::Filled => write!(f, "FILLED"),
            OrderStatus::Closed => write!(f, "CLOSED"),
            OrderStatus::Expired => write!(f, "EXPIRED"),
            OrderStatus::Declined => write!(f, "DECLINED"),
            OrderStatus::Canceled => write!(f, "CANCELED"),
            OrderStatus::Completed => write!(f, "COMPLETED"),
            OrderStatus::PartiallyFilled => write!(f, "PARTIALLY_FILLED"),
        }
    }
}

/// Whether a transaction opens exposure or takes it off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    In,
    Out,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptionSide {
    Put,
    Call,
}

/// Trading environment a connector talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Paper,
    Live,
}

/// Kind of mutation carried by a change message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Create,
    Update,
    Delete,
}

/// Change message shared by the store and the connector streams.
/// `previous` and `next` are absent where the action has no such side.
#[derive(Debug, Clone, PartialEq)]
pub struct StateChange<T> {
    pub action: Action,
    pub previous: Option<T>,
    pub next: Option<T>,
}

impl<T> StateChange<T> {
    pub fn create(next: T) -> Self {
        Self {
            action: Action::Create,
            previous: None,
            next: Some(next),
        }
    }

    pub fn update(previous: T, next: T) -> Self {
        Self {
            action: Action::Update,
            previous: Some(previous),
            next: Some(next),
        }
    }

    pub fn delete(previous: T) -> Self {
        Self {
            action: Action::Delete,
            previous: Some(previous),
            next: None,
        }
    }
}
