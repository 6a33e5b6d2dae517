// src/domain/order.rs
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::domain::errors::{TradingError, TradingResult};
use crate::domain::models::{Operation, OrderSide, OrderStatus, OrderType, TimeInForce};

static ORDER_SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// Generate a process-unique order id
pub fn next_order_id() -> String {
    format!(
        "{}-{}",
        Utc::now().timestamp_millis(),
        ORDER_SEQUENCE.fetch_add(1, Ordering::Relaxed)
    )
}

/// Execution details shared by orders, fills and positions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Broker-side identifier, once known
    pub id: Option<String>,
    /// Instrument name, resolved through the account's instruments
    pub instrument: Option<String>,
    pub volume: Option<Decimal>,
    pub price: Option<Decimal>,
    pub time: Option<DateTime<Utc>>,
    pub status: Option<OrderStatus>,
    pub operation: Option<Operation>,
}

impl Transaction {
    pub fn new(instrument: &str, volume: Decimal) -> Self {
        Self {
            instrument: Some(instrument.to_string()),
            volume: Some(volume),
            ..Self::default()
        }
    }
}

/// Order request, possibly carrying bracket children in `orders`.
///
/// Every field starts unset; the order pipeline fills the defaults in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub side: Option<OrderSide>,
    pub order_type: Option<OrderType>,
    pub time_in_force: Option<TimeInForce>,
    pub transaction: Option<Transaction>,
    #[serde(default)]
    pub orders: Vec<Order>,
}

impl Order {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Self::default()
        }
    }

    /// Market-style request for `volume` of `instrument`
    pub fn market(side: OrderSide, instrument: &str, volume: Decimal) -> Self {
        Self {
            id: next_order_id(),
            side: Some(side),
            transaction: Some(Transaction::new(instrument, volume)),
            ..Self::default()
        }
    }

    pub fn with_type(mut self, order_type: OrderType) -> Self {
        self.order_type = Some(order_type);
        self
    }

    pub fn with_time_in_force(mut self, time_in_force: TimeInForce) -> Self {
        self.time_in_force = Some(time_in_force);
        self
    }

    pub fn with_price(mut self, price: Decimal) -> Self {
        self.transaction.get_or_insert_with(Transaction::default).price = Some(price);
        self
    }

    pub fn with_child(mut self, child: Order) -> Self {
        self.orders.push(child);
        self
    }

    pub fn instrument(&self) -> Option<&str> {
        self.transaction.as_ref()?.instrument.as_deref()
    }

    pub fn volume(&self) -> Option<Decimal> {
        self.transaction.as_ref()?.volume
    }

    pub fn price(&self) -> Option<Decimal> {
        self.transaction.as_ref()?.price
    }

    pub fn status(&self) -> Option<OrderStatus> {
        self.transaction.as_ref()?.status
    }

    /// Move the order to `status`. This is the only mutation an order accepts
    /// once created; terminal statuses cannot be left.
    pub fn transition(&mut self, status: OrderStatus) -> TradingResult<()> {
        let current = self.status();

        if let Some(from) = current {
            if from.is_terminal() && from != status {
                return Err(TradingError::InvalidTransition {
                    id: self.id.clone(),
                    from: current,
                    to: status,
                });
            }
        }

        self.transaction.get_or_insert_with(Transaction::default).status = Some(status);
        Ok(())
    }
}
