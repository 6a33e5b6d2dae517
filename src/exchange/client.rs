// src/exchange/client.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::{Mutex, MutexGuard};

use crate::domain::account::Account;
use crate::domain::errors::{ExchangeError, ExchangeResult};
use crate::domain::instrument::OptionContract;
use crate::domain::models::{Environment, StateChange};
use crate::domain::order::Order;
use crate::domain::point::Point;
use crate::store::Listeners;
use crate::trading::pipeline::{OrderPipeline, OrderResponse};

/// Lifecycle state of a connector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected,
    Subscribed,
    Unsubscribed,
}

impl ConnectionState {
    /// Connected in any form, streaming or not
    pub fn is_connected(&self) -> bool {
        !matches!(self, ConnectionState::Disconnected)
    }

    pub fn is_subscribed(&self) -> bool {
        matches!(self, ConnectionState::Subscribed)
    }

    /// Whether moving to `target` needs any work. `Ok(false)` means the
    /// connector is already there; streaming states need a connection.
    pub fn needs_transition(&self, target: ConnectionState) -> ExchangeResult<bool> {
        use ConnectionState::*;

        match (*self, target) {
            (Disconnected, Subscribed | Unsubscribed) => Err(ExchangeError::NotConnected(
                format!("cannot move to {} while disconnected", target),
            )),
            (Disconnected, Connected) => Ok(true),
            (_, Connected) => Ok(false),
            (Connected | Unsubscribed, Subscribed) => Ok(true),
            (Subscribed, Unsubscribed) => Ok(true),
            (_, Subscribed | Unsubscribed) => Ok(false),
            (Disconnected, Disconnected) => Ok(false),
            (_, Disconnected) => Ok(true),
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connected => "connected",
            ConnectionState::Subscribed => "subscribed",
            ConnectionState::Unsubscribed => "unsubscribed",
        };
        f.write_str(name)
    }
}

/// Connector state guarded for async transitions.
///
/// Transitions run one at a time. A transition only takes effect once it is
/// committed, so an operation that fails or is cancelled midway leaves the
/// previous state in place.
#[derive(Debug, Default)]
pub struct Lifecycle {
    state: RwLock<ConnectionState>,
    transition: Mutex<()>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start moving to `target`. Returns `None` when there is nothing to do.
    pub async fn begin(&self, target: ConnectionState) -> ExchangeResult<Option<Transition<'_>>> {
        let guard = self.transition.lock().await;
        let from = self.state();

        if !from.needs_transition(target)? {
            return Ok(None);
        }

        Ok(Some(Transition {
            lifecycle: self,
            _guard: guard,
            from,
            to: target,
        }))
    }
}

/// A pending state change, see [`Lifecycle::begin`]
pub struct Transition<'a> {
    lifecycle: &'a Lifecycle,
    _guard: MutexGuard<'a, ()>,
    pub from: ConnectionState,
    pub to: ConnectionState,
}

impl Transition<'_> {
    pub fn commit(self) {
        *self
            .lifecycle
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner) = self.to;
        log::info!("Connector moved from {} to {}", self.from, self.to);
    }
}

/// Selects quotes for one instrument
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointQuery {
    pub name: String,
    pub min_date: Option<DateTime<Utc>>,
    pub max_date: Option<DateTime<Utc>>,
    /// Most recent `count` points only
    pub count: Option<usize>,
}

impl PointQuery {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn matches(&self, point: &Point) -> bool {
        point.instrument == self.name
            && self.min_date.map_or(true, |min| point.time >= min)
            && self.max_date.map_or(true, |max| point.time <= max)
    }
}

/// Selects option contracts written on one base instrument
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionQuery {
    pub name: String,
    pub min_date: Option<DateTime<Utc>>,
    pub max_date: Option<DateTime<Utc>>,
}

impl OptionQuery {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn matches(&self, option: &OptionContract) -> bool {
        let expires = option.expiration_date;

        option.base_name == self.name
            && self
                .min_date
                .map_or(true, |min| expires.map_or(false, |date| date >= min))
            && self
                .max_date
                .map_or(true, |max| expires.map_or(false, |date| date <= max))
    }
}

/// Boundary to a market-data and execution backend.
///
/// Queries default to empty results and order mutations default to running
/// the batch through the order pipeline without submitting anything, so a
/// backend only implements what it supports. Lifecycle faults are the only
/// errors; rejected orders come back inside the [`OrderResponse`].
#[async_trait]
pub trait Connector: Send + Sync {
    /// Paper or live trading
    fn mode(&self) -> Environment;

    /// Account this connector trades for
    fn account(&self) -> &Arc<Account>;

    fn state(&self) -> ConnectionState;

    /// Quotes, published after they were applied to the account
    fn data_stream(&self) -> &Listeners<StateChange<Point>>;

    /// Order updates, published after they were applied to the account
    fn order_stream(&self) -> &Listeners<StateChange<Order>>;

    /// Open the connection and restore saved session state
    async fn connect(&self) -> ExchangeResult<()>;

    /// Save session state and release the connection
    async fn disconnect(&self) -> ExchangeResult<()>;

    /// Start streaming quotes and order updates
    async fn subscribe(&self) -> ExchangeResult<()>;

    /// Stop streaming, keeping the connection
    async fn unsubscribe(&self) -> ExchangeResult<()>;

    async fn get_point(&self, _query: &PointQuery) -> ExchangeResult<Option<Point>> {
        Ok(None)
    }

    async fn get_points(&self, _query: &PointQuery) -> ExchangeResult<Vec<Point>> {
        Ok(Vec::new())
    }

    async fn get_options(&self, _query: &OptionQuery) -> ExchangeResult<Vec<OptionContract>> {
        Ok(Vec::new())
    }

    async fn create_orders(&self, orders: Vec<Order>) -> ExchangeResult<OrderResponse> {
        Ok(self.prepare_orders(orders))
    }

    async fn update_orders(&self, orders: Vec<Order>) -> ExchangeResult<OrderResponse> {
        Ok(self.prepare_orders(orders))
    }

    async fn delete_orders(&self, orders: Vec<Order>) -> ExchangeResult<OrderResponse> {
        Ok(self.prepare_orders(orders))
    }

    /// Normalize and validate a batch against this connector's instruments
    fn prepare_orders(&self, orders: Vec<Order>) -> OrderResponse {
        OrderPipeline::new(&self.account().instruments).prepare(orders)
    }
}
