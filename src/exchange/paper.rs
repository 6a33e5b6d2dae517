// src/exchange/paper.rs
use async_trait::async_trait;
use std::sync::{Arc, PoisonError, RwLock};

use crate::domain::account::Account;
use crate::domain::errors::{ExchangeError, ExchangeResult, MarketDataError};
use crate::domain::instrument::{Appended, OptionContract};
use crate::domain::models::{Action, Environment, OrderStatus, OrderType, StateChange};
use crate::domain::order::Order;
use crate::domain::point::Point;
use crate::exchange::client::{ConnectionState, Connector, Lifecycle, OptionQuery, PointQuery};
use crate::exchange::session::{MemorySessionStore, SessionStore};
use crate::market_data::processor::MarketDataProcessor;
use crate::store::Listeners;
use crate::trading::execution::TradeExecutor;
use crate::trading::pipeline::OrderResponse;
use crate::trading::validation::ValidationFailure;

/// Simulated connector that trades against the quotes it is given.
///
/// Market orders fill at once at their normalized price; every other order
/// type stays working until it is updated or deleted.
pub struct PaperConnector {
    mode: Environment,
    account: Arc<Account>,
    lifecycle: Lifecycle,
    session: Arc<dyn SessionStore>,
    processor: MarketDataProcessor,
    executor: TradeExecutor,
    options: RwLock<Vec<OptionContract>>,
    data_stream: Listeners<StateChange<Point>>,
    order_stream: Listeners<StateChange<Order>>,
}

impl PaperConnector {
    pub fn new(account: Arc<Account>) -> Self {
        Self {
            mode: Environment::Paper,
            processor: MarketDataProcessor::new(account.clone()),
            executor: TradeExecutor::new(account.clone()),
            account,
            lifecycle: Lifecycle::new(),
            session: Arc::new(MemorySessionStore::new()),
            options: RwLock::new(Vec::new()),
            data_stream: Listeners::new(),
            order_stream: Listeners::new(),
        }
    }

    pub fn with_mode(mut self, mode: Environment) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_session(mut self, session: Arc<dyn SessionStore>) -> Self {
        self.session = session;
        self
    }

    /// Quote processing, e.g. to attach indicators
    pub fn processor(&self) -> &MarketDataProcessor {
        &self.processor
    }

    /// Make an option contract available to `get_options`
    pub fn add_option(&self, option: OptionContract) {
        self.options
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(option);
    }

    /// Feed one quote while subscribed.
    ///
    /// The quote is applied to the account first and then published on the
    /// data stream.
    pub fn push_point(&self, point: Point) -> ExchangeResult<Point> {
        if !self.state().is_subscribed() {
            return Err(MarketDataError::NotSubscribed(point.instrument).into());
        }

        let Appended { previous, point } = self.processor.ingest(point)?;

        self.data_stream.emit(&StateChange {
            action: Action::Create,
            previous,
            next: Some(point.clone()),
        });

        Ok(point)
    }

    /// Apply an order update to the account and announce it
    fn publish(&self, order: Order) -> ExchangeResult<Order> {
        let change = self.executor.apply(order.clone())?;
        self.order_stream.emit(&change);
        Ok(order)
    }

    fn place(&self, mut order: Order) -> ExchangeResult<Order> {
        order.transition(OrderStatus::Placed)?;

        if order.order_type == Some(OrderType::Market) {
            order.transition(OrderStatus::Filled)?;
        }

        self.publish(order)
    }

    fn replace(&self, mut order: Order) -> ExchangeResult<Order> {
        let working = self.working_order(&order.id)?;

        if let Some(transaction) = order.transaction.as_mut() {
            transaction.status = working.status();
        }

        self.place(order)
    }

    fn cancel(&self, mut order: Order) -> ExchangeResult<Order> {
        self.working_order(&order.id)?;
        order.transition(OrderStatus::Canceled)?;
        self.publish(order)
    }

    fn working_order(&self, id: &str) -> ExchangeResult<Order> {
        self.account
            .active_orders
            .get(&id.to_string())
            .ok_or_else(|| ExchangeError::Order(format!("no working order {}", id)))
    }

    /// Run `action` on every order that passed the pipeline, turning any
    /// failure into a failure entry of that order
    fn execute<F>(&self, mut response: OrderResponse, action: F) -> OrderResponse
    where
        F: Fn(Order) -> ExchangeResult<Order>,
    {
        for index in 0..response.items.len() {
            let (order, failures) = &response.items[index];
            if !failures.is_empty() {
                continue;
            }

            match action(order.clone()) {
                Ok(order) => response.items[index].0 = order,
                Err(e) => {
                    log::error!("Order {} failed: {}", response.items[index].0.id, e);
                    response.reject(index, ValidationFailure::new("id", e.to_string()));
                }
            }
        }

        response
    }

    fn ensure_connected(&self) -> ExchangeResult<()> {
        if !self.state().is_connected() {
            return Err(ExchangeError::NotConnected(self.account.name.clone()));
        }
        Ok(())
    }
}

#[async_trait]
impl Connector for PaperConnector {
    fn mode(&self) -> Environment {
        self.mode
    }

    fn account(&self) -> &Arc<Account> {
        &self.account
    }

    fn state(&self) -> ConnectionState {
        self.lifecycle.state()
    }

    fn data_stream(&self) -> &Listeners<StateChange<Point>> {
        &self.data_stream
    }

    fn order_stream(&self) -> &Listeners<StateChange<Order>> {
        &self.order_stream
    }

    async fn connect(&self) -> ExchangeResult<()> {
        let transition = match self.lifecycle.begin(ConnectionState::Connected).await? {
            Some(transition) => transition,
            None => return Ok(()),
        };

        if let Some(snapshot) = self.session.load(&self.account.name).await? {
            log::info!("Restoring session for account {}", snapshot.name);
            self.account.restore(snapshot);
        }

        transition.commit();
        Ok(())
    }

    async fn disconnect(&self) -> ExchangeResult<()> {
        let transition = match self.lifecycle.begin(ConnectionState::Disconnected).await? {
            Some(transition) => transition,
            None => return Ok(()),
        };

        self.session.save(self.account.snapshot()).await?;

        transition.commit();
        Ok(())
    }

    async fn subscribe(&self) -> ExchangeResult<()> {
        if let Some(transition) = self.lifecycle.begin(ConnectionState::Subscribed).await? {
            transition.commit();
        }
        Ok(())
    }

    async fn unsubscribe(&self) -> ExchangeResult<()> {
        if let Some(transition) = self.lifecycle.begin(ConnectionState::Unsubscribed).await? {
            transition.commit();
        }
        Ok(())
    }

    async fn get_point(&self, query: &PointQuery) -> ExchangeResult<Option<Point>> {
        Ok(self.get_points(query).await?.pop())
    }

    async fn get_points(&self, query: &PointQuery) -> ExchangeResult<Vec<Point>> {
        self.ensure_connected()?;

        let instrument = match self.account.instrument(&query.name) {
            Some(instrument) => instrument,
            None => return Ok(Vec::new()),
        };

        let mut points: Vec<Point> = instrument
            .points()
            .into_iter()
            .filter(|point| query.matches(point))
            .collect();

        if let Some(count) = query.count {
            let skip = points.len().saturating_sub(count);
            points.drain(..skip);
        }

        Ok(points)
    }

    async fn get_options(&self, query: &OptionQuery) -> ExchangeResult<Vec<OptionContract>> {
        self.ensure_connected()?;

        Ok(self
            .options
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|option| query.matches(option))
            .cloned()
            .collect())
    }

    async fn create_orders(&self, orders: Vec<Order>) -> ExchangeResult<OrderResponse> {
        self.ensure_connected()?;
        let response = self.prepare_orders(orders);
        Ok(self.execute(response, |order| self.place(order)))
    }

    async fn update_orders(&self, orders: Vec<Order>) -> ExchangeResult<OrderResponse> {
        self.ensure_connected()?;
        let response = self.prepare_orders(orders);
        Ok(self.execute(response, |order| self.replace(order)))
    }

    async fn delete_orders(&self, orders: Vec<Order>) -> ExchangeResult<OrderResponse> {
        self.ensure_connected()?;
        let response = self.prepare_orders(orders);
        Ok(self.execute(response, |order| self.cancel(order)))
    }
}
