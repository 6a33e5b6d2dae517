// src/trading/execution.rs
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex, PoisonError};

use crate::domain::account::Account;
use crate::domain::errors::{TradingError, TradingResult};
use crate::domain::models::{Action, Operation, OrderStatus, StateChange};
use crate::domain::order::{Order, Transaction};
use crate::domain::position::Position;
use crate::trading::estimator;

/// Applies order updates coming back from a connector to the account:
/// working orders, order history, positions and balance.
pub struct TradeExecutor {
    account: Arc<Account>,
    // Serializes fills so two updates never rebuild the same position at once
    fills: Mutex<()>,
}

impl TradeExecutor {
    pub fn new(account: Arc<Account>) -> Self {
        Self {
            account,
            fills: Mutex::new(()),
        }
    }

    pub fn account(&self) -> &Arc<Account> {
        &self.account
    }

    /// Apply one order-stream update and describe what changed
    pub fn apply(&self, order: Order) -> TradingResult<StateChange<Order>> {
        let status = order.status().unwrap_or(OrderStatus::None);
        let key = order.id.clone();

        if status.is_working() {
            let previous = self.account.active_orders.get(&key);
            self.account.active_orders.set(key, order.clone());

            return Ok(match previous {
                Some(previous) => StateChange::update(previous, order),
                None => StateChange::create(order),
            });
        }

        if status == OrderStatus::Filled {
            self.apply_fill(&order)?;
        }

        let previous = self.account.active_orders.take(&key);
        self.account.record_order(order.clone());

        log::info!("Order {} finished with status {}", order.id, status);

        Ok(StateChange {
            action: match status {
                OrderStatus::Filled => Action::Update,
                _ => Action::Delete,
            },
            previous,
            next: Some(order),
        })
    }

    /// Fold a filled order into the position on its instrument.
    ///
    /// Same-side fills grow the position at a volume-weighted open price,
    /// opposite-side fills reduce or close it and settle the realized
    /// gain-loss; any excess volume opens a position the other way.
    pub fn apply_fill(&self, order: &Order) -> TradingResult<()> {
        let missing = |field: &'static str| TradingError::MissingField {
            id: order.id.clone(),
            field,
        };

        let name = order.instrument().ok_or_else(|| missing("transaction.instrument"))?;
        let side = order.side.ok_or_else(|| missing("side"))?;
        let volume = order.volume().ok_or_else(|| missing("transaction.volume"))?;
        let price = order.price().ok_or_else(|| missing("transaction.price"))?;

        if self.account.instrument(name).is_none() {
            return Err(TradingError::UnknownInstrument(name.to_string()));
        }

        let fill = Transaction {
            id: order.transaction.as_ref().and_then(|t| t.id.clone()),
            instrument: Some(name.to_string()),
            volume: Some(volume),
            price: Some(price),
            time: order
                .transaction
                .as_ref()
                .and_then(|t| t.time)
                .or_else(|| Some(Utc::now())),
            status: Some(OrderStatus::Filled),
            operation: Some(Operation::In),
        };

        let _guard = self.fills.lock().unwrap_or_else(PoisonError::into_inner);
        let key = name.to_string();

        match self.account.active_positions.get(&key) {
            None => {
                log::info!("Opening {} position on {}: {} @ {}", side, name, volume, price);
                let position = Position::open(order, fill);
                self.account.active_positions.set(key, Arc::new(position));
            }
            Some(current) if current.side() == Some(side) => {
                let next = self.increase(&order.id, &current, fill)?;
                self.account.active_positions.set(key, Arc::new(next));
            }
            Some(current) => {
                self.decrease(&key, &current, order, fill)?;
            }
        }

        Ok(())
    }

    fn increase(&self, id: &str, current: &Position, fill: Transaction) -> TradingResult<Position> {
        let overflow = |field: &'static str| TradingError::Overflow {
            id: id.to_string(),
            field,
        };

        let held = current.volume().unwrap_or(Decimal::ZERO);
        let added = fill.volume.unwrap_or(Decimal::ZERO);
        let total = held
            .checked_add(added)
            .ok_or_else(|| overflow("transaction.volume"))?;

        let open_price = match (current.open_price, fill.price) {
            (Some(held_price), Some(fill_price)) => {
                let cost = held_price
                    .checked_mul(held)
                    .zip(fill_price.checked_mul(added))
                    .and_then(|(held_cost, added_cost)| held_cost.checked_add(added_cost))
                    .ok_or_else(|| overflow("transaction.price"))?;
                cost.checked_div(total).or(current.open_price)
            }
            (held_price, fill_price) => held_price.or(fill_price),
        };

        let mut next = current.clone();
        next.open_price = open_price;
        next.open_prices.push(fill);
        if let Some(transaction) = next.order.transaction.as_mut() {
            transaction.volume = Some(total);
            transaction.price = open_price;
        }

        log::info!(
            "Increased position on {:?} to {} @ {:?}",
            next.instrument(),
            total,
            open_price
        );
        Ok(next)
    }

    fn decrease(
        &self,
        key: &str,
        current: &Position,
        order: &Order,
        fill: Transaction,
    ) -> TradingResult<()> {
        let instrument = self
            .account
            .instrument(key)
            .ok_or_else(|| TradingError::UnknownInstrument(key.to_string()))?;

        let held = current.volume().unwrap_or(Decimal::ZERO);
        let filled = fill.volume.unwrap_or(Decimal::ZERO);
        let closed = held.min(filled);

        let points = estimator::points_estimate(current.side(), fill.price, current.open_price);
        let realized = estimator::currency_estimate(points, Some(closed), &instrument);

        if let Some(amount) = realized {
            self.account.settle(amount).ok_or_else(|| TradingError::Overflow {
                id: order.id.clone(),
                field: "balance",
            })?;
        }

        let mut record = current.clone();
        record.close_price = fill.price;
        record.close_time = fill.time;
        if let Some(transaction) = record.order.transaction.as_mut() {
            transaction.volume = Some(closed);
            transaction.status = Some(OrderStatus::Closed);
            transaction.operation = Some(Operation::Out);
        }
        let mut gain_loss = record.gain_loss();
        if let Some(points) = points {
            gain_loss.observe_points(points);
        }
        if let Some(realized) = realized {
            gain_loss.observe(realized);
        }
        record.set_gain_loss(gain_loss);
        self.account.record_position(record);

        log::info!(
            "Closed {} of position on {} @ {:?}, realized {:?}",
            closed,
            key,
            fill.price,
            realized
        );

        let remaining = held - closed;
        if remaining > Decimal::ZERO {
            let mut next = current.clone();
            if let Some(transaction) = next.order.transaction.as_mut() {
                transaction.volume = Some(remaining);
            }
            self.account
                .active_positions
                .set(key.to_string(), Arc::new(next));
        } else {
            self.account.active_positions.remove(&key.to_string());
        }

        let excess = filled - closed;
        if excess > Decimal::ZERO {
            let reversed = Transaction {
                volume: Some(excess),
                ..fill
            };
            log::info!("Reversing position on {} with {} {:?}", key, excess, order.side);
            self.account
                .active_positions
                .set(key.to_string(), Arc::new(Position::open(order, reversed)));
        }

        Ok(())
    }
}

/// Opposite order that would flatten `position` at market
pub fn closing_order(position: &Position) -> Option<Order> {
    let side = position.side()?.opposite();
    let instrument = position.instrument()?;
    let volume = position.volume()?;

    Some(Order::market(side, instrument, volume))
}
