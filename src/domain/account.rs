// src/domain/account.rs
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};

use crate::domain::instrument::Instrument;
use crate::domain::order::Order;
use crate::domain::position::Position;
use crate::store::{ObservableLog, ObservableMap};
use crate::trading::estimator;

#[derive(Debug, Clone, Copy, Default)]
struct Balances {
    balance: Option<Decimal>,
    initial_balance: Option<Decimal>,
}

/// Persistable part of an account, exchanged with a session store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub name: String,
    pub currency: String,
    pub leverage: Option<Decimal>,
    pub balance: Option<Decimal>,
    pub initial_balance: Option<Decimal>,
    #[serde(default)]
    pub orders: Vec<Order>,
    #[serde(default)]
    pub positions: Vec<Position>,
}

/// Root of the trading graph.
///
/// Owns the instruments, the working orders, the open positions and the
/// append-only history of finished orders and closed positions. Positions
/// refer to instruments by name only.
#[derive(Debug)]
pub struct Account {
    pub name: String,
    pub currency: String,
    pub leverage: Option<Decimal>,
    balances: RwLock<Balances>,
    /// Finished orders, announced as they are appended
    pub order_history: ObservableLog<Order>,
    /// Closed positions, announced as they are appended
    pub position_history: ObservableLog<Position>,
    pub active_orders: ObservableMap<String, Order>,
    pub active_positions: ObservableMap<String, Arc<Position>>,
    pub instruments: ObservableMap<String, Arc<Instrument>>,
}

impl Account {
    pub fn new(name: &str, balance: Decimal) -> Self {
        Self {
            name: name.to_string(),
            currency: "USD".to_string(),
            leverage: Some(Decimal::ONE),
            balances: RwLock::new(Balances {
                balance: Some(balance),
                initial_balance: Some(balance),
            }),
            order_history: ObservableLog::new(),
            position_history: ObservableLog::new(),
            active_orders: ObservableMap::new(),
            active_positions: ObservableMap::new(),
            instruments: ObservableMap::new(),
        }
    }

    pub fn with_currency(mut self, currency: &str) -> Self {
        self.currency = currency.to_string();
        self
    }

    pub fn with_leverage(mut self, leverage: Decimal) -> Self {
        self.leverage = Some(leverage);
        self
    }

    pub fn with_instrument(self, instrument: Instrument) -> Self {
        self.add_instrument(instrument);
        self
    }

    pub fn add_instrument(&self, instrument: Instrument) -> Arc<Instrument> {
        let instrument = Arc::new(instrument);
        self.instruments.set(instrument.name.clone(), instrument.clone());
        instrument
    }

    pub fn instrument(&self, name: &str) -> Option<Arc<Instrument>> {
        self.instruments.get(&name.to_string())
    }

    pub fn balance(&self) -> Option<Decimal> {
        self.read_balances().balance
    }

    pub fn initial_balance(&self) -> Option<Decimal> {
        self.read_balances().initial_balance
    }

    /// Start over from `balance`: both the balance and the initial balance
    /// are set to it.
    pub fn reset(&self, balance: Option<Decimal>) {
        let mut balances = self.balances.write().unwrap_or_else(PoisonError::into_inner);
        balances.balance = balance;
        balances.initial_balance = balance;
    }

    /// Apply realized gain-loss of a closed position to the balance.
    /// Returns the new balance, or `None` and leaves it untouched on overflow.
    pub(crate) fn settle(&self, amount: Decimal) -> Option<Decimal> {
        let mut balances = self.balances.write().unwrap_or_else(PoisonError::into_inner);
        let balance = balances.balance.unwrap_or(Decimal::ZERO).checked_add(amount)?;
        balances.balance = Some(balance);
        Some(balance)
    }

    /// Finished orders, oldest first
    pub fn orders(&self) -> Vec<Order> {
        self.order_history.to_vec()
    }

    /// Closed positions, oldest first
    pub fn positions(&self) -> Vec<Position> {
        self.position_history.to_vec()
    }

    pub(crate) fn record_order(&self, order: Order) {
        self.order_history.push(order);
    }

    pub(crate) fn record_position(&self, position: Position) {
        self.position_history.push(position);
    }

    /// Open positions on `instrument`
    pub fn positions_for(&self, instrument: &str) -> Vec<(String, Arc<Position>)> {
        self.active_positions
            .snapshot()
            .into_iter()
            .filter(|(_, position)| position.instrument() == Some(instrument))
            .collect()
    }

    /// Sum of read-only currency estimates of all open positions
    pub fn gain_loss_estimate(&self) -> Option<Decimal> {
        estimator::total(self.active_positions.values().iter().map(|position| {
            position
                .instrument()
                .and_then(|name| self.instrument(name))
                .and_then(|instrument| position.gain_loss_average_estimate(&instrument))
        }))
    }

    /// Balance plus the open gain-loss estimate
    pub fn equity_estimate(&self) -> Option<Decimal> {
        let balance = self.balance()?;
        balance.checked_add(self.gain_loss_estimate().unwrap_or(Decimal::ZERO))
    }

    pub fn snapshot(&self) -> AccountSnapshot {
        AccountSnapshot {
            name: self.name.clone(),
            currency: self.currency.clone(),
            leverage: self.leverage,
            balance: self.balance(),
            initial_balance: self.initial_balance(),
            orders: self.orders(),
            positions: self.positions(),
        }
    }

    /// Bring back state saved by an earlier session
    pub fn restore(&self, snapshot: AccountSnapshot) {
        {
            let mut balances = self.balances.write().unwrap_or_else(PoisonError::into_inner);
            balances.balance = snapshot.balance;
            balances.initial_balance = snapshot.initial_balance.or(snapshot.balance);
        }

        self.order_history.replace(snapshot.orders);
        self.position_history.replace(snapshot.positions);
    }

    fn read_balances(&self) -> Balances {
        *self.balances.read().unwrap_or_else(PoisonError::into_inner)
    }
}
