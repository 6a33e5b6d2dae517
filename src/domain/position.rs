// src/domain/position.rs
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::domain::instrument::Instrument;
use crate::domain::models::{Operation, OrderSide, OrderStatus};
use crate::domain::order::{Order, Transaction};
use crate::trading::estimator::{self, Estimate};

/// Latest gain-loss figures of a position together with their running
/// extremes, in currency and in price points.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GainLoss {
    pub gain_loss: Option<Decimal>,
    pub gain_loss_min: Option<Decimal>,
    pub gain_loss_max: Option<Decimal>,
    pub gain_loss_points: Option<Decimal>,
    pub gain_loss_points_min: Option<Decimal>,
    pub gain_loss_points_max: Option<Decimal>,
}

impl GainLoss {
    /// Record a currency estimate
    pub fn observe(&mut self, estimate: Decimal) {
        self.gain_loss = Some(estimate);
        self.gain_loss_min = Some(self.gain_loss_min.map_or(estimate, |min| min.min(estimate)));
        self.gain_loss_max = Some(self.gain_loss_max.map_or(estimate, |max| max.max(estimate)));
    }

    /// Record a points estimate
    pub fn observe_points(&mut self, estimate: Decimal) {
        self.gain_loss_points = Some(estimate);
        self.gain_loss_points_min = Some(
            self.gain_loss_points_min
                .map_or(estimate, |min| min.min(estimate)),
        );
        self.gain_loss_points_max = Some(
            self.gain_loss_points_max
                .map_or(estimate, |max| max.max(estimate)),
        );
    }
}

/// Open (or closed) exposure on one instrument.
///
/// Everything except the gain-loss state is fixed once built; fills and
/// closes produce new `Position` values. The gain-loss state sits behind its
/// own lock so concurrent quote deliveries update the extremes one at a time.
#[derive(Debug, Serialize, Deserialize)]
#[serde(from = "PositionRecord", into = "PositionRecord")]
pub struct Position {
    pub order: Order,
    pub open_price: Option<Decimal>,
    pub close_price: Option<Decimal>,
    pub close_time: Option<DateTime<Utc>>,
    /// Fills that built the position
    pub open_prices: Vec<Transaction>,
    gain_loss: Mutex<GainLoss>,
}

impl Position {
    /// Open a position from a filled order
    pub fn open(order: &Order, fill: Transaction) -> Self {
        let mut order = order.clone();
        let transaction = order.transaction.get_or_insert_with(Transaction::default);
        transaction.price = fill.price;
        transaction.volume = fill.volume;
        transaction.time = fill.time.or(transaction.time);
        transaction.status = Some(OrderStatus::Filled);
        transaction.operation = Some(Operation::In);

        Self {
            order,
            open_price: fill.price,
            close_price: None,
            close_time: None,
            open_prices: vec![fill],
            gain_loss: Mutex::new(GainLoss::default()),
        }
    }

    pub fn id(&self) -> &str {
        &self.order.id
    }

    pub fn instrument(&self) -> Option<&str> {
        self.order.instrument()
    }

    pub fn side(&self) -> Option<OrderSide> {
        self.order.side
    }

    pub fn volume(&self) -> Option<Decimal> {
        self.order.volume()
    }

    /// Copy of the current gain-loss state
    pub fn gain_loss(&self) -> GainLoss {
        *self.state()
    }

    pub(crate) fn set_gain_loss(&self, gain_loss: GainLoss) {
        *self.state() = gain_loss;
    }

    pub fn close_price_estimate(&self, instrument: &Instrument) -> Option<Decimal> {
        estimator::close_price_estimate(self.side(), instrument.last_point().as_ref())
    }

    /// Points estimate against `price`, or against the open price when no
    /// price is given. Only the explicit-price form moves the extremes.
    pub fn gain_loss_points_estimate(
        &self,
        instrument: &Instrument,
        price: Option<Decimal>,
    ) -> Option<Decimal> {
        match price {
            Some(_) => {
                let mut state = self.state();
                let points = self.points_against(instrument, price);
                if let Some(points) = points {
                    state.observe_points(points);
                }
                points
            }
            None => self.points_against(instrument, self.open_price),
        }
    }

    /// Currency estimate against `price`, or against the open price when no
    /// price is given. The explicit-price form moves both sets of extremes.
    pub fn gain_loss_estimate(
        &self,
        instrument: &Instrument,
        price: Option<Decimal>,
    ) -> Option<Decimal> {
        self.estimate(instrument, price).currency
    }

    /// Read-only currency estimate against the open price
    pub fn gain_loss_average_estimate(&self, instrument: &Instrument) -> Option<Decimal> {
        self.gain_loss_estimate(instrument, None)
    }

    /// Read-only points estimate against the open price
    pub fn gain_loss_points_average_estimate(&self, instrument: &Instrument) -> Option<Decimal> {
        self.gain_loss_points_estimate(instrument, None)
    }

    /// Points and currency estimate in one pass
    pub fn estimate(&self, instrument: &Instrument, price: Option<Decimal>) -> Estimate {
        match price {
            Some(_) => {
                let mut state = self.state();
                let estimate = self.evaluate(instrument, price);
                if let Some(points) = estimate.points {
                    state.observe_points(points);
                }
                if let Some(currency) = estimate.currency {
                    state.observe(currency);
                }
                estimate
            }
            None => self.evaluate(instrument, self.open_price),
        }
    }

    fn evaluate(&self, instrument: &Instrument, price: Option<Decimal>) -> Estimate {
        let points = self.points_against(instrument, price);
        Estimate {
            points,
            currency: estimator::currency_estimate(points, self.volume(), instrument),
        }
    }

    fn points_against(&self, instrument: &Instrument, price: Option<Decimal>) -> Option<Decimal> {
        estimator::points_estimate(self.side(), self.close_price_estimate(instrument), price)
    }

    fn state(&self) -> MutexGuard<'_, GainLoss> {
        self.gain_loss.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Clone for Position {
    fn clone(&self) -> Self {
        Self {
            order: self.order.clone(),
            open_price: self.open_price,
            close_price: self.close_price,
            close_time: self.close_time,
            open_prices: self.open_prices.clone(),
            gain_loss: Mutex::new(self.gain_loss()),
        }
    }
}

// Serialized form of a position, with the gain-loss state taken out of its lock
#[derive(Serialize, Deserialize)]
struct PositionRecord {
    order: Order,
    open_price: Option<Decimal>,
    close_price: Option<Decimal>,
    close_time: Option<DateTime<Utc>>,
    #[serde(default)]
    open_prices: Vec<Transaction>,
    #[serde(default)]
    gain_loss: GainLoss,
}

impl From<PositionRecord> for Position {
    fn from(record: PositionRecord) -> Self {
        Self {
            order: record.order,
            open_price: record.open_price,
            close_price: record.close_price,
            close_time: record.close_time,
            open_prices: record.open_prices,
            gain_loss: Mutex::new(record.gain_loss),
        }
    }
}

impl From<Position> for PositionRecord {
    fn from(position: Position) -> Self {
        let gain_loss = position.gain_loss();
        Self {
            order: position.order,
            open_price: position.open_price,
            close_price: position.close_price,
            close_time: position.close_time,
            open_prices: position.open_prices,
            gain_loss,
        }
    }
}

impl PartialEq for Position {
    fn eq(&self, other: &Self) -> bool {
        self.order == other.order
            && self.open_price == other.open_price
            && self.close_price == other.close_price
            && self.close_time == other.close_time
            && self.open_prices == other.open_prices
            && self.gain_loss() == other.gain_loss()
    }
}
