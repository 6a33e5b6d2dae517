// src/trading/estimator.rs
// Gain-loss arithmetic. Every function is total: missing or degenerate input
// gives `None` instead of an error.

use rust_decimal::Decimal;

use crate::domain::instrument::Instrument;
use crate::domain::models::OrderSide;
use crate::domain::point::Point;

/// Points and currency estimate computed together
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Estimate {
    pub points: Option<Decimal>,
    pub currency: Option<Decimal>,
}

/// Price a position could be closed at right now: the bid for a long,
/// the ask for a short.
pub fn close_price_estimate(side: Option<OrderSide>, point: Option<&Point>) -> Option<Decimal> {
    let point = point?;

    match side? {
        OrderSide::Buy => point.bid,
        OrderSide::Sell => point.ask,
    }
}

/// Price a new order would likely open at: the ask for a buy, the bid for
/// a sell.
pub fn open_price_estimate(side: Option<OrderSide>, point: Option<&Point>) -> Option<Decimal> {
    let point = point?;

    match side? {
        OrderSide::Buy => point.ask,
        OrderSide::Sell => point.bid,
    }
}

/// `(close - price) * direction`
pub fn points_estimate(
    side: Option<OrderSide>,
    close_price: Option<Decimal>,
    price: Option<Decimal>,
) -> Option<Decimal> {
    close_price?
        .checked_sub(price?)?
        .checked_mul(OrderSide::direction(side))
}

/// `volume * (points * step_value / step_size - commission)`.
///
/// An instrument without a commission is treated as commission free; one
/// without usable step values yields no estimate.
pub fn currency_estimate(
    points: Option<Decimal>,
    volume: Option<Decimal>,
    instrument: &Instrument,
) -> Option<Decimal> {
    let point_value = instrument.point_value()?;
    let commission = instrument.commission.unwrap_or(Decimal::ZERO);

    points?
        .checked_mul(point_value)?
        .checked_sub(commission)?
        .checked_mul(volume?)
}

/// Sum the estimates that exist; `None` if none do or the sum overflows
pub fn total<I>(estimates: I) -> Option<Decimal>
where
    I: IntoIterator<Item = Option<Decimal>>,
{
    let mut estimates = estimates.into_iter().flatten();
    let first = estimates.next()?;

    estimates.try_fold(first, |sum, value| sum.checked_add(value))
}
