// src/market_data/indicators.rs
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use ta::indicators::{ExponentialMovingAverage, SimpleMovingAverage};
use ta::Next;

use crate::domain::errors::{MarketDataError, MarketDataResult};
use crate::domain::point::Point;

/// Derived series computed from each incoming point. The value lands in the
/// point's `series` map under `name()`.
pub trait Indicator: Send {
    fn name(&self) -> &str;

    /// Feed the next point; `None` while there is not enough history yet
    fn calculate(&mut self, point: &Point) -> Option<Decimal>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AverageKind {
    Simple,
    Exponential,
}

#[derive(Debug, Clone)]
enum Average {
    Simple(SimpleMovingAverage),
    Exponential(ExponentialMovingAverage),
}

/// Moving average of the point trade price
#[derive(Debug, Clone)]
pub struct MovingAverage {
    name: String,
    period: usize,
    seen: usize,
    average: Average,
}

impl MovingAverage {
    pub fn new(name: &str, kind: AverageKind, period: usize) -> MarketDataResult<Self> {
        let invalid = |e: ta::errors::TaError| {
            MarketDataError::InvalidIndicator(format!("{} with period {}: {:?}", name, period, e))
        };

        let average = match kind {
            AverageKind::Simple => Average::Simple(SimpleMovingAverage::new(period).map_err(invalid)?),
            AverageKind::Exponential => {
                Average::Exponential(ExponentialMovingAverage::new(period).map_err(invalid)?)
            }
        };

        Ok(Self {
            name: name.to_string(),
            period,
            seen: 0,
            average,
        })
    }

    pub fn simple(name: &str, period: usize) -> MarketDataResult<Self> {
        Self::new(name, AverageKind::Simple, period)
    }
}

impl Indicator for MovingAverage {
    fn name(&self) -> &str {
        &self.name
    }

    fn calculate(&mut self, point: &Point) -> Option<Decimal> {
        let price = point.trade_price()?.to_f64()?;

        let value = match &mut self.average {
            Average::Simple(sma) => sma.next(price),
            Average::Exponential(ema) => ema.next(price),
        };

        self.seen += 1;
        if self.seen < self.period {
            return None;
        }

        Decimal::from_f64(value).map(|v| v.round_dp(8))
    }
}
