// src/domain/instrument.rs
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::{PoisonError, RwLock};

use crate::domain::errors::{MarketDataError, MarketDataResult};
use crate::domain::models::OptionSide;
use crate::domain::point::{Bar, Point};

/// Expiry metadata for futures
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FutureContract {
    pub expiration_date: Option<DateTime<Utc>>,
}

/// One option contract in a chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionContract {
    pub name: String,
    pub base_name: String,
    pub strike: Option<Decimal>,
    pub leverage: Option<Decimal>,
    pub open_interest: Option<Decimal>,
    pub side: Option<OptionSide>,
    pub expiration_date: Option<DateTime<Utc>>,
    /// Latest quote for the contract, if the connector has one
    pub point: Option<Point>,
}

impl OptionContract {
    pub fn new(name: &str, base_name: &str) -> Self {
        Self {
            name: name.to_string(),
            base_name: base_name.to_string(),
            strike: None,
            leverage: Some(Decimal::ONE_HUNDRED),
            open_interest: None,
            side: None,
            expiration_date: None,
            point: None,
        }
    }
}

/// Result of an append: the stored point and the one it follows
#[derive(Debug, Clone, PartialEq)]
pub struct Appended {
    pub previous: Option<Point>,
    pub point: Point,
}

#[derive(Debug, Default)]
struct Series {
    points: Vec<Point>,
    bars: Vec<Bar>,
}

/// Tradable instrument together with its quote history.
///
/// Points only ever get appended, in non-decreasing time order. Bars group
/// the points by `time_frame`; every bar except the last is final.
#[derive(Debug)]
pub struct Instrument {
    pub name: String,
    pub step_size: Option<Decimal>,
    pub step_value: Option<Decimal>,
    pub commission: Option<Decimal>,
    pub time_frame: Option<Duration>,
    pub future: Option<FutureContract>,
    series: RwLock<Series>,
}

impl Instrument {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            step_size: None,
            step_value: None,
            commission: None,
            time_frame: None,
            future: None,
            series: RwLock::new(Series::default()),
        }
    }

    pub fn with_step(mut self, step_size: Decimal, step_value: Decimal) -> Self {
        self.step_size = Some(step_size);
        self.step_value = Some(step_value);
        self
    }

    pub fn with_commission(mut self, commission: Decimal) -> Self {
        self.commission = Some(commission);
        self
    }

    pub fn with_time_frame(mut self, time_frame: Duration) -> Self {
        self.time_frame = Some(time_frame);
        self
    }

    pub fn with_future(mut self, future: FutureContract) -> Self {
        self.future = Some(future);
        self
    }

    /// Monetary value of one price point: step value over step size.
    /// `None` when either side is missing or the step size is zero.
    pub fn point_value(&self) -> Option<Decimal> {
        self.step_value?.checked_div(self.step_size?)
    }

    pub fn last_point(&self) -> Option<Point> {
        self.read().points.last().cloned()
    }

    pub fn points(&self) -> Vec<Point> {
        self.read().points.clone()
    }

    pub fn points_len(&self) -> usize {
        self.read().points.len()
    }

    pub fn bars(&self) -> Vec<Bar> {
        self.read().bars.clone()
    }

    /// Append a point and fold it into the bar of its window.
    ///
    /// The stored copy carries this instrument's time frame and the bar as it
    /// stands after the fold; that copy is returned.
    pub fn push_point(&self, point: Point) -> MarketDataResult<Point> {
        self.push_point_with(point, |_| {}).map(|appended| appended.point)
    }

    /// Like `push_point`, but runs `enrich` on the point once it has passed
    /// the time-order check and before it is stored.
    ///
    /// `enrich` runs under the series write lock, so concurrent appends see
    /// it in the same order the points end up in. It must not touch this
    /// instrument's series.
    pub fn push_point_with<F>(&self, mut point: Point, enrich: F) -> MarketDataResult<Appended>
    where
        F: FnOnce(&mut Point),
    {
        let mut series = self.series.write().unwrap_or_else(PoisonError::into_inner);

        if let Some(last) = series.points.last() {
            if point.time < last.time {
                return Err(MarketDataError::OutOfOrder {
                    instrument: self.name.clone(),
                    time: point.time.to_rfc3339(),
                    last: last.time.to_rfc3339(),
                });
            }
        }

        point.instrument = self.name.clone();
        point.time_frame = self.time_frame;
        enrich(&mut point);

        if let Some(price) = point.trade_price() {
            let window = self.window_start(point.time);

            let same_window = self.time_frame.is_some()
                && series.bars.last().map_or(false, |bar| bar.time == Some(window));

            if same_window {
                if let Some(bar) = series.bars.last_mut() {
                    bar.add(price);
                }
            } else {
                series.bars.push(Bar::new(window, price));
            }

            point.bar = series.bars.last().cloned();
        }

        let previous = series.points.last().cloned();
        series.points.push(point.clone());

        Ok(Appended { previous, point })
    }

    /// Start of the aggregation window containing `time`
    pub fn window_start(&self, time: DateTime<Utc>) -> DateTime<Utc> {
        let span = match self.time_frame {
            Some(frame) if frame.num_milliseconds() > 0 => frame.num_milliseconds(),
            _ => return time,
        };

        let millis = time.timestamp_millis();
        DateTime::<Utc>::from_timestamp_millis(millis - millis.rem_euclid(span)).unwrap_or(time)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Series> {
        self.series.read().unwrap_or_else(PoisonError::into_inner)
    }
}
