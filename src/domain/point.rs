// src/domain/point.rs
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// OHLC aggregate for one time-frame window
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Start of the window this bar covers
    pub time: Option<DateTime<Utc>>,
    pub low: Option<Decimal>,
    pub high: Option<Decimal>,
    pub open: Option<Decimal>,
    pub close: Option<Decimal>,
}

impl Bar {
    /// Open a new bar at `price`
    pub fn new(time: DateTime<Utc>, price: Decimal) -> Self {
        Self {
            time: Some(time),
            low: Some(price),
            high: Some(price),
            open: Some(price),
            close: Some(price),
        }
    }

    /// Fold one more trade price into the bar
    pub fn add(&mut self, price: Decimal) {
        self.low = Some(self.low.map_or(price, |low| low.min(price)));
        self.high = Some(self.high.map_or(price, |high| high.max(price)));
        self.open.get_or_insert(price);
        self.close = Some(price);
    }
}

/// One quote tick for an instrument.
///
/// `instrument` and `account` are lookup keys into the owning account, not
/// owning references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub instrument: String,
    #[serde(default)]
    pub account: Option<String>,
    pub time: DateTime<Utc>,
    #[serde(default)]
    pub bid: Option<Decimal>,
    #[serde(default)]
    pub ask: Option<Decimal>,
    #[serde(default)]
    pub bid_size: Option<Decimal>,
    #[serde(default)]
    pub ask_size: Option<Decimal>,
    #[serde(default)]
    pub last: Option<Decimal>,
    #[serde(skip)]
    pub time_frame: Option<Duration>,
    #[serde(default)]
    pub bar: Option<Bar>,
    /// Derived values keyed by indicator name
    #[serde(default)]
    pub series: HashMap<String, Decimal>,
}

impl Point {
    pub fn new(instrument: &str, time: DateTime<Utc>) -> Self {
        Self {
            instrument: instrument.to_string(),
            account: None,
            time,
            bid: None,
            ask: None,
            bid_size: None,
            ask_size: None,
            last: None,
            time_frame: None,
            bar: None,
            series: HashMap::new(),
        }
    }

    /// Quote with bid and ask
    pub fn quote(instrument: &str, time: DateTime<Utc>, bid: Decimal, ask: Decimal) -> Self {
        Self {
            bid: Some(bid),
            ask: Some(ask),
            ..Self::new(instrument, time)
        }
    }

    pub fn with_last(mut self, last: Decimal) -> Self {
        self.last = Some(last);
        self
    }

    pub fn with_sizes(mut self, bid_size: Decimal, ask_size: Decimal) -> Self {
        self.bid_size = Some(bid_size);
        self.ask_size = Some(ask_size);
        self
    }

    /// Price used for bar aggregation: last trade, falling back to the
    /// mid of bid and ask, then whichever side is present. `None` when the
    /// mid is out of range.
    pub fn trade_price(&self) -> Option<Decimal> {
        if self.last.is_some() {
            return self.last;
        }

        match (self.bid, self.ask) {
            (Some(bid), Some(ask)) => bid.checked_add(ask)?.checked_div(Decimal::TWO),
            (bid, ask) => bid.or(ask),
        }
    }
}
