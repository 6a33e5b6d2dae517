// src/market_data/processor.rs
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::domain::account::Account;
use crate::domain::errors::{MarketDataError, MarketDataResult};
use crate::domain::instrument::{Appended, Instrument};
use crate::domain::point::Point;
use crate::market_data::indicators::Indicator;
use crate::trading::validation::{BarValidator, Validator};

/// Market data processor: appends quotes to their instrument and refreshes
/// the gain-loss estimates of positions on that instrument.
pub struct MarketDataProcessor {
    account: Arc<Account>,

    // Indicators by instrument name
    indicators: Mutex<HashMap<String, Vec<Box<dyn Indicator>>>>,
}

impl MarketDataProcessor {
    /// Create a new market data processor
    pub fn new(account: Arc<Account>) -> Self {
        Self {
            account,
            indicators: Mutex::new(HashMap::new()),
        }
    }

    pub fn account(&self) -> &Arc<Account> {
        &self.account
    }

    /// Attach an indicator to every future point of `instrument`
    pub fn add_indicator(&self, instrument: &str, indicator: Box<dyn Indicator>) {
        self.indicators
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(instrument.to_string())
            .or_default()
            .push(indicator);
    }

    /// Take in one quote and return it as stored
    pub fn process(&self, point: Point) -> MarketDataResult<Point> {
        self.ingest(point).map(|appended| appended.point)
    }

    /// Take in one quote.
    ///
    /// The point is linked to the account and appended (which also folds it
    /// into the current bar). Indicators only see points that pass the
    /// time-order check, in the order they are stored. Every open position
    /// on the instrument is then re-estimated.
    pub fn ingest(&self, mut point: Point) -> MarketDataResult<Appended> {
        let instrument = self
            .account
            .instrument(&point.instrument)
            .ok_or_else(|| MarketDataError::UnknownInstrument(point.instrument.clone()))?;

        point.account = Some(self.account.name.clone());
        let appended = instrument.push_point_with(point, |point| self.apply_indicators(point))?;
        let point = &appended.point;

        if let Some(bar) = &point.bar {
            for failure in BarValidator.validate(bar) {
                log::warn!("Incomplete bar on {}: {}", point.instrument, failure);
            }
        }

        self.update_estimates(&instrument);

        Ok(appended)
    }

    fn apply_indicators(&self, point: &mut Point) {
        let mut indicators = self.indicators.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(indicators) = indicators.get_mut(&point.instrument) {
            for indicator in indicators.iter_mut() {
                if let Some(value) = indicator.calculate(point) {
                    point.series.insert(indicator.name().to_string(), value);
                }
            }
        }
    }

    /// Re-estimate positions on `instrument` against their open price and
    /// publish them again so subscribers see the new figures.
    pub fn update_estimates(&self, instrument: &Instrument) {
        for (key, position) in self.account.positions_for(&instrument.name) {
            let estimate = position.estimate(instrument, position.open_price);

            log::debug!(
                "Position {} on {}: points {:?}, gain-loss {:?}",
                position.id(),
                instrument.name,
                estimate.points,
                estimate.currency
            );

            // A fill may have replaced the position meanwhile; leave that one alone
            self.account
                .active_positions
                .update(&key, |current| {
                    Arc::ptr_eq(current, &position).then(|| position.clone())
                });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Action, OrderSide};
    use crate::domain::order::{Order, Transaction};
    use crate::domain::position::Position;
    use crate::market_data::indicators::MovingAverage;
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;

    fn processor() -> MarketDataProcessor {
        let account = Account::new("paper", dec!(1000))
            .with_instrument(Instrument::new("ES").with_step(dec!(1), dec!(1)));
        MarketDataProcessor::new(Arc::new(account))
    }

    fn open_long(account: &Account, price: rust_decimal::Decimal) {
        let fill = Transaction {
            price: Some(price),
            volume: Some(dec!(1)),
            ..Transaction::default()
        };
        let position = Position::open(&Order::market(OrderSide::Buy, "ES", dec!(1)), fill);
        account
            .active_positions
            .set("ES".to_string(), Arc::new(position));
    }

    #[test]
    fn unknown_instrument_is_rejected() {
        let processor = processor();

        let result = processor.process(Point::new("NQ", Utc::now()));

        assert!(matches!(result, Err(MarketDataError::UnknownInstrument(name)) if name == "NQ"));
    }

    #[test]
    fn stored_point_is_linked_to_account() {
        let processor = processor();

        let point = processor
            .process(Point::quote("ES", Utc::now(), dec!(1), dec!(2)))
            .unwrap();

        assert_eq!(point.account.as_deref(), Some("paper"));
        assert_eq!(processor.account().instrument("ES").unwrap().points_len(), 1);
    }

    #[test]
    fn quotes_refresh_positions_and_notify() {
        let processor = processor();
        let account = processor.account().clone();
        open_long(&account, dec!(100));

        let updates = Arc::new(Mutex::new(Vec::new()));
        let seen = updates.clone();
        account.active_positions.item_stream().subscribe(move |change| {
            if let Some(next) = &change.next {
                seen.lock().unwrap().push((change.action, next.gain_loss()));
            }
        });

        let now = Utc::now();
        processor
            .process(Point::quote("ES", now, dec!(105), dec!(106)))
            .unwrap();
        processor
            .process(Point::quote("ES", now + Duration::seconds(1), dec!(95), dec!(96)))
            .unwrap();

        let updates = updates.lock().unwrap();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].0, Action::Update);
        assert_eq!(updates[0].1.gain_loss, Some(dec!(5)));
        assert_eq!(updates[1].1.gain_loss_points, Some(dec!(-5)));
        assert_eq!(updates[1].1.gain_loss_min, Some(dec!(-5)));
        assert_eq!(updates[1].1.gain_loss_max, Some(dec!(5)));
    }

    #[test]
    fn replaced_position_is_not_overwritten() {
        let processor = processor();
        let account = processor.account().clone();
        open_long(&account, dec!(100));
        let stale = account.active_positions.get(&"ES".to_string()).unwrap();
        open_long(&account, dec!(200));

        let key = "ES".to_string();

        let changed = account
            .active_positions
            .update(&key, |current| Arc::ptr_eq(current, &stale).then(|| stale.clone()));

        assert!(!changed);
        let current = account.active_positions.get(&key).unwrap();
        assert_eq!(current.open_price, Some(dec!(200)));
    }

    #[test]
    fn indicators_write_into_point_series() {
        let processor = processor();
        processor.add_indicator("ES", Box::new(MovingAverage::simple("sma2", 2).unwrap()));

        let now = Utc::now();
        let first = processor
            .process(Point::new("ES", now).with_last(dec!(10)))
            .unwrap();
        let second = processor
            .process(Point::new("ES", now).with_last(dec!(20)))
            .unwrap();

        assert!(first.series.is_empty());
        assert_eq!(second.series.get("sma2"), Some(&dec!(15)));
    }

    #[test]
    fn out_of_order_point_does_not_feed_indicators() {
        let processor = processor();
        processor.add_indicator("ES", Box::new(MovingAverage::simple("sma2", 2).unwrap()));

        let now = Utc::now();
        processor
            .process(Point::new("ES", now + Duration::seconds(10)).with_last(dec!(10)))
            .unwrap();
        let stale = processor.process(Point::new("ES", now).with_last(dec!(100)));
        let next = processor
            .process(Point::new("ES", now + Duration::seconds(11)).with_last(dec!(20)))
            .unwrap();

        assert!(matches!(stale, Err(MarketDataError::OutOfOrder { .. })));
        assert_eq!(next.series.get("sma2"), Some(&dec!(15)));
    }

    #[test]
    fn ingest_reports_previous_point() {
        let processor = processor();
        let now = Utc::now();

        let first = processor.ingest(Point::new("ES", now).with_last(dec!(1))).unwrap();
        let second = processor
            .ingest(Point::new("ES", now + Duration::seconds(1)).with_last(dec!(2)))
            .unwrap();

        assert_eq!(first.previous, None);
        assert_eq!(second.previous, Some(first.point));
    }
}
