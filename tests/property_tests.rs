//! Property tests for store and estimator invariants.
//!
//! 1. The observable map agrees with a plain map after any sequence of
//!    mutations, and announces exactly the mutations that happened
//! 2. Gain-loss extremes only widen, and always bracket the latest estimate
//! 3. Currency estimates follow `volume * (points * value - commission)`

use chrono::{Duration, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use trade_terminal::domain::{Action, Instrument, Order, OrderSide, Point, Position, Transaction};
use trade_terminal::store::ObservableMap;
use trade_terminal::trading::estimator;

#[derive(Debug, Clone)]
enum Op {
    Set(u8, i32),
    Remove(u8),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..8, any::<i32>()).prop_map(|(k, v)| Op::Set(k, v)),
        (0u8..8).prop_map(Op::Remove),
    ]
}

fn arb_price() -> impl Strategy<Value = Decimal> {
    (1_000i64..20_000).prop_map(|cents| Decimal::new(cents, 2))
}

// ── 1. Store agrees with a model ─────────────────────────────────────

proptest! {
    #[test]
    fn store_matches_model(ops in prop::collection::vec(arb_op(), 0..64)) {
        let map: ObservableMap<u8, i32> = ObservableMap::new();
        let events = Arc::new(Mutex::new(Vec::new()));
        let log = events.clone();
        map.item_stream().subscribe(move |change| {
            log.lock().unwrap().push(change.action);
        });

        let mut model = HashMap::new();
        let mut expected = Vec::new();

        for op in ops {
            match op {
                Op::Set(key, value) => {
                    let action = match model.insert(key, value) {
                        Some(_) => Action::Update,
                        None => Action::Create,
                    };
                    expected.push(action);
                    map.set(key, value);
                }
                Op::Remove(key) => {
                    let present = model.remove(&key).is_some();
                    if present {
                        expected.push(Action::Delete);
                    }
                    prop_assert_eq!(map.remove(&key), present);
                }
            }
        }

        prop_assert_eq!(map.len(), model.len());
        for (key, value) in &model {
            prop_assert_eq!(map.get(key), Some(*value));
        }
        prop_assert_eq!(&*events.lock().unwrap(), &expected);
    }
}

// ── 2. Extremes only widen ───────────────────────────────────────────

proptest! {
    #[test]
    fn extremes_are_monotonic(
        open in arb_price(),
        bids in prop::collection::vec(arb_price(), 1..32),
        sell in any::<bool>(),
    ) {
        let side = if sell { OrderSide::Sell } else { OrderSide::Buy };
        let instrument = Instrument::new("ES").with_step(Decimal::ONE, Decimal::ONE);
        let fill = Transaction {
            price: Some(open),
            volume: Some(Decimal::ONE),
            ..Transaction::default()
        };
        let position = Position::open(&Order::market(side, "ES", Decimal::ONE), fill);

        let start = Utc::now();
        let mut previous = position.gain_loss();

        for (i, bid) in bids.into_iter().enumerate() {
            let time = start + Duration::seconds(i as i64);
            instrument
                .push_point(Point::quote("ES", time, bid, bid + Decimal::ONE))
                .unwrap();

            // Read-only estimates never touch the state
            position.gain_loss_average_estimate(&instrument);
            prop_assert_eq!(position.gain_loss(), previous);

            position.estimate(&instrument, position.open_price);
            let state = position.gain_loss();

            let (current, min, max) = (
                state.gain_loss.unwrap(),
                state.gain_loss_min.unwrap(),
                state.gain_loss_max.unwrap(),
            );
            prop_assert!(min <= current && current <= max);
            if let (Some(before_min), Some(before_max)) =
                (previous.gain_loss_min, previous.gain_loss_max)
            {
                prop_assert!(min <= before_min);
                prop_assert!(max >= before_max);
            }

            previous = state;
        }
    }
}

// ── 3. Currency formula ──────────────────────────────────────────────

proptest! {
    #[test]
    fn currency_follows_formula(
        open in arb_price(),
        close in arb_price(),
        volume in 1i64..50,
        commission in 0i64..500,
        buy in any::<bool>(),
    ) {
        let side = if buy { OrderSide::Buy } else { OrderSide::Sell };
        let volume = Decimal::from(volume);
        let commission = Decimal::new(commission, 2);
        let instrument = Instrument::new("ES")
            .with_step(Decimal::new(25, 2), Decimal::new(1250, 2))
            .with_commission(commission);

        let points = estimator::points_estimate(Some(side), Some(close), Some(open));
        let currency = estimator::currency_estimate(points, Some(volume), &instrument);

        let move_points = if buy { close - open } else { open - close };
        prop_assert_eq!(points, Some(move_points));
        prop_assert_eq!(
            currency,
            Some(volume * (move_points * Decimal::from(50) - commission))
        );
    }
}
