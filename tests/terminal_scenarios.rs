//! End-to-end scenarios through the paper connector: quotes in, orders in,
//! positions and balances out.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

use trade_terminal::domain::{Account, Action, Instrument, Order, OrderSide, OrderStatus, Point};
use trade_terminal::exchange::{Connector, PaperConnector};

fn connector() -> PaperConnector {
    let account = Account::new("paper", dec!(1000))
        .with_instrument(Instrument::new("ES").with_step(dec!(1), dec!(1)))
        .with_instrument(Instrument::new("CL").with_step(dec!(0.01), dec!(10)));
    PaperConnector::new(Arc::new(account))
}

async fn streaming() -> PaperConnector {
    let connector = connector();
    connector.connect().await.unwrap();
    connector.subscribe().await.unwrap();
    connector
}

fn at(seconds: i64) -> DateTime<Utc> {
    Utc::now() + Duration::seconds(seconds)
}

fn quote(connector: &PaperConnector, seconds: i64, bid: Decimal, ask: Decimal) {
    connector
        .push_point(Point::quote("ES", at(seconds), bid, ask))
        .unwrap();
}

#[tokio::test]
async fn long_position_tracks_gain_loss_and_extremes() {
    let connector = streaming().await;
    quote(&connector, 0, dec!(99), dec!(100));

    let response = connector
        .create_orders(vec![Order::market(OrderSide::Buy, "ES", dec!(1))])
        .await
        .unwrap();
    assert!(response.is_valid());

    let key = "ES".to_string();
    let position = connector.account().active_positions.get(&key).unwrap();
    assert_eq!(position.open_price, Some(dec!(100)));

    quote(&connector, 1, dec!(105), dec!(106));
    let state = position.gain_loss();
    assert_eq!(state.gain_loss_points, Some(dec!(5)));
    assert_eq!(state.gain_loss, Some(dec!(5)));
    assert_eq!(state.gain_loss_max, Some(dec!(5)));
    assert_eq!(state.gain_loss_min, Some(dec!(5)));

    quote(&connector, 2, dec!(95), dec!(96));
    let state = position.gain_loss();
    assert_eq!(state.gain_loss_points, Some(dec!(-5)));
    assert_eq!(state.gain_loss_min, Some(dec!(-5)));
    assert_eq!(state.gain_loss_max, Some(dec!(5)));

    // Read-only estimates leave the extremes alone
    let instrument = connector.account().instrument("ES").unwrap();
    assert_eq!(position.gain_loss_average_estimate(&instrument), Some(dec!(-5)));
    assert_eq!(position.gain_loss(), state);
}

#[tokio::test]
async fn buy_without_quotes_needs_a_price() {
    let connector = streaming().await;

    let response = connector
        .create_orders(vec![Order::market(OrderSide::Buy, "CL", dec!(1))])
        .await
        .unwrap();

    let (order, failures) = &response.items[0];
    assert_eq!(order.price(), None);
    assert!(failures.iter().any(|f| f.field == "transaction.price"));
    assert!(connector.account().active_positions.is_empty());
    assert!(connector.account().orders().is_empty());
}

#[tokio::test]
async fn partially_invalid_batch_still_executes_valid_orders() {
    let connector = streaming().await;
    quote(&connector, 0, dec!(99), dec!(100));

    let good = Order::market(OrderSide::Buy, "ES", dec!(1));
    let unknown = Order::market(OrderSide::Buy, "ZZ", dec!(1));
    let empty = Order::market(OrderSide::Buy, "ES", dec!(0));
    let (good_id, unknown_id, empty_id) = (good.id.clone(), unknown.id.clone(), empty.id.clone());

    let response = connector
        .create_orders(vec![good, unknown, empty])
        .await
        .unwrap();

    assert!(!response.is_valid());
    assert_eq!(response.failures(&good_id), Some(&[][..]));
    assert!(!response.failures(&unknown_id).unwrap().is_empty());
    assert!(response
        .failures(&empty_id)
        .unwrap()
        .iter()
        .any(|f| f.field == "transaction.volume"));
    let failed: usize = response.rejected().map(|(_, failures)| failures.len()).sum();
    assert_eq!(response.count, failed);

    assert_eq!(connector.account().active_positions.len(), 1);
    assert_eq!(connector.account().orders().len(), 1);
}

#[tokio::test]
async fn closing_trade_settles_balance() {
    let connector = streaming().await;
    quote(&connector, 0, dec!(99), dec!(100));
    connector
        .create_orders(vec![Order::market(OrderSide::Buy, "ES", dec!(2))])
        .await
        .unwrap();

    quote(&connector, 1, dec!(103), dec!(104));
    let response = connector
        .create_orders(vec![Order::market(OrderSide::Sell, "ES", dec!(2))])
        .await
        .unwrap();
    assert!(response.is_valid());

    let account = connector.account();
    assert!(account.active_positions.is_empty());
    assert_eq!(account.balance(), Some(dec!(1006)));
    assert_eq!(account.initial_balance(), Some(dec!(1000)));

    let closed = account.positions();
    assert_eq!(closed.len(), 1);
    assert_eq!(closed[0].close_price, Some(dec!(103)));
    assert_eq!(closed[0].order.status(), Some(OrderStatus::Closed));
}

#[tokio::test]
async fn order_stream_reaches_async_consumers() {
    let connector = streaming().await;
    let (_, mut updates) = connector.order_stream().subscribe_channel();
    quote(&connector, 0, dec!(99), dec!(100));

    connector
        .create_orders(vec![Order::market(OrderSide::Sell, "ES", dec!(1))])
        .await
        .unwrap();

    let change = updates.recv().await.unwrap();
    assert_eq!(change.action, Action::Update);
    let order = change.next.unwrap();
    assert_eq!(order.status(), Some(OrderStatus::Filled));
    assert_eq!(order.price(), Some(dec!(99)));
}

#[tokio::test]
async fn stopped_connector_keeps_state_but_refuses_quotes() {
    let connector = streaming().await;
    quote(&connector, 0, dec!(99), dec!(100));

    connector.unsubscribe().await.unwrap();
    assert!(connector
        .push_point(Point::quote("ES", at(1), dec!(1), dec!(2)))
        .is_err());

    connector.subscribe().await.unwrap();
    quote(&connector, 2, dec!(100), dec!(101));

    let instrument = connector.account().instrument("ES").unwrap();
    assert_eq!(instrument.points_len(), 2);
}
