// src/trading/pipeline.rs
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::domain::instrument::Instrument;
use crate::domain::models::{Operation, OrderStatus, OrderType, TimeInForce};
use crate::domain::order::{next_order_id, Order, Transaction};
use crate::store::ObservableMap;
use crate::trading::estimator;
use crate::trading::validation::{InstrumentValidator, OrderValidator, ValidationFailure, Validator};

/// Outcome of a batch: every order with its failures (empty when accepted)
/// and the total number of failures across the batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderResponse {
    pub count: usize,
    pub items: Vec<(Order, Vec<ValidationFailure>)>,
}

impl OrderResponse {
    pub fn push(&mut self, order: Order, failures: Vec<ValidationFailure>) {
        self.count += failures.len();
        self.items.push((order, failures));
    }

    /// Add a failure found after validation, e.g. when submission fails
    pub fn reject(&mut self, index: usize, failure: ValidationFailure) {
        if let Some((_, failures)) = self.items.get_mut(index) {
            failures.push(failure);
            self.count += 1;
        }
    }

    /// True when no order in the batch failed
    pub fn is_valid(&self) -> bool {
        self.count == 0
    }

    pub fn accepted(&self) -> impl Iterator<Item = &Order> {
        self.items
            .iter()
            .filter(|(_, failures)| failures.is_empty())
            .map(|(order, _)| order)
    }

    pub fn rejected(&self) -> impl Iterator<Item = (&Order, &[ValidationFailure])> {
        self.items
            .iter()
            .filter(|(_, failures)| !failures.is_empty())
            .map(|(order, failures)| (order, failures.as_slice()))
    }

    pub fn failures(&self, id: &str) -> Option<&[ValidationFailure]> {
        self.items
            .iter()
            .find(|(order, _)| order.id == id)
            .map(|(_, failures)| failures.as_slice())
    }
}

/// Fills order defaults from market state, then checks each order.
///
/// Orders are handled one by one; a bad order never affects its neighbours.
pub struct OrderPipeline<'a> {
    instruments: &'a ObservableMap<String, Arc<Instrument>>,
}

impl<'a> OrderPipeline<'a> {
    pub fn new(instruments: &'a ObservableMap<String, Arc<Instrument>>) -> Self {
        Self { instruments }
    }

    /// Normalize then validate a batch
    pub fn prepare(&self, mut orders: Vec<Order>) -> OrderResponse {
        self.normalize_orders(&mut orders);
        self.validate_orders(orders)
    }

    pub fn normalize_orders(&self, orders: &mut [Order]) {
        for order in orders.iter_mut() {
            self.normalize(order);
        }
    }

    /// Fill unset fields only; anything the caller set is kept as is
    pub fn normalize(&self, order: &mut Order) {
        if order.id.trim().is_empty() {
            order.id = next_order_id();
        }

        let open_price = self.open_price(order);

        order.order_type.get_or_insert(OrderType::Market);
        order.time_in_force.get_or_insert(TimeInForce::Gtc);

        let transaction = order.transaction.get_or_insert_with(Transaction::default);
        transaction.time.get_or_insert_with(Utc::now);
        if transaction.price.is_none() {
            transaction.price = open_price;
        }
        transaction.status.get_or_insert(OrderStatus::None);
        transaction.operation.get_or_insert(Operation::In);
    }

    /// Expected fill price from the instrument's latest quote
    pub fn open_price(&self, order: &Order) -> Option<Decimal> {
        let instrument = self.instruments.get(&order.instrument()?.to_string())?;
        estimator::open_price_estimate(order.side, instrument.last_point().as_ref())
    }

    pub fn validate_orders(&self, orders: Vec<Order>) -> OrderResponse {
        let mut response = OrderResponse::default();

        for order in orders {
            let failures = self.validate(&order);

            for failure in &failures {
                log::warn!("Order {} rejected: {}", order.id, failure);
            }

            response.push(order, failures);
        }

        response
    }

    /// All failures of an order, its instrument and its child orders
    pub fn validate(&self, order: &Order) -> Vec<ValidationFailure> {
        let mut failures = OrderValidator.validate(order);

        if let Some(name) = order.instrument() {
            match self.instruments.get(&name.to_string()) {
                Some(instrument) => failures.extend(InstrumentValidator.validate(&instrument)),
                None => failures.push(ValidationFailure::new(
                    "transaction.instrument",
                    format!("unknown instrument {}", name),
                )),
            }
        }

        for (index, child) in order.orders.iter().enumerate() {
            let prefix = format!("orders[{}].", index);
            failures.extend(
                self.validate(child)
                    .into_iter()
                    .map(|failure| failure.nested(&prefix)),
            );
        }

        failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::OrderSide;
    use crate::domain::point::Point;
    use rust_decimal_macros::dec;

    fn instruments() -> ObservableMap<String, Arc<Instrument>> {
        let map = ObservableMap::new();
        let es = Instrument::new("ES").with_step(dec!(1), dec!(1));
        es.push_point(Point::quote("ES", Utc::now(), dec!(99), dec!(101)))
            .unwrap();
        map.set("ES".to_string(), Arc::new(es));
        map.set(
            "EMPTY".to_string(),
            Arc::new(Instrument::new("EMPTY").with_step(dec!(1), dec!(1))),
        );
        map
    }

    #[test]
    fn normalize_fills_defaults_from_market() {
        let map = instruments();
        let pipeline = OrderPipeline::new(&map);
        let mut buy = Order::market(OrderSide::Buy, "ES", dec!(1));
        let mut sell = Order::market(OrderSide::Sell, "ES", dec!(1));

        pipeline.normalize(&mut buy);
        pipeline.normalize(&mut sell);

        assert_eq!(buy.order_type, Some(OrderType::Market));
        assert_eq!(buy.time_in_force, Some(TimeInForce::Gtc));
        assert_eq!(buy.price(), Some(dec!(101)));
        assert_eq!(sell.price(), Some(dec!(99)));
        assert_eq!(buy.status(), Some(OrderStatus::None));
        let transaction = buy.transaction.unwrap();
        assert_eq!(transaction.operation, Some(Operation::In));
        assert!(transaction.time.is_some());
    }

    #[test]
    fn normalize_keeps_caller_fields() {
        let map = instruments();
        let pipeline = OrderPipeline::new(&map);
        let mut order = Order::market(OrderSide::Buy, "ES", dec!(1))
            .with_type(OrderType::Limit)
            .with_time_in_force(TimeInForce::Day)
            .with_price(dec!(95));

        pipeline.normalize(&mut order);

        assert_eq!(order.order_type, Some(OrderType::Limit));
        assert_eq!(order.time_in_force, Some(TimeInForce::Day));
        assert_eq!(order.price(), Some(dec!(95)));
    }

    #[test]
    fn normalize_assigns_missing_id_and_transaction() {
        let map = instruments();
        let pipeline = OrderPipeline::new(&map);
        let mut order = Order::default();

        pipeline.normalize(&mut order);

        assert!(!order.id.is_empty());
        assert!(order.transaction.is_some());
        assert_eq!(order.price(), None);
    }

    #[test]
    fn buy_without_quotes_keeps_price_unset_and_fails() {
        let map = instruments();
        let pipeline = OrderPipeline::new(&map);

        let response = pipeline.prepare(vec![Order::market(OrderSide::Buy, "EMPTY", dec!(1))]);

        let (order, failures) = &response.items[0];
        assert_eq!(order.price(), None);
        assert_eq!(response.count, 1);
        assert_eq!(failures[0].field, "transaction.price");
    }

    #[test]
    fn batch_reports_valid_and_invalid_orders_separately() {
        let map = instruments();
        let pipeline = OrderPipeline::new(&map);
        let good = Order::market(OrderSide::Buy, "ES", dec!(1));
        let unknown = Order::market(OrderSide::Buy, "NQ", dec!(1));
        let (good_id, unknown_id) = (good.id.clone(), unknown.id.clone());

        let response = pipeline.prepare(vec![good, unknown]);

        assert!(!response.is_valid());
        assert_eq!(response.accepted().count(), 1);
        assert_eq!(response.failures(&good_id), Some(&[][..]));
        let failures = response.failures(&unknown_id).unwrap();
        assert!(failures
            .iter()
            .any(|f| f.field == "transaction.instrument" && f.message.contains("NQ")));
    }

    #[test]
    fn child_orders_are_validated_recursively() {
        let map = instruments();
        let pipeline = OrderPipeline::new(&map);
        let grandchild = Order::market(OrderSide::Sell, "ES", dec!(1));
        let child = Order::market(OrderSide::Sell, "ES", dec!(1)).with_child(grandchild);
        let parent = Order::market(OrderSide::Buy, "ES", dec!(1)).with_child(child);

        let response = pipeline.prepare(vec![parent]);
        let (_, failures) = &response.items[0];

        // Children are not normalized, so their defaults are missing
        assert!(failures.iter().any(|f| f.field == "orders[0].order_type"));
        assert!(failures.iter().any(|f| f.field == "orders[0].transaction.price"));
        assert!(failures.iter().any(|f| f.field == "orders[0].orders[0].order_type"));
        assert!(!failures.iter().any(|f| f.field == "order_type"));
    }

    #[test]
    fn instrument_rules_apply_to_referenced_instrument() {
        let map = instruments();
        map.set("BAD".to_string(), Arc::new(Instrument::new("BAD")));
        let pipeline = OrderPipeline::new(&map);

        let response = pipeline.prepare(vec![
            Order::market(OrderSide::Buy, "BAD", dec!(1)).with_price(dec!(10))
        ]);

        let (_, failures) = &response.items[0];
        assert!(failures.iter().any(|f| f.field == "instrument.step_size"));
    }
}
