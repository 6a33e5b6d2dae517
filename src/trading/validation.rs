// src/trading/validation.rs
// Structural rules for orders, instruments and bars

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::instrument::{FutureContract, Instrument};
use crate::domain::order::Order;
use crate::domain::point::Bar;

/// One broken rule: which field and what is wrong with it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationFailure {
    pub field: String,
    pub message: String,
}

impl ValidationFailure {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Same failure reported under a parent path, e.g. `orders[0].`
    pub fn nested(self, prefix: &str) -> Self {
        Self {
            field: format!("{}{}", prefix, self.field),
            message: self.message,
        }
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Rule set for one kind of target. Validators never fail themselves;
/// they only report what they found.
pub trait Validator<T: ?Sized> {
    fn validate(&self, target: &T) -> Vec<ValidationFailure>;
}

fn required<T>(failures: &mut Vec<ValidationFailure>, field: &str, value: &Option<T>) {
    if value.is_none() {
        failures.push(ValidationFailure::new(field, "is required"));
    }
}

fn positive(failures: &mut Vec<ValidationFailure>, field: &str, value: Option<Decimal>) {
    match value {
        None => failures.push(ValidationFailure::new(field, "is required")),
        Some(v) if v <= Decimal::ZERO => {
            failures.push(ValidationFailure::new(field, "must be greater than zero"))
        }
        Some(_) => {}
    }
}

/// Fields an order needs before it can be sent to a broker
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderValidator;

impl Validator<Order> for OrderValidator {
    fn validate(&self, order: &Order) -> Vec<ValidationFailure> {
        let mut failures = Vec::new();

        if order.id.trim().is_empty() {
            failures.push(ValidationFailure::new("id", "is required"));
        }

        required(&mut failures, "side", &order.side);
        required(&mut failures, "order_type", &order.order_type);
        required(&mut failures, "time_in_force", &order.time_in_force);

        match &order.transaction {
            None => failures.push(ValidationFailure::new("transaction", "is required")),
            Some(transaction) => {
                match transaction.instrument.as_deref() {
                    Some(name) if !name.trim().is_empty() => {}
                    _ => failures.push(ValidationFailure::new(
                        "transaction.instrument",
                        "is required",
                    )),
                }

                positive(&mut failures, "transaction.volume", transaction.volume);
                positive(&mut failures, "transaction.price", transaction.price);
                required(&mut failures, "transaction.time", &transaction.time);
                required(&mut failures, "transaction.status", &transaction.status);
                required(&mut failures, "transaction.operation", &transaction.operation);
            }
        }

        failures
    }
}

/// Conversion data an instrument needs for gain-loss estimates
#[derive(Debug, Clone, Copy, Default)]
pub struct InstrumentValidator;

impl Validator<Instrument> for InstrumentValidator {
    fn validate(&self, instrument: &Instrument) -> Vec<ValidationFailure> {
        let mut failures = Vec::new();

        if instrument.name.trim().is_empty() {
            failures.push(ValidationFailure::new("instrument.name", "is required"));
        }

        positive(&mut failures, "instrument.step_size", instrument.step_size);
        positive(&mut failures, "instrument.step_value", instrument.step_value);

        if let Some(future) = &instrument.future {
            failures.extend(
                FutureValidator
                    .validate(future)
                    .into_iter()
                    .map(|failure| failure.nested("instrument.")),
            );
        }

        failures
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FutureValidator;

impl Validator<FutureContract> for FutureValidator {
    fn validate(&self, future: &FutureContract) -> Vec<ValidationFailure> {
        let mut failures = Vec::new();
        required(&mut failures, "future.expiration_date", &future.expiration_date);
        failures
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BarValidator;

impl Validator<Bar> for BarValidator {
    fn validate(&self, bar: &Bar) -> Vec<ValidationFailure> {
        let mut failures = Vec::new();
        required(&mut failures, "bar.low", &bar.low);
        required(&mut failures, "bar.high", &bar.high);
        required(&mut failures, "bar.open", &bar.open);
        required(&mut failures, "bar.close", &bar.close);

        if let (Some(low), Some(high)) = (bar.low, bar.high) {
            if low > high {
                failures.push(ValidationFailure::new("bar.low", "must not exceed bar.high"));
            }
        }

        failures
    }
}
