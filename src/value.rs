//! Typed node values
//!
//! The source system this crate's contract was distilled from lets a
//! single "value" slot hold numbers, strings, booleans, and enum tags
//! interchangeably. [`Value`] re-expresses that as a closed tagged
//! variant over the declared [`ValueType`] enumeration: every write is
//! checked against the instance's declared type, so a COMPUTED that
//! returns the wrong shape is a registration-time-caught programmer
//! error surface, not a silent runtime coercion.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::EventError;

/// A node's current value, tagged by its declared [`ValueType`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    /// Integer cents or exact decimal currency, banker-rounded to two
    /// fraction digits.
    Currency(Decimal),
    /// Bounded whole number.
    Integer(i64),
    /// Free-form text.
    Text(String),
    /// One of a declared allow-list of tags.
    Enum(String),
    /// True/false.
    Boolean(bool),
    /// ISO calendar date.
    Date(NaiveDate),
    /// Decimal fraction, conventionally in `[0, 1]`.
    Percentage(Decimal),
    /// Unit-less decimal number.
    Number(Decimal),
}

impl Value {
    /// The [`ValueType`] discriminant of this value.
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Currency(_) => ValueType::Currency,
            Value::Integer(_) => ValueType::Integer,
            Value::Text(_) => ValueType::Text,
            Value::Enum(_) => ValueType::Enum,
            Value::Boolean(_) => ValueType::Boolean,
            Value::Date(_) => ValueType::Date,
            Value::Percentage(_) => ValueType::Percentage,
            Value::Number(_) => ValueType::Number,
        }
    }

    /// Round a currency or percentage value to two fraction digits using
    /// banker's rounding (round-half-to-even), the documented,
    /// bit-exact-deterministic rounding rule for this engine.
    ///
    /// No-op for every other variant.
    pub fn banker_round(self) -> Self {
        use rust_decimal::RoundingStrategy;
        match self {
            Value::Currency(d) => {
                Value::Currency(d.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven))
            }
            Value::Percentage(d) => Value::Percentage(
                d.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven),
            ),
            other => other,
        }
    }

    /// Numeric reading used by aggregator compute functions that need to
    /// coerce `null`/wrong-type dependency reads to zero (the "safeNum"
    /// convention documented, but not enforced, by the engine). `None`
    /// (an absent/`SKIPPED` dependency read) and non-numeric variants both
    /// coerce to `Decimal::ZERO` here; callers that need stricter
    /// behavior should branch on `Option<&Value>` directly instead.
    pub fn safe_num(value: Option<&Value>) -> Decimal {
        match value {
            Some(Value::Currency(d)) | Some(Value::Percentage(d)) | Some(Value::Number(d)) => *d,
            Some(Value::Integer(i)) => Decimal::from(*i),
            _ => Decimal::ZERO,
        }
    }
}

/// The declared value type of a node, plus the constraint payload used
/// both for INPUT validation and for enforcing a COMPUTED's declared
/// type on write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ValueType {
    /// Currency; `allow_negative` mirrors the `Currency` constructor's
    /// sign constraint.
    Currency {
        /// Whether negative amounts are permitted.
        allow_negative: bool,
    },
    /// Bounded integer.
    Integer {
        /// Inclusive lower bound, if any.
        min: Option<i64>,
        /// Inclusive upper bound, if any.
        max: Option<i64>,
    },
    /// Free-form string.
    Text,
    /// One of `allowed_values`.
    Enum {
        /// The permitted tag set.
        allowed_values: Vec<String>,
    },
    /// True/false.
    Boolean,
    /// ISO calendar date.
    Date,
    /// Decimal fraction; `allow_negative` mirrors the `Percentage`
    /// constructor's sign constraint.
    Percentage {
        /// Whether negative fractions are permitted.
        allow_negative: bool,
    },
    /// Unit-less decimal number.
    Number,
}

impl ValueType {
    /// Validate a candidate value against this declared type's
    /// constraints, returning the (possibly banker-rounded) accepted
    /// value or the reason it was rejected.
    pub fn check(&self, value: Value) -> Result<Value, EventError> {
        match (self, &value) {
            (ValueType::Currency { allow_negative }, Value::Currency(d)) => {
                if !allow_negative && d.is_sign_negative() {
                    return Err(EventError::ValidationFailed {
                        reason: "negative currency not allowed".into(),
                    });
                }
                Ok(value.banker_round())
            }
            (ValueType::Integer { min, max }, Value::Integer(i)) => {
                if min.is_some_and(|m| *i < m) || max.is_some_and(|m| *i > m) {
                    return Err(EventError::ValidationFailed {
                        reason: format!("integer {i} out of bounds [{min:?}, {max:?}]"),
                    });
                }
                Ok(value)
            }
            (ValueType::Text, Value::Text(_)) => Ok(value),
            (ValueType::Enum { allowed_values }, Value::Enum(tag)) => {
                if !allowed_values.iter().any(|v| v == tag) {
                    return Err(EventError::ValidationFailed {
                        reason: format!("{tag} is not one of {allowed_values:?}"),
                    });
                }
                Ok(value)
            }
            (ValueType::Boolean, Value::Boolean(_)) => Ok(value),
            (ValueType::Date, Value::Date(_)) => Ok(value),
            (ValueType::Percentage { allow_negative }, Value::Percentage(d)) => {
                if !allow_negative && d.is_sign_negative() {
                    return Err(EventError::ValidationFailed {
                        reason: "negative percentage not allowed".into(),
                    });
                }
                Ok(value.banker_round())
            }
            (ValueType::Number, Value::Number(_)) => Ok(value),
            (declared, got) => Err(EventError::ValidationFailed {
                reason: format!("expected {declared:?}, got {:?}", got.value_type()),
            }),
        }
    }
}
