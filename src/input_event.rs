//! The external input event contract (spec §6.1)

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::identity::InstanceId;
use crate::status::Source;
use crate::value::Value;

/// A single input submitted by a UI, OCR pipeline, or test harness.
///
/// `value: None` clears the target INPUT back to having no value
/// (`PENDING_INPUT`, unless the definition declares a default — in
/// which case clearing is rejected as a validation failure, since a
/// default-bearing INPUT cannot be observed with no value at rest).
/// Unknown JSON fields are rejected at deserialization.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct InputEvent {
    /// The target instance.
    pub instance_id: InstanceId,
    /// The submitted value, or `None` to clear.
    pub value: Option<Value>,
    /// The provenance of this submission.
    pub source: Source,
    /// When the submission occurred.
    pub timestamp: DateTime<Utc>,
}

impl InputEvent {
    /// Construct an input event.
    pub fn new(
        instance_id: InstanceId,
        value: Option<Value>,
        source: Source,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            instance_id,
            value,
            source,
            timestamp,
        }
    }
}

// `JsonSchema` is not derivable for `InstanceId`'s inner validated
// string without a manual impl, since the newtype's invariants aren't
// expressible in the derive; provide a transparent schema.
impl JsonSchema for InstanceId {
    fn schema_name() -> String {
        "InstanceId".to_string()
    }

    fn json_schema(gen: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        String::json_schema(gen)
    }
}

// `Value`'s variants carry `rust_decimal::Decimal`, which does not
// implement `JsonSchema`; rather than pull in a schema-bearing decimal
// wrapper type for one derive, `Value` is described to schema consumers
// as opaque, tagged JSON (consistent with its `#[serde(tag = "type",
// content = "value")]` wire shape).
impl JsonSchema for Value {
    fn schema_name() -> String {
        "Value".to_string()
    }

    fn json_schema(gen: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        JsonValue::json_schema(gen)
    }
}
