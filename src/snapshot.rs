//! Immutable, copy-on-write snapshots of session state
//!
//! A [`Snapshot`] is the value-typed mapping from instance ID to
//! `{status, value, source?, lastUpdatedTs?, errorReason?}` that the
//! spec requires (§3, "Session"). Per §5 ("Shared resource policy"),
//! the engine never mutates a returned snapshot in place, and
//! instances whose `(status, value)` did not change across a tick keep
//! pointer identity so callers can diff cheaply. [`InstanceState`] is
//! therefore stored behind an `Arc`: an unchanged instance's `Arc` is
//! literally cloned, not rebuilt, from one tick's snapshot to the next.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::identity::InstanceId;
use crate::status::{Source, Status};
use crate::value::Value;

/// The state of one instance at rest within a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct InstanceState {
    /// The instance's current status.
    pub status: Status,
    /// The instance's current value, or `None` for `SKIPPED` /
    /// `UNSUPPORTED` (no default) / `PENDING_INPUT` / a freshly-invalid
    /// node with no prior value.
    pub value: Option<Value>,
    /// The provenance of the value, for INPUT instances.
    pub source: Option<Source>,
    /// When the value was last observably changed; `None` before the
    /// first write, and left unchanged across ticks that don't change
    /// `(status, value)` (spec invariant 4).
    pub last_updated_ts: Option<DateTime<Utc>>,
    /// The rejection/compute-failure reason, for `INVALID` instances.
    pub error_reason: Option<String>,
}

impl InstanceState {
    /// The not-yet-evaluated `PENDING_INPUT` state with no value.
    pub fn pending_input() -> Self {
        Self {
            status: Status::PendingInput,
            value: None,
            source: None,
            last_updated_ts: None,
            error_reason: None,
        }
    }

    /// Whether `(status, value)` differs from `other` — the comparison
    /// the evaluator uses to decide whether to update `last_updated_ts`
    /// and whether to report an instance in `changedIds` (spec
    /// invariant 4, §4.3.3 step 5).
    pub fn differs_in_observable_state(&self, other: &InstanceState) -> bool {
        self.status != other.status || self.value != other.value
    }
}

/// The immutable mapping from instance ID to [`InstanceState`],
/// iterated in the registry's topological order.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    states: IndexMap<InstanceId, Arc<InstanceState>>,
}

// `IndexMap` has no `schemars` impl and `states` is private, so the wire
// schema is described manually as a plain object keyed by instance ID —
// the same shape `Snapshot` serializes to if a caller ever `Serialize`s
// its entries, and the same delegate-to-another-type's-schema approach
// `input_event.rs` uses for `InstanceId`/`Value`.
impl JsonSchema for Snapshot {
    fn schema_name() -> String {
        "Snapshot".to_string()
    }

    fn json_schema(gen: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        gen.subschema_for::<std::collections::BTreeMap<String, InstanceState>>()
    }
}

impl Snapshot {
    /// An empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read an instance's state.
    pub fn get(&self, id: &InstanceId) -> Option<&Arc<InstanceState>> {
        self.states.get(id)
    }

    /// Insert or replace an instance's state.
    pub fn set(&mut self, id: InstanceId, state: Arc<InstanceState>) {
        self.states.insert(id, state);
    }

    /// Iterate `(id, state)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&InstanceId, &Arc<InstanceState>)> {
        self.states.iter()
    }

    /// Number of instances tracked.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Whether no instances are tracked.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Compare two snapshots and list the IDs whose `(status, value)`
    /// tuple differs, in the order they appear in `self`.
    pub fn diff(&self, previous: &Snapshot) -> Vec<InstanceId> {
        self.states
            .iter()
            .filter(|(id, state)| match previous.get(id) {
                Some(prior) => state.differs_in_observable_state(prior),
                None => true,
            })
            .map(|(id, _)| id.clone())
            .collect()
    }
}
