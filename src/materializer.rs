//! Slot materializer (spec §4.2)
//!
//! Domain forms expose per-document repeating structures — a 1099-INT
//! "slot", a Form 8949 lot. A [`SlotTemplate`] converts a `(owner,
//! slotIndex)` pair into the concrete field definitions for one slot,
//! and [`rebuild_aggregator`] replaces an aggregator's dependency list
//! with the current slot set while preserving the aggregator's own ID.
//!
//! `NodeDefinition` cannot be `Clone` (its `compute`/`is_applicable`
//! fields are boxed trait objects), so a template is not a prototype
//! `NodeDefinition` to be duplicated; it is a factory that builds a
//! fresh `NodeDefinition` per `(owner, slotIndex)` call.

use rust_decimal::Decimal;

use crate::context::EvaluationContext;
use crate::definition::NodeDefinition;
use crate::identity::{InstanceId, Owner};
use crate::value::{Value, ValueType};

/// A field factory: given a concrete owner and slot index, produces one
/// field's [`NodeDefinition`] for that slot.
pub type FieldFactory = Box<dyn Fn(Owner, u32) -> NodeDefinition + Send + Sync>;

/// A repeatable form's per-slot field set, e.g. every box on one
/// 1099-INT.
pub struct SlotTemplate {
    /// The form this template belongs to, for diagnostics only.
    pub form_id: String,
    /// One factory per field the slot carries.
    field_factories: Vec<FieldFactory>,
}

impl SlotTemplate {
    /// Start an empty template for `form_id`.
    pub fn new(form_id: impl Into<String>) -> Self {
        Self {
            form_id: form_id.into(),
            field_factories: Vec::new(),
        }
    }

    /// Add one field factory to the template.
    pub fn field(mut self, factory: FieldFactory) -> Self {
        self.field_factories.push(factory);
        self
    }

    /// Expand this template into the concrete definitions for one slot
    /// instance (spec §4.2, `materializeSlot`).
    pub fn materialize_slot(&self, owner: Owner, slot_index: u32) -> Vec<NodeDefinition> {
        self.field_factories
            .iter()
            .map(|factory| factory(owner, slot_index))
            .collect()
    }
}

/// Build an INPUT field factory for a slot template: the produced
/// definition's ID is `template` with `{owner}`/`{slotIndex}`
/// substituted.
pub fn input_field(
    template: &'static str,
    value_type_for: impl Fn() -> ValueType + Send + Sync + 'static,
) -> FieldFactory {
    Box::new(move |owner, slot_index| {
        let id = InstanceId::materialize_template(template, owner, Some(slot_index))
            .unwrap_or_else(|e| panic!("slot template {template} produced a malformed id: {e}"));
        NodeDefinition::input(id, value_type_for(), owner)
    })
}

/// Replace an aggregator's dependency set with the current slot
/// instance IDs, preserving the aggregator's own ID (spec §4.2,
/// `rebuildAggregator`). The new compute sums `Value::safe_num` over
/// every slot dependency and applies `wrap` to produce the aggregator's
/// declared [`ValueType`]'s value shape.
///
/// Per the materializer's additive invariant, removing a slot removes
/// its dependency from `slot_ids` entirely; surviving slots are never
/// re-indexed.
pub fn rebuild_aggregator(
    aggregator_id: InstanceId,
    value_type: ValueType,
    owner: Owner,
    slot_ids: Vec<InstanceId>,
    wrap: impl Fn(Decimal) -> Value + Send + Sync + 'static,
) -> NodeDefinition {
    let dependencies = slot_ids.clone();
    NodeDefinition::computed(
        aggregator_id,
        value_type,
        owner,
        dependencies,
        Box::new(move |ctx: &dyn EvaluationContext| {
            let total: Decimal = slot_ids.iter().map(|id| Value::safe_num(ctx.get(id))).sum();
            Ok(wrap(total))
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{EvaluationContext, SessionContext};
    use crate::status::Status;
    use indexmap::IndexMap;
    use rust_decimal_macros::dec;

    struct FlatContext {
        values: IndexMap<InstanceId, Value>,
        session: SessionContext,
    }

    impl EvaluationContext for FlatContext {
        fn get(&self, id: &InstanceId) -> Option<&Value> {
            self.values.get(id)
        }
        fn status(&self, _id: &InstanceId) -> Option<Status> {
            None
        }
        fn session(&self) -> &SessionContext {
            &self.session
        }
    }

    #[test]
    fn materialize_slot_substitutes_owner_and_index_per_field() {
        let template = SlotTemplate::new("form1099int").field(input_field(
            "form1099int.{owner}.s{slotIndex}.box1",
            || ValueType::Currency {
                allow_negative: false,
            },
        ));
        let defs = template.materialize_slot(Owner::Primary, 0);
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].id.as_str(), "form1099int.primary.s0.box1");
    }

    #[test]
    fn rebuild_aggregator_sums_slot_values_via_safe_num() {
        let slot_a = InstanceId::new("form1099int.primary.s0.box1").unwrap();
        let slot_b = InstanceId::new("form1099int.primary.s1.box1").unwrap();
        let aggregator_id = InstanceId::new("form1099int.primary.total").unwrap();

        let def = rebuild_aggregator(
            aggregator_id,
            ValueType::Currency {
                allow_negative: false,
            },
            Owner::Primary,
            vec![slot_a.clone(), slot_b.clone()],
            Value::Currency,
        );

        let mut values = IndexMap::new();
        values.insert(slot_a, Value::Currency(dec!(500.00)));
        // slot_b intentionally absent: SKIPPED/no-value dependency reads as null.
        let ctx = FlatContext {
            values,
            session: SessionContext::new(
                "2025",
                crate::context::FilingStatus::Single,
                false,
                "s",
            ),
        };

        let compute = def.compute.as_ref().unwrap();
        let result = compute(&ctx).unwrap();
        assert_eq!(result, Value::Currency(dec!(500.00)));
    }

    #[test]
    fn rebuild_aggregator_with_no_slots_sums_to_zero() {
        let aggregator_id = InstanceId::new("form1099int.primary.total").unwrap();
        let def = rebuild_aggregator(
            aggregator_id,
            ValueType::Currency {
                allow_negative: false,
            },
            Owner::Primary,
            vec![],
            Value::Currency,
        );
        let ctx = FlatContext {
            values: IndexMap::new(),
            session: SessionContext::new(
                "2025",
                crate::context::FilingStatus::Single,
                false,
                "s",
            ),
        };
        let compute = def.compute.as_ref().unwrap();
        assert_eq!(compute(&ctx).unwrap(), Value::Currency(Decimal::ZERO));
    }
}
