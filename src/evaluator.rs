//! The reactive evaluator (spec §4.3): single-event processing —
//! pre-checks, dirty-set propagation, topological walk, status-invariant
//! maintenance — plus whole-registry initialization.
//!
//! Timestamps recorded in [`crate::snapshot::InstanceState::last_updated_ts`]
//! are derived from the triggering [`InputEvent`]'s own `timestamp`
//! field, never from the wall clock: the determinism invariant (spec
//! §8, "For any registry R and any ordered sequence of events E ...
//! yields byte-identical snapshots across runs") extends to the
//! snapshot's timestamps, and only the caller-supplied event clock can
//! satisfy that across repeated runs. `initializeSession` has no
//! triggering event, so every instance's initial `last_updated_ts` is
//! `None`.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::context::{EvaluationContext, SessionContext};
use crate::definition::NodeDefinition;
use crate::errors::{EventError, EventOutcome};
use crate::identity::InstanceId;
use crate::input_event::InputEvent;
use crate::registry::Registry;
use crate::snapshot::{InstanceState, Snapshot};
use crate::status::Status;

/// The result of one `process` or `initialize` call (spec §6.2).
pub struct EvaluationResult {
    /// The new, immutable snapshot.
    pub current_state: Snapshot,
    /// Instance IDs whose `(status, value)` tuple changed vs. the input
    /// snapshot, in ascending topological order.
    pub changed_ids: Vec<InstanceId>,
    /// The validation outcome of the triggering event.
    pub event_outcome: EventOutcome,
}

/// A read view over a partially-built tick's working snapshot, passed
/// to every `compute`/`isApplicable` call during a walk.
struct WorkingContext<'a> {
    working: &'a Snapshot,
    session: &'a SessionContext,
}

impl<'a> EvaluationContext for WorkingContext<'a> {
    fn get(&self, id: &InstanceId) -> Option<&crate::value::Value> {
        self.working.get(id).and_then(|state| {
            if state.status.reads_as_null() {
                None
            } else {
                state.value.as_ref()
            }
        })
    }

    fn status(&self, id: &InstanceId) -> Option<Status> {
        self.working.get(id).map(|state| state.status)
    }

    fn session(&self) -> &SessionContext {
        self.session
    }
}

/// Build a session's initial snapshot (spec §4.6, `initializeSession`):
/// every INPUT takes its declared default (or `PENDING_INPUT`), then
/// every COMPUTED is evaluated once, in ascending topological order.
pub fn initialize(registry: &Registry, session: &SessionContext) -> Snapshot {
    tracing::debug!(tax_year = %session.tax_year, nodes = registry.len(), "initializing session");
    let mut working = Snapshot::new();
    for def in registry.iter_in_order() {
        let state = initial_state(def, &WorkingContext {
            working: &working,
            session,
        });
        working.set(def.id.clone(), Arc::new(state));
    }
    working
}

/// Process one input event against `previous` (spec §4.3, §4.6
/// `process`). Returns the new snapshot, the changed IDs (ascending
/// topological order), and the event's outcome.
pub fn process(
    registry: &Registry,
    session: &SessionContext,
    previous: &Snapshot,
    event: &InputEvent,
) -> EvaluationResult {
    let Some(def) = registry.get(&event.instance_id) else {
        tracing::debug!(instance = %event.instance_id, "ignoring event for unknown instance");
        return EvaluationResult {
            current_state: previous.clone(),
            changed_ids: Vec::new(),
            event_outcome: EventOutcome::IgnoredUnknown {
                id: event.instance_id.clone(),
            },
        };
    };

    if def.kind != crate::definition::NodeKind::Input {
        tracing::debug!(instance = %event.instance_id, "rejecting event targeting a non-input node");
        return EvaluationResult {
            current_state: previous.clone(),
            changed_ids: Vec::new(),
            event_outcome: EventOutcome::Rejected(EventError::NotAnInput {
                id: event.instance_id.clone(),
            }),
        };
    }

    match validate_input(def, event) {
        Err(reason) => {
            tracing::debug!(instance = %event.instance_id, %reason, "input validation failed");
            let mut next = previous.clone();
            let prior_value = previous
                .get(&event.instance_id)
                .and_then(|s| s.value.clone());
            let invalid_state = Arc::new(InstanceState {
                status: Status::Invalid,
                value: prior_value,
                source: previous.get(&event.instance_id).and_then(|s| s.source),
                last_updated_ts: previous
                    .get(&event.instance_id)
                    .and_then(|s| s.last_updated_ts),
                error_reason: Some(reason.to_string()),
            });
            next.set(event.instance_id.clone(), invalid_state);
            let changed = next.diff(previous);
            EvaluationResult {
                current_state: next,
                changed_ids: changed,
                event_outcome: EventOutcome::Rejected(reason),
            }
        }
        Ok(accepted) => {
            let new_input_state = match accepted {
                Some(value) => InstanceState {
                    status: Status::Clean,
                    value: Some(value),
                    source: Some(event.source),
                    last_updated_ts: None,
                    error_reason: None,
                },
                None => InstanceState::pending_input(),
            };
            let new_input_state = settle_timestamp(
                new_input_state,
                previous.get(&event.instance_id).map(Arc::as_ref),
                event.timestamp,
            );

            let mut working = previous.clone();
            working.set(event.instance_id.clone(), Arc::new(new_input_state));

            let dirty = registry.transitive_dependents(&event.instance_id);
            tracing::debug!(
                instance = %event.instance_id,
                dirtied = dirty.len(),
                "input accepted, recomputing dependents"
            );

            for id in &dirty {
                let Some(def) = registry.get(id) else { continue };
                let ctx = WorkingContext {
                    working: &working,
                    session,
                };
                let candidate = evaluate_computed(def, &ctx);
                let settled = settle_timestamp(
                    candidate,
                    previous.get(id).map(Arc::as_ref),
                    event.timestamp,
                );
                working.set(id.clone(), Arc::new(settled));
            }

            let changed = working.diff(previous);
            EvaluationResult {
                current_state: working,
                changed_ids: changed,
                event_outcome: EventOutcome::Accepted,
            }
        }
    }
}

/// Rebuild a session after a registry change (spec §4.6,
/// `reinitializeSession`): preserve every surviving INPUT's value, then
/// re-evaluate the new registry from scratch with those inputs applied
/// before any COMPUTED runs.
pub fn reinitialize(
    new_registry: &Registry,
    session: &SessionContext,
    prior_snapshot: &Snapshot,
) -> Snapshot {
    tracing::info!(nodes = new_registry.len(), "reinitializing session against new registry");
    let mut preserved: Vec<(InstanceId, Arc<InstanceState>)> = Vec::new();
    for def in new_registry.iter_in_order() {
        if def.kind != crate::definition::NodeKind::Input {
            continue;
        }
        if let Some(state) = prior_snapshot.get(&def.id) {
            if state.status != Status::PendingInput {
                preserved.push((def.id.clone(), state.clone()));
            }
        }
    }

    let mut working = Snapshot::new();
    for def in new_registry.iter_in_order() {
        let state = if def.kind == crate::definition::NodeKind::Input {
            match preserved.iter().find(|(id, _)| id == &def.id) {
                Some((_, state)) => InstanceState {
                    status: state.status,
                    value: state.value.clone(),
                    source: state.source,
                    last_updated_ts: None,
                    error_reason: state.error_reason.clone(),
                },
                None => initial_state(
                    def,
                    &WorkingContext {
                        working: &working,
                        session,
                    },
                ),
            }
        } else {
            let ctx = WorkingContext {
                working: &working,
                session,
            };
            evaluate_computed(def, &ctx)
        };
        working.set(def.id.clone(), Arc::new(state));
    }
    working
}

/// Validate a submitted value against an INPUT's declared type and
/// custom validation (spec §4.3.1). `None` clears the input to
/// `PENDING_INPUT`, unless the definition declares a default (a
/// default-bearing INPUT cannot be observed with no value at rest).
fn validate_input(
    def: &NodeDefinition,
    event: &InputEvent,
) -> Result<Option<crate::value::Value>, EventError> {
    match &event.value {
        None => {
            if def.default_value.is_some() {
                Err(EventError::ValidationFailed {
                    reason: "cannot clear an input with a declared default".into(),
                })
            } else {
                Ok(None)
            }
        }
        Some(value) => {
            let checked = def.value_type.check(value.clone())?;
            if let Some(validation) = &def.validation {
                if let Some(custom) = &validation.custom {
                    custom(&checked).map_err(|reason| EventError::ValidationFailed { reason })?;
                }
            }
            Ok(Some(checked))
        }
    }
}

/// Compare a freshly-computed candidate state to its predecessor; if
/// `(status, value)` is unchanged, return the predecessor's `Arc`
/// verbatim (pointer-identity preservation, spec §5), otherwise stamp
/// the candidate with the triggering event's timestamp.
fn settle_timestamp(
    candidate: InstanceState,
    previous: Option<&InstanceState>,
    event_ts: DateTime<Utc>,
) -> InstanceState {
    if let Some(prior) = previous {
        if !candidate.differs_in_observable_state(prior) {
            return prior.clone();
        }
    }
    InstanceState {
        last_updated_ts: Some(event_ts),
        ..candidate
    }
}

/// The session-initialization state for one definition (spec §4.6).
fn initial_state(def: &NodeDefinition, ctx: &WorkingContext) -> InstanceState {
    match def.kind {
        crate::definition::NodeKind::Input => match &def.default_value {
            Some(default) => InstanceState {
                status: Status::Clean,
                value: Some(default.clone()),
                source: Some(crate::status::Source::Default),
                last_updated_ts: None,
                error_reason: None,
            },
            None => InstanceState::pending_input(),
        },
        crate::definition::NodeKind::Computed => evaluate_computed(def, ctx),
    }
}

/// Run the five-step evaluation pipeline for one COMPUTED node (spec
/// §4.3.3, steps 1-4; step 5's stability check is applied by the
/// caller via [`settle_timestamp`]).
fn evaluate_computed(def: &NodeDefinition, ctx: &WorkingContext) -> InstanceState {
    // Step 1: year gate.
    if let Some(years) = &def.applicable_tax_years {
        if !years.contains(&ctx.session.tax_year) {
            return InstanceState {
                status: Status::Skipped,
                value: None,
                source: None,
                last_updated_ts: None,
                error_reason: None,
            };
        }
    }

    // Step 2: unsupported gate.
    if def.unsupported {
        return InstanceState {
            status: Status::Unsupported,
            value: def.default_value.clone(),
            source: None,
            last_updated_ts: None,
            error_reason: None,
        };
    }

    // Step 3: applicability gate.
    if let Some(is_applicable) = &def.is_applicable {
        if !is_applicable(ctx) {
            return InstanceState {
                status: Status::Skipped,
                value: None,
                source: None,
                last_updated_ts: None,
                error_reason: None,
            };
        }
    }

    // Step 4: compute.
    let compute = def
        .compute
        .as_ref()
        .expect("registry build rejects COMPUTED definitions with no compute unless unsupported");
    match compute(ctx) {
        Ok(raw) => match def.value_type.check(raw) {
            Ok(validated) => InstanceState {
                status: Status::Clean,
                value: Some(validated),
                source: None,
                last_updated_ts: None,
                error_reason: None,
            },
            Err(err) => InstanceState {
                status: Status::Invalid,
                value: ctx.working.get(&def.id).and_then(|s| s.value.clone()),
                source: None,
                last_updated_ts: None,
                error_reason: Some(err.to_string()),
            },
        },
        Err(reason) => InstanceState {
            status: Status::Invalid,
            value: ctx.working.get(&def.id).and_then(|s| s.value.clone()),
            source: None,
            last_updated_ts: None,
            error_reason: Some(reason),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::FilingStatus;
    use crate::identity::Owner;
    use crate::registry::RegistryBuilder;
    use crate::status::Source;
    use crate::value::{Value, ValueType};
    use chrono::Utc;

    fn id(s: &str) -> InstanceId {
        InstanceId::new(s).unwrap()
    }

    fn session() -> SessionContext {
        SessionContext::new("2025", FilingStatus::Single, false, "sess-1")
    }

    fn currency() -> ValueType {
        ValueType::Currency {
            allow_negative: false,
        }
    }

    fn simple_chain_registry() -> Registry {
        let mut builder = RegistryBuilder::new();
        builder.register(vec![
            NodeDefinition::input(id("form.primary.a"), currency(), Owner::Primary),
            NodeDefinition::computed(
                id("form.primary.b"),
                currency(),
                Owner::Primary,
                vec![id("form.primary.a")],
                Box::new(|ctx| {
                    let a = Value::safe_num(ctx.get(&id("form.primary.a")));
                    Ok(Value::Currency(a * rust_decimal::Decimal::TWO))
                }),
            ),
        ]);
        builder.build().unwrap()
    }

    #[test]
    fn initialize_sets_pending_input_and_propagates_to_computed() {
        let registry = simple_chain_registry();
        let snap = initialize(&registry, &session());
        assert_eq!(
            snap.get(&id("form.primary.a")).unwrap().status,
            Status::PendingInput
        );
        // safe_num(None) == 0, so b computes to 0.
        assert_eq!(
            snap.get(&id("form.primary.b")).unwrap().value,
            Some(Value::Currency(rust_decimal::Decimal::ZERO))
        );
    }

    #[test]
    fn process_propagates_input_change_to_dependent() {
        let registry = simple_chain_registry();
        let initial = initialize(&registry, &session());
        let event = InputEvent::new(
            id("form.primary.a"),
            Some(Value::Currency(rust_decimal_macros::dec!(10.00))),
            Source::Preparer,
            Utc::now(),
        );
        let result = process(&registry, &session(), &initial, &event);
        assert_eq!(result.event_outcome, EventOutcome::Accepted);
        assert_eq!(
            result.current_state.get(&id("form.primary.b")).unwrap().value,
            Some(Value::Currency(rust_decimal_macros::dec!(20.00)))
        );
        assert!(result.changed_ids.contains(&id("form.primary.a")));
        assert!(result.changed_ids.contains(&id("form.primary.b")));
    }

    #[test]
    fn process_rejects_unknown_instance_without_changing_snapshot() {
        let registry = simple_chain_registry();
        let initial = initialize(&registry, &session());
        let event = InputEvent::new(
            id("form.primary.zzz"),
            Some(Value::Integer(1)),
            Source::Preparer,
            Utc::now(),
        );
        let result = process(&registry, &session(), &initial, &event);
        assert!(matches!(
            result.event_outcome,
            EventOutcome::IgnoredUnknown { .. }
        ));
        assert!(result.changed_ids.is_empty());
    }

    #[test]
    fn process_rejects_event_targeting_a_computed_node() {
        let registry = simple_chain_registry();
        let initial = initialize(&registry, &session());
        let event = InputEvent::new(
            id("form.primary.b"),
            Some(Value::Currency(rust_decimal_macros::dec!(1.00))),
            Source::Preparer,
            Utc::now(),
        );
        let result = process(&registry, &session(), &initial, &event);
        assert!(matches!(
            result.event_outcome,
            EventOutcome::Rejected(EventError::NotAnInput { .. })
        ));
    }

    #[test]
    fn process_validation_failure_does_not_dirty_dependents() {
        let registry = simple_chain_registry();
        let initial = initialize(&registry, &session());
        let event = InputEvent::new(
            id("form.primary.a"),
            Some(Value::Currency(rust_decimal_macros::dec!(-5.00))),
            Source::Preparer,
            Utc::now(),
        );
        let result = process(&registry, &session(), &initial, &event);
        assert!(matches!(
            result.event_outcome,
            EventOutcome::Rejected(EventError::ValidationFailed { .. })
        ));
        assert_eq!(
            result.current_state.get(&id("form.primary.a")).unwrap().status,
            Status::Invalid
        );
        // b was not recomputed/dirtied: still 0 from init, untouched.
        assert!(!result.changed_ids.contains(&id("form.primary.b")));
    }

    #[test]
    fn process_is_idempotent_on_resubmitted_identical_value() {
        let registry = simple_chain_registry();
        let initial = initialize(&registry, &session());
        let ts = Utc::now();
        let event = InputEvent::new(
            id("form.primary.a"),
            Some(Value::Currency(rust_decimal_macros::dec!(10.00))),
            Source::Preparer,
            ts,
        );
        let once = process(&registry, &session(), &initial, &event);
        let twice = process(&registry, &session(), &once.current_state, &event);
        assert!(twice.changed_ids.is_empty());
        assert_eq!(
            once.current_state.get(&id("form.primary.a")).unwrap().last_updated_ts,
            twice.current_state.get(&id("form.primary.a")).unwrap().last_updated_ts
        );
    }

    #[test]
    fn reinitialize_preserves_inputs_and_recomputes_dependents() {
        let registry = simple_chain_registry();
        let initial = initialize(&registry, &session());
        let event = InputEvent::new(
            id("form.primary.a"),
            Some(Value::Currency(rust_decimal_macros::dec!(10.00))),
            Source::Preparer,
            Utc::now(),
        );
        let after_event = process(&registry, &session(), &initial, &event).current_state;

        // A superset registry (same two nodes) — simulates a slot insertion elsewhere.
        let new_registry = simple_chain_registry();
        let reinit = reinitialize(&new_registry, &session(), &after_event);
        assert_eq!(
            reinit.get(&id("form.primary.a")).unwrap().value,
            Some(Value::Currency(rust_decimal_macros::dec!(10.00)))
        );
        assert_eq!(
            reinit.get(&id("form.primary.b")).unwrap().value,
            Some(Value::Currency(rust_decimal_macros::dec!(20.00)))
        );
    }
}
