//! Session lifecycle (spec §4.6): `initializeSession`,
//! `reinitializeSession`, and `process`, wrapping the stateless
//! [`crate::evaluator`] functions around one session's current
//! snapshot.

use std::sync::Arc;

use crate::context::SessionContext;
use crate::errors::RegistrationError;
use crate::evaluator::{self, EvaluationResult};
use crate::input_event::InputEvent;
use crate::registry::Registry;
use crate::snapshot::Snapshot;

/// One filer's live evaluation session: a fixed [`SessionContext`], the
/// [`Registry`] it was built against, and the current snapshot.
///
/// The registry is held behind an `Arc` so independent sessions may
/// share one immutable registry by reference (spec §5, "Concurrent
/// sessions").
pub struct Session {
    registry: Arc<Registry>,
    context: SessionContext,
    snapshot: Snapshot,
}

impl Session {
    /// `initializeSession(context)` (spec §4.6): builds the initial
    /// snapshot from `registry`. Fails only if `context` itself is
    /// invalid.
    pub fn initialize(
        registry: Arc<Registry>,
        context: SessionContext,
    ) -> Result<Self, RegistrationError> {
        validate_context(&context)?;
        let snapshot = evaluator::initialize(&registry, &context);
        Ok(Self {
            registry,
            context,
            snapshot,
        })
    }

    /// `reinitializeSession(context, priorSnapshot)` (spec §4.6): used
    /// when slot structures change (e.g. a 1099-INT slot is inserted).
    /// Preserves every surviving INPUT's value from the current
    /// snapshot, then re-evaluates `new_registry` from scratch.
    pub fn reinitialize(
        &mut self,
        new_registry: Arc<Registry>,
        context: SessionContext,
    ) -> Result<(), RegistrationError> {
        validate_context(&context)?;
        let snapshot = evaluator::reinitialize(&new_registry, &context, &self.snapshot);
        self.registry = new_registry;
        self.context = context;
        self.snapshot = snapshot;
        Ok(())
    }

    /// `process(event, snapshot, context) → {currentState, changedIds,
    /// eventOutcome}` (spec §4.6): one event, one snapshot in, one
    /// snapshot out. Updates the session's current snapshot in place
    /// and returns the full result.
    pub fn process(&mut self, event: &InputEvent) -> EvaluationResult {
        let result = evaluator::process(&self.registry, &self.context, &self.snapshot, event);
        self.snapshot = result.current_state.clone();
        result
    }

    /// The session's fixed context.
    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    /// The session's current snapshot.
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// The registry this session currently evaluates against.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }
}

/// Reject an obviously-malformed session context at construction time
/// (spec §7, "Context errors"). The engine does not know the domain's
/// set of supported tax years; it only rejects what it can: an empty
/// year or session key.
fn validate_context(context: &SessionContext) -> Result<(), RegistrationError> {
    if context.tax_year.trim().is_empty() {
        return Err(RegistrationError::InvalidContext {
            reason: "tax_year must not be empty".into(),
        });
    }
    if context.session_key.trim().is_empty() {
        return Err(RegistrationError::InvalidContext {
            reason: "session_key must not be empty".into(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::FilingStatus;
    use crate::definition::NodeDefinition;
    use crate::identity::{InstanceId, Owner};
    use crate::input_event::InputEvent;
    use crate::registry::RegistryBuilder;
    use crate::status::{Source, Status};
    use crate::value::{Value, ValueType};
    use chrono::Utc;

    fn id(s: &str) -> InstanceId {
        InstanceId::new(s).unwrap()
    }

    fn build_registry() -> Arc<Registry> {
        let mut builder = RegistryBuilder::new();
        builder.register(vec![NodeDefinition::input(
            id("form.primary.a"),
            ValueType::Integer {
                min: None,
                max: None,
            },
            Owner::Primary,
        )]);
        Arc::new(builder.build().unwrap())
    }

    #[test]
    fn initialize_rejects_empty_tax_year() {
        let registry = build_registry();
        let context = SessionContext::new("", FilingStatus::Single, false, "s1");
        assert!(matches!(
            Session::initialize(registry, context),
            Err(RegistrationError::InvalidContext { .. })
        ));
    }

    #[test]
    fn initialize_and_process_round_trip() {
        let registry = build_registry();
        let context = SessionContext::new("2025", FilingStatus::Single, false, "s1");
        let mut session = Session::initialize(registry, context).unwrap();
        assert_eq!(
            session.snapshot().get(&id("form.primary.a")).unwrap().status,
            Status::PendingInput
        );

        let event = InputEvent::new(
            id("form.primary.a"),
            Some(Value::Integer(5)),
            Source::Preparer,
            Utc::now(),
        );
        let result = session.process(&event);
        assert_eq!(result.event_outcome, crate::errors::EventOutcome::Accepted);
        assert_eq!(
            session.snapshot().get(&id("form.primary.a")).unwrap().value,
            Some(Value::Integer(5))
        );
    }

    #[test]
    fn reinitialize_preserves_input_across_registry_swap() {
        let registry = build_registry();
        let context = SessionContext::new("2025", FilingStatus::Single, false, "s1");
        let mut session = Session::initialize(registry, context.clone()).unwrap();
        let event = InputEvent::new(
            id("form.primary.a"),
            Some(Value::Integer(7)),
            Source::Preparer,
            Utc::now(),
        );
        session.process(&event);

        let new_registry = build_registry();
        session.reinitialize(new_registry, context).unwrap();
        assert_eq!(
            session.snapshot().get(&id("form.primary.a")).unwrap().value,
            Some(Value::Integer(7))
        );
    }
}
