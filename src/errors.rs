//! Error taxonomy for the reactive tax graph engine
//!
//! The spec draws a hard line between two failure surfaces:
//! registration errors "throw synchronously from `register`" (fail
//! fast, never reachable at evaluation time), while event-level errors
//! "are returned in `eventOutcome`, never thrown". Those are two
//! different call sites with two different conventions, so — unlike
//! the teacher crate's single flat `DomainError` — they get two
//! distinct `thiserror` enums here.

use thiserror::Error;

use crate::identity::InstanceId;

/// Errors that abort `RegistryBuilder::build` before any session can be
/// created from the registry. These never occur mid-evaluation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistrationError {
    /// An instance ID did not match the required dotted shape.
    #[error("malformed instance id: {id}")]
    MalformedId {
        /// The raw string that failed to parse.
        id: String,
    },

    /// Two definitions declared the same instance ID.
    #[error("duplicate definition for {id}")]
    DuplicateId {
        /// The ID that was declared twice.
        id: InstanceId,
    },

    /// A definition's dependency list referenced an ID that resolves to
    /// nothing in the merged catalog.
    #[error("{from} depends on unknown instance {to}")]
    UnknownDependency {
        /// The definition that declared the bad dependency.
        from: InstanceId,
        /// The dependency ID that could not be resolved.
        to: InstanceId,
    },

    /// The dependency graph contains a cycle; the listed IDs all still
    /// carried in-edges after the Kahn walk completed.
    #[error("dependency cycle involving {ids:?}")]
    Cycle {
        /// The IDs left unprocessed by the topological walk.
        ids: Vec<InstanceId>,
    },

    /// A definition failed self-validation (e.g. a COMPUTED node with no
    /// declared dependencies, or an INPUT node declaring a `compute`).
    #[error("invalid definition for {id}: {reason}")]
    InvalidDefinition {
        /// The offending definition's ID.
        id: InstanceId,
        /// Why the definition is invalid.
        reason: String,
    },

    /// The session context supplied at construction time was invalid
    /// (e.g. an unknown tax year constant).
    #[error("invalid session context: {reason}")]
    InvalidContext {
        /// Why the context was rejected.
        reason: String,
    },
}

/// Per-event errors. The snapshot is always preserved; these are
/// returned as the `eventOutcome`, never thrown.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EventError {
    /// The event targeted a node that is not an INPUT.
    #[error("{id} is not an input")]
    NotAnInput {
        /// The (non-input) target of the event.
        id: InstanceId,
    },

    /// The submitted value failed the INPUT's declared validation.
    #[error("validation failed: {reason}")]
    ValidationFailed {
        /// Human-readable rejection reason.
        reason: String,
    },
}

/// The outcome of processing a single [`crate::input_event::InputEvent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// The input was accepted and applied (dependents may or may not
    /// have changed as a result).
    Accepted,
    /// The input was rejected; the prior snapshot is unchanged except
    /// for the target instance moving to `INVALID` (validation
    /// failures) — see [`EventError`] for the reason.
    Rejected(EventError),
    /// `instance_id` did not resolve to any known node; the snapshot is
    /// unchanged. This is a warning, not an error: unknown IDs are
    /// common when a UI submits stale form state.
    IgnoredUnknown {
        /// The unresolved ID from the event.
        id: InstanceId,
    },
}
