// Copyright (c) 2025 - Cowboy AI, LLC.

//! # taxgraph-engine
//!
//! A reactive computation engine that evaluates a directed acyclic
//! graph of typed nodes representing US tax return lines. External
//! collaborators — UIs, OCR pipelines, test harnesses — stream
//! [`InputEvent`]s; the engine incrementally recomputes only the
//! affected `COMPUTED` nodes and returns a new, fully-consistent
//! [`Snapshot`] of every node's value and status.
//!
//! The domain overlay itself — the thousand-plus node definitions that
//! encode Form 8889, Schedule 2, Schedule EIC, and the rest of a given
//! year's worksheets — is content, not engine, and lives outside this
//! crate. What this crate provides:
//!
//! - [`identity`] and [`value`] — the node type system: IDs, owners,
//!   value types, and the closed [`value::Value`] variant.
//! - [`status`] — the six-state node status machine.
//! - [`definition`] — the immutable [`definition::NodeDefinition`]
//!   descriptor, including boxed pure `compute`/`isApplicable`
//!   callables.
//! - [`registry`] — [`registry::RegistryBuilder`] and the immutable,
//!   topologically-ordered [`registry::Registry`] it produces.
//! - [`materializer`] — slot/template expansion and aggregator
//!   rebuilding for repeatable per-document structures.
//! - [`context`] — [`context::SessionContext`] and the
//!   [`context::EvaluationContext`] capability trait passed to every
//!   compute.
//! - [`snapshot`] — the immutable, copy-on-write [`snapshot::Snapshot`].
//! - [`input_event`] — the external [`input_event::InputEvent`]
//!   contract.
//! - [`evaluator`] — the core algorithm: dirtying, the topological
//!   walk, and session initialization/reinitialization.
//! - [`session`] — [`session::Session`], the stateful wrapper tying a
//!   registry, context, and current snapshot together.
//! - [`errors`] — the registration-vs-event error taxonomy.
//!
//! ## Design principles
//!
//! 1. **Determinism.** Identical registries and identical ordered event
//!    sequences yield byte-identical snapshots, including timestamps
//!    (derived from each event's own clock, never the wall clock).
//! 2. **Immutability.** Snapshots are copy-on-write; an instance whose
//!    `(status, value)` did not change across a tick keeps its prior
//!    `Arc` rather than being rebuilt.
//! 3. **Closed typing.** `Value` is a tagged variant checked against
//!    each node's declared [`value::ValueType`] on every write, not a
//!    duck-typed slot.
//! 4. **Registration fails fast.** Duplicate IDs, unresolved
//!    dependencies, and dependency cycles are rejected synchronously
//!    from [`registry::RegistryBuilder::build`]; none of these are
//!    reachable once a [`registry::Registry`] exists.
//! 5. **Skipped-null propagation.** The engine returns `null` for
//!    absent, skipped, unsupported, pending, or invalid dependency
//!    reads; coercing that to zero ("safeNum") is an aggregator-local
//!    convention, never engine-enforced.

#![warn(missing_docs)]

pub mod context;
pub mod definition;
pub mod errors;
pub mod evaluator;
pub mod identity;
pub mod input_event;
pub mod materializer;
pub mod registry;
pub mod session;
pub mod snapshot;
pub mod status;
pub mod value;

pub use context::{generate_session_key, EvaluationContext, FilingStatus, SessionContext};
pub use definition::{ApplicabilityFn, ComputeFn, NodeDefinition, NodeKind, Validation};
pub use errors::{EventError, EventOutcome, RegistrationError};
pub use evaluator::EvaluationResult;
pub use identity::{InstanceId, Owner};
pub use input_event::InputEvent;
pub use registry::{Registry, RegistryBuilder};
pub use session::Session;
pub use snapshot::{InstanceState, Snapshot};
pub use status::{Source, Status};
pub use value::{Value, ValueType};
