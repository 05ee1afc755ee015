//! Node status state machine
//!
//! Every instance in a snapshot carries exactly one [`Status`] after a
//! tick settles. Naming and the "terminal state" framing borrow the
//! vocabulary of the teacher crate's `state_machine::State` trait, but
//! the transition table itself is the small, fixed six-state machine
//! the spec defines rather than a user-extensible Moore/Mealy machine —
//! every domain node goes through the same states, so there is nothing
//! for a generic state-machine abstraction to parameterize over here.

use serde::{Deserialize, Serialize};

/// The provenance of an INPUT's current value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// Entered by a tax preparer.
    Preparer,
    /// Extracted by an OCR pipeline.
    Ocr,
    /// Imported from a prior year or another system.
    Imported,
    /// The definition's declared default value.
    Default,
}

/// The status of a node instance within a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    /// Evaluated; the carried value is current.
    Clean,
    /// Awaiting re-evaluation this tick. Never observed at rest by
    /// callers — every tick's walk resolves every `Dirty` mark to a
    /// terminal status before the snapshot is returned.
    Dirty,
    /// `isApplicable` returned false, or the tax year is not in the
    /// definition's `applicableTaxYears`. Value is always `null`.
    Skipped,
    /// The definition is marked `unsupported`; the evaluator never
    /// calls `compute`. Value is the declared default, or `null`.
    Unsupported,
    /// An INPUT failed validation on submission, or a COMPUTED's
    /// evaluator threw. The previous valid value is retained; the
    /// rejection reason is attached separately.
    Invalid,
    /// A required INPUT was never set and no default applies. Value is
    /// always `null`.
    PendingInput,
}

impl Status {
    /// Whether dependents reading this status via `ctx.get` must
    /// observe `null` regardless of any value carried alongside it.
    ///
    /// `Invalid` is included per the resolved open question on
    /// inconsistent upstream behavior (DESIGN.md): a node's own
    /// `INVALID` state retains its last-good value for display/retry
    /// purposes, but dependents see `null` for it, same as `SKIPPED`.
    pub fn reads_as_null(&self) -> bool {
        matches!(
            self,
            Status::Skipped | Status::Unsupported | Status::PendingInput | Status::Invalid
        )
    }

    /// A human-facing name, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Status::Clean => "CLEAN",
            Status::Dirty => "DIRTY",
            Status::Skipped => "SKIPPED",
            Status::Unsupported => "UNSUPPORTED",
            Status::Invalid => "INVALID",
            Status::PendingInput => "PENDING_INPUT",
        }
    }

    /// Whether this status is a terminal outcome of an evaluation tick
    /// (i.e. not `Dirty`, which only ever exists transiently mid-walk).
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Status::Dirty)
    }
}
