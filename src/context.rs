//! Session context and the evaluation context handed to `compute`/`isApplicable`
//!
//! [`SessionContext`] is the immutable `(tax year, filing status, spouse
//! flag, session key)` tuple that parameterizes every evaluation within
//! one session (spec §3, "Session"; glossary, "Session context").
//! [`EvaluationContext`] is the capability object passed into every
//! `compute` and `isApplicable` call (spec §4.4) — it is a trait rather
//! than a concrete struct because the evaluator builds a different
//! concrete implementation per tick (one that can see the in-progress
//! snapshot) without the node-definition layer needing to know that.

use serde::{Deserialize, Serialize};

use crate::identity::InstanceId;
use crate::status::Status;
use crate::value::Value;

/// Filing status, as declared on the return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilingStatus {
    /// Single.
    Single,
    /// Married filing jointly.
    MarriedFilingJointly,
    /// Married filing separately.
    MarriedFilingSeparately,
    /// Head of household.
    HeadOfHousehold,
    /// Qualifying surviving spouse.
    QualifyingSurvivingSpouse,
}

/// The immutable `(tax year, filing status, spouse flag, session key)`
/// tuple fixed at `initializeSession` and carried for the session's
/// lifetime. Changing any of these fields requires a fresh
/// `reinitializeSession` call (spec §4.6).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionContext {
    /// The tax year this session evaluates against, e.g. `"2025"`.
    pub tax_year: String,
    /// The declared filing status.
    pub filing_status: FilingStatus,
    /// Whether a spouse instance set should be materialized.
    pub has_spouse: bool,
    /// Opaque session identifier, stable across reinitialization.
    pub session_key: String,
}

impl SessionContext {
    /// Construct a new session context.
    pub fn new(
        tax_year: impl Into<String>,
        filing_status: FilingStatus,
        has_spouse: bool,
        session_key: impl Into<String>,
    ) -> Self {
        Self {
            tax_year: tax_year.into(),
            filing_status,
            has_spouse,
            session_key: session_key.into(),
        }
    }

    /// Construct a session context with a freshly-generated, opaque
    /// session key — the common case for callers that don't yet have
    /// one of their own (e.g. a UI starting a new return).
    pub fn new_with_generated_key(
        tax_year: impl Into<String>,
        filing_status: FilingStatus,
        has_spouse: bool,
    ) -> Self {
        Self::new(tax_year, filing_status, has_spouse, generate_session_key())
    }
}

/// Generate an opaque, globally-unique session key.
pub fn generate_session_key() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Capabilities exposed to every `compute` and `isApplicable` call.
///
/// The engine guarantees only that `get`/`status` return the tick's
/// already-resolved value for any dependency with a strictly lower
/// topological order than the caller (spec §4.4), and that `SKIPPED`,
/// `UNSUPPORTED`, and `PENDING_INPUT` dependencies read as `None` via
/// `get`. Coercing `None` to a numeric zero ("safeNum") is left to each
/// aggregator's own compute body — see [`crate::value::Value::safe_num`].
pub trait EvaluationContext {
    /// Read another instance's current-tick value, or `None` if that
    /// instance does not exist, is absent from this session
    /// (non-materialized spouse/slot), or is `SKIPPED`/`UNSUPPORTED`/
    /// `PENDING_INPUT`/`INVALID`-with-no-prior-value.
    fn get(&self, id: &InstanceId) -> Option<&Value>;

    /// Read another instance's current-tick status.
    fn status(&self, id: &InstanceId) -> Option<Status>;

    /// The session's fixed context.
    fn session(&self) -> &SessionContext;
}
