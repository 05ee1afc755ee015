//! Node definitions: the immutable descriptor registered for every
//! instance or instance template.
//!
//! Per Design Note 3 ("Closure-captured compute functions"), `compute`
//! and `isApplicable` are boxed polymorphic callables rather than an
//! opcode/DSL — the engine treats them as opaque `Fn(&dyn
//! EvaluationContext) -> _` and never inspects their bodies.

use std::collections::HashSet;
use std::fmt;

use crate::context::EvaluationContext;
use crate::errors::RegistrationError;
use crate::identity::{InstanceId, Owner};
use crate::status::Source;
use crate::value::{Value, ValueType};

/// A pure compute function: `compute(ctx) -> value`.
pub type ComputeFn = Box<dyn Fn(&dyn EvaluationContext) -> Result<Value, String> + Send + Sync>;

/// A pure applicability predicate: `isApplicable(ctx) -> bool`.
pub type ApplicabilityFn = Box<dyn Fn(&dyn EvaluationContext) -> bool + Send + Sync>;

/// A custom INPUT validation predicate, beyond the structural
/// constraints already carried by [`ValueType`].
pub type CustomValidator = Box<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

/// The kind of a node: the canonical source of a value, or a
/// deterministic pure function of other nodes.
///
/// `DERIVED`/`AGGREGATOR` nodes (spec §3) are structurally identical to
/// `Computed` — the distinction is purely conceptual (a pure sum over
/// uniform siblings) and carries no engine-visible difference, so it is
/// not a separate variant here; callers that want to flag a definition
/// as an aggregator can do so via `classifications`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// The canonical source of a value; mutated only by input events.
    Input,
    /// A deterministic pure function of its declared dependency closure.
    Computed,
}

/// Declarative INPUT validation beyond the value type's own structural
/// constraints (min/max, allow-negative, enum allow-list — see
/// [`ValueType::check`]).
pub struct Validation {
    /// An additional predicate run after the structural `ValueType`
    /// check passes.
    pub custom: Option<CustomValidator>,
}

impl fmt::Debug for Validation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validation")
            .field("custom", &self.custom.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl Validation {
    /// No additional validation beyond the value type's own checks.
    pub fn none() -> Self {
        Self { custom: None }
    }

    /// Validation with a custom predicate.
    pub fn custom(f: CustomValidator) -> Self {
        Self { custom: Some(f) }
    }
}

/// The immutable descriptor for a node instance, or — when
/// `repeatable` is set — a template that the slot materializer expands
/// into concrete instances.
pub struct NodeDefinition {
    /// Canonical instance ID, or a template ID containing `{owner}`/
    /// `{slotIndex}` placeholders when `repeatable` is set.
    pub id: InstanceId,
    /// INPUT or COMPUTED.
    pub kind: NodeKind,
    /// The declared value type and its structural constraints.
    pub value_type: ValueType,
    /// The owning scope.
    pub owner: Owner,
    /// Whether this definition is a template yielding 0..N instances.
    pub repeatable: bool,
    /// If present, the set of tax years for which this node applies;
    /// outside that set the node is unconditionally `SKIPPED`.
    pub applicable_tax_years: Option<HashSet<String>>,
    /// IDs this definition's compute may read. Required (non-empty,
    /// enforced by `validate_self`) for every `Computed` definition
    /// that is not also `unsupported`.
    pub dependencies: Vec<InstanceId>,
    /// The pure compute function. Required for `Computed` definitions.
    pub compute: Option<ComputeFn>,
    /// Optional applicability gate; `false` forces `SKIPPED` regardless
    /// of `compute`.
    pub is_applicable: Option<ApplicabilityFn>,
    /// INPUT-only validation.
    pub validation: Option<Validation>,
    /// INPUT-only default value, applied at session initialization.
    pub default_value: Option<Value>,
    /// INPUT-only preferred provenance label, surfaced to UI.
    pub source: Option<Source>,
    /// Free-form domain tags; opaque to the engine.
    pub classifications: Vec<String>,
    /// When set, the evaluator never calls `compute`; the node is
    /// always `UNSUPPORTED` with the declared default (or `null`).
    pub unsupported: bool,
}

impl fmt::Debug for NodeDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeDefinition")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("owner", &self.owner)
            .field("repeatable", &self.repeatable)
            .field("dependencies", &self.dependencies)
            .field("unsupported", &self.unsupported)
            .finish()
    }
}

impl NodeDefinition {
    /// Build an INPUT definition.
    pub fn input(id: InstanceId, value_type: ValueType, owner: Owner) -> Self {
        Self {
            id,
            kind: NodeKind::Input,
            value_type,
            owner,
            repeatable: false,
            applicable_tax_years: None,
            dependencies: Vec::new(),
            compute: None,
            is_applicable: None,
            validation: None,
            default_value: None,
            source: None,
            classifications: Vec::new(),
            unsupported: false,
        }
    }

    /// Build a COMPUTED definition.
    pub fn computed(
        id: InstanceId,
        value_type: ValueType,
        owner: Owner,
        dependencies: Vec<InstanceId>,
        compute: ComputeFn,
    ) -> Self {
        Self {
            id,
            kind: NodeKind::Computed,
            value_type,
            owner,
            repeatable: false,
            applicable_tax_years: None,
            dependencies,
            compute: Some(compute),
            is_applicable: None,
            validation: None,
            default_value: None,
            source: None,
            classifications: Vec::new(),
            unsupported: false,
        }
    }

    /// Mark this definition repeatable (a slot/per-filer template).
    pub fn repeatable(mut self) -> Self {
        self.repeatable = true;
        self
    }

    /// Restrict this definition to the given tax years.
    pub fn applicable_tax_years(mut self, years: impl IntoIterator<Item = String>) -> Self {
        self.applicable_tax_years = Some(years.into_iter().collect());
        self
    }

    /// Attach an applicability predicate.
    pub fn is_applicable(mut self, f: ApplicabilityFn) -> Self {
        self.is_applicable = Some(f);
        self
    }

    /// Attach INPUT validation.
    pub fn validation(mut self, validation: Validation) -> Self {
        self.validation = Some(validation);
        self
    }

    /// Attach an INPUT default value.
    pub fn default_value(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    /// Attach an INPUT preferred provenance label.
    pub fn source(mut self, source: Source) -> Self {
        self.source = Some(source);
        self
    }

    /// Attach free-form classification tags.
    pub fn classifications(mut self, tags: impl IntoIterator<Item = String>) -> Self {
        self.classifications = tags.into_iter().collect();
        self
    }

    /// Mark this definition as deferred/unsupported.
    pub fn unsupported(mut self) -> Self {
        self.unsupported = true;
        self
    }

    /// Self-consistency checks run by `RegistryBuilder::build` before
    /// the closure/cycle passes (SPEC_FULL §4.7).
    pub fn validate_self(&self) -> Result<(), RegistrationError> {
        match self.kind {
            NodeKind::Input => {
                if self.compute.is_some() {
                    return Err(RegistrationError::InvalidDefinition {
                        id: self.id.clone(),
                        reason: "INPUT definitions must not declare compute".into(),
                    });
                }
            }
            NodeKind::Computed => {
                if !self.unsupported && self.compute.is_none() {
                    return Err(RegistrationError::InvalidDefinition {
                        id: self.id.clone(),
                        reason: "COMPUTED definitions must declare compute unless unsupported"
                            .into(),
                    });
                }
                if !self.unsupported && self.dependencies.is_empty() {
                    return Err(RegistrationError::InvalidDefinition {
                        id: self.id.clone(),
                        reason: "COMPUTED definitions must declare a non-empty dependency set unless unsupported"
                            .into(),
                    });
                }
            }
        }
        if let Some(years) = &self.applicable_tax_years {
            if years.is_empty() {
                return Err(RegistrationError::InvalidDefinition {
                    id: self.id.clone(),
                    reason: "applicableTaxYears must be non-empty when present".into(),
                });
            }
        }
        if self.repeatable {
            let raw = self.id.as_str();
            if !raw.contains("{owner}") && !raw.contains("{slotIndex}") {
                return Err(RegistrationError::InvalidDefinition {
                    id: self.id.clone(),
                    reason: "repeatable templates must contain {owner} or {slotIndex}".into(),
                });
            }
        }
        Ok(())
    }
}
