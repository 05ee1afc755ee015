//! Instance identity for nodes in the tax graph
//!
//! An [`InstanceId`] is the engine's only notion of "which node". Unlike
//! the UUID-backed entity IDs used elsewhere in DDD-flavored engines, a
//! tax-graph instance ID is a dotted, human-legible path with shape
//! `{form}.{ownerScope}.{logicalId}[.{field}]` — it is opaque to the
//! engine, but its shape is validated at registration time so malformed
//! IDs fail fast rather than producing silent lookup misses at
//! evaluation time.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::RegistrationError;

/// Owning scope of a node instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Owner {
    /// The primary filer.
    Primary,
    /// The filer's spouse (materialized only when the session has one).
    Spouse,
    /// Shared between both filers; materialized once per session.
    Joint,
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Owner::Primary => write!(f, "primary"),
            Owner::Spouse => write!(f, "spouse"),
            Owner::Joint => write!(f, "joint"),
        }
    }
}

/// A validated dotted instance identifier: `{form}.{ownerScope}.{logicalId}[.{field}]`.
///
/// IDs are opaque to the engine beyond this shape check — domain
/// definitions are free to encode whatever convention they like in
/// `logicalId` and `field`, including a slot index segment (`s0`, `s1`, …).
///
/// Serializes as a plain JSON string; deserialization runs the same
/// shape validation as [`InstanceId::new`] rather than trusting the
/// wire — an `#[derive(Deserialize)]` on the bare tuple field would
/// silently admit malformed IDs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(into = "String")]
pub struct InstanceId(String);

impl TryFrom<String> for InstanceId {
    type Error = RegistrationError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        InstanceId::new(raw)
    }
}

impl From<InstanceId> for String {
    fn from(id: InstanceId) -> Self {
        id.0
    }
}

impl<'de> Deserialize<'de> for InstanceId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        InstanceId::try_from(raw).map_err(serde::de::Error::custom)
    }
}

impl InstanceId {
    /// Parse and validate a dotted instance identifier.
    ///
    /// Requires at least three dot-separated, non-empty segments:
    /// `form`, `ownerScope`, `logicalId`, with an optional trailing
    /// `field` segment.
    pub fn new(raw: impl Into<String>) -> Result<Self, RegistrationError> {
        let raw = raw.into();
        let segments: Vec<&str> = raw.split('.').collect();
        if segments.len() < 3 || segments.iter().any(|s| s.is_empty()) {
            return Err(RegistrationError::MalformedId { id: raw });
        }
        Ok(Self(raw))
    }

    /// Borrow the underlying dotted string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The leading `{form}` segment.
    pub fn form(&self) -> &str {
        self.0.split('.').next().unwrap_or_default()
    }

    /// Substitute `{owner}` and `{slotIndex}` placeholders in a template ID,
    /// producing a concrete instance ID for slot materialization.
    ///
    /// The template is expected to contain literal `{owner}` and
    /// `{slotIndex}` substrings (e.g. `form8889.{owner}.s{slotIndex}.box1`).
    pub fn materialize_template(
        template: &str,
        owner: Owner,
        slot_index: Option<u32>,
    ) -> Result<Self, RegistrationError> {
        let mut concrete = template.replace("{owner}", &owner.to_string());
        if let Some(idx) = slot_index {
            concrete = concrete.replace("{slotIndex}", &idx.to_string());
        }
        Self::new(concrete)
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for InstanceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
