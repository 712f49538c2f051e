// ── Core identity and entity types ──
//
// EntityId and Entity are the foundation of the mirror. An entity id
// has the shape `"<domain>.<object>"`; the domain is always derived
// from the id itself, never stored separately where it could drift.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use hassync_api::frame::EntityState;

// ── EntityId ────────────────────────────────────────────────────────

/// Identifier of a remotely managed entity, e.g. `"light.kitchen"`.
///
/// The prefix before the first `.` is the entity's domain (`"light"`,
/// `"switch"`, ...). Ids are opaque beyond that split; no further
/// validation is applied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Category prefix before the first `.`.
    ///
    /// An id without a dot is its own domain, so every entity always
    /// lands in exactly one bucket.
    pub fn domain(&self) -> &str {
        self.0.split_once('.').map_or(self.0.as_str(), |(d, _)| d)
    }

    /// Object name after the first `.`, empty when there is none.
    pub fn object_id(&self) -> &str {
        self.0.split_once('.').map_or("", |(_, o)| o)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EntityId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ── Entity ──────────────────────────────────────────────────────────

/// Last-known state of one remote entity.
///
/// `state` and `attributes` are replaced wholesale on every update;
/// nothing is merged field-by-field. Attributes stay schemaless JSON --
/// the mirror never interprets them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub entity_id: EntityId,
    pub state: String,
    #[serde(default)]
    pub attributes: serde_json::Map<String, Value>,
}

impl Entity {
    pub fn domain(&self) -> &str {
        self.entity_id.domain()
    }

    /// The `friendly_name` attribute, when present and a string.
    pub fn friendly_name(&self) -> Option<&str> {
        self.attributes.get("friendly_name").and_then(Value::as_str)
    }
}

impl From<EntityState> for Entity {
    fn from(state: EntityState) -> Self {
        Self {
            entity_id: EntityId::new(state.entity_id),
            state: state.state,
            attributes: state.attributes,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
