// ── Entity identity ──
//
// Every hub entity is addressed as `<domain>.<object_id>`. The domain
// decides which services apply and which card the renderer builds.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ── Domain ──────────────────────────────────────────────────────────

/// Domains with a dedicated card. Everything else renders generically.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum Domain {
    Light,
    Switch,
    Climate,
}

// ── EntityId ────────────────────────────────────────────────────────

/// Parsed `<domain>.<object_id>` identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId {
    domain: String,
    object_id: String,
}

impl EntityId {
    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn object_id(&self) -> &str {
        &self.object_id
    }

    /// The domain, if it is one with a dedicated card.
    pub fn known_domain(&self) -> Option<Domain> {
        self.domain.parse().ok()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.domain, self.object_id)
    }
}

impl FromStr for EntityId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('.') {
            Some((domain, object_id)) if !domain.is_empty() && !object_id.is_empty() => Ok(Self {
                domain: domain.to_owned(),
                object_id: object_id.to_owned(),
            }),
            _ => Err(CoreError::InvalidEntityId {
                value: s.to_owned(),
            }),
        }
    }
}

impl TryFrom<String> for EntityId {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> Self {
        id.to_string()
    }
}
