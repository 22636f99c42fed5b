//! Entity identity.
//!
//! Every walk and observation is identified either by a provisional id,
//! generated on the device before the remote store has seen the entity, or by
//! the permanent id the remote store assigned on create. The two are kept
//! apart by type so resolution logic cannot mistake one for the other.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix carried by generated provisional ids, for human readability only.
pub const PROVISIONAL_PREFIX: &str = "tmp_";

/// Identity of a walk or observation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum EntityId {
    /// Locally generated, not yet known to the remote store.
    Provisional(String),
    /// Assigned by the remote store.
    Permanent(String),
}

impl EntityId {
    /// Generate a fresh provisional id, unique on this device.
    pub fn new_provisional() -> Self {
        EntityId::Provisional(format!(
            "{PROVISIONAL_PREFIX}{}",
            uuid::Uuid::new_v4().simple()
        ))
    }

    pub fn provisional(value: impl Into<String>) -> Self {
        EntityId::Provisional(value.into())
    }

    pub fn permanent(value: impl Into<String>) -> Self {
        EntityId::Permanent(value.into())
    }

    /// The raw identifier, regardless of kind.
    pub fn as_str(&self) -> &str {
        match self {
            EntityId::Provisional(value) | EntityId::Permanent(value) => value,
        }
    }

    pub fn is_provisional(&self) -> bool {
        matches!(self, EntityId::Provisional(_))
    }

    /// Key under which the entity is stored locally.
    ///
    /// Tagged so a provisional and a permanent id with the same text never
    /// collide.
    pub fn storage_key(&self) -> String {
        match self {
            EntityId::Provisional(value) => format!("p:{value}"),
            EntityId::Permanent(value) => format!("r:{value}"),
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Provisional(value) => write!(f, "provisional:{value}"),
            EntityId::Permanent(value) => write!(f, "{value}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_provisional_and_unique() {
        let a = EntityId::new_provisional();
        let b = EntityId::new_provisional();
        assert!(a.is_provisional());
        assert!(a.as_str().starts_with(PROVISIONAL_PREFIX));
        assert_ne!(a, b);
    }

    #[test]
    fn storage_keys_never_collide_across_kinds() {
        let p = EntityId::provisional("x");
        let r = EntityId::permanent("x");
        assert_ne!(p.storage_key(), r.storage_key());
    }

    #[test]
    fn serialized_form_is_tagged() {
        let json = serde_json::to_string(&EntityId::provisional("tmp_1")).unwrap();
        assert_eq!(json, r#"{"kind":"provisional","value":"tmp_1"}"#);
    }
}
