//! Entity identifiers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Identifier shared by timers and notes.
///
/// Locally generated ids are UUID v7 (time-sortable). Ids handed out by a
/// remote store are opaque strings and are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Create a new unique id using UUID v7
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Wrap an id assigned elsewhere (e.g. by the remote store)
    #[must_use]
    pub fn from_remote(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First `len` characters, for compact listings
    #[must_use]
    pub fn short(&self, len: usize) -> String {
        self.0.chars().take(len).collect()
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::generate()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for EntityId {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(crate::Error::InvalidInput("id must not be empty".into()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id_unique() {
        let id1 = EntityId::generate();
        let id2 = EntityId::generate();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_entity_id_parse() {
        let id = EntityId::generate();
        let parsed: EntityId = id.as_str().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("   ".parse::<EntityId>().is_err());
    }

    #[test]
    fn test_entity_id_serializes_as_plain_string() {
        let id = EntityId::from_remote("abc123");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc123\"");
        assert_eq!(id.short(3), "abc");
    }
}
