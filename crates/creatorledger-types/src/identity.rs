//! Creator identity types
//!
//! Identity values are validated on construction so that every
//! `CreatorId` in the system is safe to use as a filename component,
//! a credential-store account name, and a canonical-bytes field.

use crate::{Result, TypesError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum length of a creator id in bytes
pub const CREATOR_ID_MAX_LEN: usize = 64;

/// Maximum length of a display name in characters
pub const DISPLAY_NAME_MAX_LEN: usize = 128;

/// Opaque stable identifier of a creator
///
/// Matches `[A-Za-z0-9_-]{1,64}`: URL-safe and safe as a filename
/// component. Immutable for the lifetime of the creator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CreatorId(String);

impl CreatorId {
    /// Validate and construct a creator id
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(TypesError::InvalidCreatorId {
                reason: "must not be empty".to_string(),
            });
        }
        if id.len() > CREATOR_ID_MAX_LEN {
            return Err(TypesError::InvalidCreatorId {
                reason: format!("exceeds {} bytes", CREATOR_ID_MAX_LEN),
            });
        }
        if let Some(c) = id
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
        {
            return Err(TypesError::InvalidCreatorId {
                reason: format!("character {:?} outside [A-Za-z0-9_-]", c),
            });
        }
        Ok(Self(id))
    }

    /// The id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CreatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CreatorId {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for CreatorId {
    type Error = TypesError;

    fn try_from(s: String) -> Result<Self> {
        Self::new(s)
    }
}

impl From<CreatorId> for String {
    fn from(id: CreatorId) -> Self {
        id.0
    }
}

impl AsRef<str> for CreatorId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Human-readable label for a creator
///
/// Not a key. Treated as append-time immutable; rotation of display
/// names is out of scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DisplayName(String);

impl DisplayName {
    /// Validate and construct a display name
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(TypesError::InvalidDisplayName {
                reason: "must not be empty".to_string(),
            });
        }
        if name.chars().count() > DISPLAY_NAME_MAX_LEN {
            return Err(TypesError::InvalidDisplayName {
                reason: format!("exceeds {} characters", DISPLAY_NAME_MAX_LEN),
            });
        }
        if let Some(c) = name.chars().find(|c| !Self::allowed_char(*c)) {
            return Err(TypesError::InvalidDisplayName {
                reason: format!("character {:?} not allowed", c),
            });
        }
        Ok(Self(name))
    }

    fn allowed_char(c: char) -> bool {
        c.is_ascii_alphanumeric() || " -_.,!?()@".contains(c)
    }

    /// The name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DisplayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DisplayName {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for DisplayName {
    type Error = TypesError;

    fn try_from(s: String) -> Result<Self> {
        Self::new(s)
    }
}

impl From<DisplayName> for String {
    fn from(name: DisplayName) -> Self {
        name.0
    }
}

/// A creator record: one row per creator, created exactly once
///
/// `public_key` holds the canonical `ed25519:` string form so this
/// crate stays free of crypto dependencies. `row_version` is reserved
/// for future mutable-identity fields and is never read today.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Creator {
    pub creator_id: CreatorId,
    pub display_name: DisplayName,
    pub public_key: String,
    pub created_at: DateTime<Utc>,
    pub row_version: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creator_id_valid() {
        let id = CreatorId::new("alice_01-test").unwrap();
        assert_eq!(id.as_str(), "alice_01-test");
    }

    #[test]
    fn test_creator_id_rejects_traversal() {
        assert!(CreatorId::new("../evil").is_err());
        assert!(CreatorId::new("a/b").is_err());
        assert!(CreatorId::new("a\\b").is_err());
        assert!(CreatorId::new("a.b").is_err());
    }

    #[test]
    fn test_creator_id_rejects_empty_and_long() {
        assert!(CreatorId::new("").is_err());
        assert!(CreatorId::new("x".repeat(64)).is_ok());
        assert!(CreatorId::new("x".repeat(65)).is_err());
    }

    #[test]
    fn test_creator_id_serde_validates() {
        let ok: std::result::Result<CreatorId, _> = serde_json::from_str("\"alice\"");
        assert!(ok.is_ok());
        let bad: std::result::Result<CreatorId, _> = serde_json::from_str("\"../evil\"");
        assert!(bad.is_err());
    }

    #[test]
    fn test_display_name_valid() {
        assert!(DisplayName::new("Alice (photo), v2!").is_ok());
        assert!(DisplayName::new("mail@example").is_ok());
    }

    #[test]
    fn test_display_name_rejects() {
        assert!(DisplayName::new("").is_err());
        assert!(DisplayName::new("tab\tname").is_err());
        assert!(DisplayName::new("semi;colon").is_err());
        assert!(DisplayName::new("x".repeat(129)).is_err());
    }
}
