use std::borrow::Borrow;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

/// Names Windows refuses as path components, plus the dot names. An id that
/// collides with one of these would produce an unusable cache directory.
const RESERVED: &[&str] = &[".", "..", "CON", "PRN", "AUX", "NUL", "COM1", "LPT1"];

const MAX_LEN: usize = 200;

/// A validated source identifier, safe to use verbatim as a directory name
/// on every supported filesystem.
///
/// Valid ids match `[A-Za-z0-9_-]{1,200}` and are not reserved device names.
/// The character set rules out path separators, traversal sequences, and the
/// `<>:"/\|?*` set outright.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct SourceId(String);

impl SourceId {
    pub fn new(id: impl Into<String>) -> Result<Self, InvalidSourceId> {
        let id = id.into();
        if id.is_empty() {
            return Err(InvalidSourceId::Empty);
        }
        if id.len() > MAX_LEN {
            return Err(InvalidSourceId::TooLong { len: id.len() });
        }
        if let Some(ch) = id
            .chars()
            .find(|ch| !ch.is_ascii_alphanumeric() && *ch != '_' && *ch != '-')
        {
            return Err(InvalidSourceId::ForbiddenCharacter { id, ch });
        }
        if RESERVED.iter().any(|name| id.eq_ignore_ascii_case(name)) {
            return Err(InvalidSourceId::Reserved { id });
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum InvalidSourceId {
    #[error("source id must not be empty")]
    Empty,
    #[error("source id is {len} characters long, the maximum is {MAX_LEN}")]
    TooLong { len: usize },
    #[error("source id `{id}` contains forbidden character `{ch}`; allowed are ASCII letters, digits, `-` and `_`")]
    ForbiddenCharacter { id: String, ch: char },
    #[error("source id `{id}` is a reserved name")]
    Reserved { id: String },
}

impl FromStr for SourceId {
    type Err = InvalidSourceId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Display for SourceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SourceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for SourceId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for SourceId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let id = String::deserialize(deserializer)?;
        Self::new(id).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_safe_ids() {
        for id in ["docs", "my-repo", "a", "rustc_dev", "A-1_b"] {
            assert!(SourceId::new(id).is_ok(), "{id} should be accepted");
        }
        assert!(SourceId::new("x".repeat(200)).is_ok());
    }

    #[test]
    fn rejects_unsafe_ids() {
        for id in [
            "", "..", ".", "a/b", "a\\b", "a b", "a:b", "a*b", "a?b", "a<b", "a>b", "a|b",
            "a\"b", "a\0b", "café",
        ] {
            assert!(SourceId::new(id).is_err(), "{id:?} should be rejected");
        }
        assert!(SourceId::new("x".repeat(201)).is_err());
    }

    #[test]
    fn rejects_reserved_names_case_insensitively() {
        for id in ["CON", "con", "Nul", "COM1", "lpt1", "AUX", "PRN"] {
            assert!(SourceId::new(id).is_err(), "{id} should be rejected");
        }
    }

    #[test]
    fn parsing_is_idempotent() {
        let id = SourceId::new("docs").unwrap();
        assert_eq!(SourceId::new(id.as_str()).unwrap(), id);
    }

    #[test]
    fn serde_round_trip() {
        let id: SourceId = serde_json::from_str("\"docs\"").unwrap();
        assert_eq!(id.as_str(), "docs");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"docs\"");
        assert!(serde_json::from_str::<SourceId>("\"../up\"").is_err());
    }
}
