use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Table-of-contents rendering for a source's cache directory.
///
/// The config surface accepts `true`/`false` as well as the mode names, so
/// this type round-trips `true` as [`TocMode::Tree`] and serializes back to
/// the shortest spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TocMode {
    Off,
    #[default]
    Tree,
    Compressed,
}

impl TocMode {
    pub fn is_enabled(self) -> bool {
        !matches!(self, Self::Off)
    }
}

impl Serialize for TocMode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Off => serializer.serialize_bool(false),
            Self::Tree => serializer.serialize_bool(true),
            Self::Compressed => serializer.serialize_str("compressed"),
        }
    }
}

impl<'de> Deserialize<'de> for TocMode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Flag(bool),
            Name(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Flag(true) => Ok(Self::Tree),
            Raw::Flag(false) => Ok(Self::Off),
            Raw::Name(name) => match name.as_str() {
                "tree" => Ok(Self::Tree),
                "compressed" => Ok(Self::Compressed),
                other => Err(D::Error::custom(format!(
                    "invalid toc mode `{other}`, expected `tree`, `compressed`, or a boolean"
                ))),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_booleans_and_names() {
        assert_eq!(serde_json::from_str::<TocMode>("true").unwrap(), TocMode::Tree);
        assert_eq!(serde_json::from_str::<TocMode>("false").unwrap(), TocMode::Off);
        assert_eq!(serde_json::from_str::<TocMode>("\"tree\"").unwrap(), TocMode::Tree);
        assert_eq!(
            serde_json::from_str::<TocMode>("\"compressed\"").unwrap(),
            TocMode::Compressed
        );
        assert!(serde_json::from_str::<TocMode>("\"flat\"").is_err());
    }

    #[test]
    fn serializes_to_shortest_spelling() {
        assert_eq!(serde_json::to_string(&TocMode::Tree).unwrap(), "true");
        assert_eq!(serde_json::to_string(&TocMode::Off).unwrap(), "false");
        assert_eq!(
            serde_json::to_string(&TocMode::Compressed).unwrap(),
            "\"compressed\""
        );
    }
}
