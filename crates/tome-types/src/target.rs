use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// How a cached tree is projected into a user-chosen target directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetMode {
    Symlink,
    Copy,
}

impl TargetMode {
    /// The platform default: symlinks everywhere except Windows, where
    /// creating them commonly requires elevation.
    pub fn os_default() -> Self {
        if cfg!(windows) {
            Self::Copy
        } else {
            Self::Symlink
        }
    }
}

impl Display for TargetMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Symlink => f.write_str("symlink"),
            Self::Copy => f.write_str("copy"),
        }
    }
}
