//! Reference store configuration.

use serde::{Deserialize, Serialize};

use refdb_types::{HashKind, Signature};

use crate::error::{RefError, Result};
use crate::types::{HEAD, HEADS_PREFIX, NOTES_PREFIX, REMOTES_PREFIX};

/// Which references get a reflog entry when they change.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogUpdates {
    /// Only references that already have a log.
    Never,
    /// `HEAD`, branches, remote-tracking refs, notes, and anything with a log.
    #[default]
    Normal,
    /// Every reference.
    Always,
}

impl LogUpdates {
    /// Whether the policy alone asks for `name` to be logged.
    pub fn covers(&self, name: &str) -> bool {
        match self {
            Self::Never => false,
            Self::Normal => {
                name == HEAD
                    || name.starts_with(HEADS_PREFIX)
                    || name.starts_with(REMOTES_PREFIX)
                    || name.starts_with(NOTES_PREFIX)
            }
            Self::Always => true,
        }
    }
}

/// Identity recorded in reflog entries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitterConfig {
    pub name: String,
    pub email: String,
}

impl CommitterConfig {
    /// A signature for this identity stamped with the current time.
    pub fn signature(&self) -> Signature {
        Signature::now(self.name.clone(), self.email.clone())
    }
}

impl Default for CommitterConfig {
    fn default() -> Self {
        Self {
            name: "unknown".into(),
            email: "unknown@localhost".into(),
        }
    }
}

/// Configuration for a [`RefStore`](crate::RefStore).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Reflog policy.
    pub log_updates: LogUpdates,
    /// Maximum symbolic hops followed by `resolve` (default: 5).
    pub max_symbolic_depth: usize,
    /// Fail shorthand lookups that match more than one reference instead of
    /// taking the first match in precedence order.
    pub strict_shorthand: bool,
    /// Accept lowercase one-level names such as `stash`.
    pub allow_one_level: bool,
    /// Hash width of the repository; used for null ids in reflog entries.
    pub object_format: HashKind,
    /// Identity written into reflog entries.
    pub committer: CommitterConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            log_updates: LogUpdates::default(),
            max_symbolic_depth: 5,
            strict_shorthand: false,
            allow_one_level: false,
            object_format: HashKind::Blake3,
            committer: CommitterConfig::default(),
        }
    }
}

impl StoreConfig {
    /// Parse from TOML; missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| RefError::Config(e.to_string()))
    }
}
