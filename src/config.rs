//! Shelf configuration (`gitshelf.toml`).
//!
//! Every field has a default, and a missing file yields all defaults:
//!
//! ```toml
//! [shelf]
//! branch = "main"
//! keep_history = true
//!
//! [identity]
//! name = "gitshelf"
//! email = "gitshelf@localhost"
//!
//! [commit]
//! on_conflict = "fail"   # or "replay"
//! max_retries = 3
//! ```

use std::fmt;
use std::path::Path;

use serde::Deserialize;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level shelf configuration.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ShelfConfig {
    /// Which history pointer to use and whether to keep lineage.
    #[serde(default)]
    pub shelf: ShelfSection,

    /// Author and committer recorded on new snapshots.
    #[serde(default)]
    pub identity: Identity,

    /// Commit behaviour.
    #[serde(default)]
    pub commit: CommitConfig,
}

// ---------------------------------------------------------------------------
// ShelfSection
// ---------------------------------------------------------------------------

/// History pointer settings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShelfSection {
    /// Branch name (`"main"`) or full ref (`"refs/shelves/cache"`).
    #[serde(default = "default_branch")]
    pub branch: String,

    /// When false every snapshot is written without parents, so only the
    /// latest state is reachable.
    #[serde(default = "default_keep_history")]
    pub keep_history: bool,
}

impl Default for ShelfSection {
    fn default() -> Self {
        Self {
            branch: default_branch(),
            keep_history: default_keep_history(),
        }
    }
}

fn default_branch() -> String {
    "main".to_owned()
}

const fn default_keep_history() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Name and email stamped on snapshots.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Identity {
    /// Display name.
    #[serde(default = "default_name")]
    pub name: String,

    /// Email address, without angle brackets.
    #[serde(default = "default_email")]
    pub email: String,
}

impl Default for Identity {
    fn default() -> Self {
        Self {
            name: default_name(),
            email: default_email(),
        }
    }
}

fn default_name() -> String {
    "gitshelf".to_owned()
}

fn default_email() -> String {
    "gitshelf@localhost".to_owned()
}

// ---------------------------------------------------------------------------
// CommitConfig
// ---------------------------------------------------------------------------

/// What a shelf does when its history pointer moved underneath it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictPolicy {
    /// Surface the conflict to the caller.
    #[default]
    Fail,
    /// Reload the new head, re-apply pending edits and try again.
    Replay,
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fail => write!(f, "fail"),
            Self::Replay => write!(f, "replay"),
        }
    }
}

/// Commit settings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommitConfig {
    /// Conflict handling (default: `fail`).
    #[serde(default)]
    pub on_conflict: ConflictPolicy,

    /// How many replays to attempt before giving up (default: 3).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for CommitConfig {
    fn default() -> Self {
        Self {
            on_conflict: ConflictPolicy::default(),
            max_retries: default_max_retries(),
        }
    }
}

const fn default_max_retries() -> u32 {
    3
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Error loading or parsing a configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    /// The path that was being loaded (if available).
    pub path: Option<std::path::PathBuf>,
    /// Human-readable message with line-level detail when possible.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(p) = &self.path {
            write!(f, "{}: {}", p.display(), self.message)
        } else {
            write!(f, "config error: {}", self.message)
        }
    }
}

impl std::error::Error for ConfigError {}

impl ShelfConfig {
    /// Load configuration from a TOML file.
    ///
    /// A missing file yields all defaults.
    ///
    /// # Errors
    /// Returns `ConfigError` on I/O errors (other than not-found), invalid
    /// TOML or unknown fields.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError {
                    path: Some(path.to_owned()),
                    message: format!("could not read file: {e}"),
                });
            }
        };
        Self::parse(&contents).map_err(|mut e| {
            e.path = Some(path.to_owned());
            e
        })
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `ConfigError` on invalid TOML or unknown fields.
    pub fn parse(toml_str: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|e| {
            let mut message = e.message().to_owned();
            if let Some(span) = e.span() {
                let line = toml_str[..span.start]
                    .chars()
                    .filter(|&c| c == '\n')
                    .count()
                    + 1;
                message = format!("line {line}: {message}");
            }
            ConfigError {
                path: None,
                message,
            }
        })
    }

    /// Same configuration, using `branch` as the history pointer.
    #[must_use]
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.shelf.branch = branch.into();
        self
    }

    /// Same configuration, with the given conflict policy.
    #[must_use]
    pub const fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.commit.on_conflict = policy;
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
