//! Core types for the gitshelf object backend.
//!
//! These types form the vocabulary shared between the
//! [`ObjectStore`](crate::ObjectStore) trait and the shelf engine. They
//! contain no gix types; the backend is an implementation detail.

use std::fmt;
use std::str::FromStr;

use crate::error::GitError;

// ---------------------------------------------------------------------------
// GitOid
// ---------------------------------------------------------------------------

/// A git object identifier (SHA-1, 20 bytes).
///
/// Stored as raw bytes for efficient comparison, hashing, and Copy semantics.
/// Displays as 40 lowercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GitOid([u8; 20]);

impl GitOid {
    /// The zero OID (`0000...0000`).
    pub const ZERO: Self = Self([0; 20]);

    /// Create a `GitOid` from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Return the raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Return `true` if this is the zero OID.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Return `true` if `s` looks like a full hex object id.
    #[must_use]
    pub fn is_hex(s: &str) -> bool {
        s.len() == 40 && s.bytes().all(|b| hex_digit(b).is_some())
    }
}

impl fmt::Display for GitOid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for GitOid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GitOid({self})")
    }
}

impl FromStr for GitOid {
    type Err = OidParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 40 {
            return Err(OidParseError {
                value: s.to_owned(),
                reason: format!("expected 40 hex characters, got {}", s.len()),
            });
        }
        let mut bytes = [0u8; 20];
        for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
            let hi = hex_digit(chunk[0]).ok_or_else(|| OidParseError {
                value: s.to_owned(),
                reason: format!("invalid hex digit '{}'", chunk[0] as char),
            })?;
            let lo = hex_digit(chunk[1]).ok_or_else(|| OidParseError {
                value: s.to_owned(),
                reason: format!("invalid hex digit '{}'", chunk[1] as char),
            })?;
            bytes[i] = (hi << 4) | lo;
        }
        Ok(Self(bytes))
    }
}

/// Error from parsing a hex string into a [`GitOid`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OidParseError {
    /// The raw value that failed.
    pub value: String,
    /// Why it failed.
    pub reason: String,
}

impl fmt::Display for OidParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid OID {:?}: {}", self.value, self.reason)
    }
}

impl std::error::Error for OidParseError {}

impl From<OidParseError> for GitError {
    fn from(e: OidParseError) -> Self {
        Self::InvalidOid {
            value: e.value,
            reason: e.reason,
        }
    }
}

const fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        // Accept uppercase for leniency during parsing
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// RefName
// ---------------------------------------------------------------------------

/// A validated git ref name.
///
/// Must start with `refs/` or be `HEAD`, and must satisfy git's ref-format
/// rules for the characters and components it contains.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RefName(String);

const FORBIDDEN_REF_CHARS: &[char] = &[' ', '~', '^', ':', '?', '*', '[', '\\'];

impl RefName {
    /// Create a new `RefName`, validating that it looks like a git ref.
    ///
    /// # Errors
    /// Returns an error if the name is empty, doesn't start with `refs/`
    /// (and isn't `HEAD`), or violates git's ref-format rules.
    pub fn new(name: &str) -> Result<Self, RefNameError> {
        Self::validate(name)?;
        Ok(Self(name.to_owned()))
    }

    /// Build the branch ref `refs/heads/<name>`.
    ///
    /// # Errors
    /// Returns an error if the resulting ref name is invalid.
    pub fn branch(name: &str) -> Result<Self, RefNameError> {
        Self::new(&format!("refs/heads/{name}"))
    }

    /// Return the ref name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(name: &str) -> Result<(), RefNameError> {
        let reject = |reason: &str| {
            Err(RefNameError {
                value: name.to_owned(),
                reason: reason.to_owned(),
            })
        };
        if name.is_empty() {
            return reject("ref name must not be empty");
        }
        if name == "HEAD" {
            return Ok(());
        }
        if !name.starts_with("refs/") {
            return reject("ref name must start with 'refs/' or be HEAD");
        }
        if name.ends_with('/') || name.ends_with(".lock") || name.ends_with('.') {
            return reject("ref name must not end with '/', '.' or '.lock'");
        }
        if name.contains("..") || name.contains("@{") {
            return reject("ref name must not contain '..' or '@{'");
        }
        if name
            .chars()
            .any(|c| c.is_control() || FORBIDDEN_REF_CHARS.contains(&c))
        {
            return reject("ref name contains a forbidden character");
        }
        if name
            .split('/')
            .any(|component| component.is_empty() || component.starts_with('.'))
        {
            return reject("ref name components must be non-empty and not start with '.'");
        }
        Ok(())
    }
}

impl fmt::Display for RefName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RefName {
    type Err = RefNameError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Error from validating a [`RefName`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefNameError {
    /// The invalid value.
    pub value: String,
    /// Why it was rejected.
    pub reason: String,
}

impl fmt::Display for RefNameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid ref name {:?}: {}", self.value, self.reason)
    }
}

impl std::error::Error for RefNameError {}

impl From<RefNameError> for GitError {
    fn from(e: RefNameError) -> Self {
        Self::InvalidRefName {
            value: e.value,
            reason: e.reason,
        }
    }
}

// ---------------------------------------------------------------------------
// Objects
// ---------------------------------------------------------------------------

/// The kind of a git object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// Raw content.
    Blob,
    /// Directory listing.
    Tree,
    /// Snapshot with lineage metadata.
    Commit,
}

impl ObjectKind {
    /// The header word git uses for this kind (`blob`, `tree`, `commit`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Blob => "blob",
            Self::Tree => "tree",
            Self::Commit => "commit",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The file mode of a tree entry (analogous to `git ls-tree` mode column).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntryMode {
    /// Regular file (`100644`).
    Blob,
    /// Executable file (`100755`).
    BlobExecutable,
    /// Subdirectory (`40000`).
    Tree,
    /// Symbolic link (`120000`).
    Link,
    /// Gitlink / submodule (`160000`).
    Commit,
}

impl EntryMode {
    /// The octal mode string as git writes it inside tree objects.
    #[must_use]
    pub const fn as_octal(self) -> &'static str {
        match self {
            Self::Blob => "100644",
            Self::BlobExecutable => "100755",
            Self::Tree => "40000",
            Self::Link => "120000",
            Self::Commit => "160000",
        }
    }

    /// Parse the octal mode string of a tree entry.
    #[must_use]
    pub fn from_octal(s: &str) -> Option<Self> {
        match s {
            "100644" | "100664" => Some(Self::Blob),
            "100755" => Some(Self::BlobExecutable),
            "40000" | "040000" => Some(Self::Tree),
            "120000" => Some(Self::Link),
            "160000" => Some(Self::Commit),
            _ => None,
        }
    }

    /// Return `true` for subtree entries.
    #[must_use]
    pub const fn is_tree(self) -> bool {
        matches!(self, Self::Tree)
    }
}

impl fmt::Display for EntryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_octal())
    }
}

/// A single entry in a git tree object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeEntry {
    /// File or directory name (just the basename, not a full path).
    pub name: String,
    /// The entry mode.
    pub mode: EntryMode,
    /// The OID of the blob, tree, or commit this entry points to.
    pub oid: GitOid,
}

/// A point in time as recorded in a commit signature.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Timestamp {
    /// Seconds since the Unix epoch.
    pub seconds: i64,
    /// Offset from UTC in minutes (e.g. `-300` for UTC-05:00).
    pub offset_minutes: i32,
}

impl Timestamp {
    /// The current time, in UTC.
    #[must_use]
    pub fn now() -> Self {
        let seconds = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0, |d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX));
        Self {
            seconds,
            offset_minutes: 0,
        }
    }
}

/// Author or committer identity plus the time of the action.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Signature {
    /// Display name.
    pub name: String,
    /// Email address (without angle brackets).
    pub email: String,
    /// When the action happened.
    pub time: Timestamp,
}

/// A commit object: root tree, lineage, identities and message.
///
/// Written by [`ObjectStore::write_commit`](crate::ObjectStore::write_commit)
/// and returned by [`ObjectStore::read_commit`](crate::ObjectStore::read_commit).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitRecord {
    /// OID of the tree this commit points to.
    pub tree: GitOid,
    /// OIDs of parent commits (empty for root commits).
    pub parents: Vec<GitOid>,
    /// Who wrote the change.
    pub author: Signature,
    /// Who recorded the change.
    pub committer: Signature,
    /// The commit message, stored verbatim.
    pub message: String,
}

/// A decoded object as returned by
/// [`ObjectStore::read_object`](crate::ObjectStore::read_object).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Object {
    /// Blob bytes.
    Blob(Vec<u8>),
    /// Tree listing, in stored order.
    Tree(Vec<TreeEntry>),
    /// Commit record.
    Commit(CommitRecord),
}

impl Object {
    /// The kind of this object.
    #[must_use]
    pub const fn kind(&self) -> ObjectKind {
        match self {
            Self::Blob(_) => ObjectKind::Blob,
            Self::Tree(_) => ObjectKind::Tree,
            Self::Commit(_) => ObjectKind::Commit,
        }
    }
}

/// Result of [`ObjectStore::compare_and_swap_ref`](crate::ObjectStore::compare_and_swap_ref).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CasOutcome {
    /// The ref now points at the new value.
    Updated,
    /// The ref did not hold the expected value; it was left untouched.
    Conflict {
        /// The value observed instead (`None` if the ref does not exist).
        actual: Option<GitOid>,
    },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
