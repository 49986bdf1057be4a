//! Slash-delimited entry paths.
//!
//! A [`ShelfPath`] is a non-empty sequence of entry names. Each name is
//! non-empty and contains neither `/` nor NUL; `.` and `..` are rejected as
//! well because git refuses them inside trees.

use std::fmt;

use crate::error::{Result, ShelfError};

/// A validated path into a namespace.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShelfPath {
    components: Vec<String>,
}

impl ShelfPath {
    /// Parse a slash-delimited path such as `"foo/bar/git.c"`.
    ///
    /// # Errors
    /// Returns [`ShelfError::InvalidPath`] for the empty path, empty
    /// components (`a//b`, leading or trailing `/`), or invalid names.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(ShelfError::invalid_path(raw, "path is empty"));
        }
        let components = raw
            .split('/')
            .map(|name| validate_name(name).map(|()| name.to_owned()))
            .collect::<Result<Vec<_>>>()
            .map_err(|e| match e {
                ShelfError::InvalidPath { reason, .. } => ShelfError::invalid_path(raw, reason),
                other => other,
            })?;
        Ok(Self { components })
    }

    /// Build a path from already separated names.
    ///
    /// # Errors
    /// Returns [`ShelfError::InvalidPath`] if `names` is empty or any name is
    /// invalid.
    pub fn from_components<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let components: Vec<String> = names.into_iter().map(Into::into).collect();
        if components.is_empty() {
            return Err(ShelfError::invalid_path("", "path is empty"));
        }
        for name in &components {
            validate_name(name)?;
        }
        Ok(Self { components })
    }

    /// The individual entry names, root first.
    #[must_use]
    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// The final component.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.components.last().map_or("", String::as_str)
    }

    /// The path without its final component, as a slice of names.
    #[must_use]
    pub fn parent_components(&self) -> &[String] {
        &self.components[..self.components.len().saturating_sub(1)]
    }
}

impl fmt::Display for ShelfPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.components.join("/"))
    }
}

impl std::str::FromStr for ShelfPath {
    type Err = ShelfError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Check a single entry name.
///
/// # Errors
/// Returns [`ShelfError::InvalidPath`] if the name is empty, is `.` or `..`,
/// or contains `/` or NUL.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ShelfError::invalid_path(name, "empty path component"));
    }
    if name == "." || name == ".." {
        return Err(ShelfError::invalid_path(name, "relative path component"));
    }
    if name.contains(['/', '\0']) {
        return Err(ShelfError::invalid_path(
            name,
            "entry name contains '/' or NUL",
        ));
    }
    Ok(())
}
