//! Correlation identifiers.
//!
//! A `CorrelationId` names a queue item for its whole life: the file stem in
//! every lifecycle directory, the response artifact key, and the notification
//! pointer name. Because it ends up in file names it is validated on
//! construction instead of being an arbitrary `String`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::errors::QueueError;

/// Identifier linking a request to its terminal outcome and response.
///
/// Allowed characters: ASCII alphanumerics, `-`, `_` and `.`; the first
/// character must not be `.` (dot files are reserved for temp and staging
/// files and are skipped by every listing).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CorrelationId(String);

/// Upper bound keeps `<id>.<ext>` well inside common NAME_MAX limits.
const MAX_LEN: usize = 128;

impl CorrelationId {
    pub fn new(value: impl Into<String>) -> Result<Self, QueueError> {
        let value = value.into();
        validate(&value)?;
        Ok(Self(value))
    }

    /// For generators whose output format is valid by construction.
    pub(crate) fn from_generated(value: String) -> Self {
        debug_assert!(validate(&value).is_ok(), "generated invalid id {value:?}");
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name of this id under a lifecycle directory.
    pub fn file_name(&self, ext: &str) -> String {
        format!("{}.{}", self.0, ext)
    }

    /// Recover an id from a directory entry name (`<id>.<ext>`).
    ///
    /// Returns `None` for hidden files, foreign extensions and names that do
    /// not form a valid id.
    pub fn from_file_name(name: &str, ext: &str) -> Option<Self> {
        if name.starts_with('.') {
            return None;
        }
        let stem = name.strip_suffix(ext)?.strip_suffix('.')?;
        Self::new(stem).ok()
    }
}

fn validate(value: &str) -> Result<(), QueueError> {
    if value.is_empty() {
        return Err(QueueError::InvalidId("empty id".to_string()));
    }
    if value.len() > MAX_LEN {
        return Err(QueueError::InvalidId(format!(
            "id longer than {MAX_LEN} bytes"
        )));
    }
    if value.starts_with('.') {
        return Err(QueueError::InvalidId(format!("{value:?} starts with '.'")));
    }
    if let Some(bad) = value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(QueueError::InvalidId(format!(
            "{value:?} contains {bad:?}"
        )));
    }
    Ok(())
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CorrelationId {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for CorrelationId {
    type Error = QueueError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CorrelationId> for String {
    fn from(id: CorrelationId) -> Self {
        id.0
    }
}

impl AsRef<str> for CorrelationId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
