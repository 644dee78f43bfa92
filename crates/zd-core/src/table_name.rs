//! Validated table identifier.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

/// A table name, optionally schema-qualified (`schema.table`).
///
/// Every DDL statement that splices a table name into SQL text goes through
/// this type, so each dot-separated segment is restricted to
/// `[A-Za-z_][A-Za-z0-9_$]*`. The project segment of a three-part BigQuery
/// name (`my-project.dataset.table`) may also contain `-`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TableName(String);

impl TableName {
    /// Validate and wrap a table name.
    pub fn try_new(name: impl Into<String>) -> CoreResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(CoreError::InvalidIdentifier {
                name,
                reason: "name cannot be empty".to_string(),
            });
        }
        let segments: Vec<&str> = name.split('.').collect();
        for (i, segment) in segments.iter().enumerate() {
            let allow_dash = i == 0 && segments.len() == 3;
            if let Err(reason) = validate_segment(segment, allow_dash) {
                return Err(CoreError::InvalidIdentifier { name, reason });
            }
        }
        Ok(Self(name))
    }

    /// Return the underlying name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Schema qualifier, if the name has one.
    ///
    /// For three-part names (`project.dataset.table`) everything before the
    /// last dot is returned.
    pub fn schema(&self) -> Option<&str> {
        self.0.rfind('.').map(|pos| &self.0[..pos])
    }

    /// Unqualified table part.
    pub fn table(&self) -> &str {
        match self.0.rfind('.') {
            Some(pos) => &self.0[pos + 1..],
            None => &self.0,
        }
    }
}

/// Validate a single unqualified identifier such as a column name.
pub fn validate_identifier(name: &str) -> CoreResult<()> {
    validate_segment(name, false).map_err(|reason| CoreError::InvalidIdentifier {
        name: name.to_string(),
        reason,
    })
}

fn validate_segment(segment: &str, allow_dash: bool) -> Result<(), String> {
    let mut chars = segment.chars();
    match chars.next() {
        None => return Err("empty segment".to_string()),
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        Some(c) => return Err(format!("segment '{segment}' cannot start with '{c}'")),
    }
    let allowed =
        |c: char| c.is_ascii_alphanumeric() || c == '_' || c == '$' || (allow_dash && c == '-');
    if let Some(bad) = chars.find(|&c| !allowed(c)) {
        return Err(format!("character '{bad}' is not allowed"));
    }
    Ok(())
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TableName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for TableName {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TableName {
    type Error = CoreError;

    fn try_from(s: String) -> CoreResult<Self> {
        Self::try_new(s)
    }
}

impl TryFrom<&str> for TableName {
    type Error = CoreError;

    fn try_from(s: &str) -> CoreResult<Self> {
        Self::try_new(s)
    }
}

impl From<TableName> for String {
    fn from(name: TableName) -> Self {
        name.0
    }
}
