//! List preferences model

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Contact field the list is sorted by
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SortField {
    #[default]
    Name,
    Phone,
    CreatedAt,
    UpdatedAt,
    /// Unrecognized field name; compares as empty strings
    Other(String),
}

impl SortField {
    /// Field name as understood by the backend
    pub fn as_str(&self) -> &str {
        match self {
            Self::Name => "name",
            Self::Phone => "phone",
            Self::CreatedAt => "createdAt",
            Self::UpdatedAt => "updatedAt",
            Self::Other(name) => name,
        }
    }
}

impl From<String> for SortField {
    fn from(value: String) -> Self {
        match value.trim() {
            "name" => Self::Name,
            "phone" => Self::Phone,
            "createdAt" | "created_at" => Self::CreatedAt,
            "updatedAt" | "updated_at" => Self::UpdatedAt,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<SortField> for String {
    fn from(field: SortField) -> Self {
        field.as_str().to_string()
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(Error::InvalidInput(format!(
                "sort order must be asc or desc, got '{other}'"
            ))),
        }
    }
}

/// Session-scoped list preferences, persisted through the local store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    /// Case-insensitive substring matched against name or phone
    pub search: String,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
}

impl Preferences {
    /// Whether a non-blank search term is set
    pub fn search_active(&self) -> bool {
        !self.search.trim().is_empty()
    }

    /// Trimmed search term, `None` when inactive
    pub fn search_term(&self) -> Option<&str> {
        let term = self.search.trim();
        (!term.is_empty()).then_some(term)
    }
}
