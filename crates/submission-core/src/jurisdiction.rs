//! Jurisdictions (countries) keys can be attributed to.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A country identified by its ISO 3166 codes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Jurisdiction {
    /// Two-letter code.
    pub code2: String,
    /// Three-letter code used for resolution.
    pub code3: String,
    /// Display name.
    pub name: String,
}

impl Jurisdiction {
    /// Creates a new jurisdiction.
    #[must_use]
    pub fn new(code2: impl Into<String>, code3: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code2: code2.into(),
            code3: code3.into(),
            name: name.into(),
        }
    }
}

/// Source of the canonical jurisdiction list.
pub trait JurisdictionSource: Send + Sync + std::fmt::Debug {
    /// Returns the jurisdictions in display order.
    fn list(&self) -> Vec<Jurisdiction>;
}

/// Errors loading a jurisdiction list.
#[derive(Debug, Error)]
pub enum JurisdictionError {
    /// Reading the list failed.
    #[error("failed to read jurisdiction list: {0}")]
    Io(#[from] std::io::Error),

    /// The list is not valid JSON.
    #[error("failed to parse jurisdiction list: {0}")]
    Parse(#[from] serde_json::Error),

    /// The list has no entries.
    #[error("jurisdiction list is empty")]
    Empty,
}

/// A fixed jurisdiction list, loaded once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticJurisdictions {
    entries: Vec<Jurisdiction>,
}

impl StaticJurisdictions {
    /// Wraps an in-memory list.
    #[must_use]
    pub const fn new(entries: Vec<Jurisdiction>) -> Self {
        Self { entries }
    }

    /// Parses a JSON array of `{"code2", "code3", "name"}` objects.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or the array is empty.
    pub fn from_json(content: &str) -> Result<Self, JurisdictionError> {
        let entries: Vec<Jurisdiction> = serde_json::from_str(content)?;
        if entries.is_empty() {
            return Err(JurisdictionError::Empty);
        }
        Ok(Self::new(entries))
    }

    /// Loads a JSON list from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, JurisdictionError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Looks up a jurisdiction by three-letter code.
    #[must_use]
    pub fn find(&self, code3: &str) -> Option<&Jurisdiction> {
        self.entries.iter().find(|j| j.code3 == code3)
    }
}

impl JurisdictionSource for StaticJurisdictions {
    fn list(&self) -> Vec<Jurisdiction> {
        self.entries.clone()
    }
}
