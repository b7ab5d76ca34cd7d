//! Scanned test identifiers.
//!
//! The orchestrator treats the codec as an opaque predicate/extractor pair:
//! it validates first and only extracts (and persists) when the scan is
//! valid. [`QrGuidCodec`] is the default grammar for QR codes printed on
//! test kits.

use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Default upper bound on the length of a scanned payload.
pub const DEFAULT_MAX_SCAN_LENGTH: usize = 150;

/// Default URL prefix in front of the GUID.
pub const DEFAULT_SCAN_PREFIX: &str = "https://localhost/?";

// Six hex hash digits in front of a hyphenated UUID.
const GUID_PATTERN: &str = concat!(
    "[0-9A-Fa-f]{6}-",
    "[0-9A-Fa-f]{8}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{12}",
);

/// Outcome of the last scan validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanStatus {
    /// No scan validated yet.
    #[default]
    Started,
    /// The scan contained a valid identifier, which was stored.
    Success,
    /// The scan did not match the grammar.
    Invalid,
}

/// Test identifier extracted from a scan.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TestGuid(String);

impl TestGuid {
    /// Wraps an identifier string as-is.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TestGuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validation grammar for scanned payloads.
pub trait IdentifierCodec: Send + Sync + fmt::Debug {
    /// Returns `true` if `text` carries a valid identifier.
    fn is_valid(&self, text: &str) -> bool;

    /// Extracts the identifier from `text`, or `None` if it is not valid.
    fn extract(&self, text: &str) -> Option<TestGuid>;
}

/// Matches `<prefix><hash6>-<uuid>` payloads up to a maximum length.
#[derive(Debug, Clone)]
pub struct QrGuidCodec {
    pattern: Regex,
    max_length: usize,
}

impl QrGuidCodec {
    /// Builds a codec for the given URL prefix and length limit.
    ///
    /// # Errors
    ///
    /// Returns an error if the resulting pattern exceeds the regex size
    /// limits.
    pub fn new(prefix: &str, max_length: usize) -> Result<Self, regex::Error> {
        let pattern = Regex::new(&format!(
            "^{}(?P<guid>{GUID_PATTERN})$",
            regex::escape(prefix)
        ))?;
        Ok(Self {
            pattern,
            max_length,
        })
    }
}

impl IdentifierCodec for QrGuidCodec {
    fn is_valid(&self, text: &str) -> bool {
        text.len() <= self.max_length && self.pattern.is_match(text)
    }

    fn extract(&self, text: &str) -> Option<TestGuid> {
        if text.len() > self.max_length {
            return None;
        }
        self.pattern
            .captures(text)
            .and_then(|caps| caps.name("guid"))
            .map(|guid| TestGuid::new(guid.as_str()))
    }
}
