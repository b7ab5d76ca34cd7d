//! Configuration parsing.
//!
//! Submission settings are read from a TOML file:
//!
//! ```toml
//! target_jurisdiction = "BEL"
//! log_filter = "submission_core=debug"
//! jurisdictions_file = "/etc/submission/countries.json"
//!
//! [scan]
//! max_length = 150
//! url_prefix = "https://localhost/?"
//! ```
//!
//! Every key is optional; unknown keys are rejected.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::jurisdiction::{JurisdictionError, StaticJurisdictions};
use crate::scan::{DEFAULT_MAX_SCAN_LENGTH, DEFAULT_SCAN_PREFIX, QrGuidCodec};
use crate::telemetry;

/// Jurisdiction keys are attributed to unless configured otherwise.
pub const DEFAULT_TARGET_JURISDICTION: &str = "BEL";

/// Top-level submission configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubmissionConfig {
    /// Three-letter code of the jurisdiction keys are paired with.
    #[serde(default = "default_target_jurisdiction")]
    pub target_jurisdiction: String,

    /// `tracing` filter directive used by [`crate::telemetry::init_tracing`].
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    /// Optional JSON file with the jurisdiction list.
    #[serde(default)]
    pub jurisdictions_file: Option<PathBuf>,

    /// Scan codec settings.
    #[serde(default)]
    pub scan: ScanConfig,
}

fn default_target_jurisdiction() -> String {
    DEFAULT_TARGET_JURISDICTION.to_string()
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            target_jurisdiction: default_target_jurisdiction(),
            log_filter: default_log_filter(),
            jurisdictions_file: None,
            scan: ScanConfig::default(),
        }
    }
}

impl SubmissionConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or a value fails validation.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Loads the configured jurisdiction list, or `None` if no file is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn jurisdictions(&self) -> Result<Option<StaticJurisdictions>, JurisdictionError> {
        self.jurisdictions_file
            .as_deref()
            .map(StaticJurisdictions::from_file)
            .transpose()
    }

    /// Installs the global tracing subscriber with [`Self::log_filter`].
    ///
    /// Returns `false` if a subscriber was already installed.
    pub fn init_tracing(&self) -> bool {
        telemetry::init_tracing(&self.log_filter)
    }

    /// Checks value constraints serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let code = &self.target_jurisdiction;
        if code.len() != 3 || !code.bytes().all(|b| b.is_ascii_uppercase()) {
            return Err(ConfigError::Validation(format!(
                "target_jurisdiction must be three uppercase letters, got '{code}'"
            )));
        }
        if self.scan.max_length == 0 {
            return Err(ConfigError::Validation(
                "scan.max_length must be greater than zero".to_string(),
            ));
        }
        if self.scan.url_prefix.len() >= self.scan.max_length {
            return Err(ConfigError::Validation(format!(
                "scan.url_prefix ({} bytes) leaves no room within scan.max_length ({})",
                self.scan.url_prefix.len(),
                self.scan.max_length
            )));
        }
        Ok(())
    }
}

/// Settings for the default scan codec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScanConfig {
    /// Longest accepted payload.
    #[serde(default = "default_max_length")]
    pub max_length: usize,

    /// Literal prefix in front of the identifier.
    #[serde(default = "default_url_prefix")]
    pub url_prefix: String,
}

const fn default_max_length() -> usize {
    DEFAULT_MAX_SCAN_LENGTH
}

fn default_url_prefix() -> String {
    DEFAULT_SCAN_PREFIX.to_string()
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_length: default_max_length(),
            url_prefix: default_url_prefix(),
        }
    }
}

impl ScanConfig {
    /// Builds the codec these settings describe.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if the pattern cannot be compiled.
    pub fn codec(&self) -> Result<QrGuidCodec, ConfigError> {
        QrGuidCodec::new(&self.url_prefix, self.max_length)
            .map_err(|err| ConfigError::Validation(format!("scan pattern: {err}")))
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error reading configuration file.
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Validation error.
    #[error("configuration validation failed: {0}")]
    Validation(String),
}
