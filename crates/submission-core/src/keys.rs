//! Exposure keys and the disclosure-window filter.
//!
//! A key is eligible for submission if its rolling start interval lies in
//! the half-open window `[t0, t3)`. Eligible keys are paired with the target
//! jurisdiction before submission.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

use crate::jurisdiction::Jurisdiction;

/// Length of one rolling interval in seconds.
pub const ROLLING_INTERVAL_SECS: i64 = 600;

/// Rolling period of a key that is valid for one full day.
pub const DEFAULT_ROLLING_PERIOD: u32 = 144;

/// A temporary exposure key collected on the device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExposureKey {
    /// Opaque key material.
    pub key_data: Vec<u8>,
    /// First rolling interval this key was valid for.
    pub rolling_start_interval_number: u32,
    /// Number of rolling intervals the key was valid for.
    #[serde(default = "default_rolling_period")]
    pub rolling_period: u32,
    /// Transmission risk level assigned by the device.
    #[serde(default)]
    pub transmission_risk_level: u8,
}

const fn default_rolling_period() -> u32 {
    DEFAULT_ROLLING_PERIOD
}

impl ExposureKey {
    /// Creates a key with the default rolling period and risk level.
    #[must_use]
    pub fn new(key_data: impl Into<Vec<u8>>, rolling_start_interval_number: u32) -> Self {
        Self {
            key_data: key_data.into(),
            rolling_start_interval_number,
            rolling_period: DEFAULT_ROLLING_PERIOD,
            transmission_risk_level: 0,
        }
    }
}

/// A key paired with the jurisdiction it is submitted for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyJurisdictionPair {
    /// The exposure key.
    pub key: ExposureKey,
    /// The jurisdiction the key is attributed to.
    pub jurisdiction: Jurisdiction,
}

/// Which bound of a disclosure window is meant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowBound {
    /// `t0`, inclusive.
    Start,
    /// `t3`, exclusive.
    End,
}

impl std::fmt::Display for WindowBound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Start => write!(f, "t0"),
            Self::End => write!(f, "t3"),
        }
    }
}

/// Errors raised while preparing keys for submission.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    /// A window bound has not been persisted. Precondition violation.
    #[error("disclosure window bound {bound} is not set")]
    MissingWindowBound {
        /// The missing bound.
        bound: WindowBound,
    },

    /// The target jurisdiction is absent from the canonical list.
    #[error("jurisdiction '{code}' not found in jurisdiction list")]
    JurisdictionNotFound {
        /// The three-letter code that was looked up.
        code: String,
    },
}

/// Disclosure window `[t0, t3)` in rolling interval numbers.
///
/// Either bound may be absent until the store has received it; filtering
/// requires both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DisclosureWindow {
    /// `t0`, inclusive.
    pub start: Option<u32>,
    /// `t3`, exclusive.
    pub end: Option<u32>,
}

impl DisclosureWindow {
    /// Creates a window with both bounds set.
    #[must_use]
    pub const fn new(start: u32, end: u32) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    /// Builds a window from persisted timestamps.
    #[must_use]
    pub fn from_timestamps(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self {
            start: start.map(rolling_interval_number),
            end: end.map(rolling_interval_number),
        }
    }

    /// Returns both bounds.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::MissingWindowBound`] if either bound is absent.
    pub const fn bounds(&self) -> Result<(u32, u32), FilterError> {
        match (self.start, self.end) {
            (Some(start), Some(end)) => Ok((start, end)),
            (None, _) => Err(FilterError::MissingWindowBound {
                bound: WindowBound::Start,
            }),
            (Some(_), None) => Err(FilterError::MissingWindowBound {
                bound: WindowBound::End,
            }),
        }
    }
}

/// Converts a timestamp to the rolling interval that contains it.
///
/// Timestamps before the epoch map to interval 0; timestamps past the `u32`
/// range saturate.
#[must_use]
pub fn rolling_interval_number(at: DateTime<Utc>) -> u32 {
    let interval = at.timestamp().div_euclid(ROLLING_INTERVAL_SECS).max(0);
    u32::try_from(interval).unwrap_or(u32::MAX)
}

/// Selects the keys inside `window` and pairs each with the jurisdiction
/// whose three-letter code is `target_code`.
///
/// Both checks run before any key is examined: the window must have both
/// bounds and the target must be present in `jurisdictions`. The returned
/// iterator is lazy and keeps input order; duplicates are kept.
///
/// # Errors
///
/// - [`FilterError::MissingWindowBound`] if `t0` or `t3` is absent.
/// - [`FilterError::JurisdictionNotFound`] if `target_code` is not listed.
pub fn filter_keys<I>(
    keys: I,
    window: &DisclosureWindow,
    jurisdictions: &[Jurisdiction],
    target_code: &str,
) -> Result<impl Iterator<Item = KeyJurisdictionPair> + use<I>, FilterError>
where
    I: IntoIterator<Item = ExposureKey>,
{
    let (start, end) = window.bounds().inspect_err(|err| {
        error!(error = %err, "cannot filter keys without a complete disclosure window");
    })?;

    let Some(target) = jurisdictions.iter().find(|j| j.code3 == target_code) else {
        error!(
            code = target_code,
            available = jurisdictions.len(),
            "target jurisdiction missing from canonical list"
        );
        return Err(FilterError::JurisdictionNotFound {
            code: target_code.to_string(),
        });
    };
    let target = target.clone();

    Ok(keys
        .into_iter()
        .filter(move |key| (start..end).contains(&key.rolling_start_interval_number))
        .map(move |key| KeyJurisdictionPair {
            key,
            jurisdiction: target.clone(),
        }))
}
