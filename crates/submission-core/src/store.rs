//! Persistent local store interface.
//!
//! The orchestrator never caches store values; every read goes through
//! [`SubmissionStore`]. Implementations serialize their own writes.

use std::fmt;
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scan::TestGuid;

/// Opaque token returned by device registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegistrationToken(String);

impl RegistrationToken {
    /// Wraps a token string.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The token text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Code shown to the user for this registration: the token's letters and
    /// digits, uppercased, in space-separated groups of four.
    #[must_use]
    pub fn ui_code(&self) -> String {
        let symbols: Vec<char> = self
            .0
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .map(|c| c.to_ascii_uppercase())
            .collect();
        symbols
            .chunks(UI_CODE_GROUP)
            .map(|group| group.iter().collect::<String>())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

const UI_CODE_GROUP: usize = 4;

impl fmt::Display for RegistrationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Device-local state shared by the submission flow.
pub trait SubmissionStore: Send + Sync + fmt::Debug {
    /// The registration token, present once the device is registered.
    fn registration_token(&self) -> Option<RegistrationToken>;
    /// Persists a registration token.
    fn set_registration_token(&self, token: RegistrationToken);
    /// Removes the registration token.
    fn delete_registration_token(&self);

    /// `t0` of the disclosure window.
    fn window_start(&self) -> Option<DateTime<Utc>>;
    /// `t3` of the disclosure window.
    fn window_end(&self) -> Option<DateTime<Utc>>;
    /// Persists both window bounds.
    fn set_window(&self, start: DateTime<Utc>, end: DateTime<Utc>);

    /// Whether the device may submit keys.
    fn allowed_to_submit(&self) -> bool;
    /// Sets the allowed-to-submit flag.
    fn set_allowed_to_submit(&self, allowed: bool);

    /// When the first test result was received; the epoch if never.
    fn initial_result_timestamp(&self) -> DateTime<Utc>;
    /// Sets the initial-result timestamp.
    fn set_initial_result_timestamp(&self, at: DateTime<Utc>);

    /// The scanned test identifier awaiting registration.
    fn test_identifier(&self) -> Option<TestGuid>;
    /// Persists a scanned test identifier.
    fn store_test_identifier(&self, id: TestGuid);
    /// Removes the scanned test identifier.
    fn delete_test_identifier(&self);

    /// Number of successful submissions recorded.
    fn successful_submissions(&self) -> u32;
    /// Records one successful submission.
    fn mark_submission_successful(&self);
}

/// Snapshot of everything an [`InMemoryStore`] holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    /// Registration token.
    pub registration_token: Option<RegistrationToken>,
    /// `t0`.
    pub window_start: Option<DateTime<Utc>>,
    /// `t3`.
    pub window_end: Option<DateTime<Utc>>,
    /// Allowed-to-submit flag.
    pub allowed_to_submit: bool,
    /// Initial-result timestamp.
    pub initial_result_timestamp: DateTime<Utc>,
    /// Scanned test identifier.
    pub test_identifier: Option<TestGuid>,
    /// Successful submission count.
    pub successful_submissions: u32,
}

impl Default for StoreSnapshot {
    fn default() -> Self {
        Self {
            registration_token: None,
            window_start: None,
            window_end: None,
            allowed_to_submit: false,
            initial_result_timestamp: DateTime::UNIX_EPOCH,
            test_identifier: None,
            successful_submissions: 0,
        }
    }
}

/// Thread-safe in-memory [`SubmissionStore`].
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: RwLock<StoreSnapshot>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded with `snapshot`.
    #[must_use]
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        Self {
            inner: RwLock::new(snapshot),
        }
    }

    /// Copies the current contents.
    #[must_use]
    pub fn snapshot(&self) -> StoreSnapshot {
        self.read(StoreSnapshot::clone)
    }

    fn read<R>(&self, f: impl FnOnce(&StoreSnapshot) -> R) -> R {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f(&*guard)
    }

    fn write(&self, f: impl FnOnce(&mut StoreSnapshot)) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut *guard);
    }
}

impl SubmissionStore for InMemoryStore {
    fn registration_token(&self) -> Option<RegistrationToken> {
        self.read(|s| s.registration_token.clone())
    }

    fn set_registration_token(&self, token: RegistrationToken) {
        self.write(|s| s.registration_token = Some(token));
    }

    fn delete_registration_token(&self) {
        self.write(|s| s.registration_token = None);
    }

    fn window_start(&self) -> Option<DateTime<Utc>> {
        self.read(|s| s.window_start)
    }

    fn window_end(&self) -> Option<DateTime<Utc>> {
        self.read(|s| s.window_end)
    }

    fn set_window(&self, start: DateTime<Utc>, end: DateTime<Utc>) {
        self.write(|s| {
            s.window_start = Some(start);
            s.window_end = Some(end);
        });
    }

    fn allowed_to_submit(&self) -> bool {
        self.read(|s| s.allowed_to_submit)
    }

    fn set_allowed_to_submit(&self, allowed: bool) {
        self.write(|s| s.allowed_to_submit = allowed);
    }

    fn initial_result_timestamp(&self) -> DateTime<Utc> {
        self.read(|s| s.initial_result_timestamp)
    }

    fn set_initial_result_timestamp(&self, at: DateTime<Utc>) {
        self.write(|s| s.initial_result_timestamp = at);
    }

    fn test_identifier(&self) -> Option<TestGuid> {
        self.read(|s| s.test_identifier.clone())
    }

    fn store_test_identifier(&self, id: TestGuid) {
        self.write(|s| s.test_identifier = Some(id));
    }

    fn delete_test_identifier(&self) {
        self.write(|s| s.test_identifier = None);
    }

    fn successful_submissions(&self) -> u32 {
        self.read(|s| s.successful_submissions)
    }

    fn mark_submission_successful(&self) {
        self.write(|s| s.successful_submissions = s.successful_submissions.saturating_add(1));
    }
}
