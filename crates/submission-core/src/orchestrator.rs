//! Submission orchestrator.
//!
//! Composes the action runner, key-window filter and scan codec into the
//! operations of the submission flow. Long-running operations are launched on
//! the caller's [`TaskScope`] and report through their own [`ActionSlot`]:
//!
//! | Operation                  | Slot                      | Internal faults |
//! |----------------------------|---------------------------|-----------------|
//! | [`register_device`]        | `registration`            | `Failed`        |
//! | [`submit_keys`]            | `submission`              | `Failed`        |
//! | [`submit_key_pairs`]       | `jurisdiction_submission` | `Failed`        |
//! | [`refresh_status`]         | `status_refresh`          | unchanged       |
//!
//! Refresh forwards only direct web faults; a transaction fault is internal
//! there even when a web fault caused it.
//!
//! Key preparation, scan validation and deregistration run synchronously on
//! the caller's thread.
//!
//! [`register_device`]: SubmissionOrchestrator::register_device
//! [`submit_keys`]: SubmissionOrchestrator::submit_keys
//! [`submit_key_pairs`]: SubmissionOrchestrator::submit_key_pairs
//! [`refresh_status`]: SubmissionOrchestrator::refresh_status

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::action::{ActionRunner, ActionSlot, FailurePolicy, TaskScope};
use crate::client::RemoteSubmissionClient;
use crate::diagnostics::DiagnosticsSink;
use crate::event::OneShotEvent;
use crate::fault::Fault;
use crate::jurisdiction::{Jurisdiction, JurisdictionSource};
use crate::keys::{DisclosureWindow, ExposureKey, FilterError, KeyJurisdictionPair, filter_keys};
use crate::scan::{IdentifierCodec, ScanStatus};
use crate::status::{DeviceUiState, StatusRepository};
use crate::store::{RegistrationToken, SubmissionStore};

/// External collaborators the orchestrator drives.
#[derive(Debug, Clone)]
pub struct Collaborators {
    /// Remote submission service.
    pub client: Arc<dyn RemoteSubmissionClient>,
    /// Persistent local store.
    pub store: Arc<dyn SubmissionStore>,
    /// Device status repository.
    pub status: Arc<dyn StatusRepository>,
    /// Canonical jurisdiction list.
    pub jurisdictions: Arc<dyn JurisdictionSource>,
    /// Scan validation grammar.
    pub codec: Arc<dyn IdentifierCodec>,
    /// Sink for internal fault reports.
    pub diagnostics: Arc<dyn DiagnosticsSink>,
}

/// Drives the submission flow and exposes its observable state.
#[derive(Debug)]
pub struct SubmissionOrchestrator {
    runner: ActionRunner,
    client: Arc<dyn RemoteSubmissionClient>,
    store: Arc<dyn SubmissionStore>,
    status: Arc<dyn StatusRepository>,
    jurisdictions: Arc<dyn JurisdictionSource>,
    codec: Arc<dyn IdentifierCodec>,
    target_jurisdiction: String,

    registration: Arc<ActionSlot>,
    submission: Arc<ActionSlot>,
    jurisdiction_submission: Arc<ActionSlot>,
    status_refresh: Arc<ActionSlot>,
    scan_status: watch::Sender<OneShotEvent<ScanStatus>>,
    key_pairs: watch::Sender<Vec<KeyJurisdictionPair>>,
    test_result_received: watch::Sender<DateTime<Utc>>,
    new_test_for_confirmation: AtomicBool,
}

impl SubmissionOrchestrator {
    /// Creates an orchestrator launching its actions on `scope` and pairing
    /// keys with the jurisdiction whose three-letter code is
    /// `target_jurisdiction`.
    #[must_use]
    pub fn new(
        scope: Arc<TaskScope>,
        collaborators: Collaborators,
        target_jurisdiction: impl Into<String>,
    ) -> Self {
        let Collaborators {
            client,
            store,
            status,
            jurisdictions,
            codec,
            diagnostics,
        } = collaborators;
        let (scan_status, _) = watch::channel(OneShotEvent::new(ScanStatus::Started));
        let (key_pairs, _) = watch::channel(Vec::new());
        let (test_result_received, _) = watch::channel(store.initial_result_timestamp());

        Self {
            runner: ActionRunner::new(scope, diagnostics),
            client,
            store,
            status,
            jurisdictions,
            codec,
            target_jurisdiction: target_jurisdiction.into(),
            registration: Arc::new(ActionSlot::new("registration")),
            submission: Arc::new(ActionSlot::new("submission")),
            jurisdiction_submission: Arc::new(ActionSlot::new("jurisdiction_submission")),
            status_refresh: Arc::new(ActionSlot::new("status_refresh")),
            scan_status,
            key_pairs,
            test_result_received,
            new_test_for_confirmation: AtomicBool::new(false),
        }
    }

    /// Registers this device for the stored test identifier.
    ///
    /// On success the issued token is persisted and the redeemed test
    /// identifier is removed.
    pub fn register_device(&self) -> Option<JoinHandle<()>> {
        let client = Arc::clone(&self.client);
        let store = Arc::clone(&self.store);
        self.runner
            .run(&self.registration, FailurePolicy::AlwaysFail, async move {
                let test_id = store
                    .test_identifier()
                    .ok_or_else(|| Fault::unclassified("no test identifier stored"))?;
                let token = client.register_device(&test_id).await?;
                store.set_registration_token(token);
                store.delete_test_identifier();
                info!("device registered");
                Ok(())
            })
    }

    /// Uploads keys without jurisdiction attribution.
    pub fn submit_keys(&self, keys: Vec<ExposureKey>) -> Option<JoinHandle<()>> {
        let client = Arc::clone(&self.client);
        let store = Arc::clone(&self.store);
        self.runner
            .run(&self.submission, FailurePolicy::AlwaysFail, async move {
                let token = require_token(store.as_ref())?;
                let count = keys.len();
                client.submit_keys(&token, keys).await?;
                store.mark_submission_successful();
                info!(keys = count, "keys submitted");
                Ok(())
            })
    }

    /// Uploads keys paired with their jurisdiction.
    pub fn submit_key_pairs(&self, pairs: Vec<KeyJurisdictionPair>) -> Option<JoinHandle<()>> {
        let client = Arc::clone(&self.client);
        let store = Arc::clone(&self.store);
        self.runner.run(
            &self.jurisdiction_submission,
            FailurePolicy::AlwaysFail,
            async move {
                let token = require_token(store.as_ref())?;
                let count = pairs.len();
                client.submit_key_pairs(&token, pairs).await?;
                store.mark_submission_successful();
                info!(pairs = count, "keys submitted with jurisdiction");
                Ok(())
            },
        )
    }

    /// Refreshes the device status.
    ///
    /// Only a direct web fault is forwarded and sets `Failed`. Any other
    /// fault, a transaction aborted by a web fault included, is reported to
    /// diagnostics and leaves the slot in `Started`.
    pub fn refresh_status(&self) -> Option<JoinHandle<()>> {
        let status = Arc::clone(&self.status);
        self.runner.run(
            &self.status_refresh,
            FailurePolicy::FailOnWebOnly,
            async move { status.refresh().await },
        )
    }

    /// Filters `keys` against the persisted disclosure window, pairs the
    /// survivors with the target jurisdiction and publishes the result.
    ///
    /// Returns the number of published pairs.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::MissingWindowBound`] if the store lacks `t0` or
    /// `t3`, or [`FilterError::JurisdictionNotFound`] if the target is not in
    /// the jurisdiction list. Nothing is published in either case.
    pub fn prepare_keys_for_submission(
        &self,
        keys: Vec<ExposureKey>,
    ) -> Result<usize, FilterError> {
        let window = self.disclosure_window();
        let jurisdictions = self.jurisdictions.list();
        let total = keys.len();
        let pairs: Vec<KeyJurisdictionPair> =
            filter_keys(keys, &window, &jurisdictions, &self.target_jurisdiction)?.collect();
        let retained = pairs.len();
        self.key_pairs.send_replace(pairs);
        debug!(total, retained, "keys prepared for submission");
        Ok(retained)
    }

    /// Validates a scanned payload. A valid scan's identifier is stored.
    ///
    /// Publishes and returns `Success` or `Invalid`; no `Started` is
    /// published for this path.
    pub fn validate_scan(&self, text: &str) -> ScanStatus {
        let status = if self.codec.is_valid(text) {
            match self.codec.extract(text) {
                Some(guid) => {
                    self.store.store_test_identifier(guid);
                    ScanStatus::Success
                },
                None => {
                    warn!("scan passed validation but yielded no identifier");
                    ScanStatus::Invalid
                },
            }
        } else {
            ScanStatus::Invalid
        };
        debug!(?status, "scan validated");
        self.scan_status.send_replace(OneShotEvent::new(status));
        status
    }

    /// Unlinks the test from this device. Idempotent.
    pub fn deregister(&self) {
        self.store.delete_test_identifier();
        self.store.delete_registration_token();
        self.store.set_allowed_to_submit(false);
        self.store.set_initial_result_timestamp(DateTime::UNIX_EPOCH);
        self.test_result_received.send_replace(DateTime::UNIX_EPOCH);
        info!("test deregistered from device");
    }

    /// Removes a scanned test identifier that has not been registered yet.
    pub fn delete_test_identifier(&self) {
        self.store.delete_test_identifier();
    }

    /// Records a completed submission in which the user shared no keys.
    pub fn submit_without_keys(&self) {
        self.store.mark_submission_successful();
        info!("submission completed without keys");
    }

    /// Records when the first test result arrived.
    ///
    /// Only the first call after registration (or after [`deregister`])
    /// takes effect. Returns `true` if `at` was recorded.
    ///
    /// [`deregister`]: Self::deregister
    pub fn record_test_result_received(&self, at: DateTime<Utc>) -> bool {
        if self.store.initial_result_timestamp() != DateTime::UNIX_EPOCH {
            return false;
        }
        self.store.set_initial_result_timestamp(at);
        self.test_result_received.send_replace(at);
        debug!(%at, "initial test result recorded");
        true
    }

    /// Subscribes to the date the first test result was received. The epoch
    /// means no result yet.
    #[must_use]
    pub fn subscribe_test_result_received_date(&self) -> watch::Receiver<DateTime<Utc>> {
        self.test_result_received.subscribe()
    }

    /// Display code of the registered test, or `None` if the device is not
    /// registered.
    #[must_use]
    pub fn mobile_test_id_ui_code(&self) -> Option<String> {
        self.store.registration_token().map(|token| token.ui_code())
    }

    /// Whether the user still has to confirm a newly scanned test.
    #[must_use]
    pub fn new_test_for_confirmation(&self) -> bool {
        self.new_test_for_confirmation.load(Ordering::Acquire)
    }

    /// Sets the pending-confirmation flag.
    pub fn set_new_test_for_confirmation(&self, pending: bool) {
        self.new_test_for_confirmation.store(pending, Ordering::Release);
    }

    /// Returns `true` if a registration token is stored.
    #[must_use]
    pub fn is_device_registered(&self) -> bool {
        self.store.registration_token().is_some()
    }

    /// `t0` of the persisted disclosure window.
    #[must_use]
    pub fn window_start(&self) -> Option<DateTime<Utc>> {
        self.store.window_start()
    }

    /// The persisted disclosure window in rolling interval numbers.
    #[must_use]
    pub fn disclosure_window(&self) -> DisclosureWindow {
        DisclosureWindow::from_timestamps(self.store.window_start(), self.store.window_end())
    }

    /// The canonical jurisdiction list.
    #[must_use]
    pub fn jurisdictions(&self) -> Vec<Jurisdiction> {
        self.jurisdictions.list()
    }

    /// Subscribes to the device status.
    #[must_use]
    pub fn device_state(&self) -> watch::Receiver<DeviceUiState> {
        self.status.device_state()
    }

    /// Registration slot.
    #[must_use]
    pub fn registration(&self) -> &ActionSlot {
        &self.registration
    }

    /// Submission slot for keys without jurisdiction.
    #[must_use]
    pub fn submission(&self) -> &ActionSlot {
        &self.submission
    }

    /// Submission slot for jurisdiction-paired keys.
    #[must_use]
    pub fn jurisdiction_submission(&self) -> &ActionSlot {
        &self.jurisdiction_submission
    }

    /// Status refresh slot.
    #[must_use]
    pub fn status_refresh(&self) -> &ActionSlot {
        &self.status_refresh
    }

    /// Subscribes to scan validation outcomes.
    #[must_use]
    pub fn subscribe_scan_status(&self) -> watch::Receiver<OneShotEvent<ScanStatus>> {
        self.scan_status.subscribe()
    }

    /// Subscribes to the last prepared key pairs.
    #[must_use]
    pub fn subscribe_key_pairs(&self) -> watch::Receiver<Vec<KeyJurisdictionPair>> {
        self.key_pairs.subscribe()
    }

    /// The last prepared key pairs.
    #[must_use]
    pub fn key_pairs(&self) -> Vec<KeyJurisdictionPair> {
        self.key_pairs.borrow().clone()
    }
}

fn require_token(store: &dyn SubmissionStore) -> Result<RegistrationToken, Fault> {
    store
        .registration_token()
        .ok_or_else(|| Fault::unclassified("no registration token set"))
}
