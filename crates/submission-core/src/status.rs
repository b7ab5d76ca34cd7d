//! Device/test status as reported by the status repository.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::fault::Fault;

/// What the device knows about its test, as shown on the status screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceUiState {
    /// No test is linked to this device.
    #[default]
    Unpaired,
    /// A test is linked, no result yet.
    PairedNoResult,
    /// Positive result.
    PairedPositive,
    /// Positive result confirmed by a hotline TAN.
    PairedPositiveTelekom,
    /// Negative result.
    PairedNegative,
    /// The lab reported an invalid result.
    PairedError,
    /// The result was already redeemed elsewhere.
    PairedRedeemed,
    /// Keys were submitted, more may follow.
    SubmittedInitial,
    /// Keys were submitted and the flow is done.
    SubmittedFinal,
}

impl DeviceUiState {
    /// Returns `true` if a test is linked to the device.
    #[must_use]
    pub const fn is_paired(self) -> bool {
        !matches!(self, Self::Unpaired)
    }
}

/// Repository exposing the current device status and refreshing it.
#[async_trait]
pub trait StatusRepository: Send + Sync + std::fmt::Debug {
    /// Subscribes to the current status.
    fn device_state(&self) -> watch::Receiver<DeviceUiState>;

    /// Fetches the latest status from the remote service.
    ///
    /// # Errors
    ///
    /// Returns the fault that aborted the refresh.
    async fn refresh(&self) -> Result<(), Fault>;
}
