//! Remote submission service client.
//!
//! The wire protocol lives behind this trait. Implementations report
//! protocol-level rejections as [`Fault::Web`] and may wrap multi-step
//! failures in [`Fault::Transaction`].

use async_trait::async_trait;

use crate::fault::Fault;
use crate::keys::{ExposureKey, KeyJurisdictionPair};
use crate::scan::TestGuid;
use crate::store::RegistrationToken;

/// Client for the remote submission service.
#[async_trait]
pub trait RemoteSubmissionClient: Send + Sync + std::fmt::Debug {
    /// Registers this device for the scanned test and returns the token the
    /// service issued.
    ///
    /// # Errors
    ///
    /// Returns the fault raised by the service or transport.
    async fn register_device(&self, test_id: &TestGuid) -> Result<RegistrationToken, Fault>;

    /// Uploads keys without jurisdiction attribution.
    ///
    /// # Errors
    ///
    /// Returns the fault raised by the service or transport.
    async fn submit_keys(
        &self,
        token: &RegistrationToken,
        keys: Vec<ExposureKey>,
    ) -> Result<(), Fault>;

    /// Uploads keys paired with their jurisdiction.
    ///
    /// # Errors
    ///
    /// Returns the fault raised by the service or transport.
    async fn submit_key_pairs(
        &self,
        token: &RegistrationToken,
        pairs: Vec<KeyJurisdictionPair>,
    ) -> Result<(), Fault>;
}
