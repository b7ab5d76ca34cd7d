//! # submission-core
//!
//! Action lifecycle, fault classification and key-window filtering for the
//! exposure key submission flow.
//!
//! A submission flow is a handful of remote operations (device registration,
//! key upload, status refresh) plus some synchronous bookkeeping (scan
//! validation, key preparation, deregistration). This crate drives the remote
//! operations as tasks on a caller-owned [`TaskScope`], publishes each
//! operation's progress through an observable [`ActionSlot`], and routes every
//! failure through [`classify`] so only rejections by the remote service are
//! ever shown to a user.
//!
//! ## Core Concepts
//!
//! - **Action slot**: the [`ActionState`] of one operation plus a channel of
//!   user-facing faults wrapped in [`OneShotEvent`]s.
//! - **Fault classification**: [`Fault::Web`] (and transaction faults caused
//!   by one) is surfaced; everything else goes to a [`DiagnosticsSink`].
//! - **Disclosure window**: keys are eligible if their rolling start interval
//!   lies in `[t0, t3)`; see [`filter_keys`].
//!
//! ## Example
//!
//! ```rust,ignore
//! let scope = Arc::new(TaskScope::current());
//! let orchestrator = SubmissionOrchestrator::new(scope.clone(), collaborators, "BEL");
//!
//! let mut state = orchestrator.registration().subscribe_state();
//! orchestrator.register_device();
//! state.wait_for(|s| s.is_terminal()).await?;
//!
//! // Leaving the screen: in-flight actions stop publishing.
//! scope.cancel();
//! ```

#![warn(missing_docs)]

pub mod action;
pub mod client;
pub mod config;
pub mod diagnostics;
pub mod event;
pub mod fault;
pub mod jurisdiction;
pub mod keys;
pub mod orchestrator;
pub mod scan;
pub mod status;
pub mod store;
pub mod telemetry;

pub use action::{ActionRunner, ActionSlot, ActionState, FailurePolicy, TaskScope};
pub use client::RemoteSubmissionClient;
pub use config::{ConfigError, SubmissionConfig};
pub use diagnostics::{DiagnosticsSink, TracingDiagnostics};
pub use event::OneShotEvent;
pub use fault::{
    Classification, Fault, FaultCategory, TransactionFault, UnclassifiedFault, WebFault,
    WebFaultKind, classify,
};
pub use jurisdiction::{Jurisdiction, JurisdictionSource, StaticJurisdictions};
pub use keys::{DisclosureWindow, ExposureKey, FilterError, KeyJurisdictionPair, filter_keys};
pub use orchestrator::{Collaborators, SubmissionOrchestrator};
pub use scan::{IdentifierCodec, QrGuidCodec, ScanStatus, TestGuid};
pub use status::{DeviceUiState, StatusRepository};
pub use store::{InMemoryStore, RegistrationToken, SubmissionStore};
