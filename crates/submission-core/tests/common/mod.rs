//! Scripted collaborator doubles shared by integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use submission_core::scan::{DEFAULT_MAX_SCAN_LENGTH, DEFAULT_SCAN_PREFIX};
use submission_core::{
    Collaborators, DeviceUiState, DiagnosticsSink, ExposureKey, Fault, FaultCategory,
    IdentifierCodec, InMemoryStore, Jurisdiction, KeyJurisdictionPair, QrGuidCodec,
    RegistrationToken, RemoteSubmissionClient, StaticJurisdictions, StatusRepository,
    SubmissionOrchestrator, TaskScope, TestGuid,
};
use tokio::sync::watch;

pub const GUID: &str = "3D6D08-3567F3F2-4DCF-43A3-8737-4CD1F87D6FDA";

pub fn valid_scan() -> String {
    format!("{DEFAULT_SCAN_PREFIX}{GUID}")
}

/// One scripted response: wait `delay`, then return `result`.
#[derive(Debug, Clone)]
pub struct Step<T> {
    pub delay: Duration,
    pub result: Result<T, Fault>,
}

impl<T> Step<T> {
    pub const fn now(result: Result<T, Fault>) -> Self {
        Self {
            delay: Duration::ZERO,
            result,
        }
    }

    pub const fn after(delay: Duration, result: Result<T, Fault>) -> Self {
        Self { delay, result }
    }
}

async fn play<T>(
    script: &Mutex<VecDeque<Step<T>>>,
    fallback: impl FnOnce() -> T,
) -> Result<T, Fault> {
    let step = script.lock().unwrap().pop_front();
    match step {
        Some(step) => {
            if !step.delay.is_zero() {
                tokio::time::sleep(step.delay).await;
            }
            step.result
        },
        None => Ok(fallback()),
    }
}

/// Remote client that replays scripted results and records what it was sent.
#[derive(Debug, Default)]
pub struct ScriptedClient {
    register: Mutex<VecDeque<Step<RegistrationToken>>>,
    submit: Mutex<VecDeque<Step<()>>>,
    pub registered_ids: Mutex<Vec<TestGuid>>,
    pub submitted_keys: Mutex<Vec<Vec<ExposureKey>>>,
    pub submitted_pairs: Mutex<Vec<Vec<KeyJurisdictionPair>>>,
}

impl ScriptedClient {
    pub fn script_register(&self, step: Step<RegistrationToken>) {
        self.register.lock().unwrap().push_back(step);
    }

    pub fn script_submit(&self, step: Step<()>) {
        self.submit.lock().unwrap().push_back(step);
    }
}

#[async_trait]
impl RemoteSubmissionClient for ScriptedClient {
    async fn register_device(&self, test_id: &TestGuid) -> Result<RegistrationToken, Fault> {
        self.registered_ids.lock().unwrap().push(test_id.clone());
        play(&self.register, || RegistrationToken::new("registration-token")).await
    }

    async fn submit_keys(
        &self,
        _token: &RegistrationToken,
        keys: Vec<ExposureKey>,
    ) -> Result<(), Fault> {
        self.submitted_keys.lock().unwrap().push(keys);
        play(&self.submit, || ()).await
    }

    async fn submit_key_pairs(
        &self,
        _token: &RegistrationToken,
        pairs: Vec<KeyJurisdictionPair>,
    ) -> Result<(), Fault> {
        self.submitted_pairs.lock().unwrap().push(pairs);
        play(&self.submit, || ()).await
    }
}

/// Status repository whose refresh replays scripted results.
#[derive(Debug)]
pub struct ScriptedStatus {
    state: watch::Sender<DeviceUiState>,
    refresh: Mutex<VecDeque<Step<DeviceUiState>>>,
}

impl Default for ScriptedStatus {
    fn default() -> Self {
        let (state, _) = watch::channel(DeviceUiState::Unpaired);
        Self {
            state,
            refresh: Mutex::new(VecDeque::new()),
        }
    }
}

impl ScriptedStatus {
    pub fn script_refresh(&self, step: Step<DeviceUiState>) {
        self.refresh.lock().unwrap().push_back(step);
    }
}

#[async_trait]
impl StatusRepository for ScriptedStatus {
    fn device_state(&self) -> watch::Receiver<DeviceUiState> {
        self.state.subscribe()
    }

    async fn refresh(&self) -> Result<(), Fault> {
        let current = *self.state.borrow();
        let next = play(&self.refresh, || current).await?;
        self.state.send_replace(next);
        Ok(())
    }
}

/// Diagnostics sink that keeps every report.
#[derive(Debug, Default)]
pub struct RecordingDiagnostics {
    reports: Mutex<Vec<(Fault, FaultCategory)>>,
}

impl RecordingDiagnostics {
    pub fn reports(&self) -> Vec<(Fault, FaultCategory)> {
        self.reports.lock().unwrap().clone()
    }
}

impl DiagnosticsSink for RecordingDiagnostics {
    fn report(&self, fault: &Fault, category: FaultCategory) {
        self.reports.lock().unwrap().push((fault.clone(), category));
    }
}

/// Codec that counts how often each half of the grammar is consulted.
#[derive(Debug)]
pub struct CountingCodec {
    inner: QrGuidCodec,
    pub validations: AtomicUsize,
    pub extractions: AtomicUsize,
}

impl Default for CountingCodec {
    fn default() -> Self {
        Self {
            inner: QrGuidCodec::new(DEFAULT_SCAN_PREFIX, DEFAULT_MAX_SCAN_LENGTH).unwrap(),
            validations: AtomicUsize::new(0),
            extractions: AtomicUsize::new(0),
        }
    }
}

impl CountingCodec {
    pub fn extractions(&self) -> usize {
        self.extractions.load(Ordering::SeqCst)
    }
}

impl IdentifierCodec for CountingCodec {
    fn is_valid(&self, text: &str) -> bool {
        self.validations.fetch_add(1, Ordering::SeqCst);
        self.inner.is_valid(text)
    }

    fn extract(&self, text: &str) -> Option<TestGuid> {
        self.extractions.fetch_add(1, Ordering::SeqCst);
        self.inner.extract(text)
    }
}

pub fn jurisdictions() -> Vec<Jurisdiction> {
    vec![
        Jurisdiction::new("BE", "BEL", "Belgium"),
        Jurisdiction::new("DE", "DEU", "Germany"),
        Jurisdiction::new("NL", "NLD", "Netherlands"),
    ]
}

/// An orchestrator wired to scripted collaborators.
pub struct Harness {
    pub scope: Arc<TaskScope>,
    pub client: Arc<ScriptedClient>,
    pub store: Arc<InMemoryStore>,
    pub status: Arc<ScriptedStatus>,
    pub codec: Arc<CountingCodec>,
    pub diagnostics: Arc<RecordingDiagnostics>,
    pub orchestrator: SubmissionOrchestrator,
}

impl Harness {
    /// Builds a harness on the current runtime targeting `BEL`.
    pub fn new() -> Self {
        Self::with_target("BEL")
    }

    pub fn with_target(target: &str) -> Self {
        let scope = Arc::new(TaskScope::current());
        let client = Arc::new(ScriptedClient::default());
        let store = Arc::new(InMemoryStore::new());
        let status = Arc::new(ScriptedStatus::default());
        let codec = Arc::new(CountingCodec::default());
        let diagnostics = Arc::new(RecordingDiagnostics::default());

        let collaborators = Collaborators {
            client: client.clone(),
            store: store.clone(),
            status: status.clone(),
            jurisdictions: Arc::new(StaticJurisdictions::new(jurisdictions())),
            codec: codec.clone(),
            diagnostics: diagnostics.clone(),
        };
        let orchestrator = SubmissionOrchestrator::new(Arc::clone(&scope), collaborators, target);

        Self {
            scope,
            client,
            store,
            status,
            codec,
            diagnostics,
            orchestrator,
        }
    }
}
