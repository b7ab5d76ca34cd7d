//! Diagnostics reporting for faults that are not shown to the user.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::error;

use crate::fault::{Fault, FaultCategory};

/// Sink for internal fault reports.
///
/// Reporting is fire-and-forget: implementations must not fail observably
/// and must not block for long, since they run on the action's task.
pub trait DiagnosticsSink: Send + Sync + fmt::Debug {
    /// Records `fault` under `category`.
    fn report(&self, fault: &Fault, category: FaultCategory);
}

/// Default sink: logs each report through `tracing` and counts it.
#[derive(Debug, Default)]
pub struct TracingDiagnostics {
    reported: AtomicU64,
}

impl TracingDiagnostics {
    /// Creates a sink with a zero report count.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            reported: AtomicU64::new(0),
        }
    }

    /// Number of reports recorded so far.
    #[must_use]
    pub fn reported(&self) -> u64 {
        self.reported.load(Ordering::Relaxed)
    }
}

impl DiagnosticsSink for TracingDiagnostics {
    fn report(&self, fault: &Fault, category: FaultCategory) {
        self.reported.fetch_add(1, Ordering::Relaxed);
        error!(
            %category,
            kind = fault.kind_name(),
            error = %fault,
            "fault reported to diagnostics"
        );
    }
}
