//! Fault types raised by submission actions.
//!
//! Every failure an action can produce is one of three variants:
//!
//! - [`WebFault`]: the remote service rejected the request or could not be
//!   reached at the protocol level. These are the only faults a user sees.
//! - [`TransactionFault`]: a local multi-step operation failed. If its inner
//!   cause is a [`WebFault`] the two are the same failure and the inner fault
//!   is surfaced instead of the wrapper.
//! - [`UnclassifiedFault`]: anything else. Recorded for diagnostics only.
//!
//! Routing is decided by [`classify`], a pure function over [`Fault`].

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A failure raised by an asynchronous submission action.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Fault {
    /// The remote service rejected the request.
    #[error(transparent)]
    Web(#[from] WebFault),

    /// A local composite operation failed.
    #[error(transparent)]
    Transaction(#[from] TransactionFault),

    /// Any other failure.
    #[error(transparent)]
    Unclassified(#[from] UnclassifiedFault),
}

impl Fault {
    /// Creates a web fault from a status code and reason.
    #[must_use]
    pub fn web(status: u16, reason: impl Into<String>) -> Self {
        Self::Web(WebFault::new(status, reason))
    }

    /// Creates a transaction fault with an optional inner cause.
    #[must_use]
    pub fn transaction(transaction: impl Into<String>, inner: Option<Self>) -> Self {
        Self::Transaction(TransactionFault::new(transaction, inner))
    }

    /// Creates an unclassified fault.
    #[must_use]
    pub fn unclassified(message: impl Into<String>) -> Self {
        Self::Unclassified(UnclassifiedFault::new(message))
    }

    /// Short variant name used in log fields.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Web(_) => "web",
            Self::Transaction(_) => "transaction",
            Self::Unclassified(_) => "unclassified",
        }
    }
}

/// The remote service rejected a request or was unreachable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("web request failed with status {status}: {reason}")]
pub struct WebFault {
    /// Protocol status code (HTTP status for the submission service).
    pub status: u16,
    /// Human readable reason reported by the service or transport.
    pub reason: String,
}

impl WebFault {
    /// Creates a new web fault.
    #[must_use]
    pub fn new(status: u16, reason: impl Into<String>) -> Self {
        Self {
            status,
            reason: reason.into(),
        }
    }

    /// Maps the status code onto a coarse kind for presentation.
    #[must_use]
    pub const fn kind(&self) -> WebFaultKind {
        match self.status {
            400 => WebFaultKind::BadRequest,
            401 => WebFaultKind::Unauthorized,
            403 => WebFaultKind::Forbidden,
            404 => WebFaultKind::NotFound,
            410 => WebFaultKind::Gone,
            500..=599 => WebFaultKind::ServerError,
            _ => WebFaultKind::Unexpected,
        }
    }
}

/// Coarse classification of a [`WebFault`] status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebFaultKind {
    /// 400.
    BadRequest,
    /// 401.
    Unauthorized,
    /// 403.
    Forbidden,
    /// 404.
    NotFound,
    /// 410, the resource was already redeemed.
    Gone,
    /// Any 5xx.
    ServerError,
    /// Any other status, including transport-level failures reported as 0.
    Unexpected,
}

/// A local multi-step operation failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("transaction '{transaction}' failed")]
pub struct TransactionFault {
    /// Name of the transaction that failed.
    pub transaction: String,
    /// The fault that aborted the transaction, if known.
    #[source]
    pub inner: Option<Box<Fault>>,
}

impl TransactionFault {
    /// Creates a new transaction fault.
    #[must_use]
    pub fn new(transaction: impl Into<String>, inner: Option<Fault>) -> Self {
        Self {
            transaction: transaction.into(),
            inner: inner.map(Box::new),
        }
    }

    /// Returns the inner web fault, if the transaction was aborted by one.
    #[must_use]
    pub fn web_cause(&self) -> Option<&WebFault> {
        match self.inner.as_deref() {
            Some(Fault::Web(web)) => Some(web),
            _ => None,
        }
    }
}

/// A failure that is neither a web fault nor a transaction fault.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct UnclassifiedFault {
    /// Description of the failure.
    pub message: String,
}

impl UnclassifiedFault {
    /// Creates a new unclassified fault.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Category attached to a diagnostics report.
///
/// Everything the runner reports is `Internal`; the enum leaves room for
/// sinks that also receive reports from other layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum FaultCategory {
    /// Implementation defect or unexpected local failure.
    Internal,
}

impl fmt::Display for FaultCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Internal => write!(f, "internal"),
        }
    }
}

/// Where a fault goes after classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Forward this web fault to the caller's fault event.
    Surface(WebFault),
    /// Send the fault, unchanged, to diagnostics under the given category.
    Report(Fault, FaultCategory),
}

impl Classification {
    /// Returns `true` if the fault is shown to the user.
    #[must_use]
    pub const fn is_user_facing(&self) -> bool {
        matches!(self, Self::Surface(_))
    }
}

/// Decides whether a fault is user-facing or diagnostic-only.
///
/// | Fault                                  | Result                 |
/// |----------------------------------------|------------------------|
/// | `Web`                                  | `Surface(web)`         |
/// | `Transaction` with a `Web` inner cause | `Surface(inner)`       |
/// | `Transaction` with any other cause     | `Report(_, Internal)`  |
/// | `Unclassified`                         | `Report(_, Internal)`  |
#[must_use]
pub fn classify(fault: Fault) -> Classification {
    match fault {
        Fault::Web(web) => Classification::Surface(web),
        Fault::Transaction(tx) => match tx.web_cause() {
            Some(web) => Classification::Surface(web.clone()),
            None => Classification::Report(Fault::Transaction(tx), FaultCategory::Internal),
        },
        unclassified @ Fault::Unclassified(_) => {
            Classification::Report(unclassified, FaultCategory::Internal)
        },
    }
}
