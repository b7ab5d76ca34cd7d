//! Asynchronous action lifecycle.
//!
//! An action slot tracks one named remote operation. Its state moves
//! `Idle -> Started -> {Success, Failed}` and may re-enter `Started` on every
//! new invocation. User-facing faults are published next to the state as
//! [`OneShotEvent`]s.
//!
//! - [`ActionSlot`]: the observable state and fault channel of one action.
//! - [`ActionRunner`]: launches an action on a [`TaskScope`] and publishes its
//!   lifecycle into a slot.
//! - [`TaskScope`]: caller-owned cancellation scope for launched tasks.

mod runner;
mod scope;

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

pub use runner::{ActionRunner, FailurePolicy};
pub use scope::{CancelToken, TaskScope};

use crate::event::OneShotEvent;
use crate::fault::WebFault;

/// Lifecycle of one asynchronous action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionState {
    /// Never invoked.
    #[default]
    Idle,
    /// Invoked and not yet finished.
    Started,
    /// Last invocation completed normally.
    Success,
    /// Last invocation raised a fault.
    Failed,
}

impl ActionState {
    /// Returns `true` for `Success` and `Failed`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

impl fmt::Display for ActionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Started => write!(f, "started"),
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Fault channel of a slot: the latest user-facing fault, consumable once.
pub type FaultEvent = Option<OneShotEvent<WebFault>>;

/// Observable state and fault channel for one named action.
///
/// Publishing always overwrites the previous value, so observers only ever
/// see the latest state. Publishing succeeds even if nobody is subscribed.
#[derive(Debug)]
pub struct ActionSlot {
    name: &'static str,
    state: watch::Sender<ActionState>,
    fault: watch::Sender<FaultEvent>,
}

impl ActionSlot {
    /// Creates an idle slot with no fault.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        let (state, _) = watch::channel(ActionState::Idle);
        let (fault, _) = watch::channel(None);
        Self { name, state, fault }
    }

    /// The action name, used in log fields.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ActionState {
        *self.state.borrow()
    }

    /// Subscribes to state changes. The receiver sees the current value.
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<ActionState> {
        self.state.subscribe()
    }

    /// Latest fault event, if any was published.
    #[must_use]
    pub fn fault(&self) -> FaultEvent {
        self.fault.borrow().clone()
    }

    /// Subscribes to fault events. The receiver sees the latest event, which
    /// may already be handled.
    #[must_use]
    pub fn subscribe_fault(&self) -> watch::Receiver<FaultEvent> {
        self.fault.subscribe()
    }

    pub(crate) fn publish_state(&self, state: ActionState) {
        self.state.send_replace(state);
    }

    pub(crate) fn publish_fault(&self, fault: WebFault) {
        self.fault.send_replace(Some(OneShotEvent::new(fault)));
    }
}
