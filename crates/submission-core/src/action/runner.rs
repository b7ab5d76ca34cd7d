//! Action runner.
//!
//! [`ActionRunner::run`] publishes `Started` before launching the action, so
//! a terminal state is never observed without a preceding `Started` for the
//! same invocation. There is no retry and no per-slot mutual exclusion:
//! overlapping invocations of one slot settle in completion order.

use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::scope::TaskScope;
use super::{ActionSlot, ActionState};
use crate::diagnostics::DiagnosticsSink;
use crate::fault::{Classification, Fault, FaultCategory, classify};

/// How a slot reacts to a fault that is only sent to diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Every fault ends the invocation as `Failed`.
    #[default]
    AlwaysFail,
    /// Only a direct web fault is surfaced and sets `Failed`. Every other
    /// fault, including a transaction aborted by a web fault, is reported and
    /// leaves the state where it was (normally `Started`).
    FailOnWebOnly,
}

/// Runs asynchronous actions and publishes their lifecycle into slots.
#[derive(Debug, Clone)]
pub struct ActionRunner {
    scope: Arc<TaskScope>,
    diagnostics: Arc<dyn DiagnosticsSink>,
}

impl ActionRunner {
    /// Creates a runner launching tasks on `scope`.
    #[must_use]
    pub fn new(scope: Arc<TaskScope>, diagnostics: Arc<dyn DiagnosticsSink>) -> Self {
        Self { scope, diagnostics }
    }

    /// The scope tasks are launched on.
    #[must_use]
    pub const fn scope(&self) -> &Arc<TaskScope> {
        &self.scope
    }

    /// Publishes `Started` into `slot`, then launches `action` on the scope.
    ///
    /// When the action finishes the slot receives `Success`, or the fault is
    /// classified: user-facing faults are published to the slot's fault
    /// channel and the state becomes `Failed`; other faults are reported to
    /// diagnostics and the state follows `policy`.
    ///
    /// Returns `None` if the scope is already cancelled, in which case nothing
    /// is published.
    pub fn run<F>(
        &self,
        slot: &Arc<ActionSlot>,
        policy: FailurePolicy,
        action: F,
    ) -> Option<JoinHandle<()>>
    where
        F: Future<Output = Result<(), Fault>> + Send + 'static,
    {
        if self.scope.is_cancelled() {
            debug!(action = slot.name(), "scope cancelled, action not started");
            return None;
        }

        slot.publish_state(ActionState::Started);
        debug!(action = slot.name(), "action started");

        let slot = Arc::clone(slot);
        let diagnostics = Arc::clone(&self.diagnostics);
        let token = self.scope.token();
        let name = slot.name();
        self.scope.spawn(name, async move {
            let result = action.await;
            if token.is_cancelled() {
                debug!(action = slot.name(), "scope cancelled, outcome dropped");
                return;
            }
            settle(&slot, policy, diagnostics.as_ref(), result);
        })
    }
}

/// Publishes the outcome of one invocation into `slot`.
pub(crate) fn settle(
    slot: &ActionSlot,
    policy: FailurePolicy,
    diagnostics: &dyn DiagnosticsSink,
    result: Result<(), Fault>,
) {
    let Err(fault) = result else {
        slot.publish_state(ActionState::Success);
        info!(action = slot.name(), "action succeeded");
        return;
    };

    let classification = match policy {
        FailurePolicy::AlwaysFail => classify(fault),
        FailurePolicy::FailOnWebOnly => match fault {
            Fault::Web(web) => Classification::Surface(web),
            other => Classification::Report(other, FaultCategory::Internal),
        },
    };

    match classification {
        Classification::Surface(web) => {
            warn!(
                action = slot.name(),
                status = web.status,
                reason = %web.reason,
                "action rejected by remote service"
            );
            slot.publish_fault(web);
            slot.publish_state(ActionState::Failed);
        },
        Classification::Report(fault, category) => {
            diagnostics.report(&fault, category);
            match policy {
                FailurePolicy::AlwaysFail => slot.publish_state(ActionState::Failed),
                FailurePolicy::FailOnWebOnly => {
                    debug!(
                        action = slot.name(),
                        state = %slot.state(),
                        "internal fault, state left unchanged"
                    );
                },
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::fault::WebFault;

    #[derive(Debug, Default)]
    struct RecordingSink(Mutex<Vec<(Fault, FaultCategory)>>);

    impl RecordingSink {
        fn reports(&self) -> Vec<(Fault, FaultCategory)> {
            self.0.lock().unwrap().clone()
        }
    }

    impl DiagnosticsSink for RecordingSink {
        fn report(&self, fault: &Fault, category: FaultCategory) {
            self.0.lock().unwrap().push((fault.clone(), category));
        }
    }

    fn runner() -> (ActionRunner, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let runner = ActionRunner::new(Arc::new(TaskScope::current()), sink.clone());
        (runner, sink)
    }

    #[tokio::test]
    async fn success_publishes_started_then_success() {
        let (runner, sink) = runner();
        let slot = Arc::new(ActionSlot::new("registration"));

        let handle = runner
            .run(&slot, FailurePolicy::AlwaysFail, async { Ok(()) })
            .expect("scope is live");
        assert_eq!(slot.state(), ActionState::Started);

        handle.await.unwrap();
        assert_eq!(slot.state(), ActionState::Success);
        assert!(slot.fault().is_none());
        assert!(sink.reports().is_empty());
    }

    #[tokio::test]
    async fn web_fault_is_forwarded() {
        let (runner, sink) = runner();
        let slot = Arc::new(ActionSlot::new("submission"));

        runner
            .run(&slot, FailurePolicy::AlwaysFail, async {
                Err(Fault::web(400, "invalid payload"))
            })
            .unwrap()
            .await
            .unwrap();

        assert_eq!(slot.state(), ActionState::Failed);
        let event = slot.fault().unwrap();
        assert_eq!(event.take(), Some(&WebFault::new(400, "invalid payload")));
        assert!(sink.reports().is_empty());
    }

    #[tokio::test]
    async fn unclassified_fault_policy() {
        let (runner, sink) = runner();
        let always = Arc::new(ActionSlot::new("submission"));
        let lenient = Arc::new(ActionSlot::new("refresh"));

        runner
            .run(&always, FailurePolicy::AlwaysFail, async {
                Err(Fault::unclassified("boom"))
            })
            .unwrap()
            .await
            .unwrap();
        runner
            .run(&lenient, FailurePolicy::FailOnWebOnly, async {
                Err(Fault::unclassified("boom"))
            })
            .unwrap()
            .await
            .unwrap();

        assert_eq!(always.state(), ActionState::Failed);
        assert_eq!(lenient.state(), ActionState::Started);
        assert!(always.fault().is_none());
        assert!(lenient.fault().is_none());
        assert_eq!(sink.reports().len(), 2);
    }

    #[tokio::test]
    async fn lenient_policy_still_fails_on_web_fault() {
        let (runner, _sink) = runner();
        let slot = Arc::new(ActionSlot::new("refresh"));
        runner
            .run(&slot, FailurePolicy::FailOnWebOnly, async {
                Err(Fault::web(503, "maintenance"))
            })
            .unwrap()
            .await
            .unwrap();
        assert_eq!(slot.state(), ActionState::Failed);
        assert!(slot.fault().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_scope_publishes_nothing_further() {
        let (runner, sink) = runner();
        let slot = Arc::new(ActionSlot::new("registration"));

        let handle = runner
            .run(&slot, FailurePolicy::AlwaysFail, async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Err(Fault::unclassified("late"))
            })
            .unwrap();
        tokio::task::yield_now().await;
        runner.scope().cancel();
        let _ = handle.await;

        assert_eq!(slot.state(), ActionState::Started);
        assert!(sink.reports().is_empty());
        assert!(
            runner
                .run(&slot, FailurePolicy::AlwaysFail, async { Ok(()) })
                .is_none()
        );
    }

    #[test]
    fn settle_transaction_with_web_cause() {
        let sink = RecordingSink::default();
        let slot = ActionSlot::new("submission");
        settle(
            &slot,
            FailurePolicy::AlwaysFail,
            &sink,
            Err(Fault::transaction("submit", Some(Fault::web(401, "expired")))),
        );
        assert_eq!(slot.state(), ActionState::Failed);
        assert_eq!(slot.fault().unwrap().peek(), &WebFault::new(401, "expired"));
        assert!(sink.reports().is_empty());
    }

    #[test]
    fn web_only_policy_reports_transaction_with_web_cause() {
        let sink = RecordingSink::default();
        let slot = ActionSlot::new("refresh");
        slot.publish_state(ActionState::Started);
        let fault = Fault::transaction("refresh", Some(Fault::web(404, "gone")));
        settle(&slot, FailurePolicy::FailOnWebOnly, &sink, Err(fault.clone()));
        assert_eq!(slot.state(), ActionState::Started);
        assert!(slot.fault().is_none());
        assert_eq!(sink.reports(), vec![(fault, FaultCategory::Internal)]);
    }

    #[test]
    fn settle_transaction_with_other_cause() {
        let sink = RecordingSink::default();
        let slot = ActionSlot::new("submission");
        settle(
            &slot,
            FailurePolicy::AlwaysFail,
            &sink,
            Err(Fault::transaction("submit", Some(Fault::unclassified("io")))),
        );
        assert_eq!(slot.state(), ActionState::Failed);
        assert!(slot.fault().is_none());
        let reports = sink.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].1, FaultCategory::Internal);
    }
}
