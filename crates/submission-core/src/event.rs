//! Single-consumption event wrapper.
//!
//! Slots are backed by `tokio::sync::watch`, which hands the latest value to
//! every new receiver. An [`OneShotEvent`] shares its handled flag between all
//! clones, so the first observer to call [`OneShotEvent::take`] consumes it and
//! every later or rebound observer gets `None`. The payload stays readable
//! through [`OneShotEvent::peek`].

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A value delivered to observers at most once.
pub struct OneShotEvent<T> {
    payload: Arc<T>,
    handled: Arc<AtomicBool>,
}

impl<T> OneShotEvent<T> {
    /// Wraps a payload in a fresh, unhandled event.
    #[must_use]
    pub fn new(payload: T) -> Self {
        Self {
            payload: Arc::new(payload),
            handled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns the payload if no observer has consumed this event yet, and
    /// marks it handled.
    #[must_use]
    pub fn take(&self) -> Option<&T> {
        if self.handled.swap(true, Ordering::AcqRel) {
            None
        } else {
            Some(self.payload.as_ref())
        }
    }

    /// Returns the payload regardless of whether it was handled.
    #[must_use]
    pub fn peek(&self) -> &T {
        &self.payload
    }

    /// Returns `true` once some observer has consumed the event.
    #[must_use]
    pub fn is_handled(&self) -> bool {
        self.handled.load(Ordering::Acquire)
    }
}

impl<T> Clone for OneShotEvent<T> {
    fn clone(&self) -> Self {
        Self {
            payload: Arc::clone(&self.payload),
            handled: Arc::clone(&self.handled),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for OneShotEvent<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OneShotEvent")
            .field("payload", &self.payload)
            .field("handled", &self.is_handled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::watch;

    use super::*;

    #[test]
    fn take_consumes_once() {
        let event = OneShotEvent::new(42);
        assert!(!event.is_handled());
        assert_eq!(event.take(), Some(&42));
        assert!(event.is_handled());
        assert_eq!(event.take(), None);
        assert_eq!(*event.peek(), 42);
    }

    #[test]
    fn clones_share_handled_flag() {
        let event = OneShotEvent::new("registered");
        let replay = event.clone();
        assert_eq!(event.take(), Some(&"registered"));
        assert_eq!(replay.take(), None);
        assert_eq!(*replay.peek(), "registered");
    }

    #[test]
    fn late_watch_subscriber_does_not_reconsume() {
        let (tx, first) = watch::channel(None::<OneShotEvent<u16>>);
        tx.send_replace(Some(OneShotEvent::new(404)));

        let seen = first.borrow().as_ref().and_then(|e| e.take().copied());
        assert_eq!(seen, Some(404));

        let late = tx.subscribe();
        let replayed = late.borrow();
        let event = replayed.as_ref().expect("watch replays the last value");
        assert!(event.take().is_none());
        assert_eq!(*event.peek(), 404);
    }

    #[test]
    fn fresh_publish_is_unhandled_again() {
        let first = OneShotEvent::new(1);
        let _ = first.take();
        let second = OneShotEvent::new(2);
        assert_eq!(second.take(), Some(&2));
    }
}
