//! Single-assignment result cell with subscriber notification.
//!
//! # Design
//! A `Deferred<T>` starts pending and settles at most once, either fulfilled
//! with a `T` or rejected with a `NetworkError`. Subscribers are kept in
//! registration order and each runs at most once. Subscribing after
//! delivery has finished runs the callback immediately on the subscribing
//! thread, so a result can never be missed.
//!
//! Handles are cheap to clone and share the same cell. Callbacks run outside
//! the internal lock; a callback may subscribe to or inspect the same
//! `Deferred`. Subscriptions made while the settling thread is still
//! delivering join the back of the queue and are drained by that thread, so
//! the order of subscription is the order of invocation.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::NetworkError;

type SuccessCallback<T> = Box<dyn FnOnce(&T) + Send>;
type FailureCallback = Box<dyn FnOnce(&NetworkError) + Send>;

enum State<T> {
    Pending,
    Fulfilled(Arc<T>),
    Rejected(NetworkError),
}

impl<T> State<T> {
    fn is_pending(&self) -> bool {
        matches!(self, State::Pending)
    }
}

struct Inner<T> {
    state: State<T>,
    /// Set while the settling thread drains the callback queues.
    delivering: bool,
    on_success: Vec<SuccessCallback<T>>,
    on_failure: Vec<FailureCallback>,
}

impl<T> Inner<T> {
    /// Callbacks still to run, or `None` once the queue is drained.
    fn next_batch<C>(&mut self, take: impl FnOnce(&mut Self) -> Vec<C>) -> Option<Vec<C>> {
        let batch = take(self);
        if batch.is_empty() {
            self.delivering = false;
            None
        } else {
            Some(batch)
        }
    }
}

/// A value that will be available later, delivered exactly once.
pub struct Deferred<T> {
    inner: Arc<Mutex<Inner<T>>>,
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + Sync + 'static> Default for Deferred<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + Sync + 'static> Deferred<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state: State::Pending,
                delivering: false,
                on_success: Vec::new(),
                on_failure: Vec::new(),
            })),
        }
    }

    /// A cell that is already fulfilled with `value`.
    pub fn fulfilled(value: T) -> Self {
        let deferred = Self::new();
        deferred.fulfill(value);
        deferred
    }

    /// A cell that is already rejected with `error`.
    pub fn rejected(error: NetworkError) -> Self {
        let deferred = Self::new();
        deferred.reject(error);
        deferred
    }

    /// Register a success callback.
    ///
    /// Runs immediately if the cell is already fulfilled and delivered;
    /// dropped unused if it was rejected.
    pub fn then<F>(&self, callback: F) -> &Self
    where
        F: FnOnce(&T) + Send + 'static,
    {
        let mut inner = self.inner.lock();
        let ready = match &inner.state {
            State::Fulfilled(value) if !inner.delivering => Some(Arc::clone(value)),
            State::Rejected(_) => return self,
            _ => None,
        };
        let Some(value) = ready else {
            inner.on_success.push(Box::new(callback));
            return self;
        };
        drop(inner);

        callback(&value);
        self
    }

    /// Register a failure callback.
    ///
    /// Runs immediately if the cell is already rejected and delivered;
    /// dropped unused if it was fulfilled.
    pub fn catch<F>(&self, callback: F) -> &Self
    where
        F: FnOnce(&NetworkError) + Send + 'static,
    {
        let mut inner = self.inner.lock();
        let ready = match &inner.state {
            State::Rejected(error) if !inner.delivering => Some(error.clone()),
            State::Fulfilled(_) => return self,
            _ => None,
        };
        let Some(error) = ready else {
            inner.on_failure.push(Box::new(callback));
            return self;
        };
        drop(inner);

        callback(&error);
        self
    }

    /// Settle with `value`. No-op if already settled.
    pub fn fulfill(&self, value: T) {
        let value = Arc::new(value);
        {
            let mut inner = self.inner.lock();
            if !inner.state.is_pending() {
                return;
            }
            inner.state = State::Fulfilled(Arc::clone(&value));
            inner.delivering = true;
            inner.on_failure.clear();
        }
        loop {
            let batch = self
                .inner
                .lock()
                .next_batch(|inner| std::mem::take(&mut inner.on_success));
            let Some(callbacks) = batch else { break };
            for callback in callbacks {
                callback(&value);
            }
        }
    }

    /// Settle with `error`. No-op if already settled.
    pub fn reject(&self, error: NetworkError) {
        {
            let mut inner = self.inner.lock();
            if !inner.state.is_pending() {
                return;
            }
            inner.state = State::Rejected(error.clone());
            inner.delivering = true;
            inner.on_success.clear();
        }
        loop {
            let batch = self
                .inner
                .lock()
                .next_batch(|inner| std::mem::take(&mut inner.on_failure));
            let Some(callbacks) = batch else { break };
            for callback in callbacks {
                callback(&error);
            }
        }
    }

    pub fn is_pending(&self) -> bool {
        self.inner.lock().state.is_pending()
    }

    /// Snapshot of the settled outcome, `None` while pending.
    pub fn outcome(&self) -> Option<Result<Arc<T>, NetworkError>> {
        match &self.inner.lock().state {
            State::Pending => None,
            State::Fulfilled(value) => Some(Ok(Arc::clone(value))),
            State::Rejected(error) => Some(Err(error.clone())),
        }
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.inner.lock().state {
            State::Pending => "pending",
            State::Fulfilled(_) => "fulfilled",
            State::Rejected(_) => "rejected",
        };
        f.debug_struct("Deferred").field("state", &state).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, Arc<Mutex<Vec<String>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        (Arc::clone(&log), log)
    }

    #[test]
    fn fulfill_runs_callbacks_in_subscription_order() {
        let (log, seen) = recorder();
        let deferred = Deferred::new();
        for tag in ["a", "b", "c"] {
            let log = Arc::clone(&log);
            deferred.then(move |v: &u32| log.lock().push(format!("{tag}{v}")));
        }
        deferred.fulfill(7);
        assert_eq!(*seen.lock(), vec!["a7", "b7", "c7"]);
    }

    #[test]
    fn second_fulfill_is_ignored() {
        let deferred = Deferred::new();
        deferred.fulfill(1);
        deferred.fulfill(2);
        deferred.reject(NetworkError::Invalid);
        let value = deferred.outcome().unwrap().unwrap();
        assert_eq!(*value, 1);
    }

    #[test]
    fn late_subscriber_receives_value() {
        let (log, seen) = recorder();
        let deferred = Deferred::new();
        deferred.fulfill("done".to_string());
        deferred.then(move |v: &String| log.lock().push(v.clone()));
        assert_eq!(*seen.lock(), vec!["done"]);
    }

    #[test]
    fn late_failure_subscriber_receives_error() {
        let (log, seen) = recorder();
        let deferred: Deferred<u8> = Deferred::rejected(NetworkError::ServerStatus(500));
        deferred.catch(move |e| log.lock().push(e.to_string()));
        assert_eq!(*seen.lock(), vec!["Server Error 500"]);
    }

    #[test]
    fn never_invokes_both_channels() {
        let (log, seen) = recorder();
        let deferred = Deferred::new();
        let ok_log = Arc::clone(&log);
        let err_log = Arc::clone(&log);
        deferred
            .then(move |_: &u8| ok_log.lock().push("ok".into()))
            .catch(move |_| err_log.lock().push("err".into()));
        deferred.reject(NetworkError::Parsing);
        deferred.fulfill(1);

        let ok_log = Arc::clone(&log);
        deferred.then(move |_| ok_log.lock().push("late ok".into()));
        assert_eq!(*seen.lock(), vec!["err"]);
    }

    #[test]
    fn callback_may_subscribe_to_same_deferred() {
        let (log, seen) = recorder();
        let deferred = Deferred::new();
        let handle = deferred.clone();
        let outer_log = Arc::clone(&log);
        deferred.then(move |v: &u8| {
            let log = Arc::clone(&outer_log);
            log.lock().push(format!("first {v}"));
            handle.then(move |v| log.lock().push(format!("late {v}")));
        });
        let second_log = Arc::clone(&log);
        deferred.then(move |v| second_log.lock().push(format!("second {v}")));
        deferred.fulfill(3);
        assert_eq!(*seen.lock(), vec!["first 3", "second 3", "late 3"]);

        // Delivery is over; new subscribers run inline.
        deferred.then(move |v| log.lock().push(format!("after {v}")));
        assert_eq!(seen.lock().last().map(String::as_str), Some("after 3"));
    }

    #[test]
    fn subscriber_from_another_thread_waits_for_delivery() {
        let (log, seen) = recorder();
        let deferred = Deferred::new();
        let handle = deferred.clone();
        let outer_log = Arc::clone(&log);
        deferred.then(move |v: &u8| {
            outer_log.lock().push(format!("first {v}"));
            let log = Arc::clone(&outer_log);
            std::thread::spawn(move || {
                handle.then(move |v| log.lock().push(format!("remote {v}")));
            })
            .join()
            .unwrap();
        });
        deferred.then(move |v| log.lock().push(format!("second {v}")));
        deferred.fulfill(5);
        assert_eq!(*seen.lock(), vec!["first 5", "second 5", "remote 5"]);
    }

    #[test]
    fn failure_subscribed_during_delivery_runs_last() {
        let (log, seen) = recorder();
        let deferred: Deferred<u8> = Deferred::new();
        let handle = deferred.clone();
        let outer_log = Arc::clone(&log);
        deferred.catch(move |e| {
            let log = Arc::clone(&outer_log);
            log.lock().push(format!("first {e}"));
            handle
                .then(|_| panic!("fulfilled channel must stay silent"))
                .catch(move |e| log.lock().push(format!("late {e}")));
        });
        deferred.catch(move |e| log.lock().push(format!("second {e}")));
        deferred.reject(NetworkError::Parsing);
        assert_eq!(
            *seen.lock(),
            vec!["first Parsing Error", "second Parsing Error", "late Parsing Error"]
        );
    }

    #[test]
    fn settles_from_another_thread() {
        let deferred = Deferred::new();
        let (tx, rx) = crossbeam_channel::bounded(1);
        deferred.then(move |v: &u64| tx.send(*v).unwrap());

        let remote = deferred.clone();
        std::thread::spawn(move || remote.fulfill(42)).join().unwrap();
        assert_eq!(rx.recv().unwrap(), 42);
        assert!(!deferred.is_pending());
    }

    #[test]
    fn debug_shows_state() {
        let deferred: Deferred<u8> = Deferred::new();
        assert_eq!(format!("{deferred:?}"), "Deferred { state: \"pending\" }");
    }
}
