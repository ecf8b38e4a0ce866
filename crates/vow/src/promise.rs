//! Promise Core
//!
//! Single-assignment promise: one transition from pending to fulfilled or
//! rejected, ordered callback delivery, and chaining via `map`/`flat_map`.

use crate::reason::Reason;
use std::fmt;
use std::mem;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::task::Waker;

/// Promise state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromiseState {
    Pending,
    Fulfilled,
    Rejected,
}

/// Callback invoked with the fulfillment value.
pub(crate) type FulfillHook<T> = Box<dyn FnOnce(Arc<T>) + Send>;
/// Callback invoked with the rejection reason.
pub(crate) type RejectHook = Box<dyn FnOnce(Reason) + Send>;

/// The terminal result of a promise.
pub(crate) enum Outcome<T> {
    Fulfilled(Arc<T>),
    Rejected(Reason),
}

pub(crate) enum Inner<T> {
    Pending {
        on_fulfilled: Vec<FulfillHook<T>>,
        on_rejected: Vec<RejectHook>,
        wakers: Vec<Waker>,
    },
    Fulfilled(Arc<T>),
    Rejected(Reason),
}

/// A single-assignment, thread-safe promise.
///
/// Created pending, settled at most once via [`settle`](Promise::settle) or
/// [`fail`](Promise::fail). Callbacks registered before settlement are
/// delivered in registration order when it happens; callbacks registered
/// after settlement run synchronously before the registration call returns.
/// Cloning shares the same underlying cell.
pub struct Promise<T> {
    pub(crate) inner: Arc<Mutex<Inner<T>>>,
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Send + Sync + 'static> Default for Promise<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + Sync + 'static> Promise<T> {
    /// Create a new pending promise
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::Pending {
                on_fulfilled: Vec::new(),
                on_rejected: Vec::new(),
                wakers: Vec::new(),
            })),
        }
    }

    /// Create a promise already fulfilled with `value`
    pub fn fulfilled(value: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::Fulfilled(Arc::new(value)))),
        }
    }

    /// Create a promise already rejected with `reason`
    pub fn rejected(reason: impl Into<Reason>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::Rejected(reason.into()))),
        }
    }

    /// Get current state
    pub fn state(&self) -> PromiseState {
        match *self.inner.lock().unwrap() {
            Inner::Pending { .. } => PromiseState::Pending,
            Inner::Fulfilled(_) => PromiseState::Fulfilled,
            Inner::Rejected(_) => PromiseState::Rejected,
        }
    }

    /// Whether the promise has left the pending state
    pub fn is_settled(&self) -> bool {
        self.state() != PromiseState::Pending
    }

    /// Whether the promise was rejected
    pub fn is_rejected(&self) -> bool {
        self.state() == PromiseState::Rejected
    }

    /// Get the fulfillment value (if fulfilled)
    pub fn value(&self) -> Option<Arc<T>> {
        match &*self.inner.lock().unwrap() {
            Inner::Fulfilled(value) => Some(value.clone()),
            _ => None,
        }
    }

    /// Get the rejection reason (if rejected)
    pub fn reason(&self) -> Option<Reason> {
        match &*self.inner.lock().unwrap() {
            Inner::Rejected(reason) => Some(reason.clone()),
            _ => None,
        }
    }

    /// Fulfill the promise with `value`.
    ///
    /// Runs every registered fulfillment callback with the value, in
    /// registration order, before returning.
    ///
    /// # Panics
    ///
    /// Panics if the promise is already settled. The stored result is not
    /// modified and other threads can keep reading the promise.
    pub fn settle(&self, value: T) {
        if !self.complete(Outcome::Fulfilled(Arc::new(value))) {
            panic!("promise already settled");
        }
    }

    /// Reject the promise with `reason`.
    ///
    /// Runs every registered rejection callback with the reason, in
    /// registration order, before returning.
    ///
    /// # Panics
    ///
    /// Panics if the promise is already settled.
    pub fn fail(&self, reason: impl Into<Reason>) {
        if !self.complete(Outcome::Rejected(reason.into())) {
            panic!("promise already settled");
        }
    }

    /// Register a callback for the fulfillment value.
    ///
    /// Already fulfilled: the callback runs synchronously before this call
    /// returns. Already rejected: the callback is dropped. Pending: it is
    /// appended and fires once on fulfillment.
    pub fn on_fulfilled(&self, callback: impl FnOnce(&T) + Send + 'static) -> &Self {
        self.add_hooks(
            Some(Box::new(move |value: Arc<T>| callback(&value))),
            None,
        );
        self
    }

    /// Register a callback for the rejection reason.
    ///
    /// Mirror of [`on_fulfilled`](Promise::on_fulfilled): synchronous if
    /// already rejected, dropped if already fulfilled.
    pub fn on_rejected(&self, callback: impl FnOnce(&Reason) + Send + 'static) -> &Self {
        self.add_hooks(
            None,
            Some(Box::new(move |reason: Reason| callback(&reason))),
        );
        self
    }

    /// Register a callback that runs once when the promise settles, whether
    /// it is fulfilled or rejected.
    pub fn on_processed(&self, callback: impl FnOnce() + Send + 'static) -> &Self {
        // One FnOnce shared across both sides; only the winning side takes it.
        let hook = Arc::new(Mutex::new(Some(callback)));
        let rejected_hook = hook.clone();
        self.add_hooks(
            Some(Box::new(move |_| {
                if let Some(callback) = hook.lock().unwrap().take() {
                    callback();
                }
            })),
            Some(Box::new(move |_| {
                if let Some(callback) = rejected_hook.lock().unwrap().take() {
                    callback();
                }
            })),
        );
        self
    }

    /// Derive a promise by transforming the fulfillment value.
    ///
    /// Rejection passes through untransformed. A panicking transform rejects
    /// the derived promise with the panic message instead of unwinding the
    /// settling thread.
    pub fn map<U, F>(&self, transform: F) -> Promise<U>
    where
        U: Send + Sync + 'static,
        F: FnOnce(&T) -> U + Send + 'static,
    {
        let derived = Promise::new();
        let fulfilled = derived.clone();
        let rejected = derived.clone();
        self.add_hooks(
            Some(Box::new(move |value: Arc<T>| {
                let outcome = match run_caught(move || transform(&value)) {
                    Ok(mapped) => Outcome::Fulfilled(Arc::new(mapped)),
                    Err(reason) => Outcome::Rejected(reason),
                };
                fulfilled.complete(outcome);
            })),
            Some(Box::new(move |reason: Reason| {
                rejected.complete(Outcome::Rejected(reason));
            })),
        );
        derived
    }

    /// Derive a promise from a transform that itself returns a promise.
    ///
    /// The derived promise adopts the inner promise's eventual outcome,
    /// flattening one level. A panicking transform rejects the derived
    /// promise, as in [`map`](Promise::map).
    pub fn flat_map<U, F>(&self, transform: F) -> Promise<U>
    where
        U: Send + Sync + 'static,
        F: FnOnce(&T) -> Promise<U> + Send + 'static,
    {
        let derived = Promise::new();
        let fulfilled = derived.clone();
        let rejected = derived.clone();
        self.add_hooks(
            Some(Box::new(move |value: Arc<T>| {
                match run_caught(move || transform(&value)) {
                    Ok(inner) => inner.forward_to(&fulfilled),
                    Err(reason) => {
                        fulfilled.complete(Outcome::Rejected(reason));
                    }
                }
            })),
            Some(Box::new(move |reason: Reason| {
                rejected.complete(Outcome::Rejected(reason));
            })),
        );
        derived
    }

    /// Forward this promise's eventual outcome into `target`, first writer
    /// wins. Settlement fan-in point for `flat_map` and the combinators.
    pub(crate) fn forward_to(&self, target: &Promise<T>) {
        let fulfilled = target.clone();
        let rejected = target.clone();
        self.add_hooks(
            Some(Box::new(move |value: Arc<T>| {
                fulfilled.complete(Outcome::Fulfilled(value));
            })),
            Some(Box::new(move |reason: Reason| {
                rejected.complete(Outcome::Rejected(reason));
            })),
        );
    }

    /// Transition to the given terminal state if still pending, then run the
    /// matching drained callbacks in order and wake parked wakers. Returns
    /// false without touching anything if the promise was already settled.
    ///
    /// Callbacks run with the cell lock released, so they may register
    /// further callbacks on or inspect this same promise.
    pub(crate) fn complete(&self, outcome: Outcome<T>) -> bool {
        let (fulfill_hooks, reject_hooks, wakers) = {
            let mut inner = self.inner.lock().unwrap();
            match &mut *inner {
                Inner::Pending {
                    on_fulfilled,
                    on_rejected,
                    wakers,
                } => {
                    let fulfill_hooks = mem::take(on_fulfilled);
                    let reject_hooks = mem::take(on_rejected);
                    let wakers = mem::take(wakers);
                    *inner = match &outcome {
                        Outcome::Fulfilled(value) => Inner::Fulfilled(value.clone()),
                        Outcome::Rejected(reason) => Inner::Rejected(reason.clone()),
                    };
                    (fulfill_hooks, reject_hooks, wakers)
                }
                _ => return false,
            }
        };

        match outcome {
            Outcome::Fulfilled(value) => {
                tracing::trace!("promise fulfilled ({} handlers)", fulfill_hooks.len());
                for hook in fulfill_hooks {
                    hook(value.clone());
                }
            }
            Outcome::Rejected(reason) => {
                tracing::trace!(
                    "promise rejected ({} handlers): {}",
                    reject_hooks.len(),
                    reason
                );
                for hook in reject_hooks {
                    hook(reason.clone());
                }
            }
        }
        for waker in wakers {
            waker.wake();
        }
        true
    }

    /// Append hooks if pending, or run the matching one synchronously if the
    /// promise is already settled. The non-matching hook is dropped.
    pub(crate) fn add_hooks(
        &self,
        mut on_fulfilled: Option<FulfillHook<T>>,
        mut on_rejected: Option<RejectHook>,
    ) {
        let settled = {
            let mut inner = self.inner.lock().unwrap();
            match &mut *inner {
                Inner::Pending {
                    on_fulfilled: fulfill_hooks,
                    on_rejected: reject_hooks,
                    ..
                } => {
                    if let Some(hook) = on_fulfilled.take() {
                        fulfill_hooks.push(hook);
                    }
                    if let Some(hook) = on_rejected.take() {
                        reject_hooks.push(hook);
                    }
                    None
                }
                Inner::Fulfilled(value) => Some(Outcome::Fulfilled(value.clone())),
                Inner::Rejected(reason) => Some(Outcome::Rejected(reason.clone())),
            }
        };

        match settled {
            Some(Outcome::Fulfilled(value)) => {
                if let Some(hook) = on_fulfilled {
                    hook(value);
                }
            }
            Some(Outcome::Rejected(reason)) => {
                if let Some(hook) = on_rejected {
                    hook(reason);
                }
            }
            None => {}
        }
    }
}

impl<T: Send + Sync + 'static> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise").field("state", &self.state()).finish()
    }
}

/// Run a fallible user transform, converting a panic into a `Reason`.
fn run_caught<R>(f: impl FnOnce() -> R) -> Result<R, Reason> {
    std::panic::catch_unwind(AssertUnwindSafe(f)).map_err(Reason::from_panic)
}
