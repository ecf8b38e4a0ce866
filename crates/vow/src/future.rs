//! Future Bridge
//!
//! Lets a promise be awaited on any async runtime. Pending polls park the
//! task's waker in the cell; settlement wakes every parked task.

use crate::promise::{Inner, Promise};
use crate::reason::Reason;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

impl<T: Send + Sync + 'static> Future for Promise<T> {
    type Output = Result<Arc<T>, Reason>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut inner = self.inner.lock().unwrap();
        match &mut *inner {
            Inner::Pending { wakers, .. } => {
                // Re-polls of the same task reuse the parked waker
                if !wakers.iter().any(|waker| waker.will_wake(cx.waker())) {
                    wakers.push(cx.waker().clone());
                }
                Poll::Pending
            }
            Inner::Fulfilled(value) => Poll::Ready(Ok(value.clone())),
            Inner::Rejected(reason) => Poll::Ready(Err(reason.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_await_settled_promise() {
        let promise = Promise::fulfilled(42);
        let value = smol::block_on(promise).unwrap();
        assert_eq!(*value, 42);
    }

    #[test]
    fn test_await_wakes_on_cross_thread_settlement() {
        let promise = Promise::new();
        let writer = promise.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            writer.settle(7);
        });

        let value = smol::block_on(promise).unwrap();
        assert_eq!(*value, 7);
        handle.join().unwrap();
    }

    #[test]
    fn test_await_surfaces_rejection() {
        let promise: Promise<i32> = Promise::new();
        let writer = promise.clone();
        let handle = thread::spawn(move || {
            writer.fail("boom");
        });

        let outcome = smol::block_on(promise);
        assert_eq!(outcome.unwrap_err(), Reason::new("boom"));
        handle.join().unwrap();
    }

    #[test]
    fn test_every_clone_can_await() {
        let promise = Promise::new();
        let first = promise.clone();
        let second = promise.clone();

        let both = smol::block_on(async move {
            let gather = smol::spawn(async move {
                let a = first.await.unwrap();
                let b = second.await.unwrap();
                *a + *b
            });
            promise.settle(5);
            gather.await
        });
        assert_eq!(both, 10);
    }
}
