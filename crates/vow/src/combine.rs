//! Promise Combinators
//!
//! Gather and race several promises into one. Losers of a race go through
//! the first-writer-wins transition, so they never trip the
//! double-settlement fault.

use crate::promise::{Outcome, Promise};
use crate::reason::Reason;
use std::mem;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

struct Gather<T> {
    slots: Vec<Option<T>>,
    remaining: usize,
}

/// Combine promises into one that fulfills with every value, in input
/// order, once all inputs fulfill. The first rejection rejects the
/// combined promise. An empty input fulfills immediately.
pub fn all<T>(promises: Vec<Promise<T>>) -> Promise<Vec<T>>
where
    T: Clone + Send + Sync + 'static,
{
    if promises.is_empty() {
        return Promise::fulfilled(Vec::new());
    }

    let combined = Promise::new();
    let gathered = Arc::new(Mutex::new(Gather {
        slots: vec![None; promises.len()],
        remaining: promises.len(),
    }));

    for (index, promise) in promises.iter().enumerate() {
        let gathered = gathered.clone();
        let fulfilled = combined.clone();
        let rejected = combined.clone();
        promise.add_hooks(
            Some(Box::new(move |value: Arc<T>| {
                let ready = {
                    let mut gather = gathered.lock().unwrap();
                    gather.slots[index] = Some((*value).clone());
                    gather.remaining -= 1;
                    if gather.remaining == 0 {
                        Some(mem::take(&mut gather.slots))
                    } else {
                        None
                    }
                };
                if let Some(slots) = ready {
                    let values: Vec<T> = slots.into_iter().flatten().collect();
                    fulfilled.complete(Outcome::Fulfilled(Arc::new(values)));
                }
            })),
            Some(Box::new(move |reason: Reason| {
                rejected.complete(Outcome::Rejected(reason));
            })),
        );
    }
    combined
}

/// First settlement wins, fulfillment or rejection alike. An empty input
/// stays pending forever.
pub fn race<T>(promises: Vec<Promise<T>>) -> Promise<T>
where
    T: Send + Sync + 'static,
{
    let winner = Promise::new();
    for promise in &promises {
        promise.forward_to(&winner);
    }
    winner
}

/// First fulfillment wins. Rejects only once every input has rejected;
/// an empty input rejects immediately.
pub fn any<T>(promises: Vec<Promise<T>>) -> Promise<T>
where
    T: Send + Sync + 'static,
{
    if promises.is_empty() {
        return Promise::rejected("no promises to settle");
    }

    let combined = Promise::new();
    let remaining = Arc::new(AtomicUsize::new(promises.len()));
    for promise in &promises {
        let fulfilled = combined.clone();
        let rejected = combined.clone();
        let remaining = remaining.clone();
        promise.add_hooks(
            Some(Box::new(move |value: Arc<T>| {
                fulfilled.complete(Outcome::Fulfilled(value));
            })),
            Some(Box::new(move |_: Reason| {
                if remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                    rejected.complete(Outcome::Rejected(Reason::new(
                        "every promise was rejected",
                    )));
                }
            })),
        );
    }
    combined
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::promise::PromiseState;

    #[test]
    fn test_all_preserves_input_order() {
        let first = Promise::new();
        let second = Promise::new();
        let third = Promise::new();
        let combined = all(vec![first.clone(), second.clone(), third.clone()]);

        // Settle out of order
        third.settle(3);
        first.settle(1);
        assert_eq!(combined.state(), PromiseState::Pending);

        second.settle(2);
        assert_eq!(combined.value().map(|v| (*v).clone()), Some(vec![1, 2, 3]));
    }

    #[test]
    fn test_all_rejects_on_first_failure() {
        let first = Promise::new();
        let second = Promise::new();
        let combined = all(vec![first.clone(), second.clone()]);

        second.fail("boom");
        assert_eq!(combined.reason(), Some(Reason::new("boom")));

        // A later fulfillment on the other input changes nothing
        first.settle(1);
        assert_eq!(combined.reason(), Some(Reason::new("boom")));
    }

    #[test]
    fn test_all_of_nothing_fulfills_immediately() {
        let combined: Promise<Vec<i32>> = all(Vec::new());
        assert_eq!(combined.value().map(|v| (*v).clone()), Some(Vec::new()));
    }

    #[test]
    fn test_race_first_settlement_wins() {
        let fast = Promise::new();
        let slow = Promise::new();
        let winner = race(vec![fast.clone(), slow.clone()]);

        fast.settle(1);
        slow.settle(2);
        assert_eq!(winner.value().map(|v| *v), Some(1));
    }

    #[test]
    fn test_race_rejection_can_win() {
        let timer: Promise<i32> = Promise::new();
        let work: Promise<i32> = Promise::new();
        let raced = race(vec![work.clone(), timer.clone()]);

        // External timeout layering: a timer's rejection raced against work
        timer.fail("timed out");
        assert_eq!(raced.reason(), Some(Reason::new("timed out")));

        work.settle(5);
        assert!(raced.is_rejected());
    }

    #[test]
    fn test_race_of_nothing_stays_pending() {
        let winner: Promise<i32> = race(Vec::new());
        assert_eq!(winner.state(), PromiseState::Pending);
    }

    #[test]
    fn test_any_prefers_fulfillment() {
        let failing = Promise::new();
        let working = Promise::new();
        let combined = any(vec![failing.clone(), working.clone()]);

        failing.fail("boom");
        assert_eq!(combined.state(), PromiseState::Pending);

        working.settle(9);
        assert_eq!(combined.value().map(|v| *v), Some(9));
    }

    #[test]
    fn test_any_rejects_when_exhausted() {
        let first: Promise<i32> = Promise::new();
        let second: Promise<i32> = Promise::new();
        let combined = any(vec![first.clone(), second.clone()]);

        first.fail("a");
        second.fail("b");
        assert_eq!(
            combined.reason(),
            Some(Reason::new("every promise was rejected"))
        );
    }

    #[test]
    fn test_any_of_nothing_rejects() {
        let combined: Promise<i32> = any(Vec::new());
        assert!(combined.is_rejected());
    }

    #[test]
    fn test_all_with_already_settled_inputs() {
        let combined = all(vec![Promise::fulfilled(1), Promise::fulfilled(2)]);
        assert_eq!(combined.value().map(|v| (*v).clone()), Some(vec![1, 2]));
    }
}
