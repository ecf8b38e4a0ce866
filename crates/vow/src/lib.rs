//! Vow - Single-Assignment Promises
//!
//! A thread-safe promise that settles exactly once, with chaining.
//!
//! Features:
//! - One-way transition: pending, then fulfilled or rejected, permanently
//! - Callbacks delivered exactly once, in registration order, whether
//!   registered before or after settlement
//! - Chaining via `map` and `flat_map`; transform panics become rejections
//! - `all` / `race` / `any` combinators
//! - Awaitable on any async runtime through `std::future::Future`
//!
//! # Example
//! ```rust
//! use vow::Promise;
//!
//! let promise: Promise<i32> = Promise::new();
//! let doubled = promise.map(|value| value * 2);
//! promise.settle(21);
//! assert_eq!(doubled.value().map(|v| *v), Some(42));
//! ```

mod combine;
mod future;
mod promise;
mod reason;

pub use combine::{all, any, race};
pub use promise::{Promise, PromiseState};
pub use reason::Reason;
